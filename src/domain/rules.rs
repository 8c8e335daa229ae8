/// Movement rules, truth-table driven.
///
/// Pure functions over the grid and the entity registry. They decide
/// "what is legal" and describe the resulting move; they never mutate.
/// `sim::step` applies the plan (undo record, tweens, timer).
///
/// ## Step / Push Truth Table
///
/// `target = player + d`, `beyond = target + d`
///
/// ┌────────────────────────────────────┬──────────┬──────────────────┐
/// │ Condition (checked in order)        │ Result   │ Notes            │
/// ├────────────────────────────────────┼──────────┼──────────────────┤
/// │ player is moving                    │ DENY     │ input swallowed  │
/// │ target not walkable                 │ DENY     │ wall / void / OOB│
/// │ no settled box at target            │ STEP     │                  │
/// │ beyond not walkable                 │ DENY     │ box against wall │
/// │ settled box at beyond               │ DENY     │ box against box  │
/// │ otherwise                           │ PUSH     │ box target→beyond│
/// └────────────────────────────────────┴──────────┴──────────────────┘
///
/// Only settled positions take part: a box still in transit does not
/// occupy either of its cells.

use super::entity::{Direction, EntityRegistry};
use super::grid::{GridPos, LevelGrid};

/// A box displacement, as recorded by a push.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BoxPush {
    pub box_id: usize,
    pub from: GridPos,
    pub to: GridPos,
}

/// An accepted move, ready to be applied.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MovePlan {
    pub direction: Direction,
    pub player_from: GridPos,
    pub player_to: GridPos,
    pub push: Option<BoxPush>,
}

/// Why a move was refused. Not an error: the normal rejection path.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MoveRejection {
    PlayerMoving,
    Blocked,
    BoxBlocked,
}

/// Resolve one step in `dir` against settled positions.
pub fn resolve_move(
    grid: &LevelGrid,
    entities: &EntityRegistry,
    dir: Direction,
) -> Result<MovePlan, MoveRejection> {
    let player = &entities.player;
    if player.is_moving {
        return Err(MoveRejection::PlayerMoving);
    }

    let from = player.grid_pos;
    let target = dir.step(from);
    if !grid.is_walkable(target.x, target.y) {
        return Err(MoveRejection::Blocked);
    }

    let push = match entities.box_at(target.x, target.y) {
        None => None,
        Some(b) => {
            let beyond = dir.step(target);
            if !can_receive_box(grid, entities, beyond) {
                return Err(MoveRejection::BoxBlocked);
            }
            Some(BoxPush { box_id: b.id, from: target, to: beyond })
        }
    };

    Ok(MovePlan { direction: dir, player_from: from, player_to: target, push })
}

/// Can a pushed box come to rest at `at`?
pub fn can_receive_box(grid: &LevelGrid, entities: &EntityRegistry, at: GridPos) -> bool {
    grid.is_walkable(at.x, at.y) && entities.box_at(at.x, at.y).is_none()
}

/// Is the box at `at` wedged into a non-goal corner? Such a box can never
/// move again, so the level is lost until undone.
pub fn is_corner_deadlock(grid: &LevelGrid, at: GridPos) -> bool {
    if grid.has_goal(at.x, at.y) {
        return false;
    }
    let blocked = |d: Direction| {
        let n = d.step(at);
        !grid.is_walkable(n.x, n.y)
    };
    let vertical = blocked(Direction::Up) || blocked(Direction::Down);
    let horizontal = blocked(Direction::Left) || blocked(Direction::Right);
    vertical && horizontal
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::tests::parse;

    fn setup(rows: &[&str]) -> (LevelGrid, EntityRegistry) {
        let p = parse(rows).unwrap();
        let reg = EntityRegistry::new(p.spawn, &p.boxes, &p.grid);
        (p.grid, reg)
    }

    #[test]
    fn step_into_open_floor() {
        let (g, e) = setup(&[
            "#####",
            "#@  #",
            "#####",
        ]);
        let plan = resolve_move(&g, &e, Direction::Right).unwrap();
        assert_eq!(plan.player_to, GridPos::new(2, 1));
        assert_eq!(plan.push, None);
    }

    #[test]
    fn wall_blocks() {
        let (g, e) = setup(&[
            "###",
            "#@#",
            "###",
        ]);
        for d in Direction::ALL {
            assert_eq!(resolve_move(&g, &e, d), Err(MoveRejection::Blocked));
        }
    }

    #[test]
    fn push_into_open_cell() {
        let (g, e) = setup(&[
            "######",
            "#@$ .#",
            "######",
        ]);
        let plan = resolve_move(&g, &e, Direction::Right).unwrap();
        assert_eq!(
            plan.push,
            Some(BoxPush { box_id: 0, from: GridPos::new(2, 1), to: GridPos::new(3, 1) })
        );
    }

    #[test]
    fn box_against_wall_blocks() {
        let (g, e) = setup(&[
            "#####",
            "#@$##",
            "#####",
        ]);
        assert_eq!(resolve_move(&g, &e, Direction::Right), Err(MoveRejection::BoxBlocked));
    }

    #[test]
    fn box_against_box_blocks() {
        let (g, e) = setup(&[
            "######",
            "#@$$ #",
            "######",
        ]);
        assert_eq!(resolve_move(&g, &e, Direction::Right), Err(MoveRejection::BoxBlocked));
    }

    #[test]
    fn moving_box_does_not_block() {
        let (g, mut e) = setup(&[
            "######",
            "#@$$ #",
            "######",
        ]);
        e.boxes[1].is_moving = true;
        // The box at (2,1) can now be pushed into (3,1), which is in transit.
        let plan = resolve_move(&g, &e, Direction::Right).unwrap();
        assert_eq!(plan.push.map(|p| p.box_id), Some(0));
    }

    #[test]
    fn moving_player_is_denied() {
        let (g, mut e) = setup(&["#@ #"]);
        e.player.is_moving = true;
        assert_eq!(resolve_move(&g, &e, Direction::Right), Err(MoveRejection::PlayerMoving));
    }

    #[test]
    fn void_edge_blocks() {
        let (g, e) = setup(&["@ "]);
        assert_eq!(resolve_move(&g, &e, Direction::Left), Err(MoveRejection::Blocked));
        assert_eq!(resolve_move(&g, &e, Direction::Up), Err(MoveRejection::Blocked));
    }

    #[test]
    fn corner_deadlock_detection() {
        let (g, _) = setup(&[
            "#####",
            "#  .#",
            "# @ #",
            "#####",
        ]);
        assert!(is_corner_deadlock(&g, GridPos::new(1, 1)));
        assert!(!is_corner_deadlock(&g, GridPos::new(3, 1))); // goal corner
        assert!(!is_corner_deadlock(&g, GridPos::new(2, 1))); // wall only above
    }
}

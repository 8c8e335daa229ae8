/// Entities: the Player and the pushable boxes.
///
/// Every entity carries two positions:
///   - `grid_pos`  : authoritative logical cell, used for all rule checks
///   - `render_pos`: real-valued position the renderer draws at
///
/// They are equal whenever `is_moving` is false. Only the movement resolver,
/// the tween scheduler and undo ever write them.

use super::grid::{GridPos, LevelGrid};

/// One of the four cardinal directions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Unit vector `(dx, dy)`; y grows downward.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// Only the four cardinal unit vectors map to a direction.
    /// Diagonals, zero and longer vectors are rejected.
    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        match (dx, dy) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn step(self, from: GridPos) -> GridPos {
        let (dx, dy) = self.delta();
        from.offset(dx, dy)
    }
}

/// Real-valued position in tile units.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct RenderPos {
    pub x: f32,
    pub y: f32,
}

impl RenderPos {
    pub fn lerp(from: GridPos, to: GridPos, t: f32) -> RenderPos {
        RenderPos {
            x: from.x as f32 + (to.x - from.x) as f32 * t,
            y: from.y as f32 + (to.y - from.y) as f32 * t,
        }
    }
}

impl From<GridPos> for RenderPos {
    fn from(p: GridPos) -> Self {
        RenderPos { x: p.x as f32, y: p.y as f32 }
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub grid_pos: GridPos,
    pub render_pos: RenderPos,
    pub is_moving: bool,
    /// Destination of the in-flight step, if any.
    pub target: Option<GridPos>,
    pub facing: Direction,
    /// False until the first accepted move; idle animation waits on it.
    pub has_interacted: bool,
}

impl Player {
    pub fn new(at: GridPos) -> Self {
        Player {
            grid_pos: at,
            render_pos: at.into(),
            is_moving: false,
            target: None,
            facing: Direction::Down,
            has_interacted: false,
        }
    }

    /// Jump to a cell with no animation.
    pub fn snap_to(&mut self, at: GridPos) {
        self.grid_pos = at;
        self.render_pos = at.into();
        self.is_moving = false;
        self.target = None;
    }

    pub fn idle_eligible(&self) -> bool {
        self.has_interacted && !self.is_moving
    }
}

#[derive(Clone, Debug)]
pub struct PushBox {
    pub id: usize,
    pub grid_pos: GridPos,
    pub render_pos: RenderPos,
    pub is_moving: bool,
    pub on_goal: bool,
}

impl PushBox {
    pub fn new(id: usize, at: GridPos, grid: &LevelGrid) -> Self {
        PushBox {
            id,
            grid_pos: at,
            render_pos: at.into(),
            is_moving: false,
            on_goal: grid.has_goal(at.x, at.y),
        }
    }

    /// Jump to a cell with no animation; `on_goal` is recomputed.
    pub fn snap_to(&mut self, at: GridPos, grid: &LevelGrid) {
        self.grid_pos = at;
        self.render_pos = at.into();
        self.is_moving = false;
        self.on_goal = grid.has_goal(at.x, at.y);
    }
}

/// The player plus the fixed collection of boxes for one level instance.
#[derive(Clone, Debug)]
pub struct EntityRegistry {
    pub player: Player,
    pub boxes: Vec<PushBox>,
}

impl EntityRegistry {
    pub fn new(spawn: GridPos, box_cells: &[GridPos], grid: &LevelGrid) -> Self {
        EntityRegistry {
            player: Player::new(spawn),
            boxes: box_cells
                .iter()
                .enumerate()
                .map(|(id, &at)| PushBox::new(id, at, grid))
                .collect(),
        }
    }

    /// Settled box at (x, y). Boxes in transit never block a cell.
    pub fn box_at(&self, x: i32, y: i32) -> Option<&PushBox> {
        self.boxes
            .iter()
            .find(|b| !b.is_moving && b.grid_pos.x == x && b.grid_pos.y == y)
    }

    pub fn is_occupied_by_player(&self, x: i32, y: i32) -> bool {
        self.player.grid_pos.x == x && self.player.grid_pos.y == y
    }

    pub fn any_moving(&self) -> bool {
        self.player.is_moving || self.boxes.iter().any(|b| b.is_moving)
    }

    /// Snap every render position back onto its logical cell and clear all
    /// moving flags. Logical positions are untouched.
    pub fn settle_all(&mut self) {
        let p = &mut self.player;
        p.render_pos = p.grid_pos.into();
        p.is_moving = false;
        p.target = None;
        for b in &mut self.boxes {
            b.render_pos = b.grid_pos.into();
            b.is_moving = false;
        }
    }

    pub fn boxes_on_goals(&self) -> usize {
        self.boxes.iter().filter(|b| b.on_goal).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::grid::tests::parse;

    #[test]
    fn only_cardinal_deltas_are_directions() {
        for d in Direction::ALL {
            let (dx, dy) = d.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(d));
        }
        assert_eq!(Direction::from_delta(-1, -1), None);
        assert_eq!(Direction::from_delta(0, 0), None);
        assert_eq!(Direction::from_delta(2, 0), None);
    }

    #[test]
    fn lerp_midpoint() {
        let p = RenderPos::lerp(GridPos::new(1, 1), GridPos::new(2, 1), 0.5);
        assert!((p.x - 1.5).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn box_at_ignores_moving_boxes() {
        let level = parse(&["#@$.#"]).unwrap();
        let mut reg = EntityRegistry::new(level.spawn, &level.boxes, &level.grid);
        assert_eq!(reg.box_at(2, 0).map(|b| b.id), Some(0));
        reg.boxes[0].is_moving = true;
        assert!(reg.box_at(2, 0).is_none());
    }

    #[test]
    fn on_goal_is_derived_from_position() {
        let level = parse(&["#@*$.#"]).unwrap();
        let mut reg = EntityRegistry::new(level.spawn, &level.boxes, &level.grid);
        assert!(reg.boxes[0].on_goal);
        assert!(!reg.boxes[1].on_goal);
        reg.boxes[1].snap_to(GridPos::new(4, 0), &level.grid);
        assert!(reg.boxes[1].on_goal);
        assert_eq!(reg.boxes_on_goals(), 2);
    }

    #[test]
    fn settle_all_resets_render_and_flags() {
        let level = parse(&["#@$ #"]).unwrap();
        let mut reg = EntityRegistry::new(level.spawn, &level.boxes, &level.grid);
        reg.player.is_moving = true;
        reg.player.render_pos = RenderPos { x: 1.4, y: 0.0 };
        reg.boxes[0].is_moving = true;
        reg.boxes[0].render_pos = RenderPos { x: 2.4, y: 0.0 };
        reg.settle_all();
        assert!(!reg.any_moving());
        assert_eq!(reg.player.render_pos, RenderPos::from(GridPos::new(1, 0)));
        assert_eq!(reg.boxes[0].render_pos, RenderPos::from(GridPos::new(2, 0)));
    }
}

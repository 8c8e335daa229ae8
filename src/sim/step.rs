/// Core operations: the only entry points that mutate a `WorldState`.
///
/// ## Frame order (one `tick(now)` per host frame)
///
///   1. `world.now = now`
///   2. advance tweens, boxes first (commits + counters)
///   3. player completion → win detection
///   4. Challenge constraints (only while still in Play)
///   5. drain pending events into the returned `Frame`
///
/// Input operations (`move_player`, `undo`, `redo`, …) run between ticks
/// and read `world.now` as their clock. None of them can fail loudly:
/// a refused action is `false`, never an error.

use log::{debug, info, warn};

use crate::config::SpeedTier;
use crate::domain::entity::{Direction, RenderPos};
use crate::domain::mode::{BestRecord, ConstraintFailure, GameMode, ModeKind};
use crate::domain::rules::{self, MovePlan, MoveRejection};
use crate::sim::event::{GameEvent, SoundCue};
use crate::sim::level;
use crate::sim::state::{GameState, StateCommand};
use crate::sim::tween::{Tween, TweenTarget};
use crate::sim::undo::UndoRecord;
use crate::sim::world::WorldState;

/// What the presentation layer needs after one tick.
#[derive(Clone, Debug)]
pub struct Frame {
    pub player_render_pos: RenderPos,
    /// Indexed by box id.
    pub box_render_pos: Vec<RenderPos>,
    pub is_won: bool,
    /// Stays set until the failed attempt is restarted.
    pub constraint_failure: Option<ConstraintFailure>,
    pub events: Vec<GameEvent>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stats {
    pub moves: u32,
    pub pushes: u32,
    pub elapsed_ms: u64,
    pub best: Option<BestRecord>,
    pub over_time_goal: bool,
    /// Challenge only: moves and milliseconds left.
    pub remaining: Option<(u32, u64)>,
}

// ══════════════════════════════════════════════════════════════
// Frame tick
// ══════════════════════════════════════════════════════════════

pub fn tick(world: &mut WorldState, now: u64) -> Frame {
    world.now = world.now.max(now);
    let now = world.now;

    let done = world
        .tweens
        .advance(now, &mut world.entities, &world.grid, &mut world.mode);
    for completion in done {
        match completion.target {
            TweenTarget::Box(id) => {
                let on_goal = world.entities.boxes.get(id).is_some_and(|b| b.on_goal);
                world.events.push(GameEvent::BoxArrived { id, at: completion.at, on_goal });
                if on_goal {
                    world.events.push(GameEvent::Cue(SoundCue::BoxOnGoal));
                }
            }
            TweenTarget::Player => {
                world.events.push(GameEvent::PlayerArrived { at: completion.at });
                check_win(world);
            }
        }
    }

    evaluate_constraints(world);

    Frame {
        player_render_pos: world.entities.player.render_pos,
        box_render_pos: world.entities.boxes.iter().map(|b| b.render_pos).collect(),
        is_won: world.won,
        constraint_failure: world.failure,
        events: std::mem::take(&mut world.events),
    }
}

fn evaluate_constraints(world: &mut WorldState) {
    if !world.machine.is(GameState::Play) || world.won || world.failure.is_some() {
        return;
    }
    if let Some(reason) = world.mode.evaluate(world.now) {
        info!(
            "challenge failed on {} after {} moves",
            reason.label(),
            world.mode.move_count
        );
        world.failure = Some(reason);
        world.events.push(GameEvent::ConstraintFailed(reason));
        world.events.push(GameEvent::Cue(SoundCue::Fail));
        transition(world, GameState::Paused);
    }
}

// ══════════════════════════════════════════════════════════════
// Movement
// ══════════════════════════════════════════════════════════════

/// Try one cardinal step. Only unit vectors are accepted; input while the
/// player is moving is swallowed.
pub fn move_player(world: &mut WorldState, dx: i32, dy: i32) -> bool {
    if !world.machine.is(GameState::Play) {
        return false;
    }
    let Some(dir) = Direction::from_delta(dx, dy) else {
        return false;
    };

    match rules::resolve_move(&world.grid, &world.entities, dir) {
        Ok(plan) => {
            world.last_blocked = None;
            apply_plan(world, &plan);
            true
        }
        Err(MoveRejection::PlayerMoving) => false,
        Err(reason) => {
            // A held key retries every frame; report the bump once.
            if world.last_blocked != Some(dir) {
                debug!("move {dir:?} refused: {reason:?}");
                world.events.push(GameEvent::MoveBlocked);
                world.events.push(GameEvent::Cue(SoundCue::Blocked));
                world.last_blocked = Some(dir);
            }
            false
        }
    }
}

/// The host saw no direction held this frame; the next bump into a wall
/// is reported again.
pub fn release_direction(world: &mut WorldState) {
    world.last_blocked = None;
}

fn apply_plan(world: &mut WorldState, plan: &MovePlan) {
    let now = world.now;
    let duration_ms = world.move_duration_ms();

    world.history.push(UndoRecord::from(plan));

    if let Some(push) = plan.push {
        world.tweens.start(
            Tween { target: TweenTarget::Box(push.box_id), from: push.from, to: push.to, start_ms: now, duration_ms },
            &mut world.entities,
        );
    }
    world.tweens.start(
        Tween { target: TweenTarget::Player, from: plan.player_from, to: plan.player_to, start_ms: now, duration_ms },
        &mut world.entities,
    );

    let player = &mut world.entities.player;
    player.facing = plan.direction;
    player.has_interacted = true;

    if !world.mode.timer.is_running() {
        let first = !world.mode.timer.has_started();
        world.mode.timer.start(now);
        if first {
            world.events.push(GameEvent::TimerStarted);
        }
    }

    world.events.push(GameEvent::MoveStarted { to: plan.player_to, push: plan.push.is_some() });
    let cue = if plan.push.is_some() { SoundCue::Push } else { SoundCue::Step };
    world.events.push(GameEvent::Cue(cue));
}

// ══════════════════════════════════════════════════════════════
// Undo / redo
// ══════════════════════════════════════════════════════════════

fn can_rewind(world: &WorldState) -> bool {
    world.machine.is(GameState::Play) && !world.entities.any_moving()
}

/// Revert the newest completed move with an instant snap.
/// `push_count` is left alone.
pub fn undo(world: &mut WorldState) -> bool {
    if !can_rewind(world) {
        return false;
    }
    let Some(rec) = world.history.pop_for_undo() else {
        return false;
    };

    let player = &mut world.entities.player;
    player.snap_to(rec.player_from);
    player.facing = rec.direction;
    if let Some(push) = rec.pushed_box {
        if let Some(b) = world.entities.boxes.get_mut(push.box_id) {
            b.snap_to(push.from, &world.grid);
        }
    }
    world.mode.move_count = world.mode.move_count.saturating_sub(1);

    world.events.push(GameEvent::Undone);
    world.events.push(GameEvent::Cue(SoundCue::Undo));
    true
}

/// Re-apply the newest undone move with an instant snap.
/// `move_count` goes up, `push_count` does not.
pub fn redo(world: &mut WorldState) -> bool {
    if !can_rewind(world) {
        return false;
    }
    let Some(rec) = world.history.pop_for_redo() else {
        return false;
    };

    let player = &mut world.entities.player;
    player.snap_to(rec.player_to());
    player.facing = rec.direction;
    if let Some(push) = rec.pushed_box {
        if let Some(b) = world.entities.boxes.get_mut(push.box_id) {
            b.snap_to(push.to, &world.grid);
        }
    }
    world.mode.move_count += 1;

    world.events.push(GameEvent::Redone);
    let cue = if rec.pushed_box.is_some() { SoundCue::Push } else { SoundCue::Step };
    world.events.push(GameEvent::Cue(cue));
    check_win(world);
    true
}

// ══════════════════════════════════════════════════════════════
// Win detection
// ══════════════════════════════════════════════════════════════

/// Box positions equal the goal set. A level without goals is never won.
pub fn is_won(world: &WorldState) -> bool {
    let goals = world.grid.goals();
    if goals.is_empty() || goals.len() != world.entities.boxes.len() {
        return false;
    }
    world.entities.boxes.iter().all(|b| goals.contains(&b.grid_pos))
}

/// Fires at most once per attempt: the latch and the Play guard both
/// stop a second evaluation.
fn check_win(world: &mut WorldState) -> bool {
    if world.won || !world.machine.is(GameState::Play) || !is_won(world) {
        return false;
    }
    world.won = true;

    let run = BestRecord {
        moves: world.mode.move_count,
        pushes: world.mode.push_count,
        time_ms: world.mode.timer.elapsed(world.now),
    };
    let kind = world.mode.mode.kind();
    let new_best = !world.is_fallback && world.progress.record_win(world.current_level, kind, run);
    info!(
        "level {} solved: {} moves, {} pushes, {} ms{}",
        world.current_level + 1,
        run.moves,
        run.pushes,
        run.time_ms,
        if new_best { " (new best)" } else { "" }
    );
    world.events.push(GameEvent::LevelWon {
        index: world.current_level,
        moves: run.moves,
        pushes: run.pushes,
        time_ms: run.time_ms,
        new_best,
    });

    transition(world, GameState::Win);
    true
}

// ══════════════════════════════════════════════════════════════
// Session flow
// ══════════════════════════════════════════════════════════════

/// Apply a state transition and run its commands. Illegal edges are
/// logged by the machine and leave everything unchanged.
pub fn transition(world: &mut WorldState, to: GameState) -> bool {
    let from = world.machine.state();
    let Ok(commands) = world.machine.transition(to) else {
        return false;
    };
    world.events.push(GameEvent::StateChanged { from, to });
    for cmd in commands {
        apply_command(world, cmd);
    }
    true
}

fn apply_command(world: &mut WorldState, cmd: StateCommand) {
    match cmd {
        StateCommand::StopTimer => world.mode.timer.stop(world.now),
        StateCommand::ResumeTimer => {
            if world.mode.timer.has_started() {
                world.mode.timer.start(world.now);
            }
        }
        StateCommand::PlayCue(cue) => world.events.push(GameEvent::Cue(cue)),
        StateCommand::SyncProgress => save_progress(world),
    }
}

fn save_progress(world: &mut WorldState) {
    if world.is_fallback {
        debug!("fallback level: progress left untouched");
        return;
    }
    let Some(store) = world.store.as_mut() else {
        return;
    };
    if let Err(e) = store.save_progress(&world.progress) {
        warn!("progress not saved: {e}");
        world.events.push(GameEvent::ProgressSaveFailed(e.to_string()));
    }
}

/// LevelSelect → Play on level `index` (or the default level if it is bad).
pub fn start_level(world: &mut WorldState, index: usize) -> bool {
    if !world.machine.is(GameState::LevelSelect) {
        return false;
    }
    level::load_level_or_fallback(world, index);
    transition(world, GameState::Play)
}

/// Fresh attempt on the current level. From Win or Paused this also
/// returns to Play.
pub fn restart_level(world: &mut WorldState) {
    world.reset_level_entities();
    world.events.push(GameEvent::LevelRestarted);
    debug!("level {} restarted", world.current_level + 1);
    if matches!(world.machine.state(), GameState::Win | GameState::Paused) {
        transition(world, GameState::Play);
    }
}

/// Win → Play on the following level. False after the last level.
pub fn next_level(world: &mut WorldState) -> bool {
    if !world.machine.is(GameState::Win) {
        return false;
    }
    let next = world.current_level + 1;
    if next >= world.level_count() {
        return false;
    }
    level::load_level_or_fallback(world, next);
    transition(world, GameState::Play)
}

pub fn pause(world: &mut WorldState) -> bool {
    world.machine.is(GameState::Play) && transition(world, GameState::Paused)
}

/// Paused → Play. A failed Challenge attempt is restarted instead of
/// continued.
pub fn resume(world: &mut WorldState) -> bool {
    if !world.machine.is(GameState::Paused) {
        return false;
    }
    if world.failure.is_some() {
        restart_level(world);
        return true;
    }
    if !transition(world, GameState::Play) {
        return false;
    }
    // A move that finished while paused may have solved the level.
    check_win(world);
    true
}

/// Drop all tweens (terminal resize). An in-flight move is forgotten
/// together with its undo record. Returns how many tweens were dropped.
///
/// Only the board is rolled back: the redo entries the move discarded stay
/// gone, and a timer the move started keeps running.
pub fn cancel_motion(world: &mut WorldState) -> usize {
    let in_flight = world.tweens.has_player_tween();
    let dropped = world.tweens.cancel_all(&mut world.entities);
    if in_flight {
        world.history.pop();
        debug!("in-flight move cancelled");
    }
    dropped
}

// ══════════════════════════════════════════════════════════════
// Settings & queries
// ══════════════════════════════════════════════════════════════

/// Use `mode` with exactly these parameters.
pub fn set_mode(world: &mut WorldState, mode: GameMode) {
    world.mode_kind = mode.kind();
    world.mode_override = Some(mode);
    apply_mode_change(world);
}

/// Use a mode kind with level or config parameters.
pub fn select_mode(world: &mut WorldState, kind: ModeKind) {
    world.mode_kind = kind;
    world.mode_override = None;
    apply_mode_change(world);
}

/// An attempt already under way cannot change rules midstream; it
/// restarts under the new mode.
fn apply_mode_change(world: &mut WorldState) {
    let in_level = matches!(
        world.machine.state(),
        GameState::Play | GameState::Paused | GameState::Win
    );
    let started = world.mode.timer.has_started() || !world.history.is_empty() || world.won;
    if in_level && started {
        restart_level(world);
    } else {
        world.mode.mode = world.resolve_mode();
    }
    info!("mode set to {}", world.mode.mode.kind().label());
}

/// Applies to moves started from now on.
pub fn set_movement_speed(world: &mut WorldState, tier: SpeedTier) {
    world.tier = tier;
    info!("movement speed {} ({} ms)", tier.label(), world.move_duration_ms());
}

pub fn get_stats(world: &WorldState) -> Stats {
    let now = world.now;
    Stats {
        moves: world.mode.move_count,
        pushes: world.mode.push_count,
        elapsed_ms: world.mode.timer.elapsed(now),
        best: world.progress.best_for(world.current_level, world.mode.mode.kind()),
        over_time_goal: world.mode.over_time_goal(now),
        remaining: world.mode.remaining(now),
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::config::GameConfig;
    use crate::domain::grid::GridPos;
    use crate::domain::mode::ChallengeLimits;
    use crate::sim::level::LevelDef;
    use crate::sim::progress::tests::MemoryStore;
    use GameState::*;

    fn world_with(levels: Vec<LevelDef>) -> WorldState {
        let mut w = WorldState::new(&GameConfig::default(), levels);
        for to in [Intro, ModeSelect, LevelSelect] {
            assert!(transition(&mut w, to));
        }
        w
    }

    /// Build a world already playing the given map.
    fn play(rows: &[&str]) -> WorldState {
        let mut w = world_with(vec![LevelDef::from_rows("test", rows)]);
        assert!(start_level(&mut w, 0));
        w.events.clear();
        w
    }

    /// Run the clock far enough for any tween to finish.
    fn settle(w: &mut WorldState) -> Frame {
        let t = w.now + 1_000;
        tick(w, t)
    }

    fn step(w: &mut WorldState, dx: i32, dy: i32) -> Frame {
        assert!(move_player(w, dx, dy), "move ({dx},{dy}) refused");
        settle(w)
    }

    fn challenge(moves_limit: u32, time_limit_ms: u64) -> GameMode {
        GameMode::Challenge(ChallengeLimits { moves_limit, time_limit_ms })
    }

    fn count_won(events: &[GameEvent]) -> usize {
        events.iter().filter(|e| matches!(e, GameEvent::LevelWon { .. })).count()
    }

    #[test]
    fn diagonal_input_is_rejected() {
        let mut w = play(&[
            "#####",
            "#$  #",
            "# @ #",
            "#  .#",
            "#####",
        ]);
        assert!(!move_player(&mut w, -1, -1));
        assert!(!move_player(&mut w, 0, 0));
        assert!(!move_player(&mut w, 2, 0));
        assert!(w.tweens.is_empty());
        assert!(w.history.is_empty());
        assert_eq!(w.entities.player.grid_pos, GridPos::new(2, 2));
        assert_eq!(w.entities.boxes[0].grid_pos, GridPos::new(1, 1));
    }

    #[test]
    fn push_into_open_cell() {
        let mut w = play(&[
            "######",
            "#@$ .#",
            "######",
        ]);
        assert!(move_player(&mut w, 1, 0));
        assert!(w.entities.boxes[0].is_moving);
        assert_eq!(w.entities.player.grid_pos, GridPos::new(1, 1));

        let frame = settle(&mut w);
        assert_eq!(w.entities.boxes[0].grid_pos, GridPos::new(3, 1));
        assert!(!w.entities.boxes[0].on_goal);
        assert_eq!(w.mode.push_count, 1);
        assert_eq!(w.mode.move_count, 1);
        assert_eq!(frame.box_render_pos[0], RenderPos { x: 3.0, y: 1.0 });
        assert!(frame.events.contains(&GameEvent::Cue(SoundCue::Push)));

        let frame = step(&mut w, 1, 0);
        assert!(w.entities.boxes[0].on_goal);
        assert!(frame.events.contains(&GameEvent::Cue(SoundCue::BoxOnGoal)));
    }

    #[test]
    fn wall_blocks_with_cue() {
        let mut w = play(&[
            "#####",
            "#@ .#",
            "#$  #",
            "#####",
        ]);
        assert!(!move_player(&mut w, -1, 0));
        let frame = settle(&mut w);
        assert!(frame.events.contains(&GameEvent::MoveBlocked));
        assert!(frame.events.contains(&GameEvent::Cue(SoundCue::Blocked)));
        // box against the bottom wall
        assert!(!move_player(&mut w, 0, 1));
    }

    #[test]
    fn held_key_against_wall_bumps_once() {
        let mut w = play(&[
            "#####",
            "#@  #",
            "#####",
        ]);
        for _ in 0..5 {
            assert!(!move_player(&mut w, -1, 0));
        }
        let frame = settle(&mut w);
        let bumps = frame.events.iter().filter(|e| **e == GameEvent::MoveBlocked).count();
        assert_eq!(bumps, 1);

        // a new direction, or letting go, reports again
        assert!(!move_player(&mut w, 0, -1));
        release_direction(&mut w);
        assert!(!move_player(&mut w, 0, -1));
        let frame = settle(&mut w);
        let cues = frame.events.iter().filter(|e| **e == GameEvent::Cue(SoundCue::Blocked)).count();
        assert_eq!(cues, 2);

        // a successful step clears the latch too
        step(&mut w, 1, 0);
        step(&mut w, 1, 0);
        assert!(!move_player(&mut w, 1, 0));
        assert!(w.events.contains(&GameEvent::MoveBlocked));
    }

    #[test]
    fn box_cannot_push_box() {
        let mut w = play(&[
            "#######",
            "#@$$ .#",
            "#    .#",
            "#######",
        ]);
        assert!(!move_player(&mut w, 1, 0));
        assert_eq!(w.entities.boxes[0].grid_pos, GridPos::new(2, 1));
    }

    #[test]
    fn input_while_moving_is_swallowed() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        assert!(move_player(&mut w, 1, 0));
        assert!(!move_player(&mut w, 1, 0));
        assert_eq!(w.history.len(), 1);
        assert!(w.events.iter().all(|e| *e != GameEvent::MoveBlocked));
    }

    #[test]
    fn player_commits_when_tween_ends() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        tick(&mut w, 1_000);
        assert!(move_player(&mut w, 1, 0));
        let half = w.move_duration_ms() / 2;
        let frame = tick(&mut w, 1_000 + half);
        assert_eq!(w.entities.player.grid_pos, GridPos::new(1, 1));
        assert!(frame.player_render_pos.x > 1.0 && frame.player_render_pos.x < 2.0);
        assert_eq!(w.mode.move_count, 0);

        let full = w.move_duration_ms();
        let frame = tick(&mut w, 1_000 + full);
        assert_eq!(w.entities.player.grid_pos, GridPos::new(2, 1));
        assert_eq!(frame.player_render_pos, RenderPos { x: 2.0, y: 1.0 });
        assert!(frame.events.contains(&GameEvent::PlayerArrived { at: GridPos::new(2, 1) }));
        assert_eq!(w.mode.move_count, 1);
    }

    #[test]
    fn tick_with_same_now_is_idempotent() {
        let mut w = play(&[
            "######",
            "#@$ .#",
            "######",
        ]);
        assert!(move_player(&mut w, 1, 0));
        let a = tick(&mut w, 50);
        let b = tick(&mut w, 50);
        assert_eq!(a.player_render_pos, b.player_render_pos);
        assert_eq!(a.box_render_pos, b.box_render_pos);
        assert!(b.events.is_empty());
    }

    #[test]
    fn move_then_undo_restores_state() {
        let mut w = play(&[
            "######",
            "#@$ .#",
            "######",
        ]);
        step(&mut w, 1, 0);
        assert!(undo(&mut w));
        assert_eq!(w.entities.player.grid_pos, GridPos::new(1, 1));
        assert_eq!(w.entities.player.render_pos, RenderPos { x: 1.0, y: 1.0 });
        assert_eq!(w.entities.boxes[0].grid_pos, GridPos::new(2, 1));
        assert_eq!(w.mode.move_count, 0);
        // pushes are not taken back
        assert_eq!(w.mode.push_count, 1);
        assert!(!undo(&mut w));
    }

    #[test]
    fn undo_is_gated() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        assert!(!undo(&mut w)); // empty
        assert!(move_player(&mut w, 1, 0));
        assert!(!undo(&mut w)); // moving
        settle(&mut w);
        assert!(pause(&mut w));
        assert!(!undo(&mut w)); // not playing
        assert!(resume(&mut w));
        assert!(undo(&mut w));
    }

    #[test]
    fn redo_reapplies_and_new_move_clears_it() {
        let mut w = play(&[
            "#######",
            "#@$  .#",
            "#     #",
            "#######",
        ]);
        step(&mut w, 1, 0);
        assert!(undo(&mut w));
        assert!(redo(&mut w));
        assert_eq!(w.entities.player.grid_pos, GridPos::new(2, 1));
        assert_eq!(w.entities.boxes[0].grid_pos, GridPos::new(3, 1));
        assert_eq!(w.mode.move_count, 1);
        assert_eq!(w.mode.push_count, 1);
        assert!(!redo(&mut w));

        assert!(undo(&mut w));
        step(&mut w, 0, 1);
        assert_eq!(w.history.redo_len(), 0);
        assert!(!redo(&mut w));
    }

    #[test]
    fn restart_from_win_replays() {
        let mut w = play(&[
            "#####",
            "#@$.#",
            "#   #",
            "#####",
        ]);
        step(&mut w, 1, 0);
        assert_eq!(w.state(), Win);
        restart_level(&mut w);
        assert_eq!(w.state(), Play);
        step(&mut w, 1, 0);
        assert_eq!(w.state(), Win);
        assert!(w.progress.is_completed(0));
    }

    #[test]
    fn challenge_moves_limit_fails_the_attempt() {
        let mut w = play(&[
            "#######",
            "#@    #",
            "#   $.#",
            "#######",
        ]);
        set_mode(&mut w, challenge(5, 600_000));
        let mut last = None;
        for i in 0..5 {
            let dx = if i % 2 == 0 { 1 } else { -1 };
            let frame = step(&mut w, dx, 0);
            if i < 4 {
                assert_eq!(frame.constraint_failure, None);
            }
            last = Some(frame);
        }
        let frame = last.unwrap();
        assert_eq!(frame.constraint_failure, Some(ConstraintFailure::Moves));
        assert!(frame.events.contains(&GameEvent::ConstraintFailed(ConstraintFailure::Moves)));
        assert_eq!(w.state(), Paused);
        assert!(!move_player(&mut w, 1, 0));

        // no auto-retry; resuming starts a fresh attempt
        assert_eq!(settle(&mut w).constraint_failure, Some(ConstraintFailure::Moves));
        assert!(resume(&mut w));
        assert_eq!(w.state(), Play);
        assert_eq!(w.mode.move_count, 0);
        assert_eq!(w.entities.player.grid_pos, GridPos::new(1, 1));
        assert_eq!(settle(&mut w).constraint_failure, None);
    }

    #[test]
    fn challenge_time_limit_is_checked_first() {
        let mut w = play(&[
            "######",
            "#@   #",
            "#$  .#",
            "######",
        ]);
        set_mode(&mut w, challenge(1, 1_000));
        tick(&mut w, 10_000);
        assert!(move_player(&mut w, 1, 0));
        let frame = tick(&mut w, 11_000);
        // moves limit reached too, but time wins the tie
        assert_eq!(frame.constraint_failure, Some(ConstraintFailure::Time));
        assert_eq!(w.state(), Paused);
    }

    #[test]
    fn win_fires_exactly_once() {
        let mut w = play(&[
            "#####",
            "#@$.#",
            "#####",
        ]);
        let frame = step(&mut w, 1, 0);
        assert!(frame.is_won);
        assert_eq!(count_won(&frame.events), 1);
        assert!(frame.events.contains(&GameEvent::StateChanged { from: Play, to: Win }));
        assert!(frame.events.contains(&GameEvent::Cue(SoundCue::Victory)));
        assert_eq!(w.state(), Win);

        assert!(!check_win(&mut w));
        let again = settle(&mut w);
        assert!(again.is_won);
        assert_eq!(count_won(&again.events), 0);
        // timer ran from the move (t=0) to the winning tick (t=1000)
        assert_eq!(
            w.progress.best_for(0, ModeKind::Normal),
            Some(BestRecord { moves: 1, pushes: 1, time_ms: 1_000 })
        );
    }

    #[test]
    fn win_is_set_equality() {
        let mut w = play(&[
            "#######",
            "#@$ . #",
            "#   . #",
            "#######",
        ]);
        // one box, two goals: can never be won
        step(&mut w, 1, 0);
        step(&mut w, 1, 0);
        assert!(w.entities.boxes[0].on_goal);
        assert!(!is_won(&w));
        assert_eq!(w.state(), Play);
    }

    #[test]
    fn failed_save_does_not_block_win() {
        let mut w = world_with(vec![LevelDef::from_rows("t", &["#####", "#@$.#", "#####"])])
            .with_store(Box::new(MemoryStore { fail: true, ..Default::default() }));
        assert!(start_level(&mut w, 0));
        let frame = step(&mut w, 1, 0);
        assert_eq!(w.state(), Win);
        assert!(frame
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::ProgressSaveFailed(_))));
        assert!(w.progress.is_completed(0));
    }

    #[test]
    fn timer_starts_on_first_move_and_pauses() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        tick(&mut w, 5_000);
        assert_eq!(get_stats(&w).elapsed_ms, 0);
        assert!(move_player(&mut w, 1, 0));
        assert!(w.events.contains(&GameEvent::TimerStarted));
        tick(&mut w, 6_000);
        assert_eq!(get_stats(&w).elapsed_ms, 1_000);

        assert!(pause(&mut w));
        tick(&mut w, 9_000);
        assert_eq!(get_stats(&w).elapsed_ms, 1_000);
        assert!(resume(&mut w));
        tick(&mut w, 9_500);
        assert_eq!(get_stats(&w).elapsed_ms, 1_500);
    }

    #[test]
    fn move_finishing_while_paused_wins_on_resume() {
        let mut w = play(&[
            "#####",
            "#@$.#",
            "#####",
        ]);
        assert!(move_player(&mut w, 1, 0));
        tick(&mut w, 10);
        assert!(pause(&mut w));
        let paused = settle(&mut w);
        assert_eq!(w.state(), Paused);
        assert_eq!(count_won(&paused.events), 0);
        // counters keep following the tween that was already in flight
        assert_eq!(w.mode.move_count, 1);
        assert_eq!(w.mode.push_count, 1);

        assert!(resume(&mut w));
        assert_eq!(w.state(), Win);
        let frame = settle(&mut w);
        assert_eq!(count_won(&frame.events), 1);
        assert!(frame.is_won);
        let again = settle(&mut w);
        assert_eq!(count_won(&again.events), 0);
    }

    #[test]
    fn resume_keeps_an_unstarted_timer_lazy() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        assert!(pause(&mut w));
        assert!(resume(&mut w));
        tick(&mut w, 4_000);
        assert_eq!(get_stats(&w).elapsed_ms, 0);
        assert!(!w.mode.timer.is_running());
    }

    #[test]
    fn cancel_motion_forgets_in_flight_move() {
        let mut w = play(&[
            "######",
            "#@$ .#",
            "######",
        ]);
        assert!(move_player(&mut w, 1, 0));
        tick(&mut w, 40);
        assert_eq!(cancel_motion(&mut w), 2);
        assert!(!w.entities.any_moving());
        assert_eq!(w.entities.player.grid_pos, GridPos::new(1, 1));
        assert_eq!(w.entities.boxes[0].render_pos, RenderPos { x: 2.0, y: 1.0 });
        assert!(w.history.is_empty());
        settle(&mut w);
        assert_eq!(w.mode.move_count, 0);
        assert_eq!(w.mode.push_count, 0);
        assert!(w.mode.timer.is_running());
    }

    #[test]
    fn cancelled_move_does_not_bring_redo_back() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        step(&mut w, 1, 0);
        assert!(undo(&mut w));
        assert_eq!(w.history.redo_len(), 1);
        assert!(move_player(&mut w, 1, 0));
        assert_eq!(w.history.redo_len(), 0);
        cancel_motion(&mut w);
        assert!(w.history.is_empty());
        assert_eq!(w.history.redo_len(), 0);
        assert!(!redo(&mut w));
    }

    #[test]
    fn boxes_never_overlap_and_player_never_on_a_box() {
        let mut w = play(&[
            "########",
            "#      #",
            "# $$ . #",
            "#  @ . #",
            "#  $ . #",
            "#      #",
            "########",
        ]);
        let moves = [(0, -1), (-1, 0), (0, -1), (1, 0), (1, 0), (0, 1), (0, 1), (-1, 0), (0, -1), (1, 0)];
        for round in 0..6 {
            for (i, &(dx, dy)) in moves.iter().enumerate() {
                if (i + round) % 4 == 3 {
                    undo(&mut w);
                }
                move_player(&mut w, dx, dy);
                settle(&mut w);
                if w.state() != Play {
                    return;
                }

                let cells: HashSet<GridPos> = w.entities.boxes.iter().map(|b| b.grid_pos).collect();
                assert_eq!(cells.len(), w.entities.boxes.len());
                assert!(!cells.contains(&w.entities.player.grid_pos));
                for b in &w.entities.boxes {
                    assert!(w.grid.is_walkable(b.grid_pos.x, b.grid_pos.y));
                    assert_eq!(b.on_goal, w.grid.has_goal(b.grid_pos.x, b.grid_pos.y));
                }
            }
        }
    }

    #[test]
    fn next_level_advances_until_the_last() {
        let lvl = LevelDef::from_rows("t", &["#####", "#@$.#", "#####"]);
        let mut w = world_with(vec![lvl.clone(), lvl]);
        assert!(start_level(&mut w, 0));
        step(&mut w, 1, 0);
        assert!(next_level(&mut w));
        assert_eq!(w.current_level, 1);
        assert_eq!(w.state(), Play);
        assert_eq!(w.mode.move_count, 0);
        step(&mut w, 1, 0);
        assert!(!next_level(&mut w));
        assert!(transition(&mut w, ModeSelect));
    }

    #[test]
    fn malformed_level_falls_back_to_default() {
        let broken = LevelDef { width: 3, height: 1, floor: Some(vec![2, 3, 2]), ..Default::default() };
        let mut w = world_with(vec![broken]);
        assert!(start_level(&mut w, 0));
        let frame = settle(&mut w);
        assert!(frame
            .events
            .iter()
            .any(|e| matches!(e, GameEvent::LevelFallback { index: 0, .. })));
        assert_eq!(w.level_name, "First Push");
        assert_eq!(w.entities.boxes.len(), 1);
    }

    #[test]
    fn fallback_win_is_not_credited() {
        let good = LevelDef::from_rows("good", &["#####", "#@$.#", "#####"]);
        let broken = LevelDef { width: 3, height: 1, floor: Some(vec![2, 3, 2]), ..Default::default() };
        let mut w = world_with(vec![good, broken])
            .with_store(Box::new(MemoryStore { fail: true, ..Default::default() }));
        assert!(start_level(&mut w, 1));
        assert!(w.is_fallback);
        assert_eq!(w.current_level, 1);

        // First Push: one push to the right solves it
        let frame = step(&mut w, 1, 0);
        assert_eq!(w.state(), Win);
        assert_eq!(count_won(&frame.events), 1);
        assert!(!w.progress.is_completed(1));
        assert_eq!(w.progress.best_for(1, ModeKind::Normal), None);
        // nothing was written, so the failing store never complained
        assert!(!frame.events.iter().any(|e| matches!(e, GameEvent::ProgressSaveFailed(_))));
    }

    #[test]
    fn speed_tier_sets_tween_length() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        set_movement_speed(&mut w, SpeedTier::Fast);
        assert!(move_player(&mut w, 1, 0));
        let fast = w.speed.fast_ms;
        tick(&mut w, fast - 1);
        assert!(w.entities.player.is_moving);
        tick(&mut w, fast);
        assert!(!w.entities.player.is_moving);
    }

    #[test]
    fn time_attack_goal_is_informational() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        set_mode(&mut w, GameMode::TimeAttack { time_goal_ms: 500 });
        step(&mut w, 1, 0);
        let stats = get_stats(&w);
        assert!(stats.over_time_goal);
        assert_eq!(w.state(), Play);
        assert_eq!(stats.remaining, None);
    }

    #[test]
    fn changing_mode_mid_attempt_restarts() {
        let mut w = play(&[
            "######",
            "#@   #",
            "######",
        ]);
        step(&mut w, 1, 0);
        select_mode(&mut w, ModeKind::Challenge);
        assert_eq!(w.mode.move_count, 0);
        assert_eq!(w.entities.player.grid_pos, GridPos::new(1, 1));
        assert_eq!(w.mode.mode.kind(), ModeKind::Challenge);
    }
}

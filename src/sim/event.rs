/// Events emitted by the core during input handling and ticks.
/// The presentation layer consumes these for sound and messages;
/// the core itself never performs I/O for them.

use crate::domain::grid::GridPos;
use crate::domain::mode::ConstraintFailure;
use crate::sim::state::GameState;

/// Abstract sound cue. The sound engine decides what each one sounds like.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SoundCue {
    Step,
    Push,
    Blocked,
    Undo,
    BoxOnGoal,
    Victory,
    Fail,
    Pause,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// A move was accepted and its tweens started.
    MoveStarted { to: GridPos, push: bool },
    /// A move was refused (wall, box against wall/box).
    MoveBlocked,
    /// The player's tween finished.
    PlayerArrived { at: GridPos },
    /// A box's tween finished.
    BoxArrived { id: usize, at: GridPos, on_goal: bool },
    Undone,
    Redone,
    /// The mode timer started on the first move of an attempt.
    TimerStarted,
    LevelLoaded { index: usize },
    LevelRestarted,
    /// The level on disk was bad; the default level was loaded instead.
    LevelFallback { index: usize, reason: String },
    LevelWon { index: usize, moves: u32, pushes: u32, time_ms: u64, new_best: bool },
    ConstraintFailed(ConstraintFailure),
    StateChanged { from: GameState, to: GameState },
    ProgressSaveFailed(String),
    Cue(SoundCue),
}

/// Top-level session state machine.
///
/// ```text
///  Loading ──▶ Intro ──▶ ModeSelect ──▶ LevelSelect ──▶ Play ──▶ Win
///               │  ▲        │  ▲                         │ ▲     │
///               ▼  │        └──┘ (back)                  ▼ │     ├──▶ Play (next / replay)
///              Editor                                   Paused   └──▶ ModeSelect
///                                                        ├──▶ Intro
///                                                        └──▶ LevelSelect
/// ```
///
/// Only the edges above are legal. Anything else is rejected with
/// [`InvalidTransitionError`], logged, and leaves the state unchanged.
///
/// The machine performs no I/O. Entering or leaving a state yields
/// [`StateCommand`]s that the world and the presentation layer execute.

use log::{debug, warn};
use thiserror::Error;

use super::event::SoundCue;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum GameState {
    Loading,
    Intro,
    ModeSelect,
    LevelSelect,
    Play,
    Win,
    Paused,
    Editor,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("illegal state transition {from:?} -> {to:?}")]
pub struct InvalidTransitionError {
    pub from: GameState,
    pub to: GameState,
}

/// Side effects requested by a transition.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StateCommand {
    /// Freeze the mode timer (leaving Play).
    StopTimer,
    /// Resume a timer that was running before a pause. A level whose timer
    /// never started stays lazy.
    ResumeTimer,
    PlayCue(SoundCue),
    /// Push the latest progress to the progress store.
    SyncProgress,
}

/// The legal transition table.
pub fn is_legal(from: GameState, to: GameState) -> bool {
    use GameState::*;
    matches!(
        (from, to),
        (Loading, Intro)
            | (Intro, ModeSelect)
            | (Intro, Editor)
            | (ModeSelect, LevelSelect)
            | (ModeSelect, Intro)
            | (LevelSelect, Play)
            | (Play, Win)
            | (Play, Paused)
            | (Win, Play)
            | (Win, ModeSelect)
            | (Paused, Play)
            | (Paused, Intro)
            | (Paused, LevelSelect)
            | (Editor, Intro)
    )
}

#[derive(Clone, Debug)]
pub struct StateMachine {
    state: GameState,
}

impl StateMachine {
    pub fn new() -> Self {
        StateMachine { state: GameState::Loading }
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is(&self, state: GameState) -> bool {
        self.state == state
    }

    /// Move to `to` if the edge is legal, returning the exit/entry commands.
    pub fn transition(&mut self, to: GameState) -> Result<Vec<StateCommand>, InvalidTransitionError> {
        let from = self.state;
        if !is_legal(from, to) {
            let err = InvalidTransitionError { from, to };
            warn!("{err}");
            return Err(err);
        }

        let mut commands = vec![];
        exit_commands(from, &mut commands);
        entry_commands(from, to, &mut commands);

        self.state = to;
        debug!("state {from:?} -> {to:?} ({} commands)", commands.len());
        Ok(commands)
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

fn exit_commands(from: GameState, out: &mut Vec<StateCommand>) {
    if from == GameState::Play {
        out.push(StateCommand::StopTimer);
    }
}

fn entry_commands(from: GameState, to: GameState, out: &mut Vec<StateCommand>) {
    match to {
        GameState::Win => {
            out.push(StateCommand::PlayCue(SoundCue::Victory));
            out.push(StateCommand::SyncProgress);
        }
        GameState::Play if from == GameState::Paused => {
            out.push(StateCommand::ResumeTimer);
        }
        GameState::Paused => out.push(StateCommand::PlayCue(SoundCue::Pause)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use GameState::*;

    const ALL: [GameState; 8] = [Loading, Intro, ModeSelect, LevelSelect, Play, Win, Paused, Editor];

    #[test]
    fn starts_in_loading() {
        assert_eq!(StateMachine::new().state(), Loading);
    }

    #[test]
    fn table_has_exactly_the_listed_edges() {
        let legal: usize = ALL
            .iter()
            .map(|&f| ALL.iter().filter(|&&t| is_legal(f, t)).count())
            .sum();
        assert_eq!(legal, 14);
        assert!(!is_legal(Loading, Play));
        assert!(!is_legal(Play, Intro));
        assert!(!is_legal(Win, Paused));
        assert!(!is_legal(Play, Play));
    }

    #[test]
    fn illegal_edge_leaves_state_unchanged() {
        let mut sm = StateMachine::new();
        let err = sm.transition(Play).unwrap_err();
        assert_eq!(err, InvalidTransitionError { from: Loading, to: Play });
        assert_eq!(sm.state(), Loading);
    }

    #[test]
    fn full_path_to_play() {
        let mut sm = StateMachine::new();
        for to in [Intro, ModeSelect, LevelSelect, Play] {
            sm.transition(to).unwrap();
        }
        assert_eq!(sm.state(), Play);
    }

    #[test]
    fn entering_play_does_not_start_timer() {
        let mut sm = StateMachine::new();
        for to in [Intro, ModeSelect, LevelSelect] {
            sm.transition(to).unwrap();
        }
        let cmds = sm.transition(Play).unwrap();
        assert!(cmds.is_empty());
    }

    #[test]
    fn leaving_play_stops_timer() {
        let mut sm = StateMachine::new();
        for to in [Intro, ModeSelect, LevelSelect, Play] {
            sm.transition(to).unwrap();
        }
        let cmds = sm.transition(Win).unwrap();
        assert_eq!(cmds[0], StateCommand::StopTimer);
        assert!(cmds.contains(&StateCommand::PlayCue(SoundCue::Victory)));
        assert!(cmds.contains(&StateCommand::SyncProgress));
    }

    #[test]
    fn resume_from_pause_resumes_timer() {
        let mut sm = StateMachine::new();
        for to in [Intro, ModeSelect, LevelSelect, Play, Paused] {
            sm.transition(to).unwrap();
        }
        assert_eq!(sm.transition(Play).unwrap(), vec![StateCommand::ResumeTimer]);
    }
}

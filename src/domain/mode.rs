/// Game modes and their per-frame constraints.
///
///   - Normal     : no limits; best records only.
///   - TimeAttack : `time_goal` is informational (HUD colouring), never fails.
///   - Challenge  : `moves_limit` and `time_limit` are enforced; reaching
///                   either ends the attempt.
///
/// Time is measured by [`ModeTimer`], a pausable monotonic stopwatch that is
/// started lazily by the first accepted move of a level.

use serde::{Deserialize, Serialize};

/// Mode without its parameters (menus, config, progress keys).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeKind {
    Normal,
    TimeAttack,
    Challenge,
}

impl ModeKind {
    pub const ALL: [ModeKind; 3] = [ModeKind::Normal, ModeKind::TimeAttack, ModeKind::Challenge];

    pub fn from_name(s: &str) -> Option<ModeKind> {
        match s.to_lowercase().replace(['-', ' '], "_").as_str() {
            "normal" => Some(ModeKind::Normal),
            "time_attack" | "timeattack" => Some(ModeKind::TimeAttack),
            "challenge" => Some(ModeKind::Challenge),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModeKind::Normal => "Normal",
            ModeKind::TimeAttack => "Time Attack",
            ModeKind::Challenge => "Challenge",
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            ModeKind::Normal => "normal",
            ModeKind::TimeAttack => "time_attack",
            ModeKind::Challenge => "challenge",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChallengeLimits {
    pub moves_limit: u32,
    pub time_limit_ms: u64,
}

/// Mode with the parameters it needs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GameMode {
    Normal,
    TimeAttack { time_goal_ms: u64 },
    Challenge(ChallengeLimits),
}

impl GameMode {
    pub fn kind(&self) -> ModeKind {
        match self {
            GameMode::Normal => ModeKind::Normal,
            GameMode::TimeAttack { .. } => ModeKind::TimeAttack,
            GameMode::Challenge(_) => ModeKind::Challenge,
        }
    }
}

/// Reason a Challenge attempt ended.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ConstraintFailure {
    Time,
    Moves,
}

impl ConstraintFailure {
    pub fn label(self) -> &'static str {
        match self {
            ConstraintFailure::Time => "time",
            ConstraintFailure::Moves => "moves",
        }
    }
}

/// Pausable stopwatch in milliseconds.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModeTimer {
    accumulated_ms: u64,
    running_since: Option<u64>,
    started: bool,
}

impl ModeTimer {
    /// Start (or resume) at `now`. No-op when already running.
    pub fn start(&mut self, now: u64) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
            self.started = true;
        }
    }

    /// Freeze at `now`. No-op when stopped.
    pub fn stop(&mut self, now: u64) {
        if let Some(since) = self.running_since.take() {
            self.accumulated_ms += now.saturating_sub(since);
        }
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    /// Has this timer ever run since the last reset?
    pub fn has_started(&self) -> bool {
        self.started
    }

    pub fn elapsed(&self, now: u64) -> u64 {
        self.accumulated_ms + self.running_since.map_or(0, |since| now.saturating_sub(since))
    }

    pub fn reset(&mut self) {
        *self = ModeTimer::default();
    }
}

/// Counters and timer for the current attempt.
#[derive(Clone, Debug)]
pub struct ModeState {
    pub mode: GameMode,
    pub timer: ModeTimer,
    pub move_count: u32,
    pub push_count: u32,
}

impl ModeState {
    pub fn new(mode: GameMode) -> Self {
        ModeState { mode, timer: ModeTimer::default(), move_count: 0, push_count: 0 }
    }

    /// Fresh attempt: counters and timer back to zero, mode kept.
    pub fn reset(&mut self) {
        self.timer.reset();
        self.move_count = 0;
        self.push_count = 0;
    }

    /// Challenge check. Time is checked before moves.
    pub fn evaluate(&self, now: u64) -> Option<ConstraintFailure> {
        match self.mode {
            GameMode::Normal | GameMode::TimeAttack { .. } => None,
            GameMode::Challenge(limits) => {
                if self.timer.elapsed(now) >= limits.time_limit_ms {
                    Some(ConstraintFailure::Time)
                } else if self.move_count >= limits.moves_limit {
                    Some(ConstraintFailure::Moves)
                } else {
                    None
                }
            }
        }
    }

    /// TimeAttack only: has the goal time been exceeded?
    pub fn over_time_goal(&self, now: u64) -> bool {
        match self.mode {
            GameMode::TimeAttack { time_goal_ms } => self.timer.elapsed(now) > time_goal_ms,
            _ => false,
        }
    }

    /// Remaining budget for HUD display (Challenge only).
    pub fn remaining(&self, now: u64) -> Option<(u32, u64)> {
        match self.mode {
            GameMode::Challenge(limits) => Some((
                limits.moves_limit.saturating_sub(self.move_count),
                limits.time_limit_ms.saturating_sub(self.timer.elapsed(now)),
            )),
            _ => None,
        }
    }
}

/// Best result for one level in one mode. Each field is minimized on its
/// own, so the three values may come from different runs.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct BestRecord {
    pub moves: u32,
    pub pushes: u32,
    pub time_ms: u64,
}

impl BestRecord {
    /// Fold a finished run into an optional prior best. Returns the new
    /// record and whether any field improved.
    pub fn merge(prior: Option<BestRecord>, run: BestRecord) -> (BestRecord, bool) {
        match prior {
            None => (run, true),
            Some(p) => {
                let merged = BestRecord {
                    moves: p.moves.min(run.moves),
                    pushes: p.pushes.min(run.pushes),
                    time_ms: p.time_ms.min(run.time_ms),
                };
                (merged, merged != p)
            }
        }
    }
}

/// Format milliseconds as `m:ss.t` for HUD and menus.
pub fn format_ms(ms: u64) -> String {
    let tenths = (ms / 100) % 10;
    let secs = ms / 1000;
    format!("{}:{:02}.{}", secs / 60, secs % 60, tenths)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(moves: u32, time_ms: u64) -> ModeState {
        ModeState::new(GameMode::Challenge(ChallengeLimits { moves_limit: moves, time_limit_ms: time_ms }))
    }

    #[test]
    fn timer_is_lazy_and_pausable() {
        let mut t = ModeTimer::default();
        assert_eq!(t.elapsed(5_000), 0);
        assert!(!t.has_started());
        t.start(1_000);
        assert_eq!(t.elapsed(1_500), 500);
        t.stop(2_000);
        assert_eq!(t.elapsed(9_000), 1_000); // frozen while stopped
        t.start(10_000);
        assert_eq!(t.elapsed(10_250), 1_250);
        t.start(10_100); // already running: ignored
        assert_eq!(t.elapsed(10_250), 1_250);
        assert!(t.has_started());
        t.reset();
        assert!(!t.has_started());
        assert_eq!(t.elapsed(20_000), 0);
    }

    #[test]
    fn normal_never_fails() {
        let mut s = ModeState::new(GameMode::Normal);
        s.move_count = 10_000;
        s.timer.start(0);
        assert_eq!(s.evaluate(u64::MAX / 2), None);
    }

    #[test]
    fn time_attack_is_informational() {
        let mut s = ModeState::new(GameMode::TimeAttack { time_goal_ms: 1_000 });
        s.timer.start(0);
        assert!(!s.over_time_goal(1_000));
        assert!(s.over_time_goal(1_001));
        assert_eq!(s.evaluate(50_000), None);
    }

    #[test]
    fn challenge_fails_on_moves() {
        let mut s = challenge(5, 60_000);
        s.move_count = 4;
        assert_eq!(s.evaluate(0), None);
        s.move_count = 5;
        assert_eq!(s.evaluate(0), Some(ConstraintFailure::Moves));
    }

    #[test]
    fn challenge_fails_on_time_first() {
        let mut s = challenge(5, 1_000);
        s.move_count = 5;
        s.timer.start(0);
        assert_eq!(s.evaluate(1_000), Some(ConstraintFailure::Time));
        assert_eq!(s.remaining(500), Some((0, 500)));
    }

    #[test]
    fn best_record_fields_minimize_independently() {
        let first = BestRecord { moves: 20, pushes: 5, time_ms: 9_000 };
        let (b, improved) = BestRecord::merge(None, first);
        assert!(improved);
        let (b, improved) = BestRecord::merge(Some(b), BestRecord { moves: 18, pushes: 7, time_ms: 12_000 });
        assert!(improved);
        assert_eq!(b, BestRecord { moves: 18, pushes: 5, time_ms: 9_000 });
        let (_, improved) = BestRecord::merge(Some(b), BestRecord { moves: 30, pushes: 9, time_ms: 20_000 });
        assert!(!improved);
    }

    #[test]
    fn mode_names_parse() {
        assert_eq!(ModeKind::from_name("Time-Attack"), Some(ModeKind::TimeAttack));
        assert_eq!(ModeKind::from_name("challenge"), Some(ModeKind::Challenge));
        assert_eq!(ModeKind::from_name("zen"), None);
    }

    #[test]
    fn formats_time() {
        assert_eq!(format_ms(0), "0:00.0");
        assert_eq!(format_ms(83_450), "1:23.4");
    }
}

/// WorldState: the single context object of a running session.
///
/// Every component (grid, entities, tweens, undo history, mode counters,
/// session state machine, progress) is owned here and reached through
/// `&mut WorldState`. There are no globals; the host owns exactly one.
///
/// ## Level layers
///
///   - `grid`           : immutable floor + goals for the loaded level
///   - `initial_spawn` / `initial_boxes`: placement used by restart
///   - `entities`       : live player and box positions
///
/// ## Mode selection
///
/// The menu picks a [`ModeKind`]; its parameters come from the level file
/// when present, else from `RulesConfig`. `set_mode` with a full
/// [`GameMode`] overrides both until another kind is chosen.

use log::warn;

use crate::config::{GameConfig, RulesConfig, SpeedConfig, SpeedTier};
use crate::domain::entity::{Direction, EntityRegistry};
use crate::domain::grid::{GridPos, LevelGrid, ParsedLevel};
use crate::domain::mode::{ChallengeLimits, ConstraintFailure, GameMode, ModeKind, ModeState};
use crate::sim::event::GameEvent;
use crate::sim::level::{LevelDef, LevelParams};
use crate::sim::progress::{Progress, ProgressStore};
use crate::sim::state::{GameState, StateMachine};
use crate::sim::tween::TweenSet;
use crate::sim::undo::UndoHistory;

pub struct WorldState {
    // ── Level ──
    pub grid: LevelGrid,
    pub levels: Vec<LevelDef>,
    pub current_level: usize,
    pub level_name: String,
    pub level_params: LevelParams,
    /// The built-in level stands in for a broken one; its wins are not
    /// credited to the slot it occupies.
    pub is_fallback: bool,
    pub(crate) initial_spawn: GridPos,
    pub(crate) initial_boxes: Vec<GridPos>,

    // ── Entities & motion ──
    pub entities: EntityRegistry,
    pub tweens: TweenSet,
    pub history: UndoHistory,
    /// Direction of the last refused move, until a move succeeds or the
    /// key is let go.
    pub last_blocked: Option<Direction>,

    // ── Rules ──
    pub mode: ModeState,
    pub mode_kind: ModeKind,
    pub mode_override: Option<GameMode>,
    pub rules: RulesConfig,
    /// Set when a Challenge attempt fails; cleared by restart.
    pub failure: Option<ConstraintFailure>,
    /// Win latch for the current attempt.
    pub won: bool,

    // ── Session ──
    pub machine: StateMachine,
    /// Last time seen by `tick`, in ms. New tweens start here.
    pub now: u64,
    /// Pending events, drained into the next `Frame`.
    pub events: Vec<GameEvent>,

    // ── Speed ──
    pub speed: SpeedConfig,
    pub tier: SpeedTier,

    // ── Progress ──
    pub progress: Progress,
    pub(crate) store: Option<Box<dyn ProgressStore>>,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
    pub mode_cursor: usize,
    pub select_cursor: usize,
    pub select_scroll: usize,
}

// ── Construction ──

impl WorldState {
    pub fn new(config: &GameConfig, levels: Vec<LevelDef>) -> Self {
        let (grid, spawn) = LevelGrid::placeholder();
        let entities = EntityRegistry::new(spawn, &[], &grid);
        let mode_kind = config.rules.default_mode;
        let mut world = WorldState {
            grid,
            levels,
            current_level: 0,
            level_name: String::new(),
            level_params: LevelParams::default(),
            is_fallback: false,
            initial_spawn: spawn,
            initial_boxes: vec![],
            entities,
            tweens: TweenSet::new(),
            history: UndoHistory::new(config.rules.undo_capacity),
            last_blocked: None,
            mode: ModeState::new(GameMode::Normal),
            mode_kind,
            mode_override: None,
            rules: config.rules.clone(),
            failure: None,
            won: false,
            machine: StateMachine::new(),
            now: 0,
            events: vec![],
            speed: config.speed.clone(),
            tier: config.speed.tier,
            progress: Progress::default(),
            store: None,
            message: String::new(),
            message_timer: 0,
            mode_cursor: ModeKind::ALL.iter().position(|&k| k == mode_kind).unwrap_or(0),
            select_cursor: 0,
            select_scroll: 0,
        };
        world.mode.mode = world.resolve_mode();
        world
    }

    /// Attach a progress store and load from it. A store that fails to
    /// load is still kept for saving; play starts with empty progress.
    pub fn with_store(mut self, mut store: Box<dyn ProgressStore>) -> Self {
        match store.load_progress() {
            Ok(p) => self.progress = p,
            Err(e) => warn!("could not load progress: {e}"),
        }
        self.store = Some(store);
        self
    }

    pub fn set_message(&mut self, msg: &str, duration: u32) {
        self.message = msg.to_string();
        self.message_timer = duration;
    }
}

// ── Queries ──

impl WorldState {
    pub fn state(&self) -> GameState {
        self.machine.state()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Tween length for the current speed tier.
    pub fn move_duration_ms(&self) -> u64 {
        self.speed.duration_ms(self.tier)
    }

    /// Mode for the current level: explicit override, else the selected
    /// kind with level parameters, else config defaults.
    pub fn resolve_mode(&self) -> GameMode {
        if let Some(mode) = self.mode_override {
            if mode.kind() == self.mode_kind {
                return mode;
            }
        }
        match self.mode_kind {
            ModeKind::Normal => GameMode::Normal,
            ModeKind::TimeAttack => GameMode::TimeAttack {
                time_goal_ms: self.level_params.time_goal_ms.unwrap_or(self.rules.time_goal_ms),
            },
            ModeKind::Challenge => GameMode::Challenge(self.level_params.challenge.unwrap_or(
                ChallengeLimits {
                    moves_limit: self.rules.challenge_moves,
                    time_limit_ms: self.rules.challenge_time_ms,
                },
            )),
        }
    }
}

// ── Level installation ──

impl WorldState {
    /// Replace the running level. Tweens, history, counters and the
    /// win/failure latches all start fresh.
    pub(crate) fn install_level(&mut self, index: usize, def: &LevelDef, parsed: ParsedLevel) {
        self.tweens = TweenSet::new();
        self.entities = EntityRegistry::new(parsed.spawn, &parsed.boxes, &parsed.grid);
        self.initial_spawn = parsed.spawn;
        self.initial_boxes = parsed.boxes;
        self.grid = parsed.grid;
        self.current_level = index;
        self.level_name = def.display_name(index);
        self.level_params = def.params();
        self.is_fallback = false;
        self.reset_attempt();
    }

    /// Put entities back on their initial cells and start a fresh attempt.
    pub(crate) fn reset_level_entities(&mut self) {
        self.tweens = TweenSet::new();
        self.entities = EntityRegistry::new(self.initial_spawn, &self.initial_boxes, &self.grid);
        self.reset_attempt();
    }

    fn reset_attempt(&mut self) {
        self.history.clear();
        self.last_blocked = None;
        self.mode.mode = self.resolve_mode();
        self.mode.reset();
        self.failure = None;
        self.won = false;
    }
}

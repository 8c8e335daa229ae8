/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to defaults if the file is missing or incomplete.
///
/// ```toml
/// [speed]
/// frame_ms = 16
/// tier = "normal"          # slow | normal | fast
/// slow_ms = 220
/// normal_ms = 140
/// fast_ms = 80
///
/// [general]
/// levels_file = "levels.json"
/// progress_file = "progress.json"
/// undo_capacity = 100
/// default_mode = "normal"  # normal | time_attack | challenge
/// time_goal_secs = 60
/// challenge_moves = 200
/// challenge_time_secs = 180
///
/// [gamepad]
/// undo = ["B"]
/// ```

use log::warn;
use serde::Deserialize;
use std::path::PathBuf;

use crate::domain::mode::ModeKind;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub speed: SpeedConfig,
    pub gamepad: GamepadConfig,
    pub rules: RulesConfig,
    pub levels_file: PathBuf,
    pub progress_file: PathBuf,
}

/// Movement speed tier. Each tier maps to a tween duration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpeedTier {
    Slow,
    Normal,
    Fast,
}

impl SpeedTier {
    fn from_name(s: &str) -> Option<SpeedTier> {
        match s.to_lowercase().as_str() {
            "slow" => Some(SpeedTier::Slow),
            "normal" | "medium" => Some(SpeedTier::Normal),
            "fast" => Some(SpeedTier::Fast),
            _ => None,
        }
    }

    /// Cycle Slow → Normal → Fast → Slow (host hotkey).
    pub fn next(self) -> SpeedTier {
        match self {
            SpeedTier::Slow => SpeedTier::Normal,
            SpeedTier::Normal => SpeedTier::Fast,
            SpeedTier::Fast => SpeedTier::Slow,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SpeedTier::Slow => "slow",
            SpeedTier::Normal => "normal",
            SpeedTier::Fast => "fast",
        }
    }
}

#[derive(Clone, Debug)]
pub struct SpeedConfig {
    pub frame_ms: u64,
    pub tier: SpeedTier,
    pub slow_ms: u64,
    pub normal_ms: u64,
    pub fast_ms: u64,
}

impl SpeedConfig {
    /// Tween duration for a tier, never zero.
    pub fn duration_ms(&self, tier: SpeedTier) -> u64 {
        let ms = match tier {
            SpeedTier::Slow => self.slow_ms,
            SpeedTier::Normal => self.normal_ms,
            SpeedTier::Fast => self.fast_ms,
        };
        ms.max(1)
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        SpeedConfig {
            frame_ms: default_frame_ms(),
            tier: SpeedTier::Normal,
            slow_ms: default_slow_ms(),
            normal_ms: default_normal_ms(),
            fast_ms: default_fast_ms(),
        }
    }
}

/// Gameplay rules that are tunable without touching level files.
#[derive(Clone, Debug)]
pub struct RulesConfig {
    pub undo_capacity: usize,
    pub default_mode: ModeKind,
    pub time_goal_ms: u64,
    pub challenge_moves: u32,
    pub challenge_time_ms: u64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            undo_capacity: default_undo_capacity(),
            default_mode: ModeKind::Normal,
            time_goal_ms: default_time_goal_secs() * 1000,
            challenge_moves: default_challenge_moves(),
            challenge_time_ms: default_challenge_time_secs() * 1000,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub undo: Vec<String>,
    pub redo: Vec<String>,
    pub confirm: Vec<String>,
    pub cancel: Vec<String>,
    pub restart: Vec<String>,
}

impl Default for GamepadConfig {
    fn default() -> Self {
        GamepadConfig {
            undo: default_undo(),
            redo: default_redo(),
            confirm: default_confirm(),
            cancel: default_cancel(),
            restart: default_restart(),
        }
    }
}

/// Built-in settings with relative file names (no directory lookup).
impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            speed: SpeedConfig::default(),
            gamepad: GamepadConfig::default(),
            rules: RulesConfig::default(),
            levels_file: PathBuf::from(default_levels_file()),
            progress_file: PathBuf::from(default_progress_file()),
        }
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    speed: TomlSpeed,
    #[serde(default)]
    gamepad: TomlGamepad,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlSpeed {
    #[serde(default = "default_frame_ms")]
    frame_ms: u64,
    #[serde(default = "default_tier")]
    tier: String,
    #[serde(default = "default_slow_ms")]
    slow_ms: u64,
    #[serde(default = "default_normal_ms")]
    normal_ms: u64,
    #[serde(default = "default_fast_ms")]
    fast_ms: u64,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_undo")]
    undo: Vec<String>,
    #[serde(default = "default_redo")]
    redo: Vec<String>,
    #[serde(default = "default_confirm")]
    confirm: Vec<String>,
    #[serde(default = "default_cancel")]
    cancel: Vec<String>,
    #[serde(default = "default_restart")]
    restart: Vec<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_levels_file")]
    levels_file: String,
    #[serde(default = "default_progress_file")]
    progress_file: String,
    #[serde(default = "default_undo_capacity")]
    undo_capacity: usize,
    #[serde(default = "default_mode_name")]
    default_mode: String,
    #[serde(default = "default_time_goal_secs")]
    time_goal_secs: u64,
    #[serde(default = "default_challenge_moves")]
    challenge_moves: u32,
    #[serde(default = "default_challenge_time_secs")]
    challenge_time_secs: u64,
}

// ── Defaults ──

fn default_frame_ms() -> u64 { 16 }
fn default_tier() -> String { "normal".into() }
fn default_slow_ms() -> u64 { 220 }
fn default_normal_ms() -> u64 { 140 }
fn default_fast_ms() -> u64 { 80 }

fn default_undo() -> Vec<String> { vec!["B".into(), "L1".into()] }
fn default_redo() -> Vec<String> { vec!["R1".into()] }
fn default_confirm() -> Vec<String> { vec!["A".into(), "Start".into()] }
fn default_cancel() -> Vec<String> { vec!["Select".into()] }
fn default_restart() -> Vec<String> { vec!["Y".into()] }

fn default_levels_file() -> String { "levels.json".into() }
fn default_progress_file() -> String { "progress.json".into() }
fn default_undo_capacity() -> usize { 100 }
fn default_mode_name() -> String { "normal".into() }
fn default_time_goal_secs() -> u64 { 60 }
fn default_challenge_moves() -> u32 { 200 }
fn default_challenge_time_secs() -> u64 { 180 }

impl Default for TomlSpeed {
    fn default() -> Self {
        TomlSpeed {
            frame_ms: default_frame_ms(),
            tier: default_tier(),
            slow_ms: default_slow_ms(),
            normal_ms: default_normal_ms(),
            fast_ms: default_fast_ms(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            undo: default_undo(),
            redo: default_redo(),
            confirm: default_confirm(),
            cancel: default_cancel(),
            restart: default_restart(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            levels_file: default_levels_file(),
            progress_file: default_progress_file(),
            undo_capacity: default_undo_capacity(),
            default_mode: default_mode_name(),
            time_goal_secs: default_time_goal_secs(),
            challenge_moves: default_challenge_moves(),
            challenge_time_secs: default_challenge_time_secs(),
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: exe directory, current working directory, data dirs.
    /// Missing file or missing keys fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::from_toml(toml_cfg, &search_dirs)
    }

    /// Parse config text directly (no file lookup). Used by tests.
    #[cfg(test)]
    fn parse_str(text: &str) -> Self {
        let toml_cfg = toml::from_str::<TomlConfig>(text).unwrap_or_default();
        Self::from_toml(toml_cfg, &[PathBuf::from(".")])
    }

    fn from_toml(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let tier = SpeedTier::from_name(&toml_cfg.speed.tier).unwrap_or_else(|| {
            warn!("unknown speed tier {:?}, using normal", toml_cfg.speed.tier);
            SpeedTier::Normal
        });
        let default_mode = ModeKind::from_name(&toml_cfg.general.default_mode).unwrap_or_else(|| {
            warn!("unknown default mode {:?}, using normal", toml_cfg.general.default_mode);
            ModeKind::Normal
        });

        let levels_file = resolve_path(&toml_cfg.general.levels_file, search_dirs, true);
        let progress_file = resolve_path(&toml_cfg.general.progress_file, search_dirs, false);

        GameConfig {
            speed: SpeedConfig {
                frame_ms: toml_cfg.speed.frame_ms.max(1),
                tier,
                slow_ms: toml_cfg.speed.slow_ms,
                normal_ms: toml_cfg.speed.normal_ms,
                fast_ms: toml_cfg.speed.fast_ms,
            },
            gamepad: GamepadConfig {
                undo: toml_cfg.gamepad.undo,
                redo: toml_cfg.gamepad.redo,
                confirm: toml_cfg.gamepad.confirm,
                cancel: toml_cfg.gamepad.cancel,
                restart: toml_cfg.gamepad.restart,
            },
            rules: RulesConfig {
                undo_capacity: toml_cfg.general.undo_capacity.max(1),
                default_mode,
                time_goal_ms: toml_cfg.general.time_goal_secs.saturating_mul(1000),
                challenge_moves: toml_cfg.general.challenge_moves.max(1),
                challenge_time_ms: toml_cfg.general.challenge_time_secs.max(1).saturating_mul(1000),
            },
            levels_file,
            progress_file,
        }
    }
}

/// Resolve a configured file name. Absolute paths are kept as-is.
/// Relative names are searched in the candidate dirs; when `must_exist` is
/// false (files we write), the first writable-looking dir wins.
fn resolve_path(name: &str, search_dirs: &[PathBuf], must_exist: bool) -> PathBuf {
    let path = PathBuf::from(name);
    if path.is_absolute() {
        return path;
    }
    if let Some(found) = search_dirs.iter().map(|d| d.join(name)).find(|p| p.is_file()) {
        return found;
    }
    if must_exist {
        return path;
    }
    crate::sim::progress::data_dir().join(name)
}

/// Candidate directories to search: exe dir + CWD + data paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable (symlinks resolved)
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/pushbox)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/pushbox");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory
    let sys = PathBuf::from("/usr/share/pushbox");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => match toml::from_str::<TomlConfig>(&text) {
                    Ok(cfg) => return cfg,
                    Err(e) => {
                        warn!("config.toml parse error: {e}; using default settings");
                        return TomlConfig::default();
                    }
                },
                Err(e) => {
                    warn!("could not read {}: {e}", path.display());
                }
            }
        }
    }
    TomlConfig::default()
}

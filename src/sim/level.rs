/// Level library and level loading.
///
/// ## Sources (priority order):
///   1. The configured levels file (`levels.json`, or a text pack)
///   2. Built-in embedded levels
///
/// ## JSON format: an array of levels
///   ```json
///   [ { "name": "First Push", "width": 7, "height": 5,
///       "floor": [...], "goals": [...], "boxes": [...],
///       "timeGoal": 20, "challenge": { "movesLimit": 12, "timeLimit": 40 } } ]
///   ```
///   Layers hold `width * height` ids (see `domain::grid`). Times are seconds.
///
/// ## Text pack format (any other extension):
///   ```
///   # Level Name
///   #######
///   # @$. #
///   #######
///   ---
///   # Next Level
///   ...
///   ```
///   Levels are separated by a line containing only `---`.
///
/// ## Tile legend (text):
///   '#' = Wall     ' ' = Floor      '_' = Void
///   '@' = Player   '+' = Player on goal
///   '$' = Box      '*' = Box on goal    '.' = Goal
///
/// Spaces outside the walls become void (flood fill from the player).

use std::path::Path;

use log::{info, warn};
use serde::Deserialize;

use crate::domain::grid::{LevelFormatError, LevelGrid, LevelWarning, ParsedLevel};
use crate::domain::mode::ChallengeLimits;
use crate::domain::tile::Tile;
use crate::sim::event::GameEvent;
use crate::sim::world::WorldState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeDef {
    pub moves_limit: u32,
    /// Seconds.
    pub time_limit: u64,
}

/// One level as stored. Validation happens when the level is loaded, so a
/// single broken level never takes the rest of the pack down with it.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelDef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub width: usize,
    #[serde(default)]
    pub height: usize,
    #[serde(default)]
    pub floor: Option<Vec<u8>>,
    #[serde(default)]
    pub goals: Option<Vec<u8>>,
    #[serde(default)]
    pub boxes: Option<Vec<u8>>,
    /// Seconds.
    #[serde(default)]
    pub time_goal: Option<u64>,
    #[serde(default)]
    pub challenge: Option<ChallengeDef>,
    /// Why the stored entry could not be read at all. Loading such a
    /// level fails with `LevelFormatError::Parse`.
    #[serde(skip)]
    pub invalid: Option<String>,
}

/// Mode parameters a level may carry, converted to milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelParams {
    pub time_goal_ms: Option<u64>,
    pub challenge: Option<ChallengeLimits>,
}

impl LevelDef {
    pub fn parse(&self) -> Result<ParsedLevel, LevelFormatError> {
        if let Some(reason) = &self.invalid {
            return Err(LevelFormatError::Parse(reason.clone()));
        }
        LevelGrid::from_layers(
            self.width,
            self.height,
            self.floor.as_deref(),
            self.goals.as_deref(),
            self.boxes.as_deref(),
        )
    }

    pub fn params(&self) -> LevelParams {
        LevelParams {
            time_goal_ms: self.time_goal.map(|s| s.saturating_mul(1000)),
            challenge: self.challenge.map(|c| ChallengeLimits {
                moves_limit: c.moves_limit,
                time_limit_ms: c.time_limit.saturating_mul(1000),
            }),
        }
    }

    pub fn display_name(&self, index: usize) -> String {
        if self.name.is_empty() {
            format!("Level {}", index + 1)
        } else {
            self.name.clone()
        }
    }

    /// Build layers from text rows (see legend above).
    pub fn from_rows(name: &str, rows: &[&str]) -> LevelDef {
        let height = rows.len();
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut floor = vec![Tile::VOID_ID; width * height];
        let mut goals = vec![0u8; width * height];
        let mut boxes = vec![0u8; width * height];
        let mut spawn = None;

        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let i = y * width + x;
                floor[i] = match ch {
                    '#' => Tile::WALL_ID,
                    '_' => Tile::VOID_ID,
                    '@' | '+' => Tile::SPAWN_ID,
                    _ => Tile::FLOOR_ID,
                };
                if matches!(ch, '@' | '+') && spawn.is_none() {
                    spawn = Some(i);
                }
                if matches!(ch, '.' | '*' | '+') { goals[i] = 1; }
                if matches!(ch, '$' | '*') { boxes[i] = 1; }
            }
        }

        if let Some(start) = spawn {
            mark_outside_void(&mut floor, width, height, start);
        }

        LevelDef {
            name: name.to_string(),
            width,
            height,
            floor: Some(floor),
            goals: Some(goals),
            boxes: Some(boxes),
            time_goal: None,
            challenge: None,
            invalid: None,
        }
    }

    fn with_limits(mut self, time_goal: u64, moves_limit: u32, time_limit: u64) -> LevelDef {
        self.time_goal = Some(time_goal);
        self.challenge = Some(ChallengeDef { moves_limit, time_limit });
        self
    }
}

/// Floor cells not reachable from the spawn without crossing a wall are
/// outside the level.
fn mark_outside_void(floor: &mut [u8], width: usize, height: usize, start: usize) {
    let mut inside = vec![false; floor.len()];
    let mut stack = vec![start];
    while let Some(i) = stack.pop() {
        if inside[i] || floor[i] == Tile::WALL_ID || floor[i] == Tile::VOID_ID {
            continue;
        }
        inside[i] = true;
        let (x, y) = (i % width, i / width);
        if x > 0 { stack.push(i - 1); }
        if x + 1 < width { stack.push(i + 1); }
        if y > 0 { stack.push(i - width); }
        if y + 1 < height { stack.push(i + width); }
    }
    for (i, id) in floor.iter_mut().enumerate() {
        if !inside[i] && *id != Tile::WALL_ID {
            *id = Tile::VOID_ID;
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Library loading
// ══════════════════════════════════════════════════════════════

/// Parse a JSON level array. Only a document that is not an array fails
/// as a whole; an entry that does not fit the level shape is kept as an
/// invalid level so its neighbours still load.
pub fn parse_levels_json(text: &str) -> Result<Vec<LevelDef>, LevelFormatError> {
    let entries: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|e| LevelFormatError::Parse(e.to_string()))?;
    let levels = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let name = entry.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string();
            serde_json::from_value::<LevelDef>(entry).unwrap_or_else(|e| {
                warn!("level {} is malformed: {e}", i + 1);
                LevelDef { name, invalid: Some(e.to_string()), ..LevelDef::default() }
            })
        })
        .collect();
    Ok(levels)
}

/// Parse a `---` separated text pack.
pub fn parse_text_pack(content: &str) -> Vec<LevelDef> {
    let mut levels = vec![];
    let mut section: Vec<&str> = vec![];

    for line in content.lines().chain(std::iter::once("---")) {
        if line.trim() == "---" {
            if let Some(def) = parse_text_level(&section) {
                levels.push(def);
            }
            section.clear();
            continue;
        }
        section.push(line);
    }

    levels
}

fn parse_text_level(lines: &[&str]) -> Option<LevelDef> {
    let mut name = String::new();
    let mut rows: Vec<&str> = vec![];

    for &line in lines {
        if line.starts_with('#') && name.is_empty() && rows.is_empty() && is_name_line(line) {
            name = line[1..].trim().to_string();
        } else {
            rows.push(line.trim_end());
        }
    }

    while rows.first().is_some_and(|r| r.trim().is_empty()) {
        rows.remove(0);
    }
    while rows.last().is_some_and(|r| r.trim().is_empty()) {
        rows.pop();
    }
    if rows.is_empty() {
        return None;
    }
    Some(LevelDef::from_rows(&name, &rows))
}

/// `# Level Name` vs `#######` (level data): a name line has a letter.
fn is_name_line(line: &str) -> bool {
    line[1..].chars().any(|c| c.is_alphabetic())
}

/// Load the level list from `path`, falling back to the embedded levels
/// when the file is missing, unreadable, malformed or empty.
pub fn load_library(path: &Path) -> Vec<LevelDef> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            if path.exists() {
                warn!("could not read {}: {e}; using built-in levels", path.display());
            } else {
                info!("{} not found; using built-in levels", path.display());
            }
            return embedded_levels();
        }
    };

    let is_json = path.extension().is_some_and(|e| e == "json");
    let levels = if is_json {
        match parse_levels_json(&text) {
            Ok(l) => l,
            Err(e) => {
                warn!("{}: {e}; using built-in levels", path.display());
                return embedded_levels();
            }
        }
    } else {
        parse_text_pack(&text)
    };

    if levels.is_empty() {
        warn!("{} has no levels; using built-in levels", path.display());
        return embedded_levels();
    }
    info!("loaded {} levels from {}", levels.len(), path.display());
    levels
}

// ══════════════════════════════════════════════════════════════
// Installing a level into the world
// ══════════════════════════════════════════════════════════════

/// Load level `index` from the world's library. Resets entities, history,
/// tweens and mode counters. Does not change the session state.
pub fn load_level(world: &mut WorldState, index: usize) -> Result<Vec<LevelWarning>, LevelFormatError> {
    let def = world
        .levels
        .get(index)
        .cloned()
        .ok_or(LevelFormatError::NoSuchLevel { index, count: world.levels.len() })?;
    let parsed = def.parse()?;
    let warnings = parsed.warnings.clone();
    for w in &warnings {
        warn!("level {}: {w}", index + 1);
    }
    world.install_level(index, &def, parsed);
    world.events.push(GameEvent::LevelLoaded { index });
    info!("level {} \"{}\" loaded", index + 1, world.level_name);
    Ok(warnings)
}

/// Load level `index`, or the built-in default level if it is malformed.
/// Returns true when the requested level itself was loaded.
pub fn load_level_or_fallback(world: &mut WorldState, index: usize) -> bool {
    match load_level(world, index) {
        Ok(_) => true,
        Err(e) => {
            warn!("level {} failed to load: {e}; falling back to default level", index + 1);
            world.events.push(GameEvent::LevelFallback { index, reason: e.to_string() });
            let def = default_level();
            match def.parse() {
                Ok(parsed) => {
                    let slot = index.min(world.levels.len().saturating_sub(1));
                    world.install_level(slot, &def, parsed);
                    world.is_fallback = true;
                }
                Err(e) => warn!("default level is broken: {e}"),
            }
            false
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

pub fn default_level() -> LevelDef {
    LevelDef::from_rows("First Push", &[
        "#######",
        "#     #",
        "# @$. #",
        "#     #",
        "#######",
    ])
    .with_limits(15, 10, 30)
}

pub fn embedded_levels() -> Vec<LevelDef> {
    vec![
        default_level(),
        LevelDef::from_rows("Two Lanes", &[
            "########",
            "#      #",
            "# @$ . #",
            "#  $ . #",
            "#      #",
            "########",
        ])
        .with_limits(25, 20, 60),
        LevelDef::from_rows("Around the Pillar", &[
            "#######",
            "#.    #",
            "# ##  #",
            "# $ @ #",
            "#     #",
            "#######",
        ])
        .with_limits(30, 25, 60),
        LevelDef::from_rows("Side by Side", &[
            "########",
            "#  .   #",
            "#  $$  #",
            "# .@   #",
            "#      #",
            "########",
        ])
        .with_limits(40, 30, 90),
        LevelDef::from_rows("Twin Bays", &[
            "#########",
            "#   #   #",
            "# $   $ #",
            "#  .#.  #",
            "## @   ##",
            "_#######_",
        ])
        .with_limits(60, 45, 120),
    ]
}

/// Grid model: the static part of a loaded level.
///
/// Holds the floor classification and the goal set. Immutable after load.
/// Box occupancy is deliberately absent: the entity registry is the only
/// owner of box positions once a level has been parsed.
///
/// ## Layer format
///
/// Three parallel layers of `width * height` ids, indexed `y * width + x`:
///   - `floor`: tile ids (see [`Tile`])
///   - `goals`: nonzero = goal present
///   - `boxes`: nonzero = box present (initial placement only)

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

use super::tile::Tile;

/// Integer grid coordinate. Signed so that stepping off the map with a
/// negative delta stays representable (and is simply out of bounds).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        GridPos { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        GridPos { x: self.x + dx, y: self.y + dy }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// A level that cannot be loaded at all.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LevelFormatError {
    #[error("level dimensions must be at least 1x1 (got {width}x{height})")]
    ZeroDimension { width: usize, height: usize },

    #[error("missing `{0}` layer")]
    MissingLayer(&'static str),

    #[error("`{layer}` layer has {actual} cells, expected {expected}")]
    LayerLength { layer: &'static str, expected: usize, actual: usize },

    #[error("unknown floor tile id {id} at ({x},{y})")]
    UnknownTile { id: u8, x: usize, y: usize },

    #[error("no player spawn tile")]
    MissingSpawn,

    #[error("box on non-walkable cell ({x},{y})")]
    BoxOnWall { x: usize, y: usize },

    #[error("level {index} does not exist ({count} levels loaded)")]
    NoSuchLevel { index: usize, count: usize },

    #[error("level data could not be parsed: {0}")]
    Parse(String),
}

/// Problems that do not stop a level from loading.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelWarning {
    CountMismatch { boxes: usize, goals: usize },
    ExtraSpawn { x: usize, y: usize },
    GoalOnWall { x: usize, y: usize },
}

impl fmt::Display for LevelWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LevelWarning::CountMismatch { boxes, goals } => {
                write!(f, "{boxes} boxes but {goals} goals; level may be unsolvable")
            }
            LevelWarning::ExtraSpawn { x, y } => write!(f, "extra spawn tile at ({x},{y}) ignored"),
            LevelWarning::GoalOnWall { x, y } => write!(f, "goal on non-walkable cell ({x},{y})"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LevelGrid {
    width: usize,
    height: usize,
    floor: Vec<Tile>,
    goal_mask: Vec<bool>,
    goals: BTreeSet<GridPos>,
}

/// Result of parsing raw layers: the immutable grid plus the initial
/// entity placement that the registry takes over.
#[derive(Clone, Debug)]
pub struct ParsedLevel {
    pub grid: LevelGrid,
    pub spawn: GridPos,
    pub boxes: Vec<GridPos>,
    pub warnings: Vec<LevelWarning>,
}

impl LevelGrid {
    /// Parse the three layers. Missing or inconsistent layers are fatal;
    /// box/goal count mismatches are reported as warnings.
    pub fn from_layers(
        width: usize,
        height: usize,
        floor: Option<&[u8]>,
        goals: Option<&[u8]>,
        boxes: Option<&[u8]>,
    ) -> Result<ParsedLevel, LevelFormatError> {
        if width == 0 || height == 0 {
            return Err(LevelFormatError::ZeroDimension { width, height });
        }
        let floor = floor.ok_or(LevelFormatError::MissingLayer("floor"))?;
        let goals = goals.ok_or(LevelFormatError::MissingLayer("goals"))?;
        let boxes = boxes.ok_or(LevelFormatError::MissingLayer("boxes"))?;

        let expected = width * height;
        for (layer, data) in [("floor", floor), ("goals", goals), ("boxes", boxes)] {
            if data.len() != expected {
                return Err(LevelFormatError::LayerLength { layer, expected, actual: data.len() });
            }
        }

        let mut warnings = vec![];
        let mut tiles = Vec::with_capacity(expected);
        let mut spawn = None;

        for (i, &id) in floor.iter().enumerate() {
            let (x, y) = (i % width, i / width);
            let tile = Tile::from_id(id).ok_or(LevelFormatError::UnknownTile { id, x, y })?;
            if tile == Tile::Spawn {
                if spawn.is_none() {
                    spawn = Some(GridPos::new(x as i32, y as i32));
                } else {
                    warnings.push(LevelWarning::ExtraSpawn { x, y });
                }
            }
            tiles.push(tile);
        }
        let spawn = spawn.ok_or(LevelFormatError::MissingSpawn)?;

        let mut goal_mask = vec![false; expected];
        let mut goal_set = BTreeSet::new();
        for (i, &g) in goals.iter().enumerate() {
            if g == 0 { continue; }
            let (x, y) = (i % width, i / width);
            if !tiles[i].is_walkable() {
                warnings.push(LevelWarning::GoalOnWall { x, y });
            }
            goal_mask[i] = true;
            goal_set.insert(GridPos::new(x as i32, y as i32));
        }

        let mut box_list = vec![];
        for (i, &b) in boxes.iter().enumerate() {
            if b == 0 { continue; }
            let (x, y) = (i % width, i / width);
            if !tiles[i].is_walkable() {
                return Err(LevelFormatError::BoxOnWall { x, y });
            }
            box_list.push(GridPos::new(x as i32, y as i32));
        }

        if box_list.len() != goal_set.len() {
            warnings.push(LevelWarning::CountMismatch {
                boxes: box_list.len(),
                goals: goal_set.len(),
            });
        }

        Ok(ParsedLevel {
            grid: LevelGrid { width, height, floor: tiles, goal_mask, goals: goal_set },
            spawn,
            boxes: box_list,
            warnings,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major index, or `None` out of bounds.
    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y * self.width + x)
    }

    /// Floor tile at (x, y). Out of bounds reads as void.
    #[inline]
    pub fn tile_at(&self, x: i32, y: i32) -> Tile {
        self.index(x, y).map_or(Tile::Void, |i| self.floor[i])
    }

    /// False out of bounds or on a non-walkable tile.
    #[inline]
    pub fn is_walkable(&self, x: i32, y: i32) -> bool {
        self.tile_at(x, y).is_walkable()
    }

    #[inline]
    pub fn has_goal(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some_and(|i| self.goal_mask[i])
    }

    pub fn goals(&self) -> &BTreeSet<GridPos> {
        &self.goals
    }

    pub fn goal_count(&self) -> usize {
        self.goals.len()
    }

    /// A single spawn cell with no goals; held before the first level loads.
    pub fn placeholder() -> (LevelGrid, GridPos) {
        let grid = LevelGrid {
            width: 1,
            height: 1,
            floor: vec![Tile::Spawn],
            goal_mask: vec![false],
            goals: BTreeSet::new(),
        };
        (grid, GridPos::new(0, 0))
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

/// Floor tile types and their properties.
/// Properties are queried via methods, not stored as flags,
/// so tile semantics are centralized here.
///
/// Numeric ids are the values found in a level's `floor` layer.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Tile {
    /// Outside the level outline.
    #[default]
    Void,
    Floor,
    Wall,
    /// Floor cell where the player starts.
    Spawn,
}

impl Tile {
    pub const VOID_ID: u8 = 0;
    pub const FLOOR_ID: u8 = 1;
    pub const WALL_ID: u8 = 2;
    pub const SPAWN_ID: u8 = 3;

    /// Decode a floor-layer id. Unknown ids are `None`.
    pub fn from_id(id: u8) -> Option<Tile> {
        match id {
            Self::VOID_ID => Some(Tile::Void),
            Self::FLOOR_ID => Some(Tile::Floor),
            Self::WALL_ID => Some(Tile::Wall),
            Self::SPAWN_ID => Some(Tile::Spawn),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Tile::Void => Self::VOID_ID,
            Tile::Floor => Self::FLOOR_ID,
            Tile::Wall => Self::WALL_ID,
            Tile::Spawn => Self::SPAWN_ID,
        }
    }

    /// Can the player or a box occupy this cell?
    pub fn is_walkable(self) -> bool {
        matches!(self, Tile::Floor | Tile::Spawn)
    }

    pub fn is_wall(self) -> bool {
        matches!(self, Tile::Wall)
    }
}

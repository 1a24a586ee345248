use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A block position in the world. Used as the identity of a routing node and
/// as the endpoint of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The position one step away in the given direction.
    pub fn offset(&self, dir: Direction) -> Position {
        let (dx, dy, dz) = dir.offset();
        Position::new(self.x + dx, self.y + dy, self.z + dz)
    }

    /// All six face-adjacent positions, in [`Direction::all`] order.
    pub fn neighbors(&self) -> [Position; 6] {
        Direction::all().map(|dir| self.offset(dir))
    }

    /// The direction from `self` to `other` if the two are face-adjacent.
    pub fn direction_to(&self, other: &Position) -> Option<Direction> {
        Direction::all()
            .into_iter()
            .find(|dir| self.offset(*dir) == *other)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &Position) -> u32 {
        (self.x - other.x).unsigned_abs()
            + (self.y - other.y).unsigned_abs()
            + (self.z - other.z).unsigned_abs()
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// The six faces of a block. Also used as the "side" key for per-side
/// priorities and filters on a routing node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    /// All six directions.
    pub fn all() -> [Direction; 6] {
        [
            Direction::Down,
            Direction::Up,
            Direction::North,
            Direction::South,
            Direction::West,
            Direction::East,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

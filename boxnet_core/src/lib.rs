use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod action;
pub mod corner_world;
pub mod error;
pub mod executor;
pub mod goals;
pub mod grid_world;
pub mod map;
pub mod parser;
pub mod planner;
pub mod scenario;
pub mod trial;
pub mod world;

pub use action::{Action, ActionPlan, Verb};
pub use corner_world::CornerWorld;
pub use error::MoveError;
pub use executor::{ExecutionReport, execute_plan};
pub use grid_world::GridWorld;
pub use parser::{ParsedPlan, parse_plan};
pub use world::{World, WorldSnapshot};

/// Index of an agent within its world.
pub type AgentId = usize;

/// Box colors are free-form keys; several boxes may share one.
pub type Color = String;

/// A cell coordinate, `(row, col)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The neighbouring cell in `direction`, or `None` if it would underflow.
    ///
    /// The upper bound is the caller's concern, see [`map::Grid::step`].
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dr, dc) = direction.delta();
        Some(Position {
            row: self.row.checked_add_signed(dr)?,
            col: self.col.checked_add_signed(dc)?,
        })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Cardinal direction of a single-step box move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// `(row, col)` delta of one step.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    /// The direction taking `from` to an adjacent `to`, if they are adjacent.
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        let dr = to.row as isize - from.row as isize;
        let dc = to.col as isize - from.col as isize;
        Direction::ALL.into_iter().find(|d| d.delta() == (dr, dc))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `up/down/left/right` and the compass names `north/south/west/east`,
/// case-insensitively.
impl FromStr for Direction {
    type Err = MoveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "north" => Ok(Direction::Up),
            "down" | "south" => Ok(Direction::Down),
            "left" | "west" => Ok(Direction::Left),
            "right" | "east" => Ok(Direction::Right),
            _ => Err(MoveError::UnknownDirection(s.to_string())),
        }
    }
}

/// Which of the up-to-four cells around a corner point a corner record was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CornerLabel {
    NE,
    NW,
    SE,
    SW,
}

impl CornerLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            CornerLabel::NE => "NE",
            CornerLabel::NW => "NW",
            CornerLabel::SE => "SE",
            CornerLabel::SW => "SW",
        }
    }
}

impl fmt::Display for CornerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CornerLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NE" => Ok(CornerLabel::NE),
            "NW" => Ok(CornerLabel::NW),
            "SE" => Ok(CornerLabel::SE),
            "SW" => Ok(CornerLabel::SW),
            other => Err(format!("unknown corner label '{other}'")),
        }
    }
}

/// A corner record address: the integer point plus the label that disambiguates
/// the records sharing that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CornerPosition {
    pub row: usize,
    pub col: usize,
    pub label: CornerLabel,
}

impl CornerPosition {
    pub const fn new(row: usize, col: usize, label: CornerLabel) -> Self {
        Self { row, col, label }
    }
}

impl fmt::Display for CornerPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.row, self.col, self.label)
    }
}

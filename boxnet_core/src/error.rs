use crate::map::GridError;
use crate::{AgentId, Color, CornerPosition, Direction, Position};

/// Why a world refused an action. A refused action never mutates the world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("unrecognized direction '{0}'")]
    UnknownDirection(String),

    #[error("moving {from} {direction} leaves the {rows}x{cols} grid")]
    OffGrid {
        from: Position,
        direction: Direction,
        rows: usize,
        cols: usize,
    },

    #[error("no {color} box at {position}")]
    BoxNotAt { color: Color, position: Position },

    #[error("box #{0} does not exist")]
    UnknownBox(usize),

    #[error("no {0} box remains")]
    NoBoxOfColor(Color),

    #[error("agent {0} does not exist")]
    UnknownAgent(AgentId),

    #[error("a {0} action needs a source position")]
    MissingSource(Color),

    #[error("corner {0} does not exist")]
    NoSuchCorner(CornerPosition),

    #[error("corner {corner} already holds a {occupant} box")]
    CornerOccupied {
        corner: CornerPosition,
        occupant: Color,
    },

    #[error("{color} box is already placed or delivered")]
    AlreadyPlaced { color: Color },

    #[error("corner {corner} is not reachable from cell {cell}")]
    CornerNotConnected {
        corner: CornerPosition,
        cell: Position,
    },

    #[error("no {color} box on any corner of cell {cell}")]
    NoBoxInCell { color: Color, cell: Position },

    #[error("goal {goal} is outside cell {cell}")]
    GoalOutsideCell { goal: Position, cell: Position },

    #[error("no {color} goal at {goal}")]
    NoSuchGoal { color: Color, goal: Position },

    #[error(transparent)]
    OutOfRange(#[from] GridError),

    #[error("{verb} is not supported in a {world}")]
    Unsupported {
        verb: &'static str,
        world: &'static str,
    },
}

//! The capability set planner-facing code relies on, so protocols never branch
//! on which concrete world they drive.

use serde::{Deserialize, Serialize};

use crate::corner_world::{AvailableAction, BoxLocation, enumerate_available};
use crate::goals::{Coverage, Goals};
use crate::{Action, AgentId, Color, CornerPosition, MoveError, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorldKind {
    Grid,
    Corner,
}

impl WorldKind {
    pub fn name(self) -> &'static str {
        match self {
            WorldKind::Grid => "grid world",
            WorldKind::Corner => "corner world",
        }
    }
}

pub trait World {
    fn kind(&self) -> WorldKind;

    /// Read-only state for prompting and inspection.
    fn snapshot(&self) -> WorldSnapshot;

    /// Applies one action. `Err` leaves the world untouched.
    fn apply(&mut self, action: &Action) -> Result<(), MoveError>;

    fn coverage(&self) -> Coverage;

    fn is_complete(&self) -> bool;

    fn agent_count(&self) -> usize;

    /// Partial-progress score in `0.0..=1.0`.
    fn success_rate(&self) -> f64 {
        self.coverage().fraction()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "world", rename_all = "snake_case")]
pub enum WorldSnapshot {
    Grid(GridSnapshot),
    Corner(CornerSnapshot),
}

impl WorldSnapshot {
    pub fn kind(&self) -> WorldKind {
        match self {
            WorldSnapshot::Grid(_) => WorldKind::Grid,
            WorldSnapshot::Corner(_) => WorldKind::Corner,
        }
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        match self {
            WorldSnapshot::Grid(s) => s.agents.iter().map(|a| a.id).collect(),
            WorldSnapshot::Corner(s) => s.agents.iter().map(|a| a.id).collect(),
        }
    }

    pub fn goals(&self) -> &Goals {
        match self {
            WorldSnapshot::Grid(s) => &s.goals,
            WorldSnapshot::Corner(s) => &s.goals,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub boxes: Vec<GridBoxState>,
    pub agents: Vec<GridAgentState>,
    pub goals: Goals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBoxState {
    pub color: Color,
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridAgentState {
    pub id: AgentId,
    pub cells: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerSnapshot {
    pub rows: usize,
    pub cols: usize,
    pub boxes: Vec<CornerBoxState>,
    pub agents: Vec<CornerAgentState>,
    pub goals: Goals,
    pub corners: Vec<CornerState>,
}

impl CornerSnapshot {
    /// Same advisory list as [`crate::CornerWorld::available_actions`], computed
    /// from the snapshot alone.
    pub fn available_actions(&self, agent: AgentId) -> Option<Vec<AvailableAction>> {
        let cell = self.agents.iter().find(|a| a.id == agent)?.cell;
        let corners = self.corners.iter().map(|c| {
            (
                c.position,
                c.connected_cells.as_slice(),
                c.occupant.as_deref(),
            )
        });
        Some(enumerate_available(cell, corners, &self.goals))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerBoxState {
    pub color: Color,
    pub location: BoxLocation,
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerAgentState {
    pub id: AgentId,
    pub cell: Position,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerState {
    pub position: CornerPosition,
    pub connected_cells: Vec<Position>,
    pub occupant: Option<Color>,
}

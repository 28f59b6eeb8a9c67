//! Layout files. A scenario is a JSON document tagged by `"world"`:
//!
//! ```json
//! {
//!   "world": "grid",
//!   "rows": 2,
//!   "cols": 4,
//!   "boxes": [{"color": "blue", "positions": [{"row": 0, "col": 0}]}],
//!   "goals": {"blue": [{"row": 1, "col": 1}]},
//!   "agents": [{"cells": [{"row": 0, "col": 0}]}]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::goals::{Goals, SuccessMetric};
use crate::{Color, CornerPosition, CornerWorld, GridWorld, MoveError, Position, World};

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed scenario: {0}")]
    Json(#[from] serde_json::Error),

    #[error("grid dimensions {rows}x{cols} are unusable")]
    BadDimensions { rows: usize, cols: usize },

    #[error("invalid scenario layout: {0}")]
    Invalid(#[from] MoveError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "world", rename_all = "snake_case")]
pub enum Scenario {
    Grid(GridScenario),
    Corner(CornerScenario),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridScenario {
    pub rows: usize,
    pub cols: usize,
    pub boxes: Vec<GridBoxSpec>,
    pub goals: Goals,
    pub agents: Vec<GridAgentSpec>,
    #[serde(default)]
    pub goal_clearing: bool,
    #[serde(default)]
    pub metric: SuccessMetric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridBoxSpec {
    pub color: Color,
    pub positions: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridAgentSpec {
    pub cells: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerScenario {
    pub rows: usize,
    pub cols: usize,
    pub boxes: Vec<CornerBoxSpec>,
    pub goals: Goals,
    /// One cell per agent.
    pub agents: Vec<Position>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CornerBoxSpec {
    pub color: Color,
    /// Starting corner; an unplaced box waits off the corner graph.
    #[serde(default)]
    pub corner: Option<CornerPosition>,
}

/// Largest grid a scenario may ask for, counted in cells (grid worlds) or
/// corner points (corner worlds).
pub const MAX_CELLS: usize = 1 << 20;

fn check_dimensions(rows: usize, cols: usize) -> Result<(), ScenarioError> {
    if rows == 0 || cols == 0 {
        return Err(ScenarioError::BadDimensions { rows, cols });
    }
    match rows.checked_mul(cols) {
        Some(cells) if cells <= MAX_CELLS => Ok(()),
        _ => Err(ScenarioError::BadDimensions { rows, cols }),
    }
}

/// A corner world also indexes its `(rows + 1) x (cols + 1)` corner points.
fn check_corner_dimensions(rows: usize, cols: usize) -> Result<(), ScenarioError> {
    check_dimensions(rows, cols)?;
    let points = rows
        .checked_add(1)
        .zip(cols.checked_add(1))
        .and_then(|(r, c)| r.checked_mul(c));
    match points {
        Some(points) if points <= MAX_CELLS => Ok(()),
        _ => Err(ScenarioError::BadDimensions { rows, cols }),
    }
}

impl GridScenario {
    pub fn build(&self) -> Result<GridWorld, ScenarioError> {
        check_dimensions(self.rows, self.cols)?;
        let mut world = GridWorld::new(self.rows, self.cols)
            .with_goal_clearing(self.goal_clearing)
            .with_metric(self.metric);
        for spec in &self.boxes {
            world.add_box(spec.color.clone(), spec.positions.clone())?;
        }
        for (color, targets) in &self.goals {
            world.set_goal(color.clone(), targets.clone())?;
        }
        for agent in &self.agents {
            world.add_agent(agent.cells.clone())?;
        }
        Ok(world)
    }
}

impl CornerScenario {
    pub fn build(&self) -> Result<CornerWorld, ScenarioError> {
        check_corner_dimensions(self.rows, self.cols)?;
        let mut world = CornerWorld::new(self.rows, self.cols);
        let boxes: Vec<(Color, Option<CornerPosition>)> = self
            .boxes
            .iter()
            .map(|spec| (spec.color.clone(), spec.corner))
            .collect();
        world.setup_scenario(&boxes, self.goals.clone(), &self.agents)?;
        Ok(world)
    }
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, ScenarioError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// A fresh world in the scenario's initial state.
    pub fn build(&self) -> Result<Box<dyn World>, ScenarioError> {
        Ok(match self {
            Scenario::Grid(scenario) => Box::new(scenario.build()?),
            Scenario::Corner(scenario) => Box::new(scenario.build()?),
        })
    }
}

pub fn load_scenario(path: impl AsRef<Path>) -> Result<Scenario, ScenarioError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Scenario::from_json(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CornerLabel;
    use crate::corner_world::EMPTY;
    use crate::world::WorldKind;

    #[test]
    fn test_grid_scenario_defaults() {
        let scenario = Scenario::from_json(
            r#"{
                "world": "grid",
                "rows": 2,
                "cols": 2,
                "boxes": [{"color": "red", "positions": [{"row": 0, "col": 0}]}],
                "goals": {"red": [{"row": 1, "col": 1}]},
                "agents": [{"cells": [{"row": 0, "col": 0}, {"row": 0, "col": 1}]}]
            }"#,
        )
        .unwrap();
        let Scenario::Grid(grid) = &scenario else {
            panic!("expected a grid scenario");
        };
        assert!(!grid.goal_clearing);
        assert_eq!(grid.metric, SuccessMetric::SlotCoverage);

        let world = scenario.build().unwrap();
        assert_eq!(world.kind(), WorldKind::Grid);
        assert_eq!(world.agent_count(), 1);
        assert_eq!(world.success_rate(), 0.0);
    }

    #[test]
    fn test_corner_scenario_places_boxes() {
        let scenario = Scenario::Corner(CornerScenario {
            rows: 2,
            cols: 2,
            boxes: vec![
                CornerBoxSpec {
                    color: "red".to_string(),
                    corner: Some(CornerPosition::new(1, 1, CornerLabel::NW)),
                },
                CornerBoxSpec {
                    color: "blue".to_string(),
                    corner: None,
                },
            ],
            goals: Goals::from([("red".to_string(), vec![Position::new(0, 0)])]),
            agents: vec![Position::new(0, 0)],
        });
        let reparsed = Scenario::from_json(&scenario.to_json().unwrap()).unwrap();
        assert_eq!(reparsed, scenario);

        let Scenario::Corner(corner) = &scenario else {
            unreachable!()
        };
        let world = corner.build().unwrap();
        let occupancy = world.corner_occupancy();
        assert_eq!(occupancy.len(), 16);
        let held: Vec<_> = occupancy.iter().filter(|(_, color)| *color != EMPTY).collect();
        assert_eq!(held, vec![&(CornerPosition::new(1, 1, CornerLabel::NW), "red")]);
    }

    #[test]
    fn test_rejects_out_of_range_layout() {
        let scenario = GridScenario {
            rows: 2,
            cols: 2,
            boxes: vec![GridBoxSpec {
                color: "red".to_string(),
                positions: vec![Position::new(3, 0)],
            }],
            goals: Goals::new(),
            agents: Vec::new(),
            goal_clearing: false,
            metric: SuccessMetric::SlotCoverage,
        };
        assert!(matches!(scenario.build(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_rejects_empty_grid() {
        let scenario = CornerScenario {
            rows: 0,
            cols: 3,
            boxes: Vec::new(),
            goals: Goals::new(),
            agents: Vec::new(),
        };
        assert!(matches!(
            scenario.build(),
            Err(ScenarioError::BadDimensions { rows: 0, cols: 3 })
        ));
    }

    #[test]
    fn test_rejects_corner_points_past_usize() {
        let scenario = Scenario::from_json(&format!(
            r#"{{"world": "corner", "rows": {}, "cols": 1, "boxes": [], "goals": {{}}, "agents": []}}"#,
            usize::MAX
        ))
        .unwrap();
        assert!(matches!(
            scenario.build(),
            Err(ScenarioError::BadDimensions { cols: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_oversized_grid() {
        let huge = GridScenario {
            rows: 1 << 32,
            cols: (1 << 32) - 1,
            boxes: Vec::new(),
            goals: Goals::new(),
            agents: Vec::new(),
            goal_clearing: false,
            metric: SuccessMetric::SlotCoverage,
        };
        assert!(matches!(huge.build(), Err(ScenarioError::BadDimensions { .. })));

        let just_over = GridScenario {
            rows: 1,
            cols: MAX_CELLS + 1,
            ..huge.clone()
        };
        assert!(matches!(just_over.build(), Err(ScenarioError::BadDimensions { .. })));

        let at_limit = CornerScenario {
            rows: 1,
            cols: MAX_CELLS,
            boxes: Vec::new(),
            goals: Goals::new(),
            agents: Vec::new(),
        };
        assert!(matches!(at_limit.build(), Err(ScenarioError::BadDimensions { .. })));
    }
}

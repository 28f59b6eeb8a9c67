//! Cell-confined world: boxes step between neighbouring cells.
//!
//! A [`GridBox`] keeps every occurrence of its color in one position list.
//! The list is a multiset, so two boxes stacked on the same cell stay two
//! entries and moving one leaves the other in place.

use tracing::{debug, info};

use crate::goals::{Coverage, Goals, SuccessMetric, cleared_colors, slot_coverage};
use crate::map::Grid;
use crate::world::{GridAgentState, GridBoxState, GridSnapshot, World, WorldKind, WorldSnapshot};
use crate::{Action, AgentId, Color, Direction, MoveError, Position, Verb};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridBox {
    color: Color,
    positions: Vec<Position>,
}

impl GridBox {
    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }
}

/// An agent pinned to one or more cells. Agents never move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridAgent {
    pub id: AgentId,
    pub cells: Vec<Position>,
}

#[derive(Debug, Clone)]
pub struct GridWorld {
    /// Agents responsible for each cell.
    cells: Grid<Vec<AgentId>>,
    boxes: Vec<GridBox>,
    goals: Goals,
    agents: Vec<GridAgent>,
    goal_clearing: bool,
    metric: SuccessMetric,
}

type Layout<'a> = &'a [(&'a str, &'a [(usize, usize)])];

impl GridWorld {
    /// An empty `rows x cols` world scored by slot coverage.
    pub fn new(rows: usize, cols: usize) -> Self {
        GridWorld {
            cells: Grid::new(rows, cols),
            boxes: Vec::new(),
            goals: Goals::new(),
            agents: Vec::new(),
            goal_clearing: false,
            metric: SuccessMetric::SlotCoverage,
        }
    }

    /// Allows [`Verb::ToGoal`] to clear a color's goal, see [`GridWorld::clear_goal`].
    pub fn with_goal_clearing(mut self, enabled: bool) -> Self {
        self.goal_clearing = enabled;
        self
    }

    pub fn with_metric(mut self, metric: SuccessMetric) -> Self {
        self.metric = metric;
        self
    }

    // Hardcoded layouts only; coordinates are known to be in range.
    fn from_layout(
        rows: usize,
        cols: usize,
        boxes: Layout<'_>,
        goals: Layout<'_>,
        agents: &[&[(usize, usize)]],
    ) -> Self {
        let cells = |list: &[(usize, usize)]| -> Vec<Position> {
            list.iter().map(|&(r, c)| Position::new(r, c)).collect()
        };
        let mut world = GridWorld::new(rows, cols);
        world.boxes = boxes
            .iter()
            .map(|(color, positions)| GridBox {
                color: color.to_string(),
                positions: cells(positions),
            })
            .collect();
        world.goals = goals
            .iter()
            .map(|(color, targets)| (color.to_string(), cells(targets)))
            .collect();
        for agent in agents {
            world.pin_agent(cells(agent));
        }
        world
    }

    /// The 2x4 trial: blue, two yellows and red, with one agent per cell.
    pub fn boxnet1() -> Self {
        Self::from_layout(
            2,
            4,
            &[
                ("blue", &[(0, 0)]),
                ("yellow", &[(0, 1), (0, 3)]),
                ("red", &[(1, 2)]),
            ],
            &[
                ("blue", &[(1, 1)]),
                ("yellow", &[(1, 0), (1, 3)]),
                ("red", &[(0, 2)]),
            ],
            &[
                &[(0, 0)],
                &[(0, 1)],
                &[(0, 2)],
                &[(0, 3)],
                &[(1, 0)],
                &[(1, 1)],
                &[(1, 2)],
                &[(1, 3)],
            ],
        )
    }

    /// The 3x5 variant: five colors with 2x2 goal regions, agents responsible
    /// for overlapping 2x2 blocks, goals cleared by color and scored by cleared colors.
    pub fn corridor() -> Self {
        let block = |r: usize, c: usize| [(r, c), (r, c + 1), (r + 1, c), (r + 1, c + 1)];
        let agent_blocks: Vec<[(usize, usize); 4]> = [
            (0, 0),
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 0),
            (1, 1),
            (1, 2),
            (1, 3),
        ]
        .iter()
        .map(|&(r, c)| block(r, c))
        .collect();
        let agents: Vec<&[(usize, usize)]> = agent_blocks.iter().map(|b| b.as_slice()).collect();

        Self::from_layout(
            3,
            5,
            &[
                ("blue", &[(1, 0)]),
                ("yellow", &[(1, 3)]),
                ("green", &[(0, 1)]),
                ("purple", &[(2, 4)]),
                ("red", &[(1, 2)]),
            ],
            &[
                ("purple", &block(0, 0)),
                ("yellow", &[(1, 0), (2, 0), (1, 1), (2, 1)]),
                ("blue", &block(1, 1)),
                ("green", &block(1, 3)),
                ("red", &[(0, 2), (0, 3), (1, 2), (1, 3)]),
            ],
            &agents,
        )
        .with_goal_clearing(true)
        .with_metric(SuccessMetric::ClearedColors)
    }

    fn pin_agent(&mut self, cells: Vec<Position>) -> AgentId {
        let id = self.agents.len();
        for cell in &cells {
            if let Some(responsible) = self.cells.get_mut(*cell) {
                responsible.push(id);
            }
        }
        self.agents.push(GridAgent { id, cells });
        id
    }

    pub fn add_box(
        &mut self,
        color: impl Into<Color>,
        positions: Vec<Position>,
    ) -> Result<usize, MoveError> {
        for position in &positions {
            self.cells.check(*position)?;
        }
        self.boxes.push(GridBox {
            color: color.into(),
            positions,
        });
        Ok(self.boxes.len() - 1)
    }

    pub fn set_goal(
        &mut self,
        color: impl Into<Color>,
        targets: Vec<Position>,
    ) -> Result<(), MoveError> {
        for target in &targets {
            self.cells.check(*target)?;
        }
        self.goals.insert(color.into(), targets);
        Ok(())
    }

    pub fn add_agent(&mut self, cells: Vec<Position>) -> Result<AgentId, MoveError> {
        for cell in &cells {
            self.cells.check(*cell)?;
        }
        Ok(self.pin_agent(cells))
    }

    pub fn rows(&self) -> usize {
        self.cells.rows()
    }

    pub fn cols(&self) -> usize {
        self.cells.cols()
    }

    pub fn boxes(&self) -> &[GridBox] {
        &self.boxes
    }

    pub fn goals(&self) -> &Goals {
        &self.goals
    }

    pub fn agents(&self) -> &[GridAgent] {
        &self.agents
    }

    pub fn metric(&self) -> SuccessMetric {
        self.metric
    }

    /// Agents whose region includes `cell`.
    pub fn agents_at(&self, cell: Position) -> &[AgentId] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First box of `color` with an occurrence at `at`.
    pub fn find_box(&self, color: &str, at: Position) -> Option<usize> {
        self.boxes
            .iter()
            .position(|b| b.color == color && b.positions.contains(&at))
    }

    /// Moves one occurrence of box `box_index` from `source` one step in `direction`.
    ///
    /// Fails without touching the world if the destination is off the grid or
    /// the box has no occurrence at `source`. Returns the destination.
    pub fn move_box(
        &mut self,
        box_index: usize,
        source: Position,
        direction: Direction,
    ) -> Result<Position, MoveError> {
        if box_index >= self.boxes.len() {
            return Err(MoveError::UnknownBox(box_index));
        }
        let Some(destination) = self.cells.step(source, direction) else {
            let err = MoveError::OffGrid {
                from: source,
                direction,
                rows: self.rows(),
                cols: self.cols(),
            };
            debug!("move rejected: {err}");
            return Err(err);
        };
        let moved = &mut self.boxes[box_index];
        let Some(slot) = moved.positions.iter().position(|p| *p == source) else {
            let err = MoveError::BoxNotAt {
                color: moved.color.clone(),
                position: source,
            };
            debug!("move rejected: {err}");
            return Err(err);
        };

        moved.positions.remove(slot);
        moved.positions.push(destination);
        info!(color = %moved.color, from = %source, to = %destination, "box moved");
        Ok(destination)
    }

    /// Marks `color` as done: empties its goal list and removes every box of
    /// that color. Returns how many boxes were removed.
    pub fn clear_goal(&mut self, color: &str) -> Result<usize, MoveError> {
        let before = self.boxes.len();
        self.boxes.retain(|b| b.color != color);
        let removed = before - self.boxes.len();
        if removed == 0 {
            return Err(MoveError::NoBoxOfColor(color.to_string()));
        }
        if let Some(targets) = self.goals.get_mut(color) {
            targets.clear();
        }
        info!(color, removed, "goal cleared");
        Ok(removed)
    }

    pub fn slot_coverage(&self) -> Coverage {
        slot_coverage(&self.goals, self.occupied())
    }

    /// Slot coverage restricted to one color's goals.
    pub fn color_coverage(&self, color: &str) -> Coverage {
        let goals: Goals = self
            .goals
            .iter()
            .filter(|(c, _)| c.as_str() == color)
            .map(|(c, targets)| (c.clone(), targets.clone()))
            .collect();
        slot_coverage(&goals, self.occupied())
    }

    fn occupied(&self) -> impl Iterator<Item = (&str, Position)> {
        self.boxes
            .iter()
            .flat_map(|b| b.positions.iter().map(move |p| (b.color.as_str(), *p)))
    }
}

impl World for GridWorld {
    fn kind(&self) -> WorldKind {
        WorldKind::Grid
    }

    fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::Grid(GridSnapshot {
            rows: self.rows(),
            cols: self.cols(),
            boxes: self
                .boxes
                .iter()
                .map(|b| GridBoxState {
                    color: b.color.clone(),
                    positions: b.positions.clone(),
                })
                .collect(),
            agents: self
                .agents
                .iter()
                .map(|a| GridAgentState {
                    id: a.id,
                    cells: a.cells.clone(),
                })
                .collect(),
            goals: self.goals.clone(),
        })
    }

    fn apply(&mut self, action: &Action) -> Result<(), MoveError> {
        match action.verb {
            Verb::Stay => Ok(()),
            Verb::Move(direction) => {
                let source = action
                    .source
                    .ok_or_else(|| MoveError::MissingSource(action.color.clone()))?;
                let index = self.find_box(&action.color, source).ok_or_else(|| {
                    MoveError::BoxNotAt {
                        color: action.color.clone(),
                        position: source,
                    }
                })?;
                self.move_box(index, source, direction).map(|_| ())
            }
            Verb::ToGoal(_) if self.goal_clearing => self.clear_goal(&action.color).map(|_| ()),
            Verb::ToGoal(_) | Verb::ToCorner(_) => Err(MoveError::Unsupported {
                verb: action.verb.name(),
                world: WorldKind::Grid.name(),
            }),
        }
    }

    fn coverage(&self) -> Coverage {
        match self.metric {
            SuccessMetric::SlotCoverage => self.slot_coverage(),
            SuccessMetric::ClearedColors => cleared_colors(&self.goals),
        }
    }

    fn is_complete(&self) -> bool {
        self.coverage().is_full()
    }

    fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn positions(world: &GridWorld, color: &str) -> Vec<Position> {
        world
            .boxes()
            .iter()
            .filter(|b| b.color() == color)
            .flat_map(|b| b.positions().to_vec())
            .collect()
    }

    #[test]
    fn test_boxnet1_layout() {
        let world = GridWorld::boxnet1();
        assert_eq!((world.rows(), world.cols()), (2, 4));
        assert_eq!(world.agent_count(), 8);
        assert_eq!(world.agents_at(Position::new(1, 3)), &[7]);
        assert_eq!(positions(&world, "yellow").len(), 2);
        assert_eq!(world.slot_coverage(), Coverage { met: 0, total: 4 });
    }

    #[test]
    fn test_blue_box_reaches_goal() {
        let mut world = GridWorld::boxnet1();
        let blue = world.find_box("blue", Position::new(0, 0)).unwrap();
        assert_eq!(
            world.move_box(blue, Position::new(0, 0), Direction::Down),
            Ok(Position::new(1, 0))
        );
        assert_eq!(positions(&world, "blue"), vec![Position::new(1, 0)]);
        world
            .move_box(blue, Position::new(1, 0), Direction::Right)
            .unwrap();
        assert_eq!(positions(&world, "blue"), vec![Position::new(1, 1)]);
        assert_eq!(world.color_coverage("blue").fraction(), 1.0);
        assert_eq!(world.slot_coverage(), Coverage { met: 1, total: 4 });
    }

    #[test]
    fn test_move_off_top_row_fails() {
        let mut world = GridWorld::boxnet1();
        let blue = world.find_box("blue", Position::new(0, 0)).unwrap();
        assert_eq!(
            world.move_box(blue, Position::new(0, 0), Direction::Up),
            Err(MoveError::OffGrid {
                from: Position::new(0, 0),
                direction: Direction::Up,
                rows: 2,
                cols: 4
            })
        );
        assert_eq!(positions(&world, "blue"), vec![Position::new(0, 0)]);
    }

    #[test]
    fn test_move_off_right_edge_fails() {
        let mut world = GridWorld::boxnet1();
        let yellow = world.find_box("yellow", Position::new(0, 3)).unwrap();
        assert!(
            world
                .move_box(yellow, Position::new(0, 3), Direction::Right)
                .is_err()
        );
        assert_eq!(
            world.move_box(yellow, Position::new(0, 3), Direction::Down),
            Ok(Position::new(1, 3))
        );
    }

    #[test]
    fn test_source_must_be_occupied() {
        let mut world = GridWorld::boxnet1();
        let red = world.find_box("red", Position::new(1, 2)).unwrap();
        assert_eq!(
            world.move_box(red, Position::new(0, 0), Direction::Down),
            Err(MoveError::BoxNotAt {
                color: "red".to_string(),
                position: Position::new(0, 0)
            })
        );
    }

    #[test]
    fn test_stacked_occurrences_move_independently() {
        let mut world = GridWorld::new(2, 2);
        let green = world
            .add_box("green", vec![Position::new(0, 0), Position::new(0, 0)])
            .unwrap();
        world
            .move_box(green, Position::new(0, 0), Direction::Right)
            .unwrap();
        let mut left = positions(&world, "green");
        left.sort();
        assert_eq!(left, vec![Position::new(0, 0), Position::new(0, 1)]);
    }

    #[test]
    fn test_to_goal_unsupported_without_clearing() {
        let mut world = GridWorld::boxnet1();
        assert_eq!(
            world.apply(&Action::to_goal(0, "blue", None)),
            Err(MoveError::Unsupported {
                verb: "to-goal",
                world: "grid world"
            })
        );
        assert_eq!(positions(&world, "blue").len(), 1);
    }

    #[test]
    fn test_corridor_clears_goals_by_color() {
        let mut world = GridWorld::corridor();
        assert_eq!((world.rows(), world.cols()), (3, 5));
        assert_eq!(world.agents()[0].cells.len(), 4);
        assert_eq!(world.agents_at(Position::new(1, 1)).len(), 4);

        world.apply(&Action::to_goal(0, "purple", None)).unwrap();
        assert!(world.goals()["purple"].is_empty());
        assert!(positions(&world, "purple").is_empty());
        assert_eq!(world.coverage(), Coverage { met: 1, total: 5 });
        assert_eq!(world.success_rate(), 0.2);

        assert_eq!(
            world.clear_goal("purple"),
            Err(MoveError::NoBoxOfColor("purple".to_string()))
        );
        assert_eq!(world.coverage(), Coverage { met: 1, total: 5 });
    }

    #[test]
    fn test_add_box_out_of_range() {
        let mut world = GridWorld::new(2, 4);
        assert!(matches!(
            world.add_box("red", vec![Position::new(2, 0)]),
            Err(MoveError::OutOfRange(_))
        ));
        assert!(world.boxes().is_empty());
    }
}

//! Corner-confined world: boxes sit on the corners shared by neighbouring
//! cells, and agents move them between the corners of their own cell or
//! deliver them to a goal in that cell.
//!
//! Every integer corner point gets one corner record per in-range adjacent
//! cell, each with its own label. Records at the same point share a connected
//! cell list but track occupancy independently, and lookups match the full
//! `(row, col, label)` triple.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::goals::{Coverage, Goals, cleared_colors};
use crate::map::Grid;
use crate::world::{
    CornerAgentState, CornerBoxState, CornerSnapshot, CornerState, World, WorldKind,
    WorldSnapshot,
};
use crate::{
    Action, AgentId, Color, CornerLabel, CornerPosition, MoveError, Position, Verb,
};

/// Occupancy marker for an empty corner in [`CornerWorld::corner_occupancy`].
pub const EMPTY: &str = "EMPTY";

/// `(row, col)` offset from a corner point to an adjacent cell, with the label
/// of the record created for that cell.
const CELL_OFFSETS: [(isize, isize, CornerLabel); 4] = [
    (0, 0, CornerLabel::SE),
    (-1, 0, CornerLabel::SW),
    (0, -1, CornerLabel::NE),
    (-1, -1, CornerLabel::NW),
];

/// Where a box currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "at", content = "position")]
pub enum BoxLocation {
    Unplaced,
    Corner(CornerPosition),
    /// Delivered; the box has left the corner graph.
    Goal(Position),
}

#[derive(Debug, Clone)]
pub struct Corner {
    position: CornerPosition,
    connected_cells: Vec<Position>,
    /// Index into the world's boxes. The box owns its location; this is a back-reference.
    occupant: Option<usize>,
}

impl Corner {
    pub fn position(&self) -> CornerPosition {
        self.position
    }

    pub fn connected_cells(&self) -> &[Position] {
        &self.connected_cells
    }

    pub fn occupant(&self) -> Option<usize> {
        self.occupant
    }

    pub fn touches(&self, cell: Position) -> bool {
        self.connected_cells.contains(&cell)
    }
}

#[derive(Debug, Clone)]
pub struct CornerBox {
    color: Color,
    location: BoxLocation,
    delivered: bool,
}

impl CornerBox {
    pub fn color(&self) -> &str {
        &self.color
    }

    pub fn location(&self) -> BoxLocation {
        self.location
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerAgent {
    pub id: AgentId,
    pub cell: Position,
}

/// Advisory action for prompt construction. Not enforced by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AvailableAction {
    CornerToCorner { color: Color, target: CornerPosition },
    CornerToGoal { color: Color, goal: Position },
    DoNothing,
}

impl AvailableAction {
    pub fn into_action(self, agent: AgentId) -> Action {
        match self {
            AvailableAction::CornerToCorner { color, target } => {
                Action::to_corner(agent, color, target)
            }
            AvailableAction::CornerToGoal { color, goal } => {
                Action::to_goal(agent, color, Some(goal))
            }
            AvailableAction::DoNothing => Action::stay(agent),
        }
    }
}

impl fmt::Display for AvailableAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvailableAction::CornerToCorner { color, target } => {
                write!(f, "move_box_corner_to_corner({color}, {target})")
            }
            AvailableAction::CornerToGoal { color, goal } => {
                write!(f, "move_box_corner_to_goal({color}, {goal})")
            }
            AvailableAction::DoNothing => f.write_str("do_nothing()"),
        }
    }
}

/// Lists the moves open to an agent in `cell`, given every corner's position,
/// connected cells and occupant color.
pub(crate) fn enumerate_available<'a, I>(
    cell: Position,
    corners: I,
    goals: &Goals,
) -> Vec<AvailableAction>
where
    I: IntoIterator<Item = (CornerPosition, &'a [Position], Option<&'a str>)>,
{
    let local: Vec<(CornerPosition, Option<&str>)> = corners
        .into_iter()
        .filter(|(_, cells, _)| cells.contains(&cell))
        .map(|(position, _, occupant)| (position, occupant))
        .collect();

    let mut actions = Vec::new();
    for (position, occupant) in &local {
        let Some(color) = occupant else { continue };
        for (target, target_occupant) in &local {
            if target != position && target_occupant.is_none() {
                actions.push(AvailableAction::CornerToCorner {
                    color: color.to_string(),
                    target: *target,
                });
            }
        }
        if let Some(cells) = goals.get(*color) {
            for goal in cells.iter().filter(|goal| **goal == cell) {
                actions.push(AvailableAction::CornerToGoal {
                    color: color.to_string(),
                    goal: *goal,
                });
            }
        }
    }
    actions.push(AvailableAction::DoNothing);
    actions
}

/// One initial goal slot and whether a delivered box now covers it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStatus {
    pub color: Color,
    pub goal: Position,
    pub met: bool,
}

#[derive(Debug, Clone)]
pub struct CornerWorld {
    rows: usize,
    cols: usize,
    corners: Vec<Corner>,
    /// Corner record indices per corner point, `(rows + 1) x (cols + 1)`.
    points: Grid<Vec<usize>>,
    boxes: Vec<CornerBox>,
    goals: Goals,
    initial_goals: Goals,
    agents: Vec<CornerAgent>,
}

impl CornerWorld {
    /// Builds the corner graph for a `rows x cols` grid with no boxes, goals or agents.
    ///
    /// # Panics
    ///
    /// Panics if `(rows + 1) * (cols + 1)` overflows. Scenario files are
    /// bounded before they get here.
    pub fn new(rows: usize, cols: usize) -> Self {
        let mut corners = Vec::new();
        let point_rows = rows.checked_add(1).expect("corner grid rows overflow");
        let point_cols = cols.checked_add(1).expect("corner grid cols overflow");
        let mut points: Grid<Vec<usize>> = Grid::new(point_rows, point_cols);
        let cells: Grid<()> = Grid::new(rows, cols);

        for row in 0..=rows {
            for col in 0..=cols {
                let adjacent: Vec<(Position, CornerLabel)> = CELL_OFFSETS
                    .iter()
                    .filter_map(|&(dr, dc, label)| {
                        let cell = Position::new(
                            row.checked_add_signed(dr)?,
                            col.checked_add_signed(dc)?,
                        );
                        cells.contains(cell).then_some((cell, label))
                    })
                    .collect();
                let connected_cells: Vec<Position> =
                    adjacent.iter().map(|(cell, _)| *cell).collect();

                for (_, label) in adjacent {
                    points[Position::new(row, col)].push(corners.len());
                    corners.push(Corner {
                        position: CornerPosition::new(row, col, label),
                        connected_cells: connected_cells.clone(),
                        occupant: None,
                    });
                }
            }
        }

        CornerWorld {
            rows,
            cols,
            corners,
            points,
            boxes: Vec::new(),
            goals: Goals::new(),
            initial_goals: Goals::new(),
            agents: Vec::new(),
        }
    }

    /// Default 2x2 trial: a red and a blue box in opposite outer corners, each
    /// with a goal on the far diagonal, and one agent per cell.
    pub fn boxnet2() -> Self {
        let mut world = CornerWorld::new(2, 2);
        let red = world.add_box("red");
        let blue = world.add_box("blue");
        world.occupy(red, CornerPosition::new(0, 0, CornerLabel::SE));
        world.occupy(blue, CornerPosition::new(2, 2, CornerLabel::NW));
        world.set_goals(Goals::from([
            ("red".to_string(), vec![Position::new(1, 1)]),
            ("blue".to_string(), vec![Position::new(0, 0)]),
        ]));
        for cell in [
            Position::new(0, 0),
            Position::new(0, 1),
            Position::new(1, 0),
            Position::new(1, 1),
        ] {
            world.agents.push(CornerAgent {
                id: world.agents.len(),
                cell,
            });
        }
        world
    }

    // Placement for hardcoded layouts, where the corner is known to exist and be free.
    fn occupy(&mut self, box_index: usize, position: CornerPosition) {
        if let Some(index) = self.corner_index(position) {
            self.corners[index].occupant = Some(box_index);
            self.boxes[box_index].location = BoxLocation::Corner(position);
        }
    }

    /// Resets boxes, goals and agents, placing each box at its initial corner if given.
    ///
    /// Every agent cell and starting corner is checked first; on `Err` the
    /// world is left as it was.
    pub fn setup_scenario(
        &mut self,
        boxes: &[(Color, Option<CornerPosition>)],
        goals: Goals,
        agents: &[Position],
    ) -> Result<(), MoveError> {
        let cells: Grid<()> = Grid::new(self.rows, self.cols);
        for cell in agents {
            cells.check(*cell)?;
        }
        let mut claimed: Vec<(usize, &Color)> = Vec::new();
        for (color, corner) in boxes {
            let Some(corner) = corner else { continue };
            let index = self
                .corner_index(*corner)
                .ok_or(MoveError::NoSuchCorner(*corner))?;
            if let Some((_, occupant)) = claimed.iter().find(|(taken, _)| *taken == index) {
                return Err(MoveError::CornerOccupied {
                    corner: *corner,
                    occupant: (*occupant).clone(),
                });
            }
            claimed.push((index, color));
        }

        for corner in &mut self.corners {
            corner.occupant = None;
        }
        self.boxes.clear();
        self.agents.clear();
        self.set_goals(goals);

        for cell in agents {
            self.add_agent(*cell)?;
        }
        for (color, corner) in boxes {
            let index = self.add_box(color.clone());
            if let Some(corner) = corner {
                self.place_box_at_corner(index, *corner)?;
            }
        }
        Ok(())
    }

    pub fn add_box(&mut self, color: impl Into<Color>) -> usize {
        self.boxes.push(CornerBox {
            color: color.into(),
            location: BoxLocation::Unplaced,
            delivered: false,
        });
        self.boxes.len() - 1
    }

    pub fn add_agent(&mut self, cell: Position) -> Result<AgentId, MoveError> {
        let cells: Grid<()> = Grid::new(self.rows, self.cols);
        cells.check(cell)?;
        let id = self.agents.len();
        self.agents.push(CornerAgent { id, cell });
        Ok(id)
    }

    pub fn set_goals(&mut self, goals: Goals) {
        self.initial_goals = goals.clone();
        self.goals = goals;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn corners(&self) -> &[Corner] {
        &self.corners
    }

    pub fn boxes(&self) -> &[CornerBox] {
        &self.boxes
    }

    /// Remaining goal slots per color.
    pub fn goals(&self) -> &Goals {
        &self.goals
    }

    pub fn agents(&self) -> &[CornerAgent] {
        &self.agents
    }

    fn corner_index(&self, position: CornerPosition) -> Option<usize> {
        self.points
            .get(Position::new(position.row, position.col))?
            .iter()
            .copied()
            .find(|&index| self.corners[index].position == position)
    }

    pub fn corner(&self, position: CornerPosition) -> Option<&Corner> {
        self.corner_index(position).map(|index| &self.corners[index])
    }

    /// Every corner record sharing the integer point `(row, col)`.
    pub fn corners_at_point(&self, row: usize, col: usize) -> impl Iterator<Item = &Corner> {
        self.points
            .get(Position::new(row, col))
            .into_iter()
            .flatten()
            .map(|&index| &self.corners[index])
    }

    fn agent_cell(&self, agent: AgentId) -> Result<Position, MoveError> {
        self.agents
            .get(agent)
            .map(|a| a.cell)
            .ok_or(MoveError::UnknownAgent(agent))
    }

    /// First corner touching `cell` that holds a box of `color`.
    fn source_corner(&self, cell: Position, color: &str) -> Option<usize> {
        self.corners.iter().position(|corner| {
            corner.touches(cell)
                && corner
                    .occupant
                    .is_some_and(|index| self.boxes[index].color == color)
        })
    }

    fn occupied_error(&self, index: usize) -> Option<MoveError> {
        let corner = &self.corners[index];
        corner.occupant.map(|occupant| MoveError::CornerOccupied {
            corner: corner.position,
            occupant: self.boxes[occupant].color.clone(),
        })
    }

    pub fn place_box_at_corner(
        &mut self,
        box_index: usize,
        position: CornerPosition,
    ) -> Result<(), MoveError> {
        let placed = self
            .boxes
            .get(box_index)
            .ok_or(MoveError::UnknownBox(box_index))?;
        if placed.location != BoxLocation::Unplaced {
            return Err(MoveError::AlreadyPlaced {
                color: placed.color.clone(),
            });
        }
        let index = self
            .corner_index(position)
            .ok_or(MoveError::NoSuchCorner(position))?;
        if let Some(err) = self.occupied_error(index) {
            debug!(corner = %position, "placement rejected: {err}");
            return Err(err);
        }

        self.corners[index].occupant = Some(box_index);
        let placed = &mut self.boxes[box_index];
        placed.location = BoxLocation::Corner(position);
        info!(color = %placed.color, corner = %position, "box placed");
        Ok(())
    }

    /// Moves a `color` box sitting on one of the agent's corners to `target`,
    /// which must also touch the agent's cell. Returns the source corner.
    pub fn move_box_corner_to_corner(
        &mut self,
        agent: AgentId,
        color: &str,
        target: CornerPosition,
    ) -> Result<CornerPosition, MoveError> {
        let cell = self.agent_cell(agent)?;
        let source = self
            .source_corner(cell, color)
            .ok_or_else(|| MoveError::NoBoxInCell {
                color: color.to_string(),
                cell,
            })?;
        let target_index = self
            .corner_index(target)
            .ok_or(MoveError::NoSuchCorner(target))?;
        if !self.corners[target_index].touches(cell) {
            return Err(MoveError::CornerNotConnected {
                corner: target,
                cell,
            });
        }
        if let Some(err) = self.occupied_error(target_index) {
            return Err(err);
        }

        let box_index = self.corners[source].occupant.take();
        self.corners[target_index].occupant = box_index;
        if let Some(index) = box_index {
            self.boxes[index].location = BoxLocation::Corner(target);
        }
        let from = self.corners[source].position;
        info!(agent, color, from = %from, to = %target, "box moved between corners");
        Ok(from)
    }

    /// Delivers a `color` box from one of the agent's corners to `goal`, which
    /// must be the agent's own cell and one of the color's remaining goal slots.
    ///
    /// Delivery consumes the slot. Once no undelivered box of the color remains,
    /// the color's other slots are cleared as well.
    pub fn move_box_corner_to_goal(
        &mut self,
        agent: AgentId,
        color: &str,
        goal: Position,
    ) -> Result<CornerPosition, MoveError> {
        let cell = self.agent_cell(agent)?;
        if goal != cell {
            return Err(MoveError::GoalOutsideCell { goal, cell });
        }
        let has_slot = self
            .goals
            .get(color)
            .is_some_and(|cells| cells.contains(&goal));
        if !has_slot {
            return Err(MoveError::NoSuchGoal {
                color: color.to_string(),
                goal,
            });
        }
        let source = self
            .source_corner(cell, color)
            .ok_or_else(|| MoveError::NoBoxInCell {
                color: color.to_string(),
                cell,
            })?;

        if let Some(index) = self.corners[source].occupant.take() {
            let delivered = &mut self.boxes[index];
            delivered.location = BoxLocation::Goal(goal);
            delivered.delivered = true;
        }
        let outstanding = self
            .boxes
            .iter()
            .any(|b| b.color == color && !b.delivered);
        if let Some(cells) = self.goals.get_mut(color) {
            if outstanding {
                if let Some(slot) = cells.iter().position(|c| *c == goal) {
                    cells.remove(slot);
                }
            } else {
                cells.clear();
            }
        }
        let from = self.corners[source].position;
        info!(agent, color, from = %from, goal = %goal, "box delivered");
        Ok(from)
    }

    pub fn do_nothing(&self, agent: AgentId) -> Result<(), MoveError> {
        let cell = self.agent_cell(agent)?;
        debug!(agent, cell = %cell, "agent does nothing");
        Ok(())
    }

    /// True once every box has been delivered.
    pub fn check_task_completion(&self) -> bool {
        self.boxes.iter().all(|b| b.delivered)
    }

    /// Each corner record with its occupant color, or [`EMPTY`].
    pub fn corner_occupancy(&self) -> Vec<(CornerPosition, &str)> {
        self.corners
            .iter()
            .map(|corner| {
                let occupant = corner
                    .occupant
                    .map_or(EMPTY, |index| self.boxes[index].color.as_str());
                (corner.position, occupant)
            })
            .collect()
    }

    /// Status of every goal slot the world started with.
    pub fn goal_status(&self) -> Vec<GoalStatus> {
        self.initial_goals
            .iter()
            .flat_map(|(color, cells)| {
                cells.iter().map(move |goal| GoalStatus {
                    color: color.clone(),
                    goal: *goal,
                    met: self.boxes.iter().any(|b| {
                        b.color == *color && b.delivered && b.location == BoxLocation::Goal(*goal)
                    }),
                })
            })
            .collect()
    }

    pub fn available_actions(&self, agent: AgentId) -> Result<Vec<AvailableAction>, MoveError> {
        let cell = self.agent_cell(agent)?;
        let corners = self.corners.iter().map(|corner| {
            (
                corner.position,
                corner.connected_cells.as_slice(),
                corner
                    .occupant
                    .map(|index| self.boxes[index].color.as_str()),
            )
        });
        Ok(enumerate_available(cell, corners, &self.goals))
    }
}

impl World for CornerWorld {
    fn kind(&self) -> WorldKind {
        WorldKind::Corner
    }

    fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot::Corner(CornerSnapshot {
            rows: self.rows,
            cols: self.cols,
            boxes: self
                .boxes
                .iter()
                .map(|b| CornerBoxState {
                    color: b.color.clone(),
                    location: b.location,
                    delivered: b.delivered,
                })
                .collect(),
            agents: self
                .agents
                .iter()
                .map(|a| CornerAgentState {
                    id: a.id,
                    cell: a.cell,
                })
                .collect(),
            goals: self.goals.clone(),
            corners: self
                .corners
                .iter()
                .map(|corner| CornerState {
                    position: corner.position,
                    connected_cells: corner.connected_cells.clone(),
                    occupant: corner.occupant.map(|index| self.boxes[index].color.clone()),
                })
                .collect(),
        })
    }

    fn apply(&mut self, action: &Action) -> Result<(), MoveError> {
        match action.verb {
            Verb::Stay => Ok(()),
            Verb::ToCorner(target) => self
                .move_box_corner_to_corner(action.agent, &action.color, target)
                .map(|_| ()),
            Verb::ToGoal(goal) => {
                let goal = match goal {
                    Some(goal) => goal,
                    None => self.agent_cell(action.agent)?,
                };
                self.move_box_corner_to_goal(action.agent, &action.color, goal)
                    .map(|_| ())
            }
            Verb::Move(_) => Err(MoveError::Unsupported {
                verb: action.verb.name(),
                world: WorldKind::Corner.name(),
            }),
        }
    }

    fn coverage(&self) -> Coverage {
        cleared_colors(&self.goals)
    }

    fn is_complete(&self) -> bool {
        self.check_task_completion()
    }

    fn agent_count(&self) -> usize {
        self.agents.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corner(row: usize, col: usize, label: CornerLabel) -> CornerPosition {
        CornerPosition::new(row, col, label)
    }

    /// 2x2 world with one agent per cell and a red box at (1, 1, NW).
    fn centre_red() -> CornerWorld {
        let mut world = CornerWorld::new(2, 2);
        world
            .setup_scenario(
                &[("red".to_string(), Some(corner(1, 1, CornerLabel::NW)))],
                Goals::from([("red".to_string(), vec![Position::new(1, 1)])]),
                &[
                    Position::new(0, 0),
                    Position::new(0, 1),
                    Position::new(1, 0),
                    Position::new(1, 1),
                ],
            )
            .unwrap();
        world
    }

    #[test]
    fn test_corner_record_count_per_grid_size() {
        assert_eq!(CornerWorld::new(2, 2).corners().len(), 16);
        assert_eq!(CornerWorld::new(1, 1).corners().len(), 4);
        assert_eq!(CornerWorld::new(3, 5).corners().len(), 60);
    }

    #[test]
    fn test_interior_point_has_four_records_sharing_cells() {
        let world = CornerWorld::new(2, 2);
        let records: Vec<&Corner> = world.corners_at_point(1, 1).collect();
        assert_eq!(records.len(), 4);
        for record in &records {
            assert_eq!(record.connected_cells().len(), 4);
        }
        let labels: Vec<CornerLabel> = records.iter().map(|c| c.position().label).collect();
        assert_eq!(
            labels,
            vec![CornerLabel::SE, CornerLabel::SW, CornerLabel::NE, CornerLabel::NW]
        );
    }

    #[test]
    fn test_boundary_point_labels() {
        let world = CornerWorld::new(2, 2);
        assert!(world.corner(corner(0, 0, CornerLabel::SE)).is_some());
        assert!(world.corner(corner(0, 0, CornerLabel::NW)).is_none());
        let edge: Vec<&Corner> = world.corners_at_point(0, 1).collect();
        assert_eq!(edge.len(), 2);
        assert_eq!(
            edge[0].connected_cells(),
            &[Position::new(0, 1), Position::new(0, 0)]
        );
    }

    #[test]
    fn test_failed_setup_leaves_world_untouched() {
        let mut world = centre_red();
        let before = world.snapshot();

        let shared = corner(0, 0, CornerLabel::SE);
        assert_eq!(
            world.setup_scenario(
                &[("blue".to_string(), Some(shared)), ("green".to_string(), Some(shared))],
                Goals::new(),
                &[Position::new(0, 0)],
            ),
            Err(MoveError::CornerOccupied {
                corner: shared,
                occupant: "blue".to_string()
            })
        );
        assert_eq!(world.snapshot(), before);

        assert!(matches!(
            world.setup_scenario(&[], Goals::new(), &[Position::new(0, 0), Position::new(5, 0)]),
            Err(MoveError::OutOfRange(_))
        ));
        assert_eq!(
            world.setup_scenario(
                &[("blue".to_string(), Some(corner(0, 0, CornerLabel::NW)))],
                Goals::new(),
                &[],
            ),
            Err(MoveError::NoSuchCorner(corner(0, 0, CornerLabel::NW)))
        );
        assert_eq!(world.snapshot(), before);
        assert_eq!(world.agents().len(), 4);
    }

    #[test]
    fn test_place_box_rejects_missing_and_occupied_corner() {
        let mut world = CornerWorld::new(2, 2);
        let red = world.add_box("red");
        let blue = world.add_box("blue");
        assert_eq!(
            world.place_box_at_corner(red, corner(0, 0, CornerLabel::NW)),
            Err(MoveError::NoSuchCorner(corner(0, 0, CornerLabel::NW)))
        );
        world
            .place_box_at_corner(red, corner(1, 1, CornerLabel::NW))
            .unwrap();
        assert_eq!(
            world.place_box_at_corner(blue, corner(1, 1, CornerLabel::NW)),
            Err(MoveError::CornerOccupied {
                corner: corner(1, 1, CornerLabel::NW),
                occupant: "red".to_string()
            })
        );
        assert_eq!(world.boxes()[blue].location(), BoxLocation::Unplaced);
    }

    #[test]
    fn test_occupancy_is_per_labelled_record() {
        let mut world = centre_red();
        let from = world
            .move_box_corner_to_corner(0, "red", corner(1, 1, CornerLabel::SE))
            .unwrap();
        assert_eq!(from, corner(1, 1, CornerLabel::NW));
        let nw = world.corner(corner(1, 1, CornerLabel::NW)).unwrap();
        let se = world.corner(corner(1, 1, CornerLabel::SE)).unwrap();
        assert_eq!(nw.occupant(), None);
        assert_eq!(se.occupant(), Some(0));
        assert_eq!(
            world.boxes()[0].location(),
            BoxLocation::Corner(corner(1, 1, CornerLabel::SE))
        );
    }

    #[test]
    fn test_move_onto_occupied_corner_fails() {
        let mut world = centre_red();
        let blue = world.add_box("blue");
        world
            .place_box_at_corner(blue, corner(1, 1, CornerLabel::SE))
            .unwrap();
        let result = world.move_box_corner_to_corner(0, "red", corner(1, 1, CornerLabel::SE));
        assert!(matches!(result, Err(MoveError::CornerOccupied { .. })));
        assert_eq!(
            world.corner(corner(1, 1, CornerLabel::NW)).unwrap().occupant(),
            Some(0)
        );
        assert_eq!(
            world.corner(corner(1, 1, CornerLabel::SE)).unwrap().occupant(),
            Some(blue)
        );
    }

    #[test]
    fn test_target_outside_agent_cell_fails() {
        let mut world = centre_red();
        // (2, 2) only touches cell (1, 1); agent 0 sits in (0, 0).
        assert_eq!(
            world.move_box_corner_to_corner(0, "red", corner(2, 2, CornerLabel::NW)),
            Err(MoveError::CornerNotConnected {
                corner: corner(2, 2, CornerLabel::NW),
                cell: Position::new(0, 0)
            })
        );
        assert_eq!(
            world.move_box_corner_to_corner(0, "red", corner(9, 9, CornerLabel::NW)),
            Err(MoveError::NoSuchCorner(corner(9, 9, CornerLabel::NW)))
        );
    }

    #[test]
    fn test_goal_outside_agent_cell_fails() {
        let mut world = centre_red();
        assert_eq!(
            world.move_box_corner_to_goal(0, "red", Position::new(1, 1)),
            Err(MoveError::GoalOutsideCell {
                goal: Position::new(1, 1),
                cell: Position::new(0, 0)
            })
        );
        assert!(!world.boxes()[0].is_delivered());
    }

    #[test]
    fn test_delivery_completes_and_is_not_repeatable() {
        let mut world = centre_red();
        world
            .move_box_corner_to_goal(3, "red", Position::new(1, 1))
            .unwrap();
        assert!(world.check_task_completion());
        assert_eq!(world.boxes()[0].location(), BoxLocation::Goal(Position::new(1, 1)));
        assert_eq!(
            world.corner(corner(1, 1, CornerLabel::NW)).unwrap().occupant(),
            None
        );
        assert_eq!(world.coverage(), Coverage { met: 1, total: 1 });

        let again = world.move_box_corner_to_goal(3, "red", Position::new(1, 1));
        assert!(again.is_err());
        assert_eq!(world.coverage(), Coverage { met: 1, total: 1 });
        assert!(world.goal_status()[0].met);
    }

    #[test]
    fn test_delivery_consumes_one_slot_while_boxes_remain() {
        let mut world = CornerWorld::new(1, 1);
        world
            .setup_scenario(
                &[
                    ("red".to_string(), Some(corner(0, 0, CornerLabel::SE))),
                    ("red".to_string(), Some(corner(1, 1, CornerLabel::NW))),
                ],
                Goals::from([("red".to_string(), vec![Position::new(0, 0)])]),
                &[Position::new(0, 0)],
            )
            .unwrap();
        world
            .move_box_corner_to_goal(0, "red", Position::new(0, 0))
            .unwrap();
        assert!(world.goals()["red"].is_empty());
        assert!(!world.check_task_completion());
        // The slot is gone, so the second red box cannot use it.
        assert!(matches!(
            world.move_box_corner_to_goal(0, "red", Position::new(0, 0)),
            Err(MoveError::NoSuchGoal { .. })
        ));
    }

    #[test]
    fn test_region_goal_clears_with_last_box() {
        let mut world = CornerWorld::new(2, 2);
        world
            .setup_scenario(
                &[("purple".to_string(), Some(corner(1, 1, CornerLabel::SE)))],
                Goals::from([(
                    "purple".to_string(),
                    vec![Position::new(0, 0), Position::new(1, 1)],
                )]),
                &[Position::new(0, 0)],
            )
            .unwrap();
        world
            .move_box_corner_to_goal(0, "purple", Position::new(0, 0))
            .unwrap();
        assert!(world.goals()["purple"].is_empty());
        assert_eq!(world.success_rate(), 1.0);
    }

    #[test]
    fn test_available_actions_for_agent() {
        let world = centre_red();
        let actions = world.available_actions(3).unwrap();
        // Nine records touch cell (1, 1): four at (1, 1), two each at (1, 2)
        // and (2, 1), one at (2, 2). Red holds one, leaving eight targets.
        assert_eq!(actions.len(), 8 + 1 + 1);
        assert!(actions.contains(&AvailableAction::CornerToGoal {
            color: "red".to_string(),
            goal: Position::new(1, 1)
        }));
        assert_eq!(actions.last(), Some(&AvailableAction::DoNothing));
        assert_eq!(
            actions[0].to_string(),
            "move_box_corner_to_corner(red, (1, 1, SE))"
        );

        let snapshot = match world.snapshot() {
            WorldSnapshot::Corner(snapshot) => snapshot,
            WorldSnapshot::Grid(_) => unreachable!(),
        };
        assert_eq!(snapshot.available_actions(3), Some(actions));
    }

    #[test]
    fn test_occupancy_marks_empty_corners() {
        let world = centre_red();
        let occupancy = world.corner_occupancy();
        assert_eq!(occupancy.len(), 16);
        assert_eq!(
            occupancy
                .iter()
                .filter(|(_, occupant)| *occupant != EMPTY)
                .collect::<Vec<_>>(),
            vec![&(corner(1, 1, CornerLabel::NW), "red")]
        );
    }

    #[test]
    fn test_apply_routes_verbs() {
        let mut world = CornerWorld::boxnet2();
        world
            .apply(&Action::to_corner(0, "red", corner(1, 1, CornerLabel::SE)))
            .unwrap();
        world.apply(&Action::to_goal(3, "red", None)).unwrap();
        assert_eq!(
            world.apply(&Action::step(
                0,
                "blue",
                Position::new(0, 0),
                crate::Direction::Down
            )),
            Err(MoveError::Unsupported {
                verb: "move",
                world: "corner world"
            })
        );
        world.apply(&Action::stay(7)).unwrap();
        assert_eq!(world.coverage(), Coverage { met: 1, total: 2 });
    }
}

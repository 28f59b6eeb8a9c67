use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{AgentId, Color, CornerPosition, Direction, Position};

/// Color recorded on actions that touch no box.
pub const NO_COLOR: &str = "none";

/// What an action does to its box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verb", content = "target")]
pub enum Verb {
    /// One cardinal step from the action's source cell.
    Move(Direction),
    /// Deliver to a goal; `None` lets the world pick the acting agent's own cell.
    ToGoal(Option<Position>),
    /// Corner-to-corner move within the acting agent's cell.
    ToCorner(CornerPosition),
    Stay,
}

impl Verb {
    pub fn name(&self) -> &'static str {
        match self {
            Verb::Move(_) => "move",
            Verb::ToGoal(_) => "to-goal",
            Verb::ToCorner(_) => "to-corner",
            Verb::Stay => "stay",
        }
    }
}

/// One step of a plan. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub agent: AgentId,
    pub color: Color,
    pub source: Option<Position>,
    pub verb: Verb,
}

impl Action {
    pub fn stay(agent: AgentId) -> Self {
        Self {
            agent,
            color: NO_COLOR.to_string(),
            source: None,
            verb: Verb::Stay,
        }
    }

    pub fn step(
        agent: AgentId,
        color: impl Into<Color>,
        source: Position,
        direction: Direction,
    ) -> Self {
        Self {
            agent,
            color: color.into(),
            source: Some(source),
            verb: Verb::Move(direction),
        }
    }

    pub fn to_goal(agent: AgentId, color: impl Into<Color>, goal: Option<Position>) -> Self {
        Self {
            agent,
            color: color.into(),
            source: None,
            verb: Verb::ToGoal(goal),
        }
    }

    pub fn to_corner(agent: AgentId, color: impl Into<Color>, target: CornerPosition) -> Self {
        Self {
            agent,
            color: color.into(),
            source: None,
            verb: Verb::ToCorner(target),
        }
    }

    pub fn is_stay(&self) -> bool {
        self.verb == Verb::Stay
    }
}

/// Renders the canonical plan-line phrasing, which [`crate::parser`] reads back
/// for every action that has one. A move without a source cell has none.
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Agent {}: ", self.agent)?;
        match (&self.verb, self.source) {
            (Verb::Stay, _) => f.write_str("do nothing"),
            (Verb::Move(direction), Some(source)) => match source.step(*direction) {
                Some(to) => write!(
                    f,
                    "move {} box from {} to {} {}",
                    self.color, source, to, direction
                ),
                // Off the top or left edge; the direction alone is still readable.
                None => write!(f, "move {} box from {} {}", self.color, source, direction),
            },
            (Verb::Move(direction), None) => write!(f, "move {} box {}", self.color, direction),
            (Verb::ToGoal(None), _) => write!(f, "move {} box to goal", self.color),
            (Verb::ToGoal(Some(goal)), _) => write!(f, "move {} box to goal {}", self.color, goal),
            (Verb::ToCorner(target), _) => {
                write!(f, "move {} box to corner {}", self.color, target)
            }
        }
    }
}

/// Ordered actions. Order is execution order, not agent order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionPlan {
    actions: Vec<Action>,
}

impl ActionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn extend(&mut self, other: ActionPlan) {
        self.actions.extend(other.actions);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    pub fn as_slice(&self) -> &[Action] {
        &self.actions
    }

    /// First action assigned to `agent`.
    pub fn first_for(&self, agent: AgentId) -> Option<&Action> {
        self.actions.iter().find(|a| a.agent == agent)
    }

    /// Keeps only the most recent action of each agent, in the order those
    /// surviving actions were originally issued.
    pub fn latest_per_agent(&self) -> ActionPlan {
        let mut last: HashMap<AgentId, usize> = HashMap::new();
        for (index, action) in self.actions.iter().enumerate() {
            last.insert(action.agent, index);
        }
        self.actions
            .iter()
            .enumerate()
            .filter(|(index, action)| last.get(&action.agent) == Some(index))
            .map(|(_, action)| action.clone())
            .collect()
    }

    pub fn without_stays(&self) -> ActionPlan {
        self.actions.iter().filter(|a| !a.is_stay()).cloned().collect()
    }

    /// One plan line per action.
    pub fn to_text(&self) -> String {
        self.actions
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl FromIterator<Action> for ActionPlan {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Action>> for ActionPlan {
    fn from(actions: Vec<Action>) -> Self {
        Self { actions }
    }
}

impl IntoIterator for ActionPlan {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl<'a> IntoIterator for &'a ActionPlan {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

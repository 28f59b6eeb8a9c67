//! The planning side of a trial.
//!
//! A [`Planner`] answers a [`PlanningRequest`] with reply text that the
//! [`crate::parser`] turns into actions. The language model itself sits
//! behind [`LanguageModel`]; this crate ships no client for it.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;
use tracing::trace;

use crate::trial::DialogueHistory;
use crate::world::{CornerSnapshot, GridSnapshot, WorldSnapshot};
use crate::{Action, ActionPlan, AgentId, Direction};

#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("language model call failed: {0}")]
    Model(String),

    #[error("failed to render prompt: {0}")]
    Prompt(#[from] serde_json::Error),

    #[error("no scripted replies left")]
    Exhausted,
}

/// A reply and what it cost.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub text: String,
    pub tokens: u64,
}

impl Completion {
    pub fn new(text: impl Into<String>, tokens: u64) -> Self {
        Self {
            text: text.into(),
            tokens,
        }
    }
}

/// Prompt in, completion out.
pub trait LanguageModel {
    fn complete(&mut self, prompt: &str) -> Result<Completion, PlannerError>;
}

/// Who is being asked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Role {
    /// Plan for every agent at once.
    Central,
    /// Propose this agent's next action.
    Local { agent: AgentId },
    /// Accept or object to the action the central planner assigned this agent.
    Review { agent: AgentId, assigned: String },
    /// Answer `EXECUTE: <plan>` to run the shared plan, or `PROCEED: <reason>`.
    Ratify { agent: AgentId, plan: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanningRequest<'a> {
    #[serde(flatten)]
    pub role: Role,
    pub state: &'a WorldSnapshot,
    pub history: &'a DialogueHistory,
    /// Why the previous attempt failed, when replanning.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<&'a str>,
}

impl<'a> PlanningRequest<'a> {
    pub fn new(role: Role, state: &'a WorldSnapshot, history: &'a DialogueHistory) -> Self {
        Self {
            role,
            state,
            history,
            feedback: None,
        }
    }

    pub fn with_feedback(mut self, feedback: &'a str) -> Self {
        self.feedback = Some(feedback);
        self
    }
}

pub trait Planner {
    fn plan(&mut self, request: &PlanningRequest<'_>) -> Result<Completion, PlannerError>;
}

impl<P: Planner + ?Sized> Planner for Box<P> {
    fn plan(&mut self, request: &PlanningRequest<'_>) -> Result<Completion, PlannerError> {
        (**self).plan(request)
    }
}

/// Renders a request into prompt text.
pub trait Prompter {
    fn render(&self, request: &PlanningRequest<'_>) -> Result<String, PlannerError>;
}

/// Sends the request as a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPrompter;

impl Prompter for JsonPrompter {
    fn render(&self, request: &PlanningRequest<'_>) -> Result<String, PlannerError> {
        Ok(serde_json::to_string_pretty(request)?)
    }
}

/// A [`Planner`] backed by a language model.
#[derive(Debug)]
pub struct ModelPlanner<M, P = JsonPrompter> {
    model: M,
    prompter: P,
}

impl<M: LanguageModel> ModelPlanner<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            prompter: JsonPrompter,
        }
    }
}

impl<M: LanguageModel, P: Prompter> ModelPlanner<M, P> {
    pub fn with_prompter(model: M, prompter: P) -> Self {
        Self { model, prompter }
    }

    pub fn into_model(self) -> M {
        self.model
    }
}

impl<M: LanguageModel, P: Prompter> Planner for ModelPlanner<M, P> {
    fn plan(&mut self, request: &PlanningRequest<'_>) -> Result<Completion, PlannerError> {
        let prompt = self.prompter.render(request)?;
        trace!(prompt_len = prompt.len(), "prompting model");
        self.model.complete(&prompt)
    }
}

/// Replays canned replies in order and records every role it was asked as.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlanner {
    replies: VecDeque<String>,
    requests: Vec<Role>,
}

impl ScriptedPlanner {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            requests: Vec::new(),
        }
    }

    pub fn requests(&self) -> &[Role] {
        &self.requests
    }

    pub fn remaining(&self) -> usize {
        self.replies.len()
    }
}

impl Planner for ScriptedPlanner {
    fn plan(&mut self, request: &PlanningRequest<'_>) -> Result<Completion, PlannerError> {
        self.requests.push(request.role.clone());
        let text = self.replies.pop_front().ok_or(PlannerError::Exhausted)?;
        let tokens = text.split_whitespace().count() as u64;
        Ok(Completion { text, tokens })
    }
}

/// Baseline that picks uniformly among in-bounds moves, or among a corner
/// agent's available actions. Agrees with every review and ratifies every
/// shared plan as given.
#[derive(Debug)]
pub struct RandomPlanner {
    rng: StdRng,
}

impl RandomPlanner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn propose(&mut self, agent: AgentId, state: &WorldSnapshot) -> Action {
        let mut options = match state {
            WorldSnapshot::Grid(grid) => grid_options(agent, grid),
            WorldSnapshot::Corner(corner) => corner_options(agent, corner),
        };
        if options.is_empty() {
            return Action::stay(agent);
        }
        let index = self.rng.random_range(0..options.len());
        options.swap_remove(index)
    }
}

fn grid_options(agent: AgentId, grid: &GridSnapshot) -> Vec<Action> {
    let Some(cells) = grid.agents.iter().find(|a| a.id == agent).map(|a| &a.cells) else {
        return Vec::new();
    };
    let mut options = vec![Action::stay(agent)];
    for state in &grid.boxes {
        for source in state.positions.iter().filter(|p| cells.contains(p)) {
            for direction in Direction::ALL {
                let in_bounds = source
                    .step(direction)
                    .is_some_and(|to| to.row < grid.rows && to.col < grid.cols);
                if in_bounds {
                    options.push(Action::step(agent, state.color.clone(), *source, direction));
                }
            }
        }
    }
    options
}

fn corner_options(agent: AgentId, corner: &CornerSnapshot) -> Vec<Action> {
    corner
        .available_actions(agent)
        .unwrap_or_default()
        .into_iter()
        .map(|available| available.into_action(agent))
        .collect()
}

impl Planner for RandomPlanner {
    fn plan(&mut self, request: &PlanningRequest<'_>) -> Result<Completion, PlannerError> {
        let text = match &request.role {
            Role::Review { .. } => "agree".to_string(),
            Role::Ratify { plan, .. } => format!("EXECUTE: {plan}"),
            Role::Local { agent } => self.propose(*agent, request.state).to_string(),
            Role::Central => request
                .state
                .agent_ids()
                .into_iter()
                .map(|agent| self.propose(agent, request.state))
                .collect::<ActionPlan>()
                .to_text(),
        };
        Ok(Completion { text, tokens: 0 })
    }
}

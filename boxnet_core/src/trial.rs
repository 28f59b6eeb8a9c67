//! Planning protocols.
//!
//! A trial drives one world with one planner under a [`Protocol`] and reports
//! what came of it. Worlds are never shared between trials.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::executor::{ExecutionReport, execute_plan};
use crate::parser::{ParseDiagnostic, parse_plan};
use crate::planner::{Completion, Planner, PlannerError, PlanningRequest, Role};
use crate::{Action, ActionPlan, AgentId, World, WorldSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// One central plan, executed once.
    Centralized,
    /// Central plan; on failure, plan again against the partly mutated world.
    Replanning,
    /// Agents take turns proposing their own actions over several rounds.
    Dialogue,
    /// Central plan reviewed by every agent and revised until all agree.
    Consensus,
    /// Central plan run only once every agent answers `EXECUTE` with the same plan.
    Unanimous,
}

impl Protocol {
    pub const ALL: [Protocol; 5] = [
        Protocol::Centralized,
        Protocol::Replanning,
        Protocol::Dialogue,
        Protocol::Consensus,
        Protocol::Unanimous,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Centralized => "centralized",
            Protocol::Replanning => "replanning",
            Protocol::Dialogue => "dialogue",
            Protocol::Consensus => "consensus",
            Protocol::Unanimous => "unanimous",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the protocol names and the short framework names (`cmas`, `etp`,
/// `dmas`, `hmas1`, `hmas2`).
impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "centralized" | "cmas" => Ok(Protocol::Centralized),
            "replanning" | "etp" => Ok(Protocol::Replanning),
            "dialogue" | "dmas" => Ok(Protocol::Dialogue),
            "consensus" | "hmas2" | "hmas-2" => Ok(Protocol::Consensus),
            "unanimous" | "hmas1" | "hmas-1" => Ok(Protocol::Unanimous),
            other => Err(format!("unknown protocol '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    /// Plans requested by [`Protocol::Replanning`], counting the first.
    pub max_attempts: usize,
    pub dialogue_rounds: usize,
    /// Review rounds in [`Protocol::Consensus`].
    pub feedback_rounds: usize,
    /// Ratification rounds in [`Protocol::Unanimous`].
    pub unanimity_rounds: usize,
    /// Keep only each agent's latest non-stay proposal after a dialogue.
    pub dedupe_latest: bool,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            dialogue_rounds: 3,
            feedback_rounds: 3,
            unanimity_rounds: 10,
            dedupe_latest: true,
        }
    }
}

impl TrialConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Central,
    Agent(AgentId),
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::Central => f.write_str("Central"),
            Speaker::Agent(id) => write!(f, "Agent {id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Everything said so far in one trial, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DialogueHistory {
    turns: Vec<Turn>,
}

impl DialogueHistory {
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.turns.push(Turn {
            speaker,
            text: text.into(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker, turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialOutcome {
    pub protocol: Protocol,
    pub success_rate: f64,
    pub complete: bool,
    /// Actions applied across every executed plan.
    pub steps: usize,
    pub api_calls: usize,
    pub tokens: u64,
    /// Report of the last executed plan. When no plan was agreed on this is
    /// the report of the empty plan.
    pub execution: ExecutionReport,
    pub diagnostics: Vec<ParseDiagnostic>,
    pub history: DialogueHistory,
}

/// Planner calls and parse results accumulated over one trial.
struct Session<'p, P: ?Sized> {
    planner: &'p mut P,
    history: DialogueHistory,
    diagnostics: Vec<ParseDiagnostic>,
    api_calls: usize,
    tokens: u64,
}

impl<'p, P: Planner + ?Sized> Session<'p, P> {
    fn new(planner: &'p mut P) -> Self {
        Self {
            planner,
            history: DialogueHistory::default(),
            diagnostics: Vec::new(),
            api_calls: 0,
            tokens: 0,
        }
    }

    fn request(
        &mut self,
        role: Role,
        state: &WorldSnapshot,
        feedback: Option<&str>,
    ) -> Result<Completion, PlannerError> {
        let mut request = PlanningRequest::new(role, state, &self.history);
        if let Some(feedback) = feedback {
            request = request.with_feedback(feedback);
        }
        let completion = self.planner.plan(&request)?;
        self.api_calls += 1;
        self.tokens += completion.tokens;
        Ok(completion)
    }

    /// Asks for a central plan and records it in the history.
    fn central(
        &mut self,
        state: &WorldSnapshot,
        feedback: Option<&str>,
    ) -> Result<String, PlannerError> {
        let text = self.request(Role::Central, state, feedback)?.text;
        self.history.push(Speaker::Central, text.trim());
        Ok(text)
    }

    fn parse(&mut self, text: &str) -> ActionPlan {
        let parsed = parse_plan(text);
        self.diagnostics.extend(parsed.diagnostics);
        parsed.plan
    }
}

/// Runs one trial of `protocol` against `world`.
///
/// Planner failures abort the trial; illegal actions only end the current
/// plan and show up in the outcome.
pub fn run_trial<W, P>(
    protocol: Protocol,
    world: &mut W,
    planner: &mut P,
    config: &TrialConfig,
) -> Result<TrialOutcome, PlannerError>
where
    W: World + ?Sized,
    P: Planner + ?Sized,
{
    info!(%protocol, world = world.kind().name(), "trial started");
    let mut session = Session::new(planner);
    let (execution, steps) = match protocol {
        Protocol::Centralized => centralized(world, &mut session)?,
        Protocol::Replanning => replanning(world, &mut session, config)?,
        Protocol::Dialogue => dialogue(world, &mut session, config)?,
        Protocol::Consensus => consensus(world, &mut session, config)?,
        Protocol::Unanimous => unanimous(world, &mut session, config)?,
    };

    let outcome = TrialOutcome {
        protocol,
        success_rate: world.success_rate(),
        complete: world.is_complete(),
        steps,
        api_calls: session.api_calls,
        tokens: session.tokens,
        execution,
        diagnostics: session.diagnostics,
        history: session.history,
    };
    info!(
        %protocol,
        success_rate = outcome.success_rate,
        complete = outcome.complete,
        api_calls = outcome.api_calls,
        "trial finished"
    );
    Ok(outcome)
}

fn centralized<W, P>(
    world: &mut W,
    session: &mut Session<'_, P>,
) -> Result<(ExecutionReport, usize), PlannerError>
where
    W: World + ?Sized,
    P: Planner + ?Sized,
{
    let text = session.central(&world.snapshot(), None)?;
    let plan = session.parse(&text);
    let report = execute_plan(world, &plan);
    let steps = report.applied;
    Ok((report, steps))
}

fn replanning<W, P>(
    world: &mut W,
    session: &mut Session<'_, P>,
    config: &TrialConfig,
) -> Result<(ExecutionReport, usize), PlannerError>
where
    W: World + ?Sized,
    P: Planner + ?Sized,
{
    let attempts = config.max_attempts.max(1);
    let mut steps = 0;
    let mut feedback: Option<String> = None;
    let mut attempt = 1;
    loop {
        let text = session.central(&world.snapshot(), feedback.as_deref())?;
        let plan = session.parse(&text);
        let report = execute_plan(world, &plan);
        steps += report.applied;
        if report.success || attempt >= attempts {
            return Ok((report, steps));
        }
        feedback = report.failure.as_ref().map(|failure| {
            format!(
                "action {} ({}) failed: {}",
                failure.index + 1,
                failure.action,
                failure.error
            )
        });
        info!(attempt, "plan failed, replanning");
        attempt += 1;
    }
}

fn dialogue<W, P>(
    world: &mut W,
    session: &mut Session<'_, P>,
    config: &TrialConfig,
) -> Result<(ExecutionReport, usize), PlannerError>
where
    W: World + ?Sized,
    P: Planner + ?Sized,
{
    let state = world.snapshot();
    let agents = state.agent_ids();
    let mut proposals = ActionPlan::new();

    for round in 1..=config.dialogue_rounds {
        for &agent in &agents {
            let reply = session.request(Role::Local { agent }, &state, None)?;
            session.history.push(Speaker::Agent(agent), reply.text.trim());
            proposals.extend(session.parse(&reply.text));
        }
        debug!(round, proposals = proposals.len(), "dialogue round finished");
    }

    let plan = if config.dedupe_latest {
        proposals.latest_per_agent().without_stays()
    } else {
        proposals
    };
    let report = execute_plan(world, &plan);
    let steps = report.applied;
    Ok((report, steps))
}

fn consensus<W, P>(
    world: &mut W,
    session: &mut Session<'_, P>,
    config: &TrialConfig,
) -> Result<(ExecutionReport, usize), PlannerError>
where
    W: World + ?Sized,
    P: Planner + ?Sized,
{
    let state = world.snapshot();
    let agents = state.agent_ids();
    let mut text = session.central(&state, None)?;

    for round in 1..=config.feedback_rounds {
        let proposal = parse_plan(&text).plan;
        let mut objections = Vec::new();
        for &agent in &agents {
            let assigned = proposal
                .first_for(agent)
                .map_or_else(|| Action::stay(agent).to_string(), Action::to_string);
            let reply = session.request(Role::Review { agent, assigned }, &state, None)?;
            let verdict = reply.text.trim();
            session.history.push(Speaker::Agent(agent), verdict);
            if !verdict.eq_ignore_ascii_case("agree") {
                objections.push(format!("Agent {agent}: {verdict}"));
            }
        }
        if objections.is_empty() {
            info!(round, "every agent agreed");
            break;
        }
        debug!(round, objections = objections.len(), "revising plan");
        text = session.central(&state, Some(&objections.join("\n")))?;
    }

    let plan = session.parse(&text);
    let report = execute_plan(world, &plan);
    let steps = report.applied;
    Ok((report, steps))
}

/// The shared plan is fixed; agents only see each other's earlier answers
/// through the history. An `EXECUTE` whose plan reads as empty counts as no
/// answer.
fn unanimous<W, P>(
    world: &mut W,
    session: &mut Session<'_, P>,
    config: &TrialConfig,
) -> Result<(ExecutionReport, usize), PlannerError>
where
    W: World + ?Sized,
    P: Planner + ?Sized,
{
    let state = world.snapshot();
    let agents = state.agent_ids();
    let shared = session.central(&state, None)?.trim().to_string();
    let mut agreed: Option<ActionPlan> = None;

    for round in 1..=config.unanimity_rounds {
        let mut ratified: Vec<(String, ActionPlan)> = Vec::with_capacity(agents.len());
        for &agent in &agents {
            let role = Role::Ratify {
                agent,
                plan: shared.clone(),
            };
            let reply = session.request(role, &state, None)?;
            let answer = reply.text.trim();
            session.history.push(Speaker::Agent(agent), answer);
            if let Some(text) = answer.strip_prefix("EXECUTE:") {
                let plan = parse_plan(text).plan;
                if !plan.is_empty() {
                    ratified.push((text.to_string(), plan));
                }
            }
        }
        let agreed_by_all = ratified.len() == agents.len()
            && ratified.windows(2).all(|pair| pair[0].1 == pair[1].1);
        if agreed_by_all && !ratified.is_empty() {
            info!(round, "every agent ratified the same plan");
            let (text, _) = ratified.swap_remove(0);
            agreed = Some(session.parse(&text));
            break;
        }
        debug!(round, ratified = ratified.len(), "no unanimous plan");
    }

    let plan = agreed.unwrap_or_else(|| {
        warn!(rounds = config.unanimity_rounds, "no plan ratified, nothing executed");
        ActionPlan::new()
    });
    let report = execute_plan(world, &plan);
    let steps = report.applied;
    Ok((report, steps))
}

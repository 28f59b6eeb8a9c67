//! Turns a planner's free-text reply into an [`ActionPlan`].
//!
//! Parsing never fails outright: lines matching no grammar are dropped and
//! reported in [`ParsedPlan::diagnostics`], and whatever else was readable is
//! kept in its original order.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{Action, ActionPlan, AgentId, CornerLabel, CornerPosition, Direction, Position};

static AGENT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^.*?\bagent\s*_?\s*(\d+)\s*:\s*(.*)$").expect("agent prefix pattern")
});

static AGENT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:agent\s*_?\s*)?(\d+)\s*$").expect("agent key pattern")
});

static TO_GOAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^move\s+(?:the\s+)?(\w+)\s+box\s+(?:from\s*\(\s*\d+\s*,\s*\d+\s*\)\s*)?to\s+(?:the\s+|its\s+)?goal\b(?:\s*(?:at\s*)?\(\s*(\d+)\s*,\s*(\d+)\s*\))?",
    )
    .expect("to-goal pattern")
});

static TO_CORNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^move\s+(?:the\s+)?(\w+)\s+box\s+(?:from\s+.*?\s+)?to\s+(?:the\s+)?corner\s*\(\s*(\d+)\s*,\s*(\d+)\s*,\s*['"]?(NE|NW|SE|SW)['"]?\s*\)"#,
    )
    .expect("to-corner pattern")
});

static CALL_CORNER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^move_box_corner_to_corner\(\s*['"]?(\w+)['"]?\s*,\s*\(\s*(\d+)\s*,\s*(\d+)\s*,\s*['"]?(NE|NW|SE|SW)['"]?\s*\)\s*\)"#,
    )
    .expect("corner call pattern")
});

static CALL_GOAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^move_box_corner_to_goal\(\s*['"]?(\w+)['"]?\s*,\s*\(\s*(\d+)\s*,\s*(\d+)\s*\)\s*\)"#,
    )
    .expect("goal call pattern")
});

static STEP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^move\s+(?:the\s+)?(\w+)\s+box\s+from\s*\(\s*(\d+)\s*,\s*(\d+)\s*\)(?:\s*to\s*\(\s*(\d+)\s*,\s*(\d+)\s*\))?(?:\s*\[([^\]]*)\]|\s*([a-z]+(?:\s*,\s*[a-z]+)*))?",
    )
    .expect("step pattern")
});

static STAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:do\s+nothing|stand\s*-?\s*by|stay|wait|idle)\b|do_nothing\(\s*\))")
        .expect("stay pattern")
});

/// Why a line contributed no actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DropReason {
    #[error("line matches no plan grammar")]
    Unrecognized,

    #[error("unrecognized direction '{0}'")]
    UnknownDirection(String),

    #[error("no direction given for the move from {0}")]
    MissingDirection(Position),

    #[error("{from} and {to} are not adjacent and no direction was given")]
    NotAdjacent { from: Position, to: Position },

    #[error("mapping key '{0}' names no agent")]
    BadAgentKey(String),

    #[error("value for '{0}' is not a string")]
    NonStringValue(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostic {
    /// 1-based line number, or entry number for mapping and array replies.
    pub line_no: usize,
    pub line: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlan {
    pub plan: ActionPlan,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParsedPlan {
    fn record(&mut self, line_no: usize, line: &str, result: Result<Vec<Action>, DropReason>) {
        match result {
            Ok(actions) => {
                for action in actions {
                    self.plan.push(action);
                }
            }
            Err(reason) => {
                debug!(line_no, line, %reason, "plan line dropped");
                self.diagnostics.push(ParseDiagnostic {
                    line_no,
                    line: line.trim().to_string(),
                    reason,
                });
            }
        }
    }
}

/// Parses a reply that is either plain text, one action per line, or a JSON
/// document: an object keyed by agent or an array of action strings.
pub fn parse_plan(reply: &str) -> ParsedPlan {
    let body = strip_fence(reply.trim());
    if body.starts_with('{') || body.starts_with('[') {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => return parse_mapping(&map),
            Ok(Value::Array(items)) => return parse_items(&items),
            _ => {}
        }
    }
    parse_lines(reply)
}

/// Parses an agent-keyed mapping such as `{"Agent0": "move red box ..."}`.
///
/// Entries are read in reply order. Values may repeat the `Agent N:` prefix;
/// the key decides the agent either way.
pub fn parse_mapping(map: &Map<String, Value>) -> ParsedPlan {
    let mut parsed = ParsedPlan::default();
    for (index, (key, value)) in map.iter().enumerate() {
        let line_no = index + 1;
        let agent = agent_key(key);
        let Value::String(text) = value else {
            parsed.record(
                line_no,
                &format!("{key}: {value}"),
                Err(DropReason::NonStringValue(key.clone())),
            );
            continue;
        };
        let line = format!("{key}: {text}");
        let Some(agent) = agent else {
            parsed.record(line_no, &line, Err(DropReason::BadAgentKey(key.clone())));
            continue;
        };
        let body = match AGENT_PREFIX.captures(text) {
            Some(caps) => caps.get(2).map_or("", |m| m.as_str()),
            None => text.as_str(),
        };
        parsed.record(line_no, &line, parse_body(agent, body));
    }
    parsed
}

fn parse_items(items: &[Value]) -> ParsedPlan {
    let mut parsed = ParsedPlan::default();
    for (index, item) in items.iter().enumerate() {
        let line_no = index + 1;
        match item {
            Value::String(text) => {
                let line = clean(text);
                if !is_filler(line) {
                    parsed.record(line_no, text, parse_line(line));
                }
            }
            other => parsed.record(
                line_no,
                &other.to_string(),
                Err(DropReason::NonStringValue(format!("#{line_no}"))),
            ),
        }
    }
    parsed
}

fn parse_lines(text: &str) -> ParsedPlan {
    let mut parsed = ParsedPlan::default();
    for (index, raw) in text.lines().enumerate() {
        let line = clean(raw);
        if is_filler(line) {
            continue;
        }
        parsed.record(index + 1, raw, parse_line(line));
    }
    parsed
}

fn parse_line(line: &str) -> Result<Vec<Action>, DropReason> {
    let caps = AGENT_PREFIX
        .captures(line)
        .ok_or(DropReason::Unrecognized)?;
    let agent = caps[1]
        .parse::<AgentId>()
        .map_err(|_| DropReason::Unrecognized)?;
    parse_body(agent, caps.get(2).map_or("", |m| m.as_str()))
}

/// Parses the part of a line after `Agent N:`.
fn parse_body(agent: AgentId, body: &str) -> Result<Vec<Action>, DropReason> {
    let body = clean(body);

    if let Some(caps) = TO_GOAL.captures(body) {
        let goal = match caps.get(2) {
            Some(_) => Some(position(&caps, 2, 3).ok_or(DropReason::Unrecognized)?),
            None => None,
        };
        return Ok(vec![Action::to_goal(agent, color(&caps), goal)]);
    }
    if let Some(caps) = TO_CORNER.captures(body).or_else(|| CALL_CORNER.captures(body)) {
        let target = corner(&caps).ok_or(DropReason::Unrecognized)?;
        return Ok(vec![Action::to_corner(agent, color(&caps), target)]);
    }
    if let Some(caps) = CALL_GOAL.captures(body) {
        let goal = position(&caps, 2, 3).ok_or(DropReason::Unrecognized)?;
        return Ok(vec![Action::to_goal(agent, color(&caps), Some(goal))]);
    }
    if let Some(caps) = STEP.captures(body) {
        let source = position(&caps, 2, 3).ok_or(DropReason::Unrecognized)?;
        let destination = position(&caps, 4, 5);
        let tokens: Vec<&str> = caps
            .get(6)
            .or_else(|| caps.get(7))
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|t| t.trim().trim_matches(|c: char| c == '"' || c == '\''))
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let directions = resolve_directions(source, destination, &tokens)?;
        return Ok(expand(agent, &color(&caps), source, &directions));
    }
    if STAY.is_match(body) {
        return Ok(vec![Action::stay(agent)]);
    }
    Err(DropReason::Unrecognized)
}

/// An explicit token wins over the coordinate delta. A lone unreadable token
/// falls back to the delta; an unreadable token inside a multi-step list drops
/// the line, since every later source cell depends on it.
fn resolve_directions(
    source: Position,
    destination: Option<Position>,
    tokens: &[&str],
) -> Result<Vec<Direction>, DropReason> {
    let inferred = destination.and_then(|to| Direction::between(source, to));
    match tokens {
        [] => match (inferred, destination) {
            (Some(direction), _) => Ok(vec![direction]),
            (None, Some(to)) => Err(DropReason::NotAdjacent { from: source, to }),
            (None, None) => Err(DropReason::MissingDirection(source)),
        },
        [token] => match token.parse::<Direction>() {
            Ok(direction) => Ok(vec![direction]),
            Err(_) => inferred
                .map(|direction| vec![direction])
                .ok_or_else(|| DropReason::UnknownDirection(token.to_string())),
        },
        _ => tokens
            .iter()
            .map(|token| {
                token
                    .parse::<Direction>()
                    .map_err(|_| DropReason::UnknownDirection(token.to_string()))
            })
            .collect(),
    }
}

/// One single-step action per direction, each starting where the previous one ended.
fn expand(agent: AgentId, color: &str, source: Position, directions: &[Direction]) -> Vec<Action> {
    let mut actions = Vec::with_capacity(directions.len());
    let mut at = Some(source);
    for &direction in directions {
        let Some(from) = at else { break };
        actions.push(Action::step(agent, color, from, direction));
        at = from.step(direction);
    }
    actions
}

fn agent_key(key: &str) -> Option<AgentId> {
    AGENT_KEY.captures(key)?[1].parse().ok()
}

fn color(caps: &Captures<'_>) -> String {
    caps[1].to_ascii_lowercase()
}

fn position(caps: &Captures<'_>, row: usize, col: usize) -> Option<Position> {
    let row = caps.get(row)?.as_str().parse().ok()?;
    let col = caps.get(col)?.as_str().parse().ok()?;
    Some(Position::new(row, col))
}

fn corner(caps: &Captures<'_>) -> Option<CornerPosition> {
    let Position { row, col } = position(caps, 2, 3)?;
    let label: CornerLabel = caps.get(4)?.as_str().parse().ok()?;
    Some(CornerPosition::new(row, col, label))
}

fn clean(raw: &str) -> &str {
    let line = raw.trim();
    let line = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .unwrap_or(line);
    line.trim()
        .trim_matches(|c: char| c == '"' || c == '\'')
        .trim_end_matches(['.', ',', ';'])
        .trim()
}

fn is_filler(line: &str) -> bool {
    line.is_empty() || line.starts_with("```") || line.eq_ignore_ascii_case("plan:")
}

fn strip_fence(reply: &str) -> &str {
    let Some(rest) = reply.strip_prefix("```") else {
        return reply;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().trim_end_matches("```").trim()
}

use serde::Serialize;
use tracing::{debug, warn};

use crate::{Action, ActionPlan, MoveError, World};

/// The action that stopped a plan and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionFailure {
    /// Position of the failed action in the plan.
    pub index: usize,
    pub action: Action,
    #[serde(serialize_with = "display")]
    pub error: MoveError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionReport {
    /// Every action applied. Says nothing about whether the goals are met.
    pub success: bool,
    /// Actions applied before the run stopped.
    pub applied: usize,
    pub failure: Option<ExecutionFailure>,
}

impl ExecutionReport {
    fn completed(applied: usize) -> Self {
        ExecutionReport {
            success: true,
            applied,
            failure: None,
        }
    }
}

/// Applies `plan` in order, stopping at the first action the world refuses.
///
/// Actions before the failure stay applied; actions after it are never tried.
/// An empty plan succeeds without touching the world.
pub fn execute_plan<W: World + ?Sized>(world: &mut W, plan: &ActionPlan) -> ExecutionReport {
    for (index, action) in plan.iter().enumerate() {
        if let Err(error) = world.apply(action) {
            warn!(index, action = %action, %error, "plan halted");
            return ExecutionReport {
                success: false,
                applied: index,
                failure: Some(ExecutionFailure {
                    index,
                    action: action.clone(),
                    error,
                }),
            };
        }
        debug!(index, action = %action, "action applied");
    }
    ExecutionReport::completed(plan.len())
}

fn display<S: serde::Serializer>(error: &MoveError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

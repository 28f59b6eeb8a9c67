//! Goal maps and the two completion metrics.
//!
//! Slot coverage asks "how many declared `(color, cell)` slots currently hold a
//! box of that color". Cleared colors asks "how many colors have had their goal
//! list emptied". They are different shapes on purpose and are not unified.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{Color, Position};

/// Color → target cells.
pub type Goals = BTreeMap<Color, Vec<Position>>;

/// How a world scores partial progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessMetric {
    #[default]
    SlotCoverage,
    ClearedColors,
}

/// `met` out of `total` requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub met: usize,
    pub total: usize,
}

impl Coverage {
    /// Fraction in `0.0..=1.0`; an empty requirement set scores zero.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.met as f64 / self.total as f64
        }
    }

    pub fn is_full(&self) -> bool {
        self.total > 0 && self.met == self.total
    }
}

/// Distinct goal slots covered by at least one box of the matching color.
///
/// Several boxes piled on one slot count once; a slot left empty counts zero
/// even if its color has surplus boxes elsewhere.
pub fn slot_coverage<'a, I>(goals: &Goals, occupied: I) -> Coverage
where
    I: IntoIterator<Item = (&'a str, Position)>,
{
    let slots: BTreeSet<(&str, Position)> = goals
        .iter()
        .flat_map(|(color, cells)| cells.iter().map(move |cell| (color.as_str(), *cell)))
        .collect();
    let occupied: BTreeSet<(&str, Position)> = occupied.into_iter().collect();
    Coverage {
        met: slots.intersection(&occupied).count(),
        total: slots.len(),
    }
}

/// Colors whose goal list is now empty, out of every color that was declared.
pub fn cleared_colors(goals: &Goals) -> Coverage {
    Coverage {
        met: goals.values().filter(|cells| cells.is_empty()).count(),
        total: goals.len(),
    }
}

//! Filter Engine: a conjunction of vertical, days-stuck and status predicates.
//!
//! An empty selected set matches nothing. Callers that mean "everything"
//! resolve a [`FilterSelection`] against the dataset, which fills in the
//! full sets and range for anything left unselected.

use crate::dataset::Dataset;
use crate::models::DerivedOrder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub verticals: BTreeSet<String>,
    /// Inclusive lower bound on `days_stuck`.
    pub min_days_stuck: i64,
    /// Inclusive upper bound on `days_stuck`.
    pub max_days_stuck: i64,
    pub statuses: BTreeSet<String>,
}

impl FilterSpec {
    pub fn new(
        verticals: BTreeSet<String>,
        min_days_stuck: i64,
        max_days_stuck: i64,
        statuses: BTreeSet<String>,
    ) -> Self {
        Self {
            verticals,
            min_days_stuck,
            max_days_stuck,
            statuses,
        }
    }

    pub fn matches(&self, order: &DerivedOrder) -> bool {
        self.verticals.contains(order.vertical())
            && order.days_stuck >= self.min_days_stuck
            && order.days_stuck <= self.max_days_stuck
            && self.statuses.contains(order.status())
    }

    /// The filter matching exactly what both `self` and `other` match.
    pub fn and(&self, other: &FilterSpec) -> FilterSpec {
        FilterSpec {
            verticals: self.verticals.intersection(&other.verticals).cloned().collect(),
            min_days_stuck: self.min_days_stuck.max(other.min_days_stuck),
            max_days_stuck: self.max_days_stuck.min(other.max_days_stuck),
            statuses: self.statuses.intersection(&other.statuses).cloned().collect(),
        }
    }
}

/// Records satisfying `spec`, in input order.
pub fn apply<'a, I>(orders: I, spec: &FilterSpec) -> Vec<&'a DerivedOrder>
where
    I: IntoIterator<Item = &'a DerivedOrder>,
{
    let filtered: Vec<&DerivedOrder> = orders.into_iter().filter(|o| spec.matches(o)).collect();
    debug!(matched = filtered.len(), "Applied filter");
    filtered
}

/// A user's selection where `None` means "no explicit choice".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    pub verticals: Option<BTreeSet<String>>,
    pub statuses: Option<BTreeSet<String>>,
    pub min_days_stuck: Option<i64>,
    pub max_days_stuck: Option<i64>,
}

impl FilterSelection {
    pub fn resolve(&self, dataset: &Dataset) -> FilterSpec {
        let defaults = dataset.default_filter();
        FilterSpec {
            verticals: self.verticals.clone().unwrap_or(defaults.verticals),
            min_days_stuck: self.min_days_stuck.unwrap_or(defaults.min_days_stuck),
            max_days_stuck: self.max_days_stuck.unwrap_or(defaults.max_days_stuck),
            statuses: self.statuses.clone().unwrap_or(defaults.statuses),
        }
    }
}

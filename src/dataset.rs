//! The in-memory record set for one uploaded file.
//!
//! Built once per load (load, then derive against a single reference now)
//! and never mutated afterwards; filters only produce borrowed views.

use crate::derivation::derive_all;
use crate::error::LoadError;
use crate::filter::{self, FilterSpec};
use crate::loader::{load_records, load_records_from_path, LoadOptions};
use crate::models::{DerivedOrder, OrderRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Dataset {
    orders: Vec<DerivedOrder>,
    reference_now: DateTime<Utc>,
    has_account_activity: bool,
}

/// Values available to the filter controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterOptions {
    pub verticals: Vec<String>,
    pub statuses: Vec<String>,
    pub min_days_stuck: Option<i64>,
    pub max_days_stuck: Option<i64>,
}

impl Dataset {
    pub fn load<R: Read>(
        reader: R,
        options: &LoadOptions,
        reference_now: DateTime<Utc>,
    ) -> Result<Self, LoadError> {
        let loaded = load_records(reader, options)?;
        Ok(Self::build(loaded.records, loaded.has_account_activity, reference_now))
    }

    pub fn load_path(
        path: &Path,
        options: &LoadOptions,
        reference_now: DateTime<Utc>,
    ) -> Result<Self, LoadError> {
        let loaded = load_records_from_path(path, options)?;
        Ok(Self::build(loaded.records, loaded.has_account_activity, reference_now))
    }

    pub fn from_records(
        records: Vec<OrderRecord>,
        has_account_activity: bool,
        reference_now: DateTime<Utc>,
    ) -> Self {
        Self::build(records, has_account_activity, reference_now)
    }

    fn build(
        records: Vec<OrderRecord>,
        has_account_activity: bool,
        reference_now: DateTime<Utc>,
    ) -> Self {
        let orders = derive_all(records, reference_now);
        info!(
            rows = orders.len(),
            %reference_now,
            has_account_activity,
            "Derived metrics for dataset"
        );
        Self {
            orders,
            reference_now,
            has_account_activity,
        }
    }

    pub fn orders(&self) -> &[DerivedOrder] {
        &self.orders
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn reference_now(&self) -> DateTime<Utc> {
        self.reference_now
    }

    pub fn has_account_activity(&self) -> bool {
        self.has_account_activity
    }

    /// Every record, unfiltered.
    pub fn view(&self) -> Vec<&DerivedOrder> {
        self.orders.iter().collect()
    }

    pub fn filter(&self, spec: &FilterSpec) -> Vec<&DerivedOrder> {
        filter::apply(self.orders.iter(), spec)
    }

    pub fn verticals(&self) -> BTreeSet<String> {
        self.orders.iter().map(|o| o.vertical().to_string()).collect()
    }

    pub fn statuses(&self) -> BTreeSet<String> {
        self.orders.iter().map(|o| o.status().to_string()).collect()
    }

    pub fn days_stuck_bounds(&self) -> Option<(i64, i64)> {
        let min = self.orders.iter().map(|o| o.days_stuck).min()?;
        let max = self.orders.iter().map(|o| o.days_stuck).max()?;
        Some((min, max))
    }

    /// Selects everything: all verticals, all statuses, the full days range.
    pub fn default_filter(&self) -> FilterSpec {
        let (min, max) = self.days_stuck_bounds().unwrap_or((i64::MIN, i64::MAX));
        FilterSpec::new(self.verticals(), min, max, self.statuses())
    }

    pub fn filter_options(&self) -> FilterOptions {
        let bounds = self.days_stuck_bounds();
        FilterOptions {
            verticals: self.verticals().into_iter().collect(),
            statuses: self.statuses().into_iter().collect(),
            min_days_stuck: bounds.map(|(min, _)| min),
            max_days_stuck: bounds.map(|(_, max)| max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CSV: &str = "\
order_created_timestamp,order_id,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts
2024-04-01T00:00:00Z,1,a,hotel,eticket_issued,2024-04-20T00:00:00Z,2024-04-22T00:00:00Z
2024-05-01T00:00:00Z,2,b,event,issued,2024-05-20T00:00:00Z,2024-05-21T00:00:00Z
";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_load_derives_with_one_reference_now() {
        let ds = Dataset::load(CSV.as_bytes(), &LoadOptions::default(), now()).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.reference_now(), now());
        assert_eq!(ds.orders()[0].days_stuck, 40);
        assert_eq!(ds.orders()[1].days_stuck, 11);
        assert!(!ds.has_account_activity());
    }

    #[test]
    fn test_default_filter_selects_everything() {
        let ds = Dataset::load(CSV.as_bytes(), &LoadOptions::default(), now()).unwrap();
        let spec = ds.default_filter();
        assert_eq!(ds.filter(&spec).len(), 2);
        assert_eq!(ds.days_stuck_bounds(), Some((11, 40)));

        let options = ds.filter_options();
        assert_eq!(options.verticals, vec!["event", "hotel"]);
        assert_eq!(options.statuses, vec!["eticket_issued", "issued"]);
    }

    #[test]
    fn test_empty_dataset() {
        let header = CSV.lines().next().unwrap();
        let ds = Dataset::load(header.as_bytes(), &LoadOptions::default(), now()).unwrap();
        assert!(ds.is_empty());
        assert_eq!(ds.days_stuck_bounds(), None);
        assert!(ds.filter(&ds.default_filter()).is_empty());
        assert_eq!(ds.filter_options().min_days_stuck, None);
    }
}

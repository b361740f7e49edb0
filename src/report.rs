//! One serializable snapshot of every dashboard view for a filtered set.

use crate::aggregate::{
    Aggregator, HistogramBucket, MostAffectedVertical, Overview, StatusCount, TimelinePoint,
    UserCount, VerticalCount, VerticalStats,
};
use crate::churn::{self, ChurnAnalysis};
use crate::config::AnalysisConfig;
use crate::dataset::Dataset;
use crate::impact::{self, ImpactAnalysis};
use crate::models::DerivedOrder;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongestStuck {
    pub order_id: String,
    pub account_id: String,
    pub vertical: String,
    pub days_stuck: i64,
}

impl From<&DerivedOrder> for LongestStuck {
    fn from(o: &DerivedOrder) -> Self {
        Self {
            order_id: o.order_id().to_string(),
            account_id: o.account_id().to_string(),
            vertical: o.vertical().to_string(),
            days_stuck: o.days_stuck,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyInsights {
    pub most_affected_vertical: Option<MostAffectedVertical>,
    pub longest_stuck: Option<LongestStuck>,
    pub long_stuck_threshold_days: i64,
    pub long_stuck_count: usize,
    pub long_stuck_share_pct: Option<f64>,
}

impl KeyInsights {
    pub fn build(view: &[&DerivedOrder], threshold_days: i64) -> Self {
        let agg = Aggregator::new(view);
        Self {
            most_affected_vertical: agg.most_affected_vertical(),
            longest_stuck: agg.longest_stuck_record().map(LongestStuck::from),
            long_stuck_threshold_days: threshold_days,
            long_stuck_count: agg.long_stuck_count(threshold_days),
            long_stuck_share_pct: agg.long_stuck_share(threshold_days),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub reference_now: DateTime<Utc>,
    /// Summary of everything loaded, before filtering.
    pub overview: Overview,
    pub filtered_count: usize,
    pub filtered_overview: Overview,
    pub verticals: Vec<VerticalCount>,
    pub vertical_stats: BTreeMap<String, VerticalStats>,
    pub status_by_vertical: Vec<StatusCount>,
    pub histogram_bucket_width_days: i64,
    pub histogram: Vec<HistogramBucket>,
    pub created_timeline: Vec<TimelinePoint>,
    pub travel_end_timeline: Vec<TimelinePoint>,
    pub impact: ImpactAnalysis,
    pub top_users: Vec<UserCount>,
    pub churn: Option<ChurnAnalysis>,
    pub insights: KeyInsights,
}

impl DashboardReport {
    pub fn build(dataset: &Dataset, view: &[&DerivedOrder], config: &AnalysisConfig) -> Self {
        let all = dataset.view();
        let agg = Aggregator::new(view);

        let mut top_users = agg.per_user_counts();
        top_users.truncate(config.top_users);

        Self {
            reference_now: dataset.reference_now(),
            overview: Aggregator::new(&all).overview(),
            filtered_count: agg.total_count(),
            filtered_overview: agg.overview(),
            verticals: agg.vertical_counts(),
            vertical_stats: agg.per_vertical_stats(),
            status_by_vertical: agg.status_by_vertical(),
            histogram_bucket_width_days: config.histogram_bucket_width_days.max(1),
            histogram: agg.histogram_buckets(config.histogram_bucket_width_days),
            created_timeline: agg.daily_created_timeline(),
            travel_end_timeline: agg.daily_travel_end_timeline(),
            impact: impact::analyze(view),
            top_users,
            churn: dataset
                .has_account_activity()
                .then(|| churn::analyze(view, &config.churn_params())),
            insights: KeyInsights::build(view, config.long_stuck_threshold_days),
        }
    }
}

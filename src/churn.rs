//! Churn analysis: does hitting stuck orders line up with users going quiet?
//!
//! Only meaningful when the export carries account-activity columns. Users
//! whose last-order data is missing count as active and as stuck before or
//! during activity, since neither condition can be shown.

use crate::aggregate::{mean, median, pct};
use crate::models::DerivedOrder;
use crate::timestamp::days_between;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum UserStatus {
    Active,
    Churned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StuckTiming {
    /// The first stuck order came after the user's last transaction.
    AfterLastOrder,
    BeforeOrDuringActivity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

impl CorrelationStrength {
    pub fn classify(coefficient: f64) -> Self {
        let r = coefficient.abs();
        if r < 0.3 {
            Self::Weak
        } else if r < 0.7 {
            Self::Moderate
        } else {
            Self::Strong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChurnParams {
    pub churn_threshold_days: i64,
    pub quick_churn_window_days: i64,
}

impl Default for ChurnParams {
    fn default() -> Self {
        Self {
            churn_threshold_days: 30,
            quick_churn_window_days: 7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserActivity {
    pub account_id: String,
    pub stuck_orders_count: usize,
    pub first_order_ts: Option<DateTime<Utc>>,
    pub last_order_ts: Option<DateTime<Utc>>,
    pub total_orders: Option<i64>,
    pub first_stuck_experience_ts: DateTime<Utc>,
    pub days_since_last_order: Option<i64>,
    /// Distinct verticals in order of first appearance.
    pub affected_verticals: Vec<String>,
    pub days_first_stuck_to_last_order: Option<i64>,
    pub status: UserStatus,
    pub timing: StuckTiming,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnOverview {
    pub total_users: usize,
    pub churned_users: usize,
    pub active_users: usize,
    pub churn_rate_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingBreakdown {
    pub after_last_order: usize,
    pub before_or_during_activity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChurn {
    pub category: String,
    pub total_users: usize,
    pub churned_users: usize,
    pub churn_rate_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeToLastOrder {
    pub users: usize,
    pub median_days: Option<f64>,
    pub mean_days: Option<f64>,
    pub within_window: usize,
    pub within_window_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerticalChurn {
    pub vertical: String,
    pub total_users: usize,
    pub churned_users: usize,
    pub active_users: usize,
    pub churn_rate_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentComparison {
    pub status: UserStatus,
    pub users: usize,
    pub avg_stuck_orders: f64,
    pub median_stuck_orders: f64,
    pub avg_total_orders: Option<f64>,
    pub median_total_orders: Option<f64>,
    pub avg_days_since_last_order: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlation {
    pub coefficient: Option<f64>,
    pub strength: Option<CorrelationStrength>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChurnAnalysis {
    pub churn_threshold_days: i64,
    pub quick_churn_window_days: i64,
    pub overview: ChurnOverview,
    pub timing: TimingBreakdown,
    pub by_stuck_count: Vec<CategoryChurn>,
    pub time_to_last_order: TimeToLastOrder,
    pub by_vertical: Vec<VerticalChurn>,
    pub segments: Vec<SegmentComparison>,
    /// Stuck-order count against churned (0/1).
    pub correlation: Correlation,
    /// Users whose last order is recent enough that a finish may still be in flight.
    pub potentially_delayed_users: usize,
    pub users: Vec<UserActivity>,
}

/// Upper bounds (inclusive) of the stuck-order-count categories.
const STUCK_COUNT_CATEGORIES: [(&str, usize); 4] = [
    ("1 stuck order", 1),
    ("2 stuck orders", 2),
    ("3-5 stuck orders", 5),
    ("5+ stuck orders", usize::MAX),
];

fn stuck_count_category(count: usize) -> &'static str {
    STUCK_COUNT_CATEGORIES
        .iter()
        .find(|(_, upper)| count <= *upper)
        .map(|(label, _)| *label)
        .unwrap_or(STUCK_COUNT_CATEGORIES[3].0)
}

/// One row per account, ordered by account id.
pub fn user_activity(orders: &[&DerivedOrder], churn_threshold_days: i64) -> Vec<UserActivity> {
    let mut grouped: BTreeMap<&str, Vec<&DerivedOrder>> = BTreeMap::new();
    for &order in orders {
        grouped.entry(order.account_id()).or_default().push(order);
    }

    grouped
        .into_iter()
        .filter_map(|(account_id, rows)| {
            let first_row = rows.first()?;
            let first_stuck = rows.iter().map(|o| o.record.travel_end_ts).min()?;
            let account = &first_row.record.account;

            let mut affected_verticals: Vec<String> = Vec::new();
            for row in &rows {
                if !affected_verticals.iter().any(|v| v == row.vertical()) {
                    affected_verticals.push(row.vertical().to_string());
                }
            }

            let days_first_stuck_to_last_order = account
                .last_order_created_timestamp
                .map(|last| days_between(first_stuck, last));
            let status = match first_row.days_since_last_order {
                Some(days) if days >= churn_threshold_days => UserStatus::Churned,
                _ => UserStatus::Active,
            };
            let timing = match days_first_stuck_to_last_order {
                Some(days) if days < 0 => StuckTiming::AfterLastOrder,
                _ => StuckTiming::BeforeOrDuringActivity,
            };

            Some(UserActivity {
                account_id: account_id.to_string(),
                stuck_orders_count: rows.len(),
                first_order_ts: account.first_order_created_timestamp,
                last_order_ts: account.last_order_created_timestamp,
                total_orders: account.total_orders,
                first_stuck_experience_ts: first_stuck,
                days_since_last_order: first_row.days_since_last_order,
                affected_verticals,
                days_first_stuck_to_last_order,
                status,
                timing,
            })
        })
        .collect()
}

pub fn analyze(orders: &[&DerivedOrder], params: &ChurnParams) -> ChurnAnalysis {
    let users = user_activity(orders, params.churn_threshold_days);

    let churned = users.iter().filter(|u| u.status == UserStatus::Churned).count();
    let overview = ChurnOverview {
        total_users: users.len(),
        churned_users: churned,
        active_users: users.len() - churned,
        churn_rate_pct: pct(churned, users.len()),
    };

    let after_last_order = users
        .iter()
        .filter(|u| u.timing == StuckTiming::AfterLastOrder)
        .count();
    let timing = TimingBreakdown {
        after_last_order,
        before_or_during_activity: users.len() - after_last_order,
    };

    let potentially_delayed_users = users
        .iter()
        .filter(|u| {
            u.days_since_last_order
                .is_some_and(|d| d <= params.quick_churn_window_days)
        })
        .count();

    ChurnAnalysis {
        churn_threshold_days: params.churn_threshold_days,
        quick_churn_window_days: params.quick_churn_window_days,
        overview,
        timing,
        by_stuck_count: churn_by_stuck_count(&users),
        time_to_last_order: time_to_last_order(&users, params.quick_churn_window_days),
        by_vertical: churn_by_vertical(orders, &users),
        segments: segment_comparison(&users),
        correlation: stuck_churn_correlation(&users),
        potentially_delayed_users,
        users,
    }
}

fn churn_by_stuck_count(users: &[UserActivity]) -> Vec<CategoryChurn> {
    STUCK_COUNT_CATEGORIES
        .iter()
        .map(|(label, _)| {
            let in_category: Vec<&UserActivity> = users
                .iter()
                .filter(|u| stuck_count_category(u.stuck_orders_count) == *label)
                .collect();
            let churned = in_category
                .iter()
                .filter(|u| u.status == UserStatus::Churned)
                .count();
            CategoryChurn {
                category: label.to_string(),
                total_users: in_category.len(),
                churned_users: churned,
                churn_rate_pct: pct(churned, in_category.len()),
            }
        })
        .collect()
}

fn time_to_last_order(users: &[UserActivity], window_days: i64) -> TimeToLastOrder {
    let cohort: Vec<&UserActivity> = users
        .iter()
        .filter(|u| u.timing == StuckTiming::BeforeOrDuringActivity)
        .collect();
    let days: Vec<f64> = cohort
        .iter()
        .filter_map(|u| u.days_first_stuck_to_last_order)
        .map(|d| d as f64)
        .collect();
    let within_window = cohort
        .iter()
        .filter(|u| u.days_first_stuck_to_last_order.is_some_and(|d| d <= window_days))
        .count();

    TimeToLastOrder {
        users: cohort.len(),
        median_days: median(&days),
        mean_days: mean(days.iter().copied()),
        within_window,
        within_window_pct: pct(within_window, cohort.len()),
    }
}

fn churn_by_vertical(orders: &[&DerivedOrder], users: &[UserActivity]) -> Vec<VerticalChurn> {
    let mut verticals: Vec<&str> = Vec::new();
    for order in orders {
        if !verticals.contains(&order.vertical()) {
            verticals.push(order.vertical());
        }
    }

    let mut rows: Vec<VerticalChurn> = verticals
        .into_iter()
        .map(|vertical| {
            let affected: Vec<&UserActivity> = users
                .iter()
                .filter(|u| u.affected_verticals.iter().any(|v| v == vertical))
                .collect();
            let churned = affected
                .iter()
                .filter(|u| u.status == UserStatus::Churned)
                .count();
            VerticalChurn {
                vertical: vertical.to_string(),
                total_users: affected.len(),
                churned_users: churned,
                active_users: affected.len() - churned,
                churn_rate_pct: pct(churned, affected.len()).unwrap_or(0.0),
            }
        })
        .collect();
    rows.sort_by(|a, b| b.churn_rate_pct.total_cmp(&a.churn_rate_pct));
    rows
}

fn segment_comparison(users: &[UserActivity]) -> Vec<SegmentComparison> {
    [UserStatus::Active, UserStatus::Churned]
        .into_iter()
        .filter_map(|status| {
            let segment: Vec<&UserActivity> = users.iter().filter(|u| u.status == status).collect();
            if segment.is_empty() {
                return None;
            }
            let stuck: Vec<f64> = segment.iter().map(|u| u.stuck_orders_count as f64).collect();
            let totals: Vec<f64> = segment
                .iter()
                .filter_map(|u| u.total_orders)
                .map(|t| t as f64)
                .collect();
            Some(SegmentComparison {
                status,
                users: segment.len(),
                avg_stuck_orders: mean(stuck.iter().copied()).unwrap_or(0.0),
                median_stuck_orders: median(&stuck).unwrap_or(0.0),
                avg_total_orders: mean(totals.iter().copied()),
                median_total_orders: median(&totals),
                avg_days_since_last_order: mean(
                    segment
                        .iter()
                        .filter_map(|u| u.days_since_last_order)
                        .map(|d| d as f64),
                ),
            })
        })
        .collect()
}

fn stuck_churn_correlation(users: &[UserActivity]) -> Correlation {
    let xs: Vec<f64> = users.iter().map(|u| u.stuck_orders_count as f64).collect();
    let ys: Vec<f64> = users
        .iter()
        .map(|u| if u.status == UserStatus::Churned { 1.0 } else { 0.0 })
        .collect();
    let coefficient = pearson(&xs, &ys);
    Correlation {
        coefficient,
        strength: coefficient.map(CorrelationStrength::classify),
    }
}

/// `None` when fewer than two points or either side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs.iter().copied())?;
    let my = mean(ys.iter().copied())?;
    let (mut cov, mut vx, mut vy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivation::derive_order;
    use crate::test_support::{now, record, with_activity};

    fn active_order(
        id: &str,
        account: &str,
        vertical: &str,
        days_stuck: i64,
        last_order_days_ago: i64,
    ) -> DerivedOrder {
        let stuck = record(id, account, vertical, "eticket_issued", days_stuck);
        derive_order(with_activity(stuck, last_order_days_ago, 10), now())
    }

    fn sample() -> Vec<DerivedOrder> {
        vec![
            // churned: quiet for 60 days, stuck order ended 90 days ago (before last order)
            active_order("1", "a", "event", 90, 60),
            active_order("2", "a", "hotel", 80, 60),
            active_order("3", "a", "event", 70, 60),
            // active: last order 3 days ago, stuck 20 days ago
            active_order("4", "b", "event", 20, 3),
            // churned: last order 100 days ago, stuck after that
            active_order("5", "c", "flight", 40, 100),
        ]
    }

    #[test]
    fn test_user_rows() {
        let orders = sample();
        let view: Vec<&DerivedOrder> = orders.iter().collect();
        let users = user_activity(&view, 30);
        assert_eq!(users.len(), 3);

        let a = &users[0];
        assert_eq!(a.account_id, "a");
        assert_eq!(a.stuck_orders_count, 3);
        assert_eq!(a.affected_verticals, vec!["event", "hotel"]);
        assert_eq!(a.status, UserStatus::Churned);
        assert_eq!(a.timing, StuckTiming::BeforeOrDuringActivity);
        assert_eq!(a.days_first_stuck_to_last_order, Some(30));

        let c = &users[2];
        assert_eq!(c.status, UserStatus::Churned);
        assert_eq!(c.timing, StuckTiming::AfterLastOrder);

        assert_eq!(users[1].status, UserStatus::Active);
    }

    #[test]
    fn test_analysis_views() {
        let orders = sample();
        let view: Vec<&DerivedOrder> = orders.iter().collect();
        let analysis = analyze(&view, &ChurnParams::default());

        assert_eq!(analysis.overview.total_users, 3);
        assert_eq!(analysis.overview.churned_users, 2);
        assert_eq!(analysis.overview.active_users, 1);
        assert_eq!(analysis.timing.after_last_order, 1);
        assert_eq!(analysis.timing.before_or_during_activity, 2);
        assert_eq!(analysis.potentially_delayed_users, 1);

        let cats: Vec<(&str, usize)> = analysis
            .by_stuck_count
            .iter()
            .map(|c| (c.category.as_str(), c.total_users))
            .collect();
        assert_eq!(
            cats,
            vec![
                ("1 stuck order", 2),
                ("2 stuck orders", 0),
                ("3-5 stuck orders", 1),
                ("5+ stuck orders", 0),
            ]
        );
        assert_eq!(analysis.by_stuck_count[1].churn_rate_pct, None);
        assert_eq!(analysis.by_stuck_count[2].churn_rate_pct, Some(100.0));

        // a: 30 days from first stuck to last order, b: 17
        let ttl = &analysis.time_to_last_order;
        assert_eq!(ttl.users, 2);
        assert_eq!(ttl.median_days, Some(23.5));
        assert_eq!(ttl.within_window, 0);

        let flight = analysis.by_vertical.iter().find(|v| v.vertical == "flight").unwrap();
        assert_eq!(flight.churn_rate_pct, 100.0);
        assert_eq!(analysis.by_vertical.last().unwrap().vertical, "event");

        assert_eq!(analysis.segments.len(), 2);
        assert_eq!(analysis.segments[0].status, UserStatus::Active);
        assert_eq!(analysis.segments[1].avg_stuck_orders, 2.0);
        assert_eq!(analysis.segments[1].avg_total_orders, Some(10.0));
        assert!(analysis.correlation.coefficient.is_some());
    }

    #[test]
    fn test_missing_activity_counts_as_active() {
        let orders = vec![derive_order(record("1", "z", "event", "s", 5), now())];
        let view: Vec<&DerivedOrder> = orders.iter().collect();
        let users = user_activity(&view, 30);
        assert_eq!(users[0].status, UserStatus::Active);
        assert_eq!(users[0].timing, StuckTiming::BeforeOrDuringActivity);
        assert_eq!(users[0].days_first_stuck_to_last_order, None);
    }

    #[test]
    fn test_empty_input() {
        let analysis = analyze(&[], &ChurnParams::default());
        assert_eq!(analysis.overview.total_users, 0);
        assert_eq!(analysis.overview.churn_rate_pct, None);
        assert!(analysis.segments.is_empty());
        assert_eq!(analysis.correlation.coefficient, None);
        assert_eq!(analysis.by_stuck_count.len(), 4);
    }

    #[test]
    fn test_pearson() {
        let r = pearson(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]).unwrap();
        assert!((r - 1.0).abs() < 1e-12);
        assert_eq!(pearson(&[1.0, 1.0], &[0.0, 1.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
        assert_eq!(CorrelationStrength::classify(-0.5), CorrelationStrength::Moderate);
        assert_eq!(CorrelationStrength::classify(0.71), CorrelationStrength::Strong);
    }
}

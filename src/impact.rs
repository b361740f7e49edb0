//! Monthly user impact: when accounts first hit a stuck order, and how fast
//! that population grows.
//!
//! A user's first impact is the month of their earliest `travel_end_ts`.

use crate::aggregate::mean;
use crate::models::DerivedOrder;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Months needed before the recent-vs-earlier trend is reported.
const TREND_WINDOW_MONTHS: usize = 6;
const RECENT_MONTHS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyImpact {
    /// `YYYY-MM`
    pub month: String,
    pub new_users_impacted: usize,
    pub cumulative_users: usize,
    pub total_stuck_orders: usize,
    /// Orders in the month not accounted for by newly impacted users.
    pub repeat_orders: i64,
    pub avg_orders_per_user: Option<f64>,
    pub existing_users: usize,
    pub new_user_percentage: Option<f64>,
    /// Change in `new_users_impacted` against the previous month.
    pub mom_growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakMonth {
    pub month: String,
    pub new_users: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactSummary {
    pub peak_month: Option<PeakMonth>,
    pub avg_new_users_per_month: Option<f64>,
    pub avg_new_users_last_3_months: Option<f64>,
    pub months_tracked: usize,
    pub months_accelerating: usize,
    pub months_decelerating: usize,
    /// Last 6 months against everything before, in percent.
    pub trend_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactAnalysis {
    pub months: Vec<MonthlyImpact>,
    pub summary: ImpactSummary,
}

pub fn month_key(ts: &DateTime<Utc>) -> String {
    format!("{:04}-{:02}", ts.year(), ts.month())
}

pub fn monthly_impact(orders: &[&DerivedOrder]) -> Vec<MonthlyImpact> {
    let mut first_impact: HashMap<&str, DateTime<Utc>> = HashMap::new();
    let mut orders_per_month: BTreeMap<String, usize> = BTreeMap::new();
    for order in orders {
        let end = order.record.travel_end_ts;
        first_impact
            .entry(order.account_id())
            .and_modify(|first| {
                if end < *first {
                    *first = end;
                }
            })
            .or_insert(end);
        *orders_per_month.entry(month_key(&end)).or_insert(0) += 1;
    }

    let mut new_users_per_month: HashMap<String, usize> = HashMap::new();
    for first in first_impact.values() {
        *new_users_per_month.entry(month_key(first)).or_insert(0) += 1;
    }

    let mut cumulative = 0usize;
    let mut previous_new: Option<usize> = None;
    orders_per_month
        .into_iter()
        .map(|(month, total)| {
            let new_users = new_users_per_month.get(&month).copied().unwrap_or(0);
            cumulative += new_users;
            let mom_growth_pct = match previous_new {
                Some(prev) if prev > 0 => {
                    Some((new_users as f64 - prev as f64) / prev as f64 * 100.0)
                }
                _ => None,
            };
            previous_new = Some(new_users);

            MonthlyImpact {
                month,
                new_users_impacted: new_users,
                cumulative_users: cumulative,
                total_stuck_orders: total,
                repeat_orders: total as i64 - new_users as i64,
                avg_orders_per_user: (new_users > 0).then(|| total as f64 / new_users as f64),
                existing_users: cumulative - new_users,
                new_user_percentage: (cumulative > 0)
                    .then(|| new_users as f64 / cumulative as f64 * 100.0),
                mom_growth_pct,
            }
        })
        .collect()
}

pub fn summarize(months: &[MonthlyImpact]) -> ImpactSummary {
    let new_users: Vec<f64> = months.iter().map(|m| m.new_users_impacted as f64).collect();

    // first month holding the maximum
    let peak_month = months
        .iter()
        .fold(None::<&MonthlyImpact>, |best, m| match best {
            Some(b) if b.new_users_impacted >= m.new_users_impacted => Some(b),
            _ => Some(m),
        })
        .map(|m| PeakMonth {
            month: m.month.clone(),
            new_users: m.new_users_impacted,
        });

    let recent_start = new_users.len().saturating_sub(RECENT_MONTHS);
    let trend_pct = (months.len() >= TREND_WINDOW_MONTHS).then(|| {
        let recent_window = &new_users[new_users.len() - TREND_WINDOW_MONTHS..];
        let recent = mean(recent_window.iter().copied()).unwrap_or(0.0);
        let earlier_len = (new_users.len() - TREND_WINDOW_MONTHS).max(1);
        let earlier = mean(new_users[..earlier_len].iter().copied()).unwrap_or(0.0);
        if earlier > 0.0 {
            (recent - earlier) / earlier * 100.0
        } else {
            0.0
        }
    });

    ImpactSummary {
        peak_month,
        avg_new_users_per_month: mean(new_users.iter().copied()),
        avg_new_users_last_3_months: mean(new_users[recent_start..].iter().copied()),
        months_tracked: months.len(),
        months_accelerating: months
            .iter()
            .filter(|m| m.mom_growth_pct.is_some_and(|g| g > 0.0))
            .count(),
        months_decelerating: months
            .iter()
            .filter(|m| m.mom_growth_pct.is_some_and(|g| g <= 0.0))
            .count(),
        trend_pct,
    }
}

pub fn analyze(orders: &[&DerivedOrder]) -> ImpactAnalysis {
    let months = monthly_impact(orders);
    let summary = summarize(&months);
    ImpactAnalysis { months, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{now, order};
    use chrono::TimeZone;

    fn ending(id: &str, account: &str, y: i32, m: u32, d: u32) -> DerivedOrder {
        let mut o = order(id, account, "event", "eticket_issued", 1);
        o.record.travel_end_ts = Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap();
        o
    }

    #[test]
    fn test_monthly_rows() {
        let orders = vec![
            ending("1", "a", 2024, 1, 5),
            ending("2", "b", 2024, 1, 20),
            ending("3", "a", 2024, 2, 2),
            ending("4", "c", 2024, 2, 3),
            ending("5", "a", 2024, 3, 9),
        ];
        let view: Vec<&DerivedOrder> = orders.iter().collect();
        let months = monthly_impact(&view);

        let shape: Vec<(&str, usize, usize, usize)> = months
            .iter()
            .map(|m| {
                (
                    m.month.as_str(),
                    m.new_users_impacted,
                    m.cumulative_users,
                    m.total_stuck_orders,
                )
            })
            .collect();
        assert_eq!(
            shape,
            vec![("2024-01", 2, 2, 2), ("2024-02", 1, 3, 2), ("2024-03", 0, 3, 1)]
        );

        assert_eq!(months[1].repeat_orders, 1);
        assert_eq!(months[1].existing_users, 2);
        assert_eq!(months[1].avg_orders_per_user, Some(2.0));
        assert_eq!(months[2].avg_orders_per_user, None);
        assert_eq!(months[0].mom_growth_pct, None);
        assert_eq!(months[1].mom_growth_pct, Some(-50.0));
        assert_eq!(months[2].mom_growth_pct, Some(-100.0));
        assert!((months[1].new_user_percentage.unwrap() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_first_impact_uses_earliest_travel_end() {
        // input order must not matter
        let orders = vec![ending("1", "a", 2024, 3, 1), ending("2", "a", 2024, 1, 1)];
        let view: Vec<&DerivedOrder> = orders.iter().collect();
        let months = monthly_impact(&view);
        assert_eq!(months[0].month, "2024-01");
        assert_eq!(months[0].new_users_impacted, 1);
        assert_eq!(months[1].new_users_impacted, 0);
    }

    #[test]
    fn test_summary() {
        let mut orders = Vec::new();
        // new users per month: 1, 3, 3, 2, 4, 1, 2
        let per_month = [1, 3, 3, 2, 4, 1, 2];
        let mut n = 0;
        for (i, count) in per_month.iter().enumerate() {
            for _ in 0..*count {
                n += 1;
                orders.push(ending(&n.to_string(), &format!("user{n}"), 2023, i as u32 + 1, 10));
            }
        }
        let view: Vec<&DerivedOrder> = orders.iter().collect();
        let analysis = analyze(&view);
        let s = &analysis.summary;

        assert_eq!(s.months_tracked, 7);
        let peak = s.peak_month.as_ref().unwrap();
        assert_eq!((peak.month.as_str(), peak.new_users), ("2023-05", 4));
        assert!((s.avg_new_users_per_month.unwrap() - 16.0 / 7.0).abs() < 1e-9);
        assert!((s.avg_new_users_last_3_months.unwrap() - 7.0 / 3.0).abs() < 1e-9);
        // growth: +200, 0, -33, +100, -75, +100
        assert_eq!(s.months_accelerating, 3);
        assert_eq!(s.months_decelerating, 3);
        // last 6 mean = 15/6 = 2.5, earlier = first 1 month = 1
        assert!((s.trend_pct.unwrap() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_and_short_histories() {
        let analysis = analyze(&[]);
        assert!(analysis.months.is_empty());
        assert_eq!(analysis.summary.peak_month, None);
        assert_eq!(analysis.summary.avg_new_users_per_month, None);
        assert_eq!(analysis.summary.trend_pct, None);

        let orders = vec![order("1", "a", "event", "s", 3)];
        let view: Vec<&DerivedOrder> = orders.iter().collect();
        let analysis = analyze(&view);
        assert_eq!(analysis.months.len(), 1);
        assert_eq!(analysis.months[0].month, month_key(&(now() - chrono::Duration::days(3))));
        assert_eq!(analysis.summary.trend_pct, None);
    }
}

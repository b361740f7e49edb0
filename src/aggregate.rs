//! Aggregator: read-only summaries over a record view.
//!
//! Every computation is total. An empty view yields zero counts, empty
//! tables and `None` for means, never an error. Ties are broken
//! deterministically so repeated runs render identically.

use crate::models::DerivedOrder;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub total_orders: usize,
    pub unique_users: usize,
    pub verticals: usize,
    pub avg_days_stuck: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerticalCount {
    pub vertical: String,
    pub count: usize,
    pub share_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerticalStats {
    pub count: usize,
    pub unique_users: usize,
    pub mean_days_stuck: f64,
    pub median_days_stuck: f64,
    pub min_days_stuck: i64,
    pub max_days_stuck: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserCount {
    pub account_id: String,
    pub count: usize,
}

/// Orders with `start <= days_stuck < end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistogramBucket {
    pub start: i64,
    pub end: i64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub vertical: String,
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelinePoint {
    pub date: NaiveDate,
    pub vertical: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MostAffectedVertical {
    pub vertical: String,
    pub count: usize,
    pub share_pct: f64,
}

pub struct Aggregator<'v, 'a> {
    orders: &'v [&'a DerivedOrder],
}

impl<'v, 'a> Aggregator<'v, 'a> {
    pub fn new(orders: &'v [&'a DerivedOrder]) -> Self {
        Self { orders }
    }

    pub fn total_count(&self) -> usize {
        self.orders.len()
    }

    pub fn distinct_user_count(&self) -> usize {
        self.orders.iter().map(|o| o.account_id()).collect::<HashSet<_>>().len()
    }

    pub fn distinct_vertical_count(&self) -> usize {
        self.orders.iter().map(|o| o.vertical()).collect::<HashSet<_>>().len()
    }

    /// `None` on an empty view; zero would read as "nothing is stuck".
    pub fn mean_days_stuck(&self) -> Option<f64> {
        mean(self.orders.iter().map(|o| o.days_stuck as f64))
    }

    pub fn overview(&self) -> Overview {
        Overview {
            total_orders: self.total_count(),
            unique_users: self.distinct_user_count(),
            verticals: self.distinct_vertical_count(),
            avg_days_stuck: self.mean_days_stuck(),
        }
    }

    pub fn per_vertical_stats(&self) -> BTreeMap<String, VerticalStats> {
        let mut groups: BTreeMap<&str, Vec<&DerivedOrder>> = BTreeMap::new();
        for &order in self.orders {
            groups.entry(order.vertical()).or_default().push(order);
        }

        groups
            .into_iter()
            .map(|(vertical, orders)| {
                let days: Vec<f64> = orders.iter().map(|o| o.days_stuck as f64).collect();
                let users: HashSet<&str> = orders.iter().map(|o| o.account_id()).collect();
                // groups are never empty, so the fallbacks are unreachable
                let stats = VerticalStats {
                    count: orders.len(),
                    unique_users: users.len(),
                    mean_days_stuck: mean(days.iter().copied()).unwrap_or(0.0),
                    median_days_stuck: median(&days).unwrap_or(0.0),
                    min_days_stuck: orders.iter().map(|o| o.days_stuck).min().unwrap_or(0),
                    max_days_stuck: orders.iter().map(|o| o.days_stuck).max().unwrap_or(0),
                };
                (vertical.to_string(), stats)
            })
            .collect()
    }

    /// Ranked by count descending, ties by vertical name.
    pub fn vertical_counts(&self) -> Vec<VerticalCount> {
        let total = self.total_count();
        ranked_counts(self.orders.iter().map(|o| o.vertical()))
            .into_iter()
            .map(|(vertical, count)| VerticalCount {
                vertical,
                count,
                share_pct: pct(count, total).unwrap_or(0.0),
            })
            .collect()
    }

    /// Every account's record count, ranked by count descending, ties by
    /// account id ascending. Not truncated; top-N is a rendering concern.
    pub fn per_user_counts(&self) -> Vec<UserCount> {
        ranked_counts(self.orders.iter().map(|o| o.account_id()))
            .into_iter()
            .map(|(account_id, count)| UserCount { account_id, count })
            .collect()
    }

    /// Fixed-width buckets anchored at 0, ascending by start. Only occupied
    /// buckets are returned. A width below 1 is treated as 1.
    pub fn histogram_buckets(&self, bucket_width: i64) -> Vec<HistogramBucket> {
        let width = bucket_width.max(1);
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for order in self.orders {
            *counts.entry(order.days_stuck.div_euclid(width)).or_insert(0) += 1;
        }

        counts
            .into_iter()
            .map(|(idx, count)| HistogramBucket {
                start: idx.saturating_mul(width),
                end: idx.saturating_add(1).saturating_mul(width),
                count,
            })
            .collect()
    }

    /// Records stuck strictly longer than `threshold_days`.
    pub fn long_stuck_count(&self, threshold_days: i64) -> usize {
        self.orders.iter().filter(|o| o.days_stuck > threshold_days).count()
    }

    pub fn long_stuck_share(&self, threshold_days: i64) -> Option<f64> {
        pct(self.long_stuck_count(threshold_days), self.total_count())
    }

    /// Vertical with the most records, ties by vertical name.
    pub fn most_affected_vertical(&self) -> Option<MostAffectedVertical> {
        self.vertical_counts()
            .into_iter()
            .next()
            .map(|top| MostAffectedVertical {
                vertical: top.vertical,
                count: top.count,
                share_pct: top.share_pct,
            })
    }

    /// Maximum `days_stuck`; ties go to the earliest-created order, then to
    /// the first in input order.
    pub fn longest_stuck_record(&self) -> Option<&'a DerivedOrder> {
        let mut best: Option<&'a DerivedOrder> = None;
        for &order in self.orders {
            let better = match best {
                None => true,
                Some(current) => match order.days_stuck.cmp(&current.days_stuck) {
                    Ordering::Greater => true,
                    Ordering::Equal => {
                        order.record.order_created_timestamp
                            < current.record.order_created_timestamp
                    }
                    Ordering::Less => false,
                },
            };
            if better {
                best = Some(order);
            }
        }
        best
    }

    pub fn status_by_vertical(&self) -> Vec<StatusCount> {
        let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for order in self.orders {
            *counts.entry((order.vertical(), order.status())).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|((vertical, status), count)| StatusCount {
                vertical: vertical.to_string(),
                status: status.to_string(),
                count,
            })
            .collect()
    }

    /// Orders created per UTC day and vertical.
    pub fn daily_created_timeline(&self) -> Vec<TimelinePoint> {
        self.daily_timeline(|o| o.record.order_created_timestamp)
    }

    /// Travel ends per UTC day and vertical.
    pub fn daily_travel_end_timeline(&self) -> Vec<TimelinePoint> {
        self.daily_timeline(|o| o.record.travel_end_ts)
    }

    fn daily_timeline<F>(&self, key: F) -> Vec<TimelinePoint>
    where
        F: Fn(&DerivedOrder) -> DateTime<Utc>,
    {
        let mut counts: BTreeMap<(NaiveDate, &str), usize> = BTreeMap::new();
        for &order in self.orders {
            *counts.entry((key(order).date_naive(), order.vertical())).or_insert(0) += 1;
        }
        counts
            .into_iter()
            .map(|((date, vertical), count)| TimelinePoint {
                date,
                vertical: vertical.to_string(),
                count,
            })
            .collect()
    }
}

/// Value counts ranked by count descending, then key ascending.
fn ranked_counts<'k>(keys: impl Iterator<Item = &'k str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(k, c)| (k.to_string(), c))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

pub(crate) fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// `part / whole` as a percentage; `None` when `whole` is zero.
pub(crate) fn pct(part: usize, whole: usize) -> Option<f64> {
    (whole > 0).then(|| part as f64 / whole as f64 * 100.0)
}

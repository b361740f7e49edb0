//! Detail table: order-id search and descending sort over a filtered view.

use crate::models::DerivedOrder;
use crate::timestamp::format_display;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    #[default]
    DaysStuck,
    OrderCreatedTimestamp,
    TravelEndTs,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "days_stuck" => Ok(Self::DaysStuck),
            "order_created_timestamp" => Ok(Self::OrderCreatedTimestamp),
            "travel_end_ts" => Ok(Self::TravelEndTs),
            other => Err(format!(
                "unknown sort key '{other}' (expected days_stuck, order_created_timestamp or travel_end_ts)"
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DaysStuck => "days_stuck",
            Self::OrderCreatedTimestamp => "order_created_timestamp",
            Self::TravelEndTs => "travel_end_ts",
        };
        f.write_str(name)
    }
}

/// Case-sensitive substring match on `order_id`; an empty needle keeps all.
pub fn search<'a>(orders: &[&'a DerivedOrder], needle: &str) -> Vec<&'a DerivedOrder> {
    orders
        .iter()
        .copied()
        .filter(|o| needle.is_empty() || o.order_id().contains(needle))
        .collect()
}

/// Sorts descending by `key`; equal keys keep their input order.
pub fn sort_desc(orders: &mut [&DerivedOrder], key: SortKey) {
    match key {
        SortKey::DaysStuck => orders.sort_by(|a, b| b.days_stuck.cmp(&a.days_stuck)),
        SortKey::OrderCreatedTimestamp => orders.sort_by(|a, b| {
            b.record
                .order_created_timestamp
                .cmp(&a.record.order_created_timestamp)
        }),
        SortKey::TravelEndTs => {
            orders.sort_by(|a, b| b.record.travel_end_ts.cmp(&a.record.travel_end_ts))
        }
    }
}

pub fn detail_rows<'a>(
    orders: &[&'a DerivedOrder],
    needle: &str,
    key: SortKey,
) -> Vec<&'a DerivedOrder> {
    let mut rows = search(orders, needle);
    sort_desc(&mut rows, key);
    rows
}

/// A detail-table row with display-formatted timestamps.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRow {
    pub order_created_timestamp: String,
    pub order_id: String,
    pub account_id: String,
    pub order_type_name: String,
    pub order_status_name: String,
    pub travel_start_ts: String,
    pub travel_end_ts: String,
    pub days_stuck: i64,
    pub order_to_travel_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_last_order: Option<i64>,
}

impl From<&DerivedOrder> for DisplayRow {
    fn from(o: &DerivedOrder) -> Self {
        Self {
            order_created_timestamp: format_display(&o.record.order_created_timestamp),
            order_id: o.record.order_id.clone(),
            account_id: o.record.account_id.clone(),
            order_type_name: o.record.order_type_name.clone(),
            order_status_name: o.record.order_status_name.clone(),
            travel_start_ts: format_display(&o.record.travel_start_ts),
            travel_end_ts: format_display(&o.record.travel_end_ts),
            days_stuck: o.days_stuck,
            order_to_travel_days: o.order_to_travel_days,
            days_since_last_order: o.days_since_last_order,
        }
    }
}

//! Derivation Engine.
//!
//! Pure and total over loaded records. The reference instant is supplied by
//! the caller, captured once per load, so every row is measured against the
//! same "now".

use crate::models::{DerivedOrder, OrderRecord};
use crate::timestamp::days_between;
use chrono::{DateTime, Utc};

pub fn days_stuck(record: &OrderRecord, reference_now: DateTime<Utc>) -> i64 {
    days_between(record.travel_end_ts, reference_now)
}

pub fn order_to_travel_days(record: &OrderRecord) -> i64 {
    days_between(record.order_created_timestamp, record.travel_start_ts)
}

pub fn days_since_last_order(record: &OrderRecord, reference_now: DateTime<Utc>) -> Option<i64> {
    record
        .account
        .last_order_created_timestamp
        .map(|last| days_between(last, reference_now))
}

pub fn derive_order(record: OrderRecord, reference_now: DateTime<Utc>) -> DerivedOrder {
    DerivedOrder {
        days_stuck: days_stuck(&record, reference_now),
        order_to_travel_days: order_to_travel_days(&record),
        days_since_last_order: days_since_last_order(&record, reference_now),
        record,
    }
}

pub fn derive_all(records: Vec<OrderRecord>, reference_now: DateTime<Utc>) -> Vec<DerivedOrder> {
    records
        .into_iter()
        .map(|record| derive_order(record, reference_now))
        .collect()
}

//! Fixtures shared by the unit tests.

use crate::dataset::Dataset;
use crate::derivation::derive_order;
use crate::models::{AccountActivity, DerivedOrder, OrderRecord};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

/// An order whose travel ended `days_stuck` whole days before [`now`].
pub fn order(
    id: &str,
    account: &str,
    vertical: &str,
    status: &str,
    days_stuck: i64,
) -> DerivedOrder {
    derive_order(record(id, account, vertical, status, days_stuck), now())
}

pub fn record(
    id: &str,
    account: &str,
    vertical: &str,
    status: &str,
    days_stuck: i64,
) -> OrderRecord {
    let travel_end_ts = now() - Duration::days(days_stuck) - Duration::hours(1);
    OrderRecord {
        order_created_timestamp: travel_end_ts - Duration::days(30),
        order_id: id.to_string(),
        account_id: account.to_string(),
        order_type_name: vertical.to_string(),
        order_status_name: status.to_string(),
        travel_start_ts: travel_end_ts - Duration::days(2),
        travel_end_ts,
        account: AccountActivity::default(),
    }
}

/// Attach account activity: last order `last_order_days_ago` before [`now`].
pub fn with_activity(
    mut order: OrderRecord,
    last_order_days_ago: i64,
    total_orders: i64,
) -> OrderRecord {
    order.account = AccountActivity {
        first_order_created_timestamp: Some(now() - Duration::days(400)),
        last_order_created_timestamp: Some(now() - Duration::days(last_order_days_ago)),
        total_orders: Some(total_orders),
    };
    order
}

pub fn dataset(orders: Vec<DerivedOrder>) -> Dataset {
    let has_activity = orders.iter().any(|o| !o.record.account.is_empty());
    Dataset::from_records(orders.into_iter().map(|o| o.record).collect(), has_activity, now())
}

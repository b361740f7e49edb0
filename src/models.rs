use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Columns every input file must carry.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    "order_created_timestamp",
    "order_id",
    "account_id",
    "order_type_name",
    "order_status_name",
    "travel_start_ts",
    "travel_end_ts",
];

/// Optional account-activity columns enabling churn analysis.
pub const ACCOUNT_FIRST_ORDER_COLUMN: &str = "account_first_order_created_timestamp";
pub const ACCOUNT_LAST_ORDER_COLUMN: &str = "account_last_order_created_timestamp";
pub const ACCOUNT_TOTAL_ORDERS_COLUMN: &str = "account_total_orders_during_analysis_period";

/// Raw record from CSV ingestion; every cell still text.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvRecord {
    pub order_created_timestamp: String,
    pub order_id: String,
    pub account_id: String,
    pub order_type_name: String,
    pub order_status_name: String,
    pub travel_start_ts: String,
    pub travel_end_ts: String,
    #[serde(default)]
    pub account_first_order_created_timestamp: Option<String>,
    #[serde(default)]
    pub account_last_order_created_timestamp: Option<String>,
    #[serde(default)]
    pub account_total_orders_during_analysis_period: Option<String>,
}

/// One stuck order, timestamps normalized to UTC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_created_timestamp: DateTime<Utc>,
    pub order_id: String,
    pub account_id: String,
    /// Vertical tag (event, hotel, flight, ...).
    pub order_type_name: String,
    pub order_status_name: String,
    pub travel_start_ts: DateTime<Utc>,
    pub travel_end_ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "AccountActivity::is_empty")]
    pub account: AccountActivity,
}

impl OrderRecord {
    pub fn vertical(&self) -> &str {
        &self.order_type_name
    }

    pub fn status(&self) -> &str {
        &self.order_status_name
    }
}

/// Account-level context attached to each row by richer exports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountActivity {
    pub first_order_created_timestamp: Option<DateTime<Utc>>,
    pub last_order_created_timestamp: Option<DateTime<Utc>>,
    pub total_orders: Option<i64>,
}

impl AccountActivity {
    pub fn is_empty(&self) -> bool {
        self.first_order_created_timestamp.is_none()
            && self.last_order_created_timestamp.is_none()
            && self.total_orders.is_none()
    }
}

/// A loaded record plus the metrics derived from it at load time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedOrder {
    #[serde(flatten)]
    pub record: OrderRecord,
    /// Whole days from `travel_end_ts` to the dataset's reference now.
    pub days_stuck: i64,
    /// Whole days from order creation to travel start; may be negative.
    pub order_to_travel_days: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_since_last_order: Option<i64>,
}

impl DerivedOrder {
    pub fn order_id(&self) -> &str {
        &self.record.order_id
    }

    pub fn account_id(&self) -> &str {
        &self.record.account_id
    }

    pub fn vertical(&self) -> &str {
        self.record.vertical()
    }

    pub fn status(&self) -> &str {
        self.record.status()
    }
}

//! Delimited-text export for the filtered rows and the derived tables.
//!
//! Order timestamps are written losslessly, so an exported file loads back
//! into the same records.

use crate::churn::{StuckTiming, UserActivity, UserStatus};
use crate::impact::MonthlyImpact;
use crate::models::{
    DerivedOrder, ACCOUNT_FIRST_ORDER_COLUMN, ACCOUNT_LAST_ORDER_COLUMN,
    ACCOUNT_TOTAL_ORDERS_COLUMN, REQUIRED_COLUMNS,
};
use crate::timestamp::format_export;
use chrono::{DateTime, Local, Utc};
use csv::WriterBuilder;
use std::io::Write;

fn opt_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| format_export(&t)).unwrap_or_default()
}

fn opt_num<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn opt_round2(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// Writes the input columns followed by the derived ones. Account columns
/// are included only when `with_account_activity` is set.
pub fn write_orders<W: Write>(
    writer: W,
    orders: &[&DerivedOrder],
    with_account_activity: bool,
) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);

    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    if with_account_activity {
        header.extend([
            ACCOUNT_FIRST_ORDER_COLUMN,
            ACCOUNT_LAST_ORDER_COLUMN,
            ACCOUNT_TOTAL_ORDERS_COLUMN,
        ]);
    }
    header.extend(["days_stuck", "order_to_travel_days"]);
    if with_account_activity {
        header.push("days_since_last_order");
    }
    wtr.write_record(&header)?;

    for order in orders {
        let r = &order.record;
        let mut row = vec![
            format_export(&r.order_created_timestamp),
            r.order_id.clone(),
            r.account_id.clone(),
            r.order_type_name.clone(),
            r.order_status_name.clone(),
            format_export(&r.travel_start_ts),
            format_export(&r.travel_end_ts),
        ];
        if with_account_activity {
            row.push(opt_ts(r.account.first_order_created_timestamp));
            row.push(opt_ts(r.account.last_order_created_timestamp));
            row.push(opt_num(r.account.total_orders));
        }
        row.push(order.days_stuck.to_string());
        row.push(order.order_to_travel_days.to_string());
        if with_account_activity {
            row.push(opt_num(order.days_since_last_order));
        }
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_monthly_impact<W: Write>(writer: W, months: &[MonthlyImpact]) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record([
        "Month",
        "New Users Impacted",
        "Cumulative Users",
        "Total Stuck Orders",
        "Orders from Existing Users",
        "Avg Orders/User",
    ])?;
    for m in months {
        wtr.write_record([
            m.month.clone(),
            m.new_users_impacted.to_string(),
            m.cumulative_users.to_string(),
            m.total_stuck_orders.to_string(),
            m.repeat_orders.to_string(),
            opt_round2(m.avg_orders_per_user),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_user_activity<W: Write>(writer: W, users: &[UserActivity]) -> csv::Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record([
        "account_id",
        "stuck_orders_count",
        "first_order_ts",
        "last_order_ts",
        "total_orders",
        "first_stuck_experience_ts",
        "days_since_last_order",
        "affected_verticals",
        "days_first_stuck_to_last_order",
        "user_status",
        "stuck_timing",
    ])?;
    for u in users {
        let status = match u.status {
            UserStatus::Churned => "Churned",
            UserStatus::Active => "Active",
        };
        let timing = match u.timing {
            StuckTiming::AfterLastOrder => "After Last Order",
            StuckTiming::BeforeOrDuringActivity => "Before/During Active Period",
        };
        wtr.write_record([
            u.account_id.clone(),
            u.stuck_orders_count.to_string(),
            opt_ts(u.first_order_ts),
            opt_ts(u.last_order_ts),
            opt_num(u.total_orders),
            format_export(&u.first_stuck_experience_ts),
            opt_num(u.days_since_last_order),
            u.affected_verticals.join(", "),
            opt_num(u.days_first_stuck_to_last_order),
            status.to_string(),
            timing.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Renders any of the writers above into an owned string.
pub fn to_string<F>(write: F) -> csv::Result<String>
where
    F: FnOnce(&mut Vec<u8>) -> csv::Result<()>,
{
    let mut buf = Vec::new();
    write(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `<prefix>_YYYYmmdd_HHMMSS.csv`, stamped with local time.
pub fn timestamped_file_name(prefix: &str) -> String {
    format!("{}_{}.csv", prefix, Local::now().format("%Y%m%d_%H%M%S"))
}

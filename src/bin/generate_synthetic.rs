//! Synthetic data generator for stuck-orders exports
//!
//! Writes orders whose travel has ended but whose status never reached
//! finished, spread over weighted verticals and statuses. Accounts are drawn
//! from a shared pool so that some users hit several stuck orders.
//!
//! Usage:
//!   cargo run --release --bin generate_synthetic -- [OPTIONS]
//!
//! Options:
//!   --rows <N>                 Number of orders (default: 5000)
//!   --max-days-stuck <N>       Oldest travel end, in days before now (default: 180)
//!   --users-ratio <F>          Accounts per order (default: 0.4)
//!   --with-account-activity    Add the optional account activity columns
//!   --seed <N>                 Random seed for reproducibility (optional)
//!   --output <PATH>            Output CSV path (default: data/stuck_orders_synthetic.csv)

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use csv::WriterBuilder;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand::rngs::StdRng;
use std::path::PathBuf;
use stuck_orders::models::{
    ACCOUNT_FIRST_ORDER_COLUMN, ACCOUNT_LAST_ORDER_COLUMN, ACCOUNT_TOTAL_ORDERS_COLUMN,
    REQUIRED_COLUMNS,
};

const VERTICALS: [(&str, u32); 6] = [
    ("event", 35),
    ("hotel", 25),
    ("flight", 20),
    ("train", 10),
    ("bus", 6),
    ("car_rental", 4),
];

const STATUSES: [(&str, u32); 4] = [
    ("eticket_issued", 85),
    ("paid", 8),
    ("partially_issued", 5),
    ("refund_requested", 2),
];

/// Synthetic data generator for stuck orders
#[derive(Parser, Debug)]
#[command(name = "generate_synthetic")]
#[command(about = "Generate a synthetic stuck-orders CSV export")]
struct Args {
    /// Number of stuck orders to write
    #[arg(long, default_value = "5000")]
    rows: usize,

    /// Oldest travel end, in days before now
    #[arg(long, default_value = "180")]
    max_days_stuck: i64,

    /// Accounts per order; lower means more repeat users
    #[arg(long, default_value = "0.4")]
    users_ratio: f64,

    /// Add account first/last order and order-count columns
    #[arg(long)]
    with_account_activity: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Output CSV path
    #[arg(long, default_value = "data/stuck_orders_synthetic.csv")]
    output: PathBuf,
}

#[derive(Debug, Clone)]
struct Account {
    id: String,
    first_order: DateTime<Utc>,
    last_order: DateTime<Utc>,
    total_orders: u32,
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn random_offset(rng: &mut impl Rng, max_days: i64) -> Duration {
    Duration::days(rng.gen_range(0..=max_days)) + Duration::seconds(rng.gen_range(0..86_400))
}

fn generate_accounts(rng: &mut impl Rng, count: usize, now: DateTime<Utc>) -> Vec<Account> {
    (0..count)
        .map(|i| {
            let first_order = now - Duration::days(rng.gen_range(200..=900));
            let last_order = (now - random_offset(rng, 120)).max(first_order);
            Account {
                id: format!("acc_{:06}", i + 1),
                first_order,
                last_order,
                total_orders: rng.gen_range(1..=60),
            }
        })
        .collect()
}

fn main() -> Result<()> {
    let args = Args::parse();
    anyhow::ensure!(args.max_days_stuck >= 1, "--max-days-stuck must be at least 1");

    println!("🔧 Stuck Orders Synthetic Data Generator");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Output:           {}", args.output.display());
    println!("Rows:             {}", args.rows);
    println!("Max days stuck:   {}", args.max_days_stuck);
    println!("Users ratio:      {:.2}", args.users_ratio);
    println!("Account activity: {}", args.with_account_activity);
    if let Some(seed) = args.seed {
        println!("Random seed:      {}", seed);
    }
    println!();

    let mut rng: StdRng = match args.seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };

    if let Some(parent) = args.output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let now = Utc::now();
    let account_count = ((args.rows as f64 * args.users_ratio).round() as usize).max(1);
    let accounts = generate_accounts(&mut rng, account_count, now);
    println!("👥 Generated {} accounts", accounts.len());

    let vertical_dist = WeightedIndex::new(VERTICALS.iter().map(|(_, w)| *w))?;
    let status_dist = WeightedIndex::new(STATUSES.iter().map(|(_, w)| *w))?;

    let mut writer = WriterBuilder::new().has_headers(false).from_path(&args.output)?;
    let mut header: Vec<&str> = REQUIRED_COLUMNS.to_vec();
    if args.with_account_activity {
        header.extend([
            ACCOUNT_FIRST_ORDER_COLUMN,
            ACCOUNT_LAST_ORDER_COLUMN,
            ACCOUNT_TOTAL_ORDERS_COLUMN,
        ]);
    }
    writer.write_record(&header)?;

    println!("\n🏭 Generating stuck orders...");
    for i in 0..args.rows {
        let account = &accounts[rng.gen_range(0..accounts.len())];
        let vertical = VERTICALS[vertical_dist.sample(&mut rng)].0;
        let status = STATUSES[status_dist.sample(&mut rng)].0;

        let days_stuck = rng.gen_range(1..=args.max_days_stuck);
        let travel_end =
            now - Duration::days(days_stuck) - Duration::seconds(rng.gen_range(0..86_400));
        let travel_start = travel_end - random_offset(&mut rng, 5);
        let created = travel_start - random_offset(&mut rng, 90);

        let mut row = vec![
            format_ts(&created),
            format!("ORD{:09}", i + 1),
            account.id.clone(),
            vertical.to_string(),
            status.to_string(),
            format_ts(&travel_start),
            format_ts(&travel_end),
        ];
        if args.with_account_activity {
            row.push(format_ts(&account.first_order));
            row.push(format_ts(&account.last_order));
            row.push(account.total_orders.to_string());
        }
        writer.write_record(&row)?;

        if (i + 1) % 10_000 == 0 {
            println!("   Written {} orders...", i + 1);
        }
    }
    writer.flush()?;

    println!("\n✅ Done!");
    println!("   Wrote {} stuck orders to {}", args.rows, args.output.display());

    Ok(())
}

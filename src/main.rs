//! Stuck Orders Report - which orders are stuck, where, and who is affected
//!
//! Run: ./target/release/stuck_orders <CSV> [section] [filters]
//! Sections: all, overview, verticals, time, impact, users, churn, insights, orders

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use stuck_orders::churn::{self, CorrelationStrength, UserStatus};
use stuck_orders::export;
use stuck_orders::impact;
use stuck_orders::table::{self, SortKey};
use stuck_orders::timestamp::format_display;
use stuck_orders::{
    AnalysisConfig, DashboardReport, Dataset, DerivedOrder, FilterSelection, LoadOptions,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Section {
    All,
    Overview,
    Verticals,
    Time,
    Impact,
    Users,
    Churn,
    Insights,
    Orders,
}

/// Stuck orders analysis report
#[derive(Parser, Debug)]
#[command(name = "stuck_orders")]
#[command(about = "Analyze a stuck-orders CSV export")]
struct Args {
    /// Input CSV (or .tsv) export
    input: PathBuf,

    /// Report section to print
    #[arg(value_enum, default_value = "all")]
    section: Section,

    /// Field delimiter (defaults to tab for .tsv, comma otherwise)
    #[arg(long)]
    delimiter: Option<char>,

    /// Only these verticals (repeatable; default all)
    #[arg(long = "vertical")]
    verticals: Vec<String>,

    /// Only these order statuses (repeatable; default all)
    #[arg(long = "status")]
    statuses: Vec<String>,

    /// Minimum days stuck (inclusive)
    #[arg(long)]
    min_days: Option<i64>,

    /// Maximum days stuck (inclusive)
    #[arg(long)]
    max_days: Option<i64>,

    /// Order id substring for the detail table
    #[arg(long, default_value = "")]
    search: String,

    /// Detail table sort column (descending)
    #[arg(long, default_value = "days_stuck")]
    sort_by: SortKey,

    /// Rows printed in the detail table
    #[arg(long, default_value = "25")]
    rows: usize,

    /// Write the filtered orders, monthly impact and user analysis CSVs here
    #[arg(long)]
    export: Option<PathBuf>,

    #[command(flatten)]
    analysis: AnalysisConfig,
}

impl Args {
    fn load_options(&self) -> Result<LoadOptions> {
        match self.delimiter {
            None => Ok(LoadOptions::for_path(&self.input)),
            Some(c) if c.is_ascii() => Ok(LoadOptions { delimiter: c as u8 }),
            Some(c) => anyhow::bail!("delimiter must be a single ASCII character, got '{}'", c),
        }
    }

    fn selection(&self) -> FilterSelection {
        let set = |values: &[String]| {
            (!values.is_empty()).then(|| values.iter().cloned().collect())
        };
        FilterSelection {
            verticals: set(&self.verticals),
            statuses: set(&self.statuses),
            min_days_stuck: self.min_days,
            max_days_stuck: self.max_days,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = args.load_options()?;

    let dataset = Dataset::load_path(&args.input, &options, Utc::now())
        .with_context(|| format!("failed to load {}", args.input.display()))?;
    let spec = args.selection().resolve(&dataset);
    let orders = dataset.filter(&spec);
    info!(total = dataset.len(), filtered = orders.len(), "Applied filters");

    let report = DashboardReport::build(&dataset, &orders, &args.analysis);

    println!("\n{}", "█".repeat(80));
    println!("{}  STUCK ORDERS ANALYSIS  {}", "█".repeat(27), "█".repeat(28));
    println!("{}\n", "█".repeat(80));
    println!("  Source:        {}", args.input.display());
    println!("  Reference now: {}", format_display(&dataset.reference_now()));
    println!("  Showing {} of {} orders", orders.len(), dataset.len());

    match args.section {
        Section::All => {
            print_overview(&report);
            print_verticals(&report);
            print_time(&report);
            print_impact(&report);
            print_users(&report);
            print_churn(&report);
            print_insights(&report);
            print_orders(&orders, &args);
        }
        Section::Overview => print_overview(&report),
        Section::Verticals => print_verticals(&report),
        Section::Time => print_time(&report),
        Section::Impact => print_impact(&report),
        Section::Users => print_users(&report),
        Section::Churn => print_churn(&report),
        Section::Insights => print_insights(&report),
        Section::Orders => print_orders(&orders, &args),
    }

    if let Some(dir) = &args.export {
        export_all(dir, &dataset, &orders, &args.analysis)?;
    }

    println!("\n{}", "█".repeat(80));
    Ok(())
}

fn print_section_header(title: &str) {
    println!("\n{}", "═".repeat(80));
    println!("  {}", title);
    println!("{}\n", "═".repeat(80));
}

fn print_subsection(title: &str) {
    println!("\n{}", title);
    println!("{}", "─".repeat(70));
}

fn fmt_opt(value: Option<f64>, suffix: &str) -> String {
    value
        .map(|v| format!("{:.1}{}", v, suffix))
        .unwrap_or_else(|| "n/a".to_string())
}

fn print_overview(report: &DashboardReport) {
    print_section_header("1. OVERVIEW");

    let all = &report.overview;
    let filtered = &report.filtered_overview;
    println!("  {:24} {:>12} {:>12}", "", "All", "Filtered");
    println!("  {}", "─".repeat(50));
    println!(
        "  {:24} {:>12} {:>12}",
        "Total Stuck Orders", all.total_orders, filtered.total_orders
    );
    println!("  {:24} {:>12} {:>12}", "Unique Users", all.unique_users, filtered.unique_users);
    println!("  {:24} {:>12} {:>12}", "Verticals", all.verticals, filtered.verticals);
    println!(
        "  {:24} {:>12} {:>12}",
        "Avg Days Stuck",
        fmt_opt(all.avg_days_stuck, ""),
        fmt_opt(filtered.avg_days_stuck, "")
    );
}

fn print_verticals(report: &DashboardReport) {
    print_section_header("2. VERTICAL ANALYSIS");

    print_subsection("Orders by Vertical");
    println!("  {:24} {:>10} {:>10}", "Vertical", "Orders", "Share");
    println!("  {}", "─".repeat(46));
    for v in &report.verticals {
        println!("  {:24} {:>10} {:>9.1}%", v.vertical, v.count, v.share_pct);
    }

    print_subsection("Days Stuck by Vertical");
    println!(
        "  {:24} {:>8} {:>8} {:>8} {:>8} {:>6} {:>6}",
        "Vertical", "Orders", "Users", "Mean", "Median", "Min", "Max"
    );
    println!("  {}", "─".repeat(74));
    for (vertical, s) in &report.vertical_stats {
        println!(
            "  {:24} {:>8} {:>8} {:>8.1} {:>8.1} {:>6} {:>6}",
            vertical,
            s.count,
            s.unique_users,
            s.mean_days_stuck,
            s.median_days_stuck,
            s.min_days_stuck,
            s.max_days_stuck
        );
    }

    print_subsection("Order Status by Vertical");
    println!("  {:24} {:30} {:>10}", "Vertical", "Status", "Orders");
    println!("  {}", "─".repeat(66));
    for row in &report.status_by_vertical {
        println!("  {:24} {:30} {:>10}", row.vertical, row.status, row.count);
    }
}

fn print_time(report: &DashboardReport) {
    print_section_header("3. TIME ANALYSIS");

    print_subsection(&format!(
        "Days Stuck Distribution ({}-day buckets)",
        report.histogram_bucket_width_days
    ));
    let widest = report.histogram.iter().map(|b| b.count).max().unwrap_or(0);
    for bucket in &report.histogram {
        let bar_len = if widest > 0 { bucket.count * 40 / widest } else { 0 };
        println!(
            "  {:>5}-{:<5} {:>8}  {}",
            bucket.start,
            bucket.end - 1,
            bucket.count,
            "▇".repeat(bar_len)
        );
    }

    print_subsection("Travel Ends per Day (last 14 days shown)");
    let start = report.travel_end_timeline.len().saturating_sub(14);
    for point in &report.travel_end_timeline[start..] {
        println!("  {}  {:24} {:>8}", point.date, point.vertical, point.count);
    }
    println!(
        "\n  {} created-date points, {} travel-end points",
        report.created_timeline.len(),
        report.travel_end_timeline.len()
    );
}

fn print_impact(report: &DashboardReport) {
    print_section_header("4. MONTHLY USER IMPACT");

    let summary = &report.impact.summary;
    if let Some(peak) = &summary.peak_month {
        println!("  Peak Month:               {} ({} new users)", peak.month, peak.new_users);
    }
    println!("  Avg New Users / Month:    {}", fmt_opt(summary.avg_new_users_per_month, ""));
    println!("  Avg New Users (last 3):   {}", fmt_opt(summary.avg_new_users_last_3_months, ""));
    println!("  Months Tracked:           {}", summary.months_tracked);
    println!(
        "  Accelerating / Slowing:   {} / {}",
        summary.months_accelerating, summary.months_decelerating
    );
    if let Some(trend) = summary.trend_pct {
        println!("  6-Month Trend:            {:+.1}%", trend);
    }

    print_subsection("By Month");
    println!(
        "  {:8} {:>10} {:>12} {:>10} {:>10} {:>10}",
        "Month", "New Users", "Cumulative", "Orders", "Repeat", "MoM"
    );
    println!("  {}", "─".repeat(66));
    for m in &report.impact.months {
        println!(
            "  {:8} {:>10} {:>12} {:>10} {:>10} {:>10}",
            m.month,
            m.new_users_impacted,
            m.cumulative_users,
            m.total_stuck_orders,
            m.repeat_orders,
            fmt_opt(m.mom_growth_pct, "%")
        );
    }
}

fn print_users(report: &DashboardReport) {
    print_section_header("5. USER ANALYSIS");

    print_subsection(&format!("Top {} Affected Accounts", report.top_users.len()));
    println!("  {:4} {:30} {:>12}", "#", "Account", "Stuck Orders");
    println!("  {}", "─".repeat(48));
    for (i, user) in report.top_users.iter().enumerate() {
        println!("  {:4} {:30} {:>12}", i + 1, user.account_id, user.count);
    }
}

fn print_churn(report: &DashboardReport) {
    print_section_header("6. CHURN ANALYSIS");

    let Some(churn) = &report.churn else {
        println!("  Account activity columns not present in this export; churn analysis skipped.");
        return;
    };

    let o = &churn.overview;
    println!("  Churn threshold:          {} days", churn.churn_threshold_days);
    println!("  Users Analyzed:           {}", o.total_users);
    println!("  Churned:                  {}", o.churned_users);
    println!("  Active:                   {}", o.active_users);
    println!("  Churn Rate:               {}", fmt_opt(o.churn_rate_pct, "%"));
    println!(
        "  Stuck After Last Order:   {} (before/during activity: {})",
        churn.timing.after_last_order, churn.timing.before_or_during_activity
    );
    println!(
        "  Last order within {} days of first stuck order: {} of {}",
        churn.quick_churn_window_days,
        churn.time_to_last_order.within_window,
        churn.time_to_last_order.users
    );
    println!("  Potentially delayed by the finish pipeline: {}", churn.potentially_delayed_users);

    print_subsection("Churn by Stuck Order Count");
    for c in &churn.by_stuck_count {
        println!(
            "  {:20} {:>8} users {:>8} churned {:>10}",
            c.category,
            c.total_users,
            c.churned_users,
            fmt_opt(c.churn_rate_pct, "%")
        );
    }

    print_subsection("Churn by Vertical");
    for v in &churn.by_vertical {
        println!(
            "  {:20} {:>8} users {:>8} churned {:>9.1}%",
            v.vertical, v.total_users, v.churned_users, v.churn_rate_pct
        );
    }

    print_subsection("Churned vs Active");
    for s in &churn.segments {
        let label = match s.status {
            UserStatus::Churned => "Churned",
            UserStatus::Active => "Active",
        };
        println!(
            "  {:10} {:>8} users  avg stuck {:>6.2}  avg total orders {:>8}",
            label,
            s.users,
            s.avg_stuck_orders,
            fmt_opt(s.avg_total_orders, "")
        );
    }

    if let (Some(r), Some(strength)) = (churn.correlation.coefficient, churn.correlation.strength) {
        println!("\n  {}", correlation_line(r, strength));
    }
}

fn correlation_line(r: f64, strength: CorrelationStrength) -> String {
    format!("Stuck orders vs churn: r = {:.3} ({:?})", r, strength)
}

fn print_insights(report: &DashboardReport) {
    print_section_header("7. KEY INSIGHTS");

    let insights = &report.insights;
    match &insights.most_affected_vertical {
        Some(v) => println!(
            "  Most affected vertical:   {} ({} orders, {:.1}%)",
            v.vertical, v.count, v.share_pct
        ),
        None => println!("  Most affected vertical:   n/a"),
    }
    match &insights.longest_stuck {
        Some(o) => println!(
            "  Longest stuck order:      {} ({} days, {})",
            o.order_id, o.days_stuck, o.vertical
        ),
        None => println!("  Longest stuck order:      n/a"),
    }
    println!(
        "  Stuck > {} days:          {} ({})",
        insights.long_stuck_threshold_days,
        insights.long_stuck_count,
        fmt_opt(insights.long_stuck_share_pct, "%")
    );
}

fn print_orders(orders: &[&DerivedOrder], args: &Args) {
    print_section_header("8. DETAILED DATA");

    let rows = table::detail_rows(orders, &args.search, args.sort_by);
    println!(
        "  {} matching orders, sorted by {} (showing up to {})\n",
        rows.len(),
        args.sort_by,
        args.rows
    );
    println!(
        "  {:16} {:14} {:14} {:20} {:23} {:>6}",
        "Order", "Account", "Vertical", "Status", "Travel End", "Days"
    );
    println!("  {}", "─".repeat(98));
    for o in rows.iter().take(args.rows) {
        println!(
            "  {:16} {:14} {:14} {:20} {:23} {:>6}",
            o.order_id(),
            o.account_id(),
            o.vertical(),
            o.status(),
            format_display(&o.record.travel_end_ts),
            o.days_stuck
        );
    }
}

fn create_csv(dir: &Path, prefix: &str) -> Result<(PathBuf, BufWriter<File>)> {
    let path = dir.join(export::timestamped_file_name(prefix));
    let file = File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok((path, BufWriter::new(file)))
}

fn export_all(
    dir: &Path,
    dataset: &Dataset,
    orders: &[&DerivedOrder],
    config: &AnalysisConfig,
) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    print_section_header("EXPORT");

    let (path, file) = create_csv(dir, "stuck_orders_filtered")?;
    export::write_orders(file, orders, dataset.has_account_activity())?;
    println!("  ✅ {}", path.display());

    let (path, file) = create_csv(dir, "monthly_user_impact")?;
    export::write_monthly_impact(file, &impact::monthly_impact(orders))?;
    println!("  ✅ {}", path.display());

    if dataset.has_account_activity() {
        let (path, file) = create_csv(dir, "user_correlation_analysis")?;
        let users = churn::user_activity(orders, config.churn_threshold_days);
        export::write_user_activity(file, &users)?;
        println!("  ✅ {}", path.display());
    }

    info!(dir = %dir.display(), "Exported filtered data");
    Ok(())
}

//! REST API Server for the stuck-orders dashboard
//!
//! Usage:
//!   ./target/release/api_server [options]
//!
//! Options:
//!   --port PORT            Port to listen on (default: 8080)
//!   --max-upload-mb MB     Largest accepted upload (default: 64)
//!   plus the analysis defaults (--long-stuck-threshold-days, ...)
//!
//! REST endpoints:
//!   GET  /api/v1/health            - Health check
//!   POST /api/v1/upload            - Replace the session dataset (?delimiter=tab)
//!   GET  /api/v1/filters           - Available verticals, statuses, days range
//!   GET  /api/v1/report            - Every view in one response
//!   GET  /api/v1/overview          - Totals for all and filtered orders
//!   GET  /api/v1/verticals         - Vertical breakdown and stats
//!   GET  /api/v1/time              - Days-stuck histogram and timelines
//!   GET  /api/v1/impact            - Monthly user impact
//!   GET  /api/v1/users             - Top affected accounts (?limit=N)
//!   GET  /api/v1/churn             - Churn analysis (needs account activity)
//!   GET  /api/v1/insights          - Key insights (?threshold=N)
//!   GET  /api/v1/orders            - Detail table (?search=&sort_by=)
//!   GET  /api/v1/export/{orders,monthly,users} - CSV downloads

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use stuck_orders::api::{self, DashboardService};
use stuck_orders::AnalysisConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "api_server")]
#[command(about = "Serve the stuck-orders dashboard over HTTP")]
struct Args {
    /// Port to listen on
    #[arg(long, default_value = "8080")]
    port: u16,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value = "64")]
    max_upload_mb: usize,

    #[command(flatten)]
    analysis: AnalysisConfig,
}

fn print_banner(port: u16, max_upload_mb: usize) {
    println!("============================================================");
    println!("           STUCK ORDERS DASHBOARD API SERVER");
    println!("============================================================");
    println!();
    println!("  Port:     {}", port);
    println!("  REST:     http://localhost:{}/api/v1/", port);
    println!("  Upload:   up to {} MB", max_upload_mb);
    println!();
    println!("REST Endpoints:");
    println!("  GET  /api/v1/health            Health check");
    println!("  POST /api/v1/upload            Upload CSV export");
    println!("  GET  /api/v1/filters           Filter options");
    println!("  GET  /api/v1/report            Full dashboard");
    println!("  GET  /api/v1/overview          Overview");
    println!("  GET  /api/v1/verticals         Vertical analysis");
    println!("  GET  /api/v1/time              Time analysis");
    println!("  GET  /api/v1/impact            Monthly user impact");
    println!("  GET  /api/v1/users             User analysis");
    println!("  GET  /api/v1/churn             Churn analysis");
    println!("  GET  /api/v1/insights          Key insights");
    println!("  GET  /api/v1/orders            Detailed data");
    println!("  GET  /api/v1/export/...        CSV exports");
    println!();
    println!("============================================================");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .init();

    let args = Args::parse();
    print_banner(args.port, args.max_upload_mb);

    let service = Arc::new(DashboardService::new(args.analysis));
    let app = api::router(service, args.max_upload_mb * 1024 * 1024);

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!("Starting REST server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! REST API handlers for the stuck-orders dashboard
//!
//! Every read endpoint takes the same filter query and computes its view
//! from the current session dataset.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use super::service::{DashboardService, ServiceError};
use crate::aggregate::{
    Aggregator, HistogramBucket, Overview, StatusCount, TimelinePoint, UserCount, VerticalCount,
    VerticalStats,
};
use crate::churn::{self, ChurnAnalysis};
use crate::config::AnalysisConfig;
use crate::dataset::{Dataset, FilterOptions};
use crate::export;
use crate::filter::FilterSelection;
use crate::impact::{self, ImpactAnalysis};
use crate::loader::LoadOptions;
use crate::models::DerivedOrder;
use crate::report::{DashboardReport, KeyInsights};
use crate::table::{self, DisplayRow, SortKey};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub rows: usize,
    pub has_account_activity: bool,
    pub reference_now: DateTime<Utc>,
    pub filters: FilterOptions,
}

#[derive(Serialize)]
pub struct OverviewResponse {
    pub total: Overview,
    pub filtered: Overview,
}

#[derive(Serialize)]
pub struct VerticalsResponse {
    pub counts: Vec<VerticalCount>,
    pub stats: BTreeMap<String, VerticalStats>,
    pub status_by_vertical: Vec<StatusCount>,
}

#[derive(Serialize)]
pub struct TimeResponse {
    pub bucket_width_days: i64,
    pub histogram: Vec<HistogramBucket>,
    pub created_timeline: Vec<TimelinePoint>,
    pub travel_end_timeline: Vec<TimelinePoint>,
}

#[derive(Serialize)]
pub struct UsersResponse {
    pub total_users: usize,
    pub top_users: Vec<UserCount>,
}

#[derive(Serialize)]
pub struct OrdersResponse {
    pub total_matching: usize,
    pub sort_by: SortKey,
    pub rows: Vec<DisplayRow>,
}

// ============================================================================
// Query Parameters
// ============================================================================

/// Comma-separated lists; absent means everything, present but empty means
/// nothing.
#[derive(Debug, Default, Deserialize)]
pub struct FilterQuery {
    pub verticals: Option<String>,
    pub statuses: Option<String>,
    pub min_days: Option<i64>,
    pub max_days: Option<i64>,
}

impl FilterQuery {
    pub fn selection(&self) -> FilterSelection {
        FilterSelection {
            verticals: self.verticals.as_deref().map(parse_list),
            statuses: self.statuses.as_deref().map(parse_list),
            min_days_stuck: self.min_days,
            max_days_stuck: self.max_days,
        }
    }
}

fn parse_list(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub bucket_width: Option<i64>,
    pub limit: Option<usize>,
    pub threshold: Option<i64>,
    pub churn_threshold: Option<i64>,
    pub search: Option<String>,
    pub sort_by: Option<SortKey>,
}

impl ViewQuery {
    fn apply_to(&self, base: &AnalysisConfig) -> AnalysisConfig {
        let mut config = base.clone();
        if let Some(width) = self.bucket_width {
            config.histogram_bucket_width_days = width;
        }
        if let Some(limit) = self.limit {
            config.top_users = limit;
        }
        if let Some(threshold) = self.threshold {
            config.long_stuck_threshold_days = threshold;
        }
        if let Some(days) = self.churn_threshold {
            config.churn_threshold_days = AnalysisConfig::clamp_churn_threshold(days);
        }
        config
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub delimiter: Option<String>,
}

fn parse_delimiter(raw: Option<&str>) -> Result<u8, String> {
    match raw {
        None | Some("comma") | Some(",") => Ok(b','),
        Some("tab") | Some("\t") => Ok(b'\t'),
        Some("semicolon") | Some(";") => Ok(b';'),
        Some("pipe") | Some("|") => Ok(b'|'),
        Some(other) if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        Some(other) => Err(format!("unsupported delimiter '{}'", other)),
    }
}

// ============================================================================
// Errors
// ============================================================================

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(ErrorResponse { error: message.to_string() }))
}

impl From<ServiceError> for (StatusCode, Json<ErrorResponse>) {
    fn from(e: ServiceError) -> Self {
        let status = match e {
            ServiceError::NoDataset => StatusCode::CONFLICT,
            ServiceError::Load(_) => StatusCode::BAD_REQUEST,
            ServiceError::MissingAccountActivity => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error(status, e)
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub type AppState = Arc<DashboardService>;

fn filtered<'a>(dataset: &'a Dataset, query: &FilterQuery) -> Vec<&'a DerivedOrder> {
    let spec = query.selection().resolve(dataset);
    debug!(?spec, "Resolved filter");
    dataset.filter(&spec)
}

fn csv_attachment(prefix: &str, body: String) -> impl IntoResponse {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::timestamped_file_name(prefix)
    );
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

/// GET /api/v1/health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// POST /api/v1/upload
pub async fn upload(
    State(service): State<AppState>,
    Query(params): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<UploadResponse>, ApiError> {
    let delimiter = parse_delimiter(params.delimiter.as_deref())
        .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;
    let dataset = service.upload(body, LoadOptions { delimiter }).await?;
    Ok(Json(UploadResponse {
        rows: dataset.len(),
        has_account_activity: dataset.has_account_activity(),
        reference_now: dataset.reference_now(),
        filters: dataset.filter_options(),
    }))
}

/// GET /api/v1/filters
pub async fn get_filters(State(service): State<AppState>) -> Result<Json<FilterOptions>, ApiError> {
    let dataset = service.current().await?;
    Ok(Json(dataset.filter_options()))
}

/// GET /api/v1/report
pub async fn get_report(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<DashboardReport>, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let config = view.apply_to(service.config());
    Ok(Json(DashboardReport::build(&dataset, &orders, &config)))
}

/// GET /api/v1/overview
pub async fn get_overview(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
) -> Result<Json<OverviewResponse>, ApiError> {
    let dataset = service.current().await?;
    let all = dataset.view();
    let orders = filtered(&dataset, &filter);
    Ok(Json(OverviewResponse {
        total: Aggregator::new(&all).overview(),
        filtered: Aggregator::new(&orders).overview(),
    }))
}

/// GET /api/v1/verticals
pub async fn get_verticals(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
) -> Result<Json<VerticalsResponse>, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let agg = Aggregator::new(&orders);
    Ok(Json(VerticalsResponse {
        counts: agg.vertical_counts(),
        stats: agg.per_vertical_stats(),
        status_by_vertical: agg.status_by_vertical(),
    }))
}

/// GET /api/v1/time
pub async fn get_time(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<TimeResponse>, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let width = view.apply_to(service.config()).histogram_bucket_width_days;
    let agg = Aggregator::new(&orders);
    Ok(Json(TimeResponse {
        bucket_width_days: width.max(1),
        histogram: agg.histogram_buckets(width),
        created_timeline: agg.daily_created_timeline(),
        travel_end_timeline: agg.daily_travel_end_timeline(),
    }))
}

/// GET /api/v1/impact
pub async fn get_impact(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
) -> Result<Json<ImpactAnalysis>, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    Ok(Json(impact::analyze(&orders)))
}

/// GET /api/v1/users
pub async fn get_users(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<UsersResponse>, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let limit = view.apply_to(service.config()).top_users;
    let agg = Aggregator::new(&orders);
    Ok(Json(UsersResponse {
        total_users: agg.distinct_user_count(),
        top_users: agg.per_user_counts().into_iter().take(limit).collect(),
    }))
}

/// GET /api/v1/churn
pub async fn get_churn(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<ChurnAnalysis>, ApiError> {
    let dataset = service.current_with_activity().await?;
    let orders = filtered(&dataset, &filter);
    let params = view.apply_to(service.config()).churn_params();
    Ok(Json(churn::analyze(&orders, &params)))
}

/// GET /api/v1/insights
pub async fn get_insights(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<KeyInsights>, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let threshold = view.apply_to(service.config()).long_stuck_threshold_days;
    Ok(Json(KeyInsights::build(&orders, threshold)))
}

/// GET /api/v1/orders
pub async fn get_orders(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
    Query(view): Query<ViewQuery>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let sort_by = view.sort_by.unwrap_or_default();
    let rows = table::detail_rows(&orders, view.search.as_deref().unwrap_or(""), sort_by);
    Ok(Json(OrdersResponse {
        total_matching: rows.len(),
        sort_by,
        rows: rows
            .into_iter()
            .take(view.limit.unwrap_or(usize::MAX))
            .map(DisplayRow::from)
            .collect(),
    }))
}

/// GET /api/v1/export/orders
pub async fn export_orders(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let body = export::to_string(|buf| {
        export::write_orders(buf, &orders, dataset.has_account_activity())
    })
    .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(csv_attachment("stuck_orders_filtered", body))
}

/// GET /api/v1/export/monthly
pub async fn export_monthly(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset = service.current().await?;
    let orders = filtered(&dataset, &filter);
    let months = impact::monthly_impact(&orders);
    let body = export::to_string(|buf| export::write_monthly_impact(buf, &months))
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(csv_attachment("monthly_user_impact", body))
}

/// GET /api/v1/export/users
pub async fn export_users(
    State(service): State<AppState>,
    Query(filter): Query<FilterQuery>,
    Query(view): Query<ViewQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let dataset = service.current_with_activity().await?;
    let orders = filtered(&dataset, &filter);
    let threshold = view.apply_to(service.config()).churn_threshold_days;
    let users = churn::user_activity(&orders, threshold);
    let body = export::to_string(|buf| export::write_user_activity(buf, &users))
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    Ok(csv_attachment("user_correlation_analysis", body))
}

//! REST router driven in-process.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use stuck_orders::api::{self, DashboardService};
use stuck_orders::AnalysisConfig;
use tower::ServiceExt;

const SAMPLE: &str = "\
order_created_timestamp,order_id,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts
2024-01-01 09:00:00,A-1,u1,event,eticket_issued,2024-01-05 12:00:00,2024-01-06 12:00:00
2024-01-02 09:00:00,A-2,u1,hotel,eticket_issued,2024-01-10 12:00:00,2024-01-12 12:00:00
2024-01-03 09:00:00,B-1,u2,event,paid,2024-02-01 12:00:00,2024-02-02 12:00:00
";

const WITH_ACTIVITY: &str = "\
order_created_timestamp,order_id,account_id,order_type_name,order_status_name,travel_start_ts,travel_end_ts,account_first_order_created_timestamp,account_last_order_created_timestamp,account_total_orders_during_analysis_period
2024-01-01 09:00:00,A-1,u1,event,eticket_issued,2024-01-05 12:00:00,2024-01-06 12:00:00,2023-01-01 00:00:00,2024-01-03 00:00:00,12
2024-01-03 09:00:00,B-1,u2,event,paid,2024-02-01 12:00:00,2024-02-02 12:00:00,2023-06-01 00:00:00,2024-01-20 00:00:00,4
";

fn app() -> Router {
    let service = Arc::new(DashboardService::new(AnalysisConfig::default()));
    api::router(service, 1024 * 1024)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, Request::get(uri).body(Body::empty()).unwrap()).await;
    (status, serde_json::from_slice(&body).unwrap())
}

async fn upload(app: &Router, csv: &str) -> (StatusCode, Value) {
    let request = Request::post("/api/v1/upload")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from(csv.to_string()))
        .unwrap();
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (status, json) = get_json(&app(), "/api/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_views_require_upload() {
    let (status, json) = get_json(&app(), "/api/v1/report").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("upload"));
}

#[tokio::test]
async fn test_upload_then_query() {
    let app = app();
    let (status, json) = upload(&app, SAMPLE).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["rows"], 3);
    assert_eq!(json["has_account_activity"], false);
    assert_eq!(json["filters"]["verticals"], serde_json::json!(["event", "hotel"]));

    let (status, json) = get_json(&app, "/api/v1/overview?verticals=event").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"]["total_orders"], 3);
    assert_eq!(json["filtered"]["total_orders"], 2);

    let (_, json) = get_json(&app, "/api/v1/users?limit=1").await;
    assert_eq!(json["total_users"], 2);
    assert_eq!(json["top_users"][0]["account_id"], "u1");
    assert_eq!(json["top_users"].as_array().unwrap().len(), 1);

    let uri = "/api/v1/orders?search=A-&sort_by=order_created_timestamp";
    let (_, json) = get_json(&app, uri).await;
    assert_eq!(json["total_matching"], 2);
    assert_eq!(json["rows"][0]["order_id"], "A-2");

    let (_, json) = get_json(&app, "/api/v1/insights?statuses=paid").await;
    assert_eq!(json["longest_stuck"]["order_id"], "B-1");
}

#[tokio::test]
async fn test_empty_list_selects_nothing() {
    let app = app();
    upload(&app, SAMPLE).await;
    let (status, json) = get_json(&app, "/api/v1/report?verticals=").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filtered_count"], 0);
    assert_eq!(json["overview"]["total_orders"], 3);
}

#[tokio::test]
async fn test_bad_upload_keeps_previous_dataset() {
    let app = app();
    upload(&app, SAMPLE).await;

    let broken = SAMPLE.replace("2024-01-12 12:00:00", "whenever");
    let (status, json) = upload(&app, &broken).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("row 2"));

    let (status, json) = get_json(&app, "/api/v1/filters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["verticals"], serde_json::json!(["event", "hotel"]));
}

#[tokio::test]
async fn test_churn_needs_account_activity() {
    let app = app();
    upload(&app, SAMPLE).await;
    let (status, _) = get_json(&app, "/api/v1/churn").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    upload(&app, WITH_ACTIVITY).await;
    let (status, json) = get_json(&app, "/api/v1/churn?churn_threshold=7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["churn_threshold_days"], 7);
    assert_eq!(json["overview"]["total_users"], 2);
}

#[tokio::test]
async fn test_export_orders_csv() {
    let app = app();
    upload(&app, SAMPLE).await;

    let request = Request::get("/api/v1/export/orders?verticals=hotel")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert!(disposition.contains("stuck_orders_filtered_"));

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("order_created_timestamp,order_id"));
    assert!(lines[1].contains(",A-2,u1,hotel,"));
}

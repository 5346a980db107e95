//! Delivery-reminder sweep behavior: window selection, status filtering and
//! the absence of de-duplication across sweeps.

mod common;

use axum::http::Method;
use chrono::{Duration, Utc};
use common::{seed_vendor, TestApp};
use serde_json::{json, Value};
use uuid::Uuid;
use vendorhub_api::message_queue::MessageQueue;
use vendorhub_api::notifications::{sweep_once, EmailJob, EMAIL_TOPIC};

fn pending_order_payload(vendor_id: Uuid, po_number: &str, due_in_days: i64) -> Value {
    let now = Utc::now();
    json!({
        "po_number": po_number,
        "vendor_id": vendor_id,
        "order_date": now.to_rfc3339(),
        "delivery_date": (now + Duration::days(due_in_days)).to_rfc3339(),
        "items": [],
        "quantity": 1,
        "status": "pending",
        "issue_date": now.to_rfc3339(),
    })
}

async fn drain_queue(app: &TestApp) -> Vec<EmailJob> {
    let mut jobs = Vec::new();
    while let Some(message) = app.queue.subscribe(EMAIL_TOPIC).await.unwrap() {
        jobs.push(serde_json::from_value(message.payload).unwrap());
    }
    jobs
}

#[tokio::test]
async fn sweep_reminds_only_pending_orders_inside_the_window() {
    let app = TestApp::new().await;
    let (vendor_id, _) = seed_vendor(&app, "REM-01").await;

    // Qualifies: pending, due in 2 days.
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/purchase_orders",
            Some(pending_order_payload(vendor_id, "REM-DUE", 2)),
        )
        .await;
    assert_eq!(response.status(), 201);

    // Outside the window: due in 10 days.
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/purchase_orders",
            Some(pending_order_payload(vendor_id, "REM-FAR", 10)),
        )
        .await;
    assert_eq!(response.status(), 201);

    // Wrong status: completed, due tomorrow.
    let mut completed = pending_order_payload(vendor_id, "REM-DONE", 1);
    completed["status"] = json!("completed");
    let response = app
        .request_authenticated(Method::POST, "/api/purchase_orders", Some(completed))
        .await;
    assert_eq!(response.status(), 201);

    // Discard the order-confirmation emails queued by creation.
    drain_queue(&app).await;

    let dispatched = sweep_once(&app.state.db, &app.state.services.email, 3)
        .await
        .unwrap();
    assert_eq!(dispatched, 1);

    let jobs = drain_queue(&app).await;
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].subject.contains("REM-DUE"));
}

#[tokio::test]
async fn deadline_already_passed_is_not_reminded() {
    let app = TestApp::new().await;
    let (vendor_id, _) = seed_vendor(&app, "REM-02").await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/purchase_orders",
            Some(pending_order_payload(vendor_id, "REM-PAST", -1)),
        )
        .await;
    assert_eq!(response.status(), 201);
    drain_queue(&app).await;

    let dispatched = sweep_once(&app.state.db, &app.state.services.email, 3)
        .await
        .unwrap();
    assert_eq!(dispatched, 0);
}

#[tokio::test]
async fn sweeps_resend_without_deduplication() {
    let app = TestApp::new().await;
    let (vendor_id, _) = seed_vendor(&app, "REM-03").await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/purchase_orders",
            Some(pending_order_payload(vendor_id, "REM-AGAIN", 2)),
        )
        .await;
    assert_eq!(response.status(), 201);
    drain_queue(&app).await;

    for _ in 0..3 {
        let dispatched = sweep_once(&app.state.db, &app.state.services.email, 3)
            .await
            .unwrap();
        assert_eq!(dispatched, 1);
    }

    let jobs = drain_queue(&app).await;
    assert_eq!(jobs.len(), 3);
}

#[tokio::test]
async fn empty_window_dispatches_nothing() {
    let app = TestApp::new().await;
    seed_vendor(&app, "REM-04").await;

    let dispatched = sweep_once(&app.state.db, &app.state.services.email, 3)
        .await
        .unwrap();
    assert_eq!(dispatched, 0);
}

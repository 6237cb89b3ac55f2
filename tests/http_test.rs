mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use escrow_sync::AppState;
use escrow_sync::adapters::http::router;
use escrow_sync::adapters::http::webhook::EVENT_TYPE_HEADER;
use escrow_sync::domain::event_type::WebhookEventType;
use escrow_sync::services::signature::{SIGNATURE_HEADER, sign_payload};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(h: &Harness) -> axum::Router {
    router(AppState {
        service: h.service.clone(),
    })
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn webhook_request(path: &str, body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json");
    if let Some(sig) = signature {
        builder = builder.header(SIGNATURE_HEADER, sig);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn health_check() {
    let h = Harness::new();
    let response = app(&h)
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_accepts_then_reports_duplicate() {
    let h = Harness::new();
    let integration = h.add_integration(true, Some(SECRET)).await;
    let body = envelope(
        "evt_http_1",
        WebhookEventType::ClosingCompleted,
        json!({"transaction_id": "tx_1"}),
    );
    let path = format!("/webhooks/softpro/{integration}");

    let (status, json) = send(
        app(&h),
        webhook_request(&path, body.clone(), Some(sign_payload(&body, SECRET))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["priority"], 2);
    let event_id = json["event_id"].as_str().unwrap().to_string();

    let (status, json) = send(
        app(&h),
        webhook_request(&path, body.clone(), Some(sign_payload(&body, SECRET))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "duplicate");

    h.drain().await;
    let (status, json) = send(
        app(&h),
        Request::get(format!("/events/{event_id}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "COMPLETED");
    assert_eq!(json["event_type"], "CLOSING_COMPLETED");
    assert_eq!(json["integration"]["organization_id"], "org_test");
}

#[tokio::test]
async fn rejections_map_to_status_codes() {
    let h = Harness::new();
    let active = h.add_integration(true, Some(SECRET)).await;
    let inactive = h.add_integration(false, Some(SECRET)).await;
    let body = envelope(
        "evt_http_bad",
        WebhookEventType::TaskCreated,
        json!({"task_id": "t_1"}),
    );

    let (status, json) = send(
        app(&h),
        webhook_request(
            &format!("/webhooks/softpro/{active}"),
            body.clone(),
            Some(sign_payload(&body, "not_the_secret")),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error_code"], "invalid_signature");

    let (status, _) = send(
        app(&h),
        webhook_request(
            &format!("/webhooks/softpro/{inactive}"),
            body.clone(),
            Some(sign_payload(&body, SECRET)),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        app(&h),
        webhook_request("/webhooks/softpro/not-a-uuid", body.clone(), None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(h.events.count().await, 0);
}

#[tokio::test]
async fn retry_endpoint_and_listing() {
    let h = Harness::new();
    let integration = h.add_integration(true, None).await;
    let body = envelope(
        "evt_http_retry",
        WebhookEventType::DocumentUpdated,
        json!({"document_id": "d_1"}),
    );
    let (_, json) = send(
        app(&h),
        webhook_request(&format!("/webhooks/softpro/{integration}"), body, None),
    )
    .await;
    let event_id = json["event_id"].as_str().unwrap().to_string();
    h.drain().await;

    let (status, json) = send(
        app(&h),
        Request::post(format!("/events/{event_id}/retry"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "retrying");

    let (status, json) = send(
        app(&h),
        Request::get("/events?status=retrying&limit=5")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().map(Vec::len), Some(1));
    assert_eq!(json[0]["retry_count"], 1);

    let (status, _) = send(
        app(&h),
        Request::get("/events?status=bogus")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let missing = escrow_sync::domain::id::WebhookEventId::generate();
    let (status, json) = send(
        app(&h),
        Request::post(format!("/events/{missing}/retry"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error_code"], "event_not_found");
}

fn typeless_body(event_id: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "event": {
            "id": event_id,
            "timestamp": rfc3339(chrono::Utc::now()),
            "data": {"task_id": "t_1"},
        }
    }))
    .unwrap()
}

#[tokio::test]
async fn inactive_integration_wins_over_unresolvable_type() {
    let h = Harness::new();
    let inactive = h.add_integration(false, Some(SECRET)).await;
    let path = format!("/webhooks/softpro/{inactive}");

    let body = typeless_body("evt_typeless");
    let (status, json) = send(app(&h), webhook_request(&path, body.clone(), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error_code"], "integration_inactive");

    let request = Request::post(path.as_str())
        .header(EVENT_TYPE_HEADER, "NOT_A_TYPE")
        .body(Body::from(b"not json".to_vec()))
        .unwrap();
    let (status, _) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unsigned_typeless_body_is_a_signature_error() {
    let h = Harness::new();
    let integration = h.add_integration(true, Some(SECRET)).await;
    let (status, json) = send(
        app(&h),
        webhook_request(
            &format!("/webhooks/softpro/{integration}"),
            typeless_body("evt_unsigned"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error_code"], "invalid_signature");
}

#[tokio::test]
async fn event_type_from_header_or_envelope() {
    let h = Harness::new();
    let integration = h.add_integration(true, Some(SECRET)).await;
    let path = format!("/webhooks/softpro/{integration}");

    // Header only.
    let body = typeless_body("evt_header_type");
    let request = Request::post(path.as_str())
        .header(EVENT_TYPE_HEADER, "task_created")
        .header(SIGNATURE_HEADER, sign_payload(&body, SECRET))
        .body(Body::from(body))
        .unwrap();
    let (status, json) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "accepted");
    assert_eq!(json["priority"], 3);

    // Neither header nor envelope names a type.
    let body = typeless_body("evt_no_type");
    let (status, json) = send(
        app(&h),
        webhook_request(&path, body.clone(), Some(sign_payload(&body, SECRET))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_code"], "validation_error");

    // Header and envelope disagree.
    let body = envelope(
        "evt_disagree",
        WebhookEventType::ContactCreated,
        json!({"contact_id": "c_1"}),
    );
    let request = Request::post(path.as_str())
        .header(EVENT_TYPE_HEADER, "TASK_CREATED")
        .header(SIGNATURE_HEADER, sign_payload(&body, SECRET))
        .body(Body::from(body))
        .unwrap();
    let (status, _) = send(app(&h), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.events.count().await, 1);
}

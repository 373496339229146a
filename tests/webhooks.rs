//! Stripe webhook signature verification and settlement-merge tests.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use serde_json::json;
use tower::ServiceExt;

fn test_stripe_client() -> StripeClient {
    StripeClient::new(&StripeConfig {
        secret_key: "sk_test_xxx".to_string(),
        webhook_secret: TEST_WEBHOOK_SECRET.to_string(),
    })
}

fn current_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

fn old_timestamp() -> String {
    // 10 minutes ago - beyond the 5-minute tolerance
    (chrono::Utc::now().timestamp() - 600).to_string()
}

fn compute_stripe_signature(payload: &[u8], secret: &str, timestamp: &str) -> String {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;

    let signed_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_payload.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn signature_header(payload: &[u8], secret: &str) -> String {
    let timestamp = current_timestamp();
    let sig = compute_stripe_signature(payload, secret, &timestamp);
    format!("t={},v1={}", timestamp, sig)
}

// ============ Signature verification ============

#[test]
fn valid_signature_is_accepted() {
    let client = test_stripe_client();
    let payload = b"{\"type\":\"checkout.session.completed\"}";
    let header = signature_header(payload, TEST_WEBHOOK_SECRET);

    let result = client
        .verify_webhook_signature(payload, &header)
        .expect("Verification should not error");
    assert!(result);
}

#[test]
fn wrong_secret_is_rejected() {
    let client = test_stripe_client();
    let payload = b"{\"type\":\"checkout.session.completed\"}";
    let header = signature_header(payload, "wrong_secret");

    let result = client
        .verify_webhook_signature(payload, &header)
        .expect("Verification should not error");
    assert!(!result);
}

#[test]
fn modified_payload_is_rejected() {
    let client = test_stripe_client();
    let original = b"{\"type\":\"checkout.session.completed\"}";
    let modified = b"{\"type\":\"checkout.session.completed\",\"hacked\":true}";
    let header = signature_header(original, TEST_WEBHOOK_SECRET);

    let result = client
        .verify_webhook_signature(modified, &header)
        .expect("Verification should not error");
    assert!(!result);
}

#[test]
fn old_timestamp_is_rejected() {
    let client = test_stripe_client();
    let payload = b"{\"type\":\"checkout.session.completed\"}";
    let timestamp = old_timestamp();
    let sig = compute_stripe_signature(payload, TEST_WEBHOOK_SECRET, &timestamp);
    let header = format!("t={},v1={}", timestamp, sig);

    let result = client
        .verify_webhook_signature(payload, &header)
        .expect("Verification should not error");
    assert!(!result, "Replayed webhooks must be rejected");
}

#[test]
fn missing_timestamp_errors() {
    let client = test_stripe_client();
    let payload = b"{\"type\":\"checkout.session.completed\"}";
    assert!(client
        .verify_webhook_signature(payload, "v1=somesignature")
        .is_err());
}

// ============ Endpoint behavior ============

async fn post_webhook(
    app: &axum::Router,
    body: &str,
    signature: Option<&str>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method("POST").uri("/webhook/stripe");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn checkout_completed_event(invoice: &str, payment_status: &str) -> String {
    json!({
        "type": "checkout.session.completed",
        "data": { "object": {
            "id": invoice,
            "payment_status": payment_status,
            "metadata": { "buyer_uid": "user-1" },
            "customer_details": { "name": "Jess Buyer", "email": "buyer@example.com" },
            "shipping_details": {
                "name": "Jess Buyer",
                "address": { "country": "AU", "line1": "1 Beach Rd", "postal_code": "4000" }
            }
        }}
    })
    .to_string()
}

#[tokio::test]
async fn missing_signature_header_is_bad_request() {
    let env = test_state(None, None);
    let app = app(env.state.clone());

    let (status, _) = post_webhook(&app, "{}", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_signature_is_bad_request() {
    let env = test_state(None, None);
    let app = app(env.state.clone());

    let body = checkout_completed_event("cs_hook_1", "paid");
    let header = signature_header(body.as_bytes(), "wrong_secret");
    let (status, _) = post_webhook(&app, &body, Some(&header)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let conn = env.state.db.get().unwrap();
    assert!(queries::get_order(&conn, "cs_hook_1").unwrap().is_none());
}

#[tokio::test]
async fn settlement_creates_a_paid_order_record() {
    let env = test_state(None, None);
    let app = app(env.state.clone());

    let body = checkout_completed_event("cs_hook_1", "paid");
    let header = signature_header(body.as_bytes(), TEST_WEBHOOK_SECRET);
    let (status, text) = post_webhook(&app, &body, Some(&header)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Received");

    let conn = env.state.db.get().unwrap();
    let order = queries::get_order(&conn, "cs_hook_1").unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.user_id.as_deref(), Some("user-1"));
    assert_eq!(order.user_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(order.shipping_name.as_deref(), Some("Jess Buyer"));
    assert!(order.shipping_address.as_deref().unwrap().contains("1 Beach Rd"));
    // Webhook-only rows carry no derived line items.
    assert!(order.products.is_empty());
}

#[tokio::test]
async fn settlement_merges_into_confirmed_order() {
    let env = test_state(None, None);
    {
        let conn = env.state.db.get().unwrap();
        queries::put_global_order(&conn, &make_order("cs_hook_2", "user-1")).unwrap();
    }
    let app = app(env.state.clone());

    let body = checkout_completed_event("cs_hook_2", "paid");
    let header = signature_header(body.as_bytes(), TEST_WEBHOOK_SECRET);
    let (status, _) = post_webhook(&app, &body, Some(&header)).await;
    assert_eq!(status, StatusCode::OK);

    let conn = env.state.db.get().unwrap();
    let order = queries::get_order(&conn, "cs_hook_2").unwrap().unwrap();
    // Settlement fields updated, confirmation-path fields preserved.
    assert_eq!(order.status, OrderStatus::Paid);
    assert_eq!(order.shipping_name.as_deref(), Some("Jess Buyer"));
    assert_eq!(order.subtotal_cents, 10000);
    assert_eq!(order.products.len(), 1);
}

#[tokio::test]
async fn unpaid_session_is_ignored() {
    let env = test_state(None, None);
    let app = app(env.state.clone());

    let body = checkout_completed_event("cs_hook_3", "unpaid");
    let header = signature_header(body.as_bytes(), TEST_WEBHOOK_SECRET);
    let (status, _) = post_webhook(&app, &body, Some(&header)).await;

    assert_eq!(status, StatusCode::OK);
    let conn = env.state.db.get().unwrap();
    assert!(queries::get_order(&conn, "cs_hook_3").unwrap().is_none());
}

#[tokio::test]
async fn unrelated_event_types_are_acknowledged_without_writes() {
    let env = test_state(None, None);
    let app = app(env.state.clone());

    let body = json!({
        "type": "invoice.paid",
        "data": { "object": { "id": "in_1" } }
    })
    .to_string();
    let header = signature_header(body.as_bytes(), TEST_WEBHOOK_SECRET);
    let (status, text) = post_webhook(&app, &body, Some(&header)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "Received");
}

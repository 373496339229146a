use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::db::{queries, AppState};
use crate::payments::{StripeCheckoutSession, StripeWebhookEvent};

/// Provider-initiated settlement reports.
///
/// Runs independently of the client-triggered confirmation path and may
/// arrive before, during, or after it; the two writers of the order
/// record are not synchronized. This path performs a field-level merge
/// on the global order only: settlement status, buyer identity and the
/// shipping details collected on the hosted page.
pub async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = match headers.get("stripe-signature").and_then(|v| v.to_str().ok()) {
        Some(s) => s.to_string(),
        None => return (StatusCode::BAD_REQUEST, "Missing stripe-signature header"),
    };

    match state.stripe.verify_webhook_signature(&body, &signature) {
        Ok(true) => {}
        Ok(false) => {
            tracing::warn!("Stripe webhook signature verification failed");
            return (StatusCode::BAD_REQUEST, "Webhook signature verification failed");
        }
        Err(e) => {
            tracing::warn!("Malformed Stripe webhook signature: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid signature header");
        }
    }

    let event: StripeWebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("Failed to parse Stripe webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid JSON");
        }
    };

    if event.event_type == "checkout.session.completed" {
        let session: StripeCheckoutSession = match serde_json::from_value(event.data.object) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to parse checkout session: {}", e);
                return (StatusCode::BAD_REQUEST, "Invalid checkout session");
            }
        };

        if session.payment_status != "paid" {
            tracing::info!(
                "Ignoring checkout.session.completed with payment_status {}",
                session.payment_status
            );
            return (StatusCode::OK, "Received");
        }

        if let Err(e) = persist_checkout_completed(&state, &session) {
            tracing::error!("Failed to persist Stripe event for {}: {}", session.id, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to log Stripe event");
        }

        tracing::info!("Webhook processed and shipping saved for order {}", session.id);
    }

    (StatusCode::OK, "Received")
}

fn persist_checkout_completed(
    state: &AppState,
    session: &StripeCheckoutSession,
) -> crate::error::Result<()> {
    let buyer_uid = session.metadata.get("buyer_uid").map(String::as_str);
    let email = session
        .customer_details
        .as_ref()
        .and_then(|d| d.email.as_deref())
        .or(session.customer_email.as_deref());

    let (shipping_name, shipping_address) = match &session.shipping_details {
        Some(shipping) => (
            shipping.name.as_deref(),
            shipping.address.as_ref().map(|a| a.to_string()),
        ),
        None => (None, None),
    };

    let conn = state.db.get()?;
    queries::apply_webhook_checkout(
        &conn,
        &session.id,
        buyer_uid,
        email,
        shipping_name,
        shipping_address.as_deref(),
    )
}

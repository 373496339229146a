use axum::{extract::State, Extension};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::AuthedUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::handlers::internal::send_order_receipt;
use crate::models::{order_totals, Order, OrderProduct, OrderStatus};

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub success: bool,
}

/// Reconcile a completed checkout session into a durable order record.
///
/// Line items are re-derived from the provider's own session record;
/// whatever cart the client still holds locally plays no part here.
pub async fn confirm_purchase(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(request): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>> {
    if request.session_id.is_empty() {
        return Err(AppError::Unauthenticated);
    }

    match confirm_inner(&state, &user, &request.session_id).await {
        Ok(()) => Ok(Json(ConfirmResponse { success: true })),
        Err(err) if err.is_validation() => Err(err),
        Err(err) => {
            tracing::error!(
                "Purchase confirmation failed for session {}: {}",
                request.session_id,
                err
            );
            Err(AppError::Internal(msg::CONFIRM_FAILED.into()))
        }
    }
}

async fn confirm_inner(state: &AppState, user: &AuthedUser, session_id: &str) -> Result<()> {
    let session = state.stripe.retrieve_checkout_session(session_id).await?;

    let conn = state.db.get()?;
    let rates = queries::get_commission_rates(&conn)?;

    let line_items = session
        .line_items
        .as_ref()
        .map(|list| list.data.as_slice())
        .unwrap_or(&[]);

    let mut products = Vec::with_capacity(line_items.len());
    let mut line_totals = Vec::with_capacity(line_items.len());
    for item in line_items {
        let product_ref = item
            .price
            .as_ref()
            .map(|p| p.product.as_str())
            .unwrap_or_default();

        // The catalog row recovers type and creator; a session line whose
        // product has since vanished falls back to the provider fields.
        let record = if product_ref.is_empty() {
            None
        } else {
            queries::get_product_by_id(&conn, product_ref)?
        };
        let product_type = record
            .as_ref()
            .map(|p| p.product_type.clone())
            .unwrap_or_else(|| "tool".to_string());
        let name = record
            .as_ref()
            .map(|p| p.name.clone())
            .or_else(|| item.description.clone())
            .unwrap_or_else(|| product_ref.to_string());

        let quantity = item.quantity.filter(|q| *q > 0).unwrap_or(1);
        products.push(OrderProduct {
            product_id: product_ref.to_string(),
            name,
            quantity,
            unit_price_cents: item.amount_total / quantity,
            line_total_cents: item.amount_total,
            product_type: product_type.clone(),
            creator_id: record.as_ref().and_then(|p| p.creator_id.clone()),
            commission_rate: rates.rate_for(&product_type),
        });
        line_totals.push(item.amount_total);
    }

    let (subtotal_cents, gst_cents, total_cents) = order_totals(&line_totals);
    let now = Utc::now().timestamp();

    let order = Order {
        invoice_number: session.id.clone(),
        user_id: Some(user.uid.clone()),
        user_email: session.customer_email.clone(),
        products,
        subtotal_cents,
        gst_cents,
        total_cents,
        stripe_transaction_id: session.payment_intent.clone(),
        referred_by: session.metadata.get("referrer_uid").cloned(),
        referral_event: session.metadata.get("ref_event").cloned(),
        status: OrderStatus::Pending,
        shipping_name: None,
        shipping_address: None,
        purchased_at: Some(now),
        created_at: now,
        updated_at: now,
    };

    // Both denormalized copies, written as two separate statements. A
    // failure between the two leaves them inconsistent; there is no
    // compensating action.
    queries::put_user_order(&conn, &user.uid, &order)?;
    queries::put_global_order(&conn, &order)?;
    drop(conn);

    let to = order.user_email.clone().unwrap_or_default();
    let display_name = session
        .customer_details
        .as_ref()
        .and_then(|d| d.name.clone())
        .unwrap_or_else(|| "Customer".to_string());

    // The order above stays committed even if the receipt email fails;
    // a failed notification is resolved by manual resend.
    send_order_receipt(state, &to, &order.invoice_number, &display_name).await?;

    Ok(())
}

//! Server-to-server endpoints, authenticated by the shared internal key.

use axum::{extract::State, http::HeaderMap, routing::post, Router};
use serde::{Deserialize, Serialize};

use crate::auth::require_internal_key;
use crate::db::{queries, AppState};
use crate::email::OrderReceiptEmail;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::Json;
use crate::receipts::render_receipt_pdf;

pub fn router() -> Router<AppState> {
    Router::new().route("/internal/receipts", post(generate_receipt_and_notify))
}

#[derive(Debug, Deserialize)]
pub struct SendReceiptRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub invoice_id: String,
    #[serde(default)]
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendReceiptResponse {
    pub success: bool,
    pub message: String,
    pub url: String,
}

/// Render the receipt for an order, store it, and email the buyer a
/// signed download link.
pub async fn generate_receipt_and_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendReceiptRequest>,
) -> Result<Json<SendReceiptResponse>> {
    require_internal_key(&state, &headers)?;

    let user_name = request.user_name.as_deref().unwrap_or("Customer");
    match send_order_receipt(&state, &request.to, &request.invoice_id, user_name).await {
        Ok(url) => Ok(Json(SendReceiptResponse {
            success: true,
            message: "Email sent with receipt.".to_string(),
            url,
        })),
        Err(err) if err.is_validation() => Err(err),
        Err(err) => {
            tracing::error!(
                "Receipt notification failed for invoice {}: {}",
                request.invoice_id,
                err
            );
            Err(AppError::Internal(msg::RECEIPT_FAILED.into()))
        }
    }
}

/// Shared notifier flow, also invoked directly by the purchase
/// confirmation handler. The order must already exist; nothing is
/// stored or sent when it does not.
pub async fn send_order_receipt(
    state: &AppState,
    to: &str,
    invoice_id: &str,
    user_name: &str,
) -> Result<String> {
    if to.is_empty() || invoice_id.is_empty() {
        return Err(AppError::InvalidArgument(msg::EMAIL_OR_INVOICE_MISSING.into()));
    }

    let order = {
        let conn = state.db.get()?;
        queries::get_order(&conn, invoice_id)?.or_not_found(msg::ORDER_NOT_FOUND)?
    };

    let pdf = render_receipt_pdf(&order);
    state.receipts.put(invoice_id, &pdf)?;
    let url = state.receipts.signed_url(invoice_id)?;

    state
        .email
        .send_order_receipt(OrderReceiptEmail {
            to,
            invoice_id,
            user_name,
            receipt_url: &url,
        })
        .await?;

    Ok(url)
}

use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};

use crate::auth::AuthedUser;
use crate::db::{queries, AppState};
use crate::error::{msg, AppError, Result};
use crate::extractors::Json;
use crate::models::{product_summary, transfer_instruction, CartLine, CustomerInfo};
use crate::payments::{CheckoutSessionParams, FLAT_SHIPPING_CENTS};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    /// Client cart; only ids and quantities are used. Prices are always
    /// re-resolved from the catalog.
    pub cart: Vec<CartLine>,
    #[serde(default)]
    pub referrer_id: Option<String>,
    #[serde(default)]
    pub collect_shipping: bool,
    #[serde(default)]
    pub customer_info: CustomerInfo,
    /// Anti-automation proof token.
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: String,
}

pub async fn create_checkout_session(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionResponse>> {
    if request.cart.is_empty() {
        return Err(AppError::InvalidArgument(msg::CART_EMPTY.into()));
    }

    state.recaptcha.verify_checkout(&request.token).await?;

    match build_and_create(&state, &user, &request).await {
        Ok(id) => Ok(Json(CreateSessionResponse { id })),
        Err(err) if err.is_validation() => Err(err),
        Err(err) => {
            // Provider and database failures are recorded with the caller
            // context, then resurfaced without the raw error text.
            tracing::error!("Stripe session error for {}: {}", user.uid, err);
            if let Ok(conn) = state.db.get() {
                let metadata = serde_json::json!({ "cart_length": request.cart.len() });
                if let Err(log_err) = queries::log_error(
                    &conn,
                    "create_checkout_session",
                    &err.to_string(),
                    Some(&user.uid),
                    Some(&metadata),
                ) {
                    tracing::warn!("Failed to write error log: {}", log_err);
                }
            }
            Err(AppError::Internal(msg::CHECKOUT_FAILED.into()))
        }
    }
}

async fn build_and_create(
    state: &AppState,
    user: &AuthedUser,
    request: &CreateSessionRequest,
) -> Result<String> {
    let conn = state.db.get()?;

    let items = queries::resolve_cart_items(&conn, &request.cart)?;
    let rates = queries::get_commission_rates(&conn)?;
    let transfer = transfer_instruction(&items, &rates);

    let mut metadata: Vec<(String, String)> = vec![
        ("buyer_uid".into(), user.uid.clone()),
        ("shipping_cost".into(), FLAT_SHIPPING_CENTS.to_string()),
    ];
    if let Some(referrer) = &request.referrer_id {
        metadata.push(("referrer_uid".into(), referrer.clone()));
    }
    if let Some(name) = &request.customer_info.name {
        metadata.push(("customer_name".into(), name.clone()));
    }
    if let Some(email) = &request.customer_info.email {
        metadata.push(("customer_email".into(), email.clone()));
    }
    if let Some(phone) = &request.customer_info.phone {
        metadata.push(("customer_phone".into(), phone.clone()));
    }
    metadata.push(("products".into(), product_summary(&items)));

    // Save the submitted contact details for future checkouts. Best
    // effort: a failed merge never blocks the purchase.
    if let Err(e) = queries::upsert_checkout_profile(&conn, &user.uid, &request.customer_info) {
        tracing::warn!("Failed to save checkout profile for {}: {}", user.uid, e);
    }

    let params = CheckoutSessionParams {
        line_items: &items,
        metadata: &metadata,
        transfer: transfer.as_ref(),
        collect_shipping: request.collect_shipping,
        success_url: &state.success_url,
        cancel_url: &state.cancel_url,
    };

    state.stripe.create_checkout_session(&params).await
}

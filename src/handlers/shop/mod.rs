mod checkout;
mod confirm;
mod orders;
mod receipts;

pub use checkout::*;
pub use confirm::*;
pub use orders::*;
pub use receipts::*;

use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::auth::buyer_auth;
use crate::db::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router<AppState> {
    let authed = Router::new()
        .route("/checkout/session", post(create_checkout_session))
        .route("/checkout/confirm", post(confirm_purchase))
        .route("/orders", get(list_orders))
        .route_layer(middleware::from_fn_with_state(state, buyer_auth));

    Router::new()
        .route("/health", get(health))
        .route("/receipts/{file}", get(download_receipt))
        .merge(authed)
}

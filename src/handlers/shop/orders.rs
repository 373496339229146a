use axum::{extract::State, Extension};

use crate::auth::AuthedUser;
use crate::db::{queries, AppState};
use crate::error::Result;
use crate::extractors::Json;
use crate::models::Order;

/// The buyer's order history, newest first, read from the personal
/// order collection.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<Vec<Order>>> {
    let conn = state.db.get()?;
    let orders = queries::list_user_orders(&conn, &user.uid)?;
    Ok(Json(orders))
}

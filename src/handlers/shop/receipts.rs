use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::{msg, AppError, OptionExt, Result};
use crate::extractors::{Path, Query};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub expires: i64,
    pub sig: String,
}

/// Serve a stored receipt PDF for a valid, unexpired signed URL.
pub async fn download_receipt(
    State(state): State<AppState>,
    Path(file): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let invoice_id = file.strip_suffix(".pdf").unwrap_or(&file);

    if !state.receipts.verify(invoice_id, query.expires, &query.sig) {
        return Err(AppError::PermissionDenied(msg::RECEIPT_LINK_INVALID.into()));
    }

    let bytes = state
        .receipts
        .read(invoice_id)?
        .or_not_found(msg::ORDER_NOT_FOUND)?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}.pdf\"", invoice_id),
            ),
        ],
        bytes,
    )
        .into_response())
}

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::errors::AppError;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /calendar/:booking_id
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    // Strip .ics suffix if present
    let booking_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id).to_string();

    let lookup_id = booking_id.clone();
    let booking = state
        .with_db(move |_, conn| Ok(queries::get_booking_by_id(conn, &lookup_id)?))
        .await?
        .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    let ics = generate_ics(&booking, &state.config.business_name);
    let disposition = format!("attachment; filename=\"booking-{booking_id}.ics\"");

    Ok((
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        ics,
    )
        .into_response())
}

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Booking, BookingStatus, ScheduleConfig};
use crate::services::schedule;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct BookingsQuery {
    pub status: Option<String>,
    pub date: Option<NaiveDate>,
    pub limit: Option<i64>,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BookingsQuery>,
) -> Result<Json<Vec<Booking>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(
            BookingStatus::parse(raw)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status: {raw}")))?,
        ),
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 500);

    let date = query.date;
    let bookings = state
        .with_db(move |_, conn| Ok(queries::list_bookings(conn, status, date, limit)?))
        .await?;

    Ok(Json(bookings))
}

// POST /api/admin/bookings/:id/status
#[derive(Deserialize)]
pub struct StatusBody {
    pub status: BookingStatus,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> Result<Response, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let outcome = state
        .with_db(move |state, conn| {
            Ok(state.ledger.set_booking_status(conn, &id, body.status, state.now())?)
        })
        .await?;

    let response = match outcome {
        Ok(booking) => Json(booking).into_response(),
        Err(rejection) => rejection.into_response(),
    };
    Ok(response)
}

// GET /api/admin/schedule
pub async fn get_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ScheduleConfig>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let schedule = state
        .with_db(|state, conn| Ok(state.schedule(conn)?))
        .await?;
    Ok(Json(schedule))
}

// POST /api/admin/schedule
pub async fn update_schedule(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ScheduleConfig>,
) -> Result<Json<ScheduleConfig>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    body.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let saved = state
        .with_db(move |_, conn| {
            schedule::save_schedule(conn, &body)?;
            Ok(body)
        })
        .await?;
    Ok(Json(saved))
}

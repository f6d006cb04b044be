use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::time::hhmm;
use crate::models::Interval;
use crate::services::ledger::HoldRequest;
use crate::state::AppState;

fn check_owner(owner_token: &str) -> Result<(), AppError> {
    if owner_token.trim().is_empty() {
        return Err(AppError::BadRequest("owner_token is required".to_string()));
    }
    Ok(())
}

// POST /api/holds
#[derive(Deserialize)]
pub struct HoldBody {
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub owner_token: String,
    pub lease_minutes: Option<i64>,
}

pub async fn create_hold(
    State(state): State<Arc<AppState>>,
    Json(body): Json<HoldBody>,
) -> Result<Response, AppError> {
    check_owner(&body.owner_token)?;
    let interval = Interval::new(body.start_time, body.end_time);
    let lease = Duration::minutes(state.config.lease_minutes(body.lease_minutes));

    let outcome = state
        .with_db(move |state, conn| {
            let schedule = state.schedule(conn)?;
            state
                .evaluator(&schedule)
                .validate_offer(body.date, &interval)
                .map_err(AppError::Unprocessable)?;

            let req = HoldRequest {
                date: body.date,
                interval,
                owner_token: &body.owner_token,
                lease,
            };
            Ok(state.ledger.try_hold(conn, &req, state.now())?)
        })
        .await?;

    let response = match outcome {
        Ok(hold) => (StatusCode::CREATED, Json(hold)).into_response(),
        Err(rejection) => rejection.into_response(),
    };
    Ok(response)
}

#[derive(Deserialize)]
pub struct OwnerBody {
    pub owner_token: String,
    pub lease_minutes: Option<i64>,
}

// POST /api/holds/:id/extend
pub async fn extend_hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OwnerBody>,
) -> Result<Response, AppError> {
    check_owner(&body.owner_token)?;
    let lease = Duration::minutes(state.config.lease_minutes(body.lease_minutes));

    let outcome = state
        .with_db(move |state, conn| {
            Ok(state
                .ledger
                .extend_hold(conn, &id, &body.owner_token, lease, state.now())?)
        })
        .await?;

    let response = match outcome {
        Ok(hold) => Json(hold).into_response(),
        Err(rejection) => rejection.into_response(),
    };
    Ok(response)
}

// POST /api/holds/:id/release
pub async fn release_hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OwnerBody>,
) -> Result<Response, AppError> {
    check_owner(&body.owner_token)?;

    let outcome = state
        .with_db(move |state, conn| Ok(state.ledger.release_hold(conn, &id, &body.owner_token)?))
        .await?;

    let response = match outcome {
        Ok(()) => Json(serde_json::json!({"ok": true})).into_response(),
        Err(rejection) => rejection.into_response(),
    };
    Ok(response)
}

// POST /api/holds/:id/confirm
pub async fn confirm_hold(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<OwnerBody>,
) -> Result<Response, AppError> {
    check_owner(&body.owner_token)?;

    let outcome = state
        .with_db(move |state, conn| {
            Ok(state.ledger.confirm(conn, &id, &body.owner_token, state.now())?)
        })
        .await?;

    let response = match outcome {
        Ok(booking) => (StatusCode::CREATED, Json(booking)).into_response(),
        Err(rejection) => rejection.into_response(),
    };
    Ok(response)
}

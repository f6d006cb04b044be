use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::SlotAvailability;
use crate::services::availability::MAX_DURATION_MINUTES;
use crate::state::AppState;

fn check_duration(duration: u32) -> Result<(), AppError> {
    if duration == 0 || duration > MAX_DURATION_MINUTES {
        return Err(AppError::BadRequest(format!(
            "duration must be between 1 and {MAX_DURATION_MINUTES} minutes"
        )));
    }
    Ok(())
}

// GET /api/availability?date=2024-06-01&duration=240
#[derive(Deserialize)]
pub struct DayQuery {
    pub date: NaiveDate,
    pub duration: u32,
}

pub async fn get_day(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DayQuery>,
) -> Result<Json<Vec<SlotAvailability>>, AppError> {
    check_duration(query.duration)?;

    let slots = state
        .with_db(move |state, conn| {
            let schedule = state.schedule(conn)?;
            Ok(state
                .evaluator(&schedule)
                .slots_for(conn, query.date, query.duration)?)
        })
        .await?;

    Ok(Json(slots))
}

// GET /api/availability/month?year=2024&month=6&duration=240
#[derive(Deserialize)]
pub struct MonthQuery {
    pub year: i32,
    pub month: u32,
    pub duration: u32,
}

pub async fn get_month(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<BTreeMap<NaiveDate, bool>>, AppError> {
    check_duration(query.duration)?;
    if !(1..=12).contains(&query.month) || !(1970..=9999).contains(&query.year) {
        return Err(AppError::BadRequest(format!(
            "invalid month: {}-{}",
            query.year, query.month
        )));
    }

    let days = state
        .with_db(move |state, conn| {
            let schedule = state.schedule(conn)?;
            Ok(state
                .evaluator(&schedule)
                .month_availability(conn, query.year, query.month, query.duration)?)
        })
        .await?;

    Ok(Json(days))
}

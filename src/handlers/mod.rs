pub mod admin;
pub mod availability;
pub mod calendar;
pub mod health;
pub mod holds;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/availability", get(availability::get_day))
        .route("/api/availability/month", get(availability::get_month))
        .route("/api/holds", post(holds::create_hold))
        .route("/api/holds/:id/extend", post(holds::extend_hold))
        .route("/api/holds/:id/release", post(holds::release_hold))
        .route("/api/holds/:id/confirm", post(holds::confirm_hold))
        .route("/api/admin/bookings", get(admin::get_bookings))
        .route(
            "/api/admin/bookings/:id/status",
            post(admin::update_booking_status),
        )
        .route(
            "/api/admin/schedule",
            get(admin::get_schedule).post(admin::update_schedule),
        )
        .route("/calendar/:booking_id", get(calendar::download_ics))
        .with_state(state)
}

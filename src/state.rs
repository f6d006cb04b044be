use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use crate::config::AppConfig;
use crate::db::Db;
use crate::errors::AppError;
use crate::models::ScheduleConfig;
use crate::services::availability::Evaluator;
use crate::services::clock::Clock;
use crate::services::ledger::Ledger;
use crate::services::schedule;

pub struct AppState {
    pub db: Db,
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub ledger: Ledger,
}

impl AppState {
    pub fn new(db: Db, config: AppConfig, clock: Arc<dyn Clock>) -> Self {
        let ledger = Ledger::new(Duration::minutes(config.expired_hold_retention_minutes));
        Self {
            db,
            config,
            clock,
            ledger,
        }
    }

    /// Runs database work on tokio's blocking pool, off the async workers.
    pub async fn with_db<T, F>(self: &Arc<Self>, f: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&AppState, &mut Connection) -> Result<T, AppError> + Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || state.db.run(|conn| f(&state, conn)))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("database task failed: {e}")))?
    }

    /// Current UTC time from the configured clock.
    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn schedule(&self, conn: &Connection) -> anyhow::Result<ScheduleConfig> {
        schedule::load_schedule(conn, self.config.slot_granularity_minutes)
    }

    pub fn evaluator<'a>(&'a self, schedule: &'a ScheduleConfig) -> Evaluator<'a> {
        Evaluator::new(
            schedule,
            &self.ledger,
            self.now(),
            Duration::minutes(self.config.business_utc_offset_minutes),
        )
    }
}

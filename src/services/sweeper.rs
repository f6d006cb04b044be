use std::sync::Arc;
use std::time::Duration;

use crate::state::AppState;

/// Background task that periodically deletes expired holds.
///
/// Reads already treat expired holds as absent, so this only keeps the table small.
pub async fn run_sweeper(state: Arc<AppState>) {
    let period = Duration::from_secs(state.config.sweep_interval_secs.max(1));
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let task_state = Arc::clone(&state);
        match tokio::task::spawn_blocking(move || sweep_once(&task_state)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "hold sweep failed"),
            Err(e) => tracing::error!(error = %e, "hold sweep task panicked"),
        }
    }
}

/// Blocking; run it off the async workers.
pub fn sweep_once(state: &AppState) -> anyhow::Result<usize> {
    let now = state.now();
    state.db.run(|conn| state.ledger.sweep(conn, now))
}

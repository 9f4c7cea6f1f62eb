//! Background maintenance tasks.
//!
//! - Reservation expiry: cancels `pending_payment` orders past
//!   `reserved_until` and releases their stock.
//! - Guest cart purge: deletes guest carts idle for longer than a session.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::db::CartRepository;
use crate::services::orders::OrderService;
use crate::state::AppState;

/// How often the maintenance tasks run.
pub const JOB_INTERVAL: Duration = Duration::from_secs(60);

/// Guest carts idle this long are removed. Matches the session expiry.
const GUEST_CART_TTL_DAYS: i64 = 7;

/// Spawn the maintenance loop.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            interval_secs = JOB_INTERVAL.as_secs(),
            "Starting maintenance jobs"
        );

        let mut interval = tokio::time::interval(JOB_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            run_once(&state).await;
        }
    })
}

/// Run every maintenance task once. Failures are logged and retried on the
/// next tick.
pub async fn run_once(state: &AppState) {
    let now = Utc::now();

    match OrderService::new(state.pool()).expire_reservations(now).await {
        Ok(0) => {}
        Ok(count) => info!(count, "Expired stock reservations"),
        Err(e) => error!(error = %e, "Reservation expiry failed"),
    }

    let cutoff = now - chrono::Duration::days(GUEST_CART_TTL_DAYS);
    match CartRepository::new(state.pool())
        .purge_guest_carts(cutoff)
        .await
    {
        Ok(0) => {}
        Ok(count) => info!(count, "Purged idle guest carts"),
        Err(e) => error!(error = %e, "Guest cart purge failed"),
    }
}

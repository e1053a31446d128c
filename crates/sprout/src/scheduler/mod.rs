//! Background loops that drive the account.
//!
//! Every orchestrator owns a [`CycleGuard`] so a timer tick and a push
//! notification can never run the same cycle twice at once, and every loop
//! observes a shared [`CancellationToken`] between cycles and while it
//! sleeps.

mod farm;
mod friend;
mod guard;
mod heartbeat;
mod task;
mod warehouse;

pub use farm::{FarmCycleReport, FarmOrchestrator};
pub use friend::{FriendOrchestrator, PatrolReport, VisitReport};
pub use guard::{CycleGuard, CycleTicket};
pub use heartbeat::{HeartbeatWatchdog, MissTracker};
pub use task::{claimable_tasks, TaskOrchestrator};
pub use warehouse::{fruits_to_sell, WarehouseOrchestrator};

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless `shutdown` fires first.
///
/// Returns `false` when cancelled.
pub(crate) async fn pause(shutdown: &CancellationToken, duration: Duration) -> bool {
    if duration.is_zero() {
        return !shutdown.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

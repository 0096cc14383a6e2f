//! Daily wall-clock scheduler for periodic jobs.
//!
//! A single long-running task sleeps until the next daily fire time, enqueues
//! a retention cleanup, and loops. Double-fires are harmless: the queue's
//! uniqueness window collapses them.

use crate::queue::JobQueue;
use crate::workers::RetentionCleanupArgs;
use chrono::{Duration as ChronoDuration, Local, NaiveTime};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Start the daily retention scheduler. Fires at `hour`:00 local time.
/// Returns the task handle; abort it on shutdown.
pub fn start_retention_scheduler(
    queue: JobQueue,
    hour: u32,
    retention_days: i32,
    batch_size: i32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let wait = duration_until_next(hour);
            tracing::info!(
                wait_secs = wait.as_secs(),
                fire_hour = hour,
                "Scheduled next retention cleanup"
            );
            tokio::time::sleep(wait).await;

            if let Err(err) = queue
                .enqueue_retention_cleanup(RetentionCleanupArgs {
                    retention_days,
                    batch_size,
                })
                .await
            {
                tracing::error!(error = %err, "Failed to schedule retention cleanup");
            }
        }
    })
}

/// Time from now until the next local `hour`:00.
fn duration_until_next(hour: u32) -> Duration {
    let now = Local::now().naive_local();
    let fire_time = NaiveTime::from_hms_opt(hour % 24, 0, 0).unwrap_or(NaiveTime::MIN);
    let mut next = now.date().and_time(fire_time);
    if next <= now {
        next += ChronoDuration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_fire_is_within_a_day() {
        for hour in [0, 3, 12, 23] {
            let wait = duration_until_next(hour);
            assert!(wait <= Duration::from_secs(24 * 3600), "hour {}", hour);
            assert!(wait > Duration::ZERO);
        }
    }
}

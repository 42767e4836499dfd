//! Scheduler loop: runs a birthday pass on every tick inside the workday
//! window. Uses tokio::interval, so the first tick fires immediately.

use bdbot_core::config::BdBotConfig;
use bdbot_core::error::Result;
use bdbot_core::traits::ChatPlatform;
use chrono::{DateTime, Timelike};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::pipeline::BirthdayPipeline;

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub check_interval: Duration,
    pub workday_start: u32,
    pub workday_end: u32,
}

impl SchedulerSettings {
    pub fn from_config(config: &BdBotConfig) -> Self {
        Self {
            check_interval: Duration::from_secs(config.check_interval_secs),
            workday_start: config.workday_start,
            workday_end: config.workday_end,
        }
    }

    /// Inclusive on both ends.
    pub fn in_window(&self, hour: u32) -> bool {
        hour >= self.workday_start && hour <= self.workday_end
    }
}

/// Run passes until `cancel` fires. A failed pass stops the loop and is
/// returned. A pass in progress always runs to completion.
pub async fn run_scheduler<P, C>(
    pipeline: Arc<BirthdayPipeline<P>>,
    settings: SchedulerSettings,
    clock: C,
    cancel: CancellationToken,
) -> Result<()>
where
    P: ChatPlatform + ?Sized + 'static,
    C: Fn() -> DateTime<Tz> + Send,
{
    tracing::info!(
        "⏰ Scheduler started (check every {}s, window {}..={})",
        settings.check_interval.as_secs(),
        settings.workday_start,
        settings.workday_end
    );

    let mut interval = tokio::time::interval(settings.check_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Stopping birthday watcher");
                return Ok(());
            }
            _ = interval.tick() => {}
        }

        let now = clock();
        tracing::info!("Starting birthday check at {}", now.to_rfc2822());
        if !settings.in_window(now.hour()) {
            tracing::info!(hour = now.hour(), "Outside workday window, skipping");
            continue;
        }

        pipeline.run_pass(now).await?;
    }
}

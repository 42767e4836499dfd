//! # bdbot Scheduler
//!
//! Birthday detection and notification.
//!
//! ```text
//! run_scheduler (tokio interval, workday window)
//!   └── BirthdayPipeline::run_pass
//!         ├── enrich: one task per roster member
//!         ├── BirthdayCache: SQLite dedup per tier
//!         ├── Manager tier → DM to the manager
//!         └── Channel tier → announce_to_channels
//! ```

pub mod cache;
pub mod engine;
pub mod enrich;
pub mod pipeline;
pub mod provision;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::BirthdayCache;
pub use engine::{SchedulerSettings, run_scheduler};
pub use enrich::enrich;
pub use pipeline::{BirthdayPipeline, PassReport, PipelineSettings, filter_blacklist, resolve_manager_dm};
pub use provision::{channel_name, invite_list};

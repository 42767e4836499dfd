//! Notification pipeline: one pass over the team roster.
//!
//! ```text
//! list_members(main) → blacklist → enrich → days_until_birthday → Tier
//!   ├── Manager: dedup → DM to manager → cache
//!   └── Channel: dedup → batch → announce_to_channels (provision.rs)
//! ```

use bdbot_core::birthday::days_until_birthday;
use bdbot_core::config::{BdBotConfig, MessagesConfig, render_template};
use bdbot_core::error::{BdBotError, Result};
use bdbot_core::traits::{ChatPlatform, MessageSender};
use bdbot_core::types::{BirthdayRecord, MemberProfile, Tier};
use chrono::{DateTime, Datelike};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::BirthdayCache;
use crate::enrich::enrich;

/// Settings the pipeline reads on every pass.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub main_channel_id: String,
    pub manager_id: String,
    pub bd_threshold_high: i64,
    pub bd_threshold_low: i64,
    pub blacklist: Vec<String>,
    pub messages: MessagesConfig,
}

impl PipelineSettings {
    pub fn from_config(config: &BdBotConfig) -> Self {
        Self {
            main_channel_id: config.slack.main_channel_id.clone(),
            manager_id: config.slack.manager_id.clone(),
            bd_threshold_high: config.slack.bd_threshold_high,
            bd_threshold_low: config.slack.bd_threshold_low,
            blacklist: config.slack.blacklist.clone(),
            messages: config.messages.clone(),
        }
    }
}

/// Summary of a finished pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub roster: usize,
    pub enriched: usize,
    pub invalid_birthdays: usize,
    pub already_notified: usize,
    pub manager_sent: usize,
    pub channels_announced: usize,
}

/// Members of `members` not listed in `blacklist`, order kept.
pub fn filter_blacklist(members: &[String], blacklist: &[String]) -> Vec<String> {
    members
        .iter()
        .filter(|m| !blacklist.contains(m))
        .cloned()
        .collect()
}

/// Find the manager's DM channel.
pub async fn resolve_manager_dm<P>(platform: &P, manager_id: &str) -> Result<String>
where
    P: MessageSender + ?Sized,
{
    platform.find_dm_channel(manager_id).await.map_err(|e| {
        tracing::error!(manager = manager_id, "Unable to find manager's DM: {e}");
        match e {
            BdBotError::DmNotFound(_) => e,
            other => BdBotError::DmNotFound(format!("{manager_id} ({other})")),
        }
    })
}

pub struct BirthdayPipeline<P: ?Sized> {
    pub(crate) platform: Arc<P>,
    pub(crate) cache: Arc<BirthdayCache>,
    pub(crate) settings: PipelineSettings,
    manager_dm: String,
}

impl<P> BirthdayPipeline<P>
where
    P: ChatPlatform + ?Sized + 'static,
{
    /// Build a pipeline, resolving the manager's DM channel up front.
    pub async fn new(
        platform: Arc<P>,
        cache: Arc<BirthdayCache>,
        settings: PipelineSettings,
    ) -> Result<Self> {
        let manager_dm = resolve_manager_dm(platform.as_ref(), &settings.manager_id).await?;
        tracing::info!(manager_dm = %manager_dm, "📬 Manager DM resolved");
        Ok(Self::with_manager_dm(platform, cache, settings, manager_dm))
    }

    pub fn with_manager_dm(
        platform: Arc<P>,
        cache: Arc<BirthdayCache>,
        settings: PipelineSettings,
        manager_dm: String,
    ) -> Self {
        Self {
            platform,
            cache,
            settings,
            manager_dm,
        }
    }

    /// Run one pass at `now`. Errors are fatal to the pass: an empty roster
    /// or a failed channel batch.
    pub async fn run_pass(&self, now: DateTime<Tz>) -> Result<PassReport> {
        let mut report = PassReport::default();
        let main = &self.settings.main_channel_id;

        let members = self.platform.list_members(main).await?;
        if members.is_empty() {
            return Err(BdBotError::EmptyRoster(main.clone()));
        }
        report.roster = members.len();

        let members = filter_blacklist(&members, &self.settings.blacklist);
        tracing::debug!(
            before = report.roster,
            after = members.len(),
            "applied blacklist"
        );

        let profiles = enrich(self.platform.clone(), &members).await;
        report.enriched = profiles.len();
        tracing::info!("👥 Main channel contains {} valid members", profiles.len());

        let mut manager_batch: BTreeMap<String, BirthdayRecord> = BTreeMap::new();
        let mut channel_batch: BTreeMap<String, BirthdayRecord> = BTreeMap::new();
        for profile in &profiles {
            let Some((tier, record)) = self.classify(&now, profile, &mut report) else {
                continue;
            };
            let bucket = self.cache.bucket_for(tier);
            match self.cache.check_cached(bucket, &profile.id, &record.token) {
                Ok(true) => {
                    tracing::info!(user = %profile.id, bucket, "already notified, skipping");
                    report.already_notified += 1;
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(user = %profile.id, bucket, "Unable to check cache: {e}");
                    continue;
                }
            }
            match tier {
                Tier::Manager => manager_batch.insert(profile.id.clone(), record),
                Tier::Channel => channel_batch.insert(profile.id.clone(), record),
            };
        }

        for (id, record) in &manager_batch {
            if self.notify_manager(id, record).await {
                report.manager_sent += 1;
            }
        }

        if !channel_batch.is_empty() {
            report.channels_announced = self
                .announce_to_channels(&channel_batch, now.year())
                .await
                .inspect_err(|e| tracing::error!("Unable to send birthdays to channels: {e}"))?;
        }

        tracing::info!(
            roster = report.roster,
            enriched = report.enriched,
            manager_sent = report.manager_sent,
            channels = report.channels_announced,
            "✅ Finished birthday check"
        );
        Ok(report)
    }

    fn classify(
        &self,
        now: &DateTime<Tz>,
        profile: &MemberProfile,
        report: &mut PassReport,
    ) -> Option<(Tier, BirthdayRecord)> {
        let days = match days_until_birthday(now, &profile.birthday) {
            Ok(days) => days,
            Err(e) => {
                tracing::debug!(user = %profile.id, "skipping member: {e}");
                report.invalid_birthdays += 1;
                return None;
            }
        };
        let tier = Tier::classify(
            days,
            self.settings.bd_threshold_high,
            self.settings.bd_threshold_low,
        )?;
        Some((tier, BirthdayRecord::new(profile, now.year(), days)))
    }

    /// DM the manager about one member and record it. Failures are logged.
    async fn notify_manager(&self, id: &str, record: &BirthdayRecord) -> bool {
        tracing::info!(user = id, days = record.days_left, "Informing manager");
        let days = record.days_left.to_string();
        let text = render_template(
            &self.settings.messages.manager_announce,
            &[("user", id), ("days", days.as_str())],
        );
        if let Err(e) = self.platform.send_message(&self.manager_dm, &text).await {
            tracing::error!(user = id, "Unable to send message to manager: {e}");
            return false;
        }

        let bucket = self.cache.bucket_for(Tier::Manager);
        match self.cache.save(bucket, id, &record.token) {
            Ok(()) => tracing::info!(user = id, "Saved birthday in manager cache"),
            Err(e) => tracing::error!(user = id, "Unable to save birthday in manager cache: {e}"),
        }
        true
    }
}

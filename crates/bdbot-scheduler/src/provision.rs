//! Channel provisioning and invitation for same-day birthdays.

use bdbot_core::config::render_template;
use bdbot_core::error::{BdBotError, Result};
use bdbot_core::traits::ChatPlatform;
use bdbot_core::types::{BirthdayRecord, Tier};
use std::collections::BTreeMap;

use crate::pipeline::BirthdayPipeline;

/// `<surname>-bd-<year>`. The surname is lower-cased, whitespace becomes `-`
/// and other punctuation is dropped. An empty result falls back to `user_id`.
pub fn channel_name(surname: &str, user_id: &str, year: i32) -> String {
    let slug = match slugify(surname) {
        s if s.is_empty() => slugify(user_id),
        s => s,
    };
    format!("{slug}-bd-{year}")
}

fn slugify(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars().flat_map(char::to_lowercase) {
        if c.is_whitespace() || c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Main channel members to invite: blacklisted members are dropped unless
/// they are the manager, and the honoree is never invited.
pub fn invite_list(
    members: &[String],
    blacklist: &[String],
    manager_id: &str,
    honoree: &str,
) -> Vec<String> {
    members
        .iter()
        .filter(|m| m.as_str() != honoree)
        .filter(|m| m.as_str() == manager_id || !blacklist.contains(m))
        .cloned()
        .collect()
}

impl<P> BirthdayPipeline<P>
where
    P: ChatPlatform + ?Sized + 'static,
{
    /// Create (or find) a channel per honoree, invite the team and post the
    /// announcement. Any failure aborts the rest of the batch. Returns the
    /// number of channels announced to.
    pub async fn announce_to_channels(
        &self,
        batch: &BTreeMap<String, BirthdayRecord>,
        year: i32,
    ) -> Result<usize> {
        let mut announced = 0;
        for (id, record) in batch {
            let name = channel_name(&record.surname, id, year);
            let channel_id = self.provision_channel(&name).await?;

            let members = self
                .platform
                .list_members(&self.settings.main_channel_id)
                .await?;
            let invitees = invite_list(
                &members,
                &self.settings.blacklist,
                &self.settings.manager_id,
                id,
            );
            tracing::debug!(channel = %name, invitees = invitees.len(), "inviting members");
            self.invite(&channel_id, &invitees).await?;

            let date = record.display_date();
            let text = render_template(
                &self.settings.messages.channel_announce,
                &[
                    ("user", id.as_str()),
                    ("name", record.real_name.as_str()),
                    ("date", date.as_str()),
                    ("manager", self.settings.manager_id.as_str()),
                ],
            );
            self.platform.send_message(&channel_id, &text).await?;

            let bucket = self.cache.bucket_for(Tier::Channel);
            match self.cache.save(bucket, id, &record.token) {
                Ok(()) => tracing::info!(user = %id, "Saved birthday in channel cache"),
                Err(e) => {
                    tracing::error!(user = %id, "Unable to save birthday in channel cache: {e}")
                }
            }
            tracing::info!(user = %id, channel = %name, "🎂 Posted birthday message");
            announced += 1;
        }
        Ok(announced)
    }

    /// Create a private channel, or look up the existing one on a name clash.
    async fn provision_channel(&self, name: &str) -> Result<String> {
        match self.platform.create_channel(name, true).await {
            Ok(id) => {
                tracing::info!(channel = name, id = %id, "Created channel");
                Ok(id)
            }
            Err(BdBotError::NameTaken(_)) => {
                tracing::info!(channel = name, "Channel already exists, getting its ID");
                self.platform
                    .list_channels()
                    .await?
                    .into_iter()
                    .find(|c| c.name == name)
                    .map(|c| c.id)
                    .ok_or_else(|| BdBotError::ChannelNotFound(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn invite(&self, channel_id: &str, users: &[String]) -> Result<()> {
        let failures = self.platform.invite_members(channel_id, users).await?;
        let (ignored, real): (Vec<_>, Vec<_>) =
            failures.into_iter().partition(|f| f.reason.is_ignorable());
        for f in &ignored {
            tracing::debug!(channel = channel_id, "ignoring invite failure {f}");
        }
        if real.is_empty() {
            return Ok(());
        }
        Err(BdBotError::Invite {
            channel: channel_id.to_string(),
            failures: real.iter().map(ToString::to_string).collect(),
        })
    }
}

//! In-memory chat platform used by the pipeline tests.

use async_trait::async_trait;
use bdbot_core::config::MessagesConfig;
use bdbot_core::error::{BdBotError, Result};
use bdbot_core::traits::{ChannelManager, MessageSender, RosterSource};
use bdbot_core::types::{Conversation, InviteFailure, InviteFailureReason, MemberProfile};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::cache::BirthdayCache;
use crate::pipeline::PipelineSettings;

#[derive(Default)]
pub struct FakePlatform {
    pub members: Mutex<Vec<String>>,
    pub profiles: Mutex<HashMap<String, MemberProfile>>,
    pub channels: Mutex<Vec<Conversation>>,
    /// Names that report `name_taken` but never show up in the listing.
    pub phantom_names: Mutex<HashSet<String>>,
    /// user -> platform error code returned by invite.
    pub invite_errors: Mutex<HashMap<String, String>>,
    /// Channel IDs whose sends fail.
    pub failing_sends: Mutex<HashSet<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
    pub invited: Mutex<Vec<(String, Vec<String>)>>,
    pub created: Mutex<Vec<(String, bool)>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, id: &str, real_name: &str, surname: &str, birthday: &str) -> Self {
        self.members.lock().unwrap().push(id.to_string());
        self.profiles.lock().unwrap().insert(
            id.to_string(),
            MemberProfile {
                id: id.to_string(),
                real_name: real_name.to_string(),
                surname: surname.to_string(),
                birthday: birthday.to_string(),
            },
        );
        self
    }

    /// Roster member whose profile lookup fails.
    pub fn with_broken_member(self, id: &str) -> Self {
        self.members.lock().unwrap().push(id.to_string());
        self
    }

    pub fn with_channel(self, id: &str, name: &str) -> Self {
        self.channels.lock().unwrap().push(Conversation {
            id: id.to_string(),
            name: name.to_string(),
        });
        self
    }

    pub fn set_birthday(&self, id: &str, birthday: &str) {
        if let Some(p) = self.profiles.lock().unwrap().get_mut(id) {
            p.birthday = birthday.to_string();
        }
    }

    pub fn sent_to(&self, channel: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, t)| t.clone())
            .collect()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl RosterSource for FakePlatform {
    async fn list_members(&self, _channel_id: &str) -> Result<Vec<String>> {
        Ok(self.members.lock().unwrap().clone())
    }

    async fn get_profile(&self, user_id: &str) -> Result<MemberProfile> {
        self.profiles
            .lock()
            .unwrap()
            .get(user_id)
            .cloned()
            .ok_or_else(|| BdBotError::api("users.profile.get", "user_not_found"))
    }
}

#[async_trait]
impl MessageSender for FakePlatform {
    async fn send_message(&self, channel_id: &str, text: &str) -> Result<()> {
        if self.failing_sends.lock().unwrap().contains(channel_id) {
            return Err(BdBotError::api("chat.postMessage", "channel_not_found"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((channel_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn find_dm_channel(&self, user_id: &str) -> Result<String> {
        Ok(format!("D{user_id}"))
    }
}

#[async_trait]
impl ChannelManager for FakePlatform {
    async fn create_channel(&self, name: &str, private: bool) -> Result<String> {
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), private));
        if self.phantom_names.lock().unwrap().contains(name) {
            return Err(BdBotError::NameTaken(name.to_string()));
        }
        let mut channels = self.channels.lock().unwrap();
        if channels.iter().any(|c| c.name == name) {
            return Err(BdBotError::NameTaken(name.to_string()));
        }
        let id = format!("C-{name}");
        channels.push(Conversation {
            id: id.clone(),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn list_channels(&self) -> Result<Vec<Conversation>> {
        Ok(self.channels.lock().unwrap().clone())
    }

    async fn invite_members(
        &self,
        channel_id: &str,
        users: &[String],
    ) -> Result<Vec<InviteFailure>> {
        self.invited
            .lock()
            .unwrap()
            .push((channel_id.to_string(), users.to_vec()));
        let errors = self.invite_errors.lock().unwrap();
        Ok(users
            .iter()
            .filter_map(|u| {
                errors.get(u).map(|code| InviteFailure {
                    user: u.clone(),
                    reason: InviteFailureReason::from_code(code),
                })
            })
            .collect())
    }
}

pub fn settings() -> PipelineSettings {
    PipelineSettings {
        main_channel_id: "CMAIN".into(),
        manager_id: "UMGR".into(),
        bd_threshold_high: 7,
        bd_threshold_low: 1,
        blacklist: vec!["UBOT".into(), "UMGR".into()],
        messages: MessagesConfig {
            manager_announce: "<@{user}> in {days} days".into(),
            channel_announce: "<@{user}> {name} {date} <@{manager}>".into(),
            ..MessagesConfig::default()
        },
    }
}

/// File-backed cache whose reads work but whose writes are aborted by a
/// trigger installed from a second connection.
pub fn cache_rejecting_writes(dir: &Path) -> Arc<BirthdayCache> {
    let path = dir.join("cache.db");
    let cache = BirthdayCache::open(&path, "manager", "channel").unwrap();
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_writes BEFORE INSERT ON birthday_cache
             BEGIN SELECT RAISE(ABORT, 'disk is read-only'); END;",
        )
        .unwrap();
    Arc::new(cache)
}

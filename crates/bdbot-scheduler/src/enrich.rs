//! Concurrent roster enrichment.

use bdbot_core::traits::RosterSource;
use bdbot_core::types::MemberProfile;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Fetch every member's profile concurrently, one task per ID.
/// Failed fetches are logged and dropped. Output order follows completion
/// order, not input order.
pub async fn enrich<R>(source: Arc<R>, member_ids: &[String]) -> Vec<MemberProfile>
where
    R: RosterSource + ?Sized + 'static,
{
    let mut set = JoinSet::new();
    for id in member_ids {
        let source = source.clone();
        let id = id.clone();
        set.spawn(async move {
            let result = source.get_profile(&id).await;
            (id, result)
        });
    }

    let mut profiles = Vec::with_capacity(member_ids.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((_, Ok(profile))) => {
                tracing::debug!(user = %profile.id, name = %profile.real_name, "profile fetched");
                profiles.push(profile);
            }
            Ok((id, Err(e))) => {
                tracing::error!(user = %id, "Unable to get user profile: {e}");
            }
            Err(e) => {
                tracing::error!("Profile fetch task failed: {e}");
            }
        }
    }
    profiles
}

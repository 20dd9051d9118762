use chrono::{DateTime, Utc};
use log::{error, info};
use serenity::all::{GuildId, UserId};

use crate::modules::freeloader::core::{BanManager, GuildAuthority};
use crate::modules::freeloader::engine::Freeloader;

/// One pass over every known guild, unbanning temp bans whose expiry has
/// passed. A failure in one guild is logged and does not stop the rest.
pub async fn sweep(
    freeloader: &Freeloader,
    ban_manager: &dyn BanManager,
    now: DateTime<Utc>,
) -> Result<(), crate::Error> {
    let guilds = freeloader.all_settings().await?;

    for (guild_id, settings) in guilds {
        let authority = ban_manager.authority(guild_id).await;

        // Bot removed from the guild; entries are kept for the day it
        // may be re-added.
        if authority == GuildAuthority::Unobservable {
            continue;
        }

        if settings.temp_bans.is_empty() {
            continue;
        }

        // Retried on a later sweep once ban authority is restored.
        if authority == GuildAuthority::MissingBanPermission {
            continue;
        }

        if let Err(e) = sweep_guild(freeloader, ban_manager, guild_id, now).await {
            error!("Temp ban sweep failed for guild {}: {}", guild_id, e);
        }
    }

    Ok(())
}

/// Processes one guild under its temp-ban lock. The updated map is
/// written back once, after every expired entry has been unbanned.
async fn sweep_guild(
    freeloader: &Freeloader,
    ban_manager: &dyn BanManager,
    guild_id: GuildId,
    now: DateTime<Utc>,
) -> Result<(), crate::Error> {
    let lock = freeloader.guild_lock(guild_id);
    let _guard = lock.lock().await;

    let mut settings = freeloader.fetch_settings(guild_id).await?;

    let expired: Vec<UserId> = settings
        .temp_bans
        .iter()
        .filter(|(_, &expiry)| now.timestamp() > expiry)
        .map(|(&user_id, _)| user_id)
        .collect();

    if expired.is_empty() {
        return Ok(());
    }

    for user_id in &expired {
        ban_manager.unban(guild_id, *user_id).await?;
        settings.temp_bans.remove(user_id);
    }

    freeloader.persist_settings(guild_id, &settings).await?;

    info!(
        "Lifted {} expired temp ban(s) in guild {}",
        expired.len(),
        guild_id
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::freeloader::core::GuildSettings;
    use crate::store::{GuildStore, MemoryGuildStore};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct SweepBanManager {
        unbans: Mutex<Vec<(GuildId, UserId)>>,
        failing: Mutex<HashSet<GuildId>>,
        authority: HashMap<GuildId, GuildAuthority>,
    }

    #[async_trait]
    impl BanManager for SweepBanManager {
        async fn authority(&self, guild_id: GuildId) -> GuildAuthority {
            self.authority
                .get(&guild_id)
                .copied()
                .unwrap_or(GuildAuthority::CanBan)
        }

        async fn ban(
            &self,
            _guild_id: GuildId,
            _user_id: UserId,
            _reason: &str,
        ) -> Result<(), crate::Error> {
            Ok(())
        }

        async fn unban(&self, guild_id: GuildId, user_id: UserId) -> Result<(), crate::Error> {
            if self.failing.lock().unwrap().contains(&guild_id) {
                return Err("unban failed".into());
            }

            self.unbans.lock().unwrap().push((guild_id, user_id));

            Ok(())
        }
    }

    fn gid(n: u64) -> GuildId {
        GuildId::new(n)
    }

    fn uid(n: u64) -> UserId {
        UserId::new(n)
    }

    async fn store_with_temp_ban(
        store: &MemoryGuildStore,
        guild_id: GuildId,
        user_id: UserId,
        expiry: i64,
    ) {
        let mut settings = store.get(guild_id).await.unwrap();
        settings.temp_bans.insert(user_id, expiry);
        store.set(guild_id, &settings).await.unwrap();
    }

    #[tokio::test]
    async fn expired_entries_are_unbanned_exactly_once_and_removed() {
        let store = Arc::new(MemoryGuildStore::default());
        let now = Utc::now();

        store_with_temp_ban(&store, gid(1), uid(2), now.timestamp() - 10).await;

        let f = Freeloader::new(store.clone()).await.unwrap();
        let manager = SweepBanManager::default();

        sweep(&f, &manager, now).await.unwrap();

        assert_eq!(
            manager.unbans.lock().unwrap().as_slice(),
            [(gid(1), uid(2))]
        );
        assert!(store.get(gid(1)).await.unwrap().temp_bans.is_empty());

        // A second sweep has nothing left to do
        sweep(&f, &manager, now).await.unwrap();
        assert_eq!(manager.unbans.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn one_day_temp_ban_round_trip() {
        let store = Arc::new(MemoryGuildStore::default());
        let now = Utc::now();

        store_with_temp_ban(&store, gid(1), uid(2), now.timestamp() + 86400).await;

        let f = Freeloader::new(store.clone()).await.unwrap();
        let manager = SweepBanManager::default();

        // Not yet expired
        sweep(&f, &manager, now).await.unwrap();
        assert!(manager.unbans.lock().unwrap().is_empty());
        assert_eq!(store.get(gid(1)).await.unwrap().temp_bans.len(), 1);

        // Advance past the expiry
        sweep(&f, &manager, now + chrono::Duration::seconds(86401))
            .await
            .unwrap();
        assert_eq!(manager.unbans.lock().unwrap().len(), 1);
        assert!(store.get(gid(1)).await.unwrap().temp_bans.is_empty());
    }

    #[tokio::test]
    async fn unobservable_and_unauthorized_guilds_are_skipped() {
        let store = Arc::new(MemoryGuildStore::default());
        let now = Utc::now();

        store_with_temp_ban(&store, gid(1), uid(2), now.timestamp() - 10).await;
        store_with_temp_ban(&store, gid(3), uid(4), now.timestamp() - 10).await;

        let f = Freeloader::new(store.clone()).await.unwrap();
        let manager = SweepBanManager {
            authority: [
                (gid(1), GuildAuthority::Unobservable),
                (gid(3), GuildAuthority::MissingBanPermission),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };

        sweep(&f, &manager, now).await.unwrap();

        assert!(manager.unbans.lock().unwrap().is_empty());
        assert_eq!(store.get(gid(1)).await.unwrap().temp_bans.len(), 1);
        assert_eq!(store.get(gid(3)).await.unwrap().temp_bans.len(), 1);
    }

    #[tokio::test]
    async fn a_failing_guild_does_not_block_others_or_later_sweeps() {
        let store = Arc::new(MemoryGuildStore::default());
        let now = Utc::now();

        store_with_temp_ban(&store, gid(1), uid(2), now.timestamp() - 10).await;
        store_with_temp_ban(&store, gid(3), uid(4), now.timestamp() - 10).await;

        let f = Freeloader::new(store.clone()).await.unwrap();
        let manager = SweepBanManager::default();
        manager.failing.lock().unwrap().insert(gid(1));

        // The sweep itself succeeds even though guild 1 errored
        sweep(&f, &manager, now).await.unwrap();

        assert_eq!(
            manager.unbans.lock().unwrap().as_slice(),
            [(gid(3), uid(4))]
        );
        assert_eq!(store.get(gid(1)).await.unwrap().temp_bans.len(), 1);
        assert!(store.get(gid(3)).await.unwrap().temp_bans.is_empty());

        // Once the failure clears, the next sweep picks guild 1 back up
        manager.failing.lock().unwrap().clear();
        sweep(&f, &manager, now).await.unwrap();

        assert!(store.get(gid(1)).await.unwrap().temp_bans.is_empty());
        assert_eq!(manager.unbans.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn untouched_guilds_keep_their_records_intact() {
        let store = Arc::new(MemoryGuildStore::default());
        let now = Utc::now();

        let mut settings = GuildSettings::default();
        settings.tracking = true;
        settings.joined.insert(uid(9));
        settings.temp_bans.insert(uid(2), now.timestamp() - 10);
        store.set(gid(1), &settings).await.unwrap();

        let f = Freeloader::new(store.clone()).await.unwrap();
        let manager = SweepBanManager::default();

        sweep(&f, &manager, now).await.unwrap();

        // Campaign state survives the per-guild rewrite
        let stored = store.get(gid(1)).await.unwrap();
        assert!(stored.tracking);
        assert!(stored.joined.contains(&uid(9)));
        assert!(stored.temp_bans.is_empty());
    }
}

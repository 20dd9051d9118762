use dashmap::DashMap;
use serenity::all::GuildId;

use super::core::GuildSettings;
use crate::store::{GuildStore, StoreError};

/// Read-through snapshot of every guild's settings, used to answer the
/// per-event hot path (joins and messages) without a storage round trip.
///
/// Rebuilt from the durable store after every write; never written to
/// directly and never treated as the source of truth.
pub struct GuildCache {
    guilds: DashMap<GuildId, GuildSettings>,
}

impl GuildCache {
    pub fn new() -> Self {
        Self {
            guilds: DashMap::new(),
        }
    }

    /// Returns the cached snapshot for a guild, or `None` if the guild
    /// has never been written to the store.
    pub fn get(&self, guild_id: GuildId) -> Option<GuildSettings> {
        self.guilds.get(&guild_id).map(|entry| entry.clone())
    }

    /// Replaces the snapshot with a full re-read of the store.
    pub async fn refresh(&self, store: &dyn GuildStore) -> Result<(), StoreError> {
        let all = store.all().await?;

        self.guilds.clear();

        for (guild_id, settings) in all {
            self.guilds.insert(guild_id, settings);
        }

        Ok(())
    }
}

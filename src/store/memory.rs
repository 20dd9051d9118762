use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serenity::all::GuildId;

use super::{GuildStore, StoreError};
use crate::modules::freeloader::core::GuildSettings;

/// In-memory settings store, used by the test suite and for running the
/// bot without a database.
#[derive(Default)]
pub struct MemoryGuildStore {
    guilds: Mutex<HashMap<GuildId, GuildSettings>>,
}

#[async_trait]
impl GuildStore for MemoryGuildStore {
    async fn get(&self, guild_id: GuildId) -> Result<GuildSettings, StoreError> {
        let guilds = self.guilds.lock().expect("guild store mutex poisoned");

        Ok(guilds.get(&guild_id).cloned().unwrap_or_default())
    }

    async fn set(&self, guild_id: GuildId, settings: &GuildSettings) -> Result<(), StoreError> {
        let mut guilds = self.guilds.lock().expect("guild store mutex poisoned");

        guilds.insert(guild_id, settings.clone());

        Ok(())
    }

    async fn all(&self) -> Result<HashMap<GuildId, GuildSettings>, StoreError> {
        let guilds = self.guilds.lock().expect("guild store mutex poisoned");

        Ok(guilds.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::all::UserId;

    #[tokio::test]
    async fn missing_guild_returns_defaults() {
        let store = MemoryGuildStore::default();

        let settings = store.get(GuildId::new(1)).await.unwrap();

        assert!(!settings.tracking);
        assert!(settings.joined.is_empty());
        assert!(settings.temp_bans.is_empty());
    }

    #[tokio::test]
    async fn set_replaces_the_full_record() {
        let store = MemoryGuildStore::default();
        let guild = GuildId::new(1);

        let mut settings = store.get(guild).await.unwrap();
        settings.tracking = true;
        settings.joined.insert(UserId::new(2));
        store.set(guild, &settings).await.unwrap();

        settings.joined.clear();
        store.set(guild, &settings).await.unwrap();

        let stored = store.get(guild).await.unwrap();
        assert!(stored.tracking);
        assert!(stored.joined.is_empty());

        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.contains_key(&guild));
    }
}

pub mod memory;
pub mod postgres;

use std::collections::HashMap;

use async_trait::async_trait;
use serenity::all::GuildId;
use thiserror::Error;

use crate::modules::freeloader::core::GuildSettings;

pub use memory::MemoryGuildStore;
pub use postgres::PgGuildStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt guild record: {0}")]
    Corrupt(String),
}

/// Durable, guild-scoped settings storage.
///
/// `set` replaces the full record for a guild atomically.
#[async_trait]
pub trait GuildStore: Send + Sync {
    /// Returns the stored settings for a guild, or the defaults if the
    /// guild has never been written.
    async fn get(&self, guild_id: GuildId) -> Result<GuildSettings, StoreError>;

    async fn set(&self, guild_id: GuildId, settings: &GuildSettings) -> Result<(), StoreError>;

    async fn all(&self) -> Result<HashMap<GuildId, GuildSettings>, StoreError>;
}

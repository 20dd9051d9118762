use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serenity::all::{GuildId, UserId};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use super::{GuildStore, StoreError};
use crate::modules::freeloader::core::{BanPolicy, GuildSettings};

/// Postgres-backed settings store. One row per guild; `set` upserts the
/// full row so a record is always replaced atomically.
pub struct PgGuildStore {
    pool: PgPool,
}

impl PgGuildStore {
    pub async fn new(pool: PgPool) -> Result<Self, StoreError> {
        sqlx::query(
            "
                CREATE TABLE IF NOT EXISTS freeloader__guilds (
                    guild_id TEXT PRIMARY KEY,
                    tracking BOOLEAN NOT NULL DEFAULT false,
                    joined TEXT[] NOT NULL DEFAULT '{}',
                    triggered TEXT[] NOT NULL DEFAULT '{}',
                    ban_kind SMALLINT NOT NULL DEFAULT 0,
                    ban_length_days SMALLINT NOT NULL DEFAULT 0,
                    temp_bans JSONB NOT NULL DEFAULT '{}'
                )
            ",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    fn decode(row: &PgRow) -> Result<(GuildId, GuildSettings), StoreError> {
        let guild_id: String = row.try_get("guild_id")?;
        let guild_id = guild_id
            .parse::<u64>()
            .map(GuildId::new)
            .map_err(|e| StoreError::Corrupt(format!("bad guild id: {}", e)))?;

        let joined: Vec<String> = row.try_get("joined")?;
        let triggered: Vec<String> = row.try_get("triggered")?;

        let ban_kind: i16 = row.try_get("ban_kind")?;
        let ban_length_days: i16 = row.try_get("ban_length_days")?;

        let temp_bans: serde_json::Value = row.try_get("temp_bans")?;
        let temp_bans: HashMap<String, i64> = serde_json::from_value(temp_bans)
            .map_err(|e| StoreError::Corrupt(format!("bad temp ban map: {}", e)))?;

        let mut parsed_temp_bans = HashMap::new();

        for (user_id, expiry) in temp_bans {
            let user_id = user_id
                .parse::<u64>()
                .map(UserId::new)
                .map_err(|e| StoreError::Corrupt(format!("bad temp ban user id: {}", e)))?;

            parsed_temp_bans.insert(user_id, expiry);
        }

        let settings = GuildSettings {
            tracking: row.try_get("tracking")?,
            joined: parse_user_ids(joined)?,
            triggered: parse_user_ids(triggered)?,
            ban_policy: BanPolicy::from_wire(ban_kind, ban_length_days),
            temp_bans: parsed_temp_bans,
        };

        Ok((guild_id, settings))
    }
}

fn parse_user_ids(ids: Vec<String>) -> Result<HashSet<UserId>, StoreError> {
    let mut parsed = HashSet::with_capacity(ids.len());

    for id in ids {
        let id = id
            .parse::<u64>()
            .map(UserId::new)
            .map_err(|e| StoreError::Corrupt(format!("bad user id: {}", e)))?;

        parsed.insert(id);
    }

    Ok(parsed)
}

#[async_trait]
impl GuildStore for PgGuildStore {
    async fn get(&self, guild_id: GuildId) -> Result<GuildSettings, StoreError> {
        let row = sqlx::query(
            "
                SELECT guild_id, tracking, joined, triggered, ban_kind, ban_length_days, temp_bans
                FROM freeloader__guilds
                WHERE guild_id = $1
            ",
        )
        .bind(guild_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Self::decode(&row)?.1),
            None => Ok(GuildSettings::default()),
        }
    }

    async fn set(&self, guild_id: GuildId, settings: &GuildSettings) -> Result<(), StoreError> {
        let joined: Vec<String> = settings.joined.iter().map(|id| id.to_string()).collect();
        let triggered: Vec<String> = settings.triggered.iter().map(|id| id.to_string()).collect();

        let (ban_kind, ban_length_days) = settings.ban_policy.to_wire();

        let temp_bans: HashMap<String, i64> = settings
            .temp_bans
            .iter()
            .map(|(id, &expiry)| (id.to_string(), expiry))
            .collect();
        let temp_bans = serde_json::to_value(temp_bans)
            .map_err(|e| StoreError::Corrupt(format!("unencodable temp ban map: {}", e)))?;

        sqlx::query(
            "
                INSERT INTO freeloader__guilds
                    (guild_id, tracking, joined, triggered, ban_kind, ban_length_days, temp_bans)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (guild_id) DO UPDATE SET
                    tracking = EXCLUDED.tracking,
                    joined = EXCLUDED.joined,
                    triggered = EXCLUDED.triggered,
                    ban_kind = EXCLUDED.ban_kind,
                    ban_length_days = EXCLUDED.ban_length_days,
                    temp_bans = EXCLUDED.temp_bans
            ",
        )
        .bind(guild_id.to_string())
        .bind(settings.tracking)
        .bind(joined)
        .bind(triggered)
        .bind(ban_kind)
        .bind(ban_length_days)
        .bind(temp_bans)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn all(&self) -> Result<HashMap<GuildId, GuildSettings>, StoreError> {
        let rows = sqlx::query(
            "
                SELECT guild_id, tracking, joined, triggered, ban_kind, ban_length_days, temp_bans
                FROM freeloader__guilds
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut guilds = HashMap::with_capacity(rows.len());

        for row in rows {
            let (guild_id, settings) = Self::decode(&row)?;
            guilds.insert(guild_id, settings);
        }

        Ok(guilds)
    }
}

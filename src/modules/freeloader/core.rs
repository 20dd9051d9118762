use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serenity::all::{GuildId, UserId};
use thiserror::Error;

use crate::store::StoreError;

/// Members must post this (case-insensitive, substring match) after
/// joining to count as heist participants.
pub const TRIGGER_PHRASE: &str = "join heist";

pub const MIN_TEMPBAN_DAYS: u8 = 1;
pub const MAX_TEMPBAN_DAYS: u8 = 7;
pub const DEFAULT_TEMPBAN_DAYS: u8 = 7;

/// What happens to confirmed freeloaders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BanPolicy {
    #[default]
    Permanent,
    Temporary {
        days: u8,
    },
}

impl BanPolicy {
    /// `(kind, length_days)` as persisted: 0 = ban, 1 = tempban.
    pub fn to_wire(self) -> (i16, i16) {
        match self {
            Self::Permanent => (0, 0),
            Self::Temporary { days } => (1, i16::from(days)),
        }
    }

    pub fn from_wire(kind: i16, length_days: i16) -> Self {
        if kind == 1 {
            let days = length_days.clamp(
                i16::from(MIN_TEMPBAN_DAYS),
                i16::from(MAX_TEMPBAN_DAYS),
            ) as u8;

            Self::Temporary { days }
        } else {
            Self::Permanent
        }
    }
}

#[derive(poise::ChoiceParameter)]
pub enum BanKindChoice {
    #[name = "ban"]
    Ban,
    #[name = "tempban"]
    Tempban,
}

impl BanKindChoice {
    pub fn resolve(self) -> BanKind {
        match self {
            Self::Ban => BanKind::Permanent,
            Self::Tempban => BanKind::Temporary,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BanKind {
    Permanent,
    Temporary,
}

/// Outcome of a ban-kind update. `Unchanged` means the stored policy was
/// already of the requested kind and nothing was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolicyChange {
    Updated(BanPolicy),
    Unchanged(BanPolicy),
}

/// Per-guild persisted state. Campaign fields (`tracking`, `joined`,
/// `triggered`) are reset when a campaign starts; `temp_bans` outlives
/// campaigns and is only ever drained by the expiry sweep.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GuildSettings {
    pub tracking: bool,
    pub joined: HashSet<UserId>,
    pub triggered: HashSet<UserId>,
    pub ban_policy: BanPolicy,
    /// User id -> unban time as epoch seconds.
    pub temp_bans: HashMap<UserId, i64>,
}

#[derive(Debug, Error)]
pub enum FreeloaderError {
    #[error("You already have a freeloader check going, you can stop it with `freeloader stop`.")]
    AlreadyTracking,
    #[error("You do not currently have a freeloader check running right now.")]
    NotTracking,
    #[error("The ban type is not `tempban`. You can set it with `freeloader settings bantype tempban`.")]
    NotTempban,
    #[error("The ban length must be entered as a valid integer between {MIN_TEMPBAN_DAYS} and {MAX_TEMPBAN_DAYS} days.")]
    InvalidBanLength,
    #[error("The BanManager service is not available. Please reach out to the developers to fix it.")]
    NoBanManager,
    #[error("There is no freeloader report awaiting confirmation. Run `freeloader stop` first.")]
    NothingPending,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Whether the bot can enforce bans in a guild right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GuildAuthority {
    /// The guild is not observable (e.g. the bot was removed).
    Unobservable,
    MissingBanPermission,
    CanBan,
}

/// Membership lookups against the host platform.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Forces a full member-list materialization for the guild and
    /// returns every current member's id. Potentially slow; called once
    /// per campaign stop.
    async fn sync_members(&self, guild_id: GuildId) -> Result<HashSet<UserId>, crate::Error>;

    /// Resolves a user id to a display name, falling back to the bare id
    /// when the user cannot be fetched.
    async fn display_name(&self, user_id: UserId) -> String;
}

/// External ban enforcement.
#[async_trait]
pub trait BanManager: Send + Sync {
    async fn authority(&self, guild_id: GuildId) -> GuildAuthority;

    async fn ban(&self, guild_id: GuildId, user_id: UserId, reason: &str)
        -> Result<(), crate::Error>;

    async fn unban(&self, guild_id: GuildId, user_id: UserId) -> Result<(), crate::Error>;
}

/// Direct-message delivery. Failures are expected (closed DMs) and
/// callers ignore them.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ban_policy_wire_round_trip() {
        assert_eq!(BanPolicy::Permanent.to_wire(), (0, 0));
        assert_eq!(BanPolicy::Temporary { days: 3 }.to_wire(), (1, 3));

        assert_eq!(BanPolicy::from_wire(0, 0), BanPolicy::Permanent);
        assert_eq!(
            BanPolicy::from_wire(1, 3),
            BanPolicy::Temporary { days: 3 }
        );
    }

    #[test]
    fn ban_policy_from_wire_clamps_bad_lengths() {
        assert_eq!(
            BanPolicy::from_wire(1, 0),
            BanPolicy::Temporary { days: 1 }
        );
        assert_eq!(
            BanPolicy::from_wire(1, 30),
            BanPolicy::Temporary { days: 7 }
        );
    }
}

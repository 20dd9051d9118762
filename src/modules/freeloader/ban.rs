use chrono::Utc;
use log::debug;
use serenity::all::{GuildId, UserId};

use super::core::{BanManager, BanPolicy, FreeloaderError, Notifier};
use super::engine::Freeloader;

/// User-facing summary of a ban run; rendering is the caller's job.
#[derive(Debug)]
pub struct BanOutcome {
    pub processed: usize,
    pub verb: String,
}

/// Bans every confirmed freeloader under the guild's current policy.
///
/// Each member gets a best-effort DM first. For temp bans the expiry is
/// persisted before ban enforcement runs, so a restart between the two
/// cannot lose the unban record.
pub async fn execute(
    freeloader: &Freeloader,
    ban_manager: Option<&dyn BanManager>,
    notifier: &dyn Notifier,
    guild_id: GuildId,
    guild_name: &str,
    freeloaders: &[UserId],
) -> Result<BanOutcome, crate::Error> {
    let Some(ban_manager) = ban_manager else {
        return Err(FreeloaderError::NoBanManager.into());
    };

    let policy = freeloader.settings(guild_id).ban_policy;

    let verb = match policy {
        BanPolicy::Permanent => "banned".to_string(),
        BanPolicy::Temporary { days } => format!("tempbanned for {} days", days),
    };

    for &user_id in freeloaders {
        match policy {
            BanPolicy::Permanent => {
                let notice = format!(
                    "**Action:** You have been banned.\n**Reason:** Freeloading.\n**Server:** {}.",
                    guild_name
                );

                if let Err(e) = notifier.send(user_id, &notice).await {
                    debug!("Could not notify {} of their ban: {}", user_id, e);
                }

                ban_manager
                    .ban(guild_id, user_id, "Freeloader banned.")
                    .await?;
            }
            BanPolicy::Temporary { days } => {
                let notice = format!(
                    "**Action:** You have been tempbanned for {} days.\n**Reason:** Freeloading.\n**Server:** {}.",
                    days, guild_name
                );

                if let Err(e) = notifier.send(user_id, &notice).await {
                    debug!("Could not notify {} of their temp ban: {}", user_id, e);
                }

                let expiry = (Utc::now() + chrono::Duration::days(i64::from(days))).timestamp();

                {
                    let lock = freeloader.guild_lock(guild_id);
                    let _guard = lock.lock().await;

                    freeloader.record_temp_ban(guild_id, user_id, expiry).await?;
                }

                ban_manager
                    .ban(
                        guild_id,
                        user_id,
                        &format!("Freeloader tempbanned for {} days.", days),
                    )
                    .await?;
            }
        }
    }

    Ok(BanOutcome {
        processed: freeloaders.len(),
        verb,
    })
}

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{Cache, CreateMessage, GuildId, Http, UserId};

use crate::modules::freeloader::core::{BanManager, Directory, GuildAuthority, Notifier};

const MEMBER_PAGE_SIZE: u64 = 1000;

/// Membership lookups over the Discord HTTP API.
pub struct DiscordDirectory {
    http: Arc<Http>,
}

impl DiscordDirectory {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Directory for DiscordDirectory {
    async fn sync_members(&self, guild_id: GuildId) -> Result<HashSet<UserId>, crate::Error> {
        let mut members = HashSet::new();
        let mut after: Option<UserId> = None;

        // Page through the full member list; Discord caps each page at
        // 1000 members.
        loop {
            let page = guild_id
                .members(&self.http, Some(MEMBER_PAGE_SIZE), after)
                .await?;

            let full_page = page.len() as u64 == MEMBER_PAGE_SIZE;
            after = page.last().map(|member| member.user.id);

            members.extend(page.into_iter().map(|member| member.user.id));

            if !full_page {
                break;
            }
        }

        Ok(members)
    }

    async fn display_name(&self, user_id: UserId) -> String {
        match user_id.to_user(&self.http).await {
            Ok(user) => user.name,
            Err(_) => user_id.to_string(),
        }
    }
}

/// Ban enforcement over the Discord HTTP API, with authority checks
/// answered from the gateway cache.
pub struct DiscordBanManager {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl DiscordBanManager {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

#[async_trait]
impl BanManager for DiscordBanManager {
    async fn authority(&self, guild_id: GuildId) -> GuildAuthority {
        let bot_id = self.cache.current_user().id;

        match self.cache.guild(guild_id) {
            None => GuildAuthority::Unobservable,
            Some(guild) => match guild.members.get(&bot_id) {
                Some(me) if guild.member_permissions(me).ban_members() => GuildAuthority::CanBan,
                _ => GuildAuthority::MissingBanPermission,
            },
        }
    }

    async fn ban(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        reason: &str,
    ) -> Result<(), crate::Error> {
        guild_id
            .ban_with_reason(&self.http, user_id, 0, reason)
            .await?;

        Ok(())
    }

    async fn unban(&self, guild_id: GuildId, user_id: UserId) -> Result<(), crate::Error> {
        guild_id.unban(&self.http, user_id).await?;

        Ok(())
    }
}

/// Direct-message delivery over the Discord HTTP API.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, user_id: UserId, text: &str) -> Result<(), crate::Error> {
        let channel = user_id.create_dm_channel(&self.http).await?;

        channel
            .id
            .send_message(&self.http, CreateMessage::new().content(text))
            .await?;

        Ok(())
    }
}

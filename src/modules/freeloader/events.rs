use serenity::all::FullEvent;

use crate::{Data, Error};

pub async fn event_listener(event: &FullEvent, data: &Data) -> Result<(), Error> {
    match event {
        FullEvent::GuildMemberAddition { new_member } => {
            data.freeloader
                .handle_member_join(new_member.guild_id, new_member.user.id)
                .await?;

            Ok(())
        }
        FullEvent::Message { new_message } => {
            let Some(guild_id) = new_message.guild_id else {
                return Ok(());
            };

            data.freeloader
                .handle_message(
                    guild_id,
                    new_message.author.id,
                    new_message.author.bot,
                    &new_message.content,
                )
                .await?;

            Ok(())
        }
        _ => Ok(()),
    }
}

use poise::CreateReply;
use serenity::all::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};

use super::ban;
use super::core::{BanKindChoice, BanPolicy, FreeloaderError, PolicyChange};
use super::report;
use crate::{Context, Error};

const REPORT_PAGE_LENGTH: usize = 1024;

/// The anti-freeloader command set
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    required_bot_permissions = "BAN_MEMBERS",
    subcommands("start", "stop", "confirm", "cancel", "settings")
)]
pub async fn freeloader(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Starts watching for freeloaders joining the heist
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn start(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Could not get guild id")?;

    ctx.data().freeloader.start_campaign(guild_id).await?;

    let embed = CreateEmbed::new()
        .title("Freeloading Check Activated 🚨")
        .description(
            "I will be watching for freeloaders until you run `freeloader stop`. Then you can choose to **BAN** them.",
        )
        .color(0x00FF00)
        .footer(CreateEmbedFooter::new(
            "We are not liable for any false bans, use this at your own risk.",
        ));

    ctx.send(CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Stops the check and builds the freeloader report
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Could not get guild id")?;
    let data = ctx.data();

    let triggered = data.freeloader.stop_campaign(guild_id).await?;

    // Building the report materializes the full member list, which can
    // take a while on large guilds
    ctx.defer().await?;

    let report = report::build_report(data.directory.as_ref(), guild_id, &triggered).await?;

    if report.is_empty() {
        ctx.say("There were no freeloaders reported today!").await?;
        return Ok(());
    }

    let count = report.freeloaders.len();
    data.freeloader.set_pending(guild_id, report.freeloaders);

    for page in crate::impls::utils::pagify(&report.text, REPORT_PAGE_LENGTH) {
        let embed = CreateEmbed::new()
            .title("Freeloader Report")
            .description(page)
            .color(0x00FF00);

        ctx.send(CreateReply::default().embed(embed)).await?;
    }

    ctx.say(format!(
        "**{}** freeloader{} found. Run `freeloader confirm` to ban them or `freeloader cancel` to discard the report.",
        count,
        if count == 1 { "" } else { "s" }
    ))
    .await?;

    Ok(())
}

/// Bans everyone on the pending freeloader report
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn confirm(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Could not get guild id")?;
    let data = ctx.data();

    let Some(freeloaders) = data.freeloader.take_pending(guild_id) else {
        return Err(FreeloaderError::NothingPending.into());
    };

    let guild_name = ctx
        .guild()
        .map(|guild| guild.name.clone())
        .unwrap_or_else(|| "this server".to_string());

    ctx.defer().await?;

    match ban::execute(
        &data.freeloader,
        data.ban_manager.as_deref(),
        data.notifier.as_ref(),
        guild_id,
        &guild_name,
        &freeloaders,
    )
    .await
    {
        Ok(outcome) => {
            ctx.say(format!(
                "**{}** freeloader{} {}.",
                outcome.processed,
                if outcome.processed == 1 { " was" } else { "s were" },
                outcome.verb
            ))
            .await?;

            Ok(())
        }
        Err(e) => {
            // Keep the report around so the operator can retry
            data.freeloader.set_pending(guild_id, freeloaders);

            Err(e)
        }
    }
}

/// Discards the pending freeloader report
#[poise::command(prefix_command, slash_command, guild_only)]
pub async fn cancel(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Could not get guild id")?;

    if ctx.data().freeloader.take_pending(guild_id).is_none() {
        return Err(FreeloaderError::NothingPending.into());
    }

    ctx.say("The freeloader report has been discarded, nobody was banned.")
        .await?;

    Ok(())
}

/// Anti-Freeloader settings commands
#[poise::command(
    prefix_command,
    slash_command,
    guild_only,
    subcommands("settings_view", "settings_bantype", "settings_banlength")
)]
pub async fn settings(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// View the current ban type and ban length
#[poise::command(prefix_command, slash_command, guild_only, rename = "view")]
pub async fn settings_view(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Could not get guild id")?;

    let settings = ctx.data().freeloader.settings(guild_id);

    let (bantype, banlength) = match settings.ban_policy {
        BanPolicy::Permanent => ("Ban".to_string(), "N/A".to_string()),
        BanPolicy::Temporary { days } => ("Tempban".to_string(), format!("{} days", days)),
    };

    let embed = CreateEmbed::new()
        .author(CreateEmbedAuthor::new("Anti-Freeloader Settings"))
        .description(format!(
            "**Ban type**\n{}\n**Ban length**\n{}",
            bantype, banlength
        ))
        .color(0x00FF00);

    ctx.send(CreateReply::default().embed(embed)).await?;

    Ok(())
}

/// Sets the type of ban, either `ban` or `tempban`
#[poise::command(prefix_command, slash_command, guild_only, rename = "bantype")]
pub async fn settings_bantype(
    ctx: Context<'_>,
    #[description = "The type of ban to apply to freeloaders"] ban_type: BanKindChoice,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Could not get guild id")?;

    let change = ctx
        .data()
        .freeloader
        .set_ban_kind(guild_id, ban_type.resolve())
        .await?;

    match change {
        PolicyChange::Updated(BanPolicy::Permanent) => {
            ctx.say("The ban type has successfully been updated to a `ban`.")
                .await?;
        }
        PolicyChange::Updated(BanPolicy::Temporary { .. }) => {
            ctx.say(
                "The ban type has successfully been updated to a `tempban`.\nThe ban length is set to 7 days by default. To change that use `freeloader settings banlength <days>`.",
            )
            .await?;
        }
        PolicyChange::Unchanged(_) => {
            ctx.say("The ban type is already set to that.").await?;
        }
    }

    Ok(())
}

/// Sets the length of the tempban in days (1-7)
#[poise::command(prefix_command, slash_command, guild_only, rename = "banlength")]
pub async fn settings_banlength(
    ctx: Context<'_>,
    #[description = "The length of the tempban in days"]
    #[min = 1]
    #[max = 7]
    ban_length: u8,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Could not get guild id")?;

    ctx.data()
        .freeloader
        .set_ban_length(guild_id, ban_length)
        .await?;

    ctx.say(format!(
        "The tempban length has been set to {} days.",
        ban_length
    ))
    .await?;

    Ok(())
}

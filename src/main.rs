mod config;
mod impls;
mod modules;
mod store;
mod tasks;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};
use serenity::all::FullEvent;
use sqlx::postgres::PgPoolOptions;

use crate::impls::discord::{DiscordBanManager, DiscordDirectory, DiscordNotifier};
use crate::modules::freeloader::core::{BanManager, Directory, Notifier};
use crate::modules::freeloader::engine::Freeloader;
use crate::store::{GuildStore, PgGuildStore};

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub freeloader: Arc<Freeloader>,
    pub directory: Arc<dyn Directory>,
    pub ban_manager: Option<Arc<dyn BanManager>>,
    pub notifier: Arc<dyn Notifier>,
}

static TASKS_STARTED: AtomicBool = AtomicBool::new(false);

#[poise::command(prefix_command)]
async fn register(ctx: Context<'_>) -> Result<(), Error> {
    poise::builtins::register_application_commands_buttons(ctx).await?;
    Ok(())
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    // This is our custom error handler
    // They are many errors that can occur, so we only handle the ones we want to customize
    // and forward the rest to the default handler
    match error {
        poise::FrameworkError::Setup { error, .. } => panic!("Failed to start bot: {:?}", error),
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error,);
            let err = ctx.say(format!("**{}**", error)).await;

            if let Err(e) = err {
                error!("Error while sending error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

async fn event_listener(event: &FullEvent, data: &Data) -> Result<(), Error> {
    match event {
        FullEvent::Ready { data_about_bot } => {
            info!("{} is ready!", data_about_bot.user.name);

            match &data.ban_manager {
                Some(ban_manager) => {
                    // Ready fires again on reconnect, only spawn once
                    if !TASKS_STARTED.swap(true, Ordering::SeqCst) {
                        tokio::task::spawn(crate::tasks::taskcat::start_all_tasks(
                            data.freeloader.clone(),
                            ban_manager.clone(),
                        ));
                    }
                }
                None => {
                    warn!("Ban manager is disabled, temp bans will not expire");
                }
            }

            Ok(())
        }
        _ => modules::freeloader::events::event_listener(event, data).await,
    }
}

#[tokio::main]
async fn main() {
    const MAX_CONNECTIONS: u32 = 3; // max connections to the database, we don't need too many here

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "antifreeloader=info");
    }

    env_logger::init();

    let intents = serenity::all::GatewayIntents::non_privileged()
        | serenity::all::GatewayIntents::GUILD_MEMBERS
        | serenity::all::GatewayIntents::MESSAGE_CONTENT;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some("%".into()),
                ..poise::PrefixFrameworkOptions::default()
            },
            event_handler: |_ctx, event, _framework, data| {
                Box::pin(event_listener(event, data))
            },
            commands: {
                let mut cmds = vec![register()];

                cmds.extend(modules::freeloader::commands());

                cmds
            },
            pre_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Executing command {} for user {} ({})...",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id
                    );
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    info!(
                        "Done executing command {} for user {} ({})...",
                        ctx.command().qualified_name,
                        ctx.author().name,
                        ctx.author().id
                    );
                })
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, _framework| {
            Box::pin(async move {
                let pool = PgPoolOptions::new()
                    .max_connections(MAX_CONNECTIONS)
                    .connect(&config::CONFIG.meta.postgres_url)
                    .await?;

                let store: Arc<dyn GuildStore> = Arc::new(PgGuildStore::new(pool).await?);
                let freeloader = Arc::new(Freeloader::new(store).await?);

                let ban_manager: Option<Arc<dyn BanManager>> =
                    if config::CONFIG.meta.ban_manager_enabled {
                        Some(Arc::new(DiscordBanManager::new(
                            ctx.http.clone(),
                            ctx.cache.clone(),
                        )))
                    } else {
                        None
                    };

                Ok(Data {
                    freeloader,
                    directory: Arc::new(DiscordDirectory::new(ctx.http.clone())),
                    ban_manager,
                    notifier: Arc::new(DiscordNotifier::new(ctx.http.clone())),
                })
            })
        })
        .build();

    let mut client =
        serenity::all::ClientBuilder::new(&config::CONFIG.discord_auth.token, intents)
            .framework(framework)
            .await
            .expect("Error creating client");

    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }
}

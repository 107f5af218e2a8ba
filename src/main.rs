use std::env;
use std::sync::Arc;

use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::info;

use raffle_daemon::backup::{BACKUP_INTERVAL_SECS, BackupTask};
use raffle_daemon::gateway::{Clock, SerenityGateway, SystemClock};
use raffle_daemon::giveaway::GiveawayRegistry;
use raffle_daemon::store::JsonStore;
use raffle_daemon::sweeper::{SWEEP_INTERVAL_SECS, SweepRequest, Sweeper};
use raffle_daemon::{BOT_NAME, Data, Error, commands, handlers, logging};

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    // Initialize logging
    logging::init()?;

    // Load environment variables
    let token = env::var("DISCORD_TOKEN").expect("DISCORD_TOKEN must be set");
    let data_dir = env::var("RAFFLE_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let backup_dir = env::var("RAFFLE_BACKUP_DIR").unwrap_or_else(|_| "backups".to_string());

    // Rebuild durable state before accepting any command
    let store = Arc::new(JsonStore::new(data_dir));
    let registry = Arc::new(GiveawayRegistry::load(Arc::clone(&store)).await);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (sweep_tx, sweep_rx) = Sweeper::channel();
    let data = Data::new(Arc::clone(&registry), Arc::clone(&clock), sweep_tx);

    // Configure the Poise framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::giveaway(),
                commands::giveaway_enter(),
                commands::giveaway_end(),
                commands::giveaway_reroll(),
                commands::tempban(),
            ],
            pre_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_start(ctx);
                })
            },
            post_command: |ctx| {
                Box::pin(async move {
                    logging::log_command_end(ctx);
                })
            },
            on_error: |error| {
                Box::pin(async move {
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup({
            let data = data.clone();
            move |ctx, _ready, framework| {
                Box::pin(async move {
                    poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                    // Background reconciliation and backups share the
                    // connection's HTTP client.
                    let gateway = Arc::new(SerenityGateway::new(Arc::clone(&ctx.http)));
                    Sweeper::new(registry, gateway, Arc::clone(&clock))
                        .start(sweep_rx, SWEEP_INTERVAL_SECS);
                    BackupTask::new(store, clock, backup_dir).start(BACKUP_INTERVAL_SECS);

                    // Reconcile anything that expired while the process was
                    // down without waiting for the first scheduled tick.
                    let _ = data.sweep_tx.send(SweepRequest::SweepAll).await;

                    Ok(data)
                })
            }
        })
        .build();

    // Configure the Serenity client
    let intents = GatewayIntents::non_privileged();
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(handlers::Handler)
        .framework(framework)
        .await
        .expect("Failed to create client");

    // Event handlers read the bot state out of Serenity's data map.
    {
        let mut type_map = client.data.write().await;
        type_map.insert::<Data>(data.clone());
    }

    // Stop the sweep loop and the shards cleanly on Ctrl-C.
    {
        let sweep_tx = data.sweep_tx.clone();
        let shard_manager = client.shard_manager.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                let _ = sweep_tx.send(SweepRequest::Shutdown).await;
                shard_manager.shutdown_all().await;
            }
        });
    }

    info!("Starting {BOT_NAME}...");
    // Start the bot
    if let Err(err) = client.start().await {
        eprintln!("Error starting the bot: {err}");
    }

    Ok(())
}

fn main() {
    // Run the async main function
    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(async_main());

    // Handle any errors that occurred during execution
    if let Err(err) = result {
        eprintln!("Error: {err}");
    }
}

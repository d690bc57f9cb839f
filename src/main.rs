//! Broadcast User Bot - Main Entry Point
//!
//! A Telegram userbot that periodically sends a message to a set of chats
//! and forum topics, each on its own interval.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Confirm, Input, Password};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use broadcast_user_bot::config::{
    BotSettings, BroadcastConfig, ConfirmedEntry, Destination, DestinationConfig,
    MessagePayload, TelegramConfig, build_destination_config,
};
use broadcast_user_bot::scheduler::{DispatchScheduler, SenderSettings, format_wait};
use broadcast_user_bot::telegram::{DialogSummary, TelegramBot, TelegramError};

/// Telegram userbot for periodic message broadcast.
#[derive(Parser, Debug)]
#[command(name = "broadcast_bot")]
#[command(about = "Periodically send a message to Telegram chats and forum topics")]
#[command(version)]
struct Args {
    /// Path to the broadcast JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Generate an example configuration file and exit.
    #[arg(long)]
    generate_config: bool,

    /// Enter destinations, intervals and message interactively instead of reading the config file.
    #[arg(short, long)]
    interactive: bool,

    /// List all chats and forum topics with their ids, then exit.
    #[arg(long)]
    list_chats: bool,

    /// Also write the chat list to this file (with --list-chats).
    #[arg(long, requires = "list_chats")]
    output: Option<PathBuf>,

    /// Delete the session file and exit.
    #[arg(long)]
    logout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Handle example config generation
    if args.generate_config {
        return generate_example_config();
    }

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    if args.logout {
        return logout(&TelegramConfig::session_path_from_env());
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let bot_settings = BotSettings::from_env_with_defaults();

    // Resolve broadcast inputs before connecting so mistakes surface early
    let inputs = if args.list_chats {
        None
    } else if args.interactive {
        Some(interactive_setup()?)
    } else {
        let path = args.config.unwrap_or_else(|| bot_settings.broadcast_path.clone());
        Some(load_broadcast(&path)?)
    };

    // Connect to Telegram
    let bot = TelegramBot::connect(&tg_config)
        .await
        .context("Failed to connect to Telegram")?;

    // Handle authentication if needed
    if !bot.is_authorized().await.context("Failed to check authorization")? {
        authenticate(&bot, &tg_config).await?;
    }

    let Some((destinations, payload)) = inputs else {
        let result = list_chats(&bot, args.output.as_deref()).await;
        bot.disconnect();
        return result;
    };

    if payload.image_path().is_some() && payload.image_to_send().await.is_none() {
        warn!("Image file not found, messages will be sent as text until it appears");
    }

    info!(
        "Broadcasting to {} destinations (retry backoff: {})",
        destinations.len(),
        format_wait(bot_settings.retry_backoff())
    );

    let bot = Arc::new(bot);
    let scheduler = DispatchScheduler::new(Arc::clone(&bot)).with_settings(SenderSettings {
        retry_backoff: bot_settings.retry_backoff(),
    });
    let cancel = CancellationToken::new();

    // Spawn scheduler task
    let mut scheduler_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { scheduler.run(destinations, payload, cancel).await }
    });

    info!("Bot is running. Use Ctrl+C to stop.");

    // Wait for Ctrl+C, or for every destination to finish on its own
    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        joined = &mut scheduler_handle => Some(joined),
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            info!("Received Ctrl+C, shutting down...");
            cancel.cancel();
            scheduler_handle.await
        }
    };

    match joined {
        Ok(report) => info!(
            "Scheduler finished ({} skipped, {} stopped, {} cancelled)",
            report.skipped, report.stopped, report.cancelled
        ),
        Err(e) => warn!("Scheduler task failed: {}", e),
    }

    // Cleanup
    info!("Shutting down...");
    bot.disconnect();

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Generates an example configuration file.
fn generate_example_config() -> Result<()> {
    let example = BroadcastConfig::example();
    example.save_to_file("broadcast.example.json")?;

    println!("✓ Example configuration written to: broadcast.example.json");
    println!("\nTo use this bot:");
    println!("1. Copy broadcast.example.json to broadcast.json");
    println!("2. Run `broadcast_bot --list-chats` to find chat and topic ids");
    println!("3. Edit the message and destinations");
    println!("4. Create a .env file with TG_API_ID and TG_API_HASH");
    println!("5. Run: broadcast_bot");

    Ok(())
}

/// Loads and validates the broadcast file.
fn load_broadcast(path: &Path) -> Result<(DestinationConfig, MessagePayload)> {
    let config = BroadcastConfig::load_from_file(path)
        .with_context(|| format!("Failed to load broadcast configuration from {}", path.display()))?;

    info!("Loaded {} destination entries from {}", config.len(), path.display());

    config
        .into_parts()
        .context("Broadcast configuration validation failed")
}

/// Prompts for destinations, per-destination intervals and the message.
fn interactive_setup() -> Result<(DestinationConfig, MessagePayload)> {
    let raw_ids: String = Input::new()
        .with_prompt("Destination chat IDs (comma separated, chat_id or chat_id/topic_id)")
        .interact_text()?;

    let text: String = Input::new()
        .with_prompt("Message text")
        .interact_text()?;

    let image_path = if Confirm::new()
        .with_prompt("Send an image with the message?")
        .default(false)
        .interact()?
    {
        let path: String = Input::new()
            .with_prompt("Image file path")
            .interact_text()?;
        Some(PathBuf::from(path.trim()))
    } else {
        None
    };

    let mut entries = Vec::new();
    for raw in raw_ids.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if let Err(e) = raw.parse::<Destination>() {
            warn!("Ignoring destination {}: {}", raw, e);
            continue;
        }

        let interval_secs: u64 = Input::new()
            .with_prompt(format!("Interval in seconds for {raw}"))
            .validate_with(|secs: &u64| -> Result<(), &str> {
                if *secs > 0 { Ok(()) } else { Err("interval must be positive") }
            })
            .interact_text()?;

        let accepted = Confirm::new()
            .with_prompt(format!(
                "Send to {raw} every {}?",
                format_wait(Duration::from_secs(interval_secs))
            ))
            .default(true)
            .interact()?;

        entries.push(ConfirmedEntry::new(raw, interval_secs, accepted));
    }

    let destinations = build_destination_config(entries)?;
    anyhow::ensure!(!destinations.is_empty(), "No destinations confirmed");

    let payload = MessagePayload::new(text, image_path)?;
    Ok((destinations, payload))
}

/// Prints all dialogs and forum topics, optionally saving the report.
async fn list_chats(bot: &TelegramBot, output: Option<&Path>) -> Result<()> {
    let dialogs = bot
        .list_dialogs()
        .await
        .context("Failed to list chats")?;

    let report = render_chat_list(&dialogs);
    print!("{report}");

    if let Some(path) = output {
        std::fs::write(path, &report)
            .with_context(|| format!("Failed to write chat list to {}", path.display()))?;
        println!("✓ Chat list written to: {}", path.display());
    }

    println!("✓ Listed {} chats", dialogs.len());
    Ok(())
}

fn render_chat_list(dialogs: &[DialogSummary]) -> String {
    let mut out = String::new();
    for dialog in dialogs {
        out.push_str(&format!("💬 CHAT ID: {}, Title: {}\n", dialog.chat_id, dialog.title));
        for topic in &dialog.topics {
            out.push_str(&format!(
                "    🗂️ TOPIC ID: {}/{}, Title: {}\n",
                dialog.chat_id, topic.id, topic.title
            ));
        }
    }
    out
}

/// Deletes the session file.
fn logout(session_path: &Path) -> Result<()> {
    match std::fs::remove_file(session_path) {
        Ok(()) => {
            info!("Session file {} deleted", session_path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No session file at {}, nothing to do", session_path.display());
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to delete {}", session_path.display())),
    }
}

/// Handles Telegram authentication.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("Authentication required");

    let phone: String = match &config.phone {
        Some(phone) => phone.clone(),
        None => Input::new()
            .with_prompt("Enter your phone number (with country code)")
            .interact_text()?,
    };

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => {
            info!("Successfully signed in!");
            Ok(())
        }
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            bot.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")?;

            info!("Successfully signed in with 2FA!");
            Ok(())
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}

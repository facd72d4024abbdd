//! Zavod Miner - Main Entry Point
//!
//! Logs into the Zavod mini-app through a Telegram account, then claims
//! rewards and buys upgrades for as long as the session stays valid.

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Input, Password};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use zavod_miner::config::{MinerSettings, TelegramConfig};
use zavod_miner::game::GameApi;
use zavod_miner::miner::{Miner, MinerError};
use zavod_miner::telegram::{TelegramBot, TelegramError, TelegramWebApp};

/// Telegram mini-app farming bot.
#[derive(Parser, Debug)]
#[command(name = "zavod_miner")]
#[command(about = "Claim Zavod rewards and upgrade the workbench and toolkit")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Sign in interactively and save the session before mining.
    #[arg(long)]
    login: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let settings =
        MinerSettings::from_env_with_defaults().context("Failed to load miner settings")?;

    info!(
        "Settings: default sleep {}s, speed upgrades {} (max {}), storage upgrades {} (max {})",
        settings.default_sleep_secs,
        settings.upgrade_speed,
        settings.speed_max_level,
        settings.upgrade_storage,
        settings.storage_max_level
    );

    if args.login {
        login(&tg_config, &settings).await?;
    }

    let api = GameApi::new(&settings.api_url, settings.proxy.as_ref())
        .context("Failed to build game HTTP client")?;
    let web_app = TelegramWebApp::new(tg_config.clone(), settings.proxy.clone());
    let mut miner = Miner::new(tg_config.session_name(), web_app, api, settings);

    info!("Starting miner for {}...", tg_config.session_name());

    tokio::select! {
        result = miner.run() => match result {
            Ok(()) => Ok(()),
            Err(MinerError::InvalidSession(name)) => Err(anyhow::anyhow!(
                "Session {name} is invalid, run with --login to sign in again"
            )),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            Ok(())
        }
    }
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

/// Connects and runs the interactive login if the session is not authorized.
async fn login(config: &TelegramConfig, settings: &MinerSettings) -> Result<()> {
    let bot = TelegramBot::connect(config, settings.proxy.as_ref())
        .await
        .context("Failed to connect to Telegram")?;

    let result = match bot.is_authorized().await {
        Ok(true) => {
            info!("Session is already authorized");
            Ok(())
        }
        Ok(false) => authenticate(&bot, config).await,
        Err(e) => Err(e).context("Failed to check authorization"),
    };

    bot.disconnect();
    result
}

/// Handles Telegram authentication.
async fn authenticate(bot: &TelegramBot, config: &TelegramConfig) -> Result<()> {
    info!("Authentication required");

    let phone: String = Input::new()
        .with_prompt("Enter your phone number (with country code)")
        .interact_text()?;

    let token = bot
        .request_login_code(&phone, &config.api_hash)
        .await
        .context("Failed to request login code")?;

    info!("Login code sent to your Telegram app");

    let code: String = Input::new()
        .with_prompt("Enter the login code")
        .interact_text()?;

    match bot.sign_in(&token, &code).await {
        Ok(()) => Ok(()),
        Err(TelegramError::PasswordRequired(password_token)) => {
            info!("Two-factor authentication is enabled");

            let hint = password_token.hint().unwrap_or("no hint");
            info!("Password hint: {}", hint);

            let password: String = Password::new()
                .with_prompt("Enter your 2FA password")
                .interact()?;

            bot.check_password(password_token, &password)
                .await
                .context("2FA authentication failed")
        }
        Err(e) => Err(e).context("Authentication failed"),
    }
}

//! # Outreach — WhatsApp campaign bot
//!
//! Single-operator bot: a durable contact database, rate-limited resumable
//! mass messaging, and an AI chat command, all driven by text commands from
//! the operator's own WhatsApp account.
//!
//! Usage:
//!   outreach                         # Start with ~/.outreach/config.toml
//!   outreach --config ./bot.toml     # Custom config path
//!   outreach --verbose               # Debug logging

mod bot;
mod commands;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use outreach_campaign::ContactStore;
use outreach_channels::whatsapp::{WhatsAppChannel, WhatsAppConfig};
use outreach_core::{OutreachConfig, Transport};

#[derive(Parser)]
#[command(name = "outreach", version, about = "📤 Outreach — WhatsApp campaign bot")]
struct Cli {
    /// Path to the config file (default: ~/.outreach/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<String>,

    /// Override the webhook port
    #[arg(long)]
    webhook_port: Option<u16>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "outreach=debug,outreach_campaign=debug,outreach_channels=debug"
    } else {
        "outreach=info,outreach_campaign=info,outreach_channels=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => OutreachConfig::load_from(Path::new(path))
            .with_context(|| format!("loading config from {path}"))?,
        None => OutreachConfig::load().context("loading config")?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.storage.data_dir = data_dir;
    }
    if let Some(port) = cli.webhook_port {
        config.channel.whatsapp.webhook_port = port;
    }

    let data_dir = expand_path(&config.storage.data_dir);
    let uploads_dir = expand_path(&config.storage.uploads_dir);
    std::fs::create_dir_all(&data_dir)?;
    std::fs::create_dir_all(&uploads_dir)?;

    // Open the contact store
    let store = Arc::new(Mutex::new(ContactStore::open(&data_dir, config.sending.clone())));
    {
        let store = store.lock().await;
        let stats = store.stats();
        tracing::info!(
            "📊 {} contacts, sent today: {}/{}",
            store.len(),
            stats.sent_today,
            config.sending.daily_limit
        );
    }

    // Connect the WhatsApp transport
    let wa = &config.channel.whatsapp;
    let mut channel = WhatsAppChannel::new(WhatsAppConfig {
        access_token: wa.access_token.clone(),
        phone_number_id: wa.phone_number_id.clone(),
        webhook_verify_token: wa.webhook_verify_token.clone(),
        webhook_port: wa.webhook_port,
        operator_number: wa.operator_number.clone(),
    });
    channel.connect().await.context("connecting to WhatsApp")?;
    let transport: Arc<dyn Transport> = Arc::new(channel);

    // AI provider is optional; the campaign works without it
    let provider = match outreach_providers::create_provider(&config) {
        Ok(provider) => {
            tracing::info!("✓ AI provider initialized: {}", provider.name());
            Some(provider)
        }
        Err(e) => {
            tracing::warn!("✗ AI provider unavailable: {e} — !ai is disabled");
            None
        }
    };

    if config.channel.whatsapp.operator_number.is_empty() {
        tracing::warn!(
            "⚠️ No operator_number configured — management commands will be ignored"
        );
    }

    let bot = bot::Bot::new(config, transport, store, provider, uploads_dir);
    bot.run().await.context("bot loop failed")?;
    Ok(())
}

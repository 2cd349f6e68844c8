//! Outreach configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutreachConfig {
    /// API key for the AI provider (`!ai` command).
    #[serde(default = "default_api_key")]
    pub api_key: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Optional text prepended to every `!ai` prompt.
    #[serde(default)]
    pub pre_prompt: String,
    #[serde(default)]
    pub sending: SendingLimits,
    #[serde(default)]
    pub templates: Templates,
    #[serde(default)]
    pub channel: ChannelSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

fn default_api_key() -> String { String::new() }
fn default_provider() -> String { "gemini".into() }
fn default_model() -> String { "gemini-1.5-flash".into() }

impl Default for OutreachConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            provider: default_provider(),
            model: default_model(),
            pre_prompt: String::new(),
            sending: SendingLimits::default(),
            templates: Templates::default(),
            channel: ChannelSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl OutreachConfig {
    /// Load config from the default path (~/.outreach/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::OutreachError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::OutreachError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::OutreachError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".outreach")
            .join("config.toml")
    }

    /// Get the Outreach home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".outreach")
    }
}

/// Sending limits — the anti-throttling policy knobs.
///
/// The defaults are deliberately conservative: WhatsApp bans accounts that
/// blast messages, so the pacing matters more than throughput.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendingLimits {
    /// Maximum successful sends per calendar day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    /// Maximum contacts dispatched in one batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Lower bound of the randomized inter-message delay.
    #[serde(default = "default_min_delay")]
    pub min_delay_secs: u64,
    /// Upper bound of the randomized inter-message delay.
    #[serde(default = "default_max_delay")]
    pub max_delay_secs: u64,
    /// Pause between batches.
    #[serde(default = "default_batch_cooldown")]
    pub batch_cooldown_secs: u64,
    /// Delay before the first batch of an automatic campaign.
    #[serde(default = "default_start_delay")]
    pub start_delay_secs: u64,
    /// Hard cap on stored contacts.
    #[serde(default = "default_max_contacts")]
    pub max_contacts: usize,
}

fn default_daily_limit() -> u32 { 100 }
fn default_batch_size() -> usize { 20 }
fn default_min_delay() -> u64 { 5 }
fn default_max_delay() -> u64 { 10 }
fn default_batch_cooldown() -> u64 { 900 }
fn default_start_delay() -> u64 { 10 }
fn default_max_contacts() -> usize { 1000 }

impl Default for SendingLimits {
    fn default() -> Self {
        Self {
            daily_limit: default_daily_limit(),
            batch_size: default_batch_size(),
            min_delay_secs: default_min_delay(),
            max_delay_secs: default_max_delay(),
            batch_cooldown_secs: default_batch_cooldown(),
            start_delay_secs: default_start_delay(),
            max_contacts: default_max_contacts(),
        }
    }
}

/// Prepared campaign message templates, selectable with `!send` / `!send1..3`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Templates {
    #[serde(default = "default_primary_template")]
    pub primary: String,
    #[serde(default)]
    pub alt1: String,
    #[serde(default)]
    pub alt2: String,
    #[serde(default)]
    pub alt3: String,
}

fn default_primary_template() -> String {
    "Hello {OrganizationName}! We build business automation bots. Free consultation available.".into()
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            primary: default_primary_template(),
            alt1: String::new(),
            alt2: String::new(),
            alt3: String::new(),
        }
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelSettings {
    #[serde(default)]
    pub whatsapp: WhatsAppSettings,
}

/// WhatsApp Cloud API credentials and webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppSettings {
    /// Facebook Graph API access token.
    #[serde(default)]
    pub access_token: String,
    /// WhatsApp Phone Number ID.
    #[serde(default)]
    pub phone_number_id: String,
    /// Webhook verify token (for incoming messages).
    #[serde(default)]
    pub webhook_verify_token: String,
    /// Local port the webhook receiver binds to.
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,
    /// Phone address of the operator account. Only this sender may issue
    /// management commands.
    #[serde(default)]
    pub operator_number: String,
}

fn default_webhook_port() -> u16 { 8090 }

impl Default for WhatsAppSettings {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            webhook_verify_token: String::new(),
            webhook_port: default_webhook_port(),
            operator_number: String::new(),
        }
    }
}

/// Durable-state locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Directory holding contacts.json and stats.json.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Directory scanned by `!scan` for contact list files.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: String,
}

fn default_data_dir() -> String { "~/.outreach/data".into() }
fn default_uploads_dir() -> String { "~/.outreach/uploads".into() }

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

//! # Outreach Providers
//!
//! Text-completion backends for the `!ai` operator command. One provider
//! today: Google Gemini (`generateContent` API) with per-conversation
//! history.

pub mod gemini;

use outreach_core::config::OutreachConfig;
use outreach_core::error::{OutreachError, Result};
use outreach_core::traits::Provider;

/// Create a provider from configuration.
pub fn create_provider(config: &OutreachConfig) -> Result<Box<dyn Provider>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(gemini::GeminiProvider::new(config))),
        other => Err(OutreachError::ProviderNotFound(other.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_gemini_provider() {
        let config = OutreachConfig::default();
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.name(), "gemini");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = OutreachConfig { provider: "openai".into(), ..OutreachConfig::default() };
        assert!(matches!(
            create_provider(&config),
            Err(OutreachError::ProviderNotFound(_))
        ));
    }
}

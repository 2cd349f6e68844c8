//! Trait boundaries between the core logic and its external collaborators.
//!
//! The campaign engine and the bot loop only ever see these traits: the
//! underlying session library can change without touching either.

use async_trait::async_trait;
use futures::stream::Stream;

use crate::error::Result;
use crate::types::IncomingMessage;

/// A messaging platform connection.
///
/// Exactly the surface the campaign core needs: deliver a text, ask whether
/// an address is registered on the platform, and subscribe to inbound
/// messages.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Subscribe to inbound messages.
    async fn listen(&self) -> Result<Box<dyn Stream<Item = IncomingMessage> + Send + Unpin>>;

    /// Send a plain text message to a phone address (`+`-prefixed E.164).
    async fn send_text(&self, to: &str, body: &str) -> Result<()>;

    /// Check whether a phone address is registered on the platform.
    async fn exists_on_network(&self, phone: &str) -> Result<bool>;
}

/// A text-completion backend for the `!ai` command.
///
/// Implementations keep per-conversation history keyed by `conversation_key`
/// so follow-up prompts stay in context.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, conversation_key: &str) -> Result<String>;

    /// Drop the stored history for one conversation.
    async fn reset(&self, conversation_key: &str);
}

//! # Outreach Core
//!
//! Shared foundation for the Outreach bot: configuration, the error type,
//! message types, and the trait boundaries the rest of the workspace builds
//! against (`Transport` for the messaging platform, `Provider` for the AI
//! completion backend).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::OutreachConfig;
pub use error::{OutreachError, Result};
pub use traits::{Provider, Transport};
pub use types::{IncomingMessage, OutgoingMessage, ThreadType};

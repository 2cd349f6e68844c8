//! # Outreach Channels
//! Messaging transport implementations.
//!
//! One transport today: the WhatsApp Business Cloud API. The campaign core
//! only sees the `Transport` trait, so an unofficial-session backend can be
//! swapped in without touching it.

pub mod whatsapp;

pub use whatsapp::{WhatsAppChannel, WhatsAppConfig};

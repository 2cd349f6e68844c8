//! # Outreach Campaign
//!
//! The campaign core: everything between an operator command and a paced,
//! resumable mass send.
//!
//! ## Architecture
//! ```text
//! CampaignEngine (one tokio task per campaign)
//!   ├── ContactStore: durable contact records + delivery state
//!   ├── SendingStats: daily/total counters (lazy day rollover)
//!   ├── limits::can_send: daily quota + batch cooldown gate
//!   ├── personalize::render: per-contact template substitution
//!   └── Transport (trait): existence check + text delivery
//! ```
//!
//! State is two JSON documents (contacts.json, stats.json) written through on
//! every mutation. A stopped campaign resumes without duplicate sends because
//! every attempted contact carries a `last_sent` marker and resume-mode
//! eligibility skips marked contacts.

pub mod contact;
pub mod engine;
pub mod limits;
pub mod personalize;
pub mod stats;
pub mod store;

pub use contact::{Contact, ContactStatus};
pub use engine::{
    BatchOutcome, CampaignEngine, CampaignPlan, CampaignState, CampaignStatus, StartError,
};
pub use limits::{can_send, DenyReason, SendVerdict};
pub use personalize::render;
pub use stats::SendingStats;
pub use store::{AddError, ContactStore, ImportReport};

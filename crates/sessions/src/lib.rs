//! Session management for the gateway.
//!
//! UUID-keyed sessions with gateway-owned sidecar metadata and
//! append-only JSONL transcripts. Created on demand; never deleted by
//! the core, only mutated by appending.

pub mod store;
pub mod transcript;

pub use store::{SessionMeta, SessionStore};
pub use transcript::{TranscriptLine, TranscriptWriter};

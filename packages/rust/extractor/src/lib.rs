//! Page content extraction for Markfold.
//!
//! This crate provides:
//! - [`page`]: HTML → [`ContentSnapshot`](markfold_shared::ContentSnapshot) extraction
//! - [`bus`]: correlated one-shot messaging with self-removing listeners
//! - [`agent`]: the [`ExtractionAgent`] trait and the HTTP-fetching agent

pub mod agent;
pub mod bus;
pub mod page;

pub use agent::{EXTRACTION_FAILED, ExtractionAgent, HttpExtractionAgent};
pub use bus::{ExtractionMessage, MessageBus, RequestId, Subscription};
pub use page::extract_snapshot;

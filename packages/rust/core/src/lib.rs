//! Classification and filing logic for Markfold.
//!
//! This crate ties the folder store, page extraction, and the remote
//! classifier together:
//! - [`taxonomy`]: category tree derived from the folder hierarchy
//! - [`snapshot`]: page snapshots with a single-entry cache and deadline
//! - [`prompt`]: deterministic classification prompt
//! - [`classifier`]: OpenAI-compatible chat-completion client
//! - [`resolver`]: category path → folder id, creating missing folders
//! - [`orchestrator`]: per-request sequencing and the request surface

pub mod classifier;
pub mod orchestrator;
pub mod prompt;
pub mod resolver;
pub mod snapshot;
pub mod taxonomy;

pub use classifier::ClassifierClient;
pub use orchestrator::{
    Classification, Orchestrator, PageSource, Payload, Request, Response, SavedBookmark,
    StaticPageSource,
};
pub use prompt::{compose_prompt, prompt_fingerprint};
pub use resolver::PathResolver;
pub use snapshot::{ContentSnapshotCache, SnapshotCache};
pub use taxonomy::{build_taxonomy, flatten_folders};

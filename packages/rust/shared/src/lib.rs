//! Shared types, error model, configuration, and the folder-store contract
//! for Markfold.
//!
//! This crate is the foundation depended on by all other Markfold crates.
//! It provides:
//! - [`MarkfoldError`]: the unified error type
//! - Domain types ([`FolderNode`], [`CategoryTree`], [`ContentSnapshot`], [`CategoryPath`])
//! - Configuration ([`AppConfig`], [`ClassifierSettings`], config loading)
//! - [`FolderStore`]: the bookmark hierarchy interface

pub mod config;
pub mod error;
pub mod store;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, ClassifierSettings, DEFAULT_API_BASE_URL, DEFAULT_MODEL,
    LibraryConfig, SnapshotConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from,
};
pub use error::{MarkfoldError, Result};
pub use store::FolderStore;
pub use types::{
    CategoryPath, CategoryTree, ContentSnapshot, FolderId, FolderNode, FolderPathEntry,
    FolderResolution, NewNode, NodeQuery, OTHER_FOLDER_ID, PATH_SEPARATOR, PageMetadata, PageRef,
    SYNTHETIC_ROOT_ID, TOOLBAR_FOLDER_ID,
};

//! The folder-store contract consumed by taxonomy building and path resolution.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FolderNode, NewNode, NodeQuery};

/// Read/write access to an external bookmark hierarchy.
#[async_trait]
pub trait FolderStore: Send + Sync {
    /// The full forest: a single synthetic root whose children are the
    /// top-level containers.
    async fn get_tree(&self) -> Result<Vec<FolderNode>>;

    /// Nodes matching the query, without their children.
    async fn search(&self, query: &NodeQuery) -> Result<Vec<FolderNode>>;

    /// Create a folder (no URL) or bookmark under `node.parent_id`.
    async fn create(&self, node: &NewNode) -> Result<FolderNode>;
}

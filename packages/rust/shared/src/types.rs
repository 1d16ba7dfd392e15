//! Core domain types for Markfold: folder trees, category taxonomies,
//! content snapshots, and category paths.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator between segments of a category path.
pub const PATH_SEPARATOR: char = '/';

/// Id of the synthetic root node of every folder tree.
pub const SYNTHETIC_ROOT_ID: &str = "0";

/// Id of the default toolbar container ("Bookmarks Bar").
pub const TOOLBAR_FOLDER_ID: &str = "1";

/// Id of the secondary default container ("Other Bookmarks").
pub const OTHER_FOLDER_ID: &str = "2";

// ---------------------------------------------------------------------------
// FolderId
// ---------------------------------------------------------------------------

/// Identifier of a node in the folder store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(pub String);

impl FolderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FolderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// FolderNode
// ---------------------------------------------------------------------------

/// A node of the bookmark hierarchy: either a folder or a leaf bookmark.
///
/// Leaf bookmarks carry a URL and never have children; folders never carry a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderNode {
    pub id: FolderId,
    pub title: String,
    /// `None` only for the synthetic root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FolderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_added: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    /// Build a folder node with no children.
    pub fn folder(id: impl Into<FolderId>, parent_id: Option<FolderId>, title: &str) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            parent_id,
            url: None,
            date_added: None,
            children: Vec::new(),
        }
    }

    /// Build a leaf bookmark node.
    pub fn bookmark(id: impl Into<FolderId>, parent_id: FolderId, title: &str, url: &str) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            parent_id: Some(parent_id),
            url: Some(url.to_string()),
            date_added: None,
            children: Vec::new(),
        }
    }

    /// Attach children (builder style, mostly for fixtures).
    pub fn with_children(mut self, children: Vec<FolderNode>) -> Self {
        self.children = children;
        self
    }

    /// Whether this node is a leaf bookmark (carries a URL).
    pub fn is_leaf_bookmark(&self) -> bool {
        self.url.is_some()
    }

    /// Whether this node is a folder.
    pub fn is_folder(&self) -> bool {
        self.url.is_none()
    }
}

/// Parameters for creating a node in the folder store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNode {
    pub parent_id: FolderId,
    pub title: String,
    /// `None` creates a folder, `Some` a bookmark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Search criteria for folder-store lookups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeQuery {
    /// Exact title match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl NodeQuery {
    pub fn title(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// CategoryTree
// ---------------------------------------------------------------------------

/// Nested mapping of folder titles, the taxonomy shown to the classifier.
///
/// An empty mapping is a leaf category. Keys are ordered so the JSON form is
/// stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTree(pub BTreeMap<String, CategoryTree>);

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Sub-tree for a direct child title.
    pub fn get(&self, title: &str) -> Option<&CategoryTree> {
        self.0.get(title)
    }

    /// Sub-tree for a direct child title, inserting an empty one if absent.
    pub fn entry(&mut self, title: &str) -> &mut CategoryTree {
        self.0.entry(title.to_string()).or_default()
    }

    /// Whether the nested path of titles exists in the tree.
    pub fn contains_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        let mut level = self;
        for segment in path {
            match level.get(segment.as_ref()) {
                Some(next) => level = next,
                None => return false,
            }
        }
        true
    }

    /// Total number of categories at every depth.
    pub fn count(&self) -> usize {
        self.0.values().map(|child| 1 + child.count()).sum()
    }
}

// ---------------------------------------------------------------------------
// ContentSnapshot
// ---------------------------------------------------------------------------

/// Metadata read from a page's `<head>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub author: String,
    /// Open Graph properties with the `og:` prefix stripped.
    #[serde(default)]
    pub og_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub canonical_url: String,
}

/// Bounded representation of a page's content, keyed by `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSnapshot {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub metadata: PageMetadata,
    #[serde(default)]
    pub headings: Vec<String>,
    /// At most [`ContentSnapshot::MAX_PARAGRAPHS`] entries.
    #[serde(default)]
    pub paragraphs: Vec<String>,
    /// At most [`ContentSnapshot::MAX_TEXT_CHARS`] characters.
    #[serde(default)]
    pub text: String,
    /// Set when extraction failed inside the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ContentSnapshot {
    pub const MAX_PARAGRAPHS: usize = 10;
    pub const MAX_TEXT_CHARS: usize = 5000;

    /// A snapshot reporting an extraction failure; keeps `url` and `title`.
    pub fn failed(url: &str, title: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            title: title.to_string(),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    /// Whether the snapshot carries content a classifier can use.
    pub fn is_usable(&self) -> bool {
        self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// CategoryPath
// ---------------------------------------------------------------------------

/// Normalized category path: non-empty trimmed segments, root alias removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryPath(Vec<String>);

impl CategoryPath {
    /// Build from raw segments, trimming each and dropping empty ones.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            segments
                .into_iter()
                .map(|s| s.as_ref().trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl std::fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_SEPARATOR}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

/// Outcome of resolving a category path against the folder store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderResolution {
    /// Deepest folder of the path; exists after resolution.
    pub id: FolderId,
    /// Number of folders created while resolving.
    pub created: usize,
}

// ---------------------------------------------------------------------------
// Pages and folder listings
// ---------------------------------------------------------------------------

/// Identity of the page being classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    /// Opaque page handle (tab id, request id, ...).
    pub id: String,
    pub title: String,
    pub url: String,
}

/// A folder with its slash path below the root containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPathEntry {
    pub id: FolderId,
    pub path: String,
}

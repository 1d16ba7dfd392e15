//! Request orchestration: classify the active page and file bookmarks.
//!
//! Every request runs one linear sequence of stages. The first failing stage
//! ends the request with a single error, which [`Orchestrator::handle`] logs
//! once and returns as an error response.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, instrument};
use url::Url;

use markfold_shared::{
    ClassifierSettings, FolderNode, FolderPathEntry, FolderStore, MarkfoldError, NewNode, PageRef,
    Result,
};

use crate::classifier::ClassifierClient;
use crate::prompt::{compose_prompt, prompt_fingerprint};
use crate::resolver::PathResolver;
use crate::snapshot::{ContentSnapshotCache, SnapshotCache};
use crate::taxonomy::{build_taxonomy, flatten_folders, folder_path_exists};

/// Source of the page the user is currently looking at.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn active_page(&self) -> Result<PageRef>;
}

/// A page source that always yields the same page.
#[derive(Debug, Clone)]
pub struct StaticPageSource(pub PageRef);

#[async_trait]
impl PageSource for StaticPageSource {
    async fn active_page(&self) -> Result<PageRef> {
        Ok(self.0.clone())
    }
}

/// Suggested category for a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub page: PageRef,
    /// The classifier's answer as returned.
    pub raw_path: String,
    /// Normalized path for display and saving.
    pub category_path: String,
    /// Whether saving under `category_path` would create folders.
    pub is_new_category: bool,
    /// Whether page content was included in the prompt.
    pub used_snapshot: bool,
}

/// A bookmark filed by [`Orchestrator::save_bookmark`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedBookmark {
    pub bookmark: FolderNode,
    pub category: String,
    pub folders_created: usize,
}

/// Inbound requests, one per user action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    GetAiClassification,
    #[serde(rename_all = "camelCase")]
    SaveBookmark {
        #[serde(default)]
        title: String,
        #[serde(default)]
        url: String,
        #[serde(default)]
        category_path: String,
    },
    GetBookmarkTree,
}

/// Successful response bodies, flattened next to `"status": "success"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload {
    Classification {
        #[serde(rename = "categoryPath")]
        category_path: String,
        #[serde(rename = "isNewCategory")]
        is_new_category: bool,
        tab: PageRef,
    },
    Tree {
        tree: Vec<FolderNode>,
        folders: Vec<FolderPathEntry>,
    },
    Saved {
        category: String,
        #[serde(rename = "bookmarkId")]
        bookmark_id: String,
    },
}

/// Outbound response, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Response {
    Success {
        #[serde(flatten)]
        payload: Payload,
    },
    Error {
        message: String,
    },
}

/// Owns the collaborators and the last-seen snapshot entry.
pub struct Orchestrator {
    store: Arc<dyn FolderStore>,
    pages: Arc<dyn PageSource>,
    snapshots: ContentSnapshotCache,
    cache: Mutex<SnapshotCache>,
    classifier: ClassifierClient,
    settings: ClassifierSettings,
    resolver: PathResolver,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn FolderStore>,
        pages: Arc<dyn PageSource>,
        snapshots: ContentSnapshotCache,
        classifier: ClassifierClient,
        settings: ClassifierSettings,
        resolver: PathResolver,
    ) -> Self {
        Self {
            store,
            pages,
            snapshots,
            cache: Mutex::new(SnapshotCache::new()),
            classifier,
            settings,
            resolver,
        }
    }

    /// Suggest a category path for the active page.
    #[instrument(skip_all)]
    pub async fn classify_active_page(&self) -> Result<Classification> {
        self.settings.validate()?;

        let (page, tree) = tokio::join!(self.pages.active_page(), self.store.get_tree());
        let page = page?;
        let tree = tree?;

        ensure_web_page(&page.url)?;

        let snapshot = {
            let mut cache = self.cache.lock().await;
            self.snapshots.get_snapshot(&mut cache, &page, &page.url).await
        };
        let used_snapshot = snapshot.as_ref().is_some_and(|s| s.is_usable());

        let taxonomy = build_taxonomy(&tree);
        let prompt = compose_prompt(&page.title, &page.url, &taxonomy, snapshot.as_ref());
        info!(
            url = %page.url,
            categories = taxonomy.count(),
            used_snapshot,
            prompt = %prompt_fingerprint(&prompt),
            "classifying page"
        );

        let raw_path = self
            .classifier
            .classify(&page.title, &prompt, &self.settings)
            .await?;

        let normalized = self.resolver.normalize(&raw_path);
        let category_path = normalized.to_string();
        let is_new_category =
            !folder_path_exists(&tree, self.resolver.root_id(), normalized.segments());

        info!(%raw_path, %category_path, is_new_category, "classification ready");
        Ok(Classification {
            page,
            raw_path,
            category_path,
            is_new_category,
            used_snapshot,
        })
    }

    /// File `url` under `category_path`, creating missing folders.
    #[instrument(skip_all, fields(url = %url, category = %category_path))]
    pub async fn save_bookmark(
        &self,
        title: &str,
        url: &str,
        category_path: &str,
    ) -> Result<SavedBookmark> {
        if title.trim().is_empty() || url.trim().is_empty() || category_path.trim().is_empty() {
            return Err(MarkfoldError::validation(
                "Missing parameters for saving bookmark.",
            ));
        }

        let folder = self.resolver.resolve_or_create(category_path).await?;
        let bookmark = self
            .store
            .create(&NewNode {
                parent_id: folder.id.clone(),
                title: title.to_string(),
                url: Some(url.to_string()),
            })
            .await?;

        info!(
            id = %bookmark.id,
            folder = %folder.id,
            folders_created = folder.created,
            "bookmark saved"
        );
        Ok(SavedBookmark {
            bookmark,
            category: category_path.to_string(),
            folders_created: folder.created,
        })
    }

    /// The raw folder forest and its flattened folder listing.
    pub async fn bookmark_tree(&self) -> Result<(Vec<FolderNode>, Vec<FolderPathEntry>)> {
        let tree = self.store.get_tree().await?;
        let folders = flatten_folders(&tree);
        Ok((tree, folders))
    }

    /// Run one request, turning any failure into an error response.
    pub async fn handle(&self, request: Request) -> Response {
        let result = match request {
            Request::GetAiClassification => {
                self.classify_active_page().await.map(|c| Payload::Classification {
                    category_path: c.category_path,
                    is_new_category: c.is_new_category,
                    tab: c.page,
                })
            }
            Request::SaveBookmark {
                title,
                url,
                category_path,
            } => self
                .save_bookmark(&title, &url, &category_path)
                .await
                .map(|saved| Payload::Saved {
                    category: saved.category,
                    bookmark_id: saved.bookmark.id.to_string(),
                }),
            Request::GetBookmarkTree => self
                .bookmark_tree()
                .await
                .map(|(tree, folders)| Payload::Tree { tree, folders }),
        };

        match result {
            Ok(payload) => Response::Success { payload },
            Err(e) => {
                error!(error = %e, "request failed");
                Response::Error {
                    message: e.to_string(),
                }
            }
        }
    }
}

/// Only http(s) pages can be classified and bookmarked.
fn ensure_web_page(url: &str) -> Result<()> {
    let parsed = Url::parse(url)
        .map_err(|e| MarkfoldError::validation(format!("invalid page URL {url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(MarkfoldError::validation(format!(
            "cannot bookmark {scheme}: pages"
        ))),
    }
}

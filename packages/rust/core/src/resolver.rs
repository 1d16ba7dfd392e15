//! Category path → folder id resolution with create-if-absent semantics.
//!
//! Segments are resolved strictly left to right, each one as a direct child
//! of the previous. Resolving an already existing path creates nothing.
//! Folders created before a store failure are left in place.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use markfold_shared::{
    CategoryPath, FolderId, FolderResolution, FolderStore, MarkfoldError, NewNode, NodeQuery,
    PATH_SEPARATOR, Result,
};

/// Resolves category paths below a configured root folder.
#[derive(Clone)]
pub struct PathResolver {
    store: Arc<dyn FolderStore>,
    root_id: FolderId,
    aliases: Vec<String>,
}

impl PathResolver {
    /// `aliases` are display names of the root folder that may prefix a path.
    pub fn new(store: Arc<dyn FolderStore>, root_id: FolderId, aliases: Vec<String>) -> Self {
        Self {
            store,
            root_id,
            aliases,
        }
    }

    pub fn root_id(&self) -> &FolderId {
        &self.root_id
    }

    /// Normalize a raw classifier answer into path segments.
    ///
    /// Trims, strips one pair of wrapping quotes or backticks, then strips a
    /// leading root alias (`"Bookmarks Bar/Tech"` → `Tech`; a bare alias is the
    /// root itself).
    pub fn normalize(&self, raw: &str) -> CategoryPath {
        let mut path = strip_wrapping_quotes(raw.trim()).trim();

        for alias in &self.aliases {
            if path == alias {
                return CategoryPath::default();
            }
            if let Some(rest) = path
                .strip_prefix(alias.as_str())
                .and_then(|r| r.strip_prefix(PATH_SEPARATOR))
            {
                path = rest;
                break;
            }
        }

        CategoryPath::from_segments(path.split(PATH_SEPARATOR))
    }

    /// Resolve `raw_path` to the id of its deepest folder, creating any
    /// missing segments.
    #[instrument(skip_all, fields(path = %raw_path))]
    pub async fn resolve_or_create(&self, raw_path: &str) -> Result<FolderResolution> {
        let path = self.normalize(raw_path);
        let mut parent = self.root_id.clone();
        let mut created = 0;

        for segment in path.segments() {
            let candidates = self
                .store
                .search(&NodeQuery::title(segment))
                .await
                .map_err(resolution_error)?;

            let existing = candidates
                .into_iter()
                .find(|n| n.is_folder() && n.parent_id.as_ref() == Some(&parent));

            parent = match existing {
                Some(folder) => {
                    debug!(%segment, id = %folder.id, "segment exists");
                    folder.id
                }
                None => {
                    let folder = self
                        .store
                        .create(&NewNode {
                            parent_id: parent.clone(),
                            title: segment.clone(),
                            url: None,
                        })
                        .await
                        .map_err(resolution_error)?;
                    info!(%segment, id = %folder.id, parent = %parent, "created category folder");
                    created += 1;
                    folder.id
                }
            };
        }

        Ok(FolderResolution {
            id: parent,
            created,
        })
    }
}

fn resolution_error(e: MarkfoldError) -> MarkfoldError {
    match e {
        MarkfoldError::FolderResolution(_) => e,
        other => MarkfoldError::FolderResolution(other.to_string()),
    }
}

fn strip_wrapping_quotes(s: &str) -> &str {
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = s
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use markfold_shared::{FolderNode, TOOLBAR_FOLDER_ID};
    use markfold_storage::BookmarkStore;
    use uuid::Uuid;

    async fn test_store() -> Arc<BookmarkStore> {
        let tmp = std::env::temp_dir().join(format!("mf_resolver_{}.db", Uuid::now_v7()));
        Arc::new(BookmarkStore::open(&tmp).await.expect("open test db"))
    }

    fn resolver(store: Arc<dyn FolderStore>) -> PathResolver {
        PathResolver::new(
            store,
            FolderId::from(TOOLBAR_FOLDER_ID),
            vec!["Bookmarks Bar".into(), "书签栏".into()],
        )
    }

    fn segments(path: &CategoryPath) -> Vec<&str> {
        path.segments().iter().map(String::as_str).collect()
    }

    #[test]
    fn normalize_strips_quotes_aliases_and_blanks() {
        let store: Arc<dyn FolderStore> = Arc::new(FailingStore::default());
        let r = resolver(store);

        assert_eq!(segments(&r.normalize("  Tech / Backend ")), ["Tech", "Backend"]);
        assert_eq!(segments(&r.normalize("\"Tech/Backend\"")), ["Tech", "Backend"]);
        assert_eq!(segments(&r.normalize("`Tech`")), ["Tech"]);
        assert_eq!(segments(&r.normalize("Bookmarks Bar/Tech")), ["Tech"]);
        assert_eq!(segments(&r.normalize("书签栏/技术/后端")), ["技术", "后端"]);
        assert_eq!(segments(&r.normalize("Tech//Backend/")), ["Tech", "Backend"]);
        assert!(r.normalize("Bookmarks Bar").is_empty());
        assert!(r.normalize("   ").is_empty());
        // Only a leading alias is stripped.
        assert_eq!(
            segments(&r.normalize("Tech/Bookmarks Bar")),
            ["Tech", "Bookmarks Bar"]
        );
        assert_eq!(segments(&r.normalize("Bookmarks Barn/X")), ["Bookmarks Barn", "X"]);
    }

    #[tokio::test]
    async fn creates_missing_chain_then_is_idempotent() {
        let store = test_store().await;
        let r = resolver(store.clone());
        let before = store.count_folders().await.unwrap();

        let first = r.resolve_or_create("Tech/Backend").await.unwrap();
        assert_eq!(first.created, 2);
        assert_eq!(store.count_folders().await.unwrap(), before + 2);

        let backend = store.get_node(&first.id).await.unwrap().unwrap();
        assert_eq!(backend.title, "Backend");
        let tech = store
            .get_node(backend.parent_id.as_ref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tech.title, "Tech");
        assert_eq!(tech.parent_id, Some(FolderId::from(TOOLBAR_FOLDER_ID)));

        let second = r.resolve_or_create("Tech/Backend").await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created, 0);
        assert_eq!(store.count_folders().await.unwrap(), before + 2);
    }

    #[tokio::test]
    async fn alias_prefix_resolves_to_same_folder() {
        let store = test_store().await;
        let r = resolver(store.clone());

        let plain = r.resolve_or_create("Reading/Rust").await.unwrap();
        let aliased = r.resolve_or_create("Bookmarks Bar/Reading/Rust").await.unwrap();
        let quoted = r.resolve_or_create("\"书签栏/Reading/Rust\"").await.unwrap();
        assert_eq!(plain.id, aliased.id);
        assert_eq!(plain.id, quoted.id);
        assert_eq!(aliased.created + quoted.created, 0);
    }

    #[tokio::test]
    async fn empty_path_resolves_to_root() {
        let store = test_store().await;
        let r = resolver(store.clone());
        let res = r.resolve_or_create("Bookmarks Bar").await.unwrap();
        assert_eq!(res.id.as_str(), TOOLBAR_FOLDER_ID);
        assert_eq!(res.created, 0);
    }

    #[tokio::test]
    async fn same_titled_folders_resolve_under_their_own_parent() {
        let store = test_store().await;
        let r = resolver(store.clone());

        let rust_docs = r.resolve_or_create("Rust/Docs").await.unwrap();
        let go_docs = r.resolve_or_create("Go/Docs").await.unwrap();
        assert_ne!(rust_docs.id, go_docs.id);
        assert_eq!(go_docs.created, 2);

        let again = r.resolve_or_create("Go/Docs").await.unwrap();
        assert_eq!(again.id, go_docs.id);
        assert_eq!(again.created, 0);
    }

    #[tokio::test]
    async fn bookmark_with_segment_title_is_not_a_candidate() {
        let store = test_store().await;
        store
            .create(&NewNode {
                parent_id: FolderId::from(TOOLBAR_FOLDER_ID),
                title: "News".into(),
                url: Some("https://news.example".into()),
            })
            .await
            .unwrap();

        let res = resolver(store.clone()).resolve_or_create("News").await.unwrap();
        assert_eq!(res.created, 1);
        let folder = store.get_node(&res.id).await.unwrap().unwrap();
        assert!(folder.is_folder());
    }

    /// Delegates to a real store but fails creation after `allow` folders.
    #[derive(Default)]
    struct FailingStore {
        inner: Option<Arc<BookmarkStore>>,
        allow: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl FolderStore for FailingStore {
        async fn get_tree(&self) -> Result<Vec<FolderNode>> {
            match &self.inner {
                Some(s) => s.get_tree().await,
                None => Ok(Vec::new()),
            }
        }

        async fn search(&self, query: &NodeQuery) -> Result<Vec<FolderNode>> {
            match &self.inner {
                Some(s) => s.search(query).await,
                None => Err(MarkfoldError::Storage("store unavailable".into())),
            }
        }

        async fn create(&self, node: &NewNode) -> Result<FolderNode> {
            use std::sync::atomic::Ordering;
            let remaining = self.allow.load(Ordering::SeqCst);
            match &self.inner {
                Some(s) if remaining > 0 => {
                    self.allow.store(remaining - 1, Ordering::SeqCst);
                    s.create(node).await
                }
                _ => Err(MarkfoldError::Storage("disk full".into())),
            }
        }
    }

    #[tokio::test]
    async fn store_failure_aborts_and_keeps_created_ancestors() {
        let store = test_store().await;
        let failing = Arc::new(FailingStore {
            inner: Some(store.clone()),
            allow: 1.into(),
        });
        let before = store.count_folders().await.unwrap();

        let err = resolver(failing)
            .resolve_or_create("Tech/Backend/Axum")
            .await
            .unwrap_err();
        assert!(matches!(err, MarkfoldError::FolderResolution(_)));
        assert!(err.to_string().contains("disk full"));

        // "Tech" was created before the failure and stays.
        assert_eq!(store.count_folders().await.unwrap(), before + 1);
        let retry = resolver(store.clone())
            .resolve_or_create("Tech/Backend/Axum")
            .await
            .unwrap();
        assert_eq!(retry.created, 2);
    }

    #[tokio::test]
    async fn search_failure_is_a_resolution_error() {
        let err = resolver(Arc::new(FailingStore::default()))
            .resolve_or_create("Tech")
            .await
            .unwrap_err();
        assert!(matches!(err, MarkfoldError::FolderResolution(_)));
    }
}

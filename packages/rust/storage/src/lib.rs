//! libSQL-backed bookmark store (offline mode).
//!
//! [`BookmarkStore`] keeps the folder/bookmark hierarchy in a single `nodes`
//! table and implements [`FolderStore`] for the classification core. The
//! database is seeded with a synthetic root (`"0"`) and the two default
//! containers, "Bookmarks Bar" (`"1"`) and "Other Bookmarks" (`"2"`).
//!
//! **Access rules:**
//! - CLI save/classify: read-write via [`BookmarkStore::open`]
//! - Listing commands: read-only via [`BookmarkStore::open_readonly`]

mod migrations;

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tracing::{debug, info};
use uuid::Uuid;

use markfold_shared::{
    FolderId, FolderNode, FolderStore, MarkfoldError, NewNode, NodeQuery, Result,
};

const NODE_COLUMNS: &str = "id, parent_id, title, url, date_added";

/// Primary storage handle wrapping a libSQL database.
pub struct BookmarkStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl BookmarkStore {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MarkfoldError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        let store = Self {
            db,
            conn,
            readonly: false,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        MarkfoldError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(MarkfoldError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Node queries
    // -----------------------------------------------------------------------

    /// Get a single node (without children) by id.
    pub async fn get_node(&self, id: &FolderId) -> Result<Option<FolderNode>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"),
                params![id.as_str()],
            )
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_node(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(MarkfoldError::Storage(e.to_string())),
        }
    }

    /// Direct children of `parent_id`, in position order.
    pub async fn children(&self, parent_id: &FolderId) -> Result<Vec<FolderNode>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id = ?1 ORDER BY position, rowid"
                ),
                params![parent_id.as_str()],
            )
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;
        collect_nodes(rows).await
    }

    /// Number of folders, including the root and the default containers.
    pub async fn count_folders(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM nodes WHERE url IS NULL", params![])
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row
                .get::<i64>(0)
                .map_err(|e| MarkfoldError::Storage(e.to_string()))?
                as usize),
            Ok(None) => Ok(0),
            Err(e) => Err(MarkfoldError::Storage(e.to_string())),
        }
    }

    /// Next free sibling position under `parent_id`.
    async fn next_position(&self, parent_id: &FolderId) -> Result<i64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COALESCE(MAX(position) + 1, 0) FROM nodes WHERE parent_id = ?1",
                params![parent_id.as_str()],
            )
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| MarkfoldError::Storage(e.to_string())),
            Ok(None) => Ok(0),
            Err(e) => Err(MarkfoldError::Storage(e.to_string())),
        }
    }
}

#[async_trait]
impl FolderStore for BookmarkStore {
    async fn get_tree(&self) -> Result<Vec<FolderNode>> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {NODE_COLUMNS} FROM nodes ORDER BY position, rowid"),
                params![],
            )
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        let nodes = collect_nodes(rows).await?;
        Ok(assemble_tree(nodes))
    }

    async fn search(&self, query: &NodeQuery) -> Result<Vec<FolderNode>> {
        let Some(title) = query.title.as_deref() else {
            return Ok(Vec::new());
        };

        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {NODE_COLUMNS} FROM nodes WHERE title = ?1 AND parent_id IS NOT NULL ORDER BY rowid"
                ),
                params![title],
            )
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        let found = collect_nodes(rows).await?;
        debug!(title, matches = found.len(), "searched nodes by title");
        Ok(found)
    }

    async fn create(&self, node: &NewNode) -> Result<FolderNode> {
        self.check_writable()?;

        match self.get_node(&node.parent_id).await? {
            Some(parent) if parent.is_folder() => {}
            Some(_) => {
                return Err(MarkfoldError::Storage(format!(
                    "parent {} is a bookmark, not a folder",
                    node.parent_id
                )));
            }
            None => {
                return Err(MarkfoldError::Storage(format!(
                    "parent folder {} does not exist",
                    node.parent_id
                )));
            }
        }

        let id = FolderId(Uuid::now_v7().to_string());
        let now = Utc::now();
        let position = self.next_position(&node.parent_id).await?;

        self.conn
            .execute(
                "INSERT INTO nodes (id, parent_id, title, url, position, date_added)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.as_str(),
                    node.parent_id.as_str(),
                    node.title.as_str(),
                    node.url.as_deref(),
                    position,
                    now.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?;

        info!(
            %id,
            parent = %node.parent_id,
            title = %node.title,
            bookmark = node.url.is_some(),
            "created node"
        );

        Ok(FolderNode {
            id,
            title: node.title.clone(),
            parent_id: Some(node.parent_id.clone()),
            url: node.url.clone(),
            date_added: Some(now),
            children: Vec::new(),
        })
    }
}

/// Drain a result set into nodes.
async fn collect_nodes(mut rows: libsql::Rows) -> Result<Vec<FolderNode>> {
    let mut results = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| MarkfoldError::Storage(e.to_string()))?
    {
        results.push(row_to_node(&row)?);
    }
    Ok(results)
}

/// Nest flat rows (already in sibling order) under their parents.
///
/// Returns the parentless nodes, normally just the synthetic root.
fn assemble_tree(nodes: Vec<FolderNode>) -> Vec<FolderNode> {
    let mut roots = Vec::new();
    let mut by_parent: HashMap<FolderId, Vec<FolderNode>> = HashMap::new();
    for node in nodes {
        match node.parent_id.clone() {
            Some(parent) => by_parent.entry(parent).or_default().push(node),
            None => roots.push(node),
        }
    }

    fn attach(node: &mut FolderNode, by_parent: &mut HashMap<FolderId, Vec<FolderNode>>) {
        if let Some(mut children) = by_parent.remove(&node.id) {
            for child in &mut children {
                attach(child, by_parent);
            }
            node.children = children;
        }
    }

    for root in &mut roots {
        attach(root, &mut by_parent);
    }
    roots
}

/// Convert a database row to a [`FolderNode`] without children.
fn row_to_node(row: &libsql::Row) -> Result<FolderNode> {
    Ok(FolderNode {
        id: FolderId(
            row.get::<String>(0)
                .map_err(|e| MarkfoldError::Storage(e.to_string()))?,
        ),
        parent_id: row.get::<String>(1).ok().map(FolderId),
        title: row
            .get::<String>(2)
            .map_err(|e| MarkfoldError::Storage(e.to_string()))?,
        url: row.get::<String>(3).ok(),
        date_added: row.get::<String>(4).ok().and_then(|s| {
            chrono::DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        }),
        children: Vec::new(),
    })
}

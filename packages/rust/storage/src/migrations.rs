//! SQL migration definitions for the Markfold bookmark database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: nodes tree with default containers",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Folders and bookmarks. A NULL url marks a folder.
CREATE TABLE IF NOT EXISTS nodes (
    id         TEXT PRIMARY KEY,
    parent_id  TEXT REFERENCES nodes(id),
    title      TEXT NOT NULL,
    url        TEXT,
    position   INTEGER NOT NULL DEFAULT 0,
    date_added TEXT
);

CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent_id);
CREATE INDEX IF NOT EXISTS idx_nodes_title ON nodes(title);

-- Synthetic root and the default top-level containers
INSERT OR IGNORE INTO nodes (id, parent_id, title, position) VALUES ('0', NULL, '', 0);
INSERT OR IGNORE INTO nodes (id, parent_id, title, position) VALUES ('1', '0', 'Bookmarks Bar', 0);
INSERT OR IGNORE INTO nodes (id, parent_id, title, position) VALUES ('2', '0', 'Other Bookmarks', 1);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}

/// Current schema version, stored in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 2;

/// Schema for the page-indexed manga cache (v2).
pub const SCHEMA: &str = r#"
-- One row per manga per page; data holds the serialized record
CREATE TABLE IF NOT EXISTS manga (
    id TEXT NOT NULL,
    page INTEGER NOT NULL,
    position INTEGER NOT NULL,
    title TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (page, id)
);

CREATE INDEX IF NOT EXISTS idx_manga_page ON manga(page, position);
CREATE INDEX IF NOT EXISTS idx_manga_id ON manga(id);

-- Last write of each page
CREATE TABLE IF NOT EXISTS page_meta (
    page INTEGER PRIMARY KEY,
    digest TEXT NOT NULL,
    item_count INTEGER NOT NULL,
    -- Page size the page was requested with; NULL when unknown (migrated)
    page_size INTEGER,
    cached_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Flat v1 layout: integer ids, one author, genres as a JSON array string.
pub const LEGACY_SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS mangas (
    id INTEGER PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    coverImage TEXT NOT NULL,
    author TEXT NOT NULL,
    genres TEXT NOT NULL,
    chapters INTEGER NOT NULL,
    status TEXT NOT NULL,
    rating REAL NOT NULL,
    page INTEGER NOT NULL
);
"#;

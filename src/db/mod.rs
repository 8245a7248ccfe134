pub mod schema;

use color_eyre::{eyre::eyre, Result};
use rusqlite::{Connection, OptionalExtension, Transaction};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cache::write_page;
use crate::manga::types::{LegacyManga, Manga};

/// Database connection wrapper for the manga cache
pub struct Database {
  conn: Connection,
}

impl Database {
  /// Open or create the database at `path`, or at the default location
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create database directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Open a private in-memory database
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  pub(crate) fn from_connection(conn: Connection) -> Result<Self> {
    let mut db = Self { conn };
    db.run_migrations()?;
    Ok(db)
  }

  /// Get the default database path
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("mangashelf").join("cache.db"))
  }

  /// Bring the database up to `schema::SCHEMA_VERSION`
  fn run_migrations(&mut self) -> Result<()> {
    let mut version: i64 = self
      .conn
      .pragma_query_value(None, "user_version", |row| row.get(0))
      .map_err(|e| eyre!("Failed to read schema version: {}", e))?;

    // Databases written before versioning carry the v1 table at version 0
    if version == 0 && self.has_table("mangas")? {
      version = 1;
    }

    if version > schema::SCHEMA_VERSION {
      return Err(eyre!(
        "Cache database has schema version {}, newer than supported version {}",
        version,
        schema::SCHEMA_VERSION
      ));
    }

    let tx = self
      .conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin migration: {}", e))?;

    tx.execute_batch(schema::SCHEMA)
      .map_err(|e| eyre!("Failed to run migrations: {}", e))?;

    if version == 1 {
      migrate_v1_to_v2(&tx)?;
    }

    tx.pragma_update(None, "user_version", schema::SCHEMA_VERSION)
      .map_err(|e| eyre!("Failed to set schema version: {}", e))?;
    tx.commit()
      .map_err(|e| eyre!("Failed to commit migration: {}", e))?;

    Ok(())
  }

  fn has_table(&self, name: &str) -> Result<bool> {
    let found: Option<String> = self
      .conn
      .query_row(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
        [name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to inspect schema: {}", e))?;
    Ok(found.is_some())
  }

  pub fn into_connection(self) -> Connection {
    self.conn
  }
}

/// Copy every v1 row through `LegacyManga -> Manga` into the v2 tables,
/// then drop the v1 table.
fn migrate_v1_to_v2(tx: &Transaction) -> Result<()> {
  let mut pages: BTreeMap<i64, Vec<Manga>> = BTreeMap::new();

  {
    let mut stmt = tx
      .prepare(
        "SELECT id, title, description, coverImage, author, genres, chapters, status, rating, page
         FROM mangas ORDER BY page, id",
      )
      .map_err(|e| eyre!("Failed to read legacy rows: {}", e))?;

    let rows = stmt
      .query_map([], |row| {
        let genres: String = row.get(5)?;
        let legacy = LegacyManga {
          id: row.get(0)?,
          title: row.get(1)?,
          description: row.get(2)?,
          cover_image: row.get(3)?,
          author: row.get(4)?,
          genres: serde_json::from_str(&genres).unwrap_or_default(),
          chapters: row.get(6)?,
          status: row.get(7)?,
          rating: row.get(8)?,
        };
        let page: i64 = row.get(9)?;
        Ok((page, legacy))
      })
      .map_err(|e| eyre!("Failed to read legacy rows: {}", e))?;

    for row in rows {
      match row {
        Ok((page, legacy)) => pages.entry(page).or_default().push(legacy.into()),
        Err(e) => warn!(error = %e, "skipping unreadable legacy row"),
      }
    }
  }

  let mut migrated = 0;
  for (page, items) in &pages {
    write_page(tx, *page, None, items)?;
    migrated += items.len();
  }

  tx.execute_batch("DROP TABLE mangas")
    .map_err(|e| eyre!("Failed to drop legacy table: {}", e))?;

  info!(migrated, pages = pages.len(), "migrated cache from schema v1");
  Ok(())
}

//! SQLite implementation of the page store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::traits::{PageStore, PageSummary, PageWrite, StoredManga};
use crate::db::Database;
use crate::manga::types::{Manga, MangaId};

/// SQLite-based page store.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open the cache at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    Ok(Self::from_database(Database::open(path)?))
  }

  /// Open a private in-memory cache.
  pub fn open_in_memory() -> Result<Self> {
    Ok(Self::from_database(Database::open_in_memory()?))
  }

  fn from_database(db: Database) -> Self {
    Self {
      conn: Mutex::new(db.into_connection()),
    }
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  fn query_items(conn: &Connection, sql: &str, page: Option<i64>) -> Result<Vec<Manga>> {
    let mut stmt = conn
      .prepare(sql)
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let rows: Vec<Vec<u8>> = match page {
      Some(page) => stmt.query_map(params![page], read_data),
      None => stmt.query_map([], read_data),
    }
    .map_err(|e| eyre!("Failed to query manga: {}", e))?
    .collect::<rusqlite::Result<_>>()
    .map_err(|e| eyre!("Failed to read manga row: {}", e))?;

    Ok(rows.iter().filter_map(|data| decode(data)).collect())
  }

  fn summary_query(conn: &Connection, page: Option<i64>) -> Result<Vec<PageSummary>> {
    let filter = if page.is_some() {
      "WHERE m.page = ?1"
    } else {
      ""
    };
    let sql = format!(
      "SELECT m.page, COUNT(*), pm.digest, pm.cached_at, pm.page_size,
              (SELECT f.title FROM manga f WHERE f.page = m.page ORDER BY f.position LIMIT 1)
       FROM manga m
       LEFT JOIN page_meta pm ON pm.page = m.page
       {}
       GROUP BY m.page
       ORDER BY m.page",
      filter
    );

    let mut stmt = conn
      .prepare(&sql)
      .map_err(|e| eyre!("Failed to prepare summary query: {}", e))?;

    let map_row = |row: &rusqlite::Row<'_>| {
      Ok((
        row.get::<_, i64>(0)?,
        row.get::<_, i64>(1)?,
        row.get::<_, Option<String>>(2)?,
        row.get::<_, Option<String>>(3)?,
        row.get::<_, Option<i64>>(4)?,
        row.get::<_, Option<String>>(5)?,
      ))
    };

    let rows: Vec<_> = match page {
      Some(page) => stmt.query_map(params![page], map_row),
      None => stmt.query_map([], map_row),
    }
    .map_err(|e| eyre!("Failed to query summaries: {}", e))?
    .collect::<rusqlite::Result<_>>()
    .map_err(|e| eyre!("Failed to read summary row: {}", e))?;

    rows
      .into_iter()
      .map(|(page, count, digest, cached_at, page_size, first_title)| {
        Ok(PageSummary {
          page,
          item_count: count as usize,
          page_size: page_size.map(|size| size as usize),
          digest,
          cached_at: cached_at.as_deref().map(parse_datetime).transpose()?,
          first_title,
        })
      })
      .collect()
  }
}

impl PageStore for SqliteStorage {
  fn upsert_many(&self, page: i64, items: &[Manga]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let next_position: i64 = tx
      .query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM manga WHERE page = ?",
        params![page],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to read page position: {}", e))?;

    for (offset, item) in items.iter().enumerate() {
      insert_row(&tx, page, next_position + offset as i64, item)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn replace_page(&self, page: i64, page_size: usize, items: &[Manga]) -> Result<PageWrite> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let write = write_page(&tx, page, Some(page_size), items)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    debug!(page, items = write.item_count, changed = write.changed, "replaced page");
    Ok(write)
  }

  fn get_page(&self, page: i64) -> Result<Vec<Manga>> {
    let conn = self.lock()?;
    Self::query_items(
      &conn,
      "SELECT data FROM manga WHERE page = ? ORDER BY position",
      Some(page),
    )
  }

  fn get_by_id(&self, id: &MangaId) -> Result<Option<StoredManga>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM manga WHERE id = ?
         ORDER BY cached_at DESC, page < 1, page LIMIT 1",
        params![id.as_str()],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query manga {}: {}", id, e))?;

    let Some((data, cached_at)) = row else {
      return Ok(None);
    };
    Ok(decode(&data).map(|manga| StoredManga {
      manga,
      cached_at: parse_datetime(&cached_at).ok(),
    }))
  }

  fn get_all(&self) -> Result<Vec<Manga>> {
    let conn = self.lock()?;
    // Numbered pages first, then the reserved ones (latest, detail)
    let items = Self::query_items(
      &conn,
      "SELECT data FROM manga ORDER BY page < 1, page, position",
      None,
    )?;

    let mut seen = HashSet::new();
    Ok(
      items
        .into_iter()
        .filter(|manga| seen.insert(manga.id.clone()))
        .collect(),
    )
  }

  fn delete_page(&self, page: i64) -> Result<usize> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let removed = tx
      .execute("DELETE FROM manga WHERE page = ?", params![page])
      .map_err(|e| eyre!("Failed to delete page {}: {}", page, e))?;
    tx.execute("DELETE FROM page_meta WHERE page = ?", params![page])
      .map_err(|e| eyre!("Failed to delete page summary {}: {}", page, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed)
  }

  fn max_page(&self) -> Result<Option<i64>> {
    let conn = self.lock()?;
    conn
      .query_row("SELECT MAX(page) FROM manga", [], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query max page: {}", e))
  }

  fn search(&self, query: &str) -> Result<Vec<Manga>> {
    // Matching happens in Rust: SQLite's LIKE only folds ASCII case
    Ok(
      self
        .get_all()?
        .into_iter()
        .filter(|manga| manga.matches(query))
        .collect(),
    )
  }

  fn page_summary(&self, page: i64) -> Result<Option<PageSummary>> {
    let conn = self.lock()?;
    Ok(Self::summary_query(&conn, Some(page))?.into_iter().next())
  }

  fn summaries(&self) -> Result<Vec<PageSummary>> {
    let conn = self.lock()?;
    Self::summary_query(&conn, None)
  }
}

/// Clear `page` and insert `items` in order, recording the page digest.
///
/// Must run inside a transaction for the replace to be atomic.
pub(crate) fn write_page(
  conn: &Connection,
  page: i64,
  page_size: Option<usize>,
  items: &[Manga],
) -> Result<PageWrite> {
  let digest = page_digest(items)?;

  let previous: Option<String> = conn
    .query_row(
      "SELECT digest FROM page_meta WHERE page = ?",
      params![page],
      |row| row.get(0),
    )
    .optional()
    .map_err(|e| eyre!("Failed to read page summary: {}", e))?;

  conn
    .execute("DELETE FROM manga WHERE page = ?", params![page])
    .map_err(|e| eyre!("Failed to clear page {}: {}", page, e))?;

  for (position, item) in items.iter().enumerate() {
    insert_row(conn, page, position as i64, item)?;
  }

  conn
    .execute(
      "INSERT OR REPLACE INTO page_meta (page, digest, item_count, page_size, cached_at)
       VALUES (?, ?, ?, ?, datetime('now'))",
      params![page, digest, items.len() as i64, page_size.map(|size| size as i64)],
    )
    .map_err(|e| eyre!("Failed to update page summary: {}", e))?;

  Ok(PageWrite {
    page,
    item_count: items.len(),
    changed: previous.as_deref() != Some(digest.as_str()),
  })
}

fn insert_row(conn: &Connection, page: i64, position: i64, item: &Manga) -> Result<()> {
  let data = serde_json::to_vec(item).map_err(|e| eyre!("Failed to serialize manga: {}", e))?;

  // Keyed by (page, id): a repeated id within one write keeps the last copy
  conn
    .execute(
      "INSERT OR REPLACE INTO manga (id, page, position, title, data, cached_at)
       VALUES (?, ?, ?, ?, ?, datetime('now'))",
      params![item.id.as_str(), page, position, item.title, data],
    )
    .map_err(|e| eyre!("Failed to store manga {}: {}", item.id, e))?;

  Ok(())
}

/// SHA-256 over the serialized items, in order.
fn page_digest(items: &[Manga]) -> Result<String> {
  let mut hasher = Sha256::new();
  for item in items {
    let data = serde_json::to_vec(item).map_err(|e| eyre!("Failed to serialize manga: {}", e))?;
    hasher.update(&data);
    hasher.update(b"\n");
  }
  Ok(hex::encode(hasher.finalize()))
}

fn read_data(row: &rusqlite::Row<'_>) -> rusqlite::Result<Vec<u8>> {
  row.get(0)
}

fn decode(data: &[u8]) -> Option<Manga> {
  match serde_json::from_slice(data) {
    Ok(manga) => Some(manga),
    Err(e) => {
      warn!(error = %e, "skipping undecodable cached manga");
      None
    }
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::manga::synthetic;

  fn storage() -> SqliteStorage {
    SqliteStorage::open_in_memory().unwrap()
  }

  fn titled(id: &str, title: &str) -> Manga {
    let mut manga = synthetic::placeholder(1);
    manga.id = MangaId::new(id);
    manga.title = title.to_string();
    manga
  }

  #[test]
  fn test_replace_page_leaves_no_residue() {
    let storage = storage();
    let first = synthetic::page(1, 5).unwrap();
    storage.replace_page(1, 20, &first).unwrap();

    let second = vec![titled("a", "Alpha"), titled("b", "Beta")];
    let write = storage.replace_page(1, 20, &second).unwrap();

    assert!(write.changed);
    assert_eq!(write.item_count, 2);
    assert_eq!(storage.get_page(1).unwrap(), second);
  }

  #[test]
  fn test_replace_with_same_contents_is_unchanged() {
    let storage = storage();
    let items = synthetic::page(2, 3).unwrap();

    assert!(storage.replace_page(2, 20, &items).unwrap().changed);
    assert!(!storage.replace_page(2, 20, &items).unwrap().changed);
  }

  #[test]
  fn test_page_order_is_preserved() {
    let storage = storage();
    let items = vec![titled("z", "Zeta"), titled("a", "Alpha"), titled("m", "Mu")];
    storage.replace_page(1, 20, &items).unwrap();

    let titles: Vec<String> = storage
      .get_page(1)
      .unwrap()
      .into_iter()
      .map(|m| m.title)
      .collect();
    assert_eq!(titles, vec!["Zeta", "Alpha", "Mu"]);
  }

  #[test]
  fn test_get_by_id() {
    let storage = storage();
    storage.replace_page(1, 20, &[titled("x1", "Berserk")]).unwrap();

    let found = storage.get_by_id(&MangaId::new("x1")).unwrap().unwrap();
    assert_eq!(found.manga.title, "Berserk");
    assert!(found.cached_at.is_some());
    assert!(storage.get_by_id(&MangaId::new("nope")).unwrap().is_none());
  }

  #[test]
  fn test_get_all_lists_numbered_pages_first() {
    let storage = storage();
    storage.replace_page(-1, 20, &[titled("l", "Latest")]).unwrap();
    storage.replace_page(2, 20, &[titled("p2", "Two")]).unwrap();
    storage.replace_page(1, 20, &[titled("p1", "One")]).unwrap();
    storage.upsert_many(0, &[titled("d", "Detail")]).unwrap();

    let titles: Vec<String> = storage
      .get_all()
      .unwrap()
      .into_iter()
      .map(|m| m.title)
      .collect();
    assert_eq!(titles, vec!["One", "Two", "Latest", "Detail"]);
  }

  #[test]
  fn test_max_page() {
    let storage = storage();
    assert_eq!(storage.max_page().unwrap(), None);

    storage.replace_page(-1, 20, &[titled("l", "Latest")]).unwrap();
    assert_eq!(storage.max_page().unwrap(), Some(-1));

    storage.replace_page(3, 20, &[titled("p3", "Three")]).unwrap();
    assert_eq!(storage.max_page().unwrap(), Some(3));
  }

  #[test]
  fn test_upsert_appends_without_clearing() {
    let storage = storage();
    storage.replace_page(0, 20, &[titled("a", "Alpha")]).unwrap();
    storage.upsert_many(0, &[titled("b", "Beta")]).unwrap();

    let titles: Vec<String> = storage
      .get_page(0)
      .unwrap()
      .into_iter()
      .map(|m| m.title)
      .collect();
    assert_eq!(titles, vec!["Alpha", "Beta"]);
  }

  #[test]
  fn test_delete_page() {
    let storage = storage();
    storage.replace_page(1, 20, &synthetic::page(1, 4).unwrap()).unwrap();
    storage.replace_page(2, 20, &synthetic::page(2, 4).unwrap()).unwrap();

    assert_eq!(storage.delete_page(1).unwrap(), 4);
    assert!(storage.get_page(1).unwrap().is_empty());
    assert!(storage.page_summary(1).unwrap().is_none());
    assert_eq!(storage.get_page(2).unwrap().len(), 4);
  }

  #[test]
  fn test_search_is_case_insensitive() {
    let storage = storage();
    let mut oda = titled("op", "One Piece");
    oda.authors = vec!["Eiichiro Oda".to_string()];
    let mut horror = titled("u", "Uzumaki");
    horror.genres = vec!["Horror".to_string()];
    storage.replace_page(1, 20, &[oda, horror]).unwrap();

    let by_title = storage.search("PIECE").unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].id.as_str(), "op");

    let by_author = storage.search("oda").unwrap();
    assert_eq!(by_author[0].id.as_str(), "op");

    let by_genre = storage.search("horr").unwrap();
    assert_eq!(by_genre[0].id.as_str(), "u");

    assert!(storage.search("romance").unwrap().is_empty());
  }

  #[test]
  fn test_same_id_on_two_pages() {
    let storage = storage();
    storage.replace_page(1, 20, &[titled("a", "Alpha"), titled("b", "Beta")]).unwrap();
    storage.replace_page(-1, 10, &[titled("b", "Beta")]).unwrap();

    // Writing one page leaves the other intact
    assert_eq!(storage.get_page(1).unwrap().len(), 2);
    assert_eq!(storage.get_page(-1).unwrap().len(), 1);

    storage.replace_page(-1, 10, &[titled("c", "Gamma")]).unwrap();
    assert_eq!(storage.get_page(1).unwrap().len(), 2);

    // Aggregate reads list each id once
    storage.replace_page(2, 20, &[titled("a", "Alpha")]).unwrap();
    let ids: Vec<String> = storage
      .get_all()
      .unwrap()
      .into_iter()
      .map(|m| m.id.to_string())
      .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert!(storage.get_by_id(&MangaId::new("a")).unwrap().is_some());
  }

  #[test]
  fn test_summaries() {
    let storage = storage();
    storage.replace_page(1, 20, &synthetic::page(1, 3).unwrap()).unwrap();
    storage.upsert_many(0, &[titled("d", "Detail")]).unwrap();

    let summaries = storage.summaries().unwrap();
    assert_eq!(summaries.len(), 2);

    let detail = &summaries[0];
    assert_eq!(detail.page, 0);
    assert_eq!(detail.item_count, 1);
    assert!(detail.digest.is_none());
    assert_eq!(detail.page_size, None);

    let first = &summaries[1];
    assert_eq!(first.page, 1);
    assert_eq!(first.item_count, 3);
    assert_eq!(first.page_size, Some(20));
    assert_eq!(first.first_title.as_deref(), Some("Manga Title 1"));
    assert_eq!(first.digest.as_ref().map(|d| d.len()), Some(64));
    assert!(first.cached_at.is_some());
  }
}

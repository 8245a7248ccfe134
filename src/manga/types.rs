use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Page index reserved for the "latest" collection.
pub const LATEST_PAGE: i64 = -1;

/// Page index for items persisted individually (detail lookups).
/// Sits outside numbered pagination so it never leaks into page 1.
pub const DETAIL_PAGE: i64 = 0;

/// Stable identifier of a manga. External ids are kept verbatim; numeric
/// ids are stored as their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MangaId(String);

impl MangaId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Numeric value of the id, if it is one (synthetic and legacy ids).
  pub fn as_number(&self) -> Option<u64> {
    self.0.parse().ok()
  }
}

impl From<u64> for MangaId {
  fn from(id: u64) -> Self {
    Self(id.to_string())
  }
}

impl fmt::Display for MangaId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(&self.0)
  }
}

/// Publication status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
  Ongoing,
  Completed,
  #[default]
  Unknown,
}

impl Status {
  /// Lenient, case-insensitive parse of the free-form status strings
  /// the API returns.
  pub fn parse(raw: &str) -> Self {
    match raw.trim().to_lowercase().as_str() {
      "ongoing" | "publishing" | "releasing" => Status::Ongoing,
      "completed" | "complete" | "finished" => Status::Completed,
      _ => Status::Unknown,
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Status::Ongoing => "Ongoing",
      Status::Completed => "Completed",
      Status::Unknown => "Unknown",
    };
    f.pad(s)
  }
}

/// A manga record, the current (v2) schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
  pub id: MangaId,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub cover_url: String,
  #[serde(default)]
  pub authors: Vec<String>,
  #[serde(default)]
  pub genres: Vec<String>,
  #[serde(default)]
  pub chapter_count: u32,
  #[serde(default)]
  pub status: Status,
  #[serde(default)]
  pub rating: Option<f32>,
  #[serde(default)]
  pub nsfw: bool,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Manga {
  /// Case-insensitive substring match over title, authors and genres.
  pub fn matches(&self, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
      return false;
    }

    self.title.to_lowercase().contains(&needle)
      || self
        .authors
        .iter()
        .any(|a| a.to_lowercase().contains(&needle))
      || self
        .genres
        .iter()
        .any(|g| g.to_lowercase().contains(&needle))
  }
}

/// The v1 shape of a manga: numeric id and a single author string.
///
/// Both the old API payload and the old store rows use this layout.
/// `From<LegacyManga> for Manga` is the one migration between the two.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LegacyManga {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub cover_image: String,
  #[serde(default)]
  pub author: Option<String>,
  #[serde(default)]
  pub genres: Vec<String>,
  #[serde(default)]
  pub chapters: u32,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub rating: f32,
}

impl From<LegacyManga> for Manga {
  fn from(legacy: LegacyManga) -> Self {
    let authors = legacy
      .author
      .map(|a| a.trim().to_string())
      .filter(|a| !a.is_empty() && a != "Unknown")
      .into_iter()
      .collect();

    Manga {
      id: MangaId::from(legacy.id),
      title: legacy.title,
      description: legacy.description,
      cover_url: legacy.cover_image,
      authors,
      genres: legacy.genres,
      chapter_count: legacy.chapters,
      status: Status::parse(&legacy.status),
      // v1 used 0.0 for "no rating"
      rating: (legacy.rating > 0.0).then_some(legacy.rating),
      nsfw: false,
      created_at: None,
      updated_at: None,
    }
  }
}

/// A chapter of a manga
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
  pub id: String,
  pub title: String,
  pub number: String,
  pub released: Option<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> Manga {
    Manga {
      id: MangaId::new("abc"),
      title: "One Piece".to_string(),
      description: String::new(),
      cover_url: String::new(),
      authors: vec!["Eiichiro Oda".to_string()],
      genres: vec!["Action".to_string(), "Adventure".to_string()],
      chapter_count: 1050,
      status: Status::Ongoing,
      rating: None,
      nsfw: false,
      created_at: None,
      updated_at: None,
    }
  }

  #[test]
  fn test_matches_is_case_insensitive() {
    let manga = sample();
    assert!(manga.matches("one piece"));
    assert!(manga.matches("ODA"));
    assert!(manga.matches("advent"));
    assert!(!manga.matches("romance"));
  }

  #[test]
  fn test_blank_query_matches_nothing() {
    assert!(!sample().matches("   "));
  }

  #[test]
  fn test_status_parse() {
    assert_eq!(Status::parse("Ongoing"), Status::Ongoing);
    assert_eq!(Status::parse(" FINISHED "), Status::Completed);
    assert_eq!(Status::parse("hiatus"), Status::Unknown);
  }

  #[test]
  fn test_legacy_migration() {
    let legacy = LegacyManga {
      id: 42,
      title: "Naruto".to_string(),
      description: "ninja".to_string(),
      cover_image: "https://img/naruto.jpg".to_string(),
      author: Some("Masashi Kishimoto".to_string()),
      genres: vec!["Action".to_string()],
      chapters: 700,
      status: "Completed".to_string(),
      rating: 4.7,
    };

    let manga = Manga::from(legacy);
    assert_eq!(manga.id, MangaId::new("42"));
    assert_eq!(manga.id.as_number(), Some(42));
    assert_eq!(manga.cover_url, "https://img/naruto.jpg");
    assert_eq!(manga.authors, vec!["Masashi Kishimoto".to_string()]);
    assert_eq!(manga.status, Status::Completed);
    assert_eq!(manga.rating, Some(4.7));
  }

  #[test]
  fn test_legacy_placeholder_author_and_rating_dropped() {
    let legacy = LegacyManga {
      id: 1,
      title: "X".to_string(),
      description: String::new(),
      cover_image: String::new(),
      author: Some("Unknown".to_string()),
      genres: Vec::new(),
      chapters: 0,
      status: String::new(),
      rating: 0.0,
    };

    let manga = Manga::from(legacy);
    assert!(manga.authors.is_empty());
    assert_eq!(manga.rating, None);
    assert_eq!(manga.status, Status::Unknown);
  }
}

//! Serde-deserializable types matching the manga API responses.
//!
//! These types are separate from domain types to allow lenient
//! deserialization while keeping domain types focused on application needs.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::types::{Chapter, LegacyManga, Manga, MangaId, Status};

// ============================================================================
// Item payloads
// ============================================================================

/// Current item payload (string ids, author list, epoch timestamps).
#[derive(Debug, Deserialize)]
pub struct ApiMangaCurrent {
  pub id: String,
  pub title: String,
  #[serde(default, alias = "description")]
  pub summary: String,
  #[serde(default, alias = "cover_image")]
  pub thumb: String,
  #[serde(default)]
  pub authors: Vec<String>,
  #[serde(default)]
  pub genres: Vec<String>,
  #[serde(default)]
  pub total_chapter: u32,
  #[serde(default)]
  pub status: String,
  pub rating: Option<f32>,
  #[serde(default)]
  pub nsfw: bool,
  pub create_at: Option<Value>,
  pub update_at: Option<Value>,
}

/// Either payload shape the API has served over time.
///
/// The current shape is tried first; a numeric `id` makes it fail and the
/// legacy shape takes over.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiManga {
  Current(ApiMangaCurrent),
  Legacy(LegacyManga),
}

impl ApiManga {
  pub fn into_manga(self) -> Manga {
    match self {
      ApiManga::Legacy(legacy) => legacy.into(),
      ApiManga::Current(api) => Manga {
        id: MangaId::new(api.id),
        title: api.title,
        description: api.summary,
        cover_url: api.thumb,
        authors: api.authors,
        genres: api.genres,
        chapter_count: api.total_chapter,
        status: Status::parse(&api.status),
        rating: api.rating,
        nsfw: api.nsfw,
        created_at: api.create_at.as_ref().and_then(parse_timestamp),
        updated_at: api.update_at.as_ref().and_then(parse_timestamp),
      },
    }
  }
}

/// Timestamps arrive as epoch seconds, epoch millis, or RFC 3339 strings.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
  match value {
    Value::Number(n) => {
      let raw = n.as_i64()?;
      // Anything past year ~5000 in seconds is really millis
      if raw.abs() >= 100_000_000_000 {
        Utc.timestamp_millis_opt(raw).single()
      } else {
        Utc.timestamp_opt(raw, 0).single()
      }
    }
    Value::String(s) => DateTime::parse_from_rfc3339(s)
      .ok()
      .map(|dt| dt.with_timezone(&Utc)),
    _ => None,
  }
}

// ============================================================================
// List endpoints (fetch-manga, fetch-latest, search-manga)
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiMangaListResponse {
  #[serde(default)]
  pub data: Vec<ApiManga>,
  pub code: Option<i64>,
  pub page: Option<i64>,
  #[serde(rename = "totalItems")]
  pub total_items: Option<i64>,
  #[serde(rename = "totalPages")]
  pub total_pages: Option<i64>,
  #[serde(default)]
  pub message: String,
}

impl ApiMangaListResponse {
  pub fn into_items(self) -> Vec<Manga> {
    self.data.into_iter().map(ApiManga::into_manga).collect()
  }
}

// ============================================================================
// Detail endpoint (get-manga)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiMangaDetail {
  Envelope { data: ApiManga },
  Bare(ApiManga),
}

impl ApiMangaDetail {
  pub fn into_manga(self) -> Manga {
    match self {
      ApiMangaDetail::Envelope { data } => data.into_manga(),
      ApiMangaDetail::Bare(item) => item.into_manga(),
    }
  }
}

// ============================================================================
// Chapter endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiChapter {
  pub id: Value,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub chapter_number: Value,
  #[serde(default)]
  pub release_date: Option<String>,
}

impl From<ApiChapter> for Chapter {
  fn from(api: ApiChapter) -> Self {
    Chapter {
      id: value_to_string(&api.id),
      title: api.title,
      number: value_to_string(&api.chapter_number),
      released: api.release_date.filter(|d| !d.is_empty()),
    }
  }
}

fn value_to_string(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

#[derive(Debug, Deserialize)]
pub struct ApiChapterListResponse {
  #[serde(default, alias = "data")]
  pub chapters: Vec<ApiChapter>,
}

#[derive(Debug, Deserialize)]
pub struct ApiChapterImagesResponse {
  #[serde(default, alias = "data")]
  pub images: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_current_shape_decodes() {
    let json = r#"{
      "data": [{
        "id": "659524dd597f3b00281f06ff",
        "title": "Solo Leveling",
        "summary": "A hunter levels up",
        "thumb": "https://img/solo.jpg",
        "authors": ["Chugong"],
        "genres": ["Action", "Fantasy"],
        "total_chapter": 200,
        "status": "completed",
        "nsfw": false,
        "create_at": 1704142045000,
        "update_at": 1704142045
      }],
      "code": 200
    }"#;

    let response: ApiMangaListResponse = serde_json::from_str(json).unwrap();
    let items = response.into_items();
    assert_eq!(items.len(), 1);

    let manga = &items[0];
    assert_eq!(manga.id.as_str(), "659524dd597f3b00281f06ff");
    assert_eq!(manga.authors, vec!["Chugong".to_string()]);
    assert_eq!(manga.chapter_count, 200);
    assert_eq!(manga.status, Status::Completed);
    assert_eq!(manga.created_at.map(|t| t.timestamp()), Some(1704142045));
    assert_eq!(manga.updated_at.map(|t| t.timestamp()), Some(1704142045));
  }

  #[test]
  fn test_legacy_shape_decodes() {
    let json = r#"{
      "data": [{
        "id": 7,
        "title": "Naruto",
        "cover_image": "https://img/naruto.jpg",
        "author": "Masashi Kishimoto",
        "chapters": 700,
        "status": "Completed",
        "rating": 4.7
      }]
    }"#;

    let response: ApiMangaListResponse = serde_json::from_str(json).unwrap();
    let items = response.into_items();
    assert_eq!(items[0].id.as_str(), "7");
    assert_eq!(items[0].cover_url, "https://img/naruto.jpg");
    assert_eq!(items[0].authors, vec!["Masashi Kishimoto".to_string()]);
  }

  #[test]
  fn test_missing_data_is_empty() {
    let response: ApiMangaListResponse =
      serde_json::from_str(r#"{"code": 200, "message": "ok"}"#).unwrap();
    assert!(response.into_items().is_empty());
  }

  #[test]
  fn test_detail_envelope_and_bare() {
    let enveloped: ApiMangaDetail =
      serde_json::from_str(r#"{"data": {"id": "x1", "title": "Berserk"}}"#).unwrap();
    assert_eq!(enveloped.into_manga().title, "Berserk");

    let bare: ApiMangaDetail =
      serde_json::from_str(r#"{"id": 3, "title": "Monster"}"#).unwrap();
    assert_eq!(bare.into_manga().id.as_str(), "3");
  }

  #[test]
  fn test_chapters_accept_numeric_fields() {
    let json = r#"{"chapters": [
      {"id": 11, "title": "Romance Dawn", "chapter_number": 1, "release_date": ""},
      {"id": "c2", "chapter_number": "2", "release_date": "1997-08-04"}
    ]}"#;

    let response: ApiChapterListResponse = serde_json::from_str(json).unwrap();
    let chapters: Vec<Chapter> = response.chapters.into_iter().map(Chapter::from).collect();
    assert_eq!(chapters[0].id, "11");
    assert_eq!(chapters[0].number, "1");
    assert_eq!(chapters[0].released, None);
    assert_eq!(chapters[1].id, "c2");
    assert_eq!(chapters[1].released.as_deref(), Some("1997-08-04"));
  }

  #[test]
  fn test_images_alias() {
    let response: ApiChapterImagesResponse =
      serde_json::from_str(r#"{"data": ["a.jpg", "b.jpg"]}"#).unwrap();
    assert_eq!(response.images.len(), 2);
  }
}

//! Deterministic placeholder manga, substituted when the remote source
//! yields nothing usable.

use super::types::{Manga, MangaId, Status};

const LATEST_TITLES: [&str; 10] = [
  "Naruto",
  "One Piece",
  "Attack on Titan",
  "My Hero Academia",
  "Demon Slayer",
  "Jujutsu Kaisen",
  "Dragon Ball",
  "Tokyo Ghoul",
  "Bleach",
  "Death Note",
];

/// First id of the synthetic latest list.
pub const LATEST_BASE_ID: u64 = 1000;

const PLACEHOLDER_COVER: &str = "https://via.placeholder.com/300x450.png?text=";

fn default_genres() -> Vec<String> {
  ["Action", "Adventure", "Fantasy"]
    .iter()
    .map(|g| g.to_string())
    .collect()
}

/// The placeholder for numeric id `id`.
pub fn placeholder(id: u64) -> Manga {
  Manga {
    id: MangaId::from(id),
    title: format!("Manga Title {}", id),
    description: format!(
      "This is a description for manga {}. Placeholder content shown while the catalogue is unavailable.",
      id
    ),
    cover_url: format!("{}Manga+{}", PLACEHOLDER_COVER, id),
    authors: vec![format!("Author {}", id)],
    genres: default_genres(),
    chapter_count: 5 + ((id * 7) % 46) as u32,
    status: if id % 3 == 0 {
      Status::Completed
    } else {
      Status::Ongoing
    },
    rating: Some(4.5),
    nsfw: false,
    created_at: None,
    updated_at: None,
  }
}

/// Placeholders for `page` (1-based), ids `(page-1)*page_size + 1 ..= page*page_size`.
///
/// Returns None when the page cannot be numbered: `page < 1` or an empty
/// page size.
pub fn page(page: i64, page_size: usize) -> Option<Vec<Manga>> {
  if page < 1 || page_size == 0 {
    return None;
  }

  let start = (page as u64 - 1).checked_mul(page_size as u64)?;
  (1..=page_size as u64)
    .map(|offset| start.checked_add(offset).map(placeholder))
    .collect()
}

/// Placeholder "latest" collection of well-known titles.
pub fn latest() -> Vec<Manga> {
  LATEST_TITLES
    .iter()
    .enumerate()
    .map(|(index, title)| {
      let id = LATEST_BASE_ID + index as u64;
      Manga {
        id: MangaId::from(id),
        title: title.to_string(),
        description: "A popular manga series. Placeholder content shown while the catalogue is unavailable."
          .to_string(),
        cover_url: format!("{}{}", PLACEHOLDER_COVER, title.replace(' ', "+")),
        authors: vec![format!("Famous Author {}", index)],
        genres: default_genres(),
        chapter_count: 100 + ((id * 13) % 201) as u32,
        status: if index % 3 == 0 {
          Status::Completed
        } else {
          Status::Ongoing
        },
        rating: Some(4.8),
        nsfw: false,
        created_at: None,
        updated_at: None,
      }
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_page_ids() {
    let items = page(3, 20).unwrap();
    let ids: Vec<u64> = items.iter().filter_map(|m| m.id.as_number()).collect();
    assert_eq!(ids, (41..=60).collect::<Vec<u64>>());
  }

  #[test]
  fn test_page_is_deterministic() {
    assert_eq!(page(2, 5), page(2, 5));
  }

  #[test]
  fn test_invalid_pages() {
    assert!(page(0, 20).is_none());
    assert!(page(-1, 20).is_none());
    assert!(page(1, 0).is_none());
  }

  #[test]
  fn test_placeholder_fields() {
    let manga = placeholder(9);
    assert_eq!(manga.title, "Manga Title 9");
    assert_eq!(manga.status, Status::Completed);
    assert!((5..=50).contains(&manga.chapter_count));
    assert_eq!(placeholder(10).status, Status::Ongoing);
  }

  #[test]
  fn test_latest() {
    let items = latest();
    assert_eq!(items.len(), 10);
    assert_eq!(items[0].id.as_number(), Some(LATEST_BASE_ID));
    assert_eq!(items[9].title, "Death Note");
    assert!(items.iter().all(|m| (100..=300).contains(&m.chapter_count)));
  }
}

//! URL building for search, typeahead and torrent endpoints plus list filtering.

use serde::Deserialize;

/// Search page.
pub const SEARCH_PATH: &str = "/search";
/// Typeahead API prefix.
pub const TYPEAHEAD_PATH: &str = "/search/api";
/// Delay between the last keystroke and the typeahead request.
pub const TYPEAHEAD_DEBOUNCE_MS: u32 = 250;
/// Torrent search endpoint.
pub const TORRENT_SEARCH_PATH: &str = "/torrents/search";

const PATH_UNSAFE: [char; 5] = ['/', '?', '#', '%', '\\'];

/// Path of the search page for `query`.
///
/// Queries with characters routers mangle inside a path segment use the query-string
/// form instead.
#[must_use]
pub fn search_path(query: &str) -> String {
    let query = query.trim();
    if query.contains(PATH_UNSAFE) {
        format!("{SEARCH_PATH}?query={}", urlencoding::encode(query))
    } else {
        format!("{SEARCH_PATH}/{}", urlencoding::encode(query))
    }
}

/// Entity kinds served by the typeahead API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeaheadKind {
    /// Artists.
    Artist,
    /// Albums.
    Album,
    /// Tracks.
    Track,
}

impl TypeaheadKind {
    /// Parse the `data-typeahead` attribute.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "artist" => Some(Self::Artist),
            "album" => Some(Self::Album),
            "track" => Some(Self::Track),
            _ => None,
        }
    }

    /// Path segment of the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Track => "track",
        }
    }
}

/// Typeahead request path; `None` for blank queries.
#[must_use]
pub fn typeahead_path(kind: TypeaheadKind, query: &str) -> Option<String> {
    let query = query.trim();
    (!query.is_empty()).then(|| {
        format!(
            "{TYPEAHEAD_PATH}/{}?query={}",
            kind.as_str(),
            urlencoding::encode(query)
        )
    })
}

/// One typeahead suggestion.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Suggestion {
    /// Display name.
    pub name: String,
    /// Target page.
    pub url: String,
}

/// Torrent search request path.
#[must_use]
pub fn torrent_search_path(query: &str) -> String {
    format!(
        "{TORRENT_SEARCH_PATH}?query={}",
        urlencoding::encode(query.trim())
    )
}

/// Import endpoint of one torrent.
#[must_use]
pub fn torrent_import_path(id: &str) -> String {
    format!("/torrents/import/{}", urlencoding::encode(id))
}

/// Mark-done endpoint of one torrent.
#[must_use]
pub fn torrent_done_path(id: &str) -> String {
    format!("/torrents/mark_done/{}", urlencoding::encode(id))
}

/// Whether an element with `haystack` as its filter text stays visible for `query`.
#[must_use]
pub fn filter_matches(haystack: &str, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || haystack.to_lowercase().contains(&query.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_uses_path_form_when_safe() {
        assert_eq!(search_path("  pink moon "), "/search/pink%20moon");
        assert_eq!(search_path("AC/DC"), "/search?query=AC%2FDC");
        assert_eq!(search_path("100%"), "/search?query=100%25");
    }

    #[test]
    fn typeahead_skips_blank_queries() {
        assert_eq!(typeahead_path(TypeaheadKind::Album, "   "), None);
        assert_eq!(
            typeahead_path(TypeaheadKind::Artist, "sigur rós").as_deref(),
            Some("/search/api/artist?query=sigur%20r%C3%B3s")
        );
        assert_eq!(TypeaheadKind::parse("genre"), None);
    }

    #[test]
    fn suggestions_decode() -> Result<(), serde_json::Error> {
        let parsed: Vec<Suggestion> =
            serde_json::from_str(r#"[{"name":"Low","url":"/low"}]"#)?;
        assert_eq!(parsed[0].url, "/low");
        Ok(())
    }

    #[test]
    fn torrent_paths_are_encoded() {
        assert_eq!(torrent_search_path("a b"), "/torrents/search?query=a%20b");
        assert_eq!(torrent_import_path("x/1"), "/torrents/import/x%2F1");
        assert_eq!(torrent_done_path("9"), "/torrents/mark_done/9");
    }

    #[test]
    fn filtering_is_case_insensitive() {
        assert!(filter_matches("Bob Dylan", "dyl"));
        assert!(filter_matches("anything", " "));
        assert!(!filter_matches("Bob Dylan", "cohen"));
    }
}

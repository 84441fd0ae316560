//! Track search for a resolved genre and language
//!
//! Backed by the Spotify Web API (client-credentials flow). A genre such as
//! "90s bollywood romance" often has no exact hits, so [`TrackFinder`] walks a
//! chain of progressively broader queries and keeps the first non-empty page:
//!
//! 1. `"{genre} {language}"`
//! 2. `"{language} songs"`
//! 3. `"trending music"`
//! 4. `"{genre} {language}"` broadened (decades dropped, first three words)
//! 5. `"pop music"`
//!
//! Hits are ordered by popularity and trimmed to the configured count.

use async_trait::async_trait;
use moodify_common::api::TrackSummary;
use moodify_common::config::TrackSearchConfig;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const SEARCH_URL: &str = "https://api.spotify.com/v1/search";
const TOKEN_TIMEOUT: Duration = Duration::from_secs(5);
const SEARCH_TIMEOUT: Duration = Duration::from_secs(8);
const TOKEN_ATTEMPTS: u32 = 3;
const TOKEN_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Tokens are refreshed this long before Spotify's expiry
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;
/// Search offsets are drawn from 0..MAX_RANDOM_OFFSET for variety
const MAX_RANDOM_OFFSET: u32 = 10;

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const MISSING_URL: &str = "#";
const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/150";

/// Track search errors
#[derive(Debug, Error)]
pub enum TrackSearchError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// Access token could not be obtained
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// API returned an error response
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse API response JSON
    #[error("Parse error: {0}")]
    Parse(String),
}

impl TrackSearchError {
    /// HTTP status reported by the upstream API, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            TrackSearchError::Api(status, _) => Some(*status),
            _ => None,
        }
    }
}

/// A track as returned by the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogTrack {
    pub name: String,
    pub artists: Vec<String>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub preview: Option<String>,
    pub popularity: u32,
}

impl From<CatalogTrack> for TrackSummary {
    fn from(track: CatalogTrack) -> Self {
        TrackSummary {
            name: track.name,
            artist: track
                .artists
                .into_iter()
                .next()
                .unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            url: track.url.unwrap_or_else(|| MISSING_URL.to_string()),
            image: track.image.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            preview: track.preview,
        }
    }
}

/// Searchable track catalog
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    /// One page of tracks matching a free-text query
    async fn search_tracks(
        &self,
        query: &str,
        offset: u32,
    ) -> Result<Vec<CatalogTrack>, TrackSearchError>;
}

/// Drop decade tokens ("90s", "2000s"), keep the first three words
pub fn broaden_query(query: &str) -> String {
    static DECADE: OnceLock<Regex> = OnceLock::new();
    let decade = DECADE.get_or_init(|| Regex::new(r"\b\d{2,4}s\b").expect("valid decade regex"));

    let query = query.replace('+', " ");
    decade
        .replace_all(&query, "")
        .split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Query chain tried in order until one returns tracks
pub fn fallback_queries(genre: &str, language: &str) -> Vec<String> {
    let primary = format!("{} {}", genre, language);
    vec![
        primary.clone(),
        format!("{} songs", language),
        "trending music".to_string(),
        broaden_query(&primary),
        "pop music".to_string(),
    ]
}

/// Finds tracks for a genre and language through the fallback query chain
#[derive(Clone)]
pub struct TrackFinder {
    catalog: Arc<dyn TrackCatalog>,
    max_results: usize,
}

impl TrackFinder {
    pub fn new(catalog: Arc<dyn TrackCatalog>, max_results: usize) -> Self {
        Self {
            catalog,
            max_results,
        }
    }

    /// Most popular tracks of the first query with hits; empty if none has any
    pub async fn find(
        &self,
        genre: &str,
        language: &str,
    ) -> Result<Vec<TrackSummary>, TrackSearchError> {
        let offset = rand::thread_rng().gen_range(0..MAX_RANDOM_OFFSET);

        for query in fallback_queries(genre, language) {
            if query.trim().is_empty() {
                continue;
            }

            debug!(query = %query, offset, "Searching tracks");
            let mut tracks = self.catalog.search_tracks(&query, offset).await?;
            info!(query = %query, count = tracks.len(), "Fetched tracks");

            if !tracks.is_empty() {
                tracks.sort_by(|a, b| b.popularity.cmp(&a.popularity));
                tracks.truncate(self.max_results);
                return Ok(tracks.into_iter().map(TrackSummary::from).collect());
            }
        }

        warn!(genre = %genre, language = %language, "No tracks found for any query");
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Option<TrackPage>,
}

#[derive(Debug, Deserialize)]
struct TrackPage {
    #[serde(default)]
    items: Vec<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct SpotifyTrack {
    name: String,
    #[serde(default)]
    popularity: u32,
    #[serde(default)]
    artists: Vec<SpotifyArtist>,
    #[serde(default)]
    external_urls: Option<SpotifyUrls>,
    #[serde(default)]
    album: Option<SpotifyAlbum>,
    #[serde(default)]
    preview_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyArtist {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SpotifyUrls {
    spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpotifyAlbum {
    #[serde(default)]
    images: Vec<SpotifyImage>,
}

#[derive(Debug, Deserialize)]
struct SpotifyImage {
    url: String,
}

impl From<SpotifyTrack> for CatalogTrack {
    fn from(track: SpotifyTrack) -> Self {
        CatalogTrack {
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            url: track.external_urls.and_then(|u| u.spotify),
            image: track
                .album
                .and_then(|album| album.images.into_iter().next())
                .map(|image| image.url),
            preview: track.preview_url,
            popularity: track.popularity,
        }
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Spotify Web API client
pub struct SpotifyClient {
    http_client: reqwest::Client,
    client_id: String,
    client_secret: String,
    market: String,
    page_size: u32,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(config: &TrackSearchConfig) -> Result<Self, TrackSearchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("moodify-ea/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TrackSearchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            market: config.market.clone(),
            page_size: config.page_size,
            token: Mutex::new(None),
        })
    }

    /// Cached access token, refreshed when close to expiry
    async fn access_token(&self) -> Result<String, TrackSearchError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.expires_at {
                return Ok(token.token.clone());
            }
        }

        let mut last_error = None;
        for attempt in 1..=TOKEN_ATTEMPTS {
            match self.request_token().await {
                Ok(response) => {
                    let lifetime = response.expires_in.saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
                    *cached = Some(CachedToken {
                        token: response.access_token.clone(),
                        expires_at: Instant::now() + Duration::from_secs(lifetime),
                    });
                    debug!(lifetime_secs = lifetime, "Obtained Spotify access token");
                    return Ok(response.access_token);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Spotify token request failed");
                    last_error = Some(e);
                    if attempt < TOKEN_ATTEMPTS {
                        tokio::time::sleep(TOKEN_RETRY_DELAY).await;
                    }
                }
            }
        }

        Err(TrackSearchError::Auth(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempt made".to_string()),
        ))
    }

    async fn request_token(&self) -> Result<TokenResponse, TrackSearchError> {
        let response = self
            .http_client
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .map_err(|e| TrackSearchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrackSearchError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| TrackSearchError::Parse(e.to_string()))
    }
}

#[async_trait]
impl TrackCatalog for SpotifyClient {
    async fn search_tracks(
        &self,
        query: &str,
        offset: u32,
    ) -> Result<Vec<CatalogTrack>, TrackSearchError> {
        let token = self.access_token().await?;
        let limit = self.page_size.to_string();
        let offset = offset.to_string();

        let response = self
            .http_client
            .get(SEARCH_URL)
            .bearer_auth(token)
            .query(&[
                ("q", query),
                ("type", "track"),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
                ("market", self.market.as_str()),
            ])
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| TrackSearchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TrackSearchError::Api(status.as_u16(), error_text));
        }

        let page: SearchResponse = response
            .json()
            .await
            .map_err(|e| TrackSearchError::Parse(e.to_string()))?;

        Ok(page
            .tracks
            .map(|page| page.items.into_iter().map(CatalogTrack::from).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Catalog answering from a fixed query → tracks map, recording queries
    struct MockCatalog {
        results: HashMap<String, Vec<CatalogTrack>>,
        queries: StdMutex<Vec<String>>,
    }

    impl MockCatalog {
        fn new(results: Vec<(&str, Vec<CatalogTrack>)>) -> Arc<Self> {
            Arc::new(Self {
                results: results
                    .into_iter()
                    .map(|(query, tracks)| (query.to_string(), tracks))
                    .collect(),
                queries: StdMutex::new(Vec::new()),
            })
        }

        fn queries(&self) -> Vec<String> {
            self.queries.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrackCatalog for MockCatalog {
        async fn search_tracks(
            &self,
            query: &str,
            offset: u32,
        ) -> Result<Vec<CatalogTrack>, TrackSearchError> {
            assert!(offset < MAX_RANDOM_OFFSET);
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.results.get(query).cloned().unwrap_or_default())
        }
    }

    fn track(name: &str, popularity: u32) -> CatalogTrack {
        CatalogTrack {
            name: name.to_string(),
            artists: vec![format!("{} artist", name)],
            url: Some(format!("https://open.spotify.com/track/{}", name)),
            image: None,
            preview: None,
            popularity,
        }
    }

    #[test]
    fn test_broaden_query() {
        assert_eq!(broaden_query("90s bollywood romance hindi"), "bollywood romance hindi");
        assert_eq!(broaden_query("2000s+indie+rock+english"), "indie rock english");
        assert_eq!(broaden_query("lofi hip-hop english"), "lofi hip-hop english");
        assert_eq!(broaden_query("a b c d e"), "a b c");
    }

    #[test]
    fn test_fallback_queries_order() {
        let queries = fallback_queries("salsa", "spanish");
        assert_eq!(
            queries,
            vec![
                "salsa spanish",
                "spanish songs",
                "trending music",
                "salsa spanish",
                "pop music",
            ]
        );
    }

    #[test]
    fn test_summary_defaults() {
        let summary = TrackSummary::from(CatalogTrack {
            name: "Untitled".into(),
            artists: vec![],
            url: None,
            image: None,
            preview: None,
            popularity: 0,
        });
        assert_eq!(summary.artist, "Unknown Artist");
        assert_eq!(summary.url, "#");
        assert_eq!(summary.image, "https://via.placeholder.com/150");
        assert!(summary.preview.is_none());
    }

    #[test]
    fn test_spotify_payload_parsing() {
        let json = r#"{
            "tracks": { "items": [ {
                "name": "Oye Como Va",
                "popularity": 71,
                "artists": [ { "name": "Santana" }, { "name": "Tito Puente" } ],
                "external_urls": { "spotify": "https://open.spotify.com/track/1" },
                "album": { "images": [ { "url": "https://i.scdn.co/image/a" }, { "url": "https://i.scdn.co/image/b" } ] },
                "preview_url": null
            } ] }
        }"#;
        let page: SearchResponse = serde_json::from_str(json).unwrap();
        let tracks: Vec<CatalogTrack> = page
            .tracks
            .unwrap()
            .items
            .into_iter()
            .map(CatalogTrack::from)
            .collect();

        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].artists, vec!["Santana", "Tito Puente"]);
        assert_eq!(tracks[0].image.as_deref(), Some("https://i.scdn.co/image/a"));
        assert_eq!(tracks[0].popularity, 71);
    }

    #[tokio::test]
    async fn test_first_query_with_results_wins() {
        let catalog = MockCatalog::new(vec![
            ("spanish songs", vec![track("a", 10), track("b", 90)]),
            ("pop music", vec![track("c", 99)]),
        ]);
        let finder = TrackFinder::new(catalog.clone(), 10);

        let tracks = finder.find("salsa", "spanish").await.unwrap();

        let names: Vec<&str> = tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(catalog.queries(), vec!["salsa spanish", "spanish songs"]);
    }

    #[tokio::test]
    async fn test_results_trimmed_by_popularity() {
        let tracks: Vec<CatalogTrack> = (0..30).map(|i| track(&format!("t{}", i), i)).collect();
        let catalog = MockCatalog::new(vec![("salsa spanish", tracks)]);
        let finder = TrackFinder::new(catalog, 10);

        let found = finder.find("salsa", "spanish").await.unwrap();

        assert_eq!(found.len(), 10);
        assert_eq!(found[0].name, "t29");
        assert_eq!(found[9].name, "t20");
    }

    #[tokio::test]
    async fn test_all_queries_empty() {
        let catalog = MockCatalog::new(vec![]);
        let finder = TrackFinder::new(catalog.clone(), 10);

        assert!(finder.find("salsa", "spanish").await.unwrap().is_empty());
        assert_eq!(catalog.queries().len(), 5);
    }
}

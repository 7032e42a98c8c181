// Catalog search: mood to query mapping and the Deezer client

use crate::config::SearchConfig;
use crate::error::{Result, VibeBeatsError};
use crate::models::{ExpressionLabel, Track};
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Narrow seam for outbound search so the transport can be swapped
pub trait TrackCatalog {
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<Track>>> + Send;
}

/// One way of turning a mood into a query string
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryStrategy {
    /// `"<genre> <mood> songs"`
    Mood,
    /// `"<genre> songs"`
    Generic,
}

impl QueryStrategy {
    pub fn render(self, genre: &str, mood: ExpressionLabel) -> String {
        match self {
            QueryStrategy::Mood => format!("{genre} {} songs", mood.as_str()),
            QueryStrategy::Generic => format!("{genre} songs"),
        }
    }
}

/// Ordered query strategies tried until one yields tracks
#[derive(Clone, Debug)]
pub struct QueryPlan {
    pub genre: String,
    pub strategies: Vec<QueryStrategy>,
    pub max_results: usize,
}

impl QueryPlan {
    /// Mood-specific query first, then the generic genre query
    pub fn new(genre: impl Into<String>, max_results: usize) -> Self {
        Self {
            genre: genre.into(),
            strategies: vec![QueryStrategy::Mood, QueryStrategy::Generic],
            max_results,
        }
    }

    pub fn queries(&self, mood: ExpressionLabel) -> Vec<String> {
        self.strategies
            .iter()
            .map(|s| s.render(&self.genre, mood))
            .collect()
    }
}

impl From<&SearchConfig> for QueryPlan {
    fn from(config: &SearchConfig) -> Self {
        Self::new(config.genre.clone(), config.max_results)
    }
}

/// Runs the plan against the catalog. Failures are logged and yield an empty list.
pub async fn find_tracks<C: TrackCatalog>(
    catalog: &C,
    plan: &QueryPlan,
    mood: ExpressionLabel,
) -> Vec<Track> {
    for query in plan.queries(mood) {
        match catalog.search(&query).await {
            Ok(mut tracks) if !tracks.is_empty() => {
                tracks.truncate(plan.max_results);
                info!("Query {:?} returned {} track(s)", query, tracks.len());
                return tracks;
            }
            Ok(_) => debug!("Query {:?} returned nothing", query),
            Err(e) => {
                warn!("Search for {:?} failed: {}", query, e);
                return Vec::new();
            }
        }
    }
    Vec::new()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Option<Vec<TrackRecord>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct TrackRecord {
    id: u64,
    title: String,
    artist: ArtistRecord,
    album: Option<AlbumRecord>,
    #[serde(default)]
    preview: String,
}

#[derive(Debug, Deserialize)]
struct ArtistRecord {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumRecord {
    cover: Option<String>,
}

impl From<TrackRecord> for Track {
    fn from(record: TrackRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            artist_name: record.artist.name,
            cover_url: record
                .album
                .and_then(|a| a.cover)
                .filter(|c| !c.is_empty()),
            preview_url: record.preview,
        }
    }
}

/// Parses a catalog search response body
pub fn parse_search_response(body: &str) -> Result<Vec<Track>> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| VibeBeatsError::Search(format!("malformed response: {e}")))?;

    if let Some(err) = response.error {
        return Err(VibeBeatsError::Search(format!(
            "catalog error {}: {}",
            err.kind, err.message
        )));
    }

    let records = response
        .data
        .ok_or_else(|| VibeBeatsError::Search("response has no data".to_string()))?;

    Ok(records.into_iter().map(Track::from).collect())
}

/// Deezer search API client
#[derive(Clone)]
pub struct DeezerClient {
    client: Client,
    endpoint: String,
}

impl DeezerClient {
    pub fn new(config: &SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("vibebeats/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Uses an existing HTTP client
    pub fn with_client(client: Client, config: &SearchConfig) -> Self {
        Self {
            client,
            endpoint: config.endpoint(),
        }
    }

    /// Downloads a resource such as a preview clip or album cover
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

impl TrackCatalog for DeezerClient {
    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        debug!("GET {} q={:?}", self.endpoint, query);
        let body = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_search_response(&body)
    }
}

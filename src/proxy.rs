//! YouTube search proxy.
//!
//! Keeps the YouTube Data API key on the server and reshapes search results
//! into the card format the home page renders.

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::{error, info};

use crate::error::SearchError;

pub const FUNCTION_PATH: &str = "/functions/v1/fetch-youtube-videos";
pub const DEFAULT_QUERY: &str = "trending";
pub const DEFAULT_MAX_RESULTS: u32 = 24;
/// Upper bound the search endpoint accepts.
pub const MAX_RESULTS_LIMIT: u32 = 50;

const ALLOW_ORIGIN: &str = "*";
const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const MISSING_KEY_MESSAGE: &str = "YouTube API key not configured";
const UPSTREAM_FAILURE_MESSAGE: &str = "Failed to fetch from YouTube API";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One search hit as returned by the upstream API, already flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem {
    pub video_id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub channel_title: String,
    pub published_at: String,
}

/// Card payload returned to the page. `view_count` is always 0: the search
/// endpoint does not report it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YouTubeVideo {
    pub id: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub channel_name: String,
    pub created_at: String,
    pub view_count: u64,
    #[serde(rename = "isYouTubeVideo")]
    pub is_youtube_video: bool,
}

impl From<SearchItem> for YouTubeVideo {
    fn from(item: SearchItem) -> Self {
        Self {
            id: item.video_id,
            title: item.title,
            thumbnail_url: item.thumbnail_url,
            channel_name: item.channel_title,
            created_at: item.published_at,
            view_count: 0,
            is_youtube_video: true,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchResponse {
    pub videos: Vec<YouTubeVideo>,
}

/// Upstream video search. May block; the proxy calls it on the blocking pool.
pub trait VideoSearch: Send + Sync + 'static {
    fn search(
        &self,
        api_key: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchItem>, SearchError>;
}

/// `ureq` client for the YouTube Data API v3 `search` endpoint.
pub struct YouTubeClient {
    agent: ureq::Agent,
    base_url: String,
}

impl YouTubeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct UpstreamSearch {
    #[serde(default)]
    items: Vec<UpstreamItem>,
}

#[derive(Deserialize)]
struct UpstreamItem {
    id: UpstreamId,
    snippet: UpstreamSnippet,
}

#[derive(Deserialize)]
struct UpstreamId {
    #[serde(rename = "videoId")]
    video_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamSnippet {
    title: String,
    #[serde(default)]
    thumbnails: UpstreamThumbnails,
    channel_title: String,
    published_at: String,
}

#[derive(Deserialize, Default)]
struct UpstreamThumbnails {
    high: Option<UpstreamThumbnail>,
    default: Option<UpstreamThumbnail>,
}

#[derive(Deserialize)]
struct UpstreamThumbnail {
    url: String,
}

impl From<UpstreamItem> for SearchItem {
    fn from(item: UpstreamItem) -> Self {
        let UpstreamThumbnails { high, default } = item.snippet.thumbnails;
        Self {
            video_id: item.id.video_id,
            title: item.snippet.title,
            thumbnail_url: high.or(default).map(|thumb| thumb.url),
            channel_title: item.snippet.channel_title,
            published_at: item.snippet.published_at,
        }
    }
}

impl VideoSearch for YouTubeClient {
    fn search(
        &self,
        api_key: &str,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchItem>, SearchError> {
        let response = self
            .agent
            .get(&format!("{}/search", self.base_url))
            .query("part", "snippet")
            .query("type", "video")
            .query("maxResults", &max_results.to_string())
            .query("q", query)
            .query("order", "viewCount")
            .query("key", api_key)
            .call();

        match response {
            Ok(response) => {
                let body: UpstreamSearch = response
                    .into_json()
                    .map_err(|err| SearchError::Malformed(err.to_string()))?;
                Ok(body.items.into_iter().map(SearchItem::from).collect())
            }
            Err(ureq::Error::Status(status, response)) => Err(SearchError::Status {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(transport)) => {
                Err(SearchError::Transport(transport.to_string()))
            }
        }
    }
}

#[derive(Clone)]
pub struct ProxyState {
    api_key: Option<String>,
    search: Arc<dyn VideoSearch>,
}

impl ProxyState {
    pub fn new(api_key: Option<String>, search: Arc<dyn VideoSearch>) -> Self {
        Self {
            api_key: api_key.filter(|key| !key.is_empty()),
            search,
        }
    }
}

/// Query string of a proxy call. `maxResults` is parsed leniently: anything
/// unparsable falls back to the default.
#[derive(Debug, Default)]
pub struct SearchParams {
    pub query: Option<String>,
    pub max_results: Option<String>,
}

impl SearchParams {
    /// Takes the first value of each known key and ignores the rest, so a
    /// repeated parameter never fails the request.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "query" => &mut params.query,
                "maxResults" => &mut params.max_results,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }

    fn query(&self) -> &str {
        self.query
            .as_deref()
            .filter(|query| !query.is_empty())
            .unwrap_or(DEFAULT_QUERY)
    }

    fn max_results(&self) -> u32 {
        self.max_results
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|count| *count > 0)
            .unwrap_or(DEFAULT_MAX_RESULTS)
            .min(MAX_RESULTS_LIMIT)
    }
}

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route(
            FUNCTION_PATH,
            get(fetch_youtube_videos)
                .post(fetch_youtube_videos)
                .options(preflight),
        )
        .with_state(state)
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    response
}

fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    let body = serde_json::json!({ "error": message.into() });
    with_cors((status, Json(body)).into_response())
}

async fn preflight() -> Response {
    with_cors(StatusCode::NO_CONTENT.into_response())
}

async fn fetch_youtube_videos(
    State(state): State<ProxyState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Response {
    let params = SearchParams::from_pairs(pairs);
    let Some(api_key) = state.api_key.clone() else {
        error!("{MISSING_KEY_MESSAGE}");
        return json_error(StatusCode::INTERNAL_SERVER_ERROR, MISSING_KEY_MESSAGE);
    };

    let query = params.query().to_string();
    let max_results = params.max_results();
    info!(%query, max_results, "fetching YouTube videos");

    let search = Arc::clone(&state.search);
    let outcome = task::spawn_blocking({
        let query = query.clone();
        move || search.search(&api_key, &query, max_results)
    })
    .await;

    match outcome {
        Ok(Ok(items)) => {
            let videos: Vec<YouTubeVideo> = items.into_iter().map(YouTubeVideo::from).collect();
            info!(count = videos.len(), "fetched videos from YouTube");
            with_cors((StatusCode::OK, Json(SearchResponse { videos })).into_response())
        }
        Ok(Err(SearchError::Status { status, body })) => {
            error!(status, %body, "YouTube API error");
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            json_error(status, UPSTREAM_FAILURE_MESSAGE)
        }
        Ok(Err(err)) => {
            error!(error = %err, "error fetching YouTube videos");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        Err(err) => {
            error!(error = %err, "YouTube search task failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

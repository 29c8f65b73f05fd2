//! HTTP surface behind the home, search, watch and upload pages.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};

use crate::{
    catalog::{
        CatalogStore, ChannelError, ChannelRecord, DEFAULT_PAGE_SIZE, NewVideo, Privacy,
        RELATED_PAGE_SIZE, VideoRecord, parse_tags,
    },
    error::ApiError,
    proxy::{self, ProxyState},
    session::Session,
    storage::{Bucket, MediaRef, SignedUrlResolver, object_path},
};

type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct ApiState {
    catalog: CatalogStore,
    resolver: SignedUrlResolver,
}

impl ApiState {
    pub fn new(catalog: CatalogStore, resolver: SignedUrlResolver) -> Self {
        Self { catalog, resolver }
    }
}

/// List entry for the home, search and related grids.
#[derive(Debug, Serialize)]
pub struct VideoCard {
    #[serde(flatten)]
    pub video: VideoRecord,
    pub thumbnail_url: Option<String>,
}

/// Everything the watch page needs in one response. Missing URLs render as
/// the "video unavailable" placeholder and the default thumbnail.
#[derive(Debug, Serialize)]
pub struct WatchPayload {
    #[serde(flatten)]
    pub video: VideoRecord,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub video_url_expires_at: Option<DateTime<Utc>>,
    pub user_reaction: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub is_like: bool,
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    pub reaction: Option<bool>,
    pub like_count: i64,
    pub dislike_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub view_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    pub handle: String,
}

/// Upload form submission. The bytes go straight to storage; this only
/// reserves the object keys and records the row.
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub privacy: Privacy,
    /// Comma separated.
    #[serde(default)]
    pub tags: String,
    pub video_file_name: String,
    pub thumbnail_file_name: Option<String>,
}

pub fn router(state: ApiState, proxy_state: ProxyState) -> Router {
    Router::new()
        .route("/api/videos", get(list_videos).post(create_upload))
        .route("/api/search", get(search_videos))
        .route("/api/videos/{id}", get(watch_video))
        .route("/api/videos/{id}/related", get(related_videos))
        .route("/api/videos/{id}/views", post(record_view))
        .route("/api/videos/{id}/reaction", post(set_reaction))
        .route("/api/channel", get(my_channel).post(create_channel))
        .with_state(state)
        .merge(proxy::router(proxy_state))
}

async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(f)
        .await
        .map_err(|err| ApiError::Internal(format!("task join error: {err}")))?
        .map_err(|err| {
            error!(error = %format!("{err:#}"), "catalog request failed");
            ApiError::from(err)
        })
}

/// Fetches a video the caller may see. Private videos are visible to the
/// owning channel only.
fn load_visible(
    catalog: &CatalogStore,
    session: Option<&Session>,
    video_id: &str,
) -> anyhow::Result<Option<VideoRecord>> {
    let Some(video) = catalog.get_video(video_id)? else {
        return Ok(None);
    };
    if video.privacy != Privacy::Private {
        return Ok(Some(video));
    }
    let owner = match session {
        Some(session) => catalog.channel_for_user(session)?,
        None => None,
    };
    Ok(owner
        .filter(|channel| channel.id == video.channel_id)
        .map(|_| video))
}

fn video_not_found() -> ApiError {
    ApiError::NotFound("video not found".into())
}

async fn into_cards(resolver: &SignedUrlResolver, records: Vec<VideoRecord>) -> Vec<VideoCard> {
    let mut signing = JoinSet::new();
    for (index, record) in records.iter().enumerate() {
        let resolver = resolver.clone();
        let thumbnail = MediaRef::new(Bucket::Thumbnails, record.thumbnail_path.clone());
        signing.spawn(async move { (index, resolver.resolve_ref(&thumbnail).await) });
    }

    let mut thumbnails: Vec<Option<String>> = vec![None; records.len()];
    while let Some(joined) = signing.join_next().await {
        match joined {
            Ok((index, grant)) => thumbnails[index] = grant.map(|grant| grant.url),
            Err(err) => warn!(error = %err, "thumbnail signing task failed"),
        }
    }

    records
        .into_iter()
        .zip(thumbnails)
        .map(|(video, thumbnail_url)| VideoCard {
            video,
            thumbnail_url,
        })
        .collect()
}

async fn list_videos(State(state): State<ApiState>) -> ApiResult<Json<Vec<VideoCard>>> {
    let catalog = state.catalog.clone();
    let records = blocking(move || catalog.list_public(DEFAULT_PAGE_SIZE)).await?;
    Ok(Json(into_cards(&state.resolver, records).await))
}

async fn search_videos(
    State(state): State<ApiState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Vec<VideoCard>>> {
    let query = params.q.trim().to_string();
    if query.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let catalog = state.catalog.clone();
    let records = blocking(move || catalog.search(&query, DEFAULT_PAGE_SIZE)).await?;
    Ok(Json(into_cards(&state.resolver, records).await))
}

async fn watch_video(
    State(state): State<ApiState>,
    session: Option<Session>,
    Path(id): Path<String>,
) -> ApiResult<Json<WatchPayload>> {
    let catalog = state.catalog.clone();
    let (video, user_reaction) = blocking(move || {
        let Some(video) = load_visible(&catalog, session.as_ref(), &id)? else {
            return Ok(None);
        };
        let reaction = match &session {
            Some(session) => catalog.user_reaction(session, &id)?,
            None => None,
        };
        Ok(Some((video, reaction)))
    })
    .await?
    .ok_or_else(video_not_found)?;

    let (video_grant, thumbnail_grant) = state
        .resolver
        .resolve_pair(video.video_path.as_deref(), video.thumbnail_path.as_deref())
        .await;

    Ok(Json(WatchPayload {
        video,
        video_url_expires_at: video_grant.as_ref().map(|grant| grant.expires_at),
        video_url: video_grant.map(|grant| grant.url),
        thumbnail_url: thumbnail_grant.map(|grant| grant.url),
        user_reaction,
    }))
}

async fn related_videos(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<VideoCard>>> {
    let catalog = state.catalog.clone();
    let records = blocking(move || catalog.related(&id, RELATED_PAGE_SIZE)).await?;
    Ok(Json(into_cards(&state.resolver, records).await))
}

async fn record_view(
    State(state): State<ApiState>,
    session: Session,
    Path(id): Path<String>,
) -> ApiResult<Json<ViewResponse>> {
    let catalog = state.catalog.clone();
    let view_count = blocking(move || {
        if load_visible(&catalog, Some(&session), &id)?.is_none() {
            return Ok(None);
        }
        catalog.record_view(&session, &id).map(Some)
    })
    .await?
    .ok_or_else(video_not_found)?;
    Ok(Json(ViewResponse { view_count }))
}

async fn set_reaction(
    State(state): State<ApiState>,
    session: Session,
    Path(id): Path<String>,
    Json(request): Json<ReactionRequest>,
) -> ApiResult<Json<ReactionResponse>> {
    let catalog = state.catalog.clone();
    let response = blocking(move || {
        if load_visible(&catalog, Some(&session), &id)?.is_none() {
            return Ok(None);
        }
        let reaction = catalog.set_reaction(&session, &id, request.is_like)?;
        let Some(video) = catalog.get_video(&id)? else {
            return Ok(None);
        };
        Ok(Some(ReactionResponse {
            reaction,
            like_count: video.like_count,
            dislike_count: video.dislike_count,
        }))
    })
    .await?
    .ok_or_else(video_not_found)?;
    Ok(Json(response))
}

async fn my_channel(
    State(state): State<ApiState>,
    session: Session,
) -> ApiResult<Json<ChannelRecord>> {
    let catalog = state.catalog.clone();
    let channel = blocking(move || catalog.channel_for_user(&session))
        .await?
        .ok_or_else(|| ApiError::NotFound("no channel yet".into()))?;
    Ok(Json(channel))
}

async fn create_channel(
    State(state): State<ApiState>,
    session: Session,
    Json(request): Json<CreateChannelRequest>,
) -> ApiResult<(StatusCode, Json<ChannelRecord>)> {
    let catalog = state.catalog.clone();
    let channel = blocking(move || {
        match catalog.create_channel(&session, &request.name, &request.handle) {
            Ok(channel) => Ok(Ok(channel)),
            Err(err) => match err.downcast::<ChannelError>() {
                Ok(rejected) => Ok(Err(rejected)),
                Err(err) => Err(err),
            },
        }
    })
    .await?
    .map_err(|rejected| match rejected {
        ChannelError::Invalid => ApiError::BadRequest(rejected.to_string()),
        ChannelError::Taken(_) => ApiError::Conflict(rejected.to_string()),
    })?;
    info!(channel = %channel.handle, "channel created");
    Ok((StatusCode::CREATED, Json(channel)))
}

async fn create_upload(
    State(state): State<ApiState>,
    session: Session,
    Json(request): Json<UploadRequest>,
) -> ApiResult<(StatusCode, Json<VideoRecord>)> {
    let title = request.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title is required".into()));
    }
    if request.video_file_name.trim().is_empty() {
        return Err(ApiError::BadRequest("a video file is required".into()));
    }

    let catalog = state.catalog.clone();
    let video = blocking(move || {
        let Some(channel) = catalog.channel_for_user(&session)? else {
            return Ok(None);
        };
        let uploaded_at = Utc::now().timestamp_millis();
        let new_video = NewVideo {
            channel_id: channel.id,
            title,
            description: request.description,
            video_path: object_path(&session.user_id, uploaded_at, &request.video_file_name),
            thumbnail_path: request
                .thumbnail_file_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .map(|name| object_path(&session.user_id, uploaded_at, name)),
            privacy: request.privacy,
            tags: parse_tags(&request.tags),
        };
        catalog.insert_video(&new_video).map(Some)
    })
    .await?
    .ok_or_else(|| ApiError::Forbidden("create a channel before uploading".into()))?;

    info!(video_id = %video.id, privacy = %video.privacy, "video recorded");
    Ok((StatusCode::CREATED, Json(video)))
}

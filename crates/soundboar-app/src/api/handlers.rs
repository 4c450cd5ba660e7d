//! HTTP handlers. The player lock is only ever held for synchronous calls
//! that do not touch the disk; durations are read from detached slot views
//! after it is released.

use std::collections::BTreeMap;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use soundboar_core::media::{check_audio_url, to_file_id};
use soundboar_core::{Error, LastError, TransportState};
use soundboar_player::RemoveTarget;
use soundboar_repository::FileEntry;
use tracing::{debug, info};

use super::error::ApiResult;
use super::AppState;

const OG_TITLE: &str = "og:title";
const OG_AUDIO: &str = "og:audio";

#[derive(Debug, Deserialize)]
pub struct IndexQuery {
    pub index: Option<isize>,
}

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub index: Option<isize>,
    pub relative: Option<isize>,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: Option<isize>,
    pub end: Option<isize>,
}

#[derive(Debug, Deserialize)]
pub struct PauseQuery {
    pub do_pause: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct VolumeQuery {
    pub level: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct PositionQuery {
    pub pct: Option<f64>,
}

/// One playlist slot as listed by `/playlist`.
#[derive(Debug, Serialize)]
pub struct PlaylistEntry {
    pub index: usize,
    pub id: String,
    pub location: PathBuf,
    /// Milliseconds, when the file could be parsed.
    pub duration: Option<u64>,
    pub current: bool,
}

/// Snapshot returned by `/status`.
#[derive(Debug, Serialize)]
pub struct Status {
    pub state: TransportState,
    pub index: Option<usize>,
    pub size: usize,
    pub identifier: Option<String>,
    pub volume: u8,
    pub position: f64,
    pub last_error: Option<LastError>,
}

/// A stored file and its position in the library listing.
pub type Stored = (FileEntry, usize);

pub async fn files(State(state): State<AppState>) -> ApiResult<Json<BTreeMap<String, FileEntry>>> {
    let repository = state.repository.clone();
    let entries = tokio::task::spawn_blocking(move || repository.all()).await??;
    Ok(Json(entries.into_iter().map(|e| (e.id.clone(), e)).collect()))
}

pub async fn play(State(state): State<AppState>, Path(file_id): Path<String>) -> ApiResult<Json<String>> {
    let location = existing_file(&state, &file_id).await?;
    info!("Play {file_id}");
    Ok(Json(state.player.lock().play(location)))
}

pub async fn add(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
    Query(query): Query<IndexQuery>,
) -> ApiResult<Json<String>> {
    let location = existing_file(&state, &file_id).await?;
    Ok(Json(state.player.lock().add(location, query.index)))
}

pub async fn remove_index(State(state): State<AppState>, Query(query): Query<IndexQuery>) -> ApiResult<Json<bool>> {
    let index = query
        .index
        .ok_or_else(|| Error::InvalidArgument("index is required".to_string()))?;
    Ok(Json(state.player.lock().remove(RemoveTarget::Index(index)).is_some()))
}

pub async fn remove_file(State(state): State<AppState>, Path(file_id): Path<String>) -> ApiResult<Json<bool>> {
    let location = state.repository.file(&file_id)?;
    Ok(Json(state.player.lock().remove(RemoveTarget::Location(location)).is_some()))
}

pub async fn download(State(state): State<AppState>, Path(file_id): Path<String>) -> ApiResult<Response> {
    let location = existing_file(&state, &file_id).await?;
    let data = tokio::fs::read(&location).await.map_err(Error::from)?;

    let mut filename = file_id.rsplit('/').next().unwrap_or(&file_id).to_string();
    if let Some(suffix) = location.extension().and_then(|e| e.to_str()) {
        if !filename.ends_with(&format!(".{suffix}")) {
            filename = format!("{filename}.{suffix}");
        }
    }
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .map_err(|e| Error::Internal(format!("Bad file name {filename}: {e}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(data),
    )
        .into_response())
}

pub async fn pause(State(state): State<AppState>, Query(query): Query<PauseQuery>) -> Json<bool> {
    Json(state.player.lock().pause(query.do_pause))
}

pub async fn next(State(state): State<AppState>) -> Json<bool> {
    Json(state.player.lock().next())
}

pub async fn previous(State(state): State<AppState>) -> Json<bool> {
    Json(state.player.lock().previous())
}

pub async fn stop(State(state): State<AppState>) -> Json<()> {
    state.player.lock().stop();
    Json(())
}

pub async fn clear(State(state): State<AppState>) -> Json<()> {
    state.player.lock().clear();
    Json(())
}

pub async fn restart(State(state): State<AppState>) -> Json<()> {
    state.player.lock().restart();
    Json(())
}

pub async fn duration(State(state): State<AppState>, Query(query): Query<LookupQuery>) -> ApiResult<Json<Option<u64>>> {
    let view = state.player.lock().slot_view(query.index, query.relative)?;
    let duration = match view {
        Some(view) => tokio::task::spawn_blocking(move || view.duration()).await?,
        None => None,
    };
    Ok(Json(duration))
}

pub async fn identifier(
    State(state): State<AppState>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<Json<Option<String>>> {
    Ok(Json(state.player.lock().identifier(query.index, query.relative)?))
}

pub async fn playlist(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<PlaylistEntry>>> {
    let start = query.start.unwrap_or(0);
    let end = query.end.unwrap_or(isize::MAX);
    let views = state.player.lock().slot_views_from_to(start, end);

    let entries = tokio::task::spawn_blocking(move || {
        views
            .into_iter()
            .map(|view| PlaylistEntry {
                index: view.index(),
                id: view.id().to_string(),
                location: view.location().to_path_buf(),
                duration: view.duration(),
                current: view.is_current(),
            })
            .collect::<Vec<_>>()
    })
    .await?;

    Ok(Json(entries))
}

pub async fn state(State(state): State<AppState>) -> Json<TransportState> {
    Json(state.player.lock().state())
}

pub async fn volume(State(state): State<AppState>, Query(query): Query<VolumeQuery>) -> Json<u8> {
    Json(state.player.lock().volume(query.level))
}

pub async fn position(State(state): State<AppState>, Query(query): Query<PositionQuery>) -> ApiResult<Json<f64>> {
    Ok(Json(state.player.lock().position(query.pct)?))
}

pub async fn status(State(state): State<AppState>) -> ApiResult<Json<Status>> {
    let mut player = state.player.lock();
    Ok(Json(Status {
        state: player.state(),
        index: player.index(),
        size: player.size(),
        identifier: player.identifier(None, None)?,
        volume: player.volume(None),
        position: player.position(None)?,
        last_error: player.last_error(),
    }))
}

pub async fn upload_file(
    State(state): State<AppState>,
    Path(request_file_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<Stored>> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let source_name = field.file_name().unwrap_or_default().to_string();
        let file_id = to_file_id(&request_file_id, &source_name, state.repository.supported())?;
        let data = field.bytes().await?;
        debug!("Upload of {} bytes as {file_id}", data.len());
        return store(&state, &file_id, &data).await.map(Json);
    }

    Err(Error::InvalidArgument("Missing form field: file".to_string()).into())
}

pub async fn og_title(
    State(state): State<AppState>,
    Path(website): Path<String>,
) -> ApiResult<Json<Option<String>>> {
    let mut tags = state.extractor.extract_meta(&website, &[OG_TITLE, OG_AUDIO]).await?;
    check_audio_url(
        tags.get(OG_AUDIO).and_then(Option::as_deref),
        state.repository.supported(),
    )?;
    Ok(Json(tags.remove(OG_TITLE).flatten()))
}

pub async fn upload_from_url(
    State(state): State<AppState>,
    Path((request_file_id, website)): Path<(String, String)>,
) -> ApiResult<Json<Stored>> {
    let tags = state.extractor.extract_meta(&website, &[OG_AUDIO]).await?;
    let audio_url = check_audio_url(
        tags.get(OG_AUDIO).and_then(Option::as_deref),
        state.repository.supported(),
    )?;

    let source_name = audio_url.split(['?', '#']).next().unwrap_or(audio_url);
    let file_id = to_file_id(&request_file_id, source_name, state.repository.supported())?;
    let data = state.extractor.download(audio_url).await?;
    info!("Fetched {file_id} from {website}");
    store(&state, &file_id, &data).await.map(Json)
}

pub async fn delete_file(State(state): State<AppState>, Path(file_id): Path<String>) -> ApiResult<Json<bool>> {
    Ok(Json(state.repository.delete(&file_id).await?))
}

async fn existing_file(state: &AppState, file_id: &str) -> ApiResult<PathBuf> {
    let location = state.repository.file(file_id)?;
    let is_file = tokio::fs::metadata(&location).await.is_ok_and(|m| m.is_file());
    if !is_file {
        return Err(Error::NotFound(format!("File with ID {file_id} does not exist")).into());
    }
    Ok(location)
}

async fn store(state: &AppState, file_id: &str, data: &[u8]) -> ApiResult<Stored> {
    let entry = state.repository.write(data, file_id).await?;
    let position = state.repository.file_position(file_id)?;
    Ok((entry, position))
}

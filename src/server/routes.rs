//! REST handlers.
//!
//! - `/api/heap`, `/api/trash`, `/api/stories`, `/api/overlays`: scrapbook
//! - `/api/agents`, `/api/chat`, `/api/roles`: the agent crew and chat
//! - `/api/backup`: export, preview, import
//! - `/api/layout`: justified row packing
//! - `/api/proxy`, `/api/album`: Google-hosted image fetches

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{ApiError, AppState};
use crate::backup::{self, ImportReport};
use crate::chat::{self, types::ChatRequest, types::ChatResponse};
use crate::layout::{self, Layout, LayoutItem, LayoutOptions};
use crate::roles::{self, RoleDoc};
use crate::scrapbook::types::{Agent, AgentPatch, Moment, NewAgent, NewMoment, Overlay, StoryMeta};
use crate::scrapbook::{agents, heap, overlays, stats, stories, trash};
use crate::proxy;

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stats", get(scrapbook_stats))
        .route("/api/heap", get(list_heap).post(add_moments))
        .route("/api/heap/trash", post(trash_moments))
        .route("/api/heap/select", post(toggle_select))
        .route("/api/trash", get(list_trash))
        .route("/api/trash/restore", post(restore_trash))
        .route("/api/trash/empty", post(empty_trash))
        .route("/api/trash/{id}", delete(delete_forever))
        .route("/api/stories", get(list_stories).post(create_story))
        .route(
            "/api/stories/{id}",
            get(story_items).patch(rename_story).delete(delete_story),
        )
        .route("/api/stories/{id}/add", post(add_to_story))
        .route("/api/stories/{id}/remove", post(remove_from_story))
        .route("/api/stories/{id}/move", post(move_in_story))
        .route("/api/overlays", get(list_overlays))
        .route("/api/overlays/{id}", put(set_overlay).delete(clear_overlay))
        .route("/api/agents", get(list_agents).post(create_agent))
        .route("/api/agents/{id}", patch(update_agent).delete(delete_agent))
        .route("/api/backup", get(export_backup).post(import_backup))
        .route("/api/backup/preview", get(preview_backup))
        .route("/api/layout", post(compute_layout))
        .route("/api/chat", post(chat_completion))
        .route("/api/roles", get(list_roles))
        .route("/api/proxy", get(proxy_image))
        .route("/api/album", get(fetch_album))
        .with_state(state)
}

// =============================================================================
// Request bodies
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AddMomentsRequest {
    pub moments: Vec<NewMoment>,
}

#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdRequest {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateStoryRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenameStoryRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    pub items: Vec<LayoutItem>,
    pub container_width: f64,
    #[serde(default)]
    pub target_row_height: Option<f64>,
    #[serde(default)]
    pub gap: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub u: String,
}

#[derive(Debug, Deserialize)]
pub struct AlbumQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AlbumResponse {
    pub images: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Count {
    pub count: usize,
}

// =============================================================================
// Health
// =============================================================================

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn scrapbook_stats(State(state): State<AppState>) -> ApiResult<stats::ScrapbookStats> {
    let report = state.with_db(|conn| stats::scrapbook_stats(conn)).await?;
    Ok(Json(report))
}

// =============================================================================
// Heap
// =============================================================================

async fn list_heap(State(state): State<AppState>) -> ApiResult<Vec<Moment>> {
    Ok(Json(state.with_db(|conn| heap::list_heap(conn)).await?))
}

async fn add_moments(
    State(state): State<AppState>,
    Json(req): Json<AddMomentsRequest>,
) -> Result<(StatusCode, Json<Vec<Moment>>), ApiError> {
    let added = state
        .with_db(move |conn| heap::add_to_heap(conn, req.moments))
        .await?;
    Ok((StatusCode::CREATED, Json(added)))
}

async fn trash_moments(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<Count> {
    let count = state
        .with_db(move |conn| heap::trash_moments(conn, &req.ids))
        .await?;
    Ok(Json(Count { count }))
}

async fn toggle_select(
    State(state): State<AppState>,
    Json(req): Json<IdRequest>,
) -> ApiResult<Value> {
    let id = req.id;
    let selected = {
        let id = id.clone();
        state
            .with_db(move |conn| heap::toggle_selected(conn, &id))
            .await?
    };
    Ok(Json(json!({ "id": id, "selected": selected })))
}

// =============================================================================
// Trash
// =============================================================================

async fn list_trash(State(state): State<AppState>) -> ApiResult<Vec<Moment>> {
    Ok(Json(state.with_db(|conn| trash::list_trash(conn)).await?))
}

async fn restore_trash(
    State(state): State<AppState>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<Count> {
    let count = state
        .with_db(move |conn| trash::restore(conn, &req.ids))
        .await?;
    Ok(Json(Count { count }))
}

async fn empty_trash(State(state): State<AppState>) -> ApiResult<Count> {
    let count = state.with_db(|conn| trash::empty_trash(conn)).await?;
    Ok(Json(Count { count }))
}

async fn delete_forever(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .with_db(move |conn| trash::delete_forever(conn, &[id]))
        .await?;
    if removed == 0 {
        return Err(ApiError::not_found("moment not in trash"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Stories
// =============================================================================

async fn list_stories(State(state): State<AppState>) -> ApiResult<Vec<StoryMeta>> {
    Ok(Json(state.with_db(|conn| stories::list_stories(conn)).await?))
}

/// The body is optional; an empty POST creates an untitled story.
async fn create_story(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<StoryMeta>), ApiError> {
    let req: CreateStoryRequest = if body.trim().is_empty() {
        CreateStoryRequest::default()
    } else {
        serde_json::from_str(&body).map_err(|e| ApiError::bad_request(e.to_string()))?
    };
    let title = req.title;
    let story = state
        .with_db(move |conn| stories::create_story(conn, title.as_deref()))
        .await?;
    Ok((StatusCode::CREATED, Json(story)))
}

async fn story_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<Moment>> {
    Ok(Json(
        state
            .with_db(move |conn| stories::story_items(conn, &id))
            .await?,
    ))
}

async fn rename_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RenameStoryRequest>,
) -> ApiResult<StoryMeta> {
    Ok(Json(
        state
            .with_db(move |conn| stories::rename_story(conn, &id, &req.title))
            .await?,
    ))
}

async fn delete_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Count> {
    let count = state
        .with_db(move |conn| stories::delete_story(conn, &id))
        .await?;
    Ok(Json(Count { count }))
}

async fn add_to_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<Count> {
    let count = state
        .with_db(move |conn| stories::add_to_story(conn, &id, &req.ids))
        .await?;
    Ok(Json(Count { count }))
}

async fn remove_from_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<IdsRequest>,
) -> ApiResult<Count> {
    let count = state
        .with_db(move |conn| stories::remove_from_story(conn, &id, &req.ids))
        .await?;
    Ok(Json(Count { count }))
}

async fn move_in_story(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .with_db(move |conn| stories::move_within_story(conn, &id, req.from, req.to))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Overlays
// =============================================================================

async fn list_overlays(State(state): State<AppState>) -> ApiResult<overlays::OverlayMap> {
    Ok(Json(state.with_db(|conn| overlays::list_overlays(conn)).await?))
}

async fn set_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(overlay): Json<Overlay>,
) -> ApiResult<Overlay> {
    let stored = overlay.clone();
    state
        .with_db(move |conn| overlays::set_overlay(conn, &id, overlay))
        .await?;
    Ok(Json(stored))
}

async fn clear_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let removed = state
        .with_db(move |conn| overlays::clear_overlay(conn, &id))
        .await?;
    if !removed {
        return Err(ApiError::not_found("no overlay for moment"));
    }
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Agents
// =============================================================================

async fn list_agents(State(state): State<AppState>) -> ApiResult<Vec<Agent>> {
    Ok(Json(state.with_db(|conn| agents::list_agents(conn)).await?))
}

async fn create_agent(
    State(state): State<AppState>,
    Json(req): Json<NewAgent>,
) -> Result<(StatusCode, Json<Agent>), ApiError> {
    let agent = state
        .with_db(move |conn| agents::create_agent(conn, req))
        .await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<AgentPatch>,
) -> ApiResult<Agent> {
    Ok(Json(
        state
            .with_db(move |conn| agents::update_agent(conn, &id, patch))
            .await?,
    ))
}

async fn delete_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .with_db(move |conn| agents::delete_agent(conn, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Backup
// =============================================================================

async fn export_backup(State(state): State<AppState>) -> Result<Response, ApiError> {
    let body = state.with_db(|conn| backup::export_json(conn)).await?;
    let filename = format!(
        "attachment; filename=\"matrix-backup-{}.json\"",
        chrono::Utc::now().format("%Y%m%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        body,
    )
        .into_response())
}

async fn preview_backup(State(state): State<AppState>) -> ApiResult<Value> {
    Ok(Json(state.with_db(|conn| backup::preview(conn)).await?))
}

async fn import_backup(State(state): State<AppState>, body: String) -> ApiResult<ImportReport> {
    Ok(Json(
        state
            .with_db(move |conn| backup::import_backup(conn, &body))
            .await?,
    ))
}

// =============================================================================
// Layout
// =============================================================================

async fn compute_layout(
    State(state): State<AppState>,
    Json(req): Json<LayoutRequest>,
) -> ApiResult<Layout> {
    if !req.container_width.is_finite() || req.container_width <= 0.0 {
        return Err(ApiError::bad_request("containerWidth must be a positive number"));
    }
    let defaults = LayoutOptions::from(&state.config.layout);
    let options = LayoutOptions {
        target_row_height: req
            .target_row_height
            .filter(|h| h.is_finite() && *h > 0.0)
            .unwrap_or(defaults.target_row_height),
        gap: req.gap.filter(|g| g.is_finite()).unwrap_or(defaults.gap),
    };
    Ok(Json(layout::pack_rows(&req.items, req.container_width, options)))
}

// =============================================================================
// Chat and roles
// =============================================================================

async fn chat_completion(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<ChatResponse> {
    let stored = state.with_db(|conn| agents::list_agents(conn)).await?;
    let response = chat::run_chat(state.llm.as_ref(), &req, stored, &state.config.chat).await;
    Ok(Json(response))
}

async fn list_roles(State(state): State<AppState>) -> ApiResult<Vec<RoleDoc>> {
    let dir = state.config.resolved_roles_dir();
    let roles = tokio::task::spawn_blocking(move || roles::load_roles(&dir))
        .await
        .map_err(|e| ApiError::internal(format!("roles task failed: {e}")))??;
    Ok(Json(roles))
}

// =============================================================================
// Proxies
// =============================================================================

async fn proxy_image(
    State(state): State<AppState>,
    Query(query): Query<ProxyQuery>,
) -> Result<Response, ApiError> {
    let image = proxy::fetch_image(&state.http, &query.u, &state.config.proxy).await?;
    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "public, max-age=86400".to_string()),
        ],
        image.body,
    )
        .into_response())
}

async fn fetch_album(
    State(state): State<AppState>,
    Query(query): Query<AlbumQuery>,
) -> ApiResult<AlbumResponse> {
    let images = proxy::fetch_album(&state.http, &query.url, &state.config.proxy).await?;
    Ok(Json(AlbumResponse { images }))
}

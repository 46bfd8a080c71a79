//! HTTP API
//!
//! Login hands out a bearer token; every game route resolves that token to
//! the caller's [`Connection`] through the [`AuthedConnection`] extractor.

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{basic_credentials, bearer_token};
use crate::error::ApiError;
use crate::game::score::GameSummary;
use crate::game::{GameRequest, RoundOutcome};
use crate::protocol::*;
use crate::state::chat::ChatMessage;
use crate::state::connection::Connection;
use crate::state::AppState;
use crate::types::{CategoryGroupDefinition, RoundView};
use crate::ws;

/// Header carrying the admin password for the chat bridge
pub const ADMIN_PASSWORD_HEADER: &str = "x-admin-password";

/// The connection owning the request's bearer token
pub struct AuthedConnection(pub Arc<Connection>);

impl FromRequestParts<Arc<AppState>> for AuthedConnection {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let conn = state
            .authenticate(token)
            .await
            .ok_or(ApiError::Unauthorized)?;
        Ok(AuthedConnection(conn))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/categories", get(list_categories).put(reload_categories))
        .route("/media/{id}", get(get_media))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/game", post(start_game).get(game_status).delete(end_game))
        .route("/game/round", get(current_round))
        .route("/game/round/next", post(next_round))
        .route("/game/vote", post(vote))
        .route("/chat", post(chat))
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /categories
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<CategoryGroupDefinition>> {
    Json(state.categories().await)
}

/// PUT /categories
///
/// Reloads the catalog from its configured source. On failure the current
/// catalog stays active.
pub async fn reload_categories(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReloadRequest>,
) -> Result<Json<ReloadResponse>, ApiError> {
    if !state.check_admin_password(&request.password) {
        return Err(ApiError::Forbidden);
    }
    Ok(Json(state.reload_catalog().await?))
}

/// GET /media/{id}
pub async fn get_media(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let data = state
        .media(&id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("media {}", id)))?;

    Ok((
        [
            (header::CONTENT_TYPE, sniff_content_type(&data)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        Bytes::copy_from_slice(&data),
    ))
}

/// Media ids are content hashes, so the type comes from the bytes
fn sniff_content_type(data: &[u8]) -> &'static str {
    match data {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<LoginResponse>, ApiError> {
    let (username, password) = basic_credentials(&headers).ok_or(ApiError::Unauthorized)?;
    Ok(Json(state.login(&username, &password).await?))
}

/// POST /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthedConnection(conn): AuthedConnection,
) -> StatusCode {
    state.logout(&conn).await;
    StatusCode::NO_CONTENT
}

/// POST /game
pub async fn start_game(
    State(state): State<Arc<AppState>>,
    AuthedConnection(conn): AuthedConnection,
    Json(request): Json<GameRequest>,
) -> Result<(StatusCode, Json<RoundView>), ApiError> {
    let round = state.start_game(&conn, &request).await?;
    Ok((StatusCode::CREATED, Json(round)))
}

/// GET /game
pub async fn game_status(
    AuthedConnection(conn): AuthedConnection,
) -> Result<Json<GameStatus>, ApiError> {
    Ok(Json(conn.status().await?))
}

/// DELETE /game
pub async fn end_game(
    AuthedConnection(conn): AuthedConnection,
) -> Result<Json<GameSummary>, ApiError> {
    Ok(Json(conn.end_game().await?))
}

/// GET /game/round
pub async fn current_round(
    AuthedConnection(conn): AuthedConnection,
) -> Result<Json<RoundView>, ApiError> {
    Ok(Json(conn.current_round().await?))
}

/// POST /game/round/next
pub async fn next_round(
    AuthedConnection(conn): AuthedConnection,
) -> Result<Json<RoundOutcome>, ApiError> {
    Ok(Json(conn.advance().await?))
}

/// POST /game/vote
pub async fn vote(
    AuthedConnection(conn): AuthedConnection,
    Json(request): Json<VoteRequest>,
) -> Result<Json<VoteResponse>, ApiError> {
    let vote = conn.streamer_vote(&request.vote).await?;
    Ok(Json(VoteResponse { vote }))
}

/// POST /chat
///
/// Entry point for an external chat bridge, guarded by the admin password.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(msg): Json<ChatMessage>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let password = headers
        .get(ADMIN_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !state.check_admin_password(password) {
        return Err(ApiError::Forbidden);
    }

    let delivered = state.dispatch_chat(msg).await;
    Ok(Json(serde_json::json!({ "delivered": delivered })))
}

//! HTTP surface: login, listing, and delete-job control.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRef, Query, Request, State};
use axum::http::header::LOCATION;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::{Owner, SessionKeys};
use crate::config::AppConfig;
use crate::error::{AuthError, JobError, PlatformError};
use crate::jobs::JobCoordinator;
use crate::platform::{CredentialStore, OAuthFlow, RemotePlatform, TwitterClient};

/// Response header carrying a per-request id.
pub const RAY_ID_HEADER: HeaderName = HeaderName::from_static("x-ray-id");

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: JobCoordinator,
    pub platform: Arc<dyn RemotePlatform>,
    pub oauth: Arc<OAuthFlow>,
    pub keys: Arc<SessionKeys>,
}

impl AppState {
    /// Wire the production platform client, login flow, and job coordinator.
    pub fn from_config(config: &AppConfig) -> crate::error::Result<Self> {
        let credentials = CredentialStore::new();
        let platform: Arc<dyn RemotePlatform> = Arc::new(TwitterClient::new(
            config.api_base_url.clone(),
            config.request_timeout,
            Arc::clone(&credentials),
        )?);
        let oauth = Arc::new(OAuthFlow::new(config, credentials)?);
        let keys = Arc::new(SessionKeys::new(
            &config.jwt_key,
            config.session_timeout,
            config.max_refresh,
        ));

        Ok(Self {
            coordinator: JobCoordinator::new(Arc::clone(&platform)),
            platform,
            oauth,
            keys,
        })
    }
}

impl FromRef<AppState> for Arc<SessionKeys> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.keys)
    }
}

/// Build the full router.
pub fn app_routes(state: AppState) -> Router {
    let api = Router::new()
        .route("/refresh_token", get(refresh_token))
        .route("/self", get(get_self))
        .route("/tweets", get(list_tweets).delete(delete_all_tweets))
        .route("/stop", get(stop_delete));

    Router::new()
        .route("/", get(home))
        .nest("/api", api)
        .layer(middleware::from_fn(inject_ray_id))
        .route("/login", get(request_login).post(login))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn inject_ray_id(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
        response.headers_mut().insert(RAY_ID_HEADER, value);
    }
    response
}

// ── Errors ──────────────────────────────────────────────────────────────

/// Handler error, rendered as JSON.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Job conflicts are soft failures, reported with 202.
            ApiError::Job(e) => {
                (StatusCode::ACCEPTED, Json(json!({ "error": e.to_string() }))).into_response()
            }
            ApiError::Auth(e) => e.into_response(),
            ApiError::Platform(PlatformError::NotAuthenticated { owner }) => {
                let message = format!("No platform session for {owner}, log in again");
                error_body(StatusCode::UNAUTHORIZED, &message)
            }
            ApiError::Platform(e) => {
                warn!(error = %e, "Platform call failed");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match self {
            AuthError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        };
        error_body(status, &self.to_string())
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (
        status,
        Json(json!({ "code": status.as_u16(), "message": message })),
    )
        .into_response()
}

// ── Login ───────────────────────────────────────────────────────────────

/// GET /
///
/// Callback landing page; echoes the handshake parameters back to
/// the front-end, which posts them to `/login`.
async fn home(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    Json(json!({
        "code": params.get("code").cloned().unwrap_or_default(),
        "state": params.get("state").cloned().unwrap_or_default(),
    }))
}

/// GET /login
///
/// Redirect to the platform's authorization page.
async fn request_login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let url = state.oauth.authorize_url().await?;
    Ok((StatusCode::FOUND, [(LOCATION, url.to_string())]).into_response())
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub code: String,
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub code: u16,
    pub token: String,
    pub expire: String,
}

/// POST /login
///
/// Finish the handshake and issue a session token.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let grant = state.oauth.complete(&request.code, &request.state).await?;
    let session = state.keys.issue(&grant.owner)?;
    Ok(Json(TokenResponse {
        code: StatusCode::OK.as_u16(),
        token: session.token,
        expire: session.expire.to_rfc3339(),
    }))
}

/// GET /api/refresh_token
async fn refresh_token(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Json<TokenResponse>, ApiError> {
    let session = state.keys.refresh(&owner.claims)?;
    Ok(Json(TokenResponse {
        code: StatusCode::OK.as_u16(),
        token: session.token,
        expire: session.expire.to_rfc3339(),
    }))
}

// ── Posts ───────────────────────────────────────────────────────────────

/// GET /api/self
async fn get_self(State(state): State<AppState>, owner: Owner) -> Result<Response, ApiError> {
    let profile = state.platform.profile(&owner.id).await?;
    Ok(Json(profile).into_response())
}

#[derive(Debug, Deserialize)]
struct TweetsQuery {
    rt: Option<String>,
}

#[derive(Debug, Serialize)]
struct TweetView {
    text: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "isRT")]
    is_rt: bool,
}

/// GET /api/tweets?rt=true
///
/// The caller chooses whether reposts are listed.
async fn list_tweets(
    State(state): State<AppState>,
    owner: Owner,
    Query(query): Query<TweetsQuery>,
) -> Result<Response, ApiError> {
    let include_reposts = query.rt.as_deref() == Some("true");
    let items = state
        .platform
        .fetch_remaining(&owner.id, include_reposts)
        .await?;

    let tweets: Vec<TweetView> = items
        .into_iter()
        .map(|item| TweetView {
            text: item.text,
            created_at: item.created_at,
            is_rt: item.is_repost,
        })
        .collect();

    debug!(owner = %owner.id, count = tweets.len(), "Listed tweets");
    Ok(Json(json!({
        "tweet_counts": tweets.len(),
        "tweets": tweets,
    }))
    .into_response())
}

/// DELETE /api/tweets
///
/// Start a background sweep.
async fn delete_all_tweets(
    State(state): State<AppState>,
    owner: Owner,
) -> Result<Response, ApiError> {
    // Stale platform credentials surface here as 401, before any job exists.
    state.platform.profile(&owner.id).await?;
    state.coordinator.run_job(&owner.id).await?;
    Ok(Json(json!({ "message": "Started Delete Job" })).into_response())
}

/// GET /api/stop
///
/// Signal the running sweep to stop.
async fn stop_delete(State(state): State<AppState>, owner: Owner) -> Result<Response, ApiError> {
    state.coordinator.stop_job(&owner.id).await?;
    Ok(Json(json!({ "message": "Successfully stopped job" })).into_response())
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "running_jobs": state.coordinator.running_count().await,
    }))
}

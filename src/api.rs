use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing,
};
use rearch::CapsuleHandle;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    auth,
    config::{Config, config_capsule},
    link_repo::Link,
    link_service::{CreateLinkError, LinkService, ResolveError, link_service_capsule},
};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub links: Arc<dyn LinkService>,
    pub config: Arc<Config>,
}

pub fn app_state_capsule(CapsuleHandle { mut get, .. }: CapsuleHandle) -> AppState {
    AppState {
        links: Arc::clone(get.as_ref(link_service_capsule)),
        config: Arc::new(get.as_ref(config_capsule).clone()),
    }
}

/// Reads live on `/` and `/{key}`; writes live under `/api/links`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", routing::get(index))
        .route("/{key}", routing::get(redirect))
        .route("/api/links", routing::post(create_link))
        .route("/api/links/{key}", routing::put(create_custom_link))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
struct LinkPayload {
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct Created {
    success: bool,
    message: &'static str,
    result: Link,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    error_id: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("URL not found")]
    NotFound,
    #[error("This short URL is already taken")]
    Conflict,
    #[error("No default URL configured")]
    NoDefaultUrl,
    #[error("internal error: {0}")]
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err_uuid = Uuid::new_v4();
        let (status, message) = match &self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Conflict => (StatusCode::CONFLICT, self.to_string()),
            Self::NoDefaultUrl => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_owned(),
            ),
        };

        if status.is_server_error() {
            error!(?err_uuid, error = ?self, "Encountered an error during a request");
        } else {
            info!(?err_uuid, error = ?self, "User submitted a bad request");
        }

        (
            status,
            Json(ErrorBody {
                success: false,
                message,
                error_id: err_uuid.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<ResolveError> for ApiError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::NotFound => Self::NotFound,
            ResolveError::Internal(err) => Self::Internal(err),
        }
    }
}

impl From<CreateLinkError> for ApiError {
    fn from(error: CreateLinkError) -> Self {
        match error {
            CreateLinkError::MissingUrl | CreateLinkError::ReservedKey(_) => {
                Self::BadRequest(error.to_string())
            }
            CreateLinkError::KeyTaken => Self::Conflict,
            CreateLinkError::Internal(err) => Self::Internal(err),
        }
    }
}

/// A `302 Found` pointing at `url`.
fn found(url: &str) -> Result<Response, ApiError> {
    let location = HeaderValue::from_bytes(url.as_bytes()).map_err(|err| {
        ApiError::Internal(anyhow::Error::new(err).context("URL is not a valid Location header"))
    })?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

fn authorize(config: &Config, headers: &HeaderMap) -> Result<(), ApiError> {
    let supplied = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if auth::is_authorized(supplied, config.secret.as_deref()) {
        Ok(())
    } else {
        Err(ApiError::Unauthorized)
    }
}

/// An empty body is treated like a body without a `url`.
fn parse_payload(body: &Bytes) -> Result<LinkPayload, ApiError> {
    if body.is_empty() {
        return Ok(LinkPayload::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("Invalid JSON body: {err}")))
}

fn created(link: Link) -> (StatusCode, Json<Created>) {
    (
        StatusCode::CREATED,
        Json(Created {
            success: true,
            message: "Link created successfully",
            result: link,
        }),
    )
}

#[instrument(skip(state))]
async fn index(State(state): State<AppState>) -> Result<Response, ApiError> {
    if state.config.enable_index_form {
        return Ok(Html(INDEX_HTML).into_response());
    }

    let default_url = state
        .config
        .default_url
        .as_deref()
        .ok_or(ApiError::NoDefaultUrl)?;
    found(default_url)
}

#[instrument(skip(state))]
async fn redirect(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let url = state.links.resolve(&key).await?;
    found(&url)
}

#[instrument(skip(state, headers, body))]
async fn create_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    authorize(&state.config, &headers)?;
    let LinkPayload { url } = parse_payload(&body)?;

    let link = state.links.create_link(url).await?;
    info!(key = %link.key, "Created link");
    Ok(created(link))
}

#[instrument(skip(state, headers, body))]
async fn create_custom_link(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Created>), ApiError> {
    authorize(&state.config, &headers)?;
    let LinkPayload { url } = parse_payload(&body)?;

    let link = state.links.create_custom_link(key, url).await?;
    info!(key = %link.key, "Created custom link");
    Ok(created(link))
}

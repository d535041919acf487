//! HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, warn};

use super::service::EmployeeGateway;
use crate::{Error, Result};
use crate::config::{CorsConfig, ServerConfig};
use crate::model::{CreateEmployeeInput, Employee};

/// Shared application state
pub struct AppState {
    /// Employee gateway every handler delegates to
    pub gateway: Arc<EmployeeGateway>,
}

/// Create the router
///
/// Employee routes live under `server.base_path`; `/health` stays at the
/// root.
///
/// # Errors
///
/// Returns [`Error::Config`] if a CORS origin is not a valid header value.
pub fn create_router(state: Arc<AppState>, server: &ServerConfig) -> Result<Router> {
    let base = server.base_path.trim_end_matches('/');
    let collection = if base.is_empty() { "/" } else { base };

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(collection, get(list_handler).post(create_handler))
        .route(&format!("{base}/search/{{fragment}}"), get(search_handler))
        .route(&format!("{base}/highestSalary"), get(highest_salary_handler))
        .route(
            &format!("{base}/topTenHighestEarningEmployeeNames"),
            get(top_ten_handler),
        )
        .route(
            &format!("{base}/{{id}}"),
            get(get_handler).delete(delete_handler),
        )
        .layer(CatchPanicLayer::new());

    let router = match cors_layer(&server.cors)? {
        Some(cors) => router.layer(cors),
        None => router,
    };

    Ok(router.layer(TraceLayer::new_for_http()).with_state(state))
}

/// CORS layer for the configured origins, `None` when disabled
fn cors_layer(config: &CorsConfig) -> Result<Option<CorsLayer>> {
    if !config.enabled || config.allowed_origins.is_empty() {
        return Ok(None);
    }

    let origin = if config.allowed_origins.iter().any(|o| o == "*") {
        if config.allow_credentials {
            return Err(Error::Config(
                "Wildcard CORS origin cannot be combined with credentials".to_string(),
            ));
        }
        AllowOrigin::any()
    } else {
        let origins = config
            .allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|e| Error::Config(format!("Invalid CORS origin {o:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(config.allow_credentials),
    ))
}

/// Gateway error rendered as `{"error": "..."}` with a mapped status
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::TerminalUpstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Error::RetryableUpstream { status: 429, .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::RetryableUpstream { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::Transport(_) | Error::Decode(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "cache": state.gateway.cache_stats(),
    }))
}

async fn list_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Employee>>> {
    Ok(Json(state.gateway.list_employees().await?))
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Path(fragment): Path<String>,
) -> ApiResult<Json<Vec<Employee>>> {
    Ok(Json(state.gateway.search_by_name(&fragment).await?))
}

async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Employee>> {
    Ok(Json(state.gateway.get_by_id(&id).await?))
}

async fn highest_salary_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<i64>> {
    Ok(Json(state.gateway.highest_salary().await?))
}

async fn top_ten_handler(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.gateway.top_ten_earner_names().await?))
}

async fn create_handler(
    State(state): State<Arc<AppState>>,
    Json(input): Json<CreateEmployeeInput>,
) -> ApiResult<(StatusCode, Json<Employee>)> {
    let created = state.gateway.create(&input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<String>> {
    Ok(Json(state.gateway.delete_by_id(&id).await?))
}

//! HTTP surface over the handler registry
//!
//! - `POST /tasks` builds a task from the body and dispatches it
//! - `GET /health` runs every health check and reports [`SystemHealth`]
//! - `GET /handlers` lists handler snapshots, coordinator first
//! - `GET /live` liveness probe

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, Instrument};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::registry::{HandlerRegistry, SystemHealth};
use crate::task::{create_context, create_task, ContextOverrides, Priority, TaskKind, TaskOptions};

/// Largest accepted request body
const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Body of `POST /tasks`
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRequest {
    pub kind: TaskKind,
    #[serde(default)]
    pub input: Map<String, Value>,
    pub priority: Option<Priority>,
    pub user_id: Option<String>,
    pub metadata: Option<Map<String, Value>>,
    pub context: Option<TaskRequestContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRequestContext {
    pub tenant_id: Option<String>,
    #[serde(flatten)]
    pub overrides: ContextOverrides,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    #[serde(flatten)]
    health: SystemHealth,
    checks: BTreeMap<String, bool>,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct LivenessResponse {
    alive: bool,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    timestamp: i64,
}

fn current_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

fn with_registry(
    registry: Arc<HandlerRegistry>,
) -> impl Filter<Extract = (Arc<HandlerRegistry>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&registry))
}

/// Every route, with JSON error replies for rejections
pub fn routes(
    registry: Arc<HandlerRegistry>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let tasks = warp::path("tasks")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .and(with_registry(registry.clone()))
        .and_then(post_task);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_registry(registry.clone()))
        .and_then(get_health);

    let handlers = warp::path("handlers")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_registry(registry))
        .and_then(get_handlers);

    let live = warp::path("live")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| {
            warp::reply::json(&LivenessResponse {
                alive: true,
                timestamp: current_timestamp(),
            })
        });

    tasks
        .or(health)
        .or(handlers)
        .or(live)
        .recover(handle_rejection)
}

async fn post_task(
    request: TaskRequest,
    registry: Arc<HandlerRegistry>,
) -> Result<impl Reply, Infallible> {
    let mut options = TaskOptions::default();
    if let Some(priority) = request.priority {
        options = options.with_priority(priority);
    }
    if let Some(user_id) = request.user_id.clone() {
        options = options.with_user(user_id);
    }
    if let Some(metadata) = request.metadata {
        options = options.with_metadata(metadata);
    }

    let task = create_task(request.kind, request.input, options);
    let context = request.context.unwrap_or_default();
    let context = create_context(request.user_id, context.tenant_id, Some(context.overrides));

    let span = crate::task_span!(task_id = %task.id, kind = %task.kind);
    let response = registry
        .execute_task(&task, Some(&context))
        .instrument(span)
        .await;

    Ok(warp::reply::json(&response))
}

async fn get_health(registry: Arc<HandlerRegistry>) -> Result<impl Reply, Infallible> {
    let checks = registry.health_check_all();
    let health = registry.get_system_health();
    let healthy = health.all_healthy();

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        health,
        checks,
        timestamp: current_timestamp(),
    };
    Ok(warp::reply::with_status(warp::reply::json(&body), status))
}

async fn get_handlers(registry: Arc<HandlerRegistry>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&registry.handler_snapshots()))
}

async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Infallible> {
    let (status, error) = if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(e) = rejection.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, format!("Invalid task request: {e}"))
    } else if rejection.find::<warp::reject::PayloadTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large".to_string(),
        )
    } else if rejection.find::<warp::reject::LengthRequired>().is_some() {
        (
            StatusCode::LENGTH_REQUIRED,
            "Content-Length header required".to_string(),
        )
    } else if rejection.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Expected application/json".to_string(),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed".to_string(),
        )
    } else {
        tracing::warn!(?rejection, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&ErrorResponse {
            error,
            timestamp: current_timestamp(),
        }),
        status,
    ))
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    registry: Arc<HandlerRegistry>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), warp::Error> {
    let (bound, server) =
        warp::serve(routes(registry)).try_bind_with_graceful_shutdown(addr, shutdown)?;

    info!(%bound, "HTTP server listening");
    server.await;
    info!("HTTP server stopped");
    Ok(())
}

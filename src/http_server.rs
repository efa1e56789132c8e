use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{CONTENT_TYPE, LOCATION},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::json;
use std::{collections::BTreeMap, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    context::{HEADER_REQUEST_ID, RequestContext},
    error::ApiError,
    metrics::ApiMetrics,
    recordsets::{ApiResponse, RecordSetsController},
    validation::ValidationError,
};

/// HTTP front end for the recordset collection, plus health and metrics
pub struct HttpServer {
    controller: Arc<RecordSetsController>,
    metrics: Arc<ApiMetrics>,
    default_tenant: String,
    bind_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(
        controller: Arc<RecordSetsController>,
        metrics: Arc<ApiMetrics>,
        default_tenant: impl Into<String>,
        bind_addr: SocketAddr,
    ) -> Self {
        Self {
            controller,
            metrics,
            default_tenant: default_tenant.into(),
            bind_addr,
        }
    }

    /// Build the router without binding a socket
    pub fn router(&self) -> Router {
        let app_state = AppState {
            controller: self.controller.clone(),
            metrics: self.metrics.clone(),
            default_tenant: Arc::from(self.default_tenant.as_str()),
        };

        Router::new()
            .route("/health", get(health_check))
            .route("/metrics", get(prometheus_metrics))
            .route(
                "/v2/zones/{zone_id}/recordsets",
                get(list_recordsets).post(create_recordset),
            )
            .route(
                "/v2/zones/{zone_id}/recordsets/{recordset_id}",
                get(get_recordset)
                    .put(update_recordset)
                    .delete(delete_recordset),
            )
            .with_state(app_state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until ctrl-c
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until ctrl-c
    pub async fn serve(self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();
        info!("Starting HTTP server on {}", listener.local_addr()?);

        let shutdown_signal = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutting down HTTP server");
        };

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;

        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    controller: Arc<RecordSetsController>,
    metrics: Arc<ApiMetrics>,
    default_tenant: Arc<str>,
}

impl AppState {
    fn context(&self, headers: &HeaderMap) -> RequestContext {
        RequestContext::from_headers(headers, &self.default_tenant)
    }
}

/// Basic health check endpoint
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.export() {
        Ok(metrics) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            metrics,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to export metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to export metrics".to_string(),
            )
                .into_response()
        }
    }
}

async fn list_recordsets(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    let ctx = state.context(&headers);
    let result = async {
        let zone_id = parse_id(&zone_id, "zone_id")?;
        let params: BTreeMap<String, String> = pairs.into_iter().collect();
        state.controller.list(&ctx, zone_id, &params).await
    }
    .await;
    reply(&ctx, result)
}

async fn create_recordset(
    State(state): State<AppState>,
    Path(zone_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = state.context(&headers);
    let result = async {
        let zone_id = parse_id(&zone_id, "zone_id")?;
        state.controller.create(&ctx, zone_id, &body).await
    }
    .await;
    reply(&ctx, result)
}

async fn get_recordset(
    State(state): State<AppState>,
    Path((zone_id, recordset_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let ctx = state.context(&headers);
    let result = async {
        let (zone_id, recordset_id) = parse_ids(&zone_id, &recordset_id)?;
        state.controller.get_one(&ctx, zone_id, recordset_id).await
    }
    .await;
    reply(&ctx, result)
}

async fn update_recordset(
    State(state): State<AppState>,
    Path((zone_id, recordset_id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let ctx = state.context(&headers);
    let result = async {
        let (zone_id, recordset_id) = parse_ids(&zone_id, &recordset_id)?;
        state
            .controller
            .update(&ctx, zone_id, recordset_id, &body)
            .await
    }
    .await;
    reply(&ctx, result)
}

async fn delete_recordset(
    State(state): State<AppState>,
    Path((zone_id, recordset_id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let ctx = state.context(&headers);
    let result = async {
        let (zone_id, recordset_id) = parse_ids(&zone_id, &recordset_id)?;
        state.controller.delete(&ctx, zone_id, recordset_id).await
    }
    .await;
    reply(&ctx, result)
}

fn parse_id(raw: &str, field: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ValidationError::InvalidIdentifier(field).into())
}

fn parse_ids(zone_id: &str, recordset_id: &str) -> Result<(Uuid, Uuid), ApiError> {
    Ok((
        parse_id(zone_id, "zone_id")?,
        parse_id(recordset_id, "recordset_id")?,
    ))
}

/// Turn an operation outcome into a response carrying the request id
fn reply<T: Serialize>(ctx: &RequestContext, result: Result<ApiResponse<T>, ApiError>) -> Response {
    let mut response = match result {
        Ok(ApiResponse {
            status,
            location,
            body,
        }) => {
            let mut response = (status, Json(body)).into_response();
            if let Some(location) = location.and_then(|l| HeaderValue::from_str(&l).ok()) {
                response.headers_mut().insert(LOCATION, location);
            }
            response
        }
        Err(err) => err.into_response(),
    };

    if let Ok(request_id) = HeaderValue::from_str(&ctx.request_id.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(HEADER_REQUEST_ID), request_id);
    }
    response
}

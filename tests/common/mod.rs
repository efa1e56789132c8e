//! Shared helpers for the recordset API integration tests

#![allow(dead_code)] // Not every test file uses every helper

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use recordset_api::{
    adapter::ApiV2Adapter,
    directory::{InMemoryDirectory, Propagation},
    http_server::HttpServer,
    metrics::ApiMetrics,
    model::Zone,
    query::PagingLimits,
    recordsets::RecordSetsController,
    validation::ValidationConfig,
};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

pub const TENANT: &str = "tenant-a";

pub struct TestApp {
    pub directory: Arc<InMemoryDirectory>,
    pub zone: Zone,
    pub server: HttpServer,
}

impl TestApp {
    pub fn router(&self) -> Router {
        self.server.router()
    }
}

/// Build a server over an in-memory directory holding `example.com.`
pub fn test_app(propagation: Propagation) -> TestApp {
    let directory = Arc::new(InMemoryDirectory::new(propagation));
    let zone = directory
        .create_zone(TENANT, "example.com.", "hostmaster@example.com")
        .unwrap();

    let metrics = Arc::new(ApiMetrics::new().unwrap());
    let controller = RecordSetsController::new(
        directory.clone(),
        ApiV2Adapter::new(Url::parse("http://localhost:9001").unwrap()),
        PagingLimits::default(),
        ValidationConfig::default(),
    )
    .with_metrics(metrics.clone());

    let server = HttpServer::new(
        Arc::new(controller),
        metrics,
        TENANT,
        "127.0.0.1:0".parse().unwrap(),
    );

    TestApp {
        directory,
        zone,
        server,
    }
}

pub fn request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn collection(zone: &Zone) -> String {
    format!("/v2/zones/{}/recordsets", zone.id)
}

//! The recordset collection under a zone
//!
//! Every operation takes an explicit caller context and returns an explicit
//! status/body pair. Guard rules and validation run before any mutating
//! directory call, so a rejected request never reaches the backend as a write.

use crate::adapter::{ApiV2Adapter, RecordSetListView, RecordSetView};
use crate::context::RequestContext;
use crate::data_filter;
use crate::directory::DirectoryService;
use crate::error::{ApiError, Result};
use crate::guard;
use crate::metrics::ApiMetrics;
use crate::query::{self, PagingLimits};
use crate::status::{Operation, success_status};
use crate::validation::{ValidationConfig, validate_recordset};
use http::StatusCode;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of a successful collection operation
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    /// Set on create only
    pub location: Option<String>,
    pub body: T,
}

pub struct RecordSetsController {
    directory: Arc<dyn DirectoryService>,
    adapter: ApiV2Adapter,
    limits: PagingLimits,
    validation: ValidationConfig,
    metrics: Option<Arc<ApiMetrics>>,
}

impl RecordSetsController {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        adapter: ApiV2Adapter,
        limits: PagingLimits,
        validation: ValidationConfig,
    ) -> Self {
        Self {
            directory,
            adapter,
            limits,
            validation,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ApiMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn adapter(&self) -> &ApiV2Adapter {
        &self.adapter
    }

    pub async fn get_one(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<ApiResponse<RecordSetView>> {
        let started = Instant::now();
        let result = self.get_one_inner(ctx, zone_id, recordset_id).await;
        self.finish(Operation::Get, started, result)
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        params: &BTreeMap<String, String>,
    ) -> Result<ApiResponse<RecordSetListView>> {
        let started = Instant::now();
        let result = self.list_inner(ctx, zone_id, params).await;
        self.finish(Operation::List, started, result)
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        body: &[u8],
    ) -> Result<ApiResponse<RecordSetView>> {
        let started = Instant::now();
        let result = self.create_inner(ctx, zone_id, body).await;
        self.finish(Operation::Create, started, result)
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
        body: &[u8],
    ) -> Result<ApiResponse<RecordSetView>> {
        let started = Instant::now();
        let result = self.update_inner(ctx, zone_id, recordset_id, body).await;
        self.finish(Operation::Update, started, result)
    }

    pub async fn delete(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<ApiResponse<RecordSetView>> {
        let started = Instant::now();
        let result = self.delete_inner(ctx, zone_id, recordset_id).await;
        self.finish(Operation::Delete, started, result)
    }

    async fn get_one_inner(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<ApiResponse<RecordSetView>> {
        let recordset = self
            .directory
            .get_recordset(ctx, zone_id, recordset_id)
            .await?;

        Ok(ApiResponse {
            status: success_status(Operation::Get, recordset.status),
            location: None,
            body: self.adapter.render(&recordset),
        })
    }

    async fn list_inner(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        params: &BTreeMap<String, String>,
    ) -> Result<ApiResponse<RecordSetListView>> {
        let plan = query::translate(params, &self.limits)?;

        // A missing zone must not look like an empty listing
        self.directory.get_zone(ctx, zone_id).await?;

        debug!(
            "Listing zone {} sorted by {} {} (limit {})",
            zone_id,
            plan.page.sort_key.as_str(),
            plan.page.sort_dir.as_str(),
            plan.page.limit
        );
        let page =
            data_filter::find_recordsets(self.directory.as_ref(), ctx, zone_id, plan).await?;

        Ok(ApiResponse {
            status: StatusCode::OK,
            location: None,
            body: self.adapter.render_list(zone_id, params, &page),
        })
    }

    async fn create_inner(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        body: &[u8],
    ) -> Result<ApiResponse<RecordSetView>> {
        let body = self.adapter.parse_body(body)?;
        let recordset = self.adapter.parse_new(ctx, zone_id, body)?;

        guard::check_create(&recordset)?;
        validate_recordset(&recordset, &self.validation)?;

        let created = self
            .directory
            .create_recordset(ctx, zone_id, recordset)
            .await?;
        info!(
            "Created recordset {} {} ({}) in zone {} [{}]",
            created.name,
            created.rtype,
            created.id,
            zone_id,
            created.status.as_str()
        );

        let view = self.adapter.render(&created);
        Ok(ApiResponse {
            status: success_status(Operation::Create, created.status),
            location: Some(view.links.self_link.clone()),
            body: view,
        })
    }

    async fn update_inner(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
        body: &[u8],
    ) -> Result<ApiResponse<RecordSetView>> {
        let current = self
            .directory
            .get_recordset(ctx, zone_id, recordset_id)
            .await?;
        guard::check_update(self.directory.as_ref(), ctx, &current).await?;

        // Only a recordset the caller may change gets its body inspected
        let body = self.adapter.parse_body(body)?;
        let merged = self.adapter.parse_overlay(current, body)?;
        validate_recordset(&merged, &self.validation)?;

        let updated = self.directory.update_recordset(ctx, merged).await?;
        info!(
            "Updated recordset {} in zone {} to version {} [{}]",
            updated.id,
            zone_id,
            updated.version,
            updated.status.as_str()
        );

        Ok(ApiResponse {
            status: success_status(Operation::Update, updated.status),
            location: None,
            body: self.adapter.render(&updated),
        })
    }

    async fn delete_inner(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<ApiResponse<RecordSetView>> {
        let current = self
            .directory
            .get_recordset(ctx, zone_id, recordset_id)
            .await?;
        guard::check_delete(&current)?;

        let deleted = self
            .directory
            .delete_recordset(ctx, zone_id, recordset_id)
            .await?;
        info!("Deleted recordset {} in zone {}", recordset_id, zone_id);

        Ok(ApiResponse {
            status: success_status(Operation::Delete, deleted.status),
            location: None,
            body: self.adapter.render(&deleted),
        })
    }

    fn finish<T>(
        &self,
        operation: Operation,
        started: Instant,
        result: Result<ApiResponse<T>>,
    ) -> Result<ApiResponse<T>> {
        let code = match &result {
            Ok(response) => response.status,
            Err(err) => err.status_code(),
        };

        if let Err(ApiError::Guard(violation)) = &result {
            warn!(
                "Refused {} request: {} ({})",
                operation.as_str(),
                violation,
                violation.rule()
            );
            if let Some(metrics) = &self.metrics {
                metrics.record_guard_rejection(violation.rule());
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_request(operation.as_str(), code.as_u16(), started.elapsed());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryError, InMemoryDirectory, Propagation};
    use crate::guard::GuardViolation;
    use crate::model::{Record, RecordSet, RecordSetList, RecordType, Zone};
    use crate::query::{Criterion, PageRequest, QueryError};
    use crate::validation::ValidationError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use url::Url;

    /// Counts every call that reaches the wrapped directory
    struct CountingDirectory {
        inner: InMemoryDirectory,
        reads: AtomicUsize,
        writes: AtomicUsize,
        write_failure: Mutex<Option<DirectoryError>>,
    }

    impl CountingDirectory {
        fn new(inner: InMemoryDirectory) -> Self {
            Self {
                inner,
                reads: AtomicUsize::new(0),
                writes: AtomicUsize::new(0),
                write_failure: Mutex::new(None),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn read(&self) {
            self.reads.fetch_add(1, Ordering::SeqCst);
        }

        /// Make every later mutation fail with `err` after being counted
        fn fail_writes_with(&self, err: DirectoryError) {
            *self.write_failure.lock() = Some(err);
        }

        fn write(&self) -> std::result::Result<(), DirectoryError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            match self.write_failure.lock().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl DirectoryService for CountingDirectory {
        async fn get_zone(
            &self,
            ctx: &RequestContext,
            zone_id: Uuid,
        ) -> std::result::Result<Zone, DirectoryError> {
            self.read();
            self.inner.get_zone(ctx, zone_id).await
        }

        async fn get_recordset(
            &self,
            ctx: &RequestContext,
            zone_id: Uuid,
            recordset_id: Uuid,
        ) -> std::result::Result<RecordSet, DirectoryError> {
            self.read();
            self.inner.get_recordset(ctx, zone_id, recordset_id).await
        }

        async fn find_recordsets(
            &self,
            ctx: &RequestContext,
            criterion: &Criterion,
            page: &PageRequest,
        ) -> std::result::Result<RecordSetList, DirectoryError> {
            self.read();
            self.inner.find_recordsets(ctx, criterion, page).await
        }

        async fn find_records(
            &self,
            ctx: &RequestContext,
            criterion: &Criterion,
        ) -> std::result::Result<Vec<Record>, DirectoryError> {
            self.read();
            self.inner.find_records(ctx, criterion).await
        }

        async fn create_recordset(
            &self,
            ctx: &RequestContext,
            zone_id: Uuid,
            recordset: RecordSet,
        ) -> std::result::Result<RecordSet, DirectoryError> {
            self.write()?;
            self.inner.create_recordset(ctx, zone_id, recordset).await
        }

        async fn update_recordset(
            &self,
            ctx: &RequestContext,
            recordset: RecordSet,
        ) -> std::result::Result<RecordSet, DirectoryError> {
            self.write()?;
            self.inner.update_recordset(ctx, recordset).await
        }

        async fn delete_recordset(
            &self,
            ctx: &RequestContext,
            zone_id: Uuid,
            recordset_id: Uuid,
        ) -> std::result::Result<RecordSet, DirectoryError> {
            self.write()?;
            self.inner.delete_recordset(ctx, zone_id, recordset_id).await
        }
    }

    struct Fixture {
        directory: Arc<CountingDirectory>,
        controller: RecordSetsController,
        metrics: Arc<ApiMetrics>,
        zone: Zone,
        ctx: RequestContext,
    }

    fn fixture(propagation: Propagation) -> Fixture {
        let inner = InMemoryDirectory::new(propagation);
        let zone = inner
            .create_zone("t1", "example.com.", "hostmaster@example.com")
            .unwrap();
        let directory = Arc::new(CountingDirectory::new(inner));
        let metrics = Arc::new(ApiMetrics::new().unwrap());
        let controller = RecordSetsController::new(
            directory.clone(),
            ApiV2Adapter::new(Url::parse("http://127.0.0.1:9001").unwrap()),
            PagingLimits::default(),
            ValidationConfig::default(),
        )
        .with_metrics(metrics.clone());

        Fixture {
            directory,
            controller,
            metrics,
            zone,
            ctx: RequestContext::new("t1"),
        }
    }

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    const WWW: &[u8] =
        br#"{"name":"www.example.com.","type":"A","ttl":300,"records":["192.0.2.1"]}"#;

    async fn root_recordset(f: &Fixture, rtype: &str) -> RecordSetView {
        let listed = f
            .controller
            .list(&f.ctx, f.zone.id, &params(&[("type", rtype)]))
            .await
            .unwrap();
        assert_eq!(listed.body.recordsets.len(), 1);
        listed.body.recordsets[0].clone()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let f = fixture(Propagation::Synchronous);

        let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();
        assert_eq!(created.status, StatusCode::CREATED);
        assert_eq!(created.body.status, "ACTIVE");
        assert_eq!(created.location.as_deref(), Some(created.body.links.self_link.as_str()));

        let fetched = f
            .controller
            .get_one(&f.ctx, f.zone.id, created.body.id)
            .await
            .unwrap();
        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(fetched.body.records, vec!["192.0.2.1"]);
        assert_eq!(fetched.location, None);
    }

    #[tokio::test]
    async fn test_pending_create_is_accepted() {
        let f = fixture(Propagation::Deferred);
        let body = br#"{"name":"a.example.com.","type":"A","ttl":300,"records":["1.2.3.4"]}"#;

        let created = f.controller.create(&f.ctx, f.zone.id, body).await.unwrap();
        assert_eq!(created.status, StatusCode::ACCEPTED);
        assert_eq!(created.body.status, "PENDING");
        assert_eq!(
            created.location,
            Some(format!(
                "http://127.0.0.1:9001/v2/zones/{}/recordsets/{}",
                f.zone.id, created.body.id
            ))
        );
    }

    #[tokio::test]
    async fn test_soa_create_never_reaches_directory() {
        let f = fixture(Propagation::Synchronous);
        let body = br#"{"name":"example.com.","type":"SOA","records":[]}"#;

        let err = f.controller.create(&f.ctx, f.zone.id, body).await.unwrap_err();
        assert_eq!(err, ApiError::Guard(GuardViolation::CreateSoa));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(f.directory.writes(), 0);
    }

    #[tokio::test]
    async fn test_invalid_create_bodies() {
        let f = fixture(Propagation::Synchronous);

        let no_records = br#"{"name":"www.example.com.","type":"A","records":[]}"#;
        let err = f.controller.create(&f.ctx, f.zone.id, no_records).await.unwrap_err();
        assert_eq!(err, ApiError::Validation(ValidationError::NoRecords));

        let read_only =
            br#"{"id":"x","name":"www.example.com.","type":"A","records":["192.0.2.1"]}"#;
        let err = f
            .controller
            .create(&f.ctx, f.zone.id, read_only)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ApiError::Validation(ValidationError::ReadOnlyField("id".into()))
        );

        let outside = br#"{"name":"www.example.org.","type":"A","records":["192.0.2.1"]}"#;
        let err = f.controller.create(&f.ctx, f.zone.id, outside).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        assert_eq!(f.directory.writes(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_conflicts() {
        let f = fixture(Propagation::Synchronous);
        f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();
        let err = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_list_root_ns_then_update_is_refused() {
        let f = fixture(Propagation::Synchronous);

        let root_ns = root_recordset(&f, "NS").await;
        assert_eq!(root_ns.name, "example.com.");

        let writes = f.directory.writes();
        for body in [
            &br#"{"ttl":60}"#[..],
            &br#"{"records":["ns2.example.org."]}"#[..],
            &br#"{"description":"x"}"#[..],
            &br#"{"status":"ACTIVE"}"#[..],
            &br#"{"colour":"blue"}"#[..],
            &b"not json"[..],
        ] {
            let err = f
                .controller
                .update(&f.ctx, f.zone.id, root_ns.id, body)
                .await
                .unwrap_err();
            assert_eq!(err, ApiError::Guard(GuardViolation::UpdateRootNs));
        }
        assert_eq!(f.directory.writes(), writes);
    }

    #[tokio::test]
    async fn test_managed_update_requires_capability() {
        let f = fixture(Propagation::Synchronous);

        // Mark a fresh recordset managed in the backing store
        let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();
        let mut stored = f
            .directory
            .inner
            .get_recordset(&f.ctx, f.zone.id, created.body.id)
            .await
            .unwrap();
        stored.managed = true;
        let stored = f.directory.inner.update_recordset(&f.ctx, stored).await.unwrap();
        assert!(stored.managed);

        let body = br#"{"ttl":600}"#;
        let err = f
            .controller
            .update(&f.ctx, f.zone.id, stored.id, body)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Guard(GuardViolation::UpdateManaged));

        let privileged = f.ctx.clone().with_edit_managed_records(true);
        let updated = f
            .controller
            .update(&privileged, f.zone.id, stored.id, body)
            .await
            .unwrap();
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body.ttl, Some(600));
    }

    #[tokio::test]
    async fn test_update_overlay() {
        let f = fixture(Propagation::Synchronous);
        let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();

        let updated = f
            .controller
            .update(
                &f.ctx,
                f.zone.id,
                created.body.id,
                br#"{"records":["192.0.2.1","192.0.2.9"],"description":"web"}"#,
            )
            .await
            .unwrap();
        assert_eq!(updated.status, StatusCode::OK);
        assert_eq!(updated.body.ttl, Some(300));
        assert_eq!(updated.body.description.as_deref(), Some("web"));
        assert_eq!(updated.body.version, created.body.version + 1);

        let err = f
            .controller
            .update(&f.ctx, f.zone.id, created.body.id, br#"{"type":"AAAA"}"#)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Validation(ValidationError::ImmutableField("type")));
    }

    #[tokio::test]
    async fn test_pending_update_is_accepted() {
        let f = fixture(Propagation::Deferred);
        let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();
        f.directory.inner.complete_pending();

        let updated = f
            .controller
            .update(&f.ctx, f.zone.id, created.body.id, br#"{"ttl":900}"#)
            .await
            .unwrap();
        assert_eq!(updated.status, StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_delete_is_always_accepted() {
        for propagation in [Propagation::Synchronous, Propagation::Deferred] {
            let f = fixture(propagation);
            let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();

            let deleted = f
                .controller
                .delete(&f.ctx, f.zone.id, created.body.id)
                .await
                .unwrap();
            assert_eq!(deleted.status, StatusCode::ACCEPTED);
        }
    }

    #[tokio::test]
    async fn test_soa_delete_is_refused_without_delete_call() {
        let f = fixture(Propagation::Synchronous);
        let soa = root_recordset(&f, "SOA").await;

        let err = f
            .controller
            .delete(&f.ctx, f.zone.id, soa.id)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Guard(GuardViolation::DeleteSoa));
        assert_eq!(f.directory.writes(), 0);

        let text = f.metrics.export().unwrap();
        assert!(text.contains(r#"recordset_api_guard_rejections_total{rule="delete_soa"} 1"#));
        assert!(text.contains(r#"recordset_api_requests_total{code="400",operation="delete"} 1"#));
    }

    #[tokio::test]
    async fn test_invalid_sort_key_issues_no_query() {
        let f = fixture(Propagation::Synchronous);

        let err = f
            .controller
            .list(&f.ctx, f.zone.id, &params(&[("sort_key", "status")]))
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::InvalidQuery(QueryError::InvalidSortKey("status".into())));
        assert_eq!(f.directory.reads(), 0);

        let err = f
            .controller
            .list(&f.ctx, f.zone.id, &params(&[("status", "ACTIVE")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(f.directory.reads(), 0);
    }

    #[tokio::test]
    async fn test_list_missing_zone_is_not_found() {
        let f = fixture(Propagation::Synchronous);

        let err = f
            .controller
            .list(&f.ctx, Uuid::new_v4(), &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_type(), "zone_not_found");
        assert_eq!(f.directory.reads(), 1);
    }

    #[tokio::test]
    async fn test_list_data_filter_with_no_match_is_empty() {
        let f = fixture(Propagation::Synchronous);
        f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();

        let listed = f
            .controller
            .list(
                &f.ctx,
                f.zone.id,
                &params(&[("name", "www.example.com."), ("data", "203.0.113.5")]),
            )
            .await
            .unwrap();
        assert_eq!(listed.status, StatusCode::OK);
        assert!(listed.body.recordsets.is_empty());
        assert_eq!(listed.body.metadata.total_count, 0);

        let listed = f
            .controller
            .list(&f.ctx, f.zone.id, &params(&[("data", "192.0.2.1")]))
            .await
            .unwrap();
        assert_eq!(listed.body.recordsets.len(), 1);
        assert_eq!(listed.body.recordsets[0].name, "www.example.com.");
    }

    #[tokio::test]
    async fn test_list_paging_links() {
        let f = fixture(Propagation::Synchronous);
        f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();

        let first = f
            .controller
            .list(&f.ctx, f.zone.id, &params(&[("limit", "2"), ("sort_key", "name")]))
            .await
            .unwrap();
        assert_eq!(first.body.recordsets.len(), 2);
        assert_eq!(first.body.metadata.total_count, 3);
        let next = first.body.links.next.clone().unwrap();
        let marker = first.body.recordsets[1].id.to_string();
        assert!(next.contains(&format!("marker={}", marker)));

        let second = f
            .controller
            .list(
                &f.ctx,
                f.zone.id,
                &params(&[("limit", "2"), ("sort_key", "name"), ("marker", marker.as_str())]),
            )
            .await
            .unwrap();
        assert_eq!(second.body.recordsets.len(), 1);
        assert_eq!(second.body.recordsets[0].name, "www.example.com.");
        assert_eq!(second.body.links.next, None);
    }

    #[tokio::test]
    async fn test_other_tenant_sees_nothing() {
        let f = fixture(Propagation::Synchronous);
        let other = RequestContext::new("t2");

        let err = f
            .controller
            .list(&other, f.zone.id, &BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let admin = RequestContext::new("t2")
            .with_roles(["admin"])
            .with_all_tenants(true);
        let listed = f
            .controller
            .list(&admin, f.zone.id, &BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(listed.body.recordsets.len(), 2);
    }

    #[tokio::test]
    async fn test_managed_check_precedes_body_schema() {
        let f = fixture(Propagation::Synchronous);
        let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();
        let mut stored = f
            .directory
            .inner
            .get_recordset(&f.ctx, f.zone.id, created.body.id)
            .await
            .unwrap();
        stored.managed = true;
        f.directory.inner.update_recordset(&f.ctx, stored).await.unwrap();

        for body in [&br#"{"status":"ACTIVE"}"#[..], &br#"{"colour":"blue"}"#[..]] {
            let err = f
                .controller
                .update(&f.ctx, f.zone.id, created.body.id, body)
                .await
                .unwrap_err();
            assert_eq!(err, ApiError::Guard(GuardViolation::UpdateManaged));
        }
    }

    #[tokio::test]
    async fn test_update_of_missing_recordset_is_not_found_before_body_checks() {
        let f = fixture(Propagation::Synchronous);

        let err = f
            .controller
            .update(&f.ctx, f.zone.id, Uuid::new_v4(), b"{not json")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.error_type(), "recordset_not_found");
        assert_eq!(f.directory.writes(), 0);
    }

    #[tokio::test]
    async fn test_update_conflict_is_surfaced_once() {
        let f = fixture(Propagation::Synchronous);
        let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();
        let writes = f.directory.writes();

        let conflict = DirectoryError::Conflict("recordset changed concurrently".into());
        f.directory.fail_writes_with(conflict.clone());
        let err = f
            .controller
            .update(&f.ctx, f.zone.id, created.body.id, br#"{"ttl":900}"#)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Directory(conflict));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(f.directory.writes(), writes + 1);

        let text = f.metrics.export().unwrap();
        assert!(text.contains(r#"recordset_api_requests_total{code="409",operation="update"} 1"#));
    }

    #[tokio::test]
    async fn test_unavailable_directory_is_surfaced_once() {
        let f = fixture(Propagation::Synchronous);
        let created = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap();
        let writes = f.directory.writes();

        let down = DirectoryError::Unavailable("connection refused".into());
        f.directory.fail_writes_with(down.clone());

        let err = f.controller.create(&f.ctx, f.zone.id, WWW).await.unwrap_err();
        assert_eq!(err, ApiError::Directory(down.clone()));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(f.directory.writes(), writes + 1);

        let err = f
            .controller
            .delete(&f.ctx, f.zone.id, created.body.id)
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::Directory(down));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(f.directory.writes(), writes + 2);
    }
}

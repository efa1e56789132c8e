//! Boundary to the directory service that owns zones, recordsets and records
//!
//! The API never stores anything itself. Every lookup and mutation goes through
//! [`DirectoryService`]; conflict detection, propagation and persistence are the
//! backend's responsibility.

use crate::context::RequestContext;
use crate::model::{Record, RecordSet, RecordSetList, Zone};
use crate::query::{Criterion, FilterField, PageRequest};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;

pub use memory::{InMemoryDirectory, Propagation};

/// Failures reported by a directory backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("Could not find zone {0}")]
    ZoneNotFound(Uuid),
    #[error("Could not find recordset {0}")]
    RecordSetNotFound(Uuid),
    #[error("Marker {0} could not be found")]
    MarkerNotFound(Uuid),
    #[error("Recordset {0} already exists")]
    DuplicateRecordSet(String),
    #[error("{0}")]
    InvalidRecordSetLocation(String),
    #[error("Unsupported criterion: {0}")]
    UnsupportedCriterion(FilterField),
    /// A concurrent change won; the caller's view is stale
    #[error("Conflict: {0}")]
    Conflict(String),
    /// Reserved for remote backends that can lose their connection; the
    /// in-memory directory never returns it
    #[error("Directory service unavailable: {0}")]
    Unavailable(String),
}

/// Zone, recordset and record operations consumed by the API.
///
/// All calls take the caller context so the backend can apply tenant scoping.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Fetch a zone
    async fn get_zone(&self, ctx: &RequestContext, zone_id: Uuid) -> Result<Zone, DirectoryError>;

    /// Fetch one recordset of a zone
    async fn get_recordset(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<RecordSet, DirectoryError>;

    /// Ordered, paginated recordset search
    async fn find_recordsets(
        &self,
        ctx: &RequestContext,
        criterion: &Criterion,
        page: &PageRequest,
    ) -> Result<RecordSetList, DirectoryError>;

    /// Unpaginated record search
    async fn find_records(
        &self,
        ctx: &RequestContext,
        criterion: &Criterion,
    ) -> Result<Vec<Record>, DirectoryError>;

    async fn create_recordset(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset: RecordSet,
    ) -> Result<RecordSet, DirectoryError>;

    async fn update_recordset(
        &self,
        ctx: &RequestContext,
        recordset: RecordSet,
    ) -> Result<RecordSet, DirectoryError>;

    /// Returns the accepted, pre-removal representation
    async fn delete_recordset(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<RecordSet, DirectoryError>;
}

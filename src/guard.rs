//! Rules protecting protocol-critical and system-managed recordsets
//!
//! Every rule is evaluated before any mutating directory call. Update and
//! delete rules look at the persisted recordset, never at the submitted body.

use crate::context::RequestContext;
use crate::directory::DirectoryService;
use crate::error::ApiError;
use crate::model::{RecordSet, RecordType};
use thiserror::Error;
use tracing::debug;

/// A mutation refused by one of the guard rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GuardViolation {
    #[error("Creating a SOA recordset is not allowed")]
    CreateSoa,
    #[error("Managed records may not be updated")]
    UpdateManaged,
    #[error("Updating SOA recordsets is not allowed")]
    UpdateSoa,
    #[error("Updating a root zone NS record is not allowed")]
    UpdateRootNs,
    #[error("Deleting a SOA recordset is not allowed")]
    DeleteSoa,
}

impl GuardViolation {
    /// Short rule name, used as a metrics label
    pub fn rule(&self) -> &'static str {
        match self {
            GuardViolation::CreateSoa => "create_soa",
            GuardViolation::UpdateManaged => "update_managed",
            GuardViolation::UpdateSoa => "update_soa",
            GuardViolation::UpdateRootNs => "update_root_ns",
            GuardViolation::DeleteSoa => "delete_soa",
        }
    }
}

/// Create rule, checked against the submitted recordset
pub fn check_create(submitted: &RecordSet) -> Result<(), GuardViolation> {
    if submitted.rtype == RecordType::SOA {
        return Err(GuardViolation::CreateSoa);
    }
    Ok(())
}

/// Delete rule, checked against the persisted recordset
pub fn check_delete(current: &RecordSet) -> Result<(), GuardViolation> {
    if current.rtype == RecordType::SOA {
        return Err(GuardViolation::DeleteSoa);
    }
    Ok(())
}

/// Update rules, checked against the persisted recordset.
///
/// The owning zone is only looked up when the recordset is of type NS.
pub async fn check_update(
    directory: &dyn DirectoryService,
    ctx: &RequestContext,
    current: &RecordSet,
) -> Result<(), ApiError> {
    if current.managed && !ctx.edit_managed_records {
        return Err(GuardViolation::UpdateManaged.into());
    }

    if current.rtype == RecordType::SOA {
        return Err(GuardViolation::UpdateSoa.into());
    }

    if current.rtype == RecordType::NS {
        let zone = directory.get_zone(ctx, current.zone_id).await?;
        if current.is_zone_root(&zone) {
            return Err(GuardViolation::UpdateRootNs.into());
        }
        debug!("NS recordset {} is below the apex of {}", current.name, zone.name);
    }

    Ok(())
}

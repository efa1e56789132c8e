//! Record-content filtering for recordset listings
//!
//! `data` lives on records, so it cannot be applied to the recordset query.
//! The matching records are looked up separately and the recordset page is
//! intersected with the set of recordsets those records belong to.

use crate::context::RequestContext;
use crate::directory::{DirectoryError, DirectoryService};
use crate::model::{Record, RecordSet};
use crate::query::{Criterion, FilterField, QueryPlan};
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// A recordset page after the optional data join
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredPage {
    pub recordsets: Vec<RecordSet>,
    pub total_count: usize,
    /// Last id of the unfiltered page when that page was full
    pub next_marker: Option<Uuid>,
}

/// Keep only recordsets owning at least one of the given records.
///
/// Order of `recordsets` is preserved.
pub fn intersect(recordsets: Vec<RecordSet>, records: &[Record]) -> Vec<RecordSet> {
    let owners: HashSet<Uuid> = records.iter().map(|r| r.recordset_id).collect();
    recordsets
        .into_iter()
        .filter(|rs| owners.contains(&rs.id))
        .collect()
}

/// Run a recordset query for one zone, joining through records when the plan
/// carries a `data` filter.
pub async fn find_recordsets(
    directory: &dyn DirectoryService,
    ctx: &RequestContext,
    zone_id: Uuid,
    plan: QueryPlan,
) -> Result<FilteredPage, DirectoryError> {
    let QueryPlan {
        page,
        mut criterion,
    } = plan;
    let data = criterion.remove(FilterField::Data);
    criterion.insert(FilterField::ZoneId, zone_id.to_string());

    let records = match &data {
        Some(data) => {
            let record_criterion = Criterion::new()
                .with(FilterField::Data, data.as_str())
                .with(FilterField::ZoneId, zone_id.to_string());
            Some(directory.find_records(ctx, &record_criterion).await?)
        }
        None => None,
    };

    let list = directory.find_recordsets(ctx, &criterion, &page).await?;
    let next_marker = if list.items.len() >= page.limit {
        list.items.last().map(|rs| rs.id)
    } else {
        None
    };

    let Some(records) = records else {
        return Ok(FilteredPage {
            recordsets: list.items,
            total_count: list.total_count,
            next_marker,
        });
    };

    let page_len = list.items.len();
    let recordsets = intersect(list.items, &records);
    debug!(
        "Data filter matched {} records, kept {} of {} recordsets",
        records.len(),
        recordsets.len(),
        page_len
    );

    Ok(FilteredPage {
        total_count: recordsets.len(),
        recordsets,
        next_marker,
    })
}

use super::{DirectoryError, DirectoryService};
use crate::context::RequestContext;
use crate::model::{
    ChangeAction, ProcessingStatus, Record, RecordSet, RecordSetList, RecordType, Zone,
};
use crate::query::{Criterion, FilterField, PageRequest, SortDir, SortKey};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Default TTL for the implicit zone recordsets (1 hour)
const DEFAULT_ZONE_TTL: u32 = 3600;

const DEFAULT_NAMESERVER: &str = "ns1.example.org.";

const RECORDSET_FIELDS: [FilterField; 4] = [
    FilterField::Name,
    FilterField::Type,
    FilterField::Ttl,
    FilterField::ZoneId,
];

const RECORD_FIELDS: [FilterField; 2] = [FilterField::Data, FilterField::ZoneId];

/// How changes are reported back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Changes are applied immediately and reported ACTIVE
    #[default]
    Synchronous,
    /// Changes stay PENDING until [`InMemoryDirectory::complete_pending`] runs
    Deferred,
}

#[derive(Default)]
struct DirectoryState {
    zones: HashMap<Uuid, Zone>,
    recordsets: HashMap<Uuid, RecordSet>,
}

/// Directory backend keeping zones and recordsets in process memory
pub struct InMemoryDirectory {
    state: RwLock<DirectoryState>,
    propagation: Propagation,
    nameservers: Vec<String>,
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new(Propagation::default())
    }
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new(propagation: Propagation) -> Self {
        Self {
            state: RwLock::new(DirectoryState::default()),
            propagation,
            nameservers: vec![DEFAULT_NAMESERVER.to_string()],
        }
    }

    /// Set the nameservers used for new zones' SOA and apex NS sets
    pub fn with_nameservers(mut self, nameservers: Vec<String>) -> Self {
        if !nameservers.is_empty() {
            self.nameservers = nameservers;
        }
        self
    }

    pub fn propagation(&self) -> Propagation {
        self.propagation
    }

    /// Create a zone together with its managed SOA and apex NS recordsets
    pub fn create_zone(
        &self,
        tenant_id: &str,
        name: &str,
        email: &str,
    ) -> Result<Zone, DirectoryError> {
        let name = normalize_zone_name(name);
        let mut state = self.state.write();

        if state.zones.values().any(|z| z.name == name) {
            return Err(DirectoryError::Conflict(format!(
                "Zone {} already exists",
                name
            )));
        }

        let zone = Zone {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            name: name.clone(),
            email: email.to_string(),
            serial: 1,
            status: ProcessingStatus::Active,
            created_at: Utc::now(),
            updated_at: None,
        };

        let mut soa = RecordSet::draft(zone.id, tenant_id, &name, RecordType::SOA);
        soa.managed = true;
        soa.ttl = Some(DEFAULT_ZONE_TTL);
        soa.version = 1;
        soa.set_record_data([soa_data(&zone, self.primary_nameserver())]);

        let mut ns = RecordSet::draft(zone.id, tenant_id, &name, RecordType::NS);
        ns.ttl = Some(DEFAULT_ZONE_TTL);
        ns.version = 1;
        ns.set_record_data(self.nameservers.iter().cloned());

        state.recordsets.insert(soa.id, soa);
        state.recordsets.insert(ns.id, ns);
        state.zones.insert(zone.id, zone.clone());

        info!("Created zone {} ({}) for tenant {}", zone.name, zone.id, tenant_id);
        Ok(zone)
    }

    /// Settle every pending change; returns how many recordsets were settled
    pub fn complete_pending(&self) -> usize {
        let mut state = self.state.write();
        let mut settled = 0;
        let mut removed = Vec::new();

        for rs in state.recordsets.values_mut() {
            if !rs.status.is_pending() {
                continue;
            }
            settled += 1;
            if rs.action == ChangeAction::Delete {
                removed.push(rs.id);
                continue;
            }
            rs.status = ProcessingStatus::Active;
            rs.action = ChangeAction::None;
            for record in &mut rs.records {
                record.status = ProcessingStatus::Active;
                record.action = ChangeAction::None;
            }
        }

        for id in removed {
            state.recordsets.remove(&id);
        }

        debug!("Settled {} pending recordsets", settled);
        settled
    }

    fn primary_nameserver(&self) -> &str {
        self.nameservers
            .first()
            .map(String::as_str)
            .unwrap_or(DEFAULT_NAMESERVER)
    }

    fn change_state(&self, action: ChangeAction) -> (ProcessingStatus, ChangeAction) {
        match self.propagation {
            Propagation::Synchronous => (ProcessingStatus::Active, ChangeAction::None),
            Propagation::Deferred => (ProcessingStatus::Pending, action),
        }
    }

    fn bump_serial(&self, state: &mut DirectoryState, zone_id: Uuid) {
        let Some(zone) = state.zones.get_mut(&zone_id) else {
            return;
        };
        zone.serial = zone.serial.wrapping_add(1);
        zone.updated_at = Some(Utc::now());
        let data = soa_data(zone, self.primary_nameserver());

        if let Some(soa) = state
            .recordsets
            .values_mut()
            .find(|rs| rs.zone_id == zone_id && rs.rtype == RecordType::SOA)
        {
            soa.set_record_data([data]);
        }
    }
}

fn normalize_zone_name(name: &str) -> String {
    let mut name = name.trim().to_lowercase();
    if !name.ends_with('.') {
        name.push('.');
    }
    name
}

fn soa_data(zone: &Zone, primary_ns: &str) -> String {
    let mut rname = zone.email.replace('@', ".");
    if !rname.ends_with('.') {
        rname.push('.');
    }
    format!(
        "{} {} {} 3600 600 86400 3600",
        primary_ns, rname, zone.serial
    )
}

fn in_zone(name: &str, zone_name: &str) -> bool {
    let name = name.to_lowercase();
    name == zone_name || name.ends_with(&format!(".{}", zone_name))
}

fn zone_visible(state: &DirectoryState, ctx: &RequestContext, zone_id: Uuid) -> bool {
    state
        .zones
        .get(&zone_id)
        .is_some_and(|z| ctx.all_tenants || z.tenant_id == ctx.tenant_id)
}

fn visible_zone<'a>(
    state: &'a DirectoryState,
    ctx: &RequestContext,
    zone_id: Uuid,
) -> Result<&'a Zone, DirectoryError> {
    state
        .zones
        .get(&zone_id)
        .filter(|z| ctx.all_tenants || z.tenant_id == ctx.tenant_id)
        .ok_or(DirectoryError::ZoneNotFound(zone_id))
}

fn check_supported(criterion: &Criterion, supported: &[FilterField]) -> Result<(), DirectoryError> {
    match criterion.iter().find(|(field, _)| !supported.contains(field)) {
        Some((field, _)) => Err(DirectoryError::UnsupportedCriterion(field)),
        None => Ok(()),
    }
}

fn matches<F>(criterion: &Criterion, lookup: F) -> bool
where
    F: Fn(FilterField) -> Option<String>,
{
    criterion.iter().all(|(field, pattern)| {
        lookup(field).is_some_and(|value| wildcard_match(pattern, &value))
    })
}

fn recordset_field(rs: &RecordSet, field: FilterField) -> Option<String> {
    match field {
        FilterField::Name => Some(rs.name.clone()),
        FilterField::Type => Some(rs.rtype.as_str().to_string()),
        FilterField::Ttl => rs.ttl.map(|ttl| ttl.to_string()),
        FilterField::ZoneId => Some(rs.zone_id.to_string()),
        FilterField::Data => None,
    }
}

fn record_field(record: &Record, field: FilterField) -> Option<String> {
    match field {
        FilterField::Data => Some(record.data.clone()),
        FilterField::ZoneId => Some(record.zone_id.to_string()),
        _ => None,
    }
}

/// Case-insensitive match where `*` stands for any sequence of characters
pub(crate) fn wildcard_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.to_lowercase().chars().collect();
    let v: Vec<char> = value.to_lowercase().chars().collect();
    let (mut pi, mut vi) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while vi < v.len() {
        if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = vi;
            pi += 1;
        } else if pi < p.len() && p[pi] == v[vi] {
            pi += 1;
            vi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            vi = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

fn compare(a: &RecordSet, b: &RecordSet, key: SortKey) -> Ordering {
    let primary = match key {
        SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
        SortKey::Id => a.id.cmp(&b.id),
        SortKey::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortKey::DomainId => a.zone_id.cmp(&b.zone_id),
        SortKey::TenantId => a.tenant_id.cmp(&b.tenant_id),
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Type => a.rtype.as_str().cmp(b.rtype.as_str()),
        SortKey::Ttl => a.ttl.cmp(&b.ttl),
        SortKey::Records => a.record_data().cmp(&b.record_data()),
    };
    primary.then_with(|| a.id.cmp(&b.id))
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn get_zone(&self, ctx: &RequestContext, zone_id: Uuid) -> Result<Zone, DirectoryError> {
        let state = self.state.read();
        visible_zone(&state, ctx, zone_id).cloned()
    }

    async fn get_recordset(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<RecordSet, DirectoryError> {
        let state = self.state.read();
        visible_zone(&state, ctx, zone_id)?;
        state
            .recordsets
            .get(&recordset_id)
            .filter(|rs| rs.zone_id == zone_id)
            .cloned()
            .ok_or(DirectoryError::RecordSetNotFound(recordset_id))
    }

    async fn find_recordsets(
        &self,
        ctx: &RequestContext,
        criterion: &Criterion,
        page: &PageRequest,
    ) -> Result<RecordSetList, DirectoryError> {
        check_supported(criterion, &RECORDSET_FIELDS)?;
        let state = self.state.read();

        let mut matched: Vec<&RecordSet> = state
            .recordsets
            .values()
            .filter(|rs| zone_visible(&state, ctx, rs.zone_id))
            .filter(|rs| matches(criterion, |field| recordset_field(rs, field)))
            .collect();

        matched.sort_by(|a, b| {
            let ordering = compare(a, b, page.sort_key);
            match page.sort_dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            }
        });

        let total_count = matched.len();
        let start = match page.marker {
            None => 0,
            Some(marker) => matched
                .iter()
                .position(|rs| rs.id == marker)
                .map(|idx| idx + 1)
                .ok_or(DirectoryError::MarkerNotFound(marker))?,
        };

        let items: Vec<RecordSet> = matched
            .into_iter()
            .skip(start)
            .take(page.limit)
            .cloned()
            .collect();

        debug!(
            "find_recordsets matched {} recordsets, returning {}",
            total_count,
            items.len()
        );
        Ok(RecordSetList { items, total_count })
    }

    async fn find_records(
        &self,
        ctx: &RequestContext,
        criterion: &Criterion,
    ) -> Result<Vec<Record>, DirectoryError> {
        check_supported(criterion, &RECORD_FIELDS)?;
        let state = self.state.read();

        let mut records: Vec<Record> = state
            .recordsets
            .values()
            .filter(|rs| zone_visible(&state, ctx, rs.zone_id))
            .flat_map(|rs| rs.records.iter())
            .filter(|record| matches(criterion, |field| record_field(record, field)))
            .cloned()
            .collect();
        records.sort_by_key(|r| r.id);

        debug!("find_records matched {} records", records.len());
        Ok(records)
    }

    async fn create_recordset(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        mut recordset: RecordSet,
    ) -> Result<RecordSet, DirectoryError> {
        let mut state = self.state.write();
        let zone = visible_zone(&state, ctx, zone_id)?.clone();

        if !in_zone(&recordset.name, &zone.name) {
            return Err(DirectoryError::InvalidRecordSetLocation(format!(
                "Recordset name {} is not contained within zone {}",
                recordset.name, zone.name
            )));
        }

        let siblings: Vec<&RecordSet> = state
            .recordsets
            .values()
            .filter(|rs| rs.zone_id == zone_id && rs.name.eq_ignore_ascii_case(&recordset.name))
            .collect();

        if siblings.iter().any(|rs| rs.rtype == recordset.rtype) {
            return Err(DirectoryError::DuplicateRecordSet(format!(
                "{} {}",
                recordset.name, recordset.rtype
            )));
        }

        if recordset.rtype == RecordType::CNAME && recordset.name.eq_ignore_ascii_case(&zone.name) {
            return Err(DirectoryError::InvalidRecordSetLocation(
                "CNAME recordsets may not be created at the zone apex".to_string(),
            ));
        }

        let cname_clash = if recordset.rtype == RecordType::CNAME {
            !siblings.is_empty()
        } else {
            siblings.iter().any(|rs| rs.rtype == RecordType::CNAME)
        };
        if cname_clash {
            return Err(DirectoryError::InvalidRecordSetLocation(
                "CNAME recordsets may not share a name with any other records".to_string(),
            ));
        }

        let (status, action) = self.change_state(ChangeAction::Create);
        recordset.zone_id = zone.id;
        recordset.tenant_id = zone.tenant_id.clone();
        recordset.version = 1;
        recordset.created_at = Utc::now();
        recordset.updated_at = None;
        recordset.status = status;
        recordset.action = action;
        for record in &mut recordset.records {
            record.recordset_id = recordset.id;
            record.zone_id = zone.id;
            record.status = status;
            record.action = action;
        }

        state.recordsets.insert(recordset.id, recordset.clone());
        self.bump_serial(&mut state, zone.id);

        info!(
            "Created recordset {} {} ({}) in zone {}",
            recordset.name, recordset.rtype, recordset.id, zone.id
        );
        Ok(recordset)
    }

    async fn update_recordset(
        &self,
        ctx: &RequestContext,
        mut recordset: RecordSet,
    ) -> Result<RecordSet, DirectoryError> {
        let mut state = self.state.write();
        visible_zone(&state, ctx, recordset.zone_id)?;

        let stored = state
            .recordsets
            .get(&recordset.id)
            .filter(|rs| rs.zone_id == recordset.zone_id)
            .ok_or(DirectoryError::RecordSetNotFound(recordset.id))?;

        if stored.version != recordset.version {
            return Err(DirectoryError::Conflict(format!(
                "Recordset {} was modified concurrently (version {} != {})",
                recordset.id, stored.version, recordset.version
            )));
        }
        if stored.status.is_pending() && stored.action == ChangeAction::Delete {
            return Err(DirectoryError::Conflict(format!(
                "Recordset {} is being deleted",
                recordset.id
            )));
        }
        if stored.rtype != recordset.rtype || !stored.name.eq_ignore_ascii_case(&recordset.name) {
            return Err(DirectoryError::Conflict(
                "The name and type of a recordset cannot change".to_string(),
            ));
        }

        let (status, action) = self.change_state(ChangeAction::Update);
        recordset.version += 1;
        recordset.updated_at = Some(Utc::now());
        recordset.status = status;
        recordset.action = action;
        for record in &mut recordset.records {
            record.recordset_id = recordset.id;
            record.zone_id = recordset.zone_id;
            record.status = status;
            record.action = action;
        }

        state.recordsets.insert(recordset.id, recordset.clone());
        self.bump_serial(&mut state, recordset.zone_id);

        info!(
            "Updated recordset {} in zone {} (version {})",
            recordset.id, recordset.zone_id, recordset.version
        );
        Ok(recordset)
    }

    async fn delete_recordset(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        recordset_id: Uuid,
    ) -> Result<RecordSet, DirectoryError> {
        let mut state = self.state.write();
        visible_zone(&state, ctx, zone_id)?;

        if !state
            .recordsets
            .get(&recordset_id)
            .is_some_and(|rs| rs.zone_id == zone_id)
        {
            return Err(DirectoryError::RecordSetNotFound(recordset_id));
        }

        let recordset = match self.propagation {
            Propagation::Synchronous => {
                let mut removed = state
                    .recordsets
                    .remove(&recordset_id)
                    .ok_or(DirectoryError::RecordSetNotFound(recordset_id))?;
                removed.status = ProcessingStatus::Deleted;
                removed.action = ChangeAction::Delete;
                removed
            }
            Propagation::Deferred => {
                let pending = state
                    .recordsets
                    .get_mut(&recordset_id)
                    .ok_or(DirectoryError::RecordSetNotFound(recordset_id))?;
                pending.status = ProcessingStatus::Pending;
                pending.action = ChangeAction::Delete;
                pending.updated_at = Some(Utc::now());
                pending.clone()
            }
        };

        self.bump_serial(&mut state, zone_id);

        info!("Deleted recordset {} in zone {}", recordset_id, zone_id);
        Ok(recordset)
    }
}

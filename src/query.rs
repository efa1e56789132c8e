//! Translation of raw list parameters into a typed query plan
//!
//! Paging keys (`marker`, `limit`, `sort_key`, `sort_dir`) are consumed first,
//! every remaining key must be one of the accepted equality filters. Filter
//! values are passed to the directory untouched, including `*` wildcards.

use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

pub const PARAM_MARKER: &str = "marker";
pub const PARAM_LIMIT: &str = "limit";
pub const PARAM_SORT_KEY: &str = "sort_key";
pub const PARAM_SORT_DIR: &str = "sort_dir";

const PAGING_PARAMS: [&str; 4] = [PARAM_MARKER, PARAM_LIMIT, PARAM_SORT_KEY, PARAM_SORT_DIR];

/// Filters a caller may apply to a recordset listing
pub const ACCEPTED_FILTERS: [FilterField; 4] = [
    FilterField::Name,
    FilterField::Type,
    FilterField::Ttl,
    FilterField::Data,
];

/// Errors raised while translating list parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
    #[error("Invalid sort key: {0}")]
    InvalidSortKey(String),
    #[error("Invalid sort direction: {0}")]
    InvalidSortDir(String),
    #[error("Invalid marker: {0}")]
    InvalidMarker(String),
    #[error("Invalid filter(s): {}", .0.join(", "))]
    InvalidFilters(Vec<String>),
}

/// Keys a listing may be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortKey {
    CreatedAt,
    Id,
    UpdatedAt,
    DomainId,
    TenantId,
    Name,
    Type,
    Ttl,
    Records,
}

impl SortKey {
    pub const ALL: [SortKey; 9] = [
        SortKey::CreatedAt,
        SortKey::Id,
        SortKey::UpdatedAt,
        SortKey::DomainId,
        SortKey::TenantId,
        SortKey::Name,
        SortKey::Type,
        SortKey::Ttl,
        SortKey::Records,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::CreatedAt => "created_at",
            SortKey::Id => "id",
            SortKey::UpdatedAt => "updated_at",
            SortKey::DomainId => "domain_id",
            SortKey::TenantId => "tenant_id",
            SortKey::Name => "name",
            SortKey::Type => "type",
            SortKey::Ttl => "ttl",
            SortKey::Records => "records",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        SortKey::ALL.iter().find(|k| k.as_str() == s).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

/// Fields an equality criterion can target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FilterField {
    Name,
    Type,
    Ttl,
    /// Lives on records, not on recordsets
    Data,
    ZoneId,
}

impl FilterField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterField::Name => "name",
            FilterField::Type => "type",
            FilterField::Ttl => "ttl",
            FilterField::Data => "data",
            FilterField::ZoneId => "domain_id",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Equality filters, ordered by field for deterministic plans
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Criterion {
    fields: BTreeMap<FilterField, String>,
}

impl Criterion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: FilterField, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn insert(&mut self, field: FilterField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn get(&self, field: FilterField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn remove(&mut self, field: FilterField) -> Option<String> {
        self.fields.remove(&field)
    }

    pub fn contains(&self, field: FilterField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Page window and ordering for a collection query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub marker: Option<Uuid>,
    pub limit: usize,
    pub sort_key: SortKey,
    pub sort_dir: SortDir,
}

/// Request-scoped plan produced from list parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub page: PageRequest,
    pub criterion: Criterion,
}

/// Page size bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingLimits {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for PagingLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 1000,
        }
    }
}

/// Build a query plan from raw string parameters.
///
/// Pure: the same parameters always yield the same plan or the same error.
pub fn translate(
    params: &BTreeMap<String, String>,
    limits: &PagingLimits,
) -> Result<QueryPlan, QueryError> {
    let param = |key: &str| params.get(key).map(String::as_str).filter(|v| !v.is_empty());

    let marker = param(PARAM_MARKER)
        .map(|m| Uuid::parse_str(m).map_err(|_| QueryError::InvalidMarker(m.to_string())))
        .transpose()?;

    let limit = match param(PARAM_LIMIT) {
        None => limits.default_limit,
        Some("max") => limits.max_limit,
        Some(raw) => {
            let value = raw.parse::<i64>().map_err(|_| {
                QueryError::InvalidLimit(format!("{} (limit should be an integer)", raw))
            })?;
            if value < 1 {
                return Err(QueryError::InvalidLimit(format!(
                    "{} (limit should be a positive integer)",
                    raw
                )));
            }
            usize::try_from(value)
                .unwrap_or(usize::MAX)
                .min(limits.max_limit)
        }
    };

    let sort_key = match param(PARAM_SORT_KEY) {
        None => SortKey::CreatedAt,
        Some(raw) => {
            SortKey::parse(raw).ok_or_else(|| QueryError::InvalidSortKey(raw.to_string()))?
        }
    };

    let sort_dir = match param(PARAM_SORT_DIR) {
        None => SortDir::Asc,
        Some("asc") => SortDir::Asc,
        Some("desc") => SortDir::Desc,
        Some(raw) => return Err(QueryError::InvalidSortDir(raw.to_string())),
    };

    let mut criterion = Criterion::new();
    let mut rejected = Vec::new();
    for (key, value) in params {
        if PAGING_PARAMS.contains(&key.as_str()) {
            continue;
        }
        match ACCEPTED_FILTERS.iter().find(|f| f.as_str() == key) {
            Some(_) if value.is_empty() => {}
            Some(field) => criterion.insert(*field, value.clone()),
            None => rejected.push(key.clone()),
        }
    }
    if !rejected.is_empty() {
        return Err(QueryError::InvalidFilters(rejected));
    }

    Ok(QueryPlan {
        page: PageRequest {
            marker,
            limit,
            sort_key,
            sort_dir,
        },
        criterion,
    })
}

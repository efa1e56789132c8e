//! Domain types shared by the recordset API and the directory backends

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Record types accepted by the recordset collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordType {
    A,
    AAAA,
    CAA,
    CNAME,
    MX,
    NS,
    PTR,
    SOA,
    SPF,
    SRV,
    SSHFP,
    TXT,
}

impl RecordType {
    pub const ALL: [RecordType; 12] = [
        RecordType::A,
        RecordType::AAAA,
        RecordType::CAA,
        RecordType::CNAME,
        RecordType::MX,
        RecordType::NS,
        RecordType::PTR,
        RecordType::SOA,
        RecordType::SPF,
        RecordType::SRV,
        RecordType::SSHFP,
        RecordType::TXT,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::CAA => "CAA",
            RecordType::CNAME => "CNAME",
            RecordType::MX => "MX",
            RecordType::NS => "NS",
            RecordType::PTR => "PTR",
            RecordType::SOA => "SOA",
            RecordType::SPF => "SPF",
            RecordType::SRV => "SRV",
            RecordType::SSHFP => "SSHFP",
            RecordType::TXT => "TXT",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    /// Types are matched exactly; the wire format uses upper case mnemonics
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| s.to_string())
    }
}

/// Processing state reported by the directory service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// Change fully applied
    Active,
    /// Change accepted, propagation still in progress
    Pending,
    /// Propagation failed
    Error,
    /// Removed from the directory
    Deleted,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Active => "ACTIVE",
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Error => "ERROR",
            ProcessingStatus::Deleted => "DELETED",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ProcessingStatus::Pending)
    }
}

/// The kind of change a pending status refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeAction {
    None,
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::None => "NONE",
            ChangeAction::Create => "CREATE",
            ChangeAction::Update => "UPDATE",
            ChangeAction::Delete => "DELETE",
        }
    }
}

/// A DNS zone as owned by the directory service
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: Uuid,
    pub tenant_id: String,
    /// Fully qualified zone name, with trailing dot
    pub name: String,
    pub email: String,
    pub serial: u32,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// A single value inside a recordset
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: Uuid,
    pub recordset_id: Uuid,
    pub zone_id: Uuid,
    pub data: String,
    pub status: ProcessingStatus,
    pub action: ChangeAction,
}

impl Record {
    /// Create a record that has not been stored yet
    pub fn new(recordset_id: Uuid, zone_id: Uuid, data: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recordset_id,
            zone_id,
            data: data.into(),
            status: ProcessingStatus::Active,
            action: ChangeAction::None,
        }
    }
}

/// A named, typed group of records within one zone
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSet {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub rtype: RecordType,
    /// `None` falls back to the zone default
    pub ttl: Option<u32>,
    pub description: Option<String>,
    pub records: Vec<Record>,
    /// Created and maintained by the system rather than a caller
    pub managed: bool,
    pub status: ProcessingStatus,
    pub action: ChangeAction,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RecordSet {
    /// Start a new, not yet persisted recordset
    pub fn draft(
        zone_id: Uuid,
        tenant_id: impl Into<String>,
        name: impl Into<String>,
        rtype: RecordType,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            zone_id,
            tenant_id: tenant_id.into(),
            name: name.into(),
            rtype,
            ttl: None,
            description: None,
            records: Vec::new(),
            managed: false,
            status: ProcessingStatus::Active,
            action: ChangeAction::None,
            version: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Replace the record values, reusing identities of unchanged data
    pub fn set_record_data<I, S>(&mut self, data: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut previous = std::mem::take(&mut self.records);
        for value in data {
            let value = value.into();
            match previous.iter().position(|r| r.data == value) {
                Some(idx) => self.records.push(previous.swap_remove(idx)),
                None => self.records.push(Record::new(self.id, self.zone_id, value)),
            }
        }
    }

    pub fn record_data(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.data.as_str()).collect()
    }

    /// True when this set sits at the apex of the given zone
    pub fn is_zone_root(&self, zone: &Zone) -> bool {
        self.name.eq_ignore_ascii_case(&zone.name)
    }
}

/// One page of recordsets as returned by the directory service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSetList {
    pub items: Vec<RecordSet>,
    /// Number of recordsets matching the criterion, ignoring paging
    pub total_count: usize,
}

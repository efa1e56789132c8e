use crate::model::{RecordSet, RecordType};
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

/// Structural validation errors for request bodies and identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Malformed request body: {0}")]
    InvalidJson(String),
    #[error("Invalid {0}: must be a UUID")]
    InvalidIdentifier(&'static str),
    #[error("{0} is a read-only field")]
    ReadOnlyField(String),
    #[error("{0} is a required field")]
    MissingField(&'static str),
    #[error("{0} cannot be changed")]
    ImmutableField(&'static str),
    #[error("Invalid recordset name: {0}")]
    InvalidName(String),
    #[error("Recordset name too long: {0} bytes")]
    NameTooLong(usize),
    #[error("Label too long: {0} bytes")]
    LabelTooLong(usize),
    #[error("Unsupported recordset type: {0}")]
    InvalidType(String),
    #[error("TTL {ttl} is outside the allowed range {min}..={max}")]
    TtlOutOfRange { ttl: u32, min: u32, max: u32 },
    #[error("Description too long: {0} characters")]
    DescriptionTooLong(usize),
    #[error("A recordset must contain at least one record")]
    NoRecords,
    #[error("Too many records: {0}")]
    TooManyRecords(usize),
    #[error("Duplicate record: {0}")]
    DuplicateRecord(String),
    #[error("Invalid {rtype} record '{data}': {reason}")]
    InvalidRecordData {
        rtype: RecordType,
        data: String,
        reason: String,
    },
}

/// Limits applied to recordset bodies
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    pub max_name_length: usize,
    pub max_label_length: usize,
    pub min_ttl: Option<u32>,
    pub max_ttl: u32,
    pub max_description_length: usize,
    pub max_records_per_recordset: usize,
    pub max_txt_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_name_length: 255,
            max_label_length: 63,
            min_ttl: None,
            max_ttl: 2_147_483_647,
            max_description_length: 160,
            max_records_per_recordset: 100,
            max_txt_length: 255,
        }
    }
}

/// Validate a recordset before it is handed to the directory
pub fn validate_recordset(
    rs: &RecordSet,
    config: &ValidationConfig,
) -> Result<(), ValidationError> {
    validate_name(&rs.name, config, true)?;

    if let Some(ttl) = rs.ttl {
        let min = config.min_ttl.unwrap_or(0);
        if ttl < min || ttl > config.max_ttl {
            return Err(ValidationError::TtlOutOfRange {
                ttl,
                min,
                max: config.max_ttl,
            });
        }
    }

    if let Some(description) = &rs.description {
        let len = description.chars().count();
        if len > config.max_description_length {
            return Err(ValidationError::DescriptionTooLong(len));
        }
    }

    if rs.records.is_empty() {
        return Err(ValidationError::NoRecords);
    }
    if rs.records.len() > config.max_records_per_recordset {
        return Err(ValidationError::TooManyRecords(rs.records.len()));
    }

    let mut seen = HashSet::new();
    for record in &rs.records {
        if !seen.insert(record.data.to_lowercase()) {
            return Err(ValidationError::DuplicateRecord(record.data.clone()));
        }
    }

    if rs.records.len() > 1 && matches!(rs.rtype, RecordType::CNAME | RecordType::SOA) {
        return Err(ValidationError::TooManyRecords(rs.records.len()));
    }

    if rs.rtype == RecordType::SRV {
        let labels: Vec<&str> = rs.name.split('.').collect();
        if labels.len() < 3 || !labels[0].starts_with('_') || !labels[1].starts_with('_') {
            return Err(ValidationError::InvalidName(format!(
                "{} (SRV names must start with _service._proto)",
                rs.name
            )));
        }
    }

    for record in &rs.records {
        validate_record_data(rs.rtype, &record.data, config).map_err(|reason| {
            ValidationError::InvalidRecordData {
                rtype: rs.rtype,
                data: record.data.clone(),
                reason,
            }
        })?;
    }

    Ok(())
}

/// Validate a fully qualified owner name.
///
/// `*` is accepted only as the whole leftmost label when `allow_wildcard` is set.
pub fn validate_name(
    name: &str,
    config: &ValidationConfig,
    allow_wildcard: bool,
) -> Result<(), ValidationError> {
    if name.len() > config.max_name_length {
        return Err(ValidationError::NameTooLong(name.len()));
    }
    let Some(stripped) = name.strip_suffix('.') else {
        return Err(ValidationError::InvalidName(format!(
            "{} (must be fully qualified, ending with '.')",
            name
        )));
    };
    if stripped.is_empty() {
        return Err(ValidationError::InvalidName(name.to_string()));
    }

    for (idx, label) in stripped.split('.').enumerate() {
        if label.is_empty() {
            return Err(ValidationError::InvalidName(format!("{} (empty label)", name)));
        }
        if label.len() > config.max_label_length {
            return Err(ValidationError::LabelTooLong(label.len()));
        }
        if label == "*" && idx == 0 && allow_wildcard {
            continue;
        }
        let valid = label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid || label.starts_with('-') || label.ends_with('-') {
            return Err(ValidationError::InvalidName(format!(
                "{} (invalid label '{}')",
                name, label
            )));
        }
    }
    Ok(())
}

fn is_hostname(value: &str) -> bool {
    validate_name(value, &ValidationConfig::default(), false).is_ok()
}

fn parse_fields<const N: usize>(data: &str) -> Result<[&str; N], String> {
    let fields: Vec<&str> = data.split_whitespace().collect();
    fields
        .try_into()
        .map_err(|f: Vec<&str>| format!("expected {} fields, found {}", N, f.len()))
}

fn parse_number<T: std::str::FromStr>(field: &str, what: &str) -> Result<T, String> {
    field
        .parse::<T>()
        .map_err(|_| format!("{} '{}' is not a valid number", what, field))
}

fn validate_record_data(
    rtype: RecordType,
    data: &str,
    config: &ValidationConfig,
) -> Result<(), String> {
    match rtype {
        RecordType::A => data
            .parse::<Ipv4Addr>()
            .map(|_| ())
            .map_err(|_| "not an IPv4 address".to_string()),
        RecordType::AAAA => data
            .parse::<Ipv6Addr>()
            .map(|_| ())
            .map_err(|_| "not an IPv6 address".to_string()),
        RecordType::CNAME | RecordType::NS | RecordType::PTR => {
            if is_hostname(data) {
                Ok(())
            } else {
                Err("not a fully qualified hostname".to_string())
            }
        }
        RecordType::MX => {
            let [preference, exchange] = parse_fields::<2>(data)?;
            parse_number::<u16>(preference, "preference")?;
            if !is_hostname(exchange) {
                return Err("exchange is not a fully qualified hostname".to_string());
            }
            Ok(())
        }
        RecordType::SRV => {
            let [priority, weight, port, target] = parse_fields::<4>(data)?;
            parse_number::<u16>(priority, "priority")?;
            parse_number::<u16>(weight, "weight")?;
            parse_number::<u16>(port, "port")?;
            if target != "." && !is_hostname(target) {
                return Err("target is not a fully qualified hostname".to_string());
            }
            Ok(())
        }
        RecordType::TXT | RecordType::SPF => {
            if data.is_empty() {
                Err("empty text".to_string())
            } else if data.len() > config.max_txt_length {
                Err(format!("text longer than {} bytes", config.max_txt_length))
            } else {
                Ok(())
            }
        }
        RecordType::SSHFP => {
            let [algorithm, fp_type, fingerprint] = parse_fields::<3>(data)?;
            let algorithm = parse_number::<u8>(algorithm, "algorithm")?;
            let fp_type = parse_number::<u8>(fp_type, "fingerprint type")?;
            if algorithm > 4 {
                return Err(format!("unknown algorithm {}", algorithm));
            }
            if fp_type > 2 {
                return Err(format!("unknown fingerprint type {}", fp_type));
            }
            if fingerprint.is_empty() || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err("fingerprint must be hexadecimal".to_string());
            }
            Ok(())
        }
        RecordType::CAA => {
            let mut parts = data.splitn(3, ' ');
            let flags = parts.next().unwrap_or_default();
            let tag = parts.next().unwrap_or_default();
            let value = parts.next().unwrap_or_default();
            parse_number::<u8>(flags, "flags")?;
            if !matches!(tag, "issue" | "issuewild" | "iodef") {
                return Err(format!("unknown property tag '{}'", tag));
            }
            if value.is_empty() {
                return Err("missing property value".to_string());
            }
            Ok(())
        }
        RecordType::SOA => {
            let [mname, rname, serial, refresh, retry, expire, minimum] = parse_fields::<7>(data)?;
            if !is_hostname(mname) || !is_hostname(rname) {
                return Err("mname and rname must be fully qualified".to_string());
            }
            for (field, what) in [
                (serial, "serial"),
                (refresh, "refresh"),
                (retry, "retry"),
                (expire, "expire"),
                (minimum, "minimum"),
            ] {
                parse_number::<u32>(field, what)?;
            }
            Ok(())
        }
    }
}

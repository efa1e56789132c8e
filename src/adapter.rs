//! Versioned (v2) wire schema for recordsets
//!
//! Parsing turns request bodies into domain recordsets; rendering turns domain
//! recordsets back into response bodies. Nothing here talks to the directory.

use crate::context::RequestContext;
use crate::data_filter::FilteredPage;
use crate::model::{RecordSet, RecordType};
use crate::query::PARAM_MARKER;
use crate::validation::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;
use uuid::Uuid;

/// Fields owned by the service; a body carrying any of them is rejected
pub const READ_ONLY_FIELDS: [&str; 10] = [
    "id",
    "zone_id",
    "project_id",
    "status",
    "action",
    "version",
    "created_at",
    "updated_at",
    "links",
    "zone_name",
];

/// Writable part of a recordset body.
///
/// `ttl` and `description` distinguish "absent" (`None`) from an explicit
/// `null` (`Some(None)`), which clears the value on update.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSetBody {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub rtype: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub ttl: Option<Option<u32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub records: Option<Vec<String>>,
}

fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// Rendered recordset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSetView {
    pub id: Uuid,
    pub zone_id: Uuid,
    pub project_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub rtype: &'static str,
    pub ttl: Option<u32>,
    pub description: Option<String>,
    pub records: Vec<String>,
    pub status: &'static str,
    pub action: &'static str,
    pub version: u32,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub links: Links,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListMetadata {
    pub total_count: usize,
}

/// Rendered recordset page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordSetListView {
    pub recordsets: Vec<RecordSetView>,
    pub links: Links,
    pub metadata: ListMetadata,
}

/// Maps between the v2 wire schema and domain recordsets
#[derive(Debug, Clone)]
pub struct ApiV2Adapter {
    base_url: Url,
}

impl ApiV2Adapter {
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    /// Decode a request body, rejecting read-only and unknown fields
    pub fn parse_body(&self, body: &[u8]) -> Result<RecordSetBody, ValidationError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| ValidationError::InvalidJson(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(ValidationError::InvalidJson(
                "expected a JSON object".to_string(),
            ));
        };

        if let Some(field) = READ_ONLY_FIELDS.iter().find(|f| fields.contains_key(**f)) {
            return Err(ValidationError::ReadOnlyField(field.to_string()));
        }

        serde_json::from_value(Value::Object(fields))
            .map_err(|e| ValidationError::InvalidJson(e.to_string()))
    }

    /// Build a new recordset from a create body
    pub fn parse_new(
        &self,
        ctx: &RequestContext,
        zone_id: Uuid,
        body: RecordSetBody,
    ) -> Result<RecordSet, ValidationError> {
        let name = body.name.ok_or(ValidationError::MissingField("name"))?;
        let rtype = parse_type(&body.rtype.ok_or(ValidationError::MissingField("type"))?)?;

        let mut recordset = RecordSet::draft(zone_id, ctx.tenant_id.as_str(), name, rtype);
        recordset.ttl = body.ttl.flatten();
        recordset.description = body.description.flatten();
        recordset.set_record_data(body.records.unwrap_or_default());
        Ok(recordset)
    }

    /// Overlay an update body onto the persisted recordset
    pub fn parse_overlay(
        &self,
        mut current: RecordSet,
        body: RecordSetBody,
    ) -> Result<RecordSet, ValidationError> {
        if let Some(name) = body.name {
            if !name.eq_ignore_ascii_case(&current.name) {
                return Err(ValidationError::ImmutableField("name"));
            }
        }
        if let Some(rtype) = body.rtype {
            if parse_type(&rtype)? != current.rtype {
                return Err(ValidationError::ImmutableField("type"));
            }
        }

        if let Some(ttl) = body.ttl {
            current.ttl = ttl;
        }
        if let Some(description) = body.description {
            current.description = description;
        }
        if let Some(records) = body.records {
            current.set_record_data(records);
        }
        Ok(current)
    }

    pub fn render(&self, recordset: &RecordSet) -> RecordSetView {
        RecordSetView {
            id: recordset.id,
            zone_id: recordset.zone_id,
            project_id: recordset.tenant_id.clone(),
            name: recordset.name.clone(),
            rtype: recordset.rtype.as_str(),
            ttl: recordset.ttl,
            description: recordset.description.clone(),
            records: recordset.records.iter().map(|r| r.data.clone()).collect(),
            status: recordset.status.as_str(),
            action: recordset.action.as_str(),
            version: recordset.version,
            created_at: timestamp(&recordset.created_at),
            updated_at: recordset.updated_at.as_ref().map(timestamp),
            links: Links {
                self_link: self.self_link(recordset.zone_id, recordset.id),
                next: None,
            },
        }
    }

    /// Render a page; `params` are the list parameters as received
    pub fn render_list(
        &self,
        zone_id: Uuid,
        params: &BTreeMap<String, String>,
        page: &FilteredPage,
    ) -> RecordSetListView {
        let collection = self.collection_url(zone_id);

        let next = page.next_marker.map(|marker| {
            let mut next_params = params.clone();
            next_params.insert(PARAM_MARKER.to_string(), marker.to_string());
            with_query(collection.clone(), &next_params)
        });

        RecordSetListView {
            recordsets: page.recordsets.iter().map(|rs| self.render(rs)).collect(),
            links: Links {
                self_link: with_query(collection, params),
                next,
            },
            metadata: ListMetadata {
                total_count: page.total_count,
            },
        }
    }

    /// Canonical URL of a single recordset, also used for `Location`
    pub fn self_link(&self, zone_id: Uuid, recordset_id: Uuid) -> String {
        let mut url = self.collection_url(zone_id);
        let path = format!("{}/{}", url.path(), recordset_id);
        url.set_path(&path);
        url.to_string()
    }

    fn collection_url(&self, zone_id: Uuid) -> Url {
        let mut url = self.base_url.clone();
        let path = format!(
            "{}/v2/zones/{}/recordsets",
            self.base_url.path().trim_end_matches('/'),
            zone_id
        );
        url.set_path(&path);
        url.set_query(None);
        url
    }
}

fn parse_type(raw: &str) -> Result<RecordType, ValidationError> {
    raw.parse::<RecordType>()
        .map_err(|_| ValidationError::InvalidType(raw.to_string()))
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn with_query(mut url: Url, params: &BTreeMap<String, String>) -> String {
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }
    url.to_string()
}

//! Caller context passed explicitly to every collection operation

use http::HeaderMap;
use uuid::Uuid;

pub const HEADER_PROJECT_ID: &str = "x-auth-project-id";
pub const HEADER_ROLES: &str = "x-roles";
pub const HEADER_ALL_PROJECTS: &str = "x-auth-all-projects";
pub const HEADER_EDIT_MANAGED: &str = "x-designate-edit-managed-records";
pub const HEADER_REQUEST_ID: &str = "x-request-id";

const ADMIN_ROLE: &str = "admin";

/// Identity and capabilities of the caller for one request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub tenant_id: String,
    pub roles: Vec<String>,
    /// Lift tenant scoping on directory lookups
    pub all_tenants: bool,
    /// Allows updates to system-managed recordsets
    pub edit_managed_records: bool,
}

impl RequestContext {
    /// Create a plain member context for a tenant
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            roles: Vec::new(),
            all_tenants: false,
            edit_managed_records: false,
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_edit_managed_records(mut self, allowed: bool) -> Self {
        self.edit_managed_records = allowed;
        self
    }

    pub fn with_all_tenants(mut self, all: bool) -> Self {
        self.all_tenants = all;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(ADMIN_ROLE))
    }

    /// Build a context from request headers.
    ///
    /// Elevated flags are only honoured for callers holding the admin role.
    pub fn from_headers(headers: &HeaderMap, default_tenant: &str) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let tenant_id = header(HEADER_PROJECT_ID).unwrap_or(default_tenant);
        let roles: Vec<String> = header(HEADER_ROLES)
            .map(|v| {
                v.split(',')
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mut context = Self::new(tenant_id).with_roles(roles);
        if context.is_admin() {
            context.all_tenants = header(HEADER_ALL_PROJECTS).is_some_and(is_truthy);
            context.edit_managed_records = header(HEADER_EDIT_MANAGED).is_some_and(is_truthy);
        }
        context
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

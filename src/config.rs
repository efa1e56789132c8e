use crate::error::ConfigError;
use crate::query::PagingLimits;
use crate::validation::{ValidationConfig, validate_name};
use std::net::SocketAddr;
use url::Url;

const ENV_PREFIX: &str = "RECORDSET_API_";

#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Address to bind the HTTP API to
    pub bind_addr: SocketAddr,

    /// Public base URL used for self links and `Location` headers
    pub base_url: Url,

    /// Page size when a list request carries no `limit`
    pub default_limit: usize,

    /// Largest page a caller may ask for
    pub max_limit: usize,

    /// Tenant used when a request carries no project header
    pub default_tenant: String,

    pub min_ttl: Option<u32>,
    pub max_ttl: u32,

    /// Report changes as PENDING until they are settled
    pub async_propagation: bool,

    /// Zones created at startup in the in-memory directory
    pub seed_zones: Vec<String>,

    /// Nameservers written into seeded zones
    pub nameservers: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9001)),
            base_url: Url::parse("http://127.0.0.1:9001").expect("static URL is valid"),
            default_limit: 20,
            max_limit: 1000,
            default_tenant: "noauth-project".to_string(),
            min_ttl: None,
            max_ttl: 2_147_483_647,
            async_propagation: false,
            seed_zones: Vec::new(),
            nameservers: vec!["ns1.example.org.".to_string()],
        }
    }
}

impl ApiConfig {
    /// Create an ApiConfig from `RECORDSET_API_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source; keys are unprefixed
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(bind_addr) = var("BIND_ADDR") {
            config.bind_addr = bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidBindAddress(bind_addr))?;
        }

        if let Some(base_url) = var("BASE_URL") {
            config.base_url = parse_base_url(&base_url)?;
        }

        if let Some(default_limit) = var("DEFAULT_LIMIT") {
            config.default_limit = default_limit
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidLimit(default_limit.clone()))?;
        }

        if let Some(max_limit) = var("MAX_LIMIT") {
            config.max_limit = max_limit
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidLimit(max_limit.clone()))?;
        }

        if let Some(tenant) = var("DEFAULT_TENANT") {
            if tenant.trim().is_empty() {
                return Err(ConfigError::ParseError(
                    "Default tenant must not be empty".to_string(),
                ));
            }
            config.default_tenant = tenant.trim().to_string();
        }

        if let Some(min_ttl) = var("MIN_TTL") {
            config.min_ttl = Some(
                min_ttl
                    .parse::<u32>()
                    .map_err(|_| ConfigError::InvalidTtl(min_ttl.clone()))?,
            );
        }

        if let Some(max_ttl) = var("MAX_TTL") {
            config.max_ttl = max_ttl
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidTtl(max_ttl.clone()))?;
        }

        if let Some(async_propagation) = var("ASYNC_PROPAGATION") {
            config.async_propagation = parse_bool(&async_propagation, false);
        }

        if let Some(zones) = var("SEED_ZONES") {
            config.seed_zones = split_list(&zones).map(fqdn).collect();
        }

        if let Some(nameservers) = var("NAMESERVERS") {
            let nameservers: Vec<String> = split_list(&nameservers).map(fqdn).collect();
            if !nameservers.is_empty() {
                config.nameservers = nameservers;
            }
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_limit == 0 || self.max_limit == 0 {
            return Err(ConfigError::InvalidLimit(
                "Page limits must be greater than 0".to_string(),
            ));
        }

        if self.default_limit > self.max_limit {
            return Err(ConfigError::InvalidLimit(format!(
                "Default limit {} exceeds max limit {}",
                self.default_limit, self.max_limit
            )));
        }

        if let Some(min_ttl) = self.min_ttl {
            if min_ttl > self.max_ttl {
                return Err(ConfigError::InvalidTtl(format!(
                    "Min TTL {} exceeds max TTL {}",
                    min_ttl, self.max_ttl
                )));
            }
        }

        let names = ValidationConfig::default();
        for zone in self.seed_zones.iter().chain(&self.nameservers) {
            validate_name(zone, &names, false)
                .map_err(|e| ConfigError::InvalidZoneName(e.to_string()))?;
        }

        Ok(())
    }

    pub fn paging_limits(&self) -> PagingLimits {
        PagingLimits {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }

    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            min_ttl: self.min_ttl,
            max_ttl: self.max_ttl,
            ..ValidationConfig::default()
        }
    }
}

/// Parse a base URL; only http and https are accepted
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidBaseUrl(format!("{}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
    }
    Ok(url)
}

/// Parse a boolean from a string, with a default value for invalid input
fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

/// Append the root label if missing
pub fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

use clap::Parser;
use recordset_api::{
    adapter::ApiV2Adapter,
    config::{self, ApiConfig},
    directory::{InMemoryDirectory, Propagation},
    http_server::HttpServer,
    metrics::ApiMetrics,
    recordsets::RecordSetsController,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// DNS recordset collection API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Public base URL used for self links
    #[arg(long)]
    base_url: Option<String>,

    /// Zone to create at startup (repeatable)
    #[arg(short, long = "zone")]
    zones: Vec<String>,

    /// Report changes as PENDING instead of completing them immediately
    #[arg(long)]
    async_propagation: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = config::parse_base_url(&base_url)?;
    }
    config
        .seed_zones
        .extend(args.zones.iter().map(|z| config::fqdn(z)));
    config.async_propagation |= args.async_propagation;
    config.validate()?;

    let propagation = if config.async_propagation {
        Propagation::Deferred
    } else {
        Propagation::Synchronous
    };
    let directory =
        Arc::new(InMemoryDirectory::new(propagation).with_nameservers(config.nameservers.clone()));

    for name in &config.seed_zones {
        let email = format!("hostmaster@{}", name.trim_end_matches('.'));
        match directory.create_zone(&config.default_tenant, name, &email) {
            Ok(zone) => info!("Seeded zone {} with id {}", zone.name, zone.id),
            Err(e) => warn!("Skipping zone {}: {}", name, e),
        }
    }

    let metrics = Arc::new(ApiMetrics::new()?);
    let controller = RecordSetsController::new(
        directory,
        ApiV2Adapter::new(config.base_url.clone()),
        config.paging_limits(),
        config.validation_config(),
    )
    .with_metrics(metrics.clone());

    info!(
        "Recordset API for tenant {} (propagation: {:?})",
        config.default_tenant, propagation
    );

    HttpServer::new(
        Arc::new(controller),
        metrics,
        config.default_tenant.clone(),
        config.bind_addr,
    )
    .start()
    .await
}

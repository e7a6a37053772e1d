//! restkit server binary.
//!
//! Loads `*.resource.json` files from a directory, mounts their endpoints
//! and serves them until Ctrl+C.
//!
//! ```bash
//! restkit-server --resources-dir ./resources --schemas-dir ./schemas --port 8080
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use restkit_server::network::{NetworkConfig, NetworkModule, TlsConfig};
use restkit_server::service::{ServerConfig, ServiceContext, ServiceRegistry};
use restkit_server::storage::StaticResolver;
use restkit_server::{telemetry, ResourceLoader};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "restkit-server", version, about = "Serve declarative REST resources")]
struct Args {
    #[arg(long, env = "RESTKIT_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "RESTKIT_PORT", default_value_t = 8080)]
    port: u16,

    /// Directory of `*.resource.json` files.
    #[arg(long, env = "RESTKIT_RESOURCES_DIR")]
    resources_dir: Option<PathBuf>,

    /// Directory of `*.json` schema files, registered by file stem.
    #[arg(long, env = "RESTKIT_SCHEMAS_DIR")]
    schemas_dir: Option<PathBuf>,

    #[arg(long, env = "RESTKIT_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Emit logs as JSON lines.
    #[arg(long, env = "RESTKIT_LOG_JSON")]
    log_json: bool,

    /// Port for the Prometheus scrape endpoint. Disabled when unset.
    #[arg(long, env = "RESTKIT_METRICS_PORT")]
    metrics_port: Option<u16>,

    /// Refuse to start when any resource fails to initialize.
    #[arg(long, env = "RESTKIT_STRICT")]
    strict: bool,

    #[arg(long, env = "RESTKIT_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "RESTKIT_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

impl Args {
    fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..NetworkConfig::default()
        }
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            resources_dir: self.resources_dir.clone(),
            schemas_dir: self.schemas_dir.clone(),
            strict_startup: self.strict,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    telemetry::init_tracing(args.log_json)?;

    if let Some(port) = args.metrics_port {
        telemetry::install_prometheus(SocketAddr::from(([0, 0, 0, 0], port)))?;
    }

    let config = Arc::new(args.server_config());

    let resolver = StaticResolver::new();
    if let Some(dir) = &config.schemas_dir {
        let count = resolver.load_schema_dir(dir).await?;
        info!(schemas = count, dir = %dir.display(), "schemas registered");
    }

    let loader = ResourceLoader::new(Arc::new(resolver)).strict(config.strict_startup);
    if let Some(dir) = &config.resources_dir {
        loader.load_dir(dir).await?;
    }

    let services = ServiceRegistry::new();
    services.register(loader);
    let loader = services
        .get::<ResourceLoader>()
        .ok_or_else(|| anyhow::anyhow!("resource loader not registered"))?;

    let mut module = NetworkModule::new(args.network_config(), loader);
    let ctx = ServiceContext {
        config: Arc::clone(&config),
        endpoints: module.endpoints(),
    };
    services.init_all(&ctx).await?;

    let port = module.start().await?;
    info!(port, "restkit server started");

    module
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    services.shutdown_all(false).await?;
    info!("restkit server stopped");
    Ok(())
}

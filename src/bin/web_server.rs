use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use portuguese_tutor::{
    api::build_router,
    config::{Config, TlsConfig},
    storage::{MemStorage, SharedStorage, SqliteStorage},
    utils::init_log,
};
use time::Duration;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::info;

#[derive(Debug, Parser)]
#[command(author, version, about = "Portuguese tutor web server")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// SQLite database file
    #[arg(short, long)]
    database: Option<PathBuf>,
    #[arg(short = 'H', long)]
    host: Option<String>,
    #[arg(short, long)]
    port: Option<u16>,
    /// Serve the demo curriculum from memory, nothing is persisted
    #[arg(short, long)]
    memory: bool,
    /// Directory for rotated log files
    #[arg(short, long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(database) = self.database {
            config.database = database;
        }
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = Some(log_dir);
        }
        config.memory |= self.memory;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Args::parse().into_config()?;
    let _guard = init_log(config.log_dir.clone(), &config.log_level)?;
    let expiry = Expiry::OnInactivity(Duration::days(config.session_days));

    let app = if config.memory {
        info!("using in-memory storage with demo data");
        let storage: SharedStorage = Arc::new(MemStorage::with_sample_data().await?);
        let sessions = SessionManagerLayer::new(MemoryStore::default()).with_expiry(expiry);
        build_router(storage, sessions)
    } else {
        let sqlite = SqliteStorage::connect(&config.database).await?;
        let store = SqliteStore::new(sqlite.pool().clone());
        store.migrate().await?;
        let sessions = SessionManagerLayer::new(store)
            .with_secure(config.tls.is_some())
            .with_expiry(expiry);
        build_router(Arc::new(sqlite), sessions)
    };

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    match &config.tls {
        Some(TlsConfig { cert, key }) => {
            rustls::crypto::aws_lc_rs::default_provider()
                .install_default()
                .map_err(|e| {
                    anyhow::anyhow!("Failed to initialize rustls crypto provider: {:?}", e)
                })?;
            let tls = RustlsConfig::from_pem_file(cert, key).await?;
            info!("Starting server at https://{}", addr);
            info!("Swagger UI available at https://{}/swagger-ui/", addr);
            axum_server::bind_rustls(addr, tls)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("Starting server at http://{}", addr);
            info!("Swagger UI available at http://{}/swagger-ui/", addr);
            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, app).await?;
        }
    }
    Ok(())
}

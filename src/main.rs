use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall::auth::AdminAuth;
use rollcall::config::{Config, DatabaseBackend, Environment, Overrides, TENANT_ID};
use rollcall::AppState;

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(author, version, about = "Event registration backend", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "rollcall.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    #[arg(long, env = "ROLLCALL_ENV", value_enum)]
    environment: Option<Environment>,

    /// Directory holding the built frontend
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    #[arg(long, env = "DATABASE_BACKEND", value_enum)]
    database_backend: Option<DatabaseBackend>,

    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    #[arg(long, env = "DATABASE_NAME")]
    database_name: Option<String>,

    /// File containing the database connection string
    #[arg(long, env = "DATABASE_CREDENTIALS_PATH")]
    database_credentials_path: Option<PathBuf>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            static_dir: self.static_dir.clone(),
            environment: self.environment,
            admin_password: self.admin_password.clone(),
            jwt_secret: self.jwt_secret.clone(),
            database_backend: self.database_backend,
            database_url: self.database_url.clone(),
            database_name: self.database_name.clone(),
            credentials_path: self.database_credentials_path.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;
    config.apply(cli.overrides());

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Rollcall v{}", env!("CARGO_PKG_VERSION"));

    let credentials = config.auth.resolve(config.server.environment)?;
    let auth = AdminAuth::new(&credentials);

    // Initialize database
    let db = rollcall::db::init(&config.database, TENANT_ID).await?;

    let addr = config.bind_address();
    let state = Arc::new(AppState::new(config, db, auth));
    let app = rollcall::api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(tenant = TENANT_ID, "Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

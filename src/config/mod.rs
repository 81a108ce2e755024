use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Tenant whose document tree this build serves. Fixed at compile time.
pub const TENANT_ID: &str = match option_env!("ROLLCALL_TENANT_ID") {
    Some(id) => id,
    None => "default",
};

/// Minimum length accepted for the token signing secret in production
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    #[serde(default = "default_environment")]
    pub environment: Environment,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
            environment: default_environment(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

fn default_environment() -> Environment {
    Environment::Development
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Shared admin password. Mandatory in production.
    pub admin_password: Option<String>,
    /// HMAC secret used to sign admin tokens. Mandatory in production.
    pub jwt_secret: Option<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_password: None,
            jwt_secret: None,
            token_ttl_hours: default_token_ttl_hours(),
        }
    }
}

fn default_token_ttl_hours() -> i64 {
    24
}

/// Admin credentials after startup validation
#[derive(Clone)]
pub struct AdminCredentials {
    pub password: String,
    pub signing_secret: String,
    pub token_ttl: chrono::Duration,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("password", &"<redacted>")
            .field("signing_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

/// Generate a random hex secret
fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 32] = rng.random();
    hex::encode(bytes)
}

impl AuthConfig {
    /// Validate the configured secrets for the given environment.
    ///
    /// Production refuses to start without both secrets. Development fills in
    /// random values so a local server can run without any setup.
    pub fn resolve(&self, environment: Environment) -> Result<AdminCredentials> {
        if self.token_ttl_hours <= 0 {
            bail!("auth.token_ttl_hours must be positive");
        }

        let password = non_empty(self.admin_password.as_deref());
        let secret = non_empty(self.jwt_secret.as_deref());

        let (password, signing_secret) = match environment {
            Environment::Production => {
                let password =
                    password.context("ADMIN_PASSWORD is required in production mode")?;
                let secret = secret.context("JWT_SECRET is required in production mode")?;
                if secret.len() < MIN_SECRET_LEN {
                    bail!("JWT_SECRET must be at least {} characters", MIN_SECRET_LEN);
                }
                (password, secret)
            }
            Environment::Development => {
                let password = password.unwrap_or_else(|| {
                    let generated = generate_secret();
                    warn!(
                        password = %generated,
                        "ADMIN_PASSWORD not set, generated a development password"
                    );
                    generated
                });
                let secret = secret.unwrap_or_else(|| {
                    warn!("JWT_SECRET not set, admin tokens will not survive a restart");
                    generate_secret()
                });
                (password, secret)
            }
        };

        Ok(AdminCredentials {
            password,
            signing_secret,
            token_ttl: chrono::Duration::hours(self.token_ttl_hours),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    /// MongoDB document store
    Mongo,
    /// Process-local store; data is lost on exit
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_backend")]
    pub backend: DatabaseBackend,
    /// Connection string used when no credentials file is configured
    #[serde(default = "default_database_uri")]
    pub uri: String,
    #[serde(default = "default_database_name")]
    pub name: String,
    /// File holding the connection string (including credentials)
    pub credentials_path: Option<PathBuf>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_database_backend(),
            uri: default_database_uri(),
            name: default_database_name(),
            credentials_path: None,
        }
    }
}

fn default_database_backend() -> DatabaseBackend {
    DatabaseBackend::Mongo
}

fn default_database_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "rollcall".to_string()
}

impl DatabaseConfig {
    /// Resolve the connection string, preferring the credentials file.
    pub fn connection_uri(&self) -> Result<String> {
        let Some(path) = &self.credentials_path else {
            info!("No database credentials file configured, using ambient connection string");
            return Ok(self.uri.clone());
        };

        if !path.exists() {
            bail!("Database credentials file not found: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;
        let uri = content.trim();
        if uri.is_empty() {
            bail!("Database credentials file is empty: {}", path.display());
        }

        info!("Using database credentials from {}", path.display());
        Ok(uri.to_string())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through the environment.
/// Each one that is set wins over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
    pub environment: Option<Environment>,
    pub admin_password: Option<String>,
    pub jwt_secret: Option<String>,
    pub database_backend: Option<DatabaseBackend>,
    pub database_url: Option<String>,
    pub database_name: Option<String>,
    pub credentials_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(dir) = overrides.static_dir {
            self.server.static_dir = dir;
        }
        if let Some(environment) = overrides.environment {
            self.server.environment = environment;
        }
        if overrides.admin_password.is_some() {
            self.auth.admin_password = overrides.admin_password;
        }
        if overrides.jwt_secret.is_some() {
            self.auth.jwt_secret = overrides.jwt_secret;
        }
        if let Some(backend) = overrides.database_backend {
            self.database.backend = backend;
        }
        if let Some(uri) = overrides.database_url {
            self.database.uri = uri;
        }
        if let Some(name) = overrides.database_name {
            self.database.name = name;
        }
        if overrides.credentials_path.is_some() {
            self.database.credentials_path = overrides.credentials_path;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

pub mod api;
pub mod auth;
pub mod config;
pub mod db;

use auth::AdminAuth;
use config::Config;
use db::Database;

pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub auth: AdminAuth,
}

impl AppState {
    pub fn new(config: Config, db: Database, auth: AdminAuth) -> Self {
        Self { config, db, auth }
    }
}

use revwiki_core::revision::{DEFAULT_MAX_SAVE_ATTEMPTS, DEFAULT_SNAPSHOT_THRESHOLD};
use revwiki_core::revision_store::RevisionStoreConfig;

use crate::auth::jwt::JwtConfig;

/// Default context lines for the diff endpoint.
pub const DEFAULT_DIFF_CONTEXT: usize = 3;

/// Default size of the PostgreSQL connection pool.
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 20;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// PostgreSQL URL. `None` runs the server on the in-memory repository.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Snapshot cadence and save retry budget for the revision store.
    pub store: RevisionStoreConfig,
    /// Context lines for the diff endpoint when the request gives none.
    pub default_diff_context: usize,
    /// JWT token configuration.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                       |
    /// | `DATABASE_URL`             | unset (in-memory)          |
    /// | `DATABASE_MAX_CONNECTIONS` | `20`                       |
    /// | `SNAPSHOT_THRESHOLD`       | `50`                       |
    /// | `SAVE_MAX_ATTEMPTS`        | `3`                        |
    /// | `DEFAULT_DIFF_CONTEXT`     | `3`                        |
    ///
    /// # Panics
    ///
    /// Panics on unparseable values and on a missing `JWT_SECRET`.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        let db_max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| DEFAULT_DB_MAX_CONNECTIONS.to_string())
            .parse()
            .expect("DATABASE_MAX_CONNECTIONS must be a valid u32");

        let snapshot_threshold: i32 = std::env::var("SNAPSHOT_THRESHOLD")
            .unwrap_or_else(|_| DEFAULT_SNAPSHOT_THRESHOLD.to_string())
            .parse()
            .expect("SNAPSHOT_THRESHOLD must be a valid i32");

        let max_save_attempts: u32 = std::env::var("SAVE_MAX_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_SAVE_ATTEMPTS.to_string())
            .parse()
            .expect("SAVE_MAX_ATTEMPTS must be a valid u32");

        let default_diff_context: usize = std::env::var("DEFAULT_DIFF_CONTEXT")
            .unwrap_or_else(|_| DEFAULT_DIFF_CONTEXT.to_string())
            .parse()
            .expect("DEFAULT_DIFF_CONTEXT must be a valid usize");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url,
            db_max_connections,
            store: RevisionStoreConfig {
                snapshot_threshold,
                max_save_attempts,
            },
            default_diff_context,
            jwt,
        }
    }
}

use clap::Parser;
use datalens_navigator::{ConnectionDefaults, PoolSettings};
use sqlx::postgres::PgSslMode;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "navigator-server", version, about = "Data lens navigator API server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "NAVIGATOR_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// Path the API is mounted under
    #[arg(long, env = "NAVIGATOR_BASE_PATH", default_value = "/datalens")]
    pub base_path: String,

    /// JSON file with lens configurations and data source credentials
    #[arg(long, env = "DATALENS_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Maximum number of connection pools kept open at once
    #[arg(long, env = "NAVIGATOR_MAX_POOLS", default_value_t = 8)]
    pub max_pools: usize,

    /// Maximum connections per pool
    #[arg(long, env = "NAVIGATOR_MAX_CONNECTIONS", default_value_t = 20)]
    pub max_connections: u32,

    /// Connection establishment timeout in milliseconds
    #[arg(long, env = "NAVIGATOR_CONNECT_TIMEOUT_MS", default_value_t = 2000)]
    pub connect_timeout_ms: u64,

    #[command(flatten)]
    pub database: DatabaseArgs,
}

/// Connection used when a request names no data source
#[derive(Debug, clap::Args)]
pub struct DatabaseArgs {
    #[arg(long = "db-host", env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long = "db-port", env = "DB_PORT", default_value_t = 5432)]
    pub port: u16,

    #[arg(long = "db-database", env = "DB_DATABASE", default_value = "postgres")]
    pub database: String,

    #[arg(long = "db-schema", env = "DB_SCHEMA", default_value = "public")]
    pub schema: String,

    #[arg(long = "db-user", env = "DB_USER", default_value = "postgres")]
    pub user: String,

    #[arg(long = "db-password", env = "DB_PASSWORD", default_value = "postgres", hide_env_values = true)]
    pub password: String,

    /// disable, allow, prefer, require, verify-ca or verify-full
    #[arg(long = "db-ssl-mode", env = "DB_SSL_MODE", default_value = "prefer", value_parser = parse_ssl_mode)]
    pub ssl_mode: PgSslMode,

    /// PEM-encoded CA certificate
    #[arg(long = "db-ca-cert", env = "DB_CA_CERT", hide_env_values = true)]
    pub ca_cert: Option<String>,

    /// PEM-encoded client certificate
    #[arg(long = "db-client-cert", env = "DB_CLIENT_CERT", hide_env_values = true)]
    pub client_cert: Option<String>,

    /// PEM-encoded client key
    #[arg(long = "db-client-key", env = "DB_CLIENT_KEY", hide_env_values = true)]
    pub client_key: Option<String>,
}

fn parse_ssl_mode(value: &str) -> Result<PgSslMode, String> {
    value
        .parse::<PgSslMode>()
        .map_err(|_| format!("unsupported ssl mode '{}'", value))
}

impl Config {
    pub fn connection_defaults(&self) -> ConnectionDefaults {
        let database = &self.database;
        ConnectionDefaults {
            host: database.host.clone(),
            port: database.port,
            database: database.database.clone(),
            schema: database.schema.clone(),
            username: database.user.clone(),
            password: database.password.clone(),
            ssl_mode: database.ssl_mode,
            ca_cert: database.ca_cert.clone(),
            client_cert: database.client_cert.clone(),
            client_key: database.client_key.clone(),
        }
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.max_connections,
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            max_pools: self.max_pools,
            ..PoolSettings::default()
        }
    }
}

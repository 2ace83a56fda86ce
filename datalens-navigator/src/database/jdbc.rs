//! JDBC-style PostgreSQL URL parsing
//!
//! Data sources are registered with the URLs database tools hand out, e.g.
//! `jdbc:postgresql://warehouse.internal:5432/analytics?currentSchema=sales`.

use crate::database::traits::DatabaseError;
use sqlx::postgres::PgSslMode;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_SCHEMA: &str = "public";

/// Connection coordinates extracted from a JDBC URL
#[derive(Debug, Clone)]
pub struct JdbcUrl {
    pub host: String,
    pub port: u16,

    /// Database name; empty means the server default for the user
    pub database: String,

    /// Schema from the `currentSchema` parameter, `public` when absent
    pub schema: String,

    /// TLS mode from the `sslmode` parameter
    pub ssl_mode: Option<PgSslMode>,
}

impl FromStr for JdbcUrl {
    type Err = DatabaseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let rest = trimmed.strip_prefix("jdbc:").unwrap_or(trimmed);

        let scheme_ok = ["postgresql://", "postgres://"]
            .iter()
            .any(|scheme| rest.starts_with(scheme));
        if !scheme_ok {
            return Err(DatabaseError::InvalidDataSource(format!(
                "unsupported JDBC URL '{}', expected jdbc:postgresql://host[:port]/database",
                raw
            )));
        }

        let url = Url::parse(rest)
            .map_err(|error| DatabaseError::InvalidDataSource(format!("invalid JDBC URL: {}", error)))?;

        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| DatabaseError::InvalidDataSource("JDBC URL has no host".to_string()))?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        let database = url.path().trim_start_matches('/').to_string();

        let mut schema = DEFAULT_SCHEMA.to_string();
        let mut ssl_mode = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "currentSchema" if !value.is_empty() => schema = value.into_owned(),
                "sslmode" => {
                    ssl_mode = Some(PgSslMode::from_str(&value).map_err(|_| {
                        DatabaseError::InvalidDataSource(format!("unsupported sslmode '{}'", value))
                    })?)
                }
                _ => {}
            }
        }

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_PORT),
            database,
            schema,
            ssl_mode,
        })
    }
}

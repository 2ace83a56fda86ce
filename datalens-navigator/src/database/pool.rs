//! Connection pool manager
//!
//! Keeps one pool per data source identity (host, port, database, user) and
//! bounds the number of live pools. A pool is closed when its credentials
//! change, when it is the least recently used entry of a full cache, and at
//! shutdown.

use crate::database::jdbc::{JdbcUrl, DEFAULT_PORT, DEFAULT_SCHEMA};
use crate::database::traits::{DatabaseError, ResolvedConnection};
use crate::schema::DataSourceCredentials;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Connection, PgConnection, PgPool};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Connection used when a request carries no data source
#[derive(Clone)]
pub struct ConnectionDefaults {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: PgSslMode,

    /// PEM-encoded CA certificate
    pub ca_cert: Option<String>,

    /// PEM-encoded client certificate
    pub client_cert: Option<String>,

    /// PEM-encoded client key
    pub client_key: Option<String>,
}

impl Default for ConnectionDefaults {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            database: "postgres".to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            username: "postgres".to_string(),
            password: "postgres".to_string(),
            ssl_mode: PgSslMode::Prefer,
            ca_cert: None,
            client_cert: None,
            client_key: None,
        }
    }
}

impl fmt::Debug for ConnectionDefaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDefaults")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("username", &self.username)
            .field("ssl_mode", &self.ssl_mode)
            .finish_non_exhaustive()
    }
}

/// Pool sizing and timeouts
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// Maximum connections per pool
    pub max_connections: u32,

    /// Idle connections are closed after this long
    pub idle_timeout: Duration,

    /// Limit for establishing or checking out a connection
    pub connect_timeout: Duration,

    /// Maximum number of pools kept open at once
    pub max_pools: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 20,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(2),
            max_pools: 8,
        }
    }
}

/// Identity of a cached pool
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}/{}", self.username, self.host, self.port, self.database)
    }
}

/// Everything needed to open connections to one data source
#[derive(Clone)]
struct ConnectionTarget {
    key: PoolKey,
    password: String,
    schema: String,
    ssl_mode: PgSslMode,
    ca_cert: Option<String>,
    client_cert: Option<String>,
    client_key: Option<String>,
}

impl ConnectionTarget {
    fn from_defaults(defaults: &ConnectionDefaults) -> Self {
        Self {
            key: PoolKey {
                host: defaults.host.to_ascii_lowercase(),
                port: defaults.port,
                database: defaults.database.clone(),
                username: defaults.username.clone(),
            },
            password: defaults.password.clone(),
            schema: defaults.schema.clone(),
            ssl_mode: defaults.ssl_mode,
            ca_cert: defaults.ca_cert.clone(),
            client_cert: defaults.client_cert.clone(),
            client_key: defaults.client_key.clone(),
        }
    }

    fn from_credentials(credentials: &DataSourceCredentials) -> Result<Self, DatabaseError> {
        let url: JdbcUrl = credentials.jdbc_url.parse()?;
        Ok(Self {
            key: PoolKey {
                host: url.host.to_ascii_lowercase(),
                port: url.port,
                database: url.database,
                username: credentials.username.clone(),
            },
            password: credentials.password.clone(),
            schema: url.schema,
            // No sslmode: try TLS without verifying, fall back to plaintext
            ssl_mode: url.ssl_mode.unwrap_or(PgSslMode::Prefer),
            ca_cert: None,
            client_cert: None,
            client_key: None,
        })
    }

    fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new()
            .host(&self.key.host)
            .port(self.key.port)
            .username(&self.key.username)
            .password(&self.password)
            .ssl_mode(self.ssl_mode);

        if !self.key.database.is_empty() {
            options = options.database(&self.key.database);
        }
        if let Some(pem) = &self.ca_cert {
            options = options.ssl_root_cert_from_pem(pem.as_bytes().to_vec());
        }
        if let Some(pem) = &self.client_cert {
            options = options.ssl_client_cert_from_pem(pem.as_bytes());
        }
        if let Some(pem) = &self.client_key {
            options = options.ssl_client_key_from_pem(pem.as_bytes());
        }

        options
    }
}

struct CachedPool<P> {
    pool: P,
    password: String,
    last_used: u64,
}

/// Least-recently-used bookkeeping for open pools
struct PoolCache<P> {
    entries: HashMap<PoolKey, CachedPool<P>>,
    capacity: usize,
    clock: u64,
}

impl<P: Clone> PoolCache<P> {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            clock: 0,
        }
    }

    /// Cached pool for `key`, provided it was opened with `password`
    fn get(&mut self, key: &PoolKey, password: &str) -> Option<P> {
        self.clock += 1;
        let clock = self.clock;
        let entry = self.entries.get_mut(key)?;
        if entry.password != password {
            return None;
        }
        entry.last_used = clock;
        Some(entry.pool.clone())
    }

    /// Insert a pool and return the pools it displaced
    ///
    /// An entry with the same key but different credentials is replaced; when
    /// the cache is full the least recently used entry is evicted.
    fn insert(&mut self, key: PoolKey, password: String, pool: P) -> Vec<(PoolKey, P)> {
        self.clock += 1;
        let mut displaced = Vec::new();

        if let Some(previous) = self.entries.remove(&key) {
            displaced.push((key.clone(), previous.pool));
        }

        while self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            match oldest.and_then(|key| self.entries.remove_entry(&key)) {
                Some((key, entry)) => displaced.push((key, entry.pool)),
                None => break,
            }
        }

        self.entries.insert(
            key,
            CachedPool {
                pool,
                password,
                last_used: self.clock,
            },
        );
        displaced
    }

    fn drain(&mut self) -> Vec<(PoolKey, P)> {
        self.entries
            .drain()
            .map(|(key, entry)| (key, entry.pool))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Process-wide owner of database connection pools
pub struct PoolManager {
    defaults: ConnectionTarget,
    settings: PoolSettings,
    cache: Mutex<PoolCache<PgPool>>,
}

impl PoolManager {
    pub fn new(defaults: ConnectionDefaults, settings: PoolSettings) -> Self {
        let cache = PoolCache::new(settings.max_pools);
        Self {
            defaults: ConnectionTarget::from_defaults(&defaults),
            settings,
            cache: Mutex::new(cache),
        }
    }

    /// Pool for the given data source, or for the defaults when `source` is `None`
    ///
    /// Pools are created on first use and reused while their credentials are
    /// unchanged.
    pub async fn resolve(
        &self,
        source: Option<&DataSourceCredentials>,
    ) -> Result<ResolvedConnection<PgPool>, DatabaseError> {
        let target = match source {
            Some(credentials) => ConnectionTarget::from_credentials(credentials)?,
            None => self.defaults.clone(),
        };

        if let Some(pool) = self.cache.lock().await.get(&target.key, &target.password) {
            return Ok(ResolvedConnection {
                connection: pool,
                schema: target.schema,
            });
        }

        // Connect outside the lock
        let created = self.create_pool(&target).await?;

        let (pool, displaced) = {
            let mut cache = self.cache.lock().await;
            match cache.get(&target.key, &target.password) {
                Some(existing) => (existing, vec![(target.key.clone(), created)]),
                None => {
                    let displaced = cache.insert(target.key.clone(), target.password.clone(), created.clone());
                    (created, displaced)
                }
            }
        };

        for (key, stale) in displaced {
            info!(pool = %key, "closing superseded connection pool");
            tokio::spawn(async move { stale.close().await });
        }

        Ok(ResolvedConnection {
            connection: pool,
            schema: target.schema,
        })
    }

    /// Open one connection with the given credentials and run `SELECT 1`
    pub async fn test_connection(&self, source: &DataSourceCredentials) -> Result<(), DatabaseError> {
        let target = ConnectionTarget::from_credentials(source)?;
        let mut connection = tokio::time::timeout(
            self.settings.connect_timeout,
            PgConnection::connect_with(&target.connect_options()),
        )
        .await
        .map_err(|_| DatabaseError::Timeout)??;

        sqlx::query("SELECT 1").execute(&mut connection).await?;
        connection.close().await?;

        info!(pool = %target.key, "connection test succeeded");
        Ok(())
    }

    /// Number of pools currently open
    pub async fn open_pools(&self) -> usize {
        self.cache.lock().await.len()
    }

    /// Close every pool, waiting for checked-out connections to be returned
    pub async fn close_all(&self) {
        let pools = self.cache.lock().await.drain();
        for (key, pool) in pools {
            info!(pool = %key, "closing connection pool");
            pool.close().await;
        }
    }

    async fn create_pool(&self, target: &ConnectionTarget) -> Result<PgPool, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.settings.max_connections)
            .idle_timeout(self.settings.idle_timeout)
            .acquire_timeout(self.settings.connect_timeout)
            .connect_with(target.connect_options())
            .await
            .map_err(|error| {
                warn!(pool = %target.key, error = %error, "failed to connect to database");
                DatabaseError::from(error)
            })?;

        let (database, user): (String, String) =
            sqlx::query_as("SELECT current_database()::text, current_user::text")
                .fetch_one(&pool)
                .await?;
        info!(pool = %target.key, database = %database, user = %user, "connection pool created");

        Ok(pool)
    }
}

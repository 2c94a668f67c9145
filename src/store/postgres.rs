//! PostgreSQL graph store for production use.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use super::{StoreError, TableGraphStore};
use crate::search::{CandidateIndex, SearchError};
use crate::text;
use crate::types::{DependencyRef, PackageVertex, TableIdentifier, VersionRef, VertexKey};

/// SQL schema for the package vertex table.
pub const TABLE_PACKAGES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS table_packages (
    key TEXT PRIMARY KEY,
    table_identifier TEXT NOT NULL,
    version BIGINT NOT NULL CHECK (version > 0),
    definition TEXT NOT NULL,
    definition_hash TEXT NOT NULL,
    published_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),

    -- One immutable vertex per published version
    CONSTRAINT table_packages_identifier_version_idx UNIQUE (table_identifier, version)
);

CREATE INDEX IF NOT EXISTS idx_table_packages_latest
    ON table_packages(table_identifier, version DESC);
"#;

/// SQL schema for the dependency edge table.
pub const TABLE_DEPENDENCIES_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS table_dependencies (
    id BIGSERIAL PRIMARY KEY,
    from_key TEXT NOT NULL REFERENCES table_packages(key) ON DELETE CASCADE,
    to_identifier TEXT NOT NULL,
    to_version TEXT NOT NULL,

    -- Duplicate declarations collapse to one edge
    CONSTRAINT table_dependencies_unique_edge UNIQUE (from_key, to_identifier, to_version)
);

CREATE INDEX IF NOT EXISTS idx_table_dependencies_from
    ON table_dependencies(from_key, id);
"#;

/// Configuration for PostgreSQL connection pool.
///
/// Defaults are tuned for a small always-on service:
/// - Pool size balances concurrency with connection limits
/// - Timeouts are aggressive to fail fast
/// - Idle timeout releases unused connections
/// - Max lifetime forces periodic reconnection for health
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/table_registry".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// PostgreSQL graph store.
///
/// Persists package vertices and dependency edges; uses connection
/// pooling with production-tuned settings. Version slots are claimed
/// through the unique `(table_identifier, version)` constraint, so
/// concurrent publishes of the same version are arbitrated by the
/// database rather than by this process.
pub struct PostgresGraphStore {
    pool: PgPool,
}

impl PostgresGraphStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, sqlx::Error> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, sqlx::Error> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Create the registry tables and indexes if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        use sqlx::Executor;
        self.pool.execute(TABLE_PACKAGES_SCHEMA).await?;
        self.pool.execute(TABLE_DEPENDENCIES_SCHEMA).await?;
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    /// Parse a package vertex from a database row.
    fn parse_package_row(row: &PgRow) -> Result<PackageVertex, StoreError> {
        let key: String = row.try_get("key")?;
        let raw_identifier: String = row.try_get("table_identifier")?;
        let raw_version: i64 = row.try_get("version")?;
        let definition: String = row.try_get("definition")?;
        let definition_hash: String = row.try_get("definition_hash")?;
        let published_at: chrono::DateTime<chrono::Utc> = row.try_get("published_at")?;

        let table_identifier =
            TableIdentifier::parse(&raw_identifier).map_err(StoreError::backend)?;
        let version = u32::try_from(raw_version).map_err(|_| {
            StoreError::backend_msg(format!("stored version {raw_version} out of range"))
        })?;

        Ok(PackageVertex {
            key: VertexKey::from_stored(key),
            table_identifier,
            version,
            definition,
            definition_hash,
            published_at,
        })
    }

    /// Verify a vertex read back from the database against its
    /// recorded content hash. Fails loudly on mismatch rather than
    /// serving silently corrupted definitions.
    fn verify_definition_hash(vertex: &PackageVertex) -> Result<(), StoreError> {
        let computed = text::definition_hash(&vertex.definition);
        if computed != vertex.definition_hash {
            tracing::warn!(
                key = %vertex.key,
                stored = %vertex.definition_hash,
                computed = %computed,
                "Definition hash mismatch on read"
            );
            return Err(StoreError::DefinitionHashMismatch {
                key: vertex.key.clone(),
                stored: vertex.definition_hash.clone(),
                computed,
            });
        }
        tracing::trace!(key = %vertex.key, "Definition hash verified");
        Ok(())
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        StoreError::backend(error)
    }
}

#[async_trait]
impl TableGraphStore for PostgresGraphStore {
    async fn upsert_vertex(
        &self,
        identifier: &TableIdentifier,
        version: u32,
        definition: &str,
    ) -> Result<PackageVertex, StoreError> {
        let candidate = PackageVertex::new(identifier.clone(), version, definition);
        let inserted = sqlx::query(
            r#"
            INSERT INTO table_packages
                (key, table_identifier, version, definition, definition_hash, published_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (table_identifier, version) DO NOTHING
            "#,
        )
        .bind(candidate.key.as_str())
        .bind(candidate.table_identifier.to_string())
        .bind(i64::from(candidate.version))
        .bind(&candidate.definition)
        .bind(&candidate.definition_hash)
        .bind(candidate.published_at)
        .execute(&self.pool)
        .await?;

        if inserted.rows_affected() == 1 {
            return Ok(candidate);
        }

        // Lost the slot: this version already exists. Identical
        // canonical content is an idempotent no-op, anything else is a
        // genuine conflict.
        let existing = self
            .get_vertex(identifier, VersionRef::Version(version))
            .await?
            .ok_or_else(|| {
                StoreError::backend_msg(format!("vertex {} vanished during upsert", candidate.key))
            })?;
        if existing.definition_hash == candidate.definition_hash {
            Ok(existing)
        } else {
            tracing::warn!(
                identifier = %identifier,
                version,
                "Version slot already claimed with different content"
            );
            Err(StoreError::VersionConflict {
                identifier: identifier.clone(),
                version,
            })
        }
    }

    async fn upsert_edge(&self, from: &VertexKey, to: DependencyRef) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO table_dependencies (from_key, to_identifier, to_version)
            VALUES ($1, $2, $3)
            ON CONFLICT (from_key, to_identifier, to_version) DO NOTHING
            "#,
        )
        .bind(from.as_str())
        .bind(to.table_identifier.to_string())
        .bind(to.version.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_vertex(
        &self,
        identifier: &TableIdentifier,
        version: VersionRef,
    ) -> Result<Option<PackageVertex>, StoreError> {
        let row = match version {
            VersionRef::Version(v) => {
                sqlx::query(
                    r#"
                    SELECT key, table_identifier, version, definition, definition_hash,
                           published_at
                    FROM table_packages
                    WHERE table_identifier = $1 AND version = $2
                    "#,
                )
                .bind(identifier.to_string())
                .bind(i64::from(v))
                .fetch_optional(&self.pool)
                .await?
            }
            VersionRef::Latest => {
                sqlx::query(
                    r#"
                    SELECT key, table_identifier, version, definition, definition_hash,
                           published_at
                    FROM table_packages
                    WHERE table_identifier = $1
                    ORDER BY version DESC
                    LIMIT 1
                    "#,
                )
                .bind(identifier.to_string())
                .fetch_optional(&self.pool)
                .await?
            }
        };

        match row {
            Some(ref r) => {
                let vertex = Self::parse_package_row(r)?;
                Self::verify_definition_hash(&vertex)?;
                Ok(Some(vertex))
            }
            None => Ok(None),
        }
    }

    async fn get_outgoing_edges(
        &self,
        from: &VertexKey,
    ) -> Result<Vec<DependencyRef>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT to_identifier, to_version
            FROM table_dependencies
            WHERE from_key = $1
            ORDER BY id
            "#,
        )
        .bind(from.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DependencyRef, StoreError> {
                let raw_identifier: String = row.try_get("to_identifier")?;
                let raw_version: String = row.try_get("to_version")?;
                let table_identifier =
                    TableIdentifier::parse(&raw_identifier).map_err(StoreError::backend)?;
                let version = raw_version
                    .parse::<VersionRef>()
                    .map_err(StoreError::backend)?;
                Ok(DependencyRef {
                    table_identifier,
                    version,
                })
            })
            .collect()
    }
}

#[async_trait]
impl CandidateIndex for PostgresGraphStore {
    /// Case-insensitive substring match via `ILIKE`, ordered by
    /// identifier for deterministic results.
    async fn search(&self, query: &str) -> Result<Vec<TableIdentifier>, SearchError> {
        let pattern = format!("%{}%", escape_like(query));
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT table_identifier
            FROM table_packages
            WHERE table_identifier ILIKE $1
            ORDER BY table_identifier
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(SearchError::index)?;

        rows.iter()
            .map(|row| {
                let raw: String = row.try_get("table_identifier").map_err(SearchError::index)?;
                TableIdentifier::parse(&raw).map_err(SearchError::index)
            })
            .collect()
    }
}

/// Escape `LIKE` wildcards so user input matches literally.
/// Identifier slugs legitimately contain underscores.
fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

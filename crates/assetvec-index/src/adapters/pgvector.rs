//! PostgreSQL + pgvector adapter.
//!
//! One table per project, `(asset_id TEXT PRIMARY KEY, embedding vector(dim))`,
//! created on first write. The `vector` extension is created once per process.

use std::collections::HashSet;

use assetvec_config::{ConfigError, IndexKind, PostgresSettings};
use async_trait::async_trait;
use pgvector::Vector;
use tokio::sync::{OnceCell, RwLock};
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use crate::error::{check_dimension, require_ids, IndexError, Operation, Result};
use crate::namespace::{NamespaceResolver, POSTGRES_TABLE};
use crate::traits::{should_search, VectorIndex};

fn backend_err(operation: Operation) -> impl FnOnce(tokio_postgres::Error) -> IndexError {
    move |e| IndexError::backend(IndexKind::Pgvector, operation, e)
}

/// `42P01`: the project's table was never created.
fn is_undefined_table(e: &tokio_postgres::Error) -> bool {
    e.code() == Some(&SqlState::UNDEFINED_TABLE)
}

/// pgvector-backed index
pub struct PgvectorIndex {
    client: Client,
    dimension: usize,
    resolver: NamespaceResolver,
    extension_ready: OnceCell<()>,
    known_tables: RwLock<HashSet<String>>,
}

impl PgvectorIndex {
    /// Connect and spawn the connection driver task.
    pub async fn connect(settings: &PostgresSettings, dimension: usize) -> Result<Self> {
        let conn_str = settings
            .connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                ConfigError::missing("index.postgres.connection_string", IndexKind::Pgvector)
            })?;

        info!("Connecting to PostgreSQL");
        let (client, connection) = tokio_postgres::connect(conn_str, NoTls)
            .await
            .map_err(backend_err(Operation::Connect))?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection closed: {}", e);
            }
        });

        info!("Connected to PostgreSQL (dim={})", dimension);

        Ok(Self {
            client,
            dimension,
            resolver: NamespaceResolver::new(&settings.table_prefix, POSTGRES_TABLE),
            extension_ready: OnceCell::new(),
            known_tables: RwLock::new(HashSet::new()),
        })
    }

    async fn ensure_table(&self, table: &str) -> Result<()> {
        if self.known_tables.read().await.contains(table) {
            return Ok(());
        }

        self.extension_ready
            .get_or_try_init(|| async {
                self.client
                    .batch_execute("CREATE EXTENSION IF NOT EXISTS vector")
                    .await
                    .map_err(backend_err(Operation::AddOrUpdate))
            })
            .await?;

        let mut known = self.known_tables.write().await;
        if known.contains(table) {
            return Ok(());
        }

        info!("Creating table '{}' (dim={})", table, self.dimension);
        self.client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (asset_id TEXT PRIMARY KEY, embedding vector({}) NOT NULL)",
                table, self.dimension
            ))
            .await
            .map_err(backend_err(Operation::AddOrUpdate))?;

        known.insert(table.to_string());
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for PgvectorIndex {
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        require_ids(project_id, asset_id)?;
        check_dimension(self.dimension, vector)?;

        let table = self.resolver.resolve(project_id);
        self.ensure_table(&table).await?;

        let embedding = Vector::from(vector.to_vec());
        self.client
            .execute(
                &format!(
                    "INSERT INTO \"{}\" (asset_id, embedding) VALUES ($1, $2) \
                     ON CONFLICT (asset_id) DO UPDATE SET embedding = EXCLUDED.embedding",
                    table
                ),
                &[&asset_id, &embedding],
            )
            .await
            .map_err(backend_err(Operation::AddOrUpdate))?;

        debug!("Upserted asset '{}' into '{}'", asset_id, table);
        Ok(())
    }

    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        if !should_search(self.dimension, project_id, query, top_n)? {
            return Ok(Vec::new());
        }

        let table = self.resolver.resolve(project_id);
        let embedding = Vector::from(query.to_vec());
        let limit = i64::try_from(top_n).unwrap_or(i64::MAX);

        let rows = match self
            .client
            .query(
                &format!(
                    "SELECT asset_id FROM \"{}\" ORDER BY embedding <-> $1 LIMIT $2",
                    table
                ),
                &[&embedding, &limit],
            )
            .await
        {
            Ok(rows) => rows,
            Err(e) if is_undefined_table(&e) => return Ok(Vec::new()),
            Err(e) => return Err(backend_err(Operation::Search)(e)),
        };

        Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
    }

    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        require_ids(project_id, asset_id)?;

        let table = self.resolver.resolve(project_id);
        match self
            .client
            .execute(
                &format!("DELETE FROM \"{}\" WHERE asset_id = $1", table),
                &[&asset_id],
            )
            .await
        {
            Ok(deleted) => {
                debug!("Removed {} rows for asset '{}' from '{}'", deleted, asset_id, table);
                Ok(())
            }
            Err(e) if is_undefined_table(&e) => Ok(()),
            Err(e) => Err(backend_err(Operation::Remove)(e)),
        }
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Pgvector
    }
}

impl std::fmt::Debug for PgvectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgvectorIndex")
            .field("dimension", &self.dimension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_requires_connection_string() {
        let settings = PostgresSettings::default();
        let err = PgvectorIndex::connect(&settings, 3).await.unwrap_err();
        assert!(matches!(err, IndexError::Config(_)));
        assert!(err.to_string().contains("connection_string"));
    }

    #[tokio::test]
    async fn test_connect_failure_is_backend_error() {
        let settings = PostgresSettings {
            connection_string: Some("host=127.0.0.1 port=1 user=nobody connect_timeout=1".into()),
            ..Default::default()
        };
        let err = PgvectorIndex::connect(&settings, 3).await.unwrap_err();
        assert!(matches!(
            err,
            IndexError::Backend {
                kind: IndexKind::Pgvector,
                operation: Operation::Connect,
                ..
            }
        ));
    }
}

//! SQLite + sqlite-vec adapter.
//!
//! One database file; each project is a `vec0` virtual table
//! `(asset_id TEXT PRIMARY KEY, embedding float[dim])` created on first
//! write. SQLite calls block, so they run on `spawn_blocking` against a
//! connection shared behind a mutex.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

use assetvec_config::{IndexKind, SqliteSettings};
use async_trait::async_trait;
use rusqlite::{ffi::sqlite3_auto_extension, params, Connection, OptionalExtension};
use sqlite_vec::sqlite3_vec_init;
use tracing::{debug, info};

use crate::error::{check_dimension, require_ids, IndexError, Operation, Result};
use crate::namespace::{NamespaceResolver, SQLITE_COLLECTION};
use crate::traits::{should_search, VectorIndex};

/// Largest `k` sqlite-vec accepts in a KNN query
const MAX_K: usize = 4096;

static REGISTER_EXTENSION: Once = Once::new();

/// Make `vec0` available to every connection opened afterwards.
fn register_extension() {
    REGISTER_EXTENSION.call_once(|| {
        // SAFETY: sqlite3_vec_init is the extension entry point sqlite expects;
        // the transmute only restores its real signature.
        unsafe {
            sqlite3_auto_extension(Some(std::mem::transmute::<
                *const (),
                unsafe extern "C" fn(
                    *mut rusqlite::ffi::sqlite3,
                    *mut *mut std::os::raw::c_char,
                    *const rusqlite::ffi::sqlite3_api_routines,
                ) -> std::os::raw::c_int,
            >(sqlite3_vec_init as *const ())));
        }
    });
}

fn backend_err(operation: Operation, message: impl ToString) -> IndexError {
    IndexError::backend(IndexKind::SqliteVec, operation, message)
}

/// Encode a vector the way sqlite-vec reads `float[]` blobs.
fn to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|x| x.to_le_bytes()).collect()
}

fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
}

/// sqlite-vec backed index
pub struct SqliteVecIndex {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    dimension: usize,
    resolver: NamespaceResolver,
}

impl SqliteVecIndex {
    /// Open (or create) the database file.
    pub async fn open(settings: &SqliteSettings, dimension: usize) -> Result<Self> {
        register_extension();

        let path = settings.path.clone();
        info!("Opening sqlite-vec database at {:?}", path);

        let open_path = path.clone();
        let conn = tokio::task::spawn_blocking(move || open_connection(&open_path))
            .await
            .map_err(|e| backend_err(Operation::Connect, e))??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
            dimension,
            resolver: NamespaceResolver::new(&settings.collection_prefix, SQLITE_COLLECTION),
        })
    }

    /// Database file this index writes to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` on the shared connection off the async runtime.
    async fn with_conn<T, F>(&self, operation: Operation, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| backend_err(operation, "connection mutex poisoned"))?;
            f(&guard).map_err(|e| backend_err(operation, e))
        })
        .await
        .map_err(|e| backend_err(operation, format!("blocking task failed: {}", e)))?
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| IndexError::io(parent, e))?;
    }

    let conn = Connection::open(path).map_err(|e| backend_err(Operation::Connect, e))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .and_then(|_| conn.pragma_update(None, "synchronous", "NORMAL"))
        .map_err(|e| backend_err(Operation::Connect, e))?;

    let version: String = conn
        .query_row("SELECT vec_version()", [], |row| row.get(0))
        .map_err(|e| backend_err(Operation::Connect, format!("sqlite-vec not loaded: {}", e)))?;
    debug!("sqlite-vec {} loaded", version);

    Ok(conn)
}

#[async_trait]
impl VectorIndex for SqliteVecIndex {
    async fn add_or_update(&self, project_id: &str, asset_id: &str, vector: &[f32]) -> Result<()> {
        require_ids(project_id, asset_id)?;
        check_dimension(self.dimension, vector)?;

        let table = self.resolver.resolve(project_id);
        let asset = asset_id.to_string();
        let blob = to_blob(vector);
        let dimension = self.dimension;

        self.with_conn(Operation::AddOrUpdate, move |conn| {
            let tx = conn.unchecked_transaction()?;

            if !table_exists(&tx, &table)? {
                info!("Creating sqlite-vec collection '{}' (dim={})", table, dimension);
                tx.execute_batch(&format!(
                    "CREATE VIRTUAL TABLE IF NOT EXISTS \"{}\" USING vec0(asset_id TEXT PRIMARY KEY, embedding float[{}])",
                    table, dimension
                ))?;
            }

            tx.execute(
                &format!("DELETE FROM \"{}\" WHERE asset_id = ?1", table),
                [&asset],
            )?;
            tx.execute(
                &format!(
                    "INSERT INTO \"{}\" (asset_id, embedding) VALUES (?1, ?2)",
                    table
                ),
                params![asset, blob],
            )?;
            tx.commit()?;

            debug!("Stored asset '{}' in collection '{}'", asset, table);
            Ok(())
        })
        .await
    }

    async fn search(&self, project_id: &str, query: &[f32], top_n: usize) -> Result<Vec<String>> {
        if !should_search(self.dimension, project_id, query, top_n)? {
            return Ok(Vec::new());
        }

        let table = self.resolver.resolve(project_id);
        let blob = to_blob(query);

        self.with_conn(Operation::Search, move |conn| {
            if !table_exists(conn, &table)? {
                return Ok(Vec::new());
            }

            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM \"{}\"", table),
                [],
                |row| row.get(0),
            )?;
            let k = top_n.min(count as usize).min(MAX_K);
            if k == 0 {
                return Ok(Vec::new());
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT asset_id FROM \"{}\" WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance",
                table
            ))?;
            let rows = stmt.query_map(params![blob, k as i64], |row| row.get::<_, String>(0))?;
            rows.collect()
        })
        .await
    }

    async fn remove(&self, project_id: &str, asset_id: &str) -> Result<()> {
        require_ids(project_id, asset_id)?;

        let table = self.resolver.resolve(project_id);
        let asset = asset_id.to_string();

        self.with_conn(Operation::Remove, move |conn| {
            if table_exists(conn, &table)? {
                let deleted = conn.execute(
                    &format!("DELETE FROM \"{}\" WHERE asset_id = ?1", table),
                    [&asset],
                )?;
                debug!("Removed {} rows for asset '{}' from '{}'", deleted, asset, table);
            }
            Ok(())
        })
        .await
    }

    fn kind(&self) -> IndexKind {
        IndexKind::SqliteVec
    }
}

impl std::fmt::Debug for SqliteVecIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVecIndex")
            .field("path", &self.path)
            .field("dimension", &self.dimension)
            .finish()
    }
}

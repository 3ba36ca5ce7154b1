//! First-run provisioning of the local stores
//!
//! A store whose file already exists is left untouched. A missing store is
//! built in a staging file next to its final path, inside one transaction,
//! and renamed into place only after commit, so a failed run never leaves a
//! half-initialized `trader.db` or `twitter.db` behind.

use crate::schema::{self, SqlValue, Statement, StoreKind, SCHEMA_VERSION};
use crate::{DbError, DbResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Recovery advice shown after every run
pub const REMEDIATION: &str =
    "if you are having problems, delete trader.db and twitter.db from the home directory and re-run initialization";

const STAGING_SUFFIX: &str = ".init";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// File was missing and has been created and seeded
    Created,
    /// File already existed; nothing was written
    Skipped,
}

/// Result of initializing one store
#[derive(Debug)]
pub struct StoreReport {
    pub kind: StoreKind,
    pub path: PathBuf,
    pub result: DbResult<StoreOutcome>,
}

/// Per-store results of one initialization run, in initialization order
#[derive(Debug)]
pub struct InitReport {
    pub stores: Vec<StoreReport>,
}

impl InitReport {
    pub fn get(&self, kind: StoreKind) -> Option<&StoreReport> {
        self.stores.iter().find(|s| s.kind == kind)
    }

    pub fn is_success(&self) -> bool {
        self.stores.iter().all(|s| s.result.is_ok())
    }

    /// Collapse into the outcome of every store, or the first failure
    pub fn into_result(self) -> DbResult<Vec<(StoreKind, StoreOutcome)>> {
        self.stores
            .into_iter()
            .map(|s| s.result.map(|outcome| (s.kind, outcome)))
            .collect()
    }
}

/// Creates the trader and twitter stores inside a home directory
pub struct Initializer {
    home: PathBuf,
}

impl Initializer {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn store_path(&self, kind: StoreKind) -> PathBuf {
        self.home.join(kind.file_name())
    }

    fn staging_path(&self, kind: StoreKind) -> PathBuf {
        self.home.join(format!("{}{}", kind.file_name(), STAGING_SUFFIX))
    }

    /// Initialize every store in order
    ///
    /// A failing store does not stop the next one from being attempted.
    pub async fn run(&self) -> InitReport {
        info!("Starting db initialization in {}", self.home().display());

        let mut stores = Vec::with_capacity(StoreKind::ALL.len());
        for kind in StoreKind::ALL {
            let path = self.store_path(kind);
            let result = self.ensure_store(kind).await;
            match &result {
                Ok(StoreOutcome::Created) => info!("Successfully initialized {} database", kind),
                Ok(StoreOutcome::Skipped) => {
                    debug!("{} already exists, skipping", path.display())
                }
                Err(e) => error!("Failed to initialize {} database: {}", kind, e),
            }
            stores.push(StoreReport { kind, path, result });
        }

        info!("SQLite databases are initialized, {}", REMEDIATION);
        InitReport { stores }
    }

    /// Create one store unless its file is already present
    pub async fn ensure_store(&self, kind: StoreKind) -> DbResult<StoreOutcome> {
        let path = self.store_path(kind);
        if tokio::fs::try_exists(&path).await? {
            return Ok(StoreOutcome::Skipped);
        }

        let home = tokio::fs::metadata(&self.home).await?;
        if !home.is_dir() {
            return Err(DbError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a directory", self.home.display()),
            )));
        }

        let statements = schema::plan(kind)?;
        materialize(kind, &self.staging_path(kind), &path, &statements).await?;
        Ok(StoreOutcome::Created)
    }
}

/// Initialize every store under `home`, failing with the first store error
pub async fn initialize(home: impl Into<PathBuf>) -> DbResult<Vec<(StoreKind, StoreOutcome)>> {
    Initializer::new(home).run().await.into_result()
}

/// Build a store at `staging` and move it to `target` once committed
async fn materialize(
    kind: StoreKind,
    staging: &Path,
    target: &Path,
    statements: &[Statement],
) -> DbResult<()> {
    // Leftover from an interrupted run
    remove_staging(staging).await?;

    let built = match build(kind, staging, statements).await {
        Ok(()) => tokio::fs::rename(staging, target).await.map_err(DbError::from),
        Err(e) => Err(e),
    };

    if built.is_err() {
        if let Err(cleanup) = remove_staging(staging).await {
            warn!("Could not remove {}: {}", staging.display(), cleanup);
        }
    }
    built
}

/// Open `path`, run the statements in one transaction, and close the handle
async fn build(kind: StoreKind, path: &Path, statements: &[Statement]) -> DbResult<()> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(false)
        .journal_mode(SqliteJournalMode::Delete);

    let mut conn = SqliteConnection::connect_with(&options)
        .await
        .map_err(|e| DbError::Connection(format!("{}: {e}", path.display())))?;

    let executed = execute_all(kind, &mut conn, statements).await;
    let closed = conn.close().await;
    executed?;
    closed?;
    Ok(())
}

async fn execute_all(
    kind: StoreKind,
    conn: &mut SqliteConnection,
    statements: &[Statement],
) -> DbResult<()> {
    let mut tx = conn.begin().await?;

    for statement in statements {
        let sql = statement.sql();
        let mut query = sqlx::query(&sql);
        for value in statement.values() {
            query = match value {
                SqlValue::Integer(v) => query.bind(*v),
                SqlValue::Text(v) => query.bind(v.as_str()),
            };
        }
        query
            .execute(&mut *tx)
            .await
            .map_err(|source| DbError::Statement {
                store: kind,
                sql: sql.to_string(),
                source,
            })?;
    }

    sqlx::query(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))
        .execute(&mut *tx)
        .await?;

    // Dropping the transaction on any error above rolls it back
    tx.commit().await?;
    Ok(())
}

async fn remove_staging(path: &Path) -> DbResult<()> {
    let mut journal = path.as_os_str().to_owned();
    journal.push("-journal");
    for file in [path, Path::new(&journal)] {
        match tokio::fs::remove_file(file).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

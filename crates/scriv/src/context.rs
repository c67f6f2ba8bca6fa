//! Options shared by every command and the journal they open.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, ValueEnum};
use scriv_cache::{CmarkRenderer, RenderCache};
use scriv_config::{BackendKind, CliSettings, Config, StorageConfig};
use scriv_site::Journal;
use scriv_storage::{PostingStore, TeeStore};
use scriv_storage_fs::FsStore;
use scriv_storage_sqlite::SqliteStore;

use crate::error::CliError;

/// Storage backend selectable on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum BackendArg {
    Fs,
    Sqlite,
    Tee,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Fs => Self::Fs,
            BackendArg::Sqlite => Self::Sqlite,
            BackendArg::Tee => Self::Tee,
        }
    }
}

/// Global options, accepted before or after the subcommand.
#[derive(Args, Clone, Debug, Default)]
pub(crate) struct GlobalArgs {
    /// Path to configuration file (default: auto-discover scriv.toml).
    #[arg(short, long, global = true, env = "SCRIV_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides config).
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// SQLite database file (overrides config).
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Storage backend (overrides config).
    #[arg(short, long, global = true, value_enum)]
    backend: Option<BackendArg>,

    /// Disable the render cache.
    #[arg(long, global = true)]
    no_cache: bool,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl GlobalArgs {
    /// Load configuration with these options applied on top.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            backend: self.backend.map(BackendKind::from),
            data_dir: self.data_dir.clone(),
            database: self.database.clone(),
            cache_enabled: self.no_cache.then_some(false),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// Load configuration and open the configured journal.
    pub(crate) async fn open(&self) -> Result<Context, CliError> {
        Context::open(self.load_config()?).await
    }
}

/// An open journal plus the handles that need an orderly shutdown.
pub(crate) struct Context {
    pub config: Config,
    pub journal: Journal,
    sqlite: Option<Arc<SqliteStore>>,
}

impl Context {
    pub(crate) async fn open(config: Config) -> Result<Self, CliError> {
        let storage = &config.storage_resolved;
        let (store, sqlite) = open_store(storage, storage.backend).await?;

        let mut journal = Journal::new(store);
        if config.cache.enabled {
            let cache = RenderCache::new(storage.postings_dir(), Arc::new(CmarkRenderer));
            journal = journal.with_cache(Arc::new(cache));
        }

        tracing::info!(
            backend = journal.store().name(),
            data_dir = %storage.data_dir.display(),
            cache = config.cache.enabled,
            "journal opened"
        );

        Ok(Self {
            config,
            journal,
            sqlite,
        })
    }

    #[must_use]
    pub(crate) fn store(&self) -> &Arc<dyn PostingStore> {
        self.journal.store()
    }

    /// Wait for background cache writes and close the database pool.
    pub(crate) async fn close(self) {
        if let Some(cache) = self.journal.cache() {
            cache.wait_pending().await;
        }
        if let Some(sqlite) = self.sqlite {
            sqlite.close().await;
        }
    }
}

/// Open the store for `backend` using the paths in `storage`.
///
/// The SQLite handle is returned separately so its pool can be closed.
pub(crate) async fn open_store(
    storage: &StorageConfig,
    backend: BackendKind,
) -> Result<(Arc<dyn PostingStore>, Option<Arc<SqliteStore>>), CliError> {
    match backend {
        BackendKind::Fs => Ok((Arc::new(FsStore::new(storage.postings_dir())), None)),
        BackendKind::Sqlite => {
            let sqlite = open_sqlite(&storage.database).await?;
            Ok((Arc::clone(&sqlite) as Arc<dyn PostingStore>, Some(sqlite)))
        }
        BackendKind::Tee => {
            let fs: Arc<dyn PostingStore> = Arc::new(FsStore::new(storage.postings_dir()));
            let sqlite = open_sqlite(&storage.database).await?;
            let tee = TeeStore::new(fs, Arc::clone(&sqlite) as Arc<dyn PostingStore>);
            Ok((Arc::new(tee), Some(sqlite)))
        }
    }
}

async fn open_sqlite(path: &Path) -> Result<Arc<SqliteStore>, CliError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(Arc::new(SqliteStore::open(path).await?))
}

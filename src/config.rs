//! Configuration for backend selection and the decorator stack.
//!
//! [`StoreConfig`] picks the storage engine and says which decorators wrap
//! it. Defaults enable the write buffer, evaluation statistics and the
//! pattern result cache.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::{
    backend::{MemoryBackend, SharedBackend, SqliteBackend, StatementBackend},
    cache::PatternResultCache,
    errors::TripleStoreError,
    snapshot_cache::{BudgetProbe, FullSnapshotCache, MemoryProbe},
    statistics::{EvaluationStatistics, StatisticsBackend},
    store::TripleStore,
    write_buffer::WriteBuffer,
};

/// Storage engine selection.
///
/// # Examples
///
/// ```rust
/// use triplestack::{BackendKind, StoreConfig};
///
/// let cfg = StoreConfig::new(BackendKind::Sqlite);
/// assert_eq!(cfg.backend, BackendKind::Sqlite);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    /// Copy-on-write in-memory statement set; contents are lost on drop.
    #[default]
    Memory,
    /// SQLite file (or in-memory database) holding one statements table.
    Sqlite,
}

/// Which read cache wraps each backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Cache individual pattern results, keyed by pattern.
    #[default]
    PatternResults,
    /// Materialize the whole backend in memory and answer from it.
    FullSnapshot,
}

/// Options for the SQLite engine.
#[derive(Clone, Debug, Default)]
pub struct SqliteConfig {
    /// Additional `PRAGMA` settings applied right after opening.
    ///
    /// ```rust
    /// use triplestack::StoreConfig;
    ///
    /// let mut cfg = StoreConfig::sqlite();
    /// cfg.sqlite.pragma_settings.insert("journal_mode".to_string(), "WAL".to_string());
    /// ```
    pub pragma_settings: HashMap<String, String>,
}

/// Read cache options.
///
/// # Default Configuration
///
/// ```rust
/// use triplestack::{CacheConfig, CacheStrategy};
///
/// let cfg = CacheConfig::default();
/// assert!(cfg.enabled);
/// assert_eq!(cfg.strategy, CacheStrategy::PatternResults);
/// assert_eq!(cfg.max_entry_statements, 100_000);
/// assert_eq!(cfg.low_memory_threshold_bytes, 32 * 1024 * 1024);
/// ```
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Whether any read cache is installed.
    ///
    /// **Default:** `true`
    pub enabled: bool,

    /// **Default:** [`CacheStrategy::PatternResults`]
    pub strategy: CacheStrategy,

    /// Largest result a single pattern entry may hold. Results that grow past
    /// this while being read are returned normally but not cached.
    ///
    /// **Default:** `100_000`
    pub max_entry_statements: usize,

    /// Maximum number of cached patterns.
    ///
    /// **Default:** `10_000`
    pub max_entries: usize,

    /// Total statements held across all pattern entries. Least recently used
    /// entries are evicted to stay under this budget.
    ///
    /// **Default:** `1_000_000`
    pub max_cached_statements: usize,

    /// Snapshot builds abort once the memory probe reports less headroom than
    /// this.
    ///
    /// **Default:** 32 MiB
    pub low_memory_threshold_bytes: u64,

    /// Statements read before a snapshot build starts probing memory.
    ///
    /// **Default:** `100_000`
    pub low_memory_min_statements: usize,

    /// Statements between two memory probes once probing has started.
    ///
    /// **Default:** `1_000`
    pub low_memory_check_interval: usize,

    /// Queries that skip snapshot building after a low-memory abort.
    ///
    /// **Default:** `100`
    pub low_memory_backoff_calls: u32,

    /// Byte budget used by the default [`BudgetProbe`].
    ///
    /// **Default:** 1 GiB
    pub snapshot_memory_budget_bytes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strategy: CacheStrategy::PatternResults,
            max_entry_statements: 100_000,
            max_entries: 10_000,
            max_cached_statements: 1_000_000,
            low_memory_threshold_bytes: 32 * 1024 * 1024,
            low_memory_min_statements: 100_000,
            low_memory_check_interval: 1_000,
            low_memory_backoff_calls: 100,
            snapshot_memory_budget_bytes: 1024 * 1024 * 1024,
        }
    }
}

/// Complete configuration for opening a [`TripleStore`].
///
/// # Examples
///
/// ```rust
/// use triplestack::{CacheStrategy, StoreConfig, open_store_in_memory};
///
/// let mut cfg = StoreConfig::memory();
/// cfg.cache.strategy = CacheStrategy::FullSnapshot;
/// let store = open_store_in_memory(&cfg).unwrap();
/// assert_eq!(store.size().unwrap(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// **Default:** [`BackendKind::Memory`]
    pub backend: BackendKind,

    /// Only used when `backend` is [`BackendKind::Sqlite`].
    pub sqlite: SqliteConfig,

    pub cache: CacheConfig,

    /// Batch same-direction writes before they reach the engine.
    ///
    /// **Default:** `true`
    pub write_buffer: bool,

    /// Track cardinality estimates for the query optimizer.
    ///
    /// **Default:** `true`
    pub statistics: bool,
}

impl StoreConfig {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            sqlite: SqliteConfig::default(),
            cache: CacheConfig::default(),
            write_buffer: true,
            statistics: true,
        }
    }

    pub fn memory() -> Self {
        Self::new(BackendKind::Memory)
    }

    pub fn sqlite() -> Self {
        Self::new(BackendKind::Sqlite)
    }

    /// Plain engine with no decorators at all.
    pub fn bare(backend: BackendKind) -> Self {
        let mut cfg = Self::new(backend);
        cfg.cache.enabled = false;
        cfg.write_buffer = false;
        cfg.statistics = false;
        cfg
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(BackendKind::Memory)
    }
}

/// Open a store whose engines persist under `path`.
///
/// With [`BackendKind::Sqlite`] the explicit and inferred sources keep
/// separate tables in one database file. With [`BackendKind::Memory`] the
/// path is ignored.
pub fn open_store<P: AsRef<Path>>(path: P, cfg: &StoreConfig) -> Result<TripleStore, TripleStoreError> {
    let (explicit, inferred) = open_engines(Some(path.as_ref()), cfg)?;
    assemble_store(explicit, inferred, cfg, Arc::new(BudgetProbe::from_config(&cfg.cache)))
}

/// Open a store that keeps everything in memory.
pub fn open_store_in_memory(cfg: &StoreConfig) -> Result<TripleStore, TripleStoreError> {
    let (explicit, inferred) = open_engines(None, cfg)?;
    assemble_store(explicit, inferred, cfg, Arc::new(BudgetProbe::from_config(&cfg.cache)))
}

/// Build a store over caller-supplied engines, wrapping each in the
/// decorators `cfg` enables.
pub fn build_store(
    explicit: SharedBackend,
    inferred: SharedBackend,
    cfg: &StoreConfig,
) -> Result<TripleStore, TripleStoreError> {
    assemble_store(explicit, inferred, cfg, Arc::new(BudgetProbe::from_config(&cfg.cache)))
}

/// Like [`build_store`] with a custom memory probe for snapshot caches.
pub fn build_store_with_probe(
    explicit: SharedBackend,
    inferred: SharedBackend,
    cfg: &StoreConfig,
    probe: Arc<dyn MemoryProbe>,
) -> Result<TripleStore, TripleStoreError> {
    assemble_store(explicit, inferred, cfg, probe)
}

/// Table holding inferred statements in SQLite-backed stores.
pub const INFERRED_TABLE: &str = "inferred_statements";

fn open_engines(
    path: Option<&Path>,
    cfg: &StoreConfig,
) -> Result<(SharedBackend, SharedBackend), TripleStoreError> {
    match cfg.backend {
        BackendKind::Memory => {
            let explicit: SharedBackend = Arc::new(MemoryBackend::new());
            let inferred: SharedBackend = Arc::new(MemoryBackend::new());
            Ok((explicit, inferred))
        }
        BackendKind::Sqlite => {
            let explicit = match path {
                Some(path) => SqliteBackend::open(path)?,
                None => SqliteBackend::open_in_memory()?,
            };
            explicit.apply_pragmas(&cfg.sqlite.pragma_settings)?;
            let inferred: SharedBackend = Arc::new(explicit.sibling(INFERRED_TABLE)?);
            let explicit: SharedBackend = Arc::new(explicit);
            Ok((explicit, inferred))
        }
    }
}

fn assemble_store(
    explicit: SharedBackend,
    inferred: SharedBackend,
    cfg: &StoreConfig,
    probe: Arc<dyn MemoryProbe>,
) -> Result<TripleStore, TripleStoreError> {
    let statistics = cfg.statistics.then(|| Arc::new(EvaluationStatistics::new()));
    let explicit = decorate(explicit, cfg, statistics.as_ref(), &probe);
    let inferred = decorate(inferred, cfg, statistics.as_ref(), &probe);
    explicit.init()?;
    inferred.init()?;
    Ok(TripleStore::new(explicit, inferred, statistics))
}

/// engine -> write buffer -> statistics -> read cache
pub fn decorate(
    engine: SharedBackend,
    cfg: &StoreConfig,
    statistics: Option<&Arc<EvaluationStatistics>>,
    probe: &Arc<dyn MemoryProbe>,
) -> SharedBackend {
    let mut backend = engine;
    if cfg.write_buffer {
        backend = Arc::new(WriteBuffer::new(backend));
    }
    if let Some(statistics) = statistics {
        backend = Arc::new(StatisticsBackend::new(backend, statistics.clone()));
    }
    if !cfg.cache.enabled {
        return backend;
    }
    match cfg.cache.strategy {
        CacheStrategy::PatternResults => Arc::new(PatternResultCache::new(backend, &cfg.cache)),
        CacheStrategy::FullSnapshot => {
            Arc::new(FullSnapshotCache::new(backend, &cfg.cache, probe.clone()))
        }
    }
}

//! Storage and caching layer for a triple store.
//!
//! triplestack sits between a query evaluator and a statement storage engine.
//! Every piece is a [`StatementBackend`], so engines and decorators stack
//! freely:
//!
//! - **Engines**: [`MemoryBackend`] (copy-on-write, in process) and
//!   [`SqliteBackend`] (rusqlite, on disk or in memory)
//! - **Write Buffer**: batches same-direction writes, flushes on reversal
//! - **Pattern Result Cache**: per-pattern results invalidated by a write epoch
//! - **Full Snapshot Cache**: whole-store copy with low-memory fallback
//! - **Snapshot Overlay**: per-transaction read-committed isolation
//! - **Evaluation Statistics**: bucketed cardinality estimates
//!
//! # Quick Start
//!
//! ```rust
//! use triplestack::{open_store_in_memory, Statement, StatementPattern, StoreConfig};
//!
//! let store = open_store_in_memory(&StoreConfig::default())?;
//!
//! let txn = store.begin();
//! txn.sink(false).approve(&Statement::new("ex:alice", "ex:knows", "ex:bob"))?;
//! txn.commit()?;
//!
//! let knows = StatementPattern::any().predicate("ex:knows");
//! let found = store.explicit().dataset().statements(&knows)?.collect_statements()?;
//! assert_eq!(found.len(), 1);
//! # Ok::<(), triplestack::TripleStoreError>(())
//! ```
//!
//! # Stack Order
//!
//! [`open_store`] assembles `engine -> write buffer -> statistics -> cache`
//! for the explicit and the inferred side; each transaction adds a
//! [`SnapshotOverlay`] on top of both.

pub mod backend;
pub mod cache;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod model;
pub mod namespace;
pub mod overlay;
pub mod snapshot_cache;
pub mod source;
pub mod statistics;
pub mod store;
pub mod stream;
pub mod write_buffer;

pub use crate::backend::{MemoryBackend, SharedBackend, SqliteBackend, StatementBackend};
pub use crate::cache::{CacheStats, PatternResultCache};
pub use crate::config::{
    BackendKind, CacheConfig, CacheStrategy, SqliteConfig, StoreConfig, build_store,
    build_store_with_probe, open_store, open_store_in_memory,
};
pub use crate::errors::TripleStoreError;
pub use crate::metrics::BackendMetricsSnapshot;
pub use crate::model::{Statement, StatementPattern, Term};
pub use crate::namespace::NamespaceStore;
pub use crate::overlay::SnapshotOverlay;
pub use crate::snapshot_cache::{BudgetProbe, FullSnapshotCache, MemoryProbe};
pub use crate::source::{Dataset, Sink, TransactionalSource};
pub use crate::statistics::{EvaluationStatistics, StatisticsBackend};
pub use crate::store::{StoreTransaction, TripleStore};
pub use crate::stream::{
    ContextIdStream, FilterStream, OrderedStream, SortKey, StatementStream, StreamSource,
};
pub use crate::write_buffer::WriteBuffer;

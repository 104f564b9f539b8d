//! Database handle.

use crate::config::StoreConfig;
use crate::context::{ActorProvider, NoActor};
use crate::entity::EntityId;
use crate::error::CoreResult;
use crate::revision::{Revision, RevisionTracker};
use crate::transaction::{CommitReceipt, Transaction, TransactionContext};
use dualstore_index::{IndexBackend, InMemoryIndex};
use dualstore_storage::{InMemoryBackend, RecordBackend};
use std::fmt;
use std::sync::Arc;

/// Shared handle on the two backends.
///
/// Stores hold an `Arc<Database>` and open their transactions through it.
///
/// # Example
///
/// ```rust
/// use dualstore_core::Database;
///
/// let db = Database::in_memory();
/// let changed = db
///     .transaction(|tx| Ok(tx.change_count()))
///     .unwrap();
/// assert_eq!(changed, 0);
/// ```
pub struct Database {
    records: Arc<dyn RecordBackend>,
    index: Arc<dyn IndexBackend>,
    actor: Arc<dyn ActorProvider>,
    revisions: Arc<RevisionTracker>,
    config: StoreConfig,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Creates a database over the given backends with default settings and
    /// no actor provider.
    pub fn new(records: Arc<dyn RecordBackend>, index: Arc<dyn IndexBackend>) -> Self {
        Self {
            revisions: Arc::new(RevisionTracker::new(Arc::clone(&records))),
            records,
            index,
            actor: Arc::new(NoActor),
            config: StoreConfig::default(),
        }
    }

    /// Creates a database over fresh in-memory backends.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackend::new()), Arc::new(InMemoryIndex::new()))
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the actor provider.
    #[must_use]
    pub fn with_actor(mut self, actor: Arc<dyn ActorProvider>) -> Self {
        self.actor = actor;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Returns the relational backend.
    pub fn records(&self) -> &Arc<dyn RecordBackend> {
        &self.records
    }

    /// Returns the index backend.
    pub fn index(&self) -> &Arc<dyn IndexBackend> {
        &self.index
    }

    /// Returns the revision tracker.
    pub fn revisions(&self) -> &RevisionTracker {
        &self.revisions
    }

    /// Begins a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the relational store cannot open a session.
    pub fn begin(&self) -> CoreResult<Transaction> {
        let session = self.records.begin()?;
        Ok(Transaction::new(
            session,
            TransactionContext {
                index: Arc::clone(&self.index),
                actor: Arc::clone(&self.actor),
                revisions: Arc::clone(&self.revisions),
                track_revisions: self.config.track_revisions,
            },
        ))
    }

    /// Executes a function within a transaction.
    ///
    /// The transaction is committed if the function returns `Ok`,
    /// or rolled back if it returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns the function's error, or the commit error.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        self.transaction_with_receipt(f).map(|(value, _)| value)
    }

    /// Like [`Database::transaction`], also returning the commit receipt.
    ///
    /// # Errors
    ///
    /// Returns the function's error, or the commit error.
    pub fn transaction_with_receipt<F, T>(&self, f: F) -> CoreResult<(T, CommitReceipt)>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let mut tx = self.begin()?;
        match f(&mut tx) {
            Ok(value) => {
                let receipt = tx.commit()?;
                Ok((value, receipt))
            }
            Err(e) => {
                tx.rollback()?;
                Err(e)
            }
        }
    }

    /// Executes a function within a transaction that is always rolled back.
    ///
    /// # Errors
    ///
    /// Returns the function's error.
    pub fn read<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let mut tx = self.begin()?;
        let result = f(&mut tx);
        tx.rollback()?;
        result
    }

    /// Revisions that touched `entity_id`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the relational store fails.
    pub fn revisions_for(&self, entity_id: &EntityId) -> CoreResult<Vec<Revision>> {
        self.read(|tx| self.revisions.revisions_for(tx, entity_id))
    }
}

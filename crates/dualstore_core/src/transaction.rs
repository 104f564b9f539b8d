//! Write and read transactions.
//!
//! A [`Transaction`] wraps one relational session and collects everything
//! that must happen around its commit:
//!
//! - the revision describing the transaction, written through the same session
//! - index writes, applied only after the relational commit succeeded
//! - the identity map of rows loaded so far, released with [`Transaction::detach_all`]
//!
//! Dropping an active transaction rolls it back.

use crate::context::ActorProvider;
use crate::entity::{EntityId, RevisionId, UserId};
use crate::error::{CoreError, CoreResult};
use crate::revision::{ChangeLog, RevisionOp, RevisionTracker};
use dualstore_index::{IndexBackend, IndexDocument, IndexError};
use dualstore_storage::{RecordSession, Row};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// State of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and can perform operations.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been rolled back.
    Aborted,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionState::Active => "active",
            TransactionState::Committed => "committed",
            TransactionState::Aborted => "aborted",
        })
    }
}

/// An index write deferred until after the relational commit.
#[derive(Debug, Clone)]
pub(crate) enum IndexOp {
    Upsert {
        collection: String,
        document: IndexDocument,
    },
    Remove {
        collection: String,
        id: String,
    },
}

impl IndexOp {
    fn key(&self) -> (&str, &str) {
        match self {
            IndexOp::Upsert {
                collection,
                document,
            } => (collection, &document.id),
            IndexOp::Remove { collection, id } => (collection, id),
        }
    }
}

/// An index entry left stale because its write failed after commit.
///
/// The relational store holds the truth; a reindex repairs the entry.
#[derive(Debug)]
pub struct StaleIndexEntry {
    /// Index collection.
    pub collection: String,
    /// Document id.
    pub id: String,
    /// Why the write failed.
    pub error: IndexError,
}

/// Outcome of a successful commit.
#[derive(Debug, Default)]
pub struct CommitReceipt {
    /// Revision written, if revisions are tracked and anything changed.
    pub revision: Option<RevisionId>,
    /// Index writes that failed after the relational commit.
    pub stale_index_entries: Vec<StaleIndexEntry>,
}

impl CommitReceipt {
    /// Returns true if every index write succeeded.
    #[must_use]
    pub fn index_in_sync(&self) -> bool {
        self.stale_index_entries.is_empty()
    }
}

/// Collaborators a transaction needs, cloned out of the database.
pub(crate) struct TransactionContext {
    pub(crate) index: Arc<dyn IndexBackend>,
    pub(crate) actor: Arc<dyn ActorProvider>,
    pub(crate) revisions: Arc<RevisionTracker>,
    pub(crate) track_revisions: bool,
}

/// One unit of work against the relational store.
pub struct Transaction {
    session: Option<Box<dyn RecordSession>>,
    state: TransactionState,
    context: TransactionContext,
    acting_as: Option<UserId>,
    changes: ChangeLog,
    index_ops: Vec<IndexOp>,
    tracked: HashMap<(String, String), Row>,
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("state", &self.state)
            .field("changes", &self.changes.len())
            .field("index_ops", &self.index_ops.len())
            .field("tracked", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) fn new(session: Box<dyn RecordSession>, context: TransactionContext) -> Self {
        Self {
            session: Some(session),
            state: TransactionState::Active,
            context,
            acting_as: None,
            changes: ChangeLog::default(),
            index_ops: Vec::new(),
            tracked: HashMap::new(),
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Checks if the transaction is still active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn ensure_active(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            state => Err(CoreError::TransactionInactive {
                state: state.to_string(),
            }),
        }
    }

    /// Records `user` as the author of this transaction's revision,
    /// overriding the actor provider.
    pub fn act_as(&mut self, user: UserId) {
        self.acting_as = Some(user);
    }

    /// Author the revision will carry.
    pub fn author(&self) -> Option<UserId> {
        self.acting_as
            .clone()
            .or_else(|| self.context.actor.current_user())
    }

    /// Number of entities changed so far.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// Number of rows held in the identity map.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Releases every tracked row. Later reads go back to the store and still
    /// see this transaction's own writes.
    pub fn detach_all(&mut self) {
        self.tracked.clear();
    }

    /// Releases the tracked rows of one table.
    pub fn detach_table(&mut self, table: &str) {
        self.tracked.retain(|(t, _), _| t != table);
    }

    pub(crate) fn session(&mut self) -> CoreResult<&mut dyn RecordSession> {
        self.ensure_active()?;
        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(CoreError::TransactionInactive {
                state: self.state.to_string(),
            }),
        }
    }

    pub(crate) fn index(&self) -> &Arc<dyn IndexBackend> {
        &self.context.index
    }

    pub(crate) fn tracked(&self, table: &str, id: &str) -> Option<&Row> {
        self.tracked.get(&(table.to_string(), id.to_string()))
    }

    pub(crate) fn track(&mut self, table: &str, id: &str, row: Row) {
        self.tracked.insert((table.to_string(), id.to_string()), row);
    }

    pub(crate) fn untrack(&mut self, table: &str, id: &str) {
        self.tracked.remove(&(table.to_string(), id.to_string()));
    }

    pub(crate) fn record_change(&mut self, entity_type: &str, id: &EntityId, op: RevisionOp) {
        self.changes.record(entity_type, id, op);
    }

    pub(crate) fn queue_index(&mut self, op: IndexOp) {
        self.index_ops.push(op);
    }

    /// Commits the relational session, then applies queued index writes.
    ///
    /// Index write failures do not fail the commit; they are logged and
    /// listed on the receipt.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active, the revision cannot
    /// be written or the relational commit fails. Nothing is committed and no
    /// index write happens in that case.
    pub fn commit(mut self) -> CoreResult<CommitReceipt> {
        self.ensure_active()?;
        let Some(mut session) = self.session.take() else {
            return Err(CoreError::TransactionInactive {
                state: self.state.to_string(),
            });
        };
        self.state = TransactionState::Aborted;

        let revision = if self.context.track_revisions && !self.changes.is_empty() {
            let author = self.author();
            match self
                .context
                .revisions
                .persist(&mut *session, author, &self.changes)
            {
                Ok(id) => Some(id),
                Err(e) => {
                    if let Err(rollback) = session.rollback() {
                        warn!(error = %rollback, "rollback after failed revision write failed");
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        session.commit()?;
        self.state = TransactionState::Committed;
        let stale_index_entries = self.flush_index();
        debug!(
            changes = self.changes.len(),
            revision = ?revision,
            stale = stale_index_entries.len(),
            "transaction committed"
        );
        Ok(CommitReceipt {
            revision,
            stale_index_entries,
        })
    }

    /// Applies queued index writes, keeping only the last write per document.
    fn flush_index(&mut self) -> Vec<StaleIndexEntry> {
        let ops = std::mem::take(&mut self.index_ops);
        let mut last: HashMap<(String, String), usize> = HashMap::new();
        for (i, op) in ops.iter().enumerate() {
            let (collection, id) = op.key();
            last.insert((collection.to_string(), id.to_string()), i);
        }
        let mut stale = Vec::new();
        for (i, op) in ops.into_iter().enumerate() {
            let (collection, id) = op.key();
            if last.get(&(collection.to_string(), id.to_string())) != Some(&i) {
                continue;
            }
            let (collection, id, result) = match op {
                IndexOp::Upsert {
                    collection,
                    document,
                } => {
                    let id = document.id.clone();
                    let result = self.context.index.upsert(&collection, vec![document]);
                    (collection, id, result)
                }
                IndexOp::Remove { collection, id } => {
                    let result = self.context.index.delete(&collection, std::slice::from_ref(&id));
                    (collection, id, result)
                }
            };
            if let Err(error) = result {
                warn!(%collection, %id, %error, "index write failed; entry stays stale until reindex");
                stale.push(StaleIndexEntry {
                    collection,
                    id,
                    error,
                });
            }
        }
        stale
    }

    /// Discards every write of this transaction, including queued index writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction is not active or the backend fails
    /// while rolling back.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.ensure_active()?;
        self.abort()
    }

    pub(crate) fn abort(&mut self) -> CoreResult<()> {
        self.state = TransactionState::Aborted;
        self.index_ops.clear();
        self.tracked.clear();
        if let Some(session) = self.session.take() {
            session.rollback()?;
            debug!(changes = self.changes.len(), "transaction rolled back");
        }
        Ok(())
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.is_active() {
            if let Err(e) = self.abort() {
                warn!(error = %e, "rollback of dropped transaction failed");
            }
        }
    }
}

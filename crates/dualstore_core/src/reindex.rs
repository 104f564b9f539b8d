//! Whole-system reindexing.
//!
//! Stores are registered explicitly in a [`StoreRegistry`] at startup. The
//! [`Reindexer`] rebuilds them one after another; a failing store is
//! reported and the run carries on with the next one.

use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Counters of one store's reindex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReindexStats {
    /// Documents written.
    pub indexed: u64,
    /// Batches streamed from the relational store.
    pub batches: u64,
}

/// A store the [`Reindexer`] can rebuild.
pub trait Reindexable: Send + Sync {
    /// Returns true if the store's index can be dropped and recreated.
    fn can_drop(&self) -> bool;

    /// Rebuilds the store's index, dropping the collection first if `drop`.
    ///
    /// # Errors
    ///
    /// Returns the first error of the rebuild.
    fn rebuild(&self, drop: bool) -> CoreResult<ReindexStats>;
}

/// Explicit set of reindexable stores keyed by name.
#[derive(Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Arc<dyn Reindexable>>,
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.stores.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StoreRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a store.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the name is taken.
    pub fn register(&mut self, name: impl Into<String>, store: Arc<dyn Reindexable>) -> CoreResult<()> {
        let name = name.into();
        if self.stores.contains_key(&name) {
            return Err(CoreError::conflict("store", &name, "already registered"));
        }
        self.stores.insert(name, store);
        Ok(())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stores.keys().map(String::as_str)
    }

    /// Number of registered stores.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Result of one store's rebuild.
#[derive(Debug)]
pub struct StoreOutcome {
    /// Registered name.
    pub name: String,
    /// Counters, or why the rebuild failed.
    pub result: CoreResult<ReindexStats>,
}

/// Result of a reindex run, one outcome per store in name order.
#[derive(Debug, Default)]
pub struct ReindexReport {
    /// Per-store outcomes.
    pub outcomes: Vec<StoreOutcome>,
}

impl ReindexReport {
    /// Names of the stores that were rebuilt.
    pub fn succeeded(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Names of the stores that failed.
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Returns true if every store was rebuilt.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    /// Outcome of a store by name.
    pub fn outcome(&self, name: &str) -> Option<&StoreOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}

/// Rebuilds the indexes of registered stores.
#[derive(Debug)]
pub struct Reindexer {
    registry: StoreRegistry,
}

impl Reindexer {
    /// Creates a reindexer over `registry`.
    #[must_use]
    pub fn new(registry: StoreRegistry) -> Self {
        Self { registry }
    }

    /// The registry.
    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Drops, recreates and rebuilds every store's index.
    ///
    /// # Errors
    ///
    /// See [`Reindexer::reindex_subset`].
    pub fn reindex_all(&self) -> CoreResult<ReindexReport> {
        self.reindex_subset(true, None)
    }

    /// Rebuilds the named stores, or every store for `None`.
    ///
    /// Arguments are checked before any store is touched. After that,
    /// failures are per store and reported in the [`ReindexReport`].
    ///
    /// # Errors
    ///
    /// Returns `BadArgument` for unknown names and `Configuration` if `drop`
    /// is requested for a store whose index cannot drop collections.
    pub fn reindex_subset(&self, drop: bool, names: Option<&[&str]>) -> CoreResult<ReindexReport> {
        let selected: Vec<(&String, &Arc<dyn Reindexable>)> = match names {
            None => self.registry.stores.iter().collect(),
            Some(names) => {
                if let Some(unknown) = names.iter().find(|n| !self.registry.stores.contains_key(**n)) {
                    return Err(CoreError::bad_argument(format!("unknown store {unknown:?}")));
                }
                self.registry
                    .stores
                    .iter()
                    .filter(|(name, _)| names.contains(&name.as_str()))
                    .collect()
            }
        };
        if drop {
            if let Some((name, _)) = selected.iter().find(|(_, store)| !store.can_drop()) {
                return Err(CoreError::configuration(format!(
                    "index of store {name:?} cannot be dropped"
                )));
            }
        }

        let mut report = ReindexReport::default();
        for (name, store) in selected {
            let result = store.rebuild(drop);
            match &result {
                Ok(stats) => info!(store = %name, indexed = stats.indexed, "store reindexed"),
                Err(e) => warn!(store = %name, error = %e, "store reindex failed"),
            }
            report.outcomes.push(StoreOutcome {
                name: name.clone(),
                result,
            });
        }
        info!(
            stores = report.outcomes.len(),
            failed = report.failed().len(),
            "reindex run finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fake {
        droppable: bool,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Fake {
        fn new(droppable: bool, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                droppable,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Reindexable for Fake {
        fn can_drop(&self) -> bool {
            self.droppable
        }

        fn rebuild(&self, _drop: bool) -> CoreResult<ReindexStats> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CoreError::configuration("broken mapping"))
            } else {
                Ok(ReindexStats { indexed: 1, batches: 1 })
            }
        }
    }

    #[test]
    fn duplicate_registration_conflicts() {
        let mut registry = StoreRegistry::new();
        registry.register("a", Fake::new(true, false)).unwrap();
        let err = registry.register("a", Fake::new(true, false)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn failure_does_not_stop_other_stores() {
        let (a, b, c) = (Fake::new(true, false), Fake::new(true, true), Fake::new(true, false));
        let mut registry = StoreRegistry::new();
        registry.register("a", a.clone()).unwrap();
        registry.register("b", b.clone()).unwrap();
        registry.register("c", c.clone()).unwrap();

        let report = Reindexer::new(registry).reindex_all().unwrap();
        assert_eq!(report.succeeded(), vec!["a", "c"]);
        assert_eq!(report.failed(), vec!["b"]);
        assert!(!report.is_success());
        assert_eq!(c.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arguments_checked_before_work() {
        let a = Fake::new(true, false);
        let fixed = Fake::new(false, false);
        let mut registry = StoreRegistry::new();
        registry.register("a", a.clone()).unwrap();
        registry.register("fixed", fixed.clone()).unwrap();
        let reindexer = Reindexer::new(registry);

        let err = reindexer.reindex_subset(false, Some(&["a", "nope"][..])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadArgument);
        let err = reindexer.reindex_all().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);

        let report = reindexer.reindex_subset(false, Some(&["fixed"][..])).unwrap();
        assert_eq!(report.succeeded(), vec!["fixed"]);
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }
}

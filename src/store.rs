//! Shared, transactional access to a [`RuleTable`].

use parking_lot::RwLock;
use std::sync::Arc;

use crate::table::RuleTable;

/// A rule table shared between threads.
///
/// Readers take a shared lock. Writers are serialized by the exclusive lock
/// and work on a copy of the table, which replaces the live one only when the
/// closure returns `Ok`. A failed write therefore leaves no trace, at the
/// price of copying the table on every write. That suits rule sets in the
/// thousands; far larger tables would want an undo log instead.
///
/// # Example
/// ```
/// use georule_admin::error::AdminError;
/// use georule_admin::store::RuleStore;
/// use georule_admin::table::InsertPosition;
/// use georule_admin::{GrantType, Rule};
///
/// let store = RuleStore::new();
/// let result = store.transaction(|table| -> Result<(), AdminError> {
///     table.insert(Rule::new(GrantType::Allow), InsertPosition::Fixed(0))?;
///     Err(AdminError::validation("changed my mind"))
/// });
///
/// assert!(result.is_err());
/// assert!(store.read(|table| table.is_empty()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleStore {
    inner: Arc<RwLock<RuleTable>>,
}

impl RuleStore {
    /// Create a store over an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store over an existing table.
    pub fn from_table(table: RuleTable) -> Self {
        Self {
            inner: Arc::new(RwLock::new(table)),
        }
    }

    /// Run a read-only closure against the current table.
    pub fn read<T>(&self, f: impl FnOnce(&RuleTable) -> T) -> T {
        let guard = self.inner.read();
        f(&guard)
    }

    /// Run an infallible closure directly against the live table.
    pub fn write<T>(&self, f: impl FnOnce(&mut RuleTable) -> T) -> T {
        let mut guard = self.inner.write();
        f(&mut guard)
    }

    /// Run a closure against a working copy and commit it on success.
    ///
    /// The copy covers the whole table, instance registry included, and is
    /// taken while the write lock is held. Each transaction therefore costs
    /// O(n) in the number of rules and blocks readers for that long.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&mut RuleTable) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut guard = self.inner.write();
        let mut working = guard.clone();
        let value = f(&mut working)?;
        *guard = working;
        Ok(value)
    }
}

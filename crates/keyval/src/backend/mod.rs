//! The storage boundary.
//!
//! The store client only ever talks to a [`Backend`]: five primitives over
//! `(partition, sort)` keys and attribute maps. Transport, authentication
//! and retries belong to the implementation behind this trait.

mod embedded;

pub use embedded::RedbBackend;

use crate::attribute::AttributeMap;
use crate::error::BackendError;
use crate::key::Key;

/// A prefix-scoped query, resumable from the last key of a previous page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub partition: String,
    /// Only sort keys starting with this prefix match. Empty matches all.
    pub sort_prefix: String,
    /// Exclusive start key, taken from [`Page::last_evaluated`].
    pub start_after: Option<Key>,
    /// Maximum number of items per page.
    pub limit: usize,
}

/// One page of query results, in sort-key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<AttributeMap>,
    /// Set when more items may follow; pass it back as `start_after`.
    pub last_evaluated: Option<Key>,
}

/// Primitives every storage backend provides.
pub trait Backend: Send + Sync {
    /// Create or overwrite the item at `key`.
    fn put_item(&self, key: &Key, attrs: &AttributeMap) -> Result<(), BackendError>;

    fn get_item(&self, key: &Key) -> Result<Option<AttributeMap>, BackendError>;

    /// Merge `attrs` into the existing item. Returns `false`, writing
    /// nothing, when no item exists at `key`.
    fn update_item(&self, key: &Key, attrs: &AttributeMap) -> Result<bool, BackendError>;

    /// Delete the item at `key`. Deleting a missing item is not an error.
    fn delete_item(&self, key: &Key) -> Result<(), BackendError>;

    fn query_items(&self, query: &Query) -> Result<Page, BackendError>;
}

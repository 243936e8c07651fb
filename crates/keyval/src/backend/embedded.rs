//! Embedded backend on redb.
//!
//! Items live in a single table keyed by the `(partition, sort)` tuple, so a
//! range scan starting at `(partition, prefix)` visits matches in sort-key
//! order. Attribute maps are JSON-serialized into `&[u8]` value columns.

use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use tracing::debug;

use super::{Backend, Page, Query};
use crate::attribute::AttributeMap;
use crate::error::BackendError;
use crate::key::Key;

/// Convert any `Display` error into a `BackendError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| BackendError::$variant(e.to_string())
    };
}

type Items<'a> = TableDefinition<'a, (&'static str, &'static str), &'static [u8]>;

/// Thread-safe backend over a redb database.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
    table: String,
}

impl RedbBackend {
    /// Open (or create) a persistent database at `path`, storing items in `table`.
    pub fn open(path: &Path, table: &str) -> Result<Self, BackendError> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let backend = Self {
            db: Arc::new(db),
            table: table.to_string(),
        };
        backend.ensure_table()?;
        debug!(?path, table, "redb backend opened");
        Ok(backend)
    }

    /// Create an ephemeral in-memory database.
    pub fn open_in_memory(table: &str) -> Result<Self, BackendError> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(map_err!(Open))?;
        let backend = Self {
            db: Arc::new(db),
            table: table.to_string(),
        };
        backend.ensure_table()?;
        debug!(table, "in-memory redb backend opened");
        Ok(backend)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn items(&self) -> Items<'_> {
        TableDefinition::new(&self.table)
    }

    fn ensure_table(&self) -> Result<(), BackendError> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(self.items()).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

fn encode(attrs: &AttributeMap) -> Result<Vec<u8>, BackendError> {
    serde_json::to_vec(attrs).map_err(map_err!(Serialize))
}

fn decode(bytes: &[u8]) -> Result<AttributeMap, BackendError> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

impl Backend for RedbBackend {
    fn put_item(&self, key: &Key, attrs: &AttributeMap) -> Result<(), BackendError> {
        let value = encode(attrs)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.items()).map_err(map_err!(Table))?;
            table
                .insert((key.partition.as_str(), key.sort.as_str()), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_item(&self, key: &Key) -> Result<Option<AttributeMap>, BackendError> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.items()).map_err(map_err!(Table))?;
        match table
            .get((key.partition.as_str(), key.sort.as_str()))
            .map_err(map_err!(Read))?
        {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn update_item(&self, key: &Key, attrs: &AttributeMap) -> Result<bool, BackendError> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(self.items()).map_err(map_err!(Table))?;
            let k = (key.partition.as_str(), key.sort.as_str());
            let current = match table.get(k).map_err(map_err!(Read))? {
                Some(guard) => Some(decode(guard.value())?),
                None => None,
            };
            let Some(mut merged) = current else {
                drop(table);
                txn.abort().map_err(map_err!(Transaction))?;
                return Ok(false);
            };
            merged.extend(attrs.iter().map(|(name, v)| (name.clone(), v.clone())));
            let value = encode(&merged)?;
            table.insert(k, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(true)
    }

    fn delete_item(&self, key: &Key) -> Result<(), BackendError> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(self.items()).map_err(map_err!(Table))?;
            existed = table
                .remove((key.partition.as_str(), key.sort.as_str()))
                .map_err(map_err!(Write))?
                .is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, existed, "item deleted");
        Ok(())
    }

    fn query_items(&self, query: &Query) -> Result<Page, BackendError> {
        if query.limit == 0 {
            return Err(BackendError::InvalidQuery(
                "page limit must be greater than zero".to_string(),
            ));
        }
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(self.items()).map_err(map_err!(Table))?;

        let start = match &query.start_after {
            Some(k) => Bound::Excluded((k.partition.as_str(), k.sort.as_str())),
            None => Bound::Included((query.partition.as_str(), query.sort_prefix.as_str())),
        };

        let mut page = Page::default();
        let mut last = None;
        for entry in table
            .range((start, Bound::Unbounded))
            .map_err(map_err!(Read))?
        {
            let (k, v) = entry.map_err(map_err!(Read))?;
            let (partition, sort) = k.value();
            if partition != query.partition || !sort.starts_with(&query.sort_prefix) {
                break;
            }
            if page.items.len() == query.limit {
                page.last_evaluated = last.take();
                break;
            }
            page.items.push(decode(v.value())?);
            last = Some(Key::new(partition, sort));
        }
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeValue;

    fn attrs(pairs: &[(&str, &str)]) -> AttributeMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), AttributeValue::String(v.to_string())))
            .collect()
    }

    fn query(partition: &str, sort_prefix: &str, limit: usize) -> Query {
        Query {
            partition: partition.into(),
            sort_prefix: sort_prefix.into(),
            start_after: None,
            limit,
        }
    }

    #[test]
    fn put_and_get() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        let key = Key::new("org", "a");
        db.put_item(&key, &attrs(&[("name", "x")])).unwrap();
        assert_eq!(db.get_item(&key).unwrap(), Some(attrs(&[("name", "x")])));
        assert_eq!(db.get_item(&Key::new("org", "b")).unwrap(), None);
    }

    #[test]
    fn put_overwrites() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        let key = Key::new("org", "a");
        db.put_item(&key, &attrs(&[("name", "x"), ("city", "Berne")])).unwrap();
        db.put_item(&key, &attrs(&[("name", "y")])).unwrap();
        assert_eq!(db.get_item(&key).unwrap(), Some(attrs(&[("name", "y")])));
    }

    #[test]
    fn update_merges_existing() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        let key = Key::new("org", "a");
        db.put_item(&key, &attrs(&[("name", "x"), ("city", "Berne")])).unwrap();
        assert!(db.update_item(&key, &attrs(&[("city", "Bern")])).unwrap());
        assert_eq!(
            db.get_item(&key).unwrap(),
            Some(attrs(&[("name", "x"), ("city", "Bern")]))
        );
    }

    #[test]
    fn update_missing_writes_nothing() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        let key = Key::new("org", "a");
        assert!(!db.update_item(&key, &attrs(&[("city", "Bern")])).unwrap());
        assert_eq!(db.get_item(&key).unwrap(), None);
    }

    #[test]
    fn delete_is_idempotent() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        let key = Key::new("org", "a");
        db.put_item(&key, &attrs(&[("name", "x")])).unwrap();
        db.delete_item(&key).unwrap();
        db.delete_item(&key).unwrap();
        assert_eq!(db.get_item(&key).unwrap(), None);
    }

    #[test]
    fn query_scopes_to_partition_and_prefix() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        for (p, s) in [("a", "x:1"), ("a", "y:1"), ("a", "x:2"), ("b", "x:3"), ("", "x:0")] {
            db.put_item(&Key::new(p, s), &attrs(&[("sort", s)])).unwrap();
        }

        let page = db.query_items(&query("a", "", 10)).unwrap();
        let sorts: Vec<_> = page.items.iter().map(|i| i["sort"].clone()).collect();
        assert_eq!(
            sorts,
            vec![
                AttributeValue::String("x:1".into()),
                AttributeValue::String("x:2".into()),
                AttributeValue::String("y:1".into()),
            ]
        );
        assert_eq!(page.last_evaluated, None);

        let page = db.query_items(&query("a", "x:", 10)).unwrap();
        assert_eq!(page.items.len(), 2);

        assert!(db.query_items(&query("c", "", 10)).unwrap().items.is_empty());
    }

    #[test]
    fn query_paginates() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        for i in 0..5 {
            let sort = format!("s:{i}");
            db.put_item(&Key::new("p", sort.as_str()), &attrs(&[("sort", sort.as_str())]))
                .unwrap();
        }

        let mut q = query("p", "", 2);
        let mut seen = 0;
        let mut pages = 0;
        loop {
            let page = db.query_items(&q).unwrap();
            seen += page.items.len();
            pages += 1;
            match page.last_evaluated {
                Some(last) => q.start_after = Some(last),
                None => break,
            }
        }
        assert_eq!(seen, 5);
        assert_eq!(pages, 3);
    }

    #[test]
    fn exact_page_boundary_has_no_continuation() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        for i in 0..2 {
            db.put_item(&Key::new("p", i.to_string()), &attrs(&[("n", "v")])).unwrap();
        }
        let page = db.query_items(&query("p", "", 2)).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.last_evaluated, None);
    }

    #[test]
    fn zero_limit_is_rejected() {
        let db = RedbBackend::open_in_memory("items").unwrap();
        db.put_item(&Key::new("p", "a"), &attrs(&[("n", "v")])).unwrap();
        let err = db.query_items(&query("p", "", 0)).unwrap_err();
        assert!(matches!(err, BackendError::InvalidQuery(_)), "{err}");
    }

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyval.redb");
        let key = Key::new("org", "a");
        {
            let db = RedbBackend::open(&path, "items").unwrap();
            db.put_item(&key, &attrs(&[("name", "x")])).unwrap();
        }
        let db = RedbBackend::open(&path, "items").unwrap();
        assert_eq!(db.get_item(&key).unwrap(), Some(attrs(&[("name", "x")])));
    }
}

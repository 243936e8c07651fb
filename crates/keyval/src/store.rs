//! KeyVal — the generic store client.
//!
//! Provides Put/Get/Update/Remove/Match over any [`Record`]. Keys come from
//! the record's [`Identity`], attributes from its [`Codec`]. Each operation
//! is a single backend request; nothing is cached or retried here.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::attribute::AttributeMap;
use crate::backend::{Backend, Query};
use crate::codec::Codec;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::key::{Identity, Key};
use crate::seq::Matches;

/// Anything the store client can persist.
pub trait Record: Identity + Serialize + DeserializeOwned + Default {}

impl<T> Record for T where T: Identity + Serialize + DeserializeOwned + Default {}

/// Typed client over a [`Backend`]. Cheap to clone and safe to share
/// across threads; the codec and config are read-only.
pub struct KeyVal<T> {
    backend: Arc<dyn Backend>,
    codec: Arc<Codec<T>>,
    config: StoreConfig,
}

impl<T> Clone for KeyVal<T> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            codec: Arc::clone(&self.codec),
            config: self.config.clone(),
        }
    }
}

impl<T: Record> KeyVal<T> {
    /// Fails with [`Error::Config`] when `config` would make the client
    /// unusable, e.g. a zero page size.
    pub fn new(
        backend: Arc<dyn Backend>,
        codec: Arc<Codec<T>>,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            codec,
            config,
        })
    }

    pub fn codec(&self) -> &Codec<T> {
        &self.codec
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Encode `record`, checking that its identity agrees with the key
    /// fields the codec wrote.
    fn encode(&self, record: &T) -> Result<(Key, AttributeMap)> {
        let key = Key::of(record);
        let attrs = self.codec.encode(record)?;
        if let Some(stored) = self.codec.key_of(&attrs) {
            if stored != key {
                return Err(Error::schema(
                    std::any::type_name::<T>(),
                    format!("identity {key} disagrees with key fields {stored}"),
                ));
            }
        }
        Ok((key, attrs))
    }

    /// Create or overwrite `record`.
    pub fn put(&self, record: &T) -> Result<()> {
        let (key, attrs) = self.encode(record)?;
        self.backend.put_item(&key, &attrs)?;
        debug!(%key, attributes = attrs.len(), "record stored");
        Ok(())
    }

    /// Load the record addressed by `record`'s key into `record`.
    ///
    /// Fails with [`Error::NotFound`] when nothing is stored at the key.
    pub fn get(&self, record: &mut T) -> Result<()> {
        let key = Key::of(record);
        match self.backend.get_item(&key)? {
            Some(attrs) => {
                self.codec.decode_into(&attrs, record)?;
                debug!(%key, "record loaded");
                Ok(())
            }
            None => Err(Error::not_found(&key.partition, &key.sort)),
        }
    }

    /// Merge the non-zero fields of `record` into the stored record.
    ///
    /// Fields left at their zero value are not touched. Updating a key that
    /// was never written fails with [`Error::NotFound`] and stores nothing.
    pub fn update(&self, record: &T) -> Result<()> {
        let (key, attrs) = self.encode(record)?;
        if !self.backend.update_item(&key, &attrs)? {
            return Err(Error::not_found(&key.partition, &key.sort));
        }
        debug!(%key, attributes = attrs.len(), "record updated");
        Ok(())
    }

    /// Delete the record at `record`'s key. Removing a missing record succeeds.
    pub fn remove(&self, record: &T) -> Result<()> {
        let key = Key::of(record);
        self.backend.delete_item(&key)?;
        debug!(%key, "record removed");
        Ok(())
    }

    /// All records sharing `prefix`'s partition key whose sort key starts
    /// with `prefix`'s sort key (empty matches the whole partition).
    ///
    /// With a grouped sort key, trailing empty fields of `prefix` are left
    /// out of the match.
    pub fn match_prefix(&self, prefix: &T) -> Result<Matches<T>> {
        let (partition, sort) = prefix.identity();
        let sort_prefix = self.codec.sort_prefix(prefix)?.unwrap_or(sort);
        debug!(%partition, %sort_prefix, "match");
        let query = Query {
            partition,
            sort_prefix,
            start_after: None,
            limit: self.config.page_size,
        };
        Matches::open(Arc::clone(&self.backend), Arc::clone(&self.codec), query)
    }
}

//! keyval — typed key-value client over a partition/sort keyed store.
//!
//! Application records are plain serde structs that name their own
//! composite key through [`Identity`]. A [`Codec`] built once per type turns
//! them into sparse [`AttributeMap`]s and back; [`KeyVal`] runs
//! Put/Get/Update/Remove/Match against any [`Backend`].
//!
//! # Architecture
//!
//! ```text
//! record ──Identity──▶ Key ─────────────┐
//!    └────Codec (+ CompositeKey)──▶ AttributeMap ──▶ Backend
//! Backend ──Page──▶ Matches ──Codec──▶ record ──▶ fmap(visit)
//! ```
//!
//! [`RedbBackend`] is the embedded reference backend; remote stores plug in
//! by implementing [`Backend`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use keyval::{Codec, CompositeKey, Identity, KeyVal, RedbBackend, StoreConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Person {
//!     org: String,
//!     id: String,
//!     name: String,
//! }
//!
//! impl Identity for Person {
//!     fn identity(&self) -> (String, String) {
//!         (self.org.clone(), self.id.clone())
//!     }
//! }
//!
//! # fn main() -> keyval::Result<()> {
//! let config = StoreConfig::default();
//! let codec = Codec::<Person>::builder()
//!     .key(CompositeKey::new("org", "id").with_attributes(&config.keys))
//!     .build()?;
//! let backend = RedbBackend::open_in_memory(&config.table)?;
//! let db = KeyVal::new(Arc::new(backend), Arc::new(codec), config)?;
//!
//! db.put(&Person { org: "test:".into(), id: "person:1".into(), name: "Verner".into() })?;
//! let mut people = Vec::new();
//! db.match_prefix(&Person { org: "test:".into(), ..Default::default() })?
//!     .join(&mut people)?;
//! # Ok(())
//! # }
//! ```

pub mod attribute;
pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod key;
pub mod seq;
pub mod store;

pub use attribute::{AttributeMap, AttributeValue};
pub use backend::{Backend, Page, Query, RedbBackend};
pub use codec::{BlobField, Codec, CodecBuilder, FieldEncoder};
pub use config::{KeyAttributes, StoreConfig};
pub use error::{BackendError, Error, ErrorKind, Result};
pub use key::{CompositeKey, Identity, Key};
pub use seq::{Join, Matches};
pub use store::{KeyVal, Record};

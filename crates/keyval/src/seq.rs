//! Lazy, one-shot traversal over the results of a match.
//!
//! [`Matches`] owns the query cursor. It buffers one backend page at a time
//! and fetches the next page only once the buffered one is drained. The
//! first error (from the backend or from decoding) ends the sequence.

use std::collections::VecDeque;
use std::iter::FusedIterator;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::attribute::AttributeMap;
use crate::backend::{Backend, Page, Query};
use crate::codec::Codec;
use crate::error::{Error, Result};

/// Collector for [`Matches::join`].
pub trait Join<T> {
    fn join(&mut self, item: T) -> Result<()>;
}

impl<T> Join<T> for Vec<T> {
    fn join(&mut self, item: T) -> Result<()> {
        self.push(item);
        Ok(())
    }
}

/// Result sequence of [`KeyVal::match_prefix`](crate::store::KeyVal::match_prefix).
///
/// Not restartable and not meant to be shared; drain it or drop it.
pub struct Matches<T> {
    backend: Arc<dyn Backend>,
    codec: Arc<Codec<T>>,
    query: Query,
    buffer: VecDeque<AttributeMap>,
    pages: usize,
    done: bool,
}

impl<T> Matches<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Issue the query and buffer its first page.
    pub(crate) fn open(
        backend: Arc<dyn Backend>,
        codec: Arc<Codec<T>>,
        query: Query,
    ) -> Result<Self> {
        let first = backend.query_items(&query)?;
        let mut seq = Self {
            backend,
            codec,
            query,
            buffer: VecDeque::new(),
            pages: 0,
            done: false,
        };
        seq.fill(first);
        Ok(seq)
    }

    fn fill(&mut self, page: Page) {
        self.pages += 1;
        self.buffer.extend(page.items);
        match page.last_evaluated {
            Some(last) => self.query.start_after = Some(last),
            None => self.done = true,
        }
    }

    fn fail(&mut self) {
        self.buffer.clear();
        self.done = true;
    }

    /// Visit every match in order, stopping at the first error, which is
    /// returned as is.
    pub fn fmap<E, F>(self, mut visit: F) -> std::result::Result<(), E>
    where
        F: FnMut(T) -> std::result::Result<(), E>,
        E: From<Error>,
    {
        for item in self {
            visit(item?)?;
        }
        Ok(())
    }

    /// Append every match to `seq`.
    pub fn join(self, seq: &mut impl Join<T>) -> Result<()> {
        self.fmap(|item| seq.join(item))
    }
}

impl<T> Iterator for Matches<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(attrs) = self.buffer.pop_front() {
                let item = self.codec.decode(&attrs);
                if item.is_err() {
                    self.fail();
                }
                return Some(item);
            }
            if self.done {
                return None;
            }
            match self.backend.query_items(&self.query) {
                Ok(page) => {
                    debug!(
                        partition = %self.query.partition,
                        page = self.pages + 1,
                        items = page.items.len(),
                        "fetched match page"
                    );
                    self.fill(page);
                }
                Err(e) => {
                    self.fail();
                    return Some(Err(e.into()));
                }
            }
        }
    }
}

impl<T> FusedIterator for Matches<T> where T: Serialize + DeserializeOwned + Default {}

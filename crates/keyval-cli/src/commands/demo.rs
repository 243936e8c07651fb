//! Walkthrough of every store operation over a `Person` record.

use std::path::Path;
use std::sync::Arc;

use keyval::{Backend, Codec, CompositeKey, Identity, KeyVal, RedbBackend, StoreConfig};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Organisation member, keyed by `(org, id)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub org: String,
    pub id: String,
    pub name: String,
    pub age: u32,
    pub address: String,
}

impl Identity for Person {
    fn identity(&self) -> (String, String) {
        (self.org.clone(), self.id.clone())
    }
}

const ORG: &str = "test:";

fn key(i: u32) -> Person {
    Person {
        org: ORG.to_string(),
        id: format!("person:{i}"),
        ..Default::default()
    }
}

pub fn open(db: &str, config: StoreConfig) -> anyhow::Result<KeyVal<Person>> {
    let backend: Arc<dyn Backend> = if db == ":memory:" {
        Arc::new(RedbBackend::open_in_memory(&config.table)?)
    } else {
        Arc::new(RedbBackend::open(Path::new(db), &config.table)?)
    };
    let codec = Codec::<Person>::builder()
        .key(CompositeKey::new("org", "id").with_attributes(&config.keys))
        .build()?;
    info!(db, table = %config.table, "store opened");
    Ok(KeyVal::new(backend, Arc::new(codec), config)?)
}

pub fn run(db: &str, config: StoreConfig, n: u32) -> anyhow::Result<()> {
    let db = open(db, config)?;

    put(&db, n);
    get(&db, n);
    update(&db, n);
    match matches(&db) {
        Ok(seq) => println!("=[ match ]=> {seq:?}"),
        Err(e) => println!("=[ match ]=> {e}"),
    }
    remove(&db, n);
    Ok(())
}

fn put(db: &KeyVal<Person>, n: u32) {
    for i in 0..n {
        let val = Person {
            name: "Verner Pleishner".to_string(),
            age: 64,
            address: "Blumenstrasse 14, Berne, 3013".to_string(),
            ..key(i)
        };
        match db.put(&val) {
            Ok(()) => println!("=[ put ]=> {val:?}"),
            Err(e) => println!("=[ put ]=> {e}"),
        }
    }
}

fn get(db: &KeyVal<Person>, n: u32) {
    for i in 0..n {
        let mut val = key(i);
        match db.get(&mut val) {
            Ok(()) => println!("=[ get ]=> {val:?}"),
            Err(e) if e.is_not_found() => {
                println!("=[ get ]=> Not found: ({}, {})", val.org, val.id)
            }
            Err(e) => println!("=[ get ]=> Fail: {e}"),
        }
    }
}

fn update(db: &KeyVal<Person>, n: u32) {
    for i in 0..n {
        let val = Person {
            address: "Viktoriastrasse 37, Berne, 3013".to_string(),
            ..key(i)
        };
        match db.update(&val) {
            Ok(()) => println!("=[ update ]=> {val:?}"),
            Err(e) => println!("=[ update ]=> {e}"),
        }
    }
}

pub fn matches(db: &KeyVal<Person>) -> keyval::Result<Vec<Person>> {
    let mut seq = Vec::new();
    db.match_prefix(&Person {
        org: ORG.to_string(),
        ..Default::default()
    })?
    .join(&mut seq)?;
    Ok(seq)
}

fn remove(db: &KeyVal<Person>, n: u32) {
    for i in 0..n {
        let val = key(i);
        match db.remove(&val) {
            Ok(()) => println!("=[ remove ]=> {val:?}"),
            Err(e) => println!("=[ remove ]=> {e}"),
        }
    }
}

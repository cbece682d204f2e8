//! Store module - the application database, its seed data and persistence
pub mod kv;
pub mod persistent;
pub mod schema;
pub mod seed;

pub use kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
pub use persistent::PersistentStore;
pub use schema::*;

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Single source of truth for the in-memory database.
///
/// Readers get an immutable snapshot. Writers go through [`AppStore::update`],
/// which applies the change to a copy, persists it once and then publishes
/// the new snapshot. Writers are serialized so read-modify-write cannot lose
/// an update.
pub struct AppStore {
    persistence: PersistentStore,
    current: ArcSwap<AppDatabase>,
    write_lock: Mutex<()>,
}

impl AppStore {
    pub fn open(persistence: PersistentStore) -> Self {
        let db = persistence.load();
        Self::with_database(persistence, db)
    }

    pub fn with_database(persistence: PersistentStore, db: AppDatabase) -> Self {
        Self {
            persistence,
            current: ArcSwap::from_pointee(db),
            write_lock: Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Arc<AppDatabase> {
        self.current.load_full()
    }

    pub fn persistence(&self) -> &PersistentStore {
        &self.persistence
    }

    /// Apply `f` to a copy of the database, persist the result and publish
    /// it. On a persistence failure the published snapshot stays unchanged.
    pub fn update<T, F>(&self, f: F) -> anyhow::Result<(T, Arc<AppDatabase>)>
    where
        F: FnOnce(&mut AppDatabase) -> T,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Store write lock poisoned"))?;

        let mut next = AppDatabase::clone(&self.current.load());
        let out = f(&mut next);
        self.persistence.save(&next)?;

        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        debug!("Published new database snapshot");
        Ok((out, next))
    }

    /// Like [`AppStore::update`] for closures that may refuse the change.
    /// Nothing is persisted when `f` returns an error.
    pub fn try_update<T, E, F>(&self, f: F) -> anyhow::Result<Result<(T, Arc<AppDatabase>), E>>
    where
        F: FnOnce(&mut AppDatabase) -> Result<T, E>,
    {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Store write lock poisoned"))?;

        let mut next = AppDatabase::clone(&self.current.load());
        let out = match f(&mut next) {
            Ok(out) => out,
            Err(e) => return Ok(Err(e)),
        };
        self.persistence.save(&next)?;

        let next = Arc::new(next);
        self.current.store(Arc::clone(&next));
        Ok(Ok((out, next)))
    }
}

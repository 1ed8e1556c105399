//! Binding of a non-consensus key/value store to chain database handles.
//!
//! Hooks may keep auxiliary indexes (e.g. which transaction settled an L1
//! request) that must never influence consensus. Those live in a side store
//! bound at runtime to the chain database. Layered handles (read-only views,
//! prefixed tables) share the binding of the database they wrap. Light
//! handles never carry one.

use crate::NotFoundError;
use std::sync::{Arc, RwLock};

/// Errors from a [`KeyValueStore`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum KvError {
    /// The store refused a write.
    #[error("store is read-only")]
    ReadOnly,

    /// Any other store failure.
    #[error("{0}")]
    Other(String),
}

/// A byte-oriented key/value store.
pub trait KeyValueStore: core::fmt::Debug + Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;

    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;

    /// Remove the value under `key`.
    fn delete(&self, key: &[u8]) -> Result<(), KvError>;
}

/// The side store binding of a database handle.
#[derive(Debug, Clone, Default)]
pub enum SideStoreSlot {
    /// A store is bound.
    Bound(Arc<dyn KeyValueStore>),
    /// No store is bound.
    #[default]
    Unbound,
}

impl SideStoreSlot {
    /// True if a store is bound.
    pub const fn is_bound(&self) -> bool {
        matches!(self, Self::Bound(_))
    }

    /// Get the bound store.
    pub fn store(&self) -> Result<Arc<dyn KeyValueStore>, NotFoundError> {
        match self {
            Self::Bound(store) => Ok(store.clone()),
            Self::Unbound => Err(NotFoundError::Unbound),
        }
    }
}

/// A database handle that can carry a side store.
pub trait SideStoreProvider {
    /// Bind `store`, replacing any existing binding.
    fn bind_side_store(&self, store: Arc<dyn KeyValueStore>) -> Result<(), NotFoundError>;

    /// Remove any existing binding.
    fn unbind_side_store(&self) -> Result<(), NotFoundError>;

    /// Get the bound store.
    fn side_store(&self) -> Result<Arc<dyn KeyValueStore>, NotFoundError>;
}

impl<P: SideStoreProvider + ?Sized> SideStoreProvider for Arc<P> {
    fn bind_side_store(&self, store: Arc<dyn KeyValueStore>) -> Result<(), NotFoundError> {
        P::bind_side_store(self, store)
    }

    fn unbind_side_store(&self) -> Result<(), NotFoundError> {
        P::unbind_side_store(self)
    }

    fn side_store(&self) -> Result<Arc<dyn KeyValueStore>, NotFoundError> {
        P::side_store(self)
    }
}

/// A full chain database handle. Owns the side store binding.
#[derive(Debug, Default)]
pub struct ChainDb<Db> {
    db: Db,
    slot: RwLock<SideStoreSlot>,
}

impl<Db> ChainDb<Db> {
    /// Wrap a database.
    pub fn new(db: Db) -> Self {
        Self { db, slot: Default::default() }
    }

    /// Get a reference to the wrapped database.
    pub const fn db(&self) -> &Db {
        &self.db
    }

    /// Get a mutable reference to the wrapped database.
    pub fn db_mut(&mut self) -> &mut Db {
        &mut self.db
    }

    /// Unwrap the database, dropping the binding.
    pub fn into_inner(self) -> Db {
        self.db
    }
}

impl<Db> SideStoreProvider for ChainDb<Db> {
    fn bind_side_store(&self, store: Arc<dyn KeyValueStore>) -> Result<(), NotFoundError> {
        // a poisoned lock still holds a valid slot
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = SideStoreSlot::Bound(store);
        Ok(())
    }

    fn unbind_side_store(&self) -> Result<(), NotFoundError> {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = SideStoreSlot::Unbound;
        Ok(())
    }

    fn side_store(&self) -> Result<Arc<dyn KeyValueStore>, NotFoundError> {
        self.slot.read().unwrap_or_else(|e| e.into_inner()).store()
    }
}

/// A read-only view of a parent handle. Shares the parent's binding.
#[derive(Debug, Clone)]
pub struct ReadOnlyDb<P> {
    parent: P,
}

impl<P> ReadOnlyDb<P> {
    /// Wrap a parent handle.
    pub const fn new(parent: P) -> Self {
        Self { parent }
    }

    /// Get a reference to the parent handle.
    pub const fn parent(&self) -> &P {
        &self.parent
    }
}

impl<P: SideStoreProvider> SideStoreProvider for ReadOnlyDb<P> {
    fn bind_side_store(&self, store: Arc<dyn KeyValueStore>) -> Result<(), NotFoundError> {
        self.parent.bind_side_store(store)
    }

    fn unbind_side_store(&self) -> Result<(), NotFoundError> {
        self.parent.unbind_side_store()
    }

    fn side_store(&self) -> Result<Arc<dyn KeyValueStore>, NotFoundError> {
        self.parent.side_store()
    }
}

/// A key-prefixed table within a parent handle. Shares the parent's binding.
#[derive(Debug, Clone)]
pub struct TableDb<P> {
    parent: P,
    prefix: Vec<u8>,
}

impl<P> TableDb<P> {
    /// Wrap a parent handle with a table prefix.
    pub fn new(parent: P, prefix: impl Into<Vec<u8>>) -> Self {
        Self { parent, prefix: prefix.into() }
    }

    /// The table prefix.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Get a reference to the parent handle.
    pub const fn parent(&self) -> &P {
        &self.parent
    }

    /// Prefix a key with the table prefix.
    pub fn table_key(&self, key: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + key.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(key);
        out
    }
}

impl<P: SideStoreProvider> SideStoreProvider for TableDb<P> {
    fn bind_side_store(&self, store: Arc<dyn KeyValueStore>) -> Result<(), NotFoundError> {
        self.parent.bind_side_store(store)
    }

    fn unbind_side_store(&self) -> Result<(), NotFoundError> {
        self.parent.unbind_side_store()
    }

    fn side_store(&self) -> Result<Arc<dyn KeyValueStore>, NotFoundError> {
        self.parent.side_store()
    }
}

/// A light-client handle. Never carries a side store.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightDb;

impl SideStoreProvider for LightDb {
    fn bind_side_store(&self, _store: Arc<dyn KeyValueStore>) -> Result<(), NotFoundError> {
        Err(NotFoundError::Unsupported("light database"))
    }

    fn unbind_side_store(&self) -> Result<(), NotFoundError> {
        Err(NotFoundError::Unsupported("light database"))
    }

    fn side_store(&self) -> Result<Arc<dyn KeyValueStore>, NotFoundError> {
        Err(NotFoundError::Unsupported("light database"))
    }
}

/// An in-memory [`KeyValueStore`].
#[cfg(feature = "concurrent-kv")]
#[derive(Debug, Default)]
pub struct MemoryKv {
    map: dashmap::DashMap<Vec<u8>, Vec<u8>>,
}

#[cfg(feature = "concurrent-kv")]
impl MemoryKv {
    /// Instantiate an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(feature = "concurrent-kv")]
impl KeyValueStore for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        Ok(self.map.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KvError> {
        self.map.remove(key);
        Ok(())
    }
}

#[cfg(all(test, feature = "concurrent-kv"))]
mod test {
    use super::*;

    #[test]
    fn unbound_by_default() {
        let db = ChainDb::new(());
        assert_eq!(db.side_store().unwrap_err(), NotFoundError::Unbound);
    }

    #[test]
    fn last_writer_wins() {
        let db = ChainDb::new(());
        let first = Arc::new(MemoryKv::new());
        let second = Arc::new(MemoryKv::new());
        db.bind_side_store(first).unwrap();
        db.bind_side_store(second.clone()).unwrap();

        db.side_store().unwrap().put(b"k", b"v").unwrap();
        assert_eq!(second.get(b"k").unwrap(), Some(b"v".to_vec()));

        db.unbind_side_store().unwrap();
        assert_eq!(db.side_store().unwrap_err(), NotFoundError::Unbound);
    }

    #[test]
    fn layered_handles_delegate() {
        let chain = Arc::new(ChainDb::new(()));
        let table = TableDb::new(ReadOnlyDb::new(chain.clone()), b"idx/".to_vec());
        assert_eq!(table.table_key(b"a"), b"idx/a".to_vec());

        let store = Arc::new(MemoryKv::new());
        table.bind_side_store(store.clone()).unwrap();

        // bound through the table, visible at the root and vice versa
        chain.side_store().unwrap().put(b"x", b"1").unwrap();
        assert_eq!(table.side_store().unwrap().get(b"x").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.len(), 1);

        chain.unbind_side_store().unwrap();
        assert_eq!(table.side_store().unwrap_err(), NotFoundError::Unbound);
    }

    #[test]
    fn light_is_unsupported() {
        let light = LightDb;
        let store = Arc::new(MemoryKv::new());
        assert!(matches!(light.bind_side_store(store), Err(NotFoundError::Unsupported(_))));
        assert!(matches!(light.side_store(), Err(NotFoundError::Unsupported(_))));
        assert!(matches!(
            ReadOnlyDb::new(LightDb).side_store(),
            Err(NotFoundError::Unsupported(_))
        ));
    }
}

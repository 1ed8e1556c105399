use super::{merge_account, Checkpoint, StateAccess, StateBackend};
use crate::StateError;
use alloy::primitives::{Address, B256, U256};
use revm::{
    database::{in_memory_db::Cache, AccountState, DbAccount},
    primitives::KECCAK_EMPTY,
    state::{AccountInfo, Bytecode},
    DatabaseRef,
};

#[derive(Debug, Clone)]
enum JournalEntry {
    /// The account was copied into the cache from the inner database.
    Loaded(Address),
    /// Account info before a write.
    Info { address: Address, info: AccountInfo, state: AccountState },
    /// A storage slot before a write.
    Storage { address: Address, slot: U256, prev: Option<U256> },
    /// The whole cached account before a merge.
    Replaced { address: Address, prev: Option<DbAccount> },
    /// New code inserted.
    Code(B256),
}

/// A write cache over a [`DatabaseRef`].
///
/// Reads fall through to the inner database until a value is written.
/// Writes are journaled, so the overlay can revert to any [`Checkpoint`].
/// The overlay is itself a [`DatabaseRef`], and overlays nest.
#[derive(Debug)]
pub struct StateOverlay<Db> {
    cache: Cache,
    journal: Vec<JournalEntry>,
    inner: Db,
}

impl<Db> Default for StateOverlay<Db>
where
    Db: Default,
{
    fn default() -> Self {
        Self::new(Db::default())
    }
}

impl<Db> StateOverlay<Db> {
    /// Create a new overlay over the given inner database.
    pub fn new(inner: Db) -> Self {
        Self { cache: Default::default(), journal: Vec::new(), inner }
    }

    /// Get a reference to the inner database.
    pub const fn inner(&self) -> &Db {
        &self.inner
    }

    /// Get a reference to the [`Cache`].
    pub const fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Deconstruct the overlay into its parts, dropping the journal.
    pub fn into_parts(self) -> (Db, Cache) {
        (self.inner, self.cache)
    }

    /// Deconstruct the overlay into its cache, dropping the `Db`.
    pub fn into_cache(self) -> Cache {
        self.cache
    }

    /// Nest the overlay inside a new one.
    pub fn nest(self) -> StateOverlay<Self> {
        StateOverlay::new(self)
    }

    /// Number of journaled writes.
    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }
}

impl<Db: DatabaseRef> StateOverlay<StateOverlay<Db>> {
    /// Discard the outer overlay, returning the inner.
    pub fn discard_outer(self) -> StateOverlay<Db> {
        self.inner
    }

    /// Flatten a nested overlay by applying the outer cache to the inner.
    pub fn flatten(self) -> StateOverlay<Db> {
        let Self { cache, mut inner, .. } = self;
        inner.apply(cache);
        inner
    }
}

impl<Db: DatabaseRef> StateOverlay<Db> {
    /// Copy the account into the cache if it is not there yet, and return it.
    fn load_for_write(&mut self, address: Address) -> Result<&mut DbAccount, Db::Error> {
        if !self.cache.accounts.contains_key(&address) {
            let info = self.inner.basic_ref(address)?.unwrap_or_default();
            self.cache.accounts.insert(address, DbAccount { info, ..Default::default() });
            self.journal.push(JournalEntry::Loaded(address));
        }
        Ok(self.cache.accounts.entry(address).or_default())
    }

    fn modify_info(
        &mut self,
        address: Address,
        f: impl FnOnce(&mut AccountInfo),
    ) -> Result<(), Db::Error> {
        let account = self.load_for_write(address)?;
        let entry = JournalEntry::Info {
            address,
            info: account.info.clone(),
            state: account.account_state.clone(),
        };
        f(&mut account.info);
        if account.account_state == AccountState::NotExisting {
            account.account_state = AccountState::StorageCleared;
        }
        self.journal.push(entry);
        Ok(())
    }

    /// Take a checkpoint.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.journal.len())
    }

    /// Undo every write made since `checkpoint`. Reverting to a checkpoint
    /// newer than the journal does nothing.
    pub fn revert_to(&mut self, checkpoint: Checkpoint) {
        if checkpoint.0 >= self.journal.len() {
            return;
        }
        for entry in self.journal.split_off(checkpoint.0).into_iter().rev() {
            match entry {
                JournalEntry::Loaded(address) => {
                    self.cache.accounts.remove(&address);
                }
                JournalEntry::Info { address, info, state } => {
                    if let Some(account) = self.cache.accounts.get_mut(&address) {
                        account.info = info;
                        account.account_state = state;
                    }
                }
                JournalEntry::Storage { address, slot, prev } => {
                    if let Some(account) = self.cache.accounts.get_mut(&address) {
                        match prev {
                            Some(value) => account.storage.insert(slot, value),
                            None => account.storage.remove(&slot),
                        };
                    }
                }
                JournalEntry::Replaced { address, prev } => match prev {
                    Some(account) => {
                        self.cache.accounts.insert(address, account);
                    }
                    None => {
                        self.cache.accounts.remove(&address);
                    }
                },
                JournalEntry::Code(hash) => {
                    self.cache.contracts.remove(&hash);
                }
            }
        }
    }
}

impl<Db: DatabaseRef> DatabaseRef for StateOverlay<Db> {
    type Error = Db::Error;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        if let Some(account) = self.cache.accounts.get(&address).map(DbAccount::info) {
            return Ok(account);
        }
        self.inner.basic_ref(address)
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        if let Some(code) = self.cache.contracts.get(&code_hash) {
            return Ok(code.clone());
        }
        self.inner.code_by_hash_ref(code_hash)
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        if let Some(account) = self.cache.accounts.get(&address) {
            if let Some(value) = account.storage.get(&index) {
                return Ok(*value);
            }
            if matches!(
                account.account_state,
                AccountState::StorageCleared | AccountState::NotExisting
            ) {
                return Ok(U256::ZERO);
            }
        }
        self.inner.storage_ref(address, index)
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        if let Some(hash) = self.cache.block_hashes.get(&U256::from(number)) {
            return Ok(*hash);
        }
        self.inner.block_hash_ref(number)
    }
}

impl<Db: DatabaseRef> StateBackend for StateOverlay<Db> {
    fn apply(&mut self, cache: Cache) {
        let Cache { accounts, contracts, .. } = cache;
        for (hash, code) in contracts {
            if !self.cache.contracts.contains_key(&hash) {
                self.cache.contracts.insert(hash, code);
                self.journal.push(JournalEntry::Code(hash));
            }
        }
        for (address, incoming) in accounts {
            let prev = self.cache.accounts.remove(&address);
            let merged = merge_account(prev.clone(), incoming);
            self.cache.accounts.insert(address, merged);
            self.journal.push(JournalEntry::Replaced { address, prev });
        }
    }
}

impl<Db> StateAccess for StateOverlay<Db>
where
    Db: DatabaseRef,
    Db::Error: Send + Sync + 'static,
{
    fn balance(&self, address: Address) -> Result<U256, StateError> {
        Ok(self.basic_ref(address).map_err(StateError::new)?.map(|a| a.balance).unwrap_or_default())
    }

    fn nonce(&self, address: Address) -> Result<u64, StateError> {
        Ok(self.basic_ref(address).map_err(StateError::new)?.map(|a| a.nonce).unwrap_or_default())
    }

    fn code_hash(&self, address: Address) -> Result<B256, StateError> {
        Ok(self
            .basic_ref(address)
            .map_err(StateError::new)?
            .map(|a| a.code_hash)
            .unwrap_or(KECCAK_EMPTY))
    }

    fn code(&self, address: Address) -> Result<Bytecode, StateError> {
        let Some(info) = self.basic_ref(address).map_err(StateError::new)? else {
            return Ok(Bytecode::default());
        };
        if let Some(code) = info.code {
            return Ok(code);
        }
        if info.code_hash == KECCAK_EMPTY || info.code_hash.is_zero() {
            return Ok(Bytecode::default());
        }
        self.code_by_hash_ref(info.code_hash).map_err(StateError::new)
    }

    fn storage(&self, address: Address, slot: U256) -> Result<U256, StateError> {
        self.storage_ref(address, slot).map_err(StateError::new)
    }

    fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), StateError> {
        self.modify_info(address, |info| info.balance = balance).map_err(StateError::new)
    }

    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError> {
        self.modify_info(address, |info| info.nonce = nonce).map_err(StateError::new)
    }

    fn set_code(&mut self, address: Address, code: Bytecode) -> Result<(), StateError> {
        let hash = if code.is_empty() { KECCAK_EMPTY } else { code.hash_slow() };
        if hash != KECCAK_EMPTY && !self.cache.contracts.contains_key(&hash) {
            self.cache.contracts.insert(hash, code.clone());
            self.journal.push(JournalEntry::Code(hash));
        }
        self.modify_info(address, |info| {
            info.code_hash = hash;
            info.code = Some(code);
        })
        .map_err(StateError::new)
    }

    fn set_storage(
        &mut self,
        address: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), StateError> {
        let account = self.load_for_write(address).map_err(StateError::new)?;
        let prev = account.storage.insert(slot, value);
        self.journal.push(JournalEntry::Storage { address, slot, prev });
        Ok(())
    }

    fn checkpoint(&self) -> Checkpoint {
        Self::checkpoint(self)
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        Self::revert_to(self, checkpoint)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy::primitives::bytes;
    use revm::database::{CacheDB, EmptyDB};

    fn funded() -> CacheDB<EmptyDB> {
        let mut db = CacheDB::new(EmptyDB::default());
        db.insert_account_info(
            Address::repeat_byte(1),
            AccountInfo { balance: U256::from(100), nonce: 4, ..Default::default() },
        );
        db
    }

    #[test]
    fn reads_fall_through() {
        let db = funded();
        let overlay = StateOverlay::new(&db);
        assert_eq!(overlay.balance(Address::repeat_byte(1)).unwrap(), U256::from(100));
        assert_eq!(overlay.nonce(Address::repeat_byte(1)).unwrap(), 4);
        assert_eq!(overlay.balance(Address::repeat_byte(2)).unwrap(), U256::ZERO);
        assert_eq!(overlay.journal_len(), 0);
    }

    #[test]
    fn revert_restores_everything() {
        let db = funded();
        let alice = Address::repeat_byte(1);
        let bob = Address::repeat_byte(2);
        let mut overlay = StateOverlay::new(&db);
        overlay.set_storage(alice, U256::from(1), U256::from(1)).unwrap();

        let checkpoint = overlay.checkpoint();
        overlay.transfer(alice, bob, U256::from(40)).unwrap();
        overlay.set_storage(alice, U256::from(1), U256::from(2)).unwrap();
        overlay.set_storage(bob, U256::from(3), U256::from(3)).unwrap();
        overlay.increment_nonce(alice).unwrap();
        let code = Bytecode::new_legacy(bytes!("6000"));
        let code_hash = code.hash_slow();
        overlay.set_code(bob, code).unwrap();
        assert!(overlay.cache().contracts.contains_key(&code_hash));

        overlay.revert_to(checkpoint);
        assert_eq!(overlay.balance(alice).unwrap(), U256::from(100));
        assert_eq!(overlay.nonce(alice).unwrap(), 4);
        assert_eq!(overlay.storage(alice, U256::from(1)).unwrap(), U256::from(1));
        assert!(!overlay.cache().accounts.contains_key(&bob));
        // `Cache::default` pre-seeds the empty code
        assert!(!overlay.cache().contracts.contains_key(&code_hash));
        assert_eq!(overlay.code_hash(bob).unwrap(), KECCAK_EMPTY);
    }

    #[test]
    fn nested_flatten() {
        let db = funded();
        let alice = Address::repeat_byte(1);
        let mut outer = StateOverlay::new(&db).nest();
        outer.set_balance(alice, U256::from(7)).unwrap();
        outer.set_storage(alice, U256::from(9), U256::from(9)).unwrap();
        assert_eq!(outer.inner().balance(alice).unwrap(), U256::from(100));

        let flat = outer.flatten();
        assert_eq!(flat.balance(alice).unwrap(), U256::from(7));
        assert_eq!(flat.storage(alice, U256::from(9)).unwrap(), U256::from(9));
        assert_eq!(db.basic_ref(alice).unwrap().unwrap().balance, U256::from(100));
    }

    #[test]
    fn code_round_trip() {
        let db = funded();
        let bob = Address::repeat_byte(2);
        let mut overlay = StateOverlay::new(&db);
        let code = Bytecode::new_legacy(bytes!("600100"));
        overlay.set_code(bob, code.clone()).unwrap();
        assert_eq!(overlay.code_hash(bob).unwrap(), code.hash_slow());
        assert_eq!(overlay.code(bob).unwrap().original_bytes(), code.original_bytes());
    }
}

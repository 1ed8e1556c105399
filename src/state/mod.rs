//! Transactional state.
//!
//! Writes never reach the backing database directly. Each block runs on a
//! [`StateOverlay`] over the backing database, and each transaction on an
//! overlay nested inside it. A rejected transaction drops its overlay, a
//! failed call reverts to a [`Checkpoint`], and a completed block is handed
//! to [`StateBackend::apply`].

mod overlay;
pub use overlay::StateOverlay;

use crate::StateError;
use alloy::primitives::{Address, B256, U256};
use revm::{
    database::{in_memory_db::Cache, AccountState, CacheDB, DbAccount},
    state::Bytecode,
    DatabaseRef,
};

/// A position in an overlay's journal. Reverting to it undoes every write
/// made after it was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(pub(crate) usize);

/// Object-safe read/write access to account state.
///
/// This is the view of state handed to hooks and to the VM host.
pub trait StateAccess {
    /// Account balance. Zero for absent accounts.
    fn balance(&self, address: Address) -> Result<U256, StateError>;

    /// Account nonce. Zero for absent accounts.
    fn nonce(&self, address: Address) -> Result<u64, StateError>;

    /// Hash of the account code.
    fn code_hash(&self, address: Address) -> Result<B256, StateError>;

    /// Account code. Empty for accounts without code.
    fn code(&self, address: Address) -> Result<Bytecode, StateError>;

    /// Value of a storage slot.
    fn storage(&self, address: Address, slot: U256) -> Result<U256, StateError>;

    /// Overwrite the account balance.
    fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), StateError>;

    /// Overwrite the account nonce.
    fn set_nonce(&mut self, address: Address, nonce: u64) -> Result<(), StateError>;

    /// Overwrite the account code.
    fn set_code(&mut self, address: Address, code: Bytecode) -> Result<(), StateError>;

    /// Write a storage slot.
    fn set_storage(&mut self, address: Address, slot: U256, value: U256)
        -> Result<(), StateError>;

    /// Take a checkpoint.
    fn checkpoint(&self) -> Checkpoint;

    /// Undo every write made since `checkpoint`.
    fn revert_to(&mut self, checkpoint: Checkpoint);

    /// Credit `amount` to `address`, saturating at [`U256::MAX`].
    fn add_balance(&mut self, address: Address, amount: U256) -> Result<(), StateError> {
        let balance = self.balance(address)?;
        self.set_balance(address, balance.saturating_add(amount))
    }

    /// Debit `amount` from `address`. Returns `false` and writes nothing if
    /// the balance is insufficient.
    fn sub_balance(&mut self, address: Address, amount: U256) -> Result<bool, StateError> {
        let balance = self.balance(address)?;
        match balance.checked_sub(amount) {
            Some(balance) => self.set_balance(address, balance).map(|_| true),
            None => Ok(false),
        }
    }

    /// Move `amount` from `from` to `to`. Returns `false` and writes nothing
    /// if `from` cannot cover it.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<bool, StateError> {
        if amount.is_zero() {
            return Ok(true);
        }
        if !self.sub_balance(from, amount)? {
            return Ok(false);
        }
        self.add_balance(to, amount).map(|_| true)
    }

    /// Increment the account nonce.
    fn increment_nonce(&mut self, address: Address) -> Result<(), StateError> {
        let nonce = self.nonce(address)?;
        self.set_nonce(address, nonce.saturating_add(1))
    }
}

/// A database that can absorb the cache of a completed [`StateOverlay`].
pub trait StateBackend: DatabaseRef {
    /// Merge the cache into this database. Accounts in `cache` override the
    /// cached account info, and their storage is layered over the existing
    /// storage unless the account's storage was cleared.
    fn apply(&mut self, cache: Cache);
}

impl<ExtDb: DatabaseRef> StateBackend for CacheDB<ExtDb> {
    fn apply(&mut self, cache: Cache) {
        let Cache { accounts, contracts, .. } = cache;
        for (hash, code) in contracts {
            self.cache.contracts.entry(hash).or_insert(code);
        }
        for (address, incoming) in accounts {
            let existing = self.cache.accounts.remove(&address);
            self.cache.accounts.insert(address, merge_account(existing, incoming));
        }
    }
}

/// Layer `incoming` over `existing`.
pub(crate) fn merge_account(existing: Option<DbAccount>, incoming: DbAccount) -> DbAccount {
    let Some(mut existing) = existing else { return incoming };
    if matches!(incoming.account_state, AccountState::StorageCleared | AccountState::NotExisting)
    {
        return incoming;
    }
    existing.info = incoming.info;
    if existing.account_state == AccountState::NotExisting {
        // every slot of an account that did not exist is known
        existing.account_state = AccountState::StorageCleared;
    }
    existing.storage.extend(incoming.storage);
    existing
}

#[cfg(test)]
mod test {
    use super::*;
    use revm::{database::EmptyDB, state::AccountInfo};

    #[test]
    fn apply_into_cache_db() {
        let alice = Address::repeat_byte(1);
        let mut db = CacheDB::new(EmptyDB::default());
        db.insert_account_info(alice, AccountInfo { balance: U256::from(10), ..Default::default() });
        db.insert_account_storage(alice, U256::from(1), U256::from(11)).unwrap();

        let mut overlay = StateOverlay::new(&db);
        overlay.set_balance(alice, U256::from(20)).unwrap();
        overlay.set_storage(alice, U256::from(2), U256::from(22)).unwrap();
        let cache = overlay.into_cache();

        db.apply(cache);
        assert_eq!(db.basic_ref(alice).unwrap().unwrap().balance, U256::from(20));
        assert_eq!(db.storage_ref(alice, U256::from(1)).unwrap(), U256::from(11));
        assert_eq!(db.storage_ref(alice, U256::from(2)).unwrap(), U256::from(22));
    }

    #[test]
    fn transfer_insufficient() {
        let alice = Address::repeat_byte(1);
        let bob = Address::repeat_byte(2);
        let db = CacheDB::new(EmptyDB::default());
        let mut overlay = StateOverlay::new(&db);
        overlay.set_balance(alice, U256::from(5)).unwrap();

        assert!(!overlay.transfer(alice, bob, U256::from(6)).unwrap());
        assert_eq!(overlay.balance(alice).unwrap(), U256::from(5));
        assert_eq!(overlay.balance(bob).unwrap(), U256::ZERO);

        assert!(overlay.transfer(alice, bob, U256::from(5)).unwrap());
        assert_eq!(overlay.balance(alice).unwrap(), U256::ZERO);
        assert_eq!(overlay.balance(bob).unwrap(), U256::from(5));
    }
}

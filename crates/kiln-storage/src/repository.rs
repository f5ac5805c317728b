//! The repository contract and its in-memory implementations

use crate::Account;
use kiln_primitives::{Address, H256};
use std::collections::{HashMap, HashSet};

/// The state view a program executes against.
///
/// Storage reads return `Option<H256>` so callers can tell a slot that was
/// explicitly written to zero from one that was never touched; a missing
/// slot reads as zero at the opcode level.
pub trait Repository {
    /// Account balance; zero for unknown accounts
    fn balance(&self, address: &Address) -> u128;

    /// Overwrite an account balance
    fn set_balance(&mut self, address: &Address, balance: u128);

    /// Account nonce; zero for unknown accounts
    fn nonce(&self, address: &Address) -> u64;

    /// Overwrite an account nonce
    fn set_nonce(&mut self, address: &Address, nonce: u64);

    /// Contract code; empty for unknown accounts
    fn code(&self, address: &Address) -> Vec<u8>;

    /// Install contract code
    fn set_code(&mut self, address: &Address, code: Vec<u8>);

    /// Read a storage slot; `None` if never written
    fn storage(&self, address: &Address, key: &H256) -> Option<H256>;

    /// Write a storage slot (zeros stay present)
    fn set_storage(&mut self, address: &Address, key: H256, value: H256);

    /// True when the account is known to the repository
    fn account_exists(&self, address: &Address) -> bool;

    /// Remove an account and everything it owns
    fn delete_account(&mut self, address: &Address);

    /// Hash of a recent block; zero when unknown
    fn block_hash(&self, number: u64) -> H256;

    /// Every storage slot of an account, unordered. Used by diagnostic
    /// dumps, not by execution.
    fn storage_entries(&self, address: &Address) -> Vec<(H256, H256)>;

    /// Add to an account balance
    fn add_balance(&mut self, address: &Address, amount: u128) {
        let balance = self.balance(address);
        self.set_balance(address, balance.saturating_add(amount));
    }

    /// Subtract from an account balance; false when insufficient
    fn sub_balance(&mut self, address: &Address, amount: u128) -> bool {
        let balance = self.balance(address);
        if balance < amount {
            return false;
        }
        self.set_balance(address, balance - amount);
        true
    }

    /// Move value between accounts; false (and no change) when the source
    /// balance is insufficient
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> bool {
        if !self.sub_balance(from, amount) {
            return false;
        }
        self.add_balance(to, amount);
        true
    }

    /// Bump an account nonce, returning the previous value
    fn increment_nonce(&mut self, address: &Address) -> u64 {
        let nonce = self.nonce(address);
        self.set_nonce(address, nonce + 1);
        nonce
    }
}

/// A `HashMap`-backed repository, the reference implementation for tests
/// and for driving the machine without a persistent store.
#[derive(Clone, Debug, Default)]
pub struct InMemoryRepository {
    accounts: HashMap<Address, Account>,
    block_hashes: HashMap<u64, H256>,
}

impl InMemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the hash of a block for BLOCKHASH lookups
    pub fn set_block_hash(&mut self, number: u64, hash: H256) {
        self.block_hashes.insert(number, hash);
    }

    /// Direct access to an account, for assertions in tests
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    fn entry(&mut self, address: &Address) -> &mut Account {
        self.accounts.entry(*address).or_default()
    }
}

impl Repository for InMemoryRepository {
    fn balance(&self, address: &Address) -> u128 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or(0)
    }

    fn set_balance(&mut self, address: &Address, balance: u128) {
        self.entry(address).balance = balance;
    }

    fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.entry(address).nonce = nonce;
    }

    fn code(&self, address: &Address) -> Vec<u8> {
        self.accounts
            .get(address)
            .map(|a| a.code.clone())
            .unwrap_or_default()
    }

    fn set_code(&mut self, address: &Address, code: Vec<u8>) {
        self.entry(address).code = code;
    }

    fn storage(&self, address: &Address, key: &H256) -> Option<H256> {
        self.accounts
            .get(address)
            .and_then(|a| a.storage.get(key).copied())
    }

    fn set_storage(&mut self, address: &Address, key: H256, value: H256) {
        self.entry(address).storage.insert(key, value);
    }

    fn account_exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    fn delete_account(&mut self, address: &Address) {
        self.accounts.remove(address);
    }

    fn block_hash(&self, number: u64) -> H256 {
        self.block_hashes.get(&number).copied().unwrap_or(H256::ZERO)
    }

    fn storage_entries(&self, address: &Address) -> Vec<(H256, H256)> {
        self.accounts
            .get(address)
            .map(|a| a.storage.iter().map(|(k, v)| (*k, *v)).collect())
            .unwrap_or_default()
    }
}

/// A write-buffering overlay over another repository.
///
/// Reads fall through to the parent; writes land in the overlay until
/// [`commit`](RepositoryTrack::commit) applies them or
/// [`rollback`](RepositoryTrack::rollback) discards them. A call frame that
/// halts exceptionally rolls its track back, which is what keeps its
/// storage writes out of the parent state.
pub struct RepositoryTrack<'a> {
    parent: &'a mut dyn Repository,
    balances: HashMap<Address, u128>,
    nonces: HashMap<Address, u64>,
    codes: HashMap<Address, Vec<u8>>,
    storage: HashMap<(Address, H256), H256>,
    deleted: HashSet<Address>,
}

impl<'a> RepositoryTrack<'a> {
    /// Start tracking on top of a parent repository
    pub fn new(parent: &'a mut dyn Repository) -> Self {
        RepositoryTrack {
            parent,
            balances: HashMap::new(),
            nonces: HashMap::new(),
            codes: HashMap::new(),
            storage: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    /// Apply every buffered write to the parent
    pub fn commit(self) {
        for address in &self.deleted {
            self.parent.delete_account(address);
        }
        for (address, balance) in self.balances {
            self.parent.set_balance(&address, balance);
        }
        for (address, nonce) in self.nonces {
            self.parent.set_nonce(&address, nonce);
        }
        for (address, code) in self.codes {
            self.parent.set_code(&address, code);
        }
        for ((address, key), value) in self.storage {
            self.parent.set_storage(&address, key, value);
        }
    }

    /// Discard every buffered write
    pub fn rollback(self) {}

    /// A write to a deleted address recreates it in the overlay
    fn revive(&mut self, address: &Address) {
        self.deleted.remove(address);
    }
}

impl Repository for RepositoryTrack<'_> {
    fn balance(&self, address: &Address) -> u128 {
        if let Some(balance) = self.balances.get(address) {
            return *balance;
        }
        if self.deleted.contains(address) {
            return 0;
        }
        self.parent.balance(address)
    }

    fn set_balance(&mut self, address: &Address, balance: u128) {
        self.revive(address);
        self.balances.insert(*address, balance);
    }

    fn nonce(&self, address: &Address) -> u64 {
        if let Some(nonce) = self.nonces.get(address) {
            return *nonce;
        }
        if self.deleted.contains(address) {
            return 0;
        }
        self.parent.nonce(address)
    }

    fn set_nonce(&mut self, address: &Address, nonce: u64) {
        self.revive(address);
        self.nonces.insert(*address, nonce);
    }

    fn code(&self, address: &Address) -> Vec<u8> {
        if let Some(code) = self.codes.get(address) {
            return code.clone();
        }
        if self.deleted.contains(address) {
            return Vec::new();
        }
        self.parent.code(address)
    }

    fn set_code(&mut self, address: &Address, code: Vec<u8>) {
        self.revive(address);
        self.codes.insert(*address, code);
    }

    fn storage(&self, address: &Address, key: &H256) -> Option<H256> {
        if let Some(value) = self.storage.get(&(*address, *key)) {
            return Some(*value);
        }
        if self.deleted.contains(address) {
            return None;
        }
        self.parent.storage(address, key)
    }

    fn set_storage(&mut self, address: &Address, key: H256, value: H256) {
        self.revive(address);
        self.storage.insert((*address, key), value);
    }

    fn account_exists(&self, address: &Address) -> bool {
        if self.deleted.contains(address) {
            return false;
        }
        self.balances.contains_key(address)
            || self.nonces.contains_key(address)
            || self.codes.contains_key(address)
            || self.parent.account_exists(address)
    }

    fn delete_account(&mut self, address: &Address) {
        self.balances.remove(address);
        self.nonces.remove(address);
        self.codes.remove(address);
        self.storage.retain(|(a, _), _| a != address);
        self.deleted.insert(*address);
    }

    fn block_hash(&self, number: u64) -> H256 {
        self.parent.block_hash(number)
    }

    fn storage_entries(&self, address: &Address) -> Vec<(H256, H256)> {
        let mut entries: std::collections::HashMap<H256, H256> =
            if self.deleted.contains(address) {
                HashMap::new()
            } else {
                self.parent.storage_entries(address).into_iter().collect()
            };
        for ((a, key), value) in &self.storage {
            if a == address {
                entries.insert(*key, *value);
            }
        }
        entries.into_iter().collect()
    }
}

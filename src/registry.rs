//! A concurrent map of bound contract handles.

use std::{any::Any, fmt, hash::Hash, sync::Arc};

use alloy::primitives::{Address, ChainId};
use dashmap::DashMap;

use crate::PollerError;

/// A handle to a contract deployed on a specific chain.
///
/// Typically a generated binding wrapping a provider.
pub trait Contract: Any + Send + Sync {
    fn chain_id(&self) -> ChainId;
    fn address(&self) -> Address;
}

struct Entry {
    address: Address,
    handle: Arc<dyn Any + Send + Sync>,
}

/// Contract handles of one chain, keyed by `K`.
///
/// Clones share the same underlying map.
pub struct ContractRegistry<K = String>
where
    K: Eq + Hash,
{
    chain_id: ChainId,
    contracts: Arc<DashMap<K, Entry>>,
}

impl<K: Eq + Hash> Clone for ContractRegistry<K> {
    fn clone(&self) -> Self {
        Self { chain_id: self.chain_id, contracts: Arc::clone(&self.contracts) }
    }
}

impl<K: Eq + Hash> fmt::Debug for ContractRegistry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractRegistry")
            .field("chain_id", &self.chain_id)
            .field("len", &self.contracts.len())
            .finish()
    }
}

impl<K: Eq + Hash> ContractRegistry<K> {
    #[must_use]
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id, contracts: Arc::new(DashMap::new()) }
    }

    /// The chain every registered contract belongs to.
    #[must_use]
    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    /// Registers `contract` under `key`, replacing any previous handle.
    ///
    /// Returns whether a handle was replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::ChainIdMismatch`] if the contract belongs to another chain.
    pub fn put<T: Contract>(&self, key: K, contract: T) -> Result<bool, PollerError> {
        if contract.chain_id() != self.chain_id {
            return Err(PollerError::ChainIdMismatch {
                expected: self.chain_id,
                actual: contract.chain_id(),
            });
        }

        let entry = Entry { address: contract.address(), handle: Arc::new(contract) };
        Ok(self.contracts.insert(key, entry).is_some())
    }

    /// Returns the handle under `key` if it exists and is a `T`.
    #[must_use]
    pub fn get<T: Contract>(&self, key: &K) -> Option<Arc<T>> {
        let handle = self.contracts.get(key)?.handle.clone();
        handle.downcast::<T>().ok()
    }

    /// Returns the address of the contract under `key`.
    #[must_use]
    pub fn address(&self, key: &K) -> Option<Address> {
        self.contracts.get(key).map(|entry| entry.address)
    }

    /// Removes the handle under `key`, returning whether one was present.
    pub fn remove(&self, key: &K) -> bool {
        self.contracts.remove(key).is_some()
    }

    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.contracts.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

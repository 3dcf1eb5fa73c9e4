//! Pool ownership and recognition.
//!
//! Each vault pool is owned by the vault contract that reports its share
//! balances; the staking pool is owned by the staking contract. Only the
//! owner may checkpoint its pool.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tidal_types::{Address, PoolId, VaultId};

use crate::{Result, RewardsError};

/// Registered collaborators.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborators {
    #[serde_as(as = "Vec<(_, _)>")]
    vaults: BTreeMap<VaultId, Address>,
    staking_owner: Option<Address>,
}

impl Collaborators {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-point) a vault and its owning contract.
    pub fn register_vault(&mut self, vault: VaultId, owner: Address) {
        self.vaults.insert(vault, owner);
    }

    /// Set the staking contract that owns the staking pool.
    pub fn set_staking_owner(&mut self, owner: Address) {
        self.staking_owner = Some(owner);
    }

    /// Whether `vault` is a recognized vault pool.
    pub fn is_vault(&self, vault: &VaultId) -> bool {
        self.vaults.contains_key(vault)
    }

    /// Whether `pool` is recognized.
    pub fn is_valid_pool(&self, pool: &PoolId) -> bool {
        self.owner_of(pool).is_some()
    }

    /// All registered vaults in id order.
    pub fn vaults(&self) -> impl Iterator<Item = &VaultId> {
        self.vaults.keys()
    }

    /// The contract allowed to checkpoint `pool`.
    pub fn owner_of(&self, pool: &PoolId) -> Option<Address> {
        match pool {
            PoolId::Vault(vault) => self.vaults.get(vault).copied(),
            PoolId::Staking => self.staking_owner,
        }
    }

    /// Check that `caller` owns `pool`.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] if the pool is unknown or owned by
    ///   someone else
    pub fn authorize(&self, caller: &Address, pool: &PoolId) -> Result<()> {
        match self.owner_of(pool) {
            Some(owner) if owner == *caller => Ok(()),
            _ => Err(RewardsError::unauthorized(
                caller,
                format!("checkpoint {pool}"),
            )),
        }
    }
}

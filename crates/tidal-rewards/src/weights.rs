//! Weight split and per-vault weights.
//!
//! Emission is divided in two levels:
//!
//! ```text
//! staking pool share = staking_weight / (vaults_weight + staking_weight)
//! vault pool share   = vault_weight / total_vault_weight
//!                    * vaults_weight / (vaults_weight + staking_weight)
//! ```
//!
//! Every setter settles each affected pool under its old ratio before the
//! new ratio takes effect, so emission already accrued is never attributed
//! to the new weights.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tidal_types::events::RewardEvent;
use tidal_types::{PoolId, Timestamp, VaultId};

use crate::accrual::AccrualEngine;
use crate::store::RewardsStore;
use crate::{Result, RewardsError};

/// Top-level vaults vs. staking split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightSplit {
    /// Weight of the vaults aggregate.
    pub vaults_weight: u64,
    /// Weight of the staking aggregate.
    pub staking_weight: u64,
}

impl WeightSplit {
    /// Create a split.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidRatio`] if both weights are zero
    pub fn new(vaults_weight: u64, staking_weight: u64) -> Result<Self> {
        let split = Self {
            vaults_weight,
            staking_weight,
        };
        if split.sum() == 0 {
            return Err(RewardsError::InvalidRatio(
                "vaults and staking weights must not both be zero".to_string(),
            ));
        }
        Ok(split)
    }

    /// Sum of both weights.
    pub fn sum(&self) -> u128 {
        u128::from(self.vaults_weight) + u128::from(self.staking_weight)
    }
}

/// A fraction of the global emission attributed to one pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightRatio {
    /// Pool weight times its aggregate weight.
    pub numerator: u128,
    /// Product of the weight sums at both levels.
    pub denominator: u128,
}

impl WeightRatio {
    /// A pool that receives nothing.
    pub const ZERO: WeightRatio = WeightRatio {
        numerator: 0,
        denominator: 1,
    };

    /// Build a ratio; a zero denominator collapses to [`WeightRatio::ZERO`].
    pub fn new(numerator: u128, denominator: u128) -> Self {
        if denominator == 0 || numerator == 0 {
            return Self::ZERO;
        }
        Self {
            numerator,
            denominator,
        }
    }

    /// `floor(amount * numerator / denominator)`.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::ArithmeticOverflow`] if the result does not fit
    pub fn apply(&self, amount: tidal_types::Amount) -> Result<tidal_types::Amount> {
        crate::math::mul_div(amount, self.numerator, self.denominator)
    }
}

/// The mutable weight configuration.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightRegistry {
    split: WeightSplit,
    #[serde_as(as = "Vec<(_, _)>")]
    vault_weights: BTreeMap<VaultId, u64>,
}

impl WeightRegistry {
    /// Create a registry with the given split and no vault weights.
    pub fn new(split: WeightSplit) -> Self {
        Self {
            split,
            vault_weights: BTreeMap::new(),
        }
    }

    /// The current vaults/staking split.
    pub fn split(&self) -> WeightSplit {
        self.split
    }

    /// Weight of one vault (zero if never set).
    pub fn vault_weight(&self, vault: &VaultId) -> u64 {
        self.vault_weights.get(vault).copied().unwrap_or(0)
    }

    /// All configured vault weights.
    pub fn vault_weights(&self) -> impl Iterator<Item = (&VaultId, &u64)> {
        self.vault_weights.iter()
    }

    /// Sum of all vault weights.
    pub fn total_vault_weight(&self) -> u128 {
        self.vault_weights.values().map(|w| u128::from(*w)).sum()
    }

    /// Effective share of the global emission for `pool`.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::ArithmeticOverflow`] if the denominator overflows
    pub fn ratio_for(&self, pool: &PoolId) -> Result<WeightRatio> {
        let split_sum = self.split.sum();
        match pool {
            PoolId::Staking => Ok(WeightRatio::new(
                u128::from(self.split.staking_weight),
                split_sum,
            )),
            PoolId::Vault(vault) => {
                let numerator = u128::from(self.vault_weight(vault))
                    * u128::from(self.split.vaults_weight);
                let denominator = self
                    .total_vault_weight()
                    .checked_mul(split_sum)
                    .ok_or(RewardsError::ArithmeticOverflow)?;
                Ok(WeightRatio::new(numerator, denominator))
            }
        }
    }

    /// Change the vaults/staking split.
    ///
    /// Settles every existing pool whose ratio changes before the new split
    /// is stored.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidRatio`] if both weights are zero
    /// - Any error from settling the affected pools; the registry is left
    ///   unchanged in that case
    pub fn set_split<S: RewardsStore>(
        &mut self,
        engine: &mut AccrualEngine<S>,
        vaults_weight: u64,
        staking_weight: u64,
        now: Timestamp,
    ) -> Result<()> {
        let split = WeightSplit::new(vaults_weight, staking_weight)?;
        let next = Self {
            split,
            vault_weights: self.vault_weights.clone(),
        };
        self.replace(engine, next, now)?;

        tracing::info!(vaults_weight, staking_weight, "weight split updated");
        engine.emit(RewardEvent::SplitUpdated {
            vaults_weight,
            staking_weight,
        });
        Ok(())
    }

    /// Set the weights of the given vaults.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidInput`] if the slices are empty or differ in length
    /// - [`RewardsError::InvalidPool`] if a vault is not registered
    /// - Any error from settling the affected pools; the registry is left
    ///   unchanged in that case
    pub fn set_vault_weights<S: RewardsStore>(
        &mut self,
        engine: &mut AccrualEngine<S>,
        vaults: &[VaultId],
        weights: &[u64],
        now: Timestamp,
    ) -> Result<()> {
        if vaults.is_empty() {
            return Err(RewardsError::InvalidInput(
                "at least one vault weight is required".to_string(),
            ));
        }
        if vaults.len() != weights.len() {
            return Err(RewardsError::InvalidInput(format!(
                "{} vaults but {} weights",
                vaults.len(),
                weights.len()
            )));
        }
        if let Some(unknown) = vaults.iter().find(|v| !engine.directory().is_vault(v)) {
            return Err(RewardsError::InvalidPool(PoolId::Vault(*unknown)));
        }

        let mut next = self.clone();
        for (vault, weight) in vaults.iter().zip(weights) {
            next.vault_weights.insert(*vault, *weight);
        }
        self.replace(engine, next, now)?;

        tracing::info!(
            count = vaults.len(),
            total = %self.total_vault_weight(),
            "vault weights updated"
        );
        engine.emit(RewardEvent::VaultWeightsUpdated {
            vaults: vaults.to_vec(),
            weights: weights.to_vec(),
        });
        Ok(())
    }

    /// Settle every pool whose ratio differs under `next`, then adopt `next`.
    fn replace<S: RewardsStore>(
        &mut self,
        engine: &mut AccrualEngine<S>,
        next: WeightRegistry,
        now: Timestamp,
    ) -> Result<()> {
        let mut updates = Vec::new();
        for state in engine.pool_states()? {
            let ratio = next.ratio_for(&state.pool)?;
            if ratio != state.ratio() {
                updates.push((state.pool, ratio));
            }
        }
        engine.checkpoint_pools(&updates, now)?;
        *self = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidal_types::Address;

    fn vault(byte: u8) -> VaultId {
        VaultId(Address::repeat(byte))
    }

    #[test]
    fn test_split_rejects_zero_sum() {
        assert!(matches!(
            WeightSplit::new(0, 0),
            Err(RewardsError::InvalidRatio(_))
        ));
        assert!(WeightSplit::new(0, 1).is_ok());
    }

    #[test]
    fn test_staking_ratio() {
        let registry = WeightRegistry::new(WeightSplit::new(100, 50).expect("split"));
        assert_eq!(
            registry.ratio_for(&PoolId::Staking).expect("ratio"),
            WeightRatio::new(50, 150)
        );
    }

    #[test]
    fn test_vault_ratio_combines_levels() {
        let mut registry = WeightRegistry::new(WeightSplit::new(100, 50).expect("split"));
        registry.vault_weights.insert(vault(1), 100);
        registry.vault_weights.insert(vault(2), 50);

        let ratio = registry.ratio_for(&PoolId::Vault(vault(1))).expect("ratio");
        assert_eq!(ratio, WeightRatio::new(100 * 100, 150 * 150));
        assert_eq!(ratio.apply(22_500).expect("apply"), 10_000);
    }

    #[test]
    fn test_zero_weight_vault_gets_nothing() {
        let mut registry = WeightRegistry::new(WeightSplit::new(1, 1).expect("split"));
        registry.vault_weights.insert(vault(1), 0);
        assert_eq!(
            registry.ratio_for(&PoolId::Vault(vault(1))).expect("ratio"),
            WeightRatio::ZERO
        );
        assert_eq!(
            registry.ratio_for(&PoolId::Vault(vault(9))).expect("ratio"),
            WeightRatio::ZERO
        );
    }

    #[test]
    fn test_ratio_zero_denominator_collapses() {
        assert_eq!(WeightRatio::new(5, 0), WeightRatio::ZERO);
        assert_eq!(WeightRatio::ZERO.apply(1_000).expect("apply"), 0);
    }

    #[test]
    fn test_registry_json_round_trip() {
        let mut registry = WeightRegistry::new(WeightSplit::new(3, 1).expect("split"));
        registry.vault_weights.insert(vault(7), 42);
        let json = serde_json::to_string(&registry).expect("serialize");
        let parsed: WeightRegistry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, registry);
    }
}

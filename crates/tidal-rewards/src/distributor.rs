//! Governance-facing facade.
//!
//! [`RewardsDistributor`] owns the accrual engine, the weight registry and
//! the claim processor, gates administrative calls on the governance
//! address, and persists the governance state after every change so a
//! restarted process resumes with the same weights, collaborators, funding
//! wallet and pause flag.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tidal_emission::{EmissionSchedule, EpochClock};
use tidal_types::events::RewardEvent;
use tidal_types::{Address, Amount, Beneficiary, PoolId, StakeId, Timestamp, VaultId};

use crate::accrual::{AccrualEngine, Checkpoint};
use crate::claims::{ClaimProcessor, ClaimReceipt, ClaimRequest, ShareProvider, TokenTransfer};
use crate::directory::Collaborators;
use crate::ledger::{ClaimKey, Shares};
use crate::pool::PoolState;
use crate::store::{RewardsStore, WriteBatch};
use crate::weights::WeightRegistry;
use crate::{math, Result, RewardsError};

/// Everything an administrator can change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovernanceState {
    /// The governance address.
    pub admin: Address,
    pub registry: WeightRegistry,
    pub collaborators: Collaborators,
    /// Wallet that pays claims.
    pub funding_wallet: Address,
    pub claims_paused: bool,
}

/// Unclaimed balance of one beneficiary in one pool.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnclaimedEntry {
    pub pool: PoolId,
    pub beneficiary: Beneficiary,
    #[serde_as(as = "DisplayFromStr")]
    pub unclaimed: Amount,
}

/// Result of an unclaimed-rewards query.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardsSummary {
    pub entries: Vec<UnclaimedEntry>,
    #[serde_as(as = "DisplayFromStr")]
    pub total_unclaimed: Amount,
}

impl RewardsSummary {
    fn push(&mut self, entry: UnclaimedEntry) -> Result<()> {
        self.total_unclaimed = math::add(self.total_unclaimed, entry.unclaimed)?;
        self.entries.push(entry);
        Ok(())
    }
}

/// Credited balance plus what a checkpoint now would add.
#[serde_as]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRewards {
    /// Credited and not yet claimed.
    #[serde_as(as = "DisplayFromStr")]
    pub unclaimed: Amount,
    /// Not yet checkpointed.
    #[serde_as(as = "DisplayFromStr")]
    pub pending: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub total: Amount,
}

/// Rewards engine with governance.
pub struct RewardsDistributor<S> {
    engine: AccrualEngine<S>,
    registry: WeightRegistry,
    claims: ClaimProcessor,
    admin: Address,
}

impl<S: RewardsStore> RewardsDistributor<S> {
    /// Open a distributor over `store`.
    ///
    /// A governance state already persisted in `store` wins over `initial`;
    /// otherwise `initial` is persisted.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Store`] if the store cannot be read or written
    pub fn open(clock: EpochClock, mut store: S, initial: GovernanceState) -> Result<Self> {
        let governance = match store.governance_state()? {
            Some(persisted) => {
                tracing::info!(admin = %persisted.admin, "governance state restored");
                persisted
            }
            None => {
                store.apply(WriteBatch {
                    governance: Some(initial.clone()),
                    ..WriteBatch::default()
                })?;
                tracing::info!(admin = %initial.admin, "governance state initialised");
                initial
            }
        };

        Ok(Self {
            engine: AccrualEngine::new(clock, store, governance.collaborators),
            registry: governance.registry,
            claims: ClaimProcessor::new(governance.funding_wallet, governance.claims_paused),
            admin: governance.admin,
        })
    }

    pub fn engine(&self) -> &AccrualEngine<S> {
        &self.engine
    }

    pub fn registry(&self) -> &WeightRegistry {
        &self.registry
    }

    pub fn collaborators(&self) -> &Collaborators {
        self.engine.directory()
    }

    pub fn admin(&self) -> Address {
        self.admin
    }

    pub fn funding_wallet(&self) -> Address {
        self.claims.funding_wallet()
    }

    pub fn claims_paused(&self) -> bool {
        self.claims.is_paused()
    }

    pub fn schedule(&self) -> &EmissionSchedule {
        self.engine.clock().schedule()
    }

    /// Snapshot of the governance state.
    pub fn governance(&self) -> GovernanceState {
        GovernanceState {
            admin: self.admin,
            registry: self.registry.clone(),
            collaborators: self.engine.directory().clone(),
            funding_wallet: self.claims.funding_wallet(),
            claims_paused: self.claims.is_paused(),
        }
    }

    // ---- Collaborator surface ----

    /// See [`AccrualEngine::checkpoint`].
    ///
    /// # Errors
    ///
    /// Same as [`AccrualEngine::checkpoint`].
    pub fn checkpoint(
        &mut self,
        caller: &Address,
        pool: &PoolId,
        beneficiary: &Beneficiary,
        shares: Shares,
        now: Timestamp,
    ) -> Result<Checkpoint> {
        self.engine
            .checkpoint(&self.registry, caller, pool, beneficiary, shares, now)
    }

    // ---- Claims ----

    /// Claim a single pool.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidInput`] unless exactly one pool is requested
    /// - Same as [`ClaimProcessor::claim`]
    pub fn claim<P, T>(
        &mut self,
        provider: &P,
        transfer: &mut T,
        request: &ClaimRequest,
        now: Timestamp,
    ) -> Result<Option<ClaimReceipt>>
    where
        P: ShareProvider + ?Sized,
        T: TokenTransfer + ?Sized,
    {
        if request.pools.len() != 1 {
            return Err(RewardsError::InvalidInput(format!(
                "claim takes exactly one pool, got {}",
                request.pools.len()
            )));
        }
        let receipts = self.claim_many(provider, transfer, request, now)?;
        Ok(receipts.into_iter().next())
    }

    /// Claim several pools.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidInput`] if no pool is requested
    /// - Same as [`ClaimProcessor::claim`]
    pub fn claim_many<P, T>(
        &mut self,
        provider: &P,
        transfer: &mut T,
        request: &ClaimRequest,
        now: Timestamp,
    ) -> Result<Vec<ClaimReceipt>>
    where
        P: ShareProvider + ?Sized,
        T: TokenTransfer + ?Sized,
    {
        if request.pools.is_empty() {
            return Err(RewardsError::InvalidInput(
                "at least one pool is required".to_string(),
            ));
        }
        self.claims
            .claim(&mut self.engine, &self.registry, provider, transfer, request, now)
    }

    /// Claim every pool the beneficiary can hold rewards in.
    ///
    /// For a depositor that is every registered vault plus any pool it
    /// already has a record in; for a stake position it is the staking pool.
    ///
    /// # Errors
    ///
    /// Same as [`ClaimProcessor::claim`].
    pub fn claim_all<P, T>(
        &mut self,
        provider: &P,
        transfer: &mut T,
        caller: Address,
        beneficiary: Beneficiary,
        destination: Address,
        now: Timestamp,
    ) -> Result<Vec<ClaimReceipt>>
    where
        P: ShareProvider + ?Sized,
        T: TokenTransfer + ?Sized,
    {
        let request = ClaimRequest {
            caller,
            pools: self.pools_for(&beneficiary)?,
            beneficiary,
            destination,
        };
        self.claims
            .claim(&mut self.engine, &self.registry, provider, transfer, &request, now)
    }

    fn pools_for(&self, beneficiary: &Beneficiary) -> Result<Vec<PoolId>> {
        match beneficiary {
            Beneficiary::Stake(_) => Ok(vec![PoolId::Staking]),
            Beneficiary::Depositor(_) => {
                let mut pools: BTreeSet<PoolId> = self
                    .engine
                    .directory()
                    .vaults()
                    .map(|vault| PoolId::Vault(*vault))
                    .collect();
                for (pool, _) in self.engine.claim_records_for(beneficiary)? {
                    pools.insert(pool);
                }
                Ok(pools.into_iter().collect())
            }
        }
    }

    // ---- Queries ----

    /// Unclaimed balances of a depositor across `vaults`.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidPool`] for an unregistered vault
    pub fn unclaimed_vault_rewards(
        &self,
        depositor: &Address,
        vaults: &[VaultId],
    ) -> Result<RewardsSummary> {
        let beneficiary = Beneficiary::Depositor(*depositor);
        let mut summary = RewardsSummary::default();
        for vault in vaults {
            let pool = PoolId::Vault(*vault);
            if !self.engine.directory().is_vault(vault) {
                return Err(RewardsError::InvalidPool(pool));
            }
            summary.push(self.unclaimed_entry(pool, beneficiary)?)?;
        }
        Ok(summary)
    }

    /// Unclaimed balances of stake positions.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Store`] if the store cannot be read
    pub fn unclaimed_staking_rewards(&self, stakes: &[StakeId]) -> Result<RewardsSummary> {
        let mut summary = RewardsSummary::default();
        for stake in stakes {
            summary.push(self.unclaimed_entry(PoolId::Staking, Beneficiary::Stake(*stake))?)?;
        }
        Ok(summary)
    }

    /// Every non-zero unclaimed balance of `beneficiary`.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Store`] if the store cannot be read
    pub fn all_unclaimed_rewards(&self, beneficiary: &Beneficiary) -> Result<RewardsSummary> {
        let mut summary = RewardsSummary::default();
        for (pool, record) in self.engine.claim_records_for(beneficiary)? {
            if record.unclaimed() == 0 {
                continue;
            }
            summary.push(UnclaimedEntry {
                pool,
                beneficiary: *beneficiary,
                unclaimed: record.unclaimed(),
            })?;
        }
        Ok(summary)
    }

    fn unclaimed_entry(&self, pool: PoolId, beneficiary: Beneficiary) -> Result<UnclaimedEntry> {
        let record = self.engine.claim_record(&ClaimKey::new(pool, beneficiary))?;
        Ok(UnclaimedEntry {
            pool,
            beneficiary,
            unclaimed: record.unclaimed(),
        })
    }

    /// Accrual state of `pool`, or `None` if it has never been checkpointed.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidPool`] if the pool is not recognized
    pub fn pool_rewards_state(&self, pool: &PoolId) -> Result<Option<PoolState>> {
        if !self.engine.directory().is_valid_pool(pool) {
            return Err(RewardsError::InvalidPool(*pool));
        }
        self.engine.pool_state(pool)
    }

    /// Credited plus projected rewards if the beneficiary checkpointed now.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidPool`] if the pool is not recognized
    /// - [`RewardsError::InvalidInput`] if the categories differ or `share > total`
    pub fn pending_rewards(
        &self,
        pool: &PoolId,
        beneficiary: &Beneficiary,
        shares: Shares,
        now: Timestamp,
    ) -> Result<PendingRewards> {
        if !self.engine.directory().is_valid_pool(pool) {
            return Err(RewardsError::InvalidPool(*pool));
        }
        if beneficiary.category() != pool.category() {
            return Err(RewardsError::InvalidInput(format!(
                "beneficiary {beneficiary} does not belong to pool {pool}"
            )));
        }
        let unclaimed = self
            .engine
            .claim_record(&ClaimKey::new(*pool, *beneficiary))?
            .unclaimed();
        let pending = self.engine.pending(pool, shares, now)?;
        Ok(PendingRewards {
            unclaimed,
            pending,
            total: math::add(unclaimed, pending)?,
        })
    }

    /// Per-epoch rate and 1-based epoch index at `now`.
    pub fn current_rate(&self, now: Timestamp) -> (Amount, u64) {
        self.engine.clock().rate(now)
    }

    // ---- Administration ----

    /// A zero admin address disables every administrative call.
    fn require_admin(&self, caller: &Address, action: &str) -> Result<()> {
        if self.admin.is_zero() || *caller != self.admin {
            return Err(RewardsError::unauthorized(caller, action));
        }
        Ok(())
    }

    fn persist_governance(&mut self) -> Result<()> {
        let governance = self.governance();
        self.engine.store_mut().apply(WriteBatch {
            governance: Some(governance),
            ..WriteBatch::default()
        })
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] unless `caller` is the admin
    /// - Same as [`WeightRegistry::set_split`]
    pub fn set_split(
        &mut self,
        caller: &Address,
        vaults_weight: u64,
        staking_weight: u64,
        now: Timestamp,
    ) -> Result<()> {
        self.require_admin(caller, "set split")?;
        self.registry
            .set_split(&mut self.engine, vaults_weight, staking_weight, now)?;
        self.persist_governance()
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] unless `caller` is the admin
    /// - Same as [`WeightRegistry::set_vault_weights`]
    pub fn set_vault_weights(
        &mut self,
        caller: &Address,
        vaults: &[VaultId],
        weights: &[u64],
        now: Timestamp,
    ) -> Result<()> {
        self.require_admin(caller, "set vault weights")?;
        self.registry
            .set_vault_weights(&mut self.engine, vaults, weights, now)?;
        self.persist_governance()
    }

    /// Recognize a vault pool and the contract that checkpoints it.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] unless `caller` is the admin
    /// - [`RewardsError::InvalidInput`] for a zero vault or owner address
    pub fn register_vault(&mut self, caller: &Address, vault: VaultId, owner: Address) -> Result<()> {
        self.require_admin(caller, "register vault")?;
        if vault.0.is_zero() || owner.is_zero() {
            return Err(RewardsError::InvalidInput(
                "vault and owner must be non-zero addresses".to_string(),
            ));
        }
        self.engine.directory_mut().register_vault(vault, owner);
        self.persist_governance()?;
        tracing::info!(%vault, %owner, "vault registered");
        self.engine.emit(RewardEvent::VaultRegistered { vault, owner });
        Ok(())
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] unless `caller` is the admin
    /// - [`RewardsError::InvalidInput`] for a zero owner address
    pub fn set_staking_owner(&mut self, caller: &Address, owner: Address) -> Result<()> {
        self.require_admin(caller, "set staking owner")?;
        if owner.is_zero() {
            return Err(RewardsError::InvalidInput(
                "staking owner must be a non-zero address".to_string(),
            ));
        }
        self.engine.directory_mut().set_staking_owner(owner);
        self.persist_governance()?;
        tracing::info!(%owner, "staking owner set");
        self.engine.emit(RewardEvent::StakingOwnerUpdated { owner });
        Ok(())
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] unless `caller` is the admin
    pub fn pause_claims(&mut self, caller: &Address) -> Result<()> {
        self.require_admin(caller, "pause claims")?;
        self.claims.pause();
        self.persist_governance()?;
        self.engine.emit(RewardEvent::ClaimsPaused);
        Ok(())
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] unless `caller` is the admin
    pub fn unpause_claims(&mut self, caller: &Address) -> Result<()> {
        self.require_admin(caller, "unpause claims")?;
        self.claims.resume();
        self.persist_governance()?;
        self.engine.emit(RewardEvent::ClaimsUnpaused);
        Ok(())
    }

    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] unless `caller` is the admin
    /// - [`RewardsError::InvalidInput`] for the zero address
    pub fn set_funding_wallet(&mut self, caller: &Address, wallet: Address) -> Result<()> {
        self.require_admin(caller, "set funding wallet")?;
        if wallet.is_zero() {
            return Err(RewardsError::InvalidInput(
                "funding wallet must be a non-zero address".to_string(),
            ));
        }
        self.claims.set_funding_wallet(wallet);
        self.persist_governance()?;
        self.engine.emit(RewardEvent::FundingWalletUpdated { wallet });
        Ok(())
    }

    /// Take every event queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<RewardEvent> {
        self.engine.drain_events()
    }
}

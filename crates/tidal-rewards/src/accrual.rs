//! The accrual engine.
//!
//! Collaborators call [`AccrualEngine::checkpoint`] before every share
//! mutation. The engine settles the pool's elapsed window under the ratio
//! stored with the pool, credits the beneficiary's proportional part of that
//! window, and commits the pool state and claim record as one batch.
//!
//! A window is consumed by whoever checkpoints it: beneficiaries that do not
//! checkpoint at that moment receive nothing from it. A window settled by a
//! reweight has no beneficiary, so the pool carries it until the next
//! checkpoint with a non-zero share.

use tidal_emission::EpochClock;
use tidal_types::events::RewardEvent;
use tidal_types::{Address, Amount, Beneficiary, PoolId, Timestamp};

use crate::directory::Collaborators;
use crate::ledger::{ClaimKey, ClaimRecord, Shares};
use crate::pool::PoolState;
use crate::store::{RewardsStore, WriteBatch};
use crate::weights::{WeightRatio, WeightRegistry};
use crate::{math, Result, RewardsError};

/// Outcome of a single checkpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// Units added to the pool's running total.
    pub pool_delta: Amount,
    /// Units credited to the beneficiary.
    pub beneficiary_delta: Amount,
}

/// Checkpoint-based accrual over a [`RewardsStore`].
pub struct AccrualEngine<S> {
    clock: EpochClock,
    store: S,
    directory: Collaborators,
    events: Vec<RewardEvent>,
}

impl<S: RewardsStore> AccrualEngine<S> {
    pub fn new(clock: EpochClock, store: S, directory: Collaborators) -> Self {
        Self {
            clock,
            store,
            directory,
            events: Vec::new(),
        }
    }

    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn directory(&self) -> &Collaborators {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut Collaborators {
        &mut self.directory
    }

    /// Settle `pool` up to `now` and credit `beneficiary` with its part.
    ///
    /// Only the collaborator that owns `pool` may call this. `shares` are the
    /// balances in force *before* the caller's pending mutation.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Unauthorized`] if `caller` does not own `pool`
    /// - [`RewardsError::InvalidInput`] if the beneficiary belongs to the
    ///   other category or `share > total`
    /// - [`RewardsError::ArithmeticOverflow`] on overflow; nothing is written
    pub fn checkpoint(
        &mut self,
        registry: &WeightRegistry,
        caller: &Address,
        pool: &PoolId,
        beneficiary: &Beneficiary,
        shares: Shares,
        now: Timestamp,
    ) -> Result<Checkpoint> {
        self.directory.authorize(caller, pool)?;
        self.settle(registry, pool, beneficiary, shares, now)
    }

    /// Checkpoint without the ownership check. Used by the claim path, which
    /// reads shares from a trusted [`crate::claims::ShareProvider`].
    pub(crate) fn settle(
        &mut self,
        registry: &WeightRegistry,
        pool: &PoolId,
        beneficiary: &Beneficiary,
        shares: Shares,
        now: Timestamp,
    ) -> Result<Checkpoint> {
        if !self.directory.is_valid_pool(pool) {
            return Err(RewardsError::InvalidPool(*pool));
        }
        if beneficiary.category() != pool.category() {
            return Err(RewardsError::InvalidInput(format!(
                "beneficiary {beneficiary} does not belong to pool {pool}"
            )));
        }
        shares.validate()?;

        let (mut state, opened) = match self.store.pool_state(pool)? {
            Some(state) => (state, false),
            None => {
                let ratio = registry.ratio_for(pool)?;
                let state = PoolState::open(*pool, ratio, self.clock.schedule().start, now);
                tracing::debug!(%pool, since = state.last_checkpoint_time, "pool opened");
                (state, true)
            }
        };

        let carries = state.unattributed > 0 && shares.share > 0;
        if !state.has_window(now) && !carries {
            if opened {
                self.store.apply(WriteBatch {
                    pools: vec![state],
                    ..WriteBatch::default()
                })?;
            }
            tracing::debug!(%pool, %beneficiary, now, "checkpoint without elapsed window");
            return Ok(Checkpoint::default());
        }

        let since = state.last_checkpoint_time;
        let pool_delta = state.advance(&self.clock, now)?;
        let carried = if shares.share > 0 {
            state.take_unattributed()
        } else {
            0
        };
        let beneficiary_delta = shares.portion_of(math::add(carried, pool_delta)?)?;

        let mut batch = WriteBatch {
            pools: vec![state],
            ..WriteBatch::default()
        };
        if beneficiary_delta > 0 {
            let key = ClaimKey::new(*pool, *beneficiary);
            let mut record = self.claim_record(&key)?;
            record.credit(beneficiary_delta)?;
            batch.claims.push((key, record));
        }
        self.store.apply(batch)?;

        tracing::trace!(
            %pool,
            %beneficiary,
            since,
            now,
            share = %shares.share,
            total = %shares.total,
            pool_delta = %pool_delta,
            carried = %carried,
            beneficiary_delta = %beneficiary_delta,
            "checkpoint settled"
        );
        self.emit(RewardEvent::RewardsDistributed {
            pool: *pool,
            beneficiary: *beneficiary,
            beneficiary_delta,
            pool_delta,
        });

        Ok(Checkpoint {
            pool_delta,
            beneficiary_delta,
        })
    }

    /// Settle one existing pool under its stored ratio and store `ratio` for
    /// the next window. The delta is carried for the next beneficiary
    /// checkpoint and returned; an unopened pool is skipped and yields zero.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::ArithmeticOverflow`] on overflow; nothing is written
    pub fn checkpoint_pool(
        &mut self,
        pool: &PoolId,
        ratio: WeightRatio,
        now: Timestamp,
    ) -> Result<Amount> {
        let settled = self.checkpoint_pools(&[(*pool, ratio)], now)?;
        Ok(settled.first().map(|(_, delta)| *delta).unwrap_or(0))
    }

    /// Settle several pools and store their new ratios in one batch.
    ///
    /// A stale `now` settles nothing but still stores the new ratio.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::ArithmeticOverflow`] on overflow; nothing is written
    pub(crate) fn checkpoint_pools(
        &mut self,
        updates: &[(PoolId, WeightRatio)],
        now: Timestamp,
    ) -> Result<Vec<(PoolId, Amount)>> {
        let mut batch = WriteBatch::default();
        let mut settled = Vec::with_capacity(updates.len());
        for (pool, ratio) in updates {
            let Some(mut state) = self.store.pool_state(pool)? else {
                tracing::debug!(%pool, "reweight skipped for unopened pool");
                continue;
            };
            let delta = state.defer(&self.clock, now)?;
            state.set_ratio(*ratio);
            settled.push((*pool, delta));
            batch.pools.push(state);
        }
        if batch.is_empty() {
            return Ok(settled);
        }
        self.store.apply(batch)?;

        for (pool, delta) in &settled {
            let ratio = updates
                .iter()
                .find(|(p, _)| p == pool)
                .map(|(_, r)| *r)
                .unwrap_or(WeightRatio::ZERO);
            tracing::info!(
                %pool,
                pool_delta = %delta,
                numerator = %ratio.numerator,
                denominator = %ratio.denominator,
                "pool reweighted"
            );
            self.emit(RewardEvent::PoolReweighted {
                pool: *pool,
                pool_delta: *delta,
                weight_numerator: ratio.numerator,
                weight_denominator: ratio.denominator,
            });
        }
        Ok(settled)
    }

    /// What a checkpoint at `now` would credit, without writing anything.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidInput`] if `share > total`
    /// - [`RewardsError::ArithmeticOverflow`] on overflow
    pub fn pending(&self, pool: &PoolId, shares: Shares, now: Timestamp) -> Result<Amount> {
        shares.validate()?;
        match self.store.pool_state(pool)? {
            Some(state) if shares.share > 0 => shares.portion_of(state.attributable(&self.clock, now)?),
            Some(_) => Ok(0),
            None => Ok(0),
        }
    }

    /// State of one pool, if opened.
    pub fn pool_state(&self, pool: &PoolId) -> Result<Option<PoolState>> {
        self.store.pool_state(pool)
    }

    /// Every opened pool.
    pub fn pool_states(&self) -> Result<Vec<PoolState>> {
        self.store.pool_states()
    }

    /// A claim record; an absent record reads as all zeros.
    pub fn claim_record(&self, key: &ClaimKey) -> Result<ClaimRecord> {
        Ok(self.store.claim_record(key)?.unwrap_or_default())
    }

    /// Every claim record of `beneficiary`.
    pub fn claim_records_for(&self, beneficiary: &Beneficiary) -> Result<Vec<(PoolId, ClaimRecord)>> {
        self.store.claim_records_for(beneficiary)
    }

    pub(crate) fn write_claim(&mut self, key: ClaimKey, record: ClaimRecord) -> Result<()> {
        self.store.apply(WriteBatch {
            claims: vec![(key, record)],
            ..WriteBatch::default()
        })
    }

    /// Queue an event for the caller to publish.
    pub fn emit(&mut self, event: RewardEvent) {
        self.events.push(event);
    }

    /// Take every event queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<RewardEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::weights::WeightSplit;
    use proptest::prelude::*;
    use tidal_emission::EmissionSchedule;
    use tidal_types::{StakeId, VaultId};

    const START: Timestamp = 1_000;

    struct Fixture {
        engine: AccrualEngine<MemoryStore>,
        registry: WeightRegistry,
        vault: VaultId,
        owner: Address,
        staking: Address,
    }

    // 1000 units per 100-second epoch, split 1/1, one vault of weight 1.
    fn fixture() -> Fixture {
        let clock = EpochClock::new(
            EmissionSchedule::new(START, START + 10_000, 100, 1_000).expect("schedule"),
        )
        .expect("clock");
        let vault = VaultId(Address::repeat(0xaa));
        let owner = Address::repeat(0x01);
        let staking = Address::repeat(0x02);
        let mut directory = Collaborators::new();
        directory.register_vault(vault, owner);
        directory.set_staking_owner(staking);

        let mut engine = AccrualEngine::new(clock, MemoryStore::new(), directory);
        let mut registry = WeightRegistry::new(WeightSplit::new(1, 1).expect("split"));
        registry
            .set_vault_weights(&mut engine, &[vault], &[1], START)
            .expect("weights");
        engine.drain_events();
        Fixture {
            engine,
            registry,
            vault,
            owner,
            staking,
        }
    }

    fn depositor(byte: u8) -> Beneficiary {
        Beneficiary::Depositor(Address::repeat(byte))
    }

    #[test]
    fn test_first_checkpoint_opens_pool() {
        let mut f = fixture();
        let pool = PoolId::Vault(f.vault);
        let result = f
            .engine
            .checkpoint(&f.registry, &f.owner, &pool, &depositor(7), Shares::ZERO, START + 30)
            .expect("checkpoint");
        assert_eq!(result, Checkpoint::default());

        let state = f.engine.pool_state(&pool).expect("read").expect("opened");
        assert_eq!(state.last_checkpoint_time, START + 30);
        assert_eq!(state.ratio(), WeightRatio::new(1, 2));
        assert!(f.engine.drain_events().is_empty());
    }

    #[test]
    fn test_checkpoint_before_start_opens_at_start() {
        let mut f = fixture();
        f.engine
            .checkpoint(&f.registry, &f.staking, &PoolId::Staking, &Beneficiary::Stake(StakeId(1)), Shares::ZERO, 10)
            .expect("checkpoint");
        let state = f
            .engine
            .pool_state(&PoolId::Staking)
            .expect("read")
            .expect("opened");
        assert_eq!(state.last_checkpoint_time, START);
    }

    #[test]
    fn test_checkpoint_credits_share() {
        let mut f = fixture();
        let pool = PoolId::Vault(f.vault);
        let alice = depositor(7);
        f.engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::ZERO, START)
            .expect("open");

        let result = f
            .engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::new(1, 3), START + 50)
            .expect("checkpoint");
        assert_eq!(result.pool_delta, 250);
        assert_eq!(result.beneficiary_delta, 83);

        let record = f
            .engine
            .claim_record(&ClaimKey::new(pool, alice))
            .expect("record");
        assert_eq!(record.total_available, 83);
        assert_eq!(record.total_claimed, 0);

        let events = f.engine.drain_events();
        assert_eq!(
            events,
            vec![RewardEvent::RewardsDistributed {
                pool,
                beneficiary: alice,
                beneficiary_delta: 83,
                pool_delta: 250,
            }]
        );
    }

    #[test]
    fn test_checkpoint_idempotent_at_same_time() {
        let mut f = fixture();
        let pool = PoolId::Vault(f.vault);
        let alice = depositor(7);
        f.engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::ZERO, START)
            .expect("open");
        f.engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::new(1, 1), START + 40)
            .expect("first");
        let state = f.engine.pool_state(&pool).expect("read");
        let record = f.engine.claim_record(&ClaimKey::new(pool, alice)).expect("record");
        f.engine.drain_events();

        let again = f
            .engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::new(1, 1), START + 40)
            .expect("second");
        assert_eq!(again, Checkpoint::default());
        assert_eq!(f.engine.pool_state(&pool).expect("read"), state);
        assert_eq!(
            f.engine.claim_record(&ClaimKey::new(pool, alice)).expect("record"),
            record
        );
        assert!(f.engine.drain_events().is_empty());
    }

    #[test]
    fn test_unauthorized_caller_rejected() {
        let mut f = fixture();
        let err = f
            .engine
            .checkpoint(
                &f.registry,
                &f.staking,
                &PoolId::Vault(f.vault),
                &depositor(7),
                Shares::ZERO,
                START,
            )
            .expect_err("staking owner may not checkpoint a vault");
        assert!(matches!(err, RewardsError::Unauthorized { .. }));
        assert!(f.engine.pool_states().expect("read").is_empty());
    }

    #[test]
    fn test_category_mismatch_rejected() {
        let mut f = fixture();
        let err = f
            .engine
            .checkpoint(
                &f.registry,
                &f.staking,
                &PoolId::Staking,
                &depositor(7),
                Shares::ZERO,
                START,
            )
            .expect_err("depositor in staking pool");
        assert!(matches!(err, RewardsError::InvalidInput(_)));
    }

    #[test]
    fn test_share_above_total_rejected() {
        let mut f = fixture();
        let err = f
            .engine
            .checkpoint(
                &f.registry,
                &f.owner,
                &PoolId::Vault(f.vault),
                &depositor(7),
                Shares::new(5, 4),
                START,
            )
            .expect_err("share above total");
        assert!(matches!(err, RewardsError::InvalidInput(_)));
    }

    #[test]
    fn test_overflow_fails_closed() {
        let mut f = fixture();
        let pool = PoolId::Vault(f.vault);
        let alice = depositor(7);
        f.engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::ZERO, START)
            .expect("open");
        f.engine
            .write_claim(
                ClaimKey::new(pool, alice),
                ClaimRecord {
                    total_available: Amount::MAX,
                    total_claimed: 0,
                },
            )
            .expect("seed");
        let before = f.engine.pool_state(&pool).expect("read");

        let err = f
            .engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::new(1, 1), START + 10)
            .expect_err("credit overflows");
        assert_eq!(err, RewardsError::ArithmeticOverflow);
        assert_eq!(f.engine.pool_state(&pool).expect("read"), before);
        assert!(f.engine.drain_events().is_empty());
    }

    #[test]
    fn test_pending_matches_checkpoint() {
        let mut f = fixture();
        let pool = PoolId::Staking;
        let stake = Beneficiary::Stake(StakeId(4));
        f.engine
            .checkpoint(&f.registry, &f.staking, &pool, &stake, Shares::ZERO, START)
            .expect("open");

        let shares = Shares::new(2, 7);
        let pending = f.engine.pending(&pool, shares, START + 777).expect("pending");
        let result = f
            .engine
            .checkpoint(&f.registry, &f.staking, &pool, &stake, shares, START + 777)
            .expect("checkpoint");
        assert_eq!(pending, result.beneficiary_delta);
        assert_eq!(f.engine.pending(&PoolId::Vault(f.vault), shares, START + 900).expect("unopened"), 0);
    }

    #[test]
    fn test_checkpoint_pool_settles_under_old_ratio() {
        let mut f = fixture();
        let pool = PoolId::Staking;
        f.engine
            .checkpoint(&f.registry, &f.staking, &pool, &Beneficiary::Stake(StakeId(1)), Shares::ZERO, START)
            .expect("open");

        let delta = f
            .engine
            .checkpoint_pool(&pool, WeightRatio::new(1, 1), START + 50)
            .expect("reweight");
        assert_eq!(delta, 250);
        let state = f.engine.pool_state(&pool).expect("read").expect("opened");
        assert_eq!(state.ratio(), WeightRatio::new(1, 1));
        assert_eq!(state.total_emitted, 250);
        assert_eq!(state.unattributed, 250);

        assert_eq!(
            f.engine
                .checkpoint_pool(&PoolId::Vault(f.vault), WeightRatio::ZERO, START + 50)
                .expect("unopened"),
            0
        );
    }

    #[test]
    fn test_reweighted_window_goes_to_next_holder() {
        let mut f = fixture();
        let pool = PoolId::Vault(f.vault);
        let alice = depositor(7);
        f.engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::ZERO, START)
            .expect("open");

        // 500 units at 1/2, then the staking side loses its weight.
        f.registry
            .set_split(&mut f.engine, 1, 0, START + 100)
            .expect("split");
        let state = f.engine.pool_state(&pool).expect("read").expect("opened");
        assert_eq!(state.unattributed, 500);
        assert_eq!(f.engine.pending(&pool, Shares::new(1, 2), START + 100).expect("pending"), 250);

        // A zero-share checkpoint leaves the carried amount alone.
        f.engine
            .checkpoint(&f.registry, &f.owner, &pool, &depositor(8), Shares::new(0, 2), START + 100)
            .expect("newcomer");
        let result = f
            .engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::new(2, 2), START + 150)
            .expect("checkpoint");
        assert_eq!(result.pool_delta, 495);
        assert_eq!(result.beneficiary_delta, 995);

        let state = f.engine.pool_state(&pool).expect("read").expect("opened");
        let record = f.engine.claim_record(&ClaimKey::new(pool, alice)).expect("record");
        assert_eq!(state.unattributed, 0);
        assert_eq!(record.total_available, state.total_emitted);

        let again = f
            .engine
            .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::new(2, 2), START + 150)
            .expect("repeat");
        assert_eq!(again, Checkpoint::default());
    }

    proptest! {
        // With one beneficiary holding every share, the ledger equals the
        // pool, including windows settled by weight changes.
        #[test]
        fn prop_single_holder_conserves(
            steps in proptest::collection::vec((1u64..700, proptest::option::of(0u64..4)), 1..12),
        ) {
            let mut f = fixture();
            let pool = PoolId::Vault(f.vault);
            let alice = depositor(7);
            f.engine
                .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::ZERO, START)
                .expect("open");
            let mut now = START;
            for (step, staking_weight) in steps {
                now += step;
                if let Some(staking_weight) = staking_weight {
                    f.registry
                        .set_split(&mut f.engine, 1, staking_weight, now)
                        .expect("split");
                }
                f.engine
                    .checkpoint(&f.registry, &f.owner, &pool, &alice, Shares::new(10, 10), now)
                    .expect("checkpoint");
            }
            let state = f.engine.pool_state(&pool).expect("read").expect("opened");
            let record = f.engine.claim_record(&ClaimKey::new(pool, alice)).expect("record");
            prop_assert_eq!(record.total_available, state.total_emitted);
        }
    }
}

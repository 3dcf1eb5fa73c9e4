//! Claim settlement.
//!
//! A claim forces a final checkpoint of each requested pool the beneficiary
//! currently holds shares in, using the shares the [`ShareProvider`]
//! reports, then moves the beneficiary's unclaimed balance out of the
//! funding wallet through [`TokenTransfer`]. Pools where the beneficiary
//! holds nothing are paid from their record without a checkpoint, so a
//! claim never spends a window that belongs to other holders.
//!
//! Each pool settles independently: the claim record is marked settled
//! before the transfer and restored if the transfer fails, so a failure in
//! one pool never leaves its record half-written. Pools settled before the
//! failing one stay settled.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tidal_types::events::RewardEvent;
use tidal_types::{Address, Amount, Beneficiary, PoolId, Timestamp};

use crate::accrual::AccrualEngine;
use crate::directory::Collaborators;
use crate::ledger::{ClaimKey, Shares};
use crate::pause::PauseSwitch;
use crate::store::RewardsStore;
use crate::weights::WeightRegistry;
use crate::{math, Result, RewardsError};

/// Source of current share balances, maintained by the collaborators.
pub trait ShareProvider {
    /// The beneficiary's share and the pool total as last reported.
    fn shares(&self, pool: &PoolId, beneficiary: &Beneficiary) -> Result<Shares>;
}

/// Token movements out of the funding wallet.
pub trait TokenTransfer {
    /// Move `amount` from `from` to `to`.
    fn transfer_from(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()>;

    /// Current balance of `owner`.
    fn balance_of(&self, owner: &Address) -> Result<Amount>;
}

/// In-memory [`ShareProvider`] fed by `report_shares` calls.
#[derive(Clone, Debug, Default)]
pub struct ShareBook {
    shares: BTreeMap<ClaimKey, u128>,
    totals: BTreeMap<PoolId, u128>,
}

impl ShareBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a beneficiary's post-mutation balance and the pool total.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::InvalidInput`] if `share > total`
    pub fn record(&mut self, pool: PoolId, beneficiary: Beneficiary, shares: Shares) -> Result<()> {
        shares.validate()?;
        self.shares.insert(ClaimKey::new(pool, beneficiary), shares.share);
        self.totals.insert(pool, shares.total);
        Ok(())
    }
}

impl ShareProvider for ShareBook {
    fn shares(&self, pool: &PoolId, beneficiary: &Beneficiary) -> Result<Shares> {
        let share = self
            .shares
            .get(&ClaimKey::new(*pool, *beneficiary))
            .copied()
            .unwrap_or(0);
        let total = self.totals.get(pool).copied().unwrap_or(0);
        Ok(Shares::new(share, total))
    }
}

/// In-memory [`TokenTransfer`] ledger.
#[derive(Clone, Debug, Default)]
pub struct TokenLedger {
    balances: BTreeMap<Address, Amount>,
}

impl TokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` to `to` out of thin air.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::ArithmeticOverflow`] on overflow
    pub fn mint(&mut self, to: &Address, amount: Amount) -> Result<()> {
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = math::add(*balance, amount)?;
        Ok(())
    }
}

impl TokenTransfer for TokenLedger {
    fn transfer_from(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(from)?;
        let remaining = available.checked_sub(amount).ok_or_else(|| {
            RewardsError::Transfer(format!(
                "{from} holds {available}, cannot send {amount}"
            ))
        })?;
        if from == to {
            return Ok(());
        }
        let received = math::add(self.balance_of(to)?, amount)?;
        self.balances.insert(*from, remaining);
        self.balances.insert(*to, received);
        Ok(())
    }

    fn balance_of(&self, owner: &Address) -> Result<Amount> {
        Ok(self.balances.get(owner).copied().unwrap_or(0))
    }
}

/// One claim over one or more pools.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimRequest {
    /// Sender of the claim.
    pub caller: Address,
    /// Pools to settle, in order.
    pub pools: Vec<PoolId>,
    pub beneficiary: Beneficiary,
    /// Recipient of the tokens.
    pub destination: Address,
}

/// A transfer made by a claim.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    pub pool: PoolId,
    pub beneficiary: Beneficiary,
    pub destination: Address,
    #[serde_as(as = "DisplayFromStr")]
    pub amount: Amount,
}

/// Settles claims through the funding wallet.
#[derive(Clone, Debug)]
pub struct ClaimProcessor {
    funding_wallet: Address,
    pause: PauseSwitch,
}

impl ClaimProcessor {
    pub fn new(funding_wallet: Address, paused: bool) -> Self {
        Self {
            funding_wallet,
            pause: PauseSwitch::new(paused),
        }
    }

    pub fn funding_wallet(&self) -> Address {
        self.funding_wallet
    }

    pub fn set_funding_wallet(&mut self, wallet: Address) {
        tracing::warn!(from = %self.funding_wallet, to = %wallet, "funding wallet rotated");
        self.funding_wallet = wallet;
    }

    pub fn pause(&mut self) {
        self.pause.pause();
    }

    pub fn resume(&mut self) {
        self.pause.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Settle `request` and return one receipt per non-zero transfer.
    ///
    /// # Errors
    ///
    /// - [`RewardsError::Paused`] while claims are halted
    /// - [`RewardsError::Unauthorized`] if the caller may not claim for the
    ///   beneficiary
    /// - [`RewardsError::InvalidPool`] / [`RewardsError::InvalidInput`] for a
    ///   pool outside the beneficiary's category
    /// - [`RewardsError::Transfer`] if the funding wallet cannot pay; the
    ///   failing pool's record is restored
    pub fn claim<S, P, T>(
        &self,
        engine: &mut AccrualEngine<S>,
        registry: &WeightRegistry,
        provider: &P,
        transfer: &mut T,
        request: &ClaimRequest,
        now: Timestamp,
    ) -> Result<Vec<ClaimReceipt>>
    where
        S: RewardsStore,
        P: ShareProvider + ?Sized,
        T: TokenTransfer + ?Sized,
    {
        self.pause.check()?;
        authorize_claim(engine.directory(), request)?;

        let beneficiary = request.beneficiary;
        let mut seen = BTreeSet::new();
        let mut receipts = Vec::new();
        for pool in &request.pools {
            if !seen.insert(*pool) {
                continue;
            }
            let shares = provider.shares(pool, &beneficiary)?;
            if shares.share > 0 {
                engine.settle(registry, pool, &beneficiary, shares, now)?;
            } else if !engine.directory().is_valid_pool(pool) {
                return Err(RewardsError::InvalidPool(*pool));
            } else if beneficiary.category() != pool.category() {
                return Err(RewardsError::InvalidInput(format!(
                    "beneficiary {beneficiary} does not belong to pool {pool}"
                )));
            }

            let key = ClaimKey::new(*pool, beneficiary);
            let before = engine.claim_record(&key)?;
            let mut record = before;
            let amount = record.settle();
            if amount == 0 {
                tracing::debug!(%pool, %beneficiary, "nothing to claim");
                continue;
            }

            engine.write_claim(key, record)?;
            if let Err(err) = transfer.transfer_from(&self.funding_wallet, &request.destination, amount) {
                tracing::warn!(%pool, %beneficiary, amount = %amount, error = %err, "claim transfer failed");
                engine.write_claim(key, before)?;
                return Err(err);
            }

            tracing::info!(
                %pool,
                %beneficiary,
                destination = %request.destination,
                amount = %amount,
                "rewards claimed"
            );
            engine.emit(RewardEvent::RewardsClaimed {
                pool: *pool,
                beneficiary,
                destination: request.destination,
                amount,
            });
            receipts.push(ClaimReceipt {
                pool: *pool,
                beneficiary,
                destination: request.destination,
                amount,
            });
        }
        Ok(receipts)
    }
}

/// A depositor may claim for itself, and anyone may trigger a claim that
/// pays the depositor. Stake positions are claimed through the staking
/// contract.
fn authorize_claim(directory: &Collaborators, request: &ClaimRequest) -> Result<()> {
    let allowed = match request.beneficiary {
        Beneficiary::Depositor(depositor) => {
            request.caller == depositor || request.destination == depositor
        }
        Beneficiary::Stake(_) => directory.owner_of(&PoolId::Staking) == Some(request.caller),
    };
    if allowed {
        Ok(())
    } else {
        Err(RewardsError::unauthorized(
            &request.caller,
            format!("claim for {}", request.beneficiary),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::weights::WeightSplit;
    use tidal_emission::{EmissionSchedule, EpochClock};
    use tidal_types::{StakeId, VaultId};

    const START: Timestamp = 1_000;

    struct Fixture {
        engine: AccrualEngine<MemoryStore>,
        registry: WeightRegistry,
        book: ShareBook,
        tokens: TokenLedger,
        processor: ClaimProcessor,
        pool: PoolId,
        owner: Address,
        alice: Address,
    }

    // Vault pool receives half of 1000 units per 100 seconds; alice holds
    // every share from START.
    fn fixture() -> Fixture {
        let clock = EpochClock::new(
            EmissionSchedule::new(START, START + 10_000, 100, 1_000).expect("schedule"),
        )
        .expect("clock");
        let vault = VaultId(Address::repeat(0xaa));
        let owner = Address::repeat(0x01);
        let alice = Address::repeat(0x0a);
        let funding = Address::repeat(0xf0);
        let mut directory = Collaborators::new();
        directory.register_vault(vault, owner);
        directory.set_staking_owner(Address::repeat(0x02));

        let mut engine = AccrualEngine::new(clock, MemoryStore::new(), directory);
        let mut registry = WeightRegistry::new(WeightSplit::new(1, 1).expect("split"));
        registry
            .set_vault_weights(&mut engine, &[vault], &[1], START)
            .expect("weights");
        let pool = PoolId::Vault(vault);
        let depositor = Beneficiary::Depositor(alice);
        engine
            .checkpoint(&registry, &owner, &pool, &depositor, Shares::ZERO, START)
            .expect("open");

        let mut book = ShareBook::new();
        book.record(pool, depositor, Shares::new(100, 100))
            .expect("report");
        let mut tokens = TokenLedger::new();
        tokens.mint(&funding, 1_000_000).expect("mint");

        Fixture {
            engine,
            registry,
            book,
            tokens,
            processor: ClaimProcessor::new(funding, false),
            pool,
            owner,
            alice,
        }
    }

    fn request(f: &Fixture, caller: Address, destination: Address) -> ClaimRequest {
        ClaimRequest {
            caller,
            pools: vec![f.pool],
            beneficiary: Beneficiary::Depositor(f.alice),
            destination,
        }
    }

    #[test]
    fn test_claim_forces_checkpoint_and_pays() {
        let mut f = fixture();
        let req = request(&f, f.alice, f.alice);
        let receipts = f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 100)
            .expect("claim");
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].amount, 500);
        assert_eq!(f.tokens.balance_of(&f.alice).expect("balance"), 500);

        let record = f
            .engine
            .claim_record(&ClaimKey::new(f.pool, Beneficiary::Depositor(f.alice)))
            .expect("record");
        assert_eq!(record.total_claimed, record.total_available);
        assert_eq!(record.unclaimed(), 0);
    }

    #[test]
    fn test_second_claim_is_noop() {
        let mut f = fixture();
        let req = request(&f, f.alice, f.alice);
        f.processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 100)
            .expect("first");
        f.engine.drain_events();
        let receipts = f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 100)
            .expect("second");
        assert!(receipts.is_empty());
        assert!(f.engine.drain_events().is_empty());
        assert_eq!(f.tokens.balance_of(&f.alice).expect("balance"), 500);
    }

    #[test]
    fn test_anyone_may_pay_the_depositor() {
        let mut f = fixture();
        let keeper = Address::repeat(0x77);
        let req = request(&f, keeper, f.alice);
        assert!(f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 10)
            .is_ok());

        let redirect = request(&f, keeper, keeper);
        let err = f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &redirect, START + 20)
            .expect_err("third party cannot redirect");
        assert!(matches!(err, RewardsError::Unauthorized { .. }));
    }

    #[test]
    fn test_stake_claims_require_staking_owner() {
        let mut f = fixture();
        let req = ClaimRequest {
            caller: f.owner,
            pools: vec![PoolId::Staking],
            beneficiary: Beneficiary::Stake(StakeId(1)),
            destination: f.owner,
        };
        assert!(matches!(
            f.processor
                .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 10),
            Err(RewardsError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_paused_claims_rejected() {
        let mut f = fixture();
        f.processor.pause();
        let req = request(&f, f.alice, f.alice);
        assert_eq!(
            f.processor
                .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 100),
            Err(RewardsError::Paused)
        );
        f.processor.resume();
        assert!(f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 100)
            .is_ok());
    }

    #[test]
    fn test_failed_transfer_restores_record() {
        let mut f = fixture();
        f.tokens = TokenLedger::new();
        let req = request(&f, f.alice, f.alice);
        let err = f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 100)
            .expect_err("empty funding wallet");
        assert!(matches!(err, RewardsError::Transfer(_)));

        let record = f
            .engine
            .claim_record(&ClaimKey::new(f.pool, Beneficiary::Depositor(f.alice)))
            .expect("record");
        assert_eq!(record.total_claimed, 0);
        assert_eq!(record.unclaimed(), 500);
    }

    #[test]
    fn test_claim_without_shares_leaves_window_to_holders() {
        let mut f = fixture();
        let bob = Beneficiary::Depositor(Address::repeat(0x0b));
        let req = ClaimRequest {
            caller: Address::repeat(0x0b),
            pools: vec![f.pool],
            beneficiary: bob,
            destination: Address::repeat(0x0b),
        };
        let receipts = f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 100)
            .expect("claim");
        assert!(receipts.is_empty());
        let state = f.engine.pool_state(&f.pool).expect("read").expect("opened");
        assert_eq!(state.last_checkpoint_time, START);

        let result = f
            .engine
            .checkpoint(
                &f.registry,
                &f.owner,
                &f.pool,
                &Beneficiary::Depositor(f.alice),
                Shares::new(100, 100),
                START + 100,
            )
            .expect("holder checkpoint");
        assert_eq!(result.beneficiary_delta, 500);
    }

    #[test]
    fn test_claim_without_shares_pays_credited_balance() {
        let mut f = fixture();
        let alice = Beneficiary::Depositor(f.alice);
        f.engine
            .checkpoint(&f.registry, &f.owner, &f.pool, &alice, Shares::new(100, 100), START + 100)
            .expect("checkpoint");
        f.book
            .record(f.pool, alice, Shares::new(0, 100))
            .expect("withdrawn");

        let req = request(&f, f.alice, f.alice);
        let receipts = f
            .processor
            .claim(&mut f.engine, &f.registry, &f.book, &mut f.tokens, &req, START + 200)
            .expect("claim");
        assert_eq!(receipts.len(), 1);
        assert_eq!(receipts[0].amount, 500);
    }

    #[test]
    fn test_share_book_defaults_to_zero() {
        let book = ShareBook::new();
        let shares = book
            .shares(&PoolId::Staking, &Beneficiary::Stake(StakeId(9)))
            .expect("shares");
        assert_eq!(shares, Shares::ZERO);
    }

    #[test]
    fn test_token_ledger_rejects_overdraft() {
        let mut tokens = TokenLedger::new();
        let a = Address::repeat(1);
        let b = Address::repeat(2);
        tokens.mint(&a, 10).expect("mint");
        assert!(tokens.transfer_from(&a, &b, 11).is_err());
        tokens.transfer_from(&a, &b, 4).expect("transfer");
        assert_eq!(tokens.balance_of(&a).expect("a"), 6);
        assert_eq!(tokens.balance_of(&b).expect("b"), 4);

        tokens.transfer_from(&b, &b, 4).expect("self transfer");
        assert_eq!(tokens.balance_of(&b).expect("b"), 4);
        assert!(tokens.transfer_from(&b, &b, 5).is_err());
    }
}

//! Read-only query handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use tidal_rewards::{ShareProvider, Shares, TokenTransfer};
use tidal_types::{Address, Beneficiary, PoolId, StakeId, VaultId};

use super::{parse, query_time, to_value, Result};
use crate::rpc::RpcError;
use crate::DaemonState;

/// Transfers listed by `get_funding_status`.
const RECENT_TRANSFERS: u32 = 20;

#[serde_as]
#[derive(Debug, Deserialize)]
struct VaultRewardsParams {
    #[serde_as(as = "DisplayFromStr")]
    depositor: Address,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    vaults: Vec<VaultId>,
}

#[derive(Debug, Deserialize)]
struct StakingRewardsParams {
    stakes: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct BeneficiaryParams {
    beneficiary: Beneficiary,
}

#[derive(Debug, Deserialize)]
struct PoolParams {
    pool: PoolId,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct PendingParams {
    pool: PoolId,
    beneficiary: Beneficiary,
    /// Omitted shares fall back to the last reported ones.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    share: Option<u128>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    total: Option<u128>,
    #[serde(default)]
    now: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NowParams {
    #[serde(default)]
    now: Option<u64>,
}

pub async fn unclaimed_vault_rewards(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: VaultRewardsParams = parse(params)?;
    let rewards = state.rewards.lock().await;
    let summary = rewards
        .distributor
        .unclaimed_vault_rewards(&p.depositor, &p.vaults)?;
    to_value(&summary)
}

pub async fn unclaimed_staking_rewards(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: StakingRewardsParams = parse(params)?;
    let stakes: Vec<StakeId> = p.stakes.into_iter().map(StakeId).collect();
    let rewards = state.rewards.lock().await;
    let summary = rewards.distributor.unclaimed_staking_rewards(&stakes)?;
    to_value(&summary)
}

pub async fn all_unclaimed_rewards(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: BeneficiaryParams = parse(params)?;
    let rewards = state.rewards.lock().await;
    let summary = rewards.distributor.all_unclaimed_rewards(&p.beneficiary)?;
    to_value(&summary)
}

/// `null` until the pool's first checkpoint.
pub async fn pool_rewards_state(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PoolParams = parse(params)?;
    let rewards = state.rewards.lock().await;
    let pool_state = rewards.distributor.pool_rewards_state(&p.pool)?;
    to_value(&pool_state)
}

pub async fn pending_rewards(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: PendingParams = parse(params)?;
    let now = query_time(p.now);
    let rewards = state.rewards.lock().await;
    let shares = match (p.share, p.total) {
        (Some(share), Some(total)) => Shares::new(share, total),
        (None, None) => rewards.shares.shares(&p.pool, &p.beneficiary)?,
        _ => {
            return Err(RpcError::invalid_params(
                "share and total must be given together",
            ))
        }
    };
    let pending = rewards
        .distributor
        .pending_rewards(&p.pool, &p.beneficiary, shares, now)?;
    to_value(&pending)
}

pub async fn current_rate(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: NowParams = if params.is_null() {
        NowParams::default()
    } else {
        parse(params)?
    };
    let now = query_time(p.now);
    let rewards = state.rewards.lock().await;
    let (rate, epoch) = rewards.distributor.current_rate(now);
    Ok(serde_json::json!({
        "rate_per_epoch": rate.to_string(),
        "epoch": epoch,
    }))
}

pub async fn get_emission_schedule(state: &Arc<DaemonState>) -> Result {
    let rewards = state.rewards.lock().await;
    let engine = rewards.distributor.engine();
    let clock = engine.clock();
    let total = clock
        .total_emission()
        .map_err(|e| RpcError::emission_error(&e.to_string()))?;
    let rates: Vec<String> = clock.epoch_rates().iter().map(|r| r.to_string()).collect();
    Ok(serde_json::json!({
        "schedule": to_value(clock.schedule())?,
        "epoch_rates": rates,
        "total_emission": total.to_string(),
    }))
}

pub async fn get_funding_status(state: &Arc<DaemonState>) -> Result {
    let rewards = state.rewards.lock().await;
    let wallet = rewards.distributor.funding_wallet();
    let balance = rewards.tokens.balance_of(&wallet)?;
    let transfers = rewards
        .tokens
        .recent_transfers(RECENT_TRANSFERS)
        .map_err(|e| RpcError::internal_error(&e.to_string()))?;

    let recent: Vec<Value> = transfers
        .iter()
        .map(|t| {
            serde_json::json!({
                "sequence": t.sequence,
                "transfer_id": hex::encode(t.transfer_id),
                "to": t.to.to_string(),
                "amount": t.amount.to_string(),
                "recorded_at": t.recorded_at,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "funding_wallet": wallet.to_string(),
        "balance": balance.to_string(),
        "claims_paused": rewards.distributor.claims_paused(),
        "recent_transfers": recent,
    }))
}

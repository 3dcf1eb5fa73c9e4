//! Claim command handlers.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use tidal_rewards::{math, ClaimReceipt, ClaimRequest};
use tidal_types::{Address, Amount, Beneficiary, PoolId};

use super::{parse, publish, resolve_now, to_value, Result};
use crate::rpc::RpcError;
use crate::{DaemonState, Rewards};

#[serde_as]
#[derive(Debug, Deserialize)]
struct ClaimParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
    #[serde(default)]
    pool: Option<PoolId>,
    #[serde(default)]
    pools: Vec<PoolId>,
    beneficiary: Beneficiary,
    /// Defaults to the depositor for vault claims.
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    destination: Option<Address>,
    #[serde(default)]
    now: Option<u64>,
}

impl ClaimParams {
    fn destination(&self) -> std::result::Result<Address, RpcError> {
        match (self.destination, self.beneficiary) {
            (Some(destination), _) => Ok(destination),
            (None, Beneficiary::Depositor(depositor)) => Ok(depositor),
            (None, Beneficiary::Stake(_)) => Err(RpcError::invalid_params(
                "destination required for stake claims",
            )),
        }
    }

    fn request(&self, pools: Vec<PoolId>) -> std::result::Result<ClaimRequest, RpcError> {
        Ok(ClaimRequest {
            caller: self.caller,
            pools,
            beneficiary: self.beneficiary,
            destination: self.destination()?,
        })
    }
}

fn receipts_value(receipts: &[ClaimReceipt]) -> Result {
    let total: Amount = receipts
        .iter()
        .try_fold(0, |sum, r| math::add(sum, r.amount))?;
    Ok(serde_json::json!({
        "receipts": to_value(&receipts)?,
        "total_claimed": total.to_string(),
    }))
}

/// Claim one pool.
pub async fn claim(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ClaimParams = parse(params)?;
    let pool = p
        .pool
        .ok_or_else(|| RpcError::invalid_params("pool required"))?;
    let request = p.request(vec![pool])?;
    let now = resolve_now(p.now)?;

    let mut guard = state.rewards.lock().await;
    let rewards: &mut Rewards = &mut guard;
    let receipt = rewards
        .distributor
        .claim(&rewards.shares, &mut rewards.tokens, &request, now)?;
    publish(state, rewards, now);

    Ok(serde_json::json!({
        "receipt": to_value(&receipt)?,
    }))
}

/// Claim several pools.
pub async fn claim_many(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ClaimParams = parse(params)?;
    let request = p.request(p.pools.clone())?;
    let now = resolve_now(p.now)?;

    let mut guard = state.rewards.lock().await;
    let rewards: &mut Rewards = &mut guard;
    let receipts = rewards
        .distributor
        .claim_many(&rewards.shares, &mut rewards.tokens, &request, now)?;
    publish(state, rewards, now);

    receipts_value(&receipts)
}

/// Claim every pool the beneficiary can hold rewards in.
pub async fn claim_all(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ClaimParams = parse(params)?;
    let destination = p.destination()?;
    let now = resolve_now(p.now)?;

    let mut guard = state.rewards.lock().await;
    let rewards: &mut Rewards = &mut guard;
    let receipts = rewards.distributor.claim_all(
        &rewards.shares,
        &mut rewards.tokens,
        p.caller,
        p.beneficiary,
        destination,
        now,
    )?;
    publish(state, rewards, now);

    receipts_value(&receipts)
}

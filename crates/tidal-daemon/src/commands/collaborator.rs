//! Collaborator command handlers (vault and staking contracts).

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use tidal_rewards::Shares;
use tidal_types::{Address, Beneficiary, PoolId};

use super::{parse, publish, resolve_now, Result};
use crate::DaemonState;

#[serde_as]
#[derive(Debug, Deserialize)]
struct ShareParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
    pool: PoolId,
    beneficiary: Beneficiary,
    #[serde_as(as = "DisplayFromStr")]
    share: u128,
    #[serde_as(as = "DisplayFromStr")]
    total: u128,
    #[serde(default)]
    now: Option<u64>,
}

/// Settle a pool and credit a beneficiary with the pre-mutation shares.
pub async fn checkpoint(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ShareParams = parse(params)?;
    let now = resolve_now(p.now)?;

    let mut rewards = state.rewards.lock().await;
    let result = rewards.distributor.checkpoint(
        &p.caller,
        &p.pool,
        &p.beneficiary,
        Shares::new(p.share, p.total),
        now,
    )?;
    publish(state, &mut rewards, now);

    Ok(serde_json::json!({
        "pool_delta": result.pool_delta.to_string(),
        "beneficiary_delta": result.beneficiary_delta.to_string(),
    }))
}

/// Record post-mutation shares used by claim-time checkpoints.
pub async fn report_shares(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: ShareParams = parse(params)?;

    let mut rewards = state.rewards.lock().await;
    rewards
        .distributor
        .collaborators()
        .authorize(&p.caller, &p.pool)?;
    if p.beneficiary.category() != p.pool.category() {
        return Err(crate::rpc::RpcError::invalid_params(&format!(
            "beneficiary {} does not belong to pool {}",
            p.beneficiary, p.pool
        )));
    }
    rewards
        .shares
        .record(p.pool, p.beneficiary, Shares::new(p.share, p.total))?;
    tracing::debug!(pool = %p.pool, beneficiary = %p.beneficiary, share = %p.share, total = %p.total, "shares reported");

    Ok(serde_json::json!({"recorded": true}))
}

//! Governance command handlers.
//!
//! Every handler requires `caller` to be the governance address.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use serde_with::{serde_as, DisplayFromStr};
use tidal_types::{Address, VaultId};

use super::{parse, publish, resolve_now, Result};
use crate::DaemonState;

#[serde_as]
#[derive(Debug, Deserialize)]
struct CallerParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct SplitParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
    vaults_weight: u64,
    staking_weight: u64,
    #[serde(default)]
    now: Option<u64>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct VaultWeightsParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    vaults: Vec<VaultId>,
    weights: Vec<u64>,
    #[serde(default)]
    now: Option<u64>,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct RegisterVaultParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
    #[serde_as(as = "DisplayFromStr")]
    vault: VaultId,
    #[serde_as(as = "DisplayFromStr")]
    owner: Address,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct OwnerParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
    #[serde_as(as = "DisplayFromStr")]
    owner: Address,
}

#[serde_as]
#[derive(Debug, Deserialize)]
struct WalletParams {
    #[serde_as(as = "DisplayFromStr")]
    caller: Address,
    #[serde_as(as = "DisplayFromStr")]
    wallet: Address,
}

/// Change the vaults/staking split. Open pools are checkpointed under the
/// old split first.
pub async fn set_split(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: SplitParams = parse(params)?;
    let now = resolve_now(p.now)?;

    let mut rewards = state.rewards.lock().await;
    rewards
        .distributor
        .set_split(&p.caller, p.vaults_weight, p.staking_weight, now)?;
    publish(state, &mut rewards, now);

    Ok(serde_json::json!({
        "vaults_weight": p.vaults_weight,
        "staking_weight": p.staking_weight,
    }))
}

/// Change per-vault weights. `vaults` and `weights` are parallel lists.
pub async fn set_vault_weights(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: VaultWeightsParams = parse(params)?;
    let now = resolve_now(p.now)?;

    let mut rewards = state.rewards.lock().await;
    rewards
        .distributor
        .set_vault_weights(&p.caller, &p.vaults, &p.weights, now)?;
    publish(state, &mut rewards, now);

    let total = rewards.distributor.registry().total_vault_weight();
    Ok(serde_json::json!({
        "updated": p.vaults.len(),
        "total_vault_weight": total.to_string(),
    }))
}

pub async fn register_vault(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: RegisterVaultParams = parse(params)?;
    let mut rewards = state.rewards.lock().await;
    rewards
        .distributor
        .register_vault(&p.caller, p.vault, p.owner)?;
    publish(state, &mut rewards, crate::unix_now());
    Ok(serde_json::json!({"registered": true}))
}

pub async fn set_staking_owner(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: OwnerParams = parse(params)?;
    let mut rewards = state.rewards.lock().await;
    rewards.distributor.set_staking_owner(&p.caller, p.owner)?;
    publish(state, &mut rewards, crate::unix_now());
    Ok(serde_json::json!({"updated": true}))
}

pub async fn pause_claims(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CallerParams = parse(params)?;
    let mut rewards = state.rewards.lock().await;
    rewards.distributor.pause_claims(&p.caller)?;
    tracing::warn!(caller = %p.caller, "claims paused");
    publish(state, &mut rewards, crate::unix_now());
    Ok(serde_json::json!({"claims_paused": true}))
}

pub async fn unpause_claims(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: CallerParams = parse(params)?;
    let mut rewards = state.rewards.lock().await;
    rewards.distributor.unpause_claims(&p.caller)?;
    tracing::info!(caller = %p.caller, "claims resumed");
    publish(state, &mut rewards, crate::unix_now());
    Ok(serde_json::json!({"claims_paused": false}))
}

pub async fn set_funding_wallet(state: &Arc<DaemonState>, params: &Value) -> Result {
    let p: WalletParams = parse(params)?;
    let mut rewards = state.rewards.lock().await;
    rewards.distributor.set_funding_wallet(&p.caller, p.wallet)?;
    publish(state, &mut rewards, crate::unix_now());
    Ok(serde_json::json!({"funding_wallet": p.wallet.to_string()}))
}

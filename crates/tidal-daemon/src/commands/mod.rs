//! IPC command handlers.
//!
//! Each submodule implements the commands for one caller category. Every
//! call names its `caller`, which stands in for the transaction sender, and
//! may pin `now`; an omitted `now` means wall-clock time. State-changing
//! calls may pin a past time but never one ahead of the wall clock.

pub mod admin;
pub mod claims;
pub mod collaborator;
pub mod events;
pub mod queries;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::rpc::RpcError;
use crate::{unix_now, DaemonState, Rewards};

type Result = std::result::Result<Value, RpcError>;

/// Decode `params` into a typed parameter struct.
fn parse<T: DeserializeOwned>(params: &Value) -> std::result::Result<T, RpcError> {
    T::deserialize(params).map_err(|e| RpcError::invalid_params(&e.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result {
    serde_json::to_value(value).map_err(|e| RpcError::internal_error(&e.to_string()))
}

/// Time for a state-changing call.
fn resolve_now(now: Option<u64>) -> std::result::Result<u64, RpcError> {
    let wall = unix_now();
    match now {
        Some(now) if now > wall => Err(RpcError::invalid_params(&format!(
            "now {now} is ahead of the clock ({wall})"
        ))),
        Some(now) => Ok(now),
        None => Ok(wall),
    }
}

/// Time for a read-only projection; future times are allowed.
fn query_time(now: Option<u64>) -> u64 {
    now.unwrap_or_else(unix_now)
}

/// Forward the engine's queued events to subscribers.
fn publish(state: &DaemonState, rewards: &mut Rewards, now: u64) {
    let events = rewards.distributor.drain_events();
    state.event_bus.publish(events, now);
}

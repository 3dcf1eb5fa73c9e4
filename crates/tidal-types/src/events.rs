//! Event types emitted by the rewards engine.
//!
//! The engine produces typed [`RewardEvent`]s; the daemon wraps them in an
//! [`Event`] envelope before pushing them to subscribers. Amounts are
//! rendered as decimal strings because they can exceed the JSON safe
//! integer range.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::{Address, Amount, Beneficiary, PoolId, Timestamp, VaultId};

/// Envelope for all events pushed to subscribers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub timestamp: Timestamp,
    pub payload: serde_json::Value,
}

/// All event types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Accrual
    RewardsDistributed,
    PoolReweighted,

    // Settlement
    RewardsClaimed,

    // Administration
    SplitUpdated,
    VaultWeightsUpdated,
    VaultRegistered,
    StakingOwnerUpdated,
    ClaimsPaused,
    ClaimsUnpaused,
    FundingWalletUpdated,

    // System
    DaemonStarted,
}

/// A typed event produced by the rewards engine.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardEvent {
    /// A checkpoint credited a beneficiary.
    RewardsDistributed {
        pool: PoolId,
        beneficiary: Beneficiary,
        #[serde_as(as = "DisplayFromStr")]
        beneficiary_delta: Amount,
        #[serde_as(as = "DisplayFromStr")]
        pool_delta: Amount,
    },
    /// A pool was settled and given a new weight ratio.
    PoolReweighted {
        pool: PoolId,
        #[serde_as(as = "DisplayFromStr")]
        pool_delta: Amount,
        #[serde_as(as = "DisplayFromStr")]
        weight_numerator: u128,
        #[serde_as(as = "DisplayFromStr")]
        weight_denominator: u128,
    },
    /// Unclaimed rewards were transferred out of the funding wallet.
    RewardsClaimed {
        pool: PoolId,
        beneficiary: Beneficiary,
        destination: Address,
        #[serde_as(as = "DisplayFromStr")]
        amount: Amount,
    },
    SplitUpdated {
        vaults_weight: u64,
        staking_weight: u64,
    },
    VaultWeightsUpdated {
        vaults: Vec<VaultId>,
        weights: Vec<u64>,
    },
    VaultRegistered {
        vault: VaultId,
        owner: Address,
    },
    StakingOwnerUpdated {
        owner: Address,
    },
    ClaimsPaused,
    ClaimsUnpaused,
    FundingWalletUpdated {
        wallet: Address,
    },
}

impl RewardEvent {
    /// The envelope type for this event.
    pub fn event_type(&self) -> EventType {
        match self {
            RewardEvent::RewardsDistributed { .. } => EventType::RewardsDistributed,
            RewardEvent::PoolReweighted { .. } => EventType::PoolReweighted,
            RewardEvent::RewardsClaimed { .. } => EventType::RewardsClaimed,
            RewardEvent::SplitUpdated { .. } => EventType::SplitUpdated,
            RewardEvent::VaultWeightsUpdated { .. } => EventType::VaultWeightsUpdated,
            RewardEvent::VaultRegistered { .. } => EventType::VaultRegistered,
            RewardEvent::StakingOwnerUpdated { .. } => EventType::StakingOwnerUpdated,
            RewardEvent::ClaimsPaused => EventType::ClaimsPaused,
            RewardEvent::ClaimsUnpaused => EventType::ClaimsUnpaused,
            RewardEvent::FundingWalletUpdated { .. } => EventType::FundingWalletUpdated,
        }
    }

    /// Wrap this event in an envelope stamped with `timestamp`.
    pub fn into_event(self, timestamp: Timestamp) -> Event {
        let event_type = self.event_type();
        let payload = serde_json::to_value(&self).unwrap_or(serde_json::Value::Null);
        Event {
            event_type,
            timestamp,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StakeId;

    #[test]
    fn test_rewards_distributed_payload() {
        let event = RewardEvent::RewardsDistributed {
            pool: PoolId::Staking,
            beneficiary: Beneficiary::Stake(StakeId(3)),
            beneficiary_delta: 340_282_366_920_938_463_463_374_607_431_768_211_455,
            pool_delta: 10,
        };
        let envelope = event.into_event(1_700_000_000);
        assert_eq!(envelope.event_type, EventType::RewardsDistributed);
        assert_eq!(envelope.payload["kind"], "rewards_distributed");
        assert_eq!(envelope.payload["pool"], "staking");
        assert_eq!(envelope.payload["beneficiary"], "stake:3");
        assert_eq!(
            envelope.payload["beneficiary_delta"],
            "340282366920938463463374607431768211455"
        );
        assert_eq!(envelope.payload["pool_delta"], "10");
    }

    #[test]
    fn test_unit_event_round_trip() {
        let json = serde_json::to_string(&RewardEvent::ClaimsPaused).expect("serialize");
        assert_eq!(json, r#"{"kind":"claims_paused"}"#);
        let parsed: RewardEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, RewardEvent::ClaimsPaused);
    }

    #[test]
    fn test_event_type_names() {
        let json = serde_json::to_string(&EventType::FundingWalletUpdated).expect("serialize");
        assert_eq!(json, "\"funding_wallet_updated\"");
    }
}

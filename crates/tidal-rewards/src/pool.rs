//! Per-pool running emission totals.
//!
//! ## Invariant
//!
//! ```text
//! total_emitted' = total_emitted
//!                + floor(emission_between(last_checkpoint_time, now) * num / den)
//! last_checkpoint_time' = now
//! ```
//!
//! where `num / den` is the ratio stored before the checkpoint, i.e. the
//! ratio that was in force over the elapsed window.
//!
//! A reweight settles the window without a beneficiary. Its delta is held
//! in `unattributed` and credited, together with the next window, to the
//! next beneficiary that checkpoints with a non-zero share.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tidal_emission::EpochClock;
use tidal_types::{Amount, PoolId, Timestamp};

use crate::weights::WeightRatio;
use crate::{math, Result};

/// Accrual state of a single pool.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// The pool this state belongs to.
    pub pool: PoolId,
    /// Units attributed to this pool since it was opened.
    #[serde_as(as = "DisplayFromStr")]
    pub total_emitted: Amount,
    /// End of the last settled window.
    pub last_checkpoint_time: Timestamp,
    /// Numerator of the ratio in force since the last checkpoint.
    #[serde_as(as = "DisplayFromStr")]
    pub weight_numerator: u128,
    /// Denominator of the ratio in force since the last checkpoint.
    #[serde_as(as = "DisplayFromStr")]
    pub weight_denominator: u128,
    /// Settled by a reweight and not yet credited to any beneficiary.
    #[serde_as(as = "DisplayFromStr")]
    #[serde(default)]
    pub unattributed: Amount,
}

impl PoolState {
    /// Open a pool on its first checkpoint.
    ///
    /// Emission before `max(now, schedule_start)` is never attributed to it.
    pub fn open(
        pool: PoolId,
        ratio: WeightRatio,
        schedule_start: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            pool,
            total_emitted: 0,
            last_checkpoint_time: now.max(schedule_start),
            weight_numerator: ratio.numerator,
            weight_denominator: ratio.denominator,
            unattributed: 0,
        }
    }

    /// The ratio in force since the last checkpoint.
    pub fn ratio(&self) -> WeightRatio {
        WeightRatio {
            numerator: self.weight_numerator,
            denominator: self.weight_denominator,
        }
    }

    /// Replace the stored ratio. Only valid right after a checkpoint.
    pub(crate) fn set_ratio(&mut self, ratio: WeightRatio) {
        self.weight_numerator = ratio.numerator;
        self.weight_denominator = ratio.denominator;
    }

    /// Whether a checkpoint at `now` would settle a non-empty window.
    pub fn has_window(&self, now: Timestamp) -> bool {
        now > self.last_checkpoint_time
    }

    /// Units a checkpoint at `now` would add, without mutating.
    ///
    /// # Errors
    ///
    /// - [`crate::RewardsError::ArithmeticOverflow`] on overflow
    pub fn pending(&self, clock: &EpochClock, now: Timestamp) -> Result<Amount> {
        if !self.has_window(now) {
            return Ok(0);
        }
        let emitted = clock.emission_between(self.last_checkpoint_time, now)?;
        self.ratio().apply(emitted)
    }

    /// Units a beneficiary checkpoint at `now` would split among the
    /// holders: the carried reweight delta plus the pending window.
    ///
    /// # Errors
    ///
    /// - [`crate::RewardsError::ArithmeticOverflow`] on overflow
    pub fn attributable(&self, clock: &EpochClock, now: Timestamp) -> Result<Amount> {
        math::add(self.unattributed, self.pending(clock, now)?)
    }

    /// Settle the window up to `now` without crediting anyone and carry its
    /// delta for the next beneficiary checkpoint.
    ///
    /// # Errors
    ///
    /// - [`crate::RewardsError::ArithmeticOverflow`] on overflow
    pub(crate) fn defer(&mut self, clock: &EpochClock, now: Timestamp) -> Result<Amount> {
        let mut next = self.clone();
        let delta = next.advance(clock, now)?;
        next.unattributed = math::add(next.unattributed, delta)?;
        *self = next;
        Ok(delta)
    }

    /// Take the carried reweight delta.
    pub(crate) fn take_unattributed(&mut self) -> Amount {
        std::mem::take(&mut self.unattributed)
    }

    /// Settle the window up to `now` and return the pool's delta.
    ///
    /// Stale or repeated timestamps are a no-op.
    ///
    /// # Errors
    ///
    /// - [`crate::RewardsError::ArithmeticOverflow`] on overflow; the state is
    ///   left untouched
    pub fn advance(&mut self, clock: &EpochClock, now: Timestamp) -> Result<Amount> {
        if !self.has_window(now) {
            return Ok(0);
        }
        let delta = self.pending(clock, now)?;
        self.total_emitted = math::add(self.total_emitted, delta)?;
        self.last_checkpoint_time = now;
        Ok(delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidal_emission::EmissionSchedule;

    fn clock() -> EpochClock {
        // 1000 units per 100-second epoch.
        EpochClock::new(EmissionSchedule::new(1_000, 11_000, 100, 1_000).expect("schedule"))
            .expect("clock")
    }

    #[test]
    fn test_open_before_start_uses_start() {
        let state = PoolState::open(PoolId::Staking, WeightRatio::new(1, 2), 1_000, 10);
        assert_eq!(state.last_checkpoint_time, 1_000);
        assert_eq!(state.total_emitted, 0);
    }

    #[test]
    fn test_advance_applies_ratio() {
        let clock = clock();
        let mut state = PoolState::open(PoolId::Staking, WeightRatio::new(1, 2), 1_000, 1_000);
        let delta = state.advance(&clock, 1_050).expect("advance");
        assert_eq!(delta, 250);
        assert_eq!(state.total_emitted, 250);
        assert_eq!(state.last_checkpoint_time, 1_050);
    }

    #[test]
    fn test_advance_same_time_is_noop() {
        let clock = clock();
        let mut state = PoolState::open(PoolId::Staking, WeightRatio::new(1, 1), 1_000, 1_000);
        state.advance(&clock, 1_010).expect("first");
        let before = state.clone();
        assert_eq!(state.advance(&clock, 1_010).expect("repeat"), 0);
        assert_eq!(state.advance(&clock, 1_005).expect("stale"), 0);
        assert_eq!(state, before);
    }

    #[test]
    fn test_pending_matches_advance() {
        let clock = clock();
        let mut state = PoolState::open(PoolId::Staking, WeightRatio::new(2, 3), 1_000, 1_000);
        let pending = state.pending(&clock, 1_234).expect("pending");
        assert_eq!(state.advance(&clock, 1_234).expect("advance"), pending);
    }

    #[test]
    fn test_defer_carries_delta() {
        let clock = clock();
        let mut state = PoolState::open(PoolId::Staking, WeightRatio::new(1, 2), 1_000, 1_000);
        assert_eq!(state.defer(&clock, 1_050).expect("defer"), 250);
        assert_eq!(state.unattributed, 250);
        assert_eq!(state.total_emitted, 250);

        state.set_ratio(WeightRatio::new(1, 1));
        assert_eq!(state.attributable(&clock, 1_100).expect("attributable"), 750);
        assert_eq!(state.take_unattributed(), 250);
        assert_eq!(state.unattributed, 0);
    }

    #[test]
    fn test_legacy_json_defaults_unattributed() {
        let json = r#"{"pool":"staking","total_emitted":"5","last_checkpoint_time":7,"weight_numerator":"1","weight_denominator":"2"}"#;
        let state: PoolState = serde_json::from_str(json).expect("deserialize");
        assert_eq!(state.unattributed, 0);
    }

    #[test]
    fn test_zero_ratio_still_moves_checkpoint() {
        let clock = clock();
        let mut state = PoolState::open(PoolId::Staking, WeightRatio::ZERO, 1_000, 1_000);
        assert_eq!(state.advance(&clock, 2_000).expect("advance"), 0);
        assert_eq!(state.last_checkpoint_time, 2_000);
    }
}

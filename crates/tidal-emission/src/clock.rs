//! Rate lookup and emission integration.
//!
//! ## Rounding policy
//!
//! The per-epoch rate table is built once with integer multiply-then-floor:
//!
//! ```text
//! rate(1)   = initial_rate_per_epoch
//! rate(n+1) = floor(rate(n) * 99 / 100)
//! ```
//!
//! Emission is read off a floored cumulative curve:
//!
//! ```text
//! C(t) = sum(rate(1..k)) + floor(rate(k+1) * (t - epoch_start(k+1)) / epoch_duration)
//! emission_between(a, b) = C(b) - C(a)
//! ```
//!
//! Within one epoch this is the piecewise-constant rate integrated over the
//! window and floored once; across boundaries whole epochs contribute their
//! exact rate. Because every window is a difference of the same curve,
//! emission is exactly additive and independent of checkpoint cadence.

use tidal_types::{Amount, Timestamp, DECAY_DENOMINATOR, DECAY_NUMERATOR};

use crate::schedule::EmissionSchedule;
use crate::{EmissionError, Result};

/// Pure function of wall-clock time to emission rate and cumulative emission.
#[derive(Clone, Debug)]
pub struct EpochClock {
    schedule: EmissionSchedule,
    /// Rate of each epoch slot, index 0 is epoch 1.
    rates: Vec<Amount>,
    /// Emission at the start of each slot; one extra trailing entry.
    cumulative: Vec<Amount>,
}

impl EpochClock {
    /// Build the clock and its rate table.
    ///
    /// # Errors
    ///
    /// - [`EmissionError::InvalidSchedule`] if the schedule is invalid
    /// - [`EmissionError::Overflow`] if the cumulative total overflows
    pub fn new(schedule: EmissionSchedule) -> Result<Self> {
        schedule.validate()?;

        let slots = schedule.epoch_slots() as usize;
        let mut rates = Vec::with_capacity(slots);
        let mut cumulative = Vec::with_capacity(slots + 1);
        let mut rate = schedule.initial_rate_per_epoch;
        let mut total: Amount = 0;
        cumulative.push(total);

        for _ in 0..slots {
            rates.push(rate);
            total = total.checked_add(rate).ok_or(EmissionError::Overflow)?;
            cumulative.push(total);
            rate = decay(rate)?;
        }

        tracing::debug!(
            start = schedule.start,
            end = schedule.end,
            epochs = slots,
            "emission clock initialized"
        );

        Ok(Self {
            schedule,
            rates,
            cumulative,
        })
    }

    /// The schedule this clock was built from.
    pub fn schedule(&self) -> &EmissionSchedule {
        &self.schedule
    }

    /// The per-epoch rate table (index 0 is epoch 1).
    pub fn epoch_rates(&self) -> &[Amount] {
        &self.rates
    }

    /// Current rate per epoch and 1-based epoch index.
    ///
    /// Returns `(0, 0)` outside `[start, end)`.
    pub fn rate(&self, now: Timestamp) -> (Amount, u64) {
        if !self.schedule.is_active(now) {
            return (0, 0);
        }
        let slot = self.slot(now);
        let rate = self.rates.get(slot).copied().unwrap_or(0);
        (rate, slot as u64 + 1)
    }

    /// 1-based epoch index at `now`, or 0 outside the schedule.
    pub fn epoch_index(&self, now: Timestamp) -> u64 {
        self.rate(now).1
    }

    /// Total units emitted over `[from, to)`, clipped to `[start, end)`.
    ///
    /// # Errors
    ///
    /// - [`EmissionError::Overflow`] on arithmetic overflow
    pub fn emission_between(&self, from: Timestamp, to: Timestamp) -> Result<Amount> {
        if from >= to {
            return Ok(0);
        }
        let upper = self.cumulative_at(to)?;
        let lower = self.cumulative_at(from)?;
        upper.checked_sub(lower).ok_or(EmissionError::Overflow)
    }

    /// Total units emitted over the whole schedule.
    ///
    /// # Errors
    ///
    /// - [`EmissionError::Overflow`] on arithmetic overflow
    pub fn total_emission(&self) -> Result<Amount> {
        self.cumulative_at(self.schedule.end)
    }

    /// Units emitted from `start` up to `t`.
    ///
    /// # Errors
    ///
    /// - [`EmissionError::Overflow`] on arithmetic overflow
    pub fn cumulative_at(&self, t: Timestamp) -> Result<Amount> {
        let t = t.clamp(self.schedule.start, self.schedule.end);
        if t == self.schedule.start {
            return Ok(0);
        }

        let slot = self.slot(t);
        let Some(&rate) = self.rates.get(slot) else {
            return Ok(self.cumulative[self.rates.len()]);
        };

        let slot_start = self.schedule.start + slot as u64 * self.schedule.epoch_duration;
        let elapsed = Amount::from(t - slot_start);
        let partial = rate.checked_mul(elapsed).ok_or(EmissionError::Overflow)?
            / Amount::from(self.schedule.epoch_duration);

        self.cumulative[slot]
            .checked_add(partial)
            .ok_or(EmissionError::Overflow)
    }

    /// 0-based slot containing `t`; `t` must not precede `start`.
    fn slot(&self, t: Timestamp) -> usize {
        ((t - self.schedule.start) / self.schedule.epoch_duration) as usize
    }
}

/// Apply one epoch of decay with floor rounding.
fn decay(rate: Amount) -> Result<Amount> {
    rate.checked_mul(DECAY_NUMERATOR)
        .map(|scaled| scaled / DECAY_DENOMINATOR)
        .ok_or(EmissionError::Overflow)
}

//! Immutable emission schedule parameters.
//!
//! ## Defaults
//!
//! - [`EPOCH_DURATION_SECS`] = 2,629,743 seconds (one average calendar month)
//! - [`DEFAULT_EPOCH_COUNT`] = 120 epochs
//! - [`DEFAULT_INITIAL_RATE_PER_EPOCH`] = 34,255,400,000,000 units

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tidal_types::{
    Amount, Timestamp, DEFAULT_EPOCH_COUNT, DEFAULT_INITIAL_RATE_PER_EPOCH, EPOCH_DURATION_SECS,
};

use crate::{EmissionError, Result};

/// Upper bound on the number of epochs a schedule may span.
pub const MAX_EPOCHS: u64 = 10_000;

/// Emission schedule: `[start, end)` split into fixed-length epochs.
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmissionSchedule {
    /// First second of emission.
    pub start: Timestamp,
    /// First second after emission ends.
    pub end: Timestamp,
    /// Length of one epoch in seconds.
    pub epoch_duration: u64,
    /// Units emitted over the whole first epoch.
    #[serde_as(as = "DisplayFromStr")]
    pub initial_rate_per_epoch: Amount,
}

impl EmissionSchedule {
    /// Create a schedule after validating its parameters.
    ///
    /// # Errors
    ///
    /// - [`EmissionError::InvalidSchedule`] if `end <= start`, the epoch
    ///   duration is zero, or the schedule spans more than [`MAX_EPOCHS`]
    pub fn new(
        start: Timestamp,
        end: Timestamp,
        epoch_duration: u64,
        initial_rate_per_epoch: Amount,
    ) -> Result<Self> {
        let schedule = Self {
            start,
            end,
            epoch_duration,
            initial_rate_per_epoch,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// The protocol default: 120 monthly epochs starting at `start`.
    ///
    /// # Errors
    ///
    /// - [`EmissionError::Overflow`] if the end timestamp overflows
    pub fn standard(start: Timestamp) -> Result<Self> {
        let span = EPOCH_DURATION_SECS
            .checked_mul(DEFAULT_EPOCH_COUNT)
            .ok_or(EmissionError::Overflow)?;
        let end = start.checked_add(span).ok_or(EmissionError::Overflow)?;
        Self::new(start, end, EPOCH_DURATION_SECS, DEFAULT_INITIAL_RATE_PER_EPOCH)
    }

    /// Check the schedule invariants.
    ///
    /// # Errors
    ///
    /// - [`EmissionError::InvalidSchedule`] on any violated invariant
    pub fn validate(&self) -> Result<()> {
        if self.epoch_duration == 0 {
            return Err(EmissionError::InvalidSchedule(
                "epoch duration must be positive".to_string(),
            ));
        }
        if self.end <= self.start {
            return Err(EmissionError::InvalidSchedule(format!(
                "end {} must be after start {}",
                self.end, self.start
            )));
        }
        if self.epoch_slots() > MAX_EPOCHS {
            return Err(EmissionError::InvalidSchedule(format!(
                "schedule spans {} epochs, maximum is {MAX_EPOCHS}",
                self.epoch_slots()
            )));
        }
        Ok(())
    }

    /// Number of whole epochs in the schedule.
    pub fn epoch_count(&self) -> u64 {
        (self.end - self.start) / self.epoch_duration
    }

    /// Number of epochs that carry a rate, counting a trailing partial one.
    pub fn epoch_slots(&self) -> u64 {
        (self.end - self.start).div_ceil(self.epoch_duration)
    }

    /// Whether `now` lies inside `[start, end)`.
    pub fn is_active(&self, now: Timestamp) -> bool {
        now >= self.start && now < self.end
    }

    /// Bounds `[from, to)` of the 1-based epoch `index`, clipped to `end`.
    pub fn epoch_bounds(&self, index: u64) -> Option<(Timestamp, Timestamp)> {
        if index == 0 || index > self.epoch_slots() {
            return None;
        }
        let from = self.start + (index - 1) * self.epoch_duration;
        let to = from.saturating_add(self.epoch_duration).min(self.end);
        Some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_schedule() {
        let schedule = EmissionSchedule::standard(1_700_000_000).expect("standard");
        assert_eq!(schedule.epoch_count(), 120);
        assert_eq!(schedule.epoch_slots(), 120);
        assert_eq!(schedule.end - schedule.start, 120 * EPOCH_DURATION_SECS);
        assert_eq!(schedule.initial_rate_per_epoch, 34_255_400_000_000);
    }

    #[test]
    fn test_rejects_inverted_window() {
        assert!(EmissionSchedule::new(100, 100, 10, 1).is_err());
        assert!(EmissionSchedule::new(100, 50, 10, 1).is_err());
    }

    #[test]
    fn test_rejects_zero_epoch_duration() {
        assert!(EmissionSchedule::new(0, 100, 0, 1).is_err());
    }

    #[test]
    fn test_rejects_too_many_epochs() {
        assert!(EmissionSchedule::new(0, MAX_EPOCHS + 1, 1, 1).is_err());
        assert!(EmissionSchedule::new(0, MAX_EPOCHS, 1, 1).is_ok());
    }

    #[test]
    fn test_partial_trailing_epoch() {
        let schedule = EmissionSchedule::new(0, 25, 10, 100).expect("schedule");
        assert_eq!(schedule.epoch_count(), 2);
        assert_eq!(schedule.epoch_slots(), 3);
        assert_eq!(schedule.epoch_bounds(3), Some((20, 25)));
        assert_eq!(schedule.epoch_bounds(4), None);
        assert_eq!(schedule.epoch_bounds(0), None);
    }

    #[test]
    fn test_is_active() {
        let schedule = EmissionSchedule::new(10, 20, 5, 1).expect("schedule");
        assert!(!schedule.is_active(9));
        assert!(schedule.is_active(10));
        assert!(schedule.is_active(19));
        assert!(!schedule.is_active(20));
    }

    #[test]
    fn test_json_carries_rate_as_string() {
        let schedule = EmissionSchedule::new(0, 10, 5, 7).expect("schedule");
        let json = serde_json::to_value(schedule).expect("serialize");
        assert_eq!(json["initial_rate_per_epoch"], "7");
        let parsed: EmissionSchedule = serde_json::from_value(json).expect("deserialize");
        assert_eq!(parsed, schedule);
    }
}

//! Emergency pause for claim settlement.
//!
//! Pausing stops funds leaving the funding wallet. Accrual keeps running so
//! no emission is lost while claims are halted.

use serde::{Deserialize, Serialize};

use crate::{Result, RewardsError};

/// Claim pause switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseSwitch {
    paused: bool,
}

impl PauseSwitch {
    /// Create an engaged or released switch.
    pub fn new(paused: bool) -> Self {
        Self { paused }
    }

    /// Halt claims.
    pub fn pause(&mut self) {
        tracing::warn!("claims paused");
        self.paused = true;
    }

    /// Resume claims.
    pub fn resume(&mut self) {
        tracing::info!("claims resumed");
        self.paused = false;
    }

    /// Whether claims are halted.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// # Errors
    ///
    /// - [`RewardsError::Paused`] if claims are halted
    pub fn check(&self) -> Result<()> {
        if self.paused {
            return Err(RewardsError::Paused);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause_and_resume() {
        let mut switch = PauseSwitch::default();
        assert!(switch.check().is_ok());

        switch.pause();
        assert!(switch.is_paused());
        assert_eq!(switch.check(), Err(RewardsError::Paused));

        switch.resume();
        assert!(!switch.is_paused());
        assert!(switch.check().is_ok());
    }
}

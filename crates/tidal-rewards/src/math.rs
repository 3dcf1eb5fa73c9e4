//! Overflow-checked proportional arithmetic.
//!
//! Share balances of 18-decimal tokens routinely exceed `2^64`, so
//! `amount * share` can exceed `u128` even when the final quotient is small.
//! Products are taken in 256 bits and only the quotient is narrowed back.

use tidal_types::Amount;
use uint::construct_uint;

use crate::RewardsError;

construct_uint! {
    /// 256-bit unsigned integer.
    pub struct U256(4);
}

/// `floor(amount * numerator / denominator)`.
///
/// A zero denominator yields zero: an empty pool or a zero-weight ratio
/// absorbs the amount without crediting anyone.
///
/// # Errors
///
/// - [`RewardsError::ArithmeticOverflow`] if the quotient does not fit in 128 bits
pub fn mul_div(amount: Amount, numerator: u128, denominator: u128) -> crate::Result<Amount> {
    if denominator == 0 {
        return Ok(0);
    }
    let quotient = U256::from(amount) * U256::from(numerator) / U256::from(denominator);
    if quotient.bits() > 128 {
        return Err(RewardsError::ArithmeticOverflow);
    }
    Ok(quotient.low_u128())
}

/// Checked addition that maps overflow onto [`RewardsError::ArithmeticOverflow`].
pub fn add(lhs: Amount, rhs: Amount) -> crate::Result<Amount> {
    lhs.checked_add(rhs).ok_or(RewardsError::ArithmeticOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_floors() {
        assert_eq!(mul_div(10, 1, 3).expect("mul_div"), 3);
        assert_eq!(mul_div(100, 2, 3).expect("mul_div"), 66);
        assert_eq!(mul_div(0, 5, 7).expect("mul_div"), 0);
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert_eq!(mul_div(1_000, 1, 0).expect("mul_div"), 0);
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // 1e15 * 1e27 overflows u128 but the quotient fits.
        let pool_delta: Amount = 1_000_000_000_000_000;
        let share: u128 = 1_000_000_000_000_000_000_000_000_000;
        let total = share * 3;
        assert_eq!(mul_div(pool_delta, share, total).expect("mul_div"), 333_333_333_333_333);
    }

    #[test]
    fn test_mul_div_overflowing_quotient() {
        assert_eq!(
            mul_div(Amount::MAX, 2, 1),
            Err(RewardsError::ArithmeticOverflow)
        );
        assert_eq!(mul_div(Amount::MAX, 1, 1).expect("fits"), Amount::MAX);
    }

    #[test]
    fn test_add_overflow() {
        assert_eq!(add(Amount::MAX, 1), Err(RewardsError::ArithmeticOverflow));
        assert_eq!(add(2, 3).expect("add"), 5);
    }
}

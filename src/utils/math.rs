//! Consensus-critical arithmetic.
//!
//! Settlement credits are computed in exact rationals and rounded half-even
//! exactly once per side; fees are floor-truncated in integer arithmetic.
//! Any deviation here is a ledger fork, not a bug fix.

use num::bigint::BigInt;
use num::rational::BigRational;
use num::{Integer, One, Signed, ToPrimitive};

use crate::config::UNIT;

/// Round a rational to the nearest integer, ties to even.
pub fn round_half_even(value: &BigRational) -> BigInt {
    let floor = value.floor().to_integer();
    let frac = value - BigRational::from_integer(floor.clone());
    let half = BigRational::new(BigInt::one(), BigInt::from(2));

    match frac.cmp(&half) {
        std::cmp::Ordering::Less => floor,
        std::cmp::Ordering::Greater => floor + BigInt::one(),
        std::cmp::Ordering::Equal => {
            if floor.is_even() {
                floor
            } else {
                floor + BigInt::one()
            }
        }
    }
}

/// Exact rational from an f64. `None` for NaN and infinities, which can
/// never settle a bet.
pub fn rational_from_f64(value: f64) -> Option<BigRational> {
    BigRational::from_float(value)
}

/// Floor-truncated fee: `fee_fraction_int * total_escrow / UNIT`.
pub fn truncated_fee(fee_fraction_int: i64, total_escrow: i64) -> i64 {
    let product = i128::from(fee_fraction_int) * i128::from(total_escrow);
    (product.div_euclid(i128::from(UNIT))) as i64
}

/// Oracle rates travel as integer fiat cents; this renders them as a fiat
/// amount with two decimals.
pub fn satoshirate_to_fiat(satoshirate: i64) -> f64 {
    satoshirate as f64 / 100.0
}

/// Clamp a rounded credit into `[0, escrow_less_fee]` bounds expressed as
/// i64, for storage after the liquidation branches have run.
pub fn credit_to_i64(credit: &BigInt) -> i64 {
    if credit.is_negative() {
        return 0;
    }
    credit.to_i64().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ratio(numer: i64, denom: i64) -> BigRational {
        BigRational::new(BigInt::from(numer), BigInt::from(denom))
    }

    #[test]
    fn test_round_half_even_ties() {
        assert_eq!(round_half_even(&ratio(1, 2)), BigInt::from(0));
        assert_eq!(round_half_even(&ratio(3, 2)), BigInt::from(2));
        assert_eq!(round_half_even(&ratio(5, 2)), BigInt::from(2));
        assert_eq!(round_half_even(&ratio(-1, 2)), BigInt::from(0));
        assert_eq!(round_half_even(&ratio(-3, 2)), BigInt::from(-2));
    }

    #[test]
    fn test_round_half_even_plain() {
        assert_eq!(round_half_even(&ratio(7, 4)), BigInt::from(2));
        assert_eq!(round_half_even(&ratio(5, 4)), BigInt::from(1));
        assert_eq!(round_half_even(&ratio(10, 1)), BigInt::from(10));
    }

    #[test]
    fn test_truncated_fee() {
        // 5% of 200
        assert_eq!(truncated_fee(5_000_000, 200), 10);
        // truncation, not rounding
        assert_eq!(truncated_fee(5_000_000, 199), 9);
        assert_eq!(truncated_fee(0, 1_000), 0);
    }

    #[test]
    fn test_truncated_fee_large_escrow() {
        let escrow = i64::MAX / 2;
        let fee = truncated_fee(100_000_000, escrow);
        assert_eq!(fee, escrow);
    }

    #[test]
    fn test_satoshirate_to_fiat() {
        assert_eq!(satoshirate_to_fiat(100), 1.0);
        assert_eq!(satoshirate_to_fiat(250), 2.5);
        assert_eq!(satoshirate_to_fiat(0), 0.0);
    }

    #[test]
    fn test_rational_from_f64_rejects_nan() {
        assert!(rational_from_f64(f64::NAN).is_none());
        assert!(rational_from_f64(f64::INFINITY).is_none());
        assert!(rational_from_f64(20.0).is_some());
    }
}

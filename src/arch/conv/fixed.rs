use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul};

/// Number of fractional bits in a sample.
pub const FRAC_BITS: u32 = 24;

/// 32-bit signed fixed-point sample with 24 fractional bits.
///
/// Range is roughly [-128, 128) with a resolution of 2^-24. Addition wraps and
/// multiplication keeps bits [55:24] of the 64-bit product, the same bit
/// window the datapath extracts, so there is no saturation anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Q24(i32);

impl Q24 {
  pub const ZERO: Q24 = Q24(0);
  pub const ONE: Q24 = Q24(1 << FRAC_BITS);

  pub const fn from_bits(bits: i32) -> Self {
    Q24(bits)
  }

  pub const fn to_bits(self) -> i32 {
    self.0
  }

  /// Integer value placed in the integer field; wraps outside [-128, 128).
  pub fn from_int(value: i32) -> Self {
    Q24(value.wrapping_shl(FRAC_BITS))
  }

  /// Converts by truncating toward zero. Out-of-range inputs clamp to the
  /// representable extremes since this is only used on the host side.
  pub fn from_f64(value: f64) -> Self {
    Q24((value * (1u64 << FRAC_BITS) as f64) as i32)
  }

  pub fn to_f64(self) -> f64 {
    self.0 as f64 / (1u64 << FRAC_BITS) as f64
  }

  /// 32x32 -> 64 multiply, result taken from bits [55:24].
  pub fn mul_q24(self, rhs: Q24) -> Q24 {
    let product = (self.0 as i64) * (rhs.0 as i64);
    Q24((product >> FRAC_BITS) as i32)
  }

  pub fn wrapping_add(self, rhs: Q24) -> Q24 {
    Q24(self.0.wrapping_add(rhs.0))
  }
}

impl Add for Q24 {
  type Output = Q24;

  fn add(self, rhs: Q24) -> Q24 {
    self.wrapping_add(rhs)
  }
}

impl AddAssign for Q24 {
  fn add_assign(&mut self, rhs: Q24) {
    *self = self.wrapping_add(rhs);
  }
}

impl Mul for Q24 {
  type Output = Q24;

  fn mul(self, rhs: Q24) -> Q24 {
    self.mul_q24(rhs)
  }
}

impl Sum for Q24 {
  fn sum<I: Iterator<Item = Q24>>(iter: I) -> Q24 {
    iter.fold(Q24::ZERO, Q24::wrapping_add)
  }
}

impl fmt::Display for Q24 {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.6}", self.to_f64())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn integer_products_are_exact() {
    assert_eq!(Q24::from_int(3) * Q24::from_int(-4), Q24::from_int(-12));
    assert_eq!(Q24::ONE * Q24::from_int(7), Q24::from_int(7));
    assert_eq!(Q24::from_f64(0.5) * Q24::from_f64(0.5), Q24::from_f64(0.25));
  }

  #[test]
  fn product_keeps_bit_window() {
    // 2^-24 * 2^-24 falls below the resolution and disappears.
    let lsb = Q24::from_bits(1);
    assert_eq!(lsb * lsb, Q24::ZERO);

    // Negative products shift arithmetically, so the discarded bits floor.
    let neg = Q24::from_bits(-1);
    assert_eq!(neg * Q24::from_bits(1 << 23), Q24::from_bits(-1));

    let a = Q24::from_bits(0x0123_4567);
    let b = Q24::from_bits(-0x0076_5432);
    let expected = (((a.to_bits() as i64) * (b.to_bits() as i64)) >> 24) as i32;
    assert_eq!((a * b).to_bits(), expected);
  }

  #[test]
  fn overflow_wraps_instead_of_saturating() {
    let big = Q24::from_int(100);
    assert_eq!(big * Q24::from_int(2), Q24::from_bits((200i64 << 24) as i32));
    assert_eq!(Q24::from_bits(i32::MAX) + Q24::from_bits(1), Q24::from_bits(i32::MIN));
  }

  #[test]
  fn float_conversion_truncates_toward_zero() {
    assert_eq!(Q24::from_f64(1.5).to_bits(), 3 << 23);
    assert_eq!(Q24::from_f64(-1e-9), Q24::ZERO);
    assert_eq!(Q24::from_f64(-2.25).to_f64(), -2.25);
  }

  #[test]
  fn sum_wraps() {
    let total: Q24 = [Q24::from_int(1), Q24::from_int(2), Q24::from_int(-5)].into_iter().sum();
    assert_eq!(total, Q24::from_int(-2));
  }
}

//! Numeric type shared by the formula language and the value graph

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, AddAssign, Div, Mul, Sub};

/// A number produced by evaluating formulas
///
/// Wraps an `f64`. Division by zero and NaN follow IEEE semantics and are
/// never masked by the engine.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Number(pub f64);

impl Number {
    pub const ZERO: Number = Number(0.0);
    pub const ONE: Number = Number(1.0);

    /// Create a new number
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Get the raw float
    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Check if this number is exactly zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// A number is truthy when it is at least 1
    pub fn is_truthy(&self) -> bool {
        self.0 >= 1.0
    }

    /// 1 for true, 0 for false
    pub fn from_bool(b: bool) -> Self {
        if b {
            Self::ONE
        } else {
            Self::ZERO
        }
    }

    /// Raise to a power
    pub fn pow(self, exponent: Number) -> Number {
        Number(self.0.powf(exponent.0))
    }

    /// Pairwise minimum; NaN on either side propagates
    pub fn min(self, other: Number) -> Number {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            Some(_) => self,
            None => Number(f64::NAN),
        }
    }

    /// Pairwise maximum; NaN on either side propagates
    pub fn max(self, other: Number) -> Number {
        match self.partial_cmp(&other) {
            Some(Ordering::Less) => other,
            Some(_) => self,
            None => Number(f64::NAN),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Add for Number {
    type Output = Number;

    fn add(self, rhs: Number) -> Number {
        Number(self.0 + rhs.0)
    }
}

impl AddAssign for Number {
    fn add_assign(&mut self, rhs: Number) {
        self.0 += rhs.0;
    }
}

impl Sub for Number {
    type Output = Number;

    fn sub(self, rhs: Number) -> Number {
        Number(self.0 - rhs.0)
    }
}

impl Mul for Number {
    type Output = Number;

    fn mul(self, rhs: Number) -> Number {
        Number(self.0 * rhs.0)
    }
}

impl Div for Number {
    type Output = Number;

    fn div(self, rhs: Number) -> Number {
        Number(self.0 / rhs.0)
    }
}

// Convenient From implementations
impl From<f64> for Number {
    fn from(f: f64) -> Self {
        Number(f)
    }
}

impl From<f32> for Number {
    fn from(f: f32) -> Self {
        Number(f as f64)
    }
}

impl From<i64> for Number {
    fn from(i: i64) -> Self {
        Number(i as f64)
    }
}

impl From<i32> for Number {
    fn from(i: i32) -> Self {
        Number(i as f64)
    }
}

impl From<u32> for Number {
    fn from(i: u32) -> Self {
        Number(i as f64)
    }
}

impl From<bool> for Number {
    fn from(b: bool) -> Self {
        Number::from_bool(b)
    }
}

impl From<Number> for f64 {
    fn from(n: Number) -> Self {
        n.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthiness() {
        assert!(!Number(0.0).is_truthy());
        assert!(!Number(0.99).is_truthy());
        assert!(Number(1.0).is_truthy());
        assert!(Number(42.0).is_truthy());
        assert_eq!(Number::from_bool(true), Number::ONE);
        assert_eq!(Number::from_bool(false), Number::ZERO);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(Number(3.0).min(Number(2.0)), Number(2.0));
        assert_eq!(Number(3.0).max(Number(2.0)), Number(3.0));
        assert!(Number(f64::NAN).min(Number(1.0)).0.is_nan());
        assert!(Number(1.0).max(Number(f64::NAN)).0.is_nan());
    }

    #[test]
    fn test_division_by_zero_is_not_masked() {
        assert_eq!(Number(1.0) / Number(0.0), Number(f64::INFINITY));
        assert!((Number(0.0) / Number(0.0)).0.is_nan());
    }

    #[test]
    fn test_ron_transparent() {
        let n: Number = ron::from_str("2.5").unwrap();
        assert_eq!(n, Number(2.5));
    }
}

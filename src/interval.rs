//! Integer intervals with infinite bounds.
//!
//! An [`Interval`] `[low, high]` denotes every mathematical integer between
//! its bounds. Bounds are arbitrary precision, so arithmetic never wraps or
//! saturates. The empty interval is canonically `[+∞, -∞]`.

use std::cmp::{max, min, Ordering};
use std::fmt;

use num_bigint::{BigInt, Sign};

/// Bound of an interval: -∞, finite value, or +∞.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Bound {
    NegInf,
    Finite(BigInt),
    PosInf,
}

impl Bound {
    pub fn finite(value: impl Into<BigInt>) -> Self {
        Bound::Finite(value.into())
    }

    pub fn as_finite(&self) -> Option<&BigInt> {
        match self {
            Bound::Finite(n) => Some(n),
            _ => None,
        }
    }

    /// Sign of the bound relative to zero.
    pub fn signum(&self) -> Ordering {
        match self {
            Bound::NegInf => Ordering::Less,
            Bound::PosInf => Ordering::Greater,
            Bound::Finite(n) => match n.sign() {
                Sign::Minus => Ordering::Less,
                Sign::NoSign => Ordering::Equal,
                Sign::Plus => Ordering::Greater,
            },
        }
    }

    fn infinity(sign: Ordering) -> Bound {
        match sign {
            Ordering::Less => Bound::NegInf,
            Ordering::Equal => Bound::finite(0),
            Ordering::Greater => Bound::PosInf,
        }
    }

    pub fn add(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a + b),
            (Bound::NegInf, Bound::PosInf) | (Bound::PosInf, Bound::NegInf) => {
                // Undefined: use top
                Bound::PosInf
            }
            (Bound::NegInf, _) | (_, Bound::NegInf) => Bound::NegInf,
            (Bound::PosInf, _) | (_, Bound::PosInf) => Bound::PosInf,
        }
    }

    pub fn sub(&self, other: &Bound) -> Bound {
        self.add(&other.neg())
    }

    pub fn mul(&self, other: &Bound) -> Bound {
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a * b),
            // Corners of an interval product: 0 * ∞ contributes 0.
            _ => Bound::infinity(multiply_signs(self.signum(), other.signum())),
        }
    }

    /// Truncating division (rounds toward zero).
    ///
    /// The divisor must not be zero. A finite value divided by an infinite
    /// one is 0, the limit of `x / y` as `|y|` grows.
    pub fn div(&self, other: &Bound) -> Bound {
        debug_assert_ne!(other.signum(), Ordering::Equal, "division by a zero bound");
        match (self, other) {
            (Bound::Finite(a), Bound::Finite(b)) => Bound::Finite(a / b),
            (Bound::Finite(_), _) => Bound::finite(0),
            // ∞ / ∞ is dominated by the other corners; 0 is within the range.
            (_, Bound::NegInf | Bound::PosInf) => Bound::finite(0),
            _ => Bound::infinity(multiply_signs(self.signum(), other.signum())),
        }
    }

    pub fn neg(&self) -> Bound {
        match self {
            Bound::NegInf => Bound::PosInf,
            Bound::Finite(n) => Bound::Finite(-n),
            Bound::PosInf => Bound::NegInf,
        }
    }

    pub fn abs(&self) -> Bound {
        match self.signum() {
            Ordering::Less => self.neg(),
            _ => self.clone(),
        }
    }
}

fn multiply_signs(a: Ordering, b: Ordering) -> Ordering {
    match (a, b) {
        (Ordering::Equal, _) | (_, Ordering::Equal) => Ordering::Equal,
        (x, y) if x == y => Ordering::Greater,
        _ => Ordering::Less,
    }
}

impl From<i64> for Bound {
    fn from(value: i64) -> Self {
        Bound::finite(value)
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::NegInf => write!(f, "-∞"),
            Bound::Finite(n) => write!(f, "{}", n),
            Bound::PosInf => write!(f, "+∞"),
        }
    }
}

/// Result of comparing two intervals by set inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    /// `self ⊂ other`.
    Subset,
    /// `self = other`.
    Equal,
    /// `self ⊃ other`.
    Superset,
    /// Neither contains the other.
    Incomparable,
}

/// Interval: [low, high].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval {
    pub low: Bound,
    pub high: Bound,
}

impl Interval {
    pub fn new(low: Bound, high: Bound) -> Self {
        if low > high {
            Self::bottom()
        } else {
            Self { low, high }
        }
    }

    pub fn from_range(low: i64, high: i64) -> Self {
        Self::new(Bound::finite(low), Bound::finite(high))
    }

    pub fn constant(value: impl Into<BigInt>) -> Self {
        let value = value.into();
        Self {
            low: Bound::Finite(value.clone()),
            high: Bound::Finite(value),
        }
    }

    pub fn top() -> Self {
        Self {
            low: Bound::NegInf,
            high: Bound::PosInf,
        }
    }

    pub fn bottom() -> Self {
        Self {
            low: Bound::PosInf,
            high: Bound::NegInf,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.low > self.high
    }

    pub fn is_top(&self) -> bool {
        self.low == Bound::NegInf && self.high == Bound::PosInf
    }

    /// Returns the value if the interval is a single point.
    pub fn as_constant(&self) -> Option<&BigInt> {
        match (&self.low, &self.high) {
            (Bound::Finite(l), Bound::Finite(h)) if l == h => Some(l),
            _ => None,
        }
    }

    pub fn contains(&self, value: &BigInt) -> bool {
        let value = Bound::Finite(value.clone());
        self.low <= value && value <= self.high
    }

    /// Set inclusion: `self ⊆ other`.
    pub fn le(&self, other: &Interval) -> bool {
        if self.is_empty() {
            return true;
        }
        if other.is_empty() {
            return false;
        }
        other.low <= self.low && self.high <= other.high
    }

    pub fn inclusion(&self, other: &Interval) -> Inclusion {
        match (self.le(other), other.le(self)) {
            (true, true) => Inclusion::Equal,
            (true, false) => Inclusion::Subset,
            (false, true) => Inclusion::Superset,
            (false, false) => Inclusion::Incomparable,
        }
    }

    pub fn join(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        Interval {
            low: min(&self.low, &other.low).clone(),
            high: max(&self.high, &other.high).clone(),
        }
    }

    pub fn meet(&self, other: &Interval) -> Interval {
        Interval::new(max(&self.low, &other.low).clone(), min(&self.high, &other.high).clone())
    }

    pub fn widen(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }
        let low = if other.low < self.low { Bound::NegInf } else { self.low.clone() };
        let high = if other.high > self.high { Bound::PosInf } else { self.high.clone() };
        Interval { low, high }
    }

    pub fn add(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::bottom();
        }
        Interval::new(self.low.add(&other.low), self.high.add(&other.high))
    }

    pub fn sub(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::bottom();
        }
        Interval::new(self.low.sub(&other.high), self.high.sub(&other.low))
    }

    pub fn neg(&self) -> Interval {
        if self.is_empty() {
            return Interval::bottom();
        }
        Interval::new(self.high.neg(), self.low.neg())
    }

    pub fn mul(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::bottom();
        }
        hull([
            self.low.mul(&other.low),
            self.low.mul(&other.high),
            self.high.mul(&other.low),
            self.high.mul(&other.high),
        ])
    }

    /// Truncating division over the non-zero part of the divisor.
    ///
    /// A zero divisor raises at run time, so it contributes no result;
    /// dividing by `[0, 0]` yields the empty interval.
    pub fn div(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return Interval::bottom();
        }
        let mut result = Interval::bottom();
        for part in other.split_at_zero() {
            let quotient = hull([
                self.low.div(&part.low),
                self.low.div(&part.high),
                self.high.div(&part.low),
                self.high.div(&part.high),
            ]);
            result = result.join(&quotient);
        }
        result
    }

    /// Remainder of truncating division: the sign follows the dividend and
    /// the magnitude stays below the divisor's.
    pub fn rem(&self, other: &Interval) -> Interval {
        if self.is_empty() {
            return Interval::bottom();
        }
        let parts = other.split_at_zero();
        if parts.is_empty() {
            return Interval::bottom();
        }
        let largest_divisor = max(other.low.abs(), other.high.abs());
        let magnitude = match largest_divisor {
            Bound::Finite(m) => Bound::Finite(m - 1),
            infinite => infinite,
        };
        let floor = match self.low.signum() {
            Ordering::Less => max(self.low.clone(), magnitude.neg()),
            _ => Bound::finite(0),
        };
        let ceiling = match self.high.signum() {
            Ordering::Greater => min(self.high.clone(), magnitude),
            _ => Bound::finite(0),
        };
        Interval::new(floor, ceiling)
    }

    /// The negative and positive parts of the interval, without zero.
    fn split_at_zero(&self) -> Vec<Interval> {
        [
            self.meet(&Interval::new(Bound::NegInf, Bound::finite(-1))),
            self.meet(&Interval::new(Bound::finite(1), Bound::PosInf)),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect()
    }
}

fn hull<const N: usize>(corners: [Bound; N]) -> Interval {
    let low = corners.iter().min().cloned().unwrap_or(Bound::NegInf);
    let high = corners.iter().max().cloned().unwrap_or(Bound::PosInf);
    Interval::new(low, high)
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "⊥")
        } else {
            write!(f, "[{}, {}]", self.low, self.high)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(low: i64, high: i64) -> Interval {
        Interval::from_range(low, high)
    }

    #[test]
    fn test_interval_operations() {
        let i1 = range(0, 10);
        let i2 = range(5, 15);

        assert_eq!(i1.join(&i2), range(0, 15));
        assert_eq!(i1.meet(&i2), range(5, 10));
        assert_eq!(i1.widen(&i2), Interval::new(Bound::finite(0), Bound::PosInf));
        assert!(range(20, 30).meet(&i1).is_empty());
    }

    #[test]
    fn test_widen_is_upper_bound() {
        let samples = [range(0, 0), range(-3, 7), range(2, 4), Interval::top(), Interval::bottom()];
        for a in &samples {
            for b in &samples {
                let w = a.widen(b);
                assert!(a.le(&w), "{} not below {} ∇ {}", a, a, b);
                assert!(b.le(&w), "{} not below {} ∇ {}", b, a, b);
            }
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(range(0, 10).add(&range(1, 1)), range(1, 11));
        assert_eq!(range(0, 10).sub(&range(1, 2)), range(-2, 9));
        assert_eq!(range(-2, 3).mul(&range(4, 5)), range(-10, 15));
        assert_eq!(range(-2, 3).neg(), range(-3, 2));
        let unbounded = Interval::new(Bound::finite(0), Bound::PosInf);
        assert_eq!(unbounded.mul(&range(-1, -1)), Interval::new(Bound::NegInf, Bound::finite(0)));
    }

    #[test]
    fn test_division_skips_zero() {
        assert_eq!(range(10, 20).div(&range(2, 5)), range(2, 10));
        assert_eq!(range(10, 10).div(&range(-2, 2)), range(-10, 10));
        assert_eq!(range(-7, -7).div(&range(2, 2)), range(-3, -3));
        assert!(range(1, 5).div(&range(0, 0)).is_empty());
        let unbounded = Interval::new(Bound::finite(1), Bound::PosInf);
        assert_eq!(range(5, 5).div(&unbounded), range(0, 5));
    }

    #[test]
    fn test_remainder() {
        assert_eq!(range(0, 100).rem(&range(3, 3)), range(0, 2));
        assert_eq!(range(-100, 5).rem(&range(-4, 4)), range(-3, 3));
        assert_eq!(range(-1, -1).rem(&range(10, 10)), range(-1, 0));
        assert!(range(0, 5).rem(&range(0, 0)).is_empty());
    }

    #[test]
    fn test_inclusion() {
        let zero = Interval::constant(0);
        assert_eq!(zero.inclusion(&zero), Inclusion::Equal);
        assert_eq!(range(-2, 3).inclusion(&zero), Inclusion::Superset);
        assert_eq!(range(1, 10).inclusion(&zero), Inclusion::Incomparable);
        assert_eq!(Interval::bottom().inclusion(&zero), Inclusion::Subset);
        assert_eq!(range(0, 4).inclusion(&range(0, 5)), Inclusion::Subset);
    }

    #[test]
    fn test_display() {
        assert_eq!(range(1, 11).to_string(), "[1, 11]");
        assert_eq!(Interval::top().to_string(), "[-∞, +∞]");
        assert_eq!(Interval::bottom().to_string(), "⊥");
    }
}

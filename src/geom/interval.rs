use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::ops::{Range, RangeFrom, RangeFull, RangeInclusive, RangeTo, RangeToInclusive};

/// An interval of values, with an optionally-open start and/or end bound.
///
/// Used throughout the locators to represent the `t` range of interest along
/// a ray/segment (clamped to `[0, 1]` for finite segments), and as the
/// accumulator for narrowing that range as closer hits are found during
/// descent.
///
/// # Requirements
/// It is a logic error for `start > end`. This is not enforced for
/// performance reasons; violating it is unspecified behaviour, not UB.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Interval<T> {
    pub start: Option<T>,
    pub end: Option<T>,
}

impl<T> From<RangeFull> for Interval<T> {
    fn from(_value: RangeFull) -> Self { Self { start: None, end: None } }
}
impl<T> From<RangeInclusive<T>> for Interval<T> {
    fn from(value: RangeInclusive<T>) -> Self {
        let (min, max) = value.into_inner();
        Self {
            start: Some(min),
            end: Some(max),
        }
    }
}
impl<T> From<RangeTo<T>> for Interval<T> {
    fn from(value: RangeTo<T>) -> Self {
        Self {
            start: None,
            end: Some(value.end),
        }
    }
}
impl<T> From<RangeToInclusive<T>> for Interval<T> {
    fn from(value: RangeToInclusive<T>) -> Self {
        Self {
            start: None,
            end: Some(value.end),
        }
    }
}
impl<T> From<RangeFrom<T>> for Interval<T> {
    fn from(value: RangeFrom<T>) -> Self {
        Self {
            start: Some(value.start),
            end: None,
        }
    }
}
impl<T> From<Range<T>> for Interval<T> {
    fn from(value: Range<T>) -> Self {
        Self {
            start: Some(value.start),
            end: Some(value.end),
        }
    }
}

impl<T: Copy> Interval<T> {
    pub const fn new(start: T, end: T) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }
}

impl<T> Interval<T> {
    pub const FULL: Self = Self { start: None, end: None };
}

impl<T: PartialOrd + Copy> Interval<T> {
    /// Checks if the range `min..max` overlaps with `self`.
    pub fn range_overlaps(&self, min: &T, max: &T) -> bool {
        match self {
            Self { start: None, end: None } => true,
            Self {
                start: Some(start),
                end: Some(end),
            } => {
                let low = if min > start { min } else { start };
                let high = if max < end { max } else { end };
                low <= high
            }
            Self {
                start: None,
                end: Some(end),
            } => {
                let high = if max < end { max } else { end };
                min <= high
            }
            Self {
                start: Some(start),
                end: None,
            } => {
                let low = if min > start { min } else { start };
                low <= max
            }
        }
    }

    pub fn contains(&self, item: &T) -> bool {
        match self {
            Self {
                start: Some(start),
                end: Some(end),
            } => start <= item && item <= end,
            Self {
                start: Some(start),
                end: None,
            } => start <= item,
            Self {
                start: None,
                end: Some(end),
            } => item <= end,
            Self { start: None, end: None } => true,
        }
    }

    /// Returns a copy of `self` with `end` replaced, used to shrink the
    /// search interval once a candidate hit has been recorded (so later
    /// candidates are rejected unless they are strictly closer).
    pub fn with_some_end(self, end: T) -> Self { Self { end: Some(end), ..self } }

    pub fn with_some_start(self, start: T) -> Self {
        Self {
            start: Some(start),
            ..self
        }
    }
}

impl<T: PartialOrd + Copy> std::ops::BitAnd for Interval<T> {
    type Output = Interval<T>;

    /// Intersection of two intervals: the largest lower bound and smallest
    /// upper bound of the two.
    fn bitand(self, other: Self) -> Self::Output {
        let start = match (self.start, other.start) {
            (None, s) | (s, None) => s,
            (Some(a), Some(b)) => match T::partial_cmp(&a, &b).expect("interval bounds should be comparable") {
                Ordering::Less => Some(b),
                Ordering::Greater | Ordering::Equal => Some(a),
            },
        };

        let end = match (self.end, other.end) {
            (None, e) | (e, None) => e,
            (Some(a), Some(b)) => match T::partial_cmp(&a, &b).expect("interval bounds should be comparable") {
                Ordering::Less => Some(a),
                Ordering::Greater | Ordering::Equal => Some(b),
            },
        };

        Self { start, end }
    }
}

impl<T: Display> Display for Interval<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(start) = &self.start {
            write!(f, "{start}")?;
        }
        write!(f, "..")?;
        if let Some(end) = &self.end {
            write!(f, "{end}")?
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_overlaps_detects_disjoint_ranges() {
        let iv = Interval::new(0.0, 1.0);
        assert!(iv.range_overlaps(&0.5, &2.0));
        assert!(!iv.range_overlaps(&1.5, &2.0));
    }

    #[test]
    fn bitand_intersects_two_bounded_intervals() {
        let a = Interval::new(0.0, 10.0);
        let b = Interval::new(5.0, 15.0);
        let c = a & b;
        assert_eq!(c.start, Some(5.0));
        assert_eq!(c.end, Some(10.0));
    }
}

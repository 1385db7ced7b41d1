//! Fixed-width time periods and bucket-alignment arithmetic.
//!
//! A [`Period`] is the width of one aggregation bucket. It is parsed from a
//! human expression ("5 minutes", "1 hour") and provides the two pieces of
//! arithmetic every other component builds on: flooring an arbitrary
//! instant to its bucket start, and deriving a bucket's inclusive end.
//!
//! # Alignment reference
//!
//! Bucket boundaries are aligned to the **Unix epoch**
//! (1970-01-01T00:00:00Z): a bucket starts at every integer multiple of the
//! period duration measured from the epoch. This choice is externally
//! visible in every stored `start_date`, so it is fixed program-wide.

use crate::error::{ProjectionError, Result};
use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::str::FromStr;

/// Seconds per named unit, largest first. Used for both parsing and
/// rendering the canonical form.
const UNITS: [(&str, i64); 5] = [
    ("week", 604_800),
    ("day", 86_400),
    ("hour", 3_600),
    ("minute", 60),
    ("second", 1),
];

/// Upper bound on period length, chosen so `chrono::Duration::seconds`
/// stays in range.
const MAX_SECONDS: i64 = i64::MAX / 1_000;

/// A fixed bucket width with second granularity.
///
/// Two periods are equal when their total durations are equal, so
/// `"300 seconds"` and `"5 minutes"` parse to the same value and share the
/// same canonical form (`"5 minutes"`). The canonical form round-trips
/// through [`Period::parse`].
///
/// # Example
///
/// ```
/// use rollup_core::Period;
///
/// let five_min = Period::parse("5 minutes")?;
/// assert_eq!(five_min, Period::parse("300 seconds")?);
/// assert_eq!(five_min.to_string(), "5 minutes");
/// # Ok::<(), rollup_core::ProjectionError>(())
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    seconds: i64,
}

impl Period {
    /// Parse a magnitude + unit expression into a period.
    ///
    /// Accepted units: `second(s)`, `minute(s)`, `hour(s)`, `day(s)`,
    /// `week(s)`, case-insensitive. The magnitude must be a positive
    /// integer.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::InvalidPeriodExpression`] when the
    /// expression is not `<magnitude> <unit>`, the magnitude is not a
    /// positive integer, or the unit is unrecognized.
    pub fn parse(expression: &str) -> Result<Self> {
        let invalid = |reason: &str| ProjectionError::InvalidPeriodExpression {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = expression.split_whitespace();
        let (Some(magnitude), Some(unit), None) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(invalid("expected '<magnitude> <unit>'"));
        };

        let magnitude: i64 = magnitude
            .parse()
            .map_err(|_| invalid("magnitude is not an integer"))?;
        if magnitude <= 0 {
            return Err(invalid("magnitude must be positive"));
        }

        let unit = unit.to_ascii_lowercase();
        let unit = unit.strip_suffix('s').unwrap_or(&unit);
        let unit_seconds = UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, seconds)| *seconds)
            .ok_or_else(|| invalid("unrecognized unit"))?;

        let seconds = magnitude
            .checked_mul(unit_seconds)
            .filter(|total| *total <= MAX_SECONDS)
            .ok_or_else(|| invalid("period is too large"))?;

        Ok(Self { seconds })
    }

    /// Total width of one bucket, in seconds.
    #[must_use]
    pub const fn as_seconds(&self) -> i64 {
        self.seconds
    }

    /// Total width of one bucket as a `chrono` duration.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds)
    }

    /// Floor `instant` to the start of the bucket containing it.
    ///
    /// The result is the largest integer multiple of the period duration
    /// (measured from the Unix epoch) that is `<= instant`. Always a
    /// floor, never a round or ceiling; flooring an already-aligned
    /// instant is the identity. Sub-second precision is discarded.
    #[must_use]
    pub fn aligned_start(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let floored = instant.timestamp().div_euclid(self.seconds) * self.seconds;
        DateTime::from_timestamp(floored, 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Inclusive end of the bucket starting at `bucket_start`.
    ///
    /// One second before the next bucket starts, matching the
    /// inclusive-start / exclusive-logical-end convention used throughout.
    #[must_use]
    pub fn end(&self, bucket_start: DateTime<Utc>) -> DateTime<Utc> {
        bucket_start + (self.duration() - Duration::seconds(1))
    }
}

impl fmt::Display for Period {
    /// Renders the canonical form: the largest unit that divides the
    /// duration evenly, e.g. `"5 minutes"`, `"1 hour"`, `"90 seconds"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // UNITS ends with ("second", 1), which divides everything.
        let (name, unit_seconds) = UNITS
            .iter()
            .find(|(_, unit_seconds)| self.seconds % unit_seconds == 0)
            .unwrap_or(&UNITS[4]);
        let magnitude = self.seconds / unit_seconds;
        let plural = if magnitude == 1 { "" } else { "s" };
        write!(f, "{magnitude} {name}{plural}")
    }
}

impl FromStr for Period {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let expression = <String as serde::Deserialize>::deserialize(deserializer)?;
        Self::parse(&expression).map_err(serde::de::Error::custom)
    }
}

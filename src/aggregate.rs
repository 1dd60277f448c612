//! Consensus mean and per-source deltas over readings that may have failed.

use std::fmt;

/// Stored in place of any reading or delta whose source failed.
///
/// Historical records and downstream consumers test for this literal value.
pub const SENTINEL: f64 = 999.99;

/// One Fahrenheit temperature sample, or the marker of a failed source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Valid(f64),
    Unavailable,
}

impl Reading {
    /// Decodes a stored value, treating the sentinel as `Unavailable`.
    pub fn from_raw(value: f64) -> Self {
        if value == SENTINEL {
            Reading::Unavailable
        } else {
            Reading::Valid(value)
        }
    }

    /// Value written at the storage boundary.
    pub fn to_raw(self) -> f64 {
        match self {
            Reading::Valid(v) => v,
            Reading::Unavailable => SENTINEL,
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, Reading::Valid(_))
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_raw())
    }
}

/// Mean and deltas for one polling cycle, aligned with the input readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateResult<const N: usize> {
    pub mean: f64,
    pub deltas: [Reading; N],
}

/// Arithmetic mean of the valid readings, or `0.0` if there are none.
pub fn compute_mean(readings: &[Reading]) -> f64 {
    let (sum, count) = readings
        .iter()
        .fold((0.0, 0usize), |(sum, count), reading| match reading {
            Reading::Valid(v) => (sum + v, count + 1),
            Reading::Unavailable => (sum, count),
        });

    if count == 0 {
        0.00
    } else {
        sum / count as f64
    }
}

/// Signed deviation of `reading` from `mean`.
///
/// Only readings strictly below the sentinel count as measurements, so a
/// value at or above it yields `Unavailable` even if it was decoded as valid.
pub fn compute_delta(reading: Reading, mean: f64) -> Reading {
    match reading {
        Reading::Valid(r) if r < SENTINEL => Reading::Valid(r - mean),
        _ => Reading::Unavailable,
    }
}

pub fn aggregate<const N: usize>(readings: &[Reading; N]) -> AggregateResult<N> {
    let mean = compute_mean(readings);
    let deltas = readings.map(|reading| compute_delta(reading, mean));

    AggregateResult { mean, deltas }
}

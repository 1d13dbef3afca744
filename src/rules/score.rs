//! Score deltas and the CVSS -> severity mapping.
//!
//! Scoring policy: a finding backed by a CVSS score contributes
//! `round(cvss * 100)` points; every other finding contributes the fixed
//! constant declared beside its check.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Severity;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeverityError {
    #[error("CVSS score {0} is invalid, value needs to be between 0 and 10")]
    OutOfRange(f64),
}

/// A non-negative score delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Points(u32);

impl Points {
    pub const ZERO: Points = Points(0);

    pub const fn new(points: u32) -> Self {
        Self(points)
    }

    pub fn from_cvss(cvss: Cvss) -> Self {
        // cvss is within [0, 10], so the product fits comfortably.
        Self((cvss.value() * 100.0).round() as u32)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

/// A CVSS base score validated to lie within `[0.0, 10.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Cvss(f64);

impl Cvss {
    pub fn new(score: f64) -> Result<Self, SeverityError> {
        if score.is_nan() || !(0.0..=10.0).contains(&score) {
            return Err(SeverityError::OutOfRange(score));
        }
        Ok(Self(score))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn severity(self) -> Severity {
        let s = self.0;
        if s == 0.0 {
            Severity::Info
        } else if s < 4.0 {
            Severity::Low
        } else if s < 7.0 {
            Severity::Medium
        } else if s < 9.0 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

/// Map a raw CVSS score to a severity.
///
/// | range        | severity |
/// |--------------|----------|
/// | 0.0          | INFO     |
/// | (0.0, 4.0)   | LOW      |
/// | [4.0, 7.0)   | MEDIUM   |
/// | [7.0, 9.0)   | HIGH     |
/// | [9.0, 10.0]  | CRITICAL |
///
/// Scores outside `[0, 10]` (and NaN) are an error, never clamped.
pub fn map_severity(score: f64) -> Result<Severity, SeverityError> {
    Cvss::new(score).map(Cvss::severity)
}

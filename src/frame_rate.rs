//! Rational frame rates.
//!
//! Output clips run at `source_rate * (L + C) / L`. Keeping the rate as a
//! reduced fraction avoids drift for NTSC-style rates such as 24000/1001.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// A frame rate expressed as `numerator / denominator` frames per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRate {
    /// Frames.
    pub numerator: u64,
    /// Seconds.
    pub denominator: u64,
}

impl FrameRate {
    /// Create a frame rate, reduced to lowest terms.
    ///
    /// A zero denominator is treated as 1.
    pub fn new(numerator: u64, denominator: u64) -> Self {
        let denominator = denominator.max(1);
        let divisor = gcd(numerator, denominator).max(1);
        Self {
            numerator: numerator / divisor,
            denominator: denominator / divisor,
        }
    }

    /// Multiply the rate by `multiplier / divisor`.
    ///
    /// Used to derive the output rate of a cycle expansion, e.g.
    /// `rate.scaled(cycle_length + creates, cycle_length)`.
    pub fn scaled(self, multiplier: u64, divisor: u64) -> Self {
        let m = gcd(multiplier, self.denominator).max(1);
        let d = gcd(divisor, self.numerator).max(1);
        FrameRate::new(
            (self.numerator / d) * (multiplier / m),
            (self.denominator / m) * (divisor.max(1) / d),
        )
    }

    /// Frames per second as a floating-point value.
    pub fn as_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::new(25, 1)
    }
}

impl Display for FrameRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.denominator == 1 {
            write!(f, "{}", self.numerator)
        } else {
            write!(f, "{}/{}", self.numerator, self.denominator)
        }
    }
}

impl FromStr for FrameRate {
    type Err = String;

    /// Parse `"30"`, `"30000/1001"` or `"29.97"`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Some((numerator, denominator)) = value.split_once('/') {
            let numerator = numerator
                .trim()
                .parse::<u64>()
                .map_err(|error| format!("invalid frame rate numerator: {error}"))?;
            let denominator = denominator
                .trim()
                .parse::<u64>()
                .map_err(|error| format!("invalid frame rate denominator: {error}"))?;
            if numerator == 0 || denominator == 0 {
                return Err(format!("frame rate must be positive: {value}"));
            }
            return Ok(FrameRate::new(numerator, denominator));
        }

        let fps = value
            .parse::<f64>()
            .map_err(|error| format!("invalid frame rate: {error}"))?;
        if !fps.is_finite() || fps <= 0.0 {
            return Err(format!("frame rate must be positive: {value}"));
        }
        Ok(FrameRate::new((fps * 1000.0).round() as u64, 1000))
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let remainder = a % b;
        a = b;
        b = remainder;
    }
    a
}

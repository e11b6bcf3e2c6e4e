//! Semantic unit types for the quantities entering the rate law
//!
//! Newtype wrappers keep barriers, temperatures and frequencies from being
//! swapped at call sites. All wrap `f64`; the rate law exponentiates their
//! ratio and single precision loses too much at low temperature.
//!
//! # Usage
//! ```
//! use vacancy_kmc_core::core_types::units::{ElectronVolts, Kelvin};
//!
//! let t = Kelvin::new(1000.0);
//! let kt = ElectronVolts::thermal(8.617333e-5, t);
//! assert!((*kt - 0.08617333).abs() < 1e-12);
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

/// Compare f64 values with total ordering using Rust's built-in `total_cmp`
#[inline]
fn f64_total_cmp(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

// ============================================================================
// TEMPERATURE
// ============================================================================

/// Absolute temperature in Kelvin
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Kelvin(f64);

impl Eq for Kelvin {}

impl PartialOrd for Kelvin {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Kelvin {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Kelvin {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Kelvin {
    /// Absolute zero
    pub const ABSOLUTE_ZERO: Kelvin = Kelvin(0.0);

    /// Create a new Kelvin temperature. Asserts value >= absolute zero (0 K).
    #[inline]
    #[must_use]
    #[track_caller]
    pub const fn new(value: f64) -> Self {
        assert!(
            value >= 0.0,
            "Kelvin::new: value is below absolute zero (0 K)"
        );
        Kelvin(value)
    }
}

impl From<Kelvin> for f64 {
    fn from(k: Kelvin) -> f64 {
        k.0
    }
}

impl fmt::Display for Kelvin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} K", self.0)
    }
}

// ============================================================================
// ENERGY
// ============================================================================

/// Energy in electron volts. Barriers may be negative; no validation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct ElectronVolts(f64);

impl Eq for ElectronVolts {}

impl PartialOrd for ElectronVolts {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ElectronVolts {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for ElectronVolts {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl ElectronVolts {
    #[inline]
    #[must_use]
    pub const fn new(value: f64) -> Self {
        ElectronVolts(value)
    }

    /// Thermal energy `k_B * T`, with `k_B` given in eV/K
    #[inline]
    #[must_use]
    pub fn thermal(boltzmann_constant: f64, temperature: Kelvin) -> Self {
        ElectronVolts(boltzmann_constant * temperature.0)
    }
}

impl From<ElectronVolts> for f64 {
    fn from(e: ElectronVolts) -> f64 {
        e.0
    }
}

impl fmt::Display for ElectronVolts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4} eV", self.0)
    }
}

// ============================================================================
// FREQUENCY
// ============================================================================

/// Frequency in Hertz (attempt frequency, jump rates)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Hertz(f64);

impl Eq for Hertz {}

impl PartialOrd for Hertz {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hertz {
    fn cmp(&self, other: &Self) -> Ordering {
        f64_total_cmp(self.0, other.0)
    }
}

impl Deref for Hertz {
    type Target = f64;
    #[inline]
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl Hertz {
    /// Create a new frequency. Asserts value >= 0.
    #[inline]
    #[must_use]
    #[track_caller]
    pub const fn new(value: f64) -> Self {
        assert!(value >= 0.0, "Hertz::new: frequency must be non-negative");
        Hertz(value)
    }
}

impl From<Hertz> for f64 {
    fn from(h: Hertz) -> f64 {
        h.0
    }
}

impl fmt::Display for Hertz {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3e} Hz", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thermal_energy() {
        let kt = ElectronVolts::thermal(8.617333e-5, Kelvin::new(300.0));
        assert!((*kt - 0.025852).abs() < 1e-6);
    }

    #[test]
    fn test_total_ordering() {
        let low = ElectronVolts::new(-0.2);
        let high = ElectronVolts::new(0.7);
        assert_eq!(low.max(high), high);
        assert!(Hertz::new(1e12) < Hertz::new(1e13));
    }

    #[test]
    fn test_serde_is_transparent() {
        let json = serde_json::to_string(&Kelvin::new(800.0)).unwrap();
        assert_eq!(json, "800.0");
        let back: Hertz = serde_json::from_str("1e13").unwrap();
        assert_eq!(*back, 1e13);
    }

    #[test]
    #[should_panic(expected = "below absolute zero")]
    fn test_negative_kelvin_panics() {
        let _ = Kelvin::new(-1.0);
    }
}

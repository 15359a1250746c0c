//! # Manager Configuration
//!
//! Growth policy and initial capacity, loaded once at startup.
//!
//! ```toml
//! initial_capacity = 64
//!
//! [growth]
//! base = 5
//! multiplier = { num = 3, den = 2 }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EcsError, EcsResult};

/// A rational growth multiplier `num / den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ratio {
    /// Numerator.
    pub num: u64,
    /// Denominator.
    pub den: u64,
}

impl Ratio {
    /// Creates a new ratio.
    #[inline]
    #[must_use]
    pub const fn new(num: u64, den: u64) -> Self {
        Self { num, den }
    }
}

impl Default for Ratio {
    fn default() -> Self {
        Self::new(2, 1)
    }
}

/// Geometric capacity growth: `new_cap = floor((cap + base) * multiplier)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthOptions {
    /// Slots added before multiplying. Must be non-zero.
    pub base: usize,
    /// Multiplier applied after adding `base`. Must be at least 1.
    pub multiplier: Ratio,
}

impl Default for GrowthOptions {
    fn default() -> Self {
        Self {
            base: 5,
            multiplier: Ratio::default(),
        }
    }
}

impl GrowthOptions {
    /// Creates growth options.
    #[must_use]
    pub const fn new(base: usize, multiplier: Ratio) -> Self {
        Self { base, multiplier }
    }

    /// Checks that the options always grow the storage.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidGrowth`] for a zero base, a zero
    /// denominator or a multiplier below one.
    pub fn validate(&self) -> EcsResult<()> {
        if self.base == 0 {
            return Err(EcsError::InvalidGrowth(
                "growth base must be non-zero".into(),
            ));
        }
        if self.multiplier.den == 0 {
            return Err(EcsError::InvalidGrowth(
                "growth multiplier has a zero denominator".into(),
            ));
        }
        if self.multiplier.num < self.multiplier.den {
            return Err(EcsError::InvalidGrowth(format!(
                "growth multiplier {}/{} is below one",
                self.multiplier.num, self.multiplier.den
            )));
        }
        Ok(())
    }

    /// Computes the capacity that follows `capacity`.
    ///
    /// Uses exact integer arithmetic, so the result is the true floor.
    /// Saturates at `usize::MAX`.
    #[must_use]
    pub fn calc_growth(&self, capacity: usize) -> usize {
        let grown = (capacity as u128 + self.base as u128) * u128::from(self.multiplier.num)
            / u128::from(self.multiplier.den.max(1));
        usize::try_from(grown).unwrap_or_else(|_| {
            tracing::warn!(capacity, "growth overflowed usize, saturating");
            usize::MAX
        })
    }
}

/// Manager configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcsConfig {
    /// Slots allocated up front.
    pub initial_capacity: usize,
    /// Growth policy once the initial slots are used.
    pub growth: GrowthOptions,
}

impl EcsConfig {
    /// Parses and validates a TOML configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Config`] on malformed TOML and
    /// [`EcsError::InvalidGrowth`] if the growth options are unusable.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| EcsError::Config(e.to_string()))?;
        config.growth.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_growth() {
        let growth = GrowthOptions::default();
        assert!(growth.validate().is_ok());
        assert_eq!(growth.calc_growth(0), 10);
        assert_eq!(growth.calc_growth(10), 30);
    }

    #[test]
    fn test_fractional_growth_floors() {
        let growth = GrowthOptions::new(5, Ratio::new(3, 2));
        // (10 + 5) * 1.5 = 22.5
        assert_eq!(growth.calc_growth(10), 22);
        assert_eq!(growth.calc_growth(0), 7);
    }

    #[test]
    fn test_invalid_growth() {
        assert!(GrowthOptions::new(0, Ratio::new(2, 1)).validate().is_err());
        assert!(GrowthOptions::new(5, Ratio::new(1, 0)).validate().is_err());
        assert!(GrowthOptions::new(5, Ratio::new(1, 2)).validate().is_err());
        assert!(GrowthOptions::new(1, Ratio::new(1, 1)).validate().is_ok());
    }

    #[test]
    fn test_growth_saturates() {
        let growth = GrowthOptions::default();
        assert_eq!(growth.calc_growth(usize::MAX - 1), usize::MAX);
    }

    #[test]
    fn test_config_from_toml() {
        let config = EcsConfig::from_toml_str(
            r#"
            initial_capacity = 64

            [growth]
            base = 8
            multiplier = { num = 3, den = 2 }
            "#,
        )
        .unwrap();
        assert_eq!(config.initial_capacity, 64);
        assert_eq!(config.growth.base, 8);
        assert_eq!(config.growth.multiplier, Ratio::new(3, 2));
    }

    #[test]
    fn test_config_defaults_fill_missing_fields() {
        let config = EcsConfig::from_toml_str("initial_capacity = 4").unwrap();
        assert_eq!(config.growth, GrowthOptions::default());

        let config = EcsConfig::from_toml_str("").unwrap();
        assert_eq!(config, EcsConfig::default());
    }

    #[test]
    fn test_config_rejects_bad_input() {
        assert!(matches!(
            EcsConfig::from_toml_str("initial_capacity = \"many\""),
            Err(EcsError::Config(_))
        ));
        assert!(matches!(
            EcsConfig::from_toml_str("[growth]\nbase = 0"),
            Err(EcsError::InvalidGrowth(_))
        ));
    }
}

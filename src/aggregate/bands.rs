//! Position-size bands.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One row of the position table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionBand {
    /// Inclusive lower bound on sentiment for this band.
    pub min_sentiment: f64,
    /// Human-readable label.
    pub label: String,
    /// Suggested exposure as a fraction of the maximum position.
    pub exposure: f64,
}

impl PositionBand {
    pub fn new(min_sentiment: f64, label: &str, exposure: f64) -> Self {
        Self {
            min_sentiment,
            label: label.to_string(),
            exposure,
        }
    }
}

/// Ordered breakpoints mapping sentiment to a band.
///
/// Rows are sorted by `min_sentiment`, highest first; the last row must cover
/// `-1.0` so every sentiment maps somewhere. Exposure never increases as
/// sentiment falls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BandTable(Vec<PositionBand>);

impl BandTable {
    /// Build and validate a table.
    pub fn new(bands: Vec<PositionBand>) -> Result<Self> {
        let table = Self(bands);
        table.validate()?;
        Ok(table)
    }

    pub fn bands(&self) -> &[PositionBand] {
        &self.0
    }

    pub fn validate(&self) -> Result<()> {
        let last = self
            .0
            .last()
            .ok_or_else(|| Error::Validation("position band table is empty".to_string()))?;
        if last.min_sentiment > -1.0 {
            return Err(Error::Validation(format!(
                "lowest band '{}' must start at -1.0 or below",
                last.label
            )));
        }

        for pair in self.0.windows(2) {
            let (upper, lower) = (&pair[0], &pair[1]);
            if upper.min_sentiment <= lower.min_sentiment {
                return Err(Error::Validation(format!(
                    "band '{}' must have a higher threshold than '{}'",
                    upper.label, lower.label
                )));
            }
            if upper.exposure < lower.exposure {
                return Err(Error::Validation(format!(
                    "band '{}' has less exposure than lower band '{}'",
                    upper.label, lower.label
                )));
            }
        }

        for band in &self.0 {
            if !(0.0..=1.0).contains(&band.exposure) {
                return Err(Error::Validation(format!(
                    "band '{}' exposure {} is outside [0, 1]",
                    band.label, band.exposure
                )));
            }
        }
        Ok(())
    }

    /// The band for `sentiment`: the first row whose threshold it meets.
    ///
    /// Falls back to the last row so a misconfigured table still answers.
    pub fn band_for(&self, sentiment: f64) -> &PositionBand {
        self.0
            .iter()
            .find(|band| sentiment >= band.min_sentiment)
            .or_else(|| self.0.last())
            .unwrap_or(&DEFENSIVE)
    }
}

static DEFENSIVE: PositionBand = PositionBand {
    min_sentiment: -1.0,
    label: String::new(),
    exposure: 0.0,
};

impl Default for BandTable {
    fn default() -> Self {
        Self(vec![
            PositionBand::new(0.5, "aggressive", 0.8),
            PositionBand::new(0.15, "moderate", 0.5),
            PositionBand::new(-0.15, "light", 0.2),
            PositionBand::new(-1.0, "defensive", 0.0),
        ])
    }
}

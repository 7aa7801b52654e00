use serde::{Deserialize, Serialize};

/// Tie-breaking rule applied when a scaled value lies exactly halfway
/// between two integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Banker's rounding. Matches golden files produced from numpy values.
    #[default]
    HalfEven,
    HalfAwayFromZero,
}

impl RoundingMode {
    pub fn round(self, x: f64) -> f64 {
        match self {
            RoundingMode::HalfEven => x.round_ties_even(),
            RoundingMode::HalfAwayFromZero => x.round(),
        }
    }
}

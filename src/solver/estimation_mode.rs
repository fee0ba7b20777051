use crate::errors::Error;
use std::fmt;
use std::str::FromStr;

/// What `values` reconstructs on the estimation grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EstimationMode {
    /// Current source density
    #[default]
    Csd,
    /// Potential
    Pot,
}

impl EstimationMode {
    pub fn name(&self) -> &'static str {
        match self {
            EstimationMode::Csd => "CSD",
            EstimationMode::Pot => "POT",
        }
    }
}

impl fmt::Display for EstimationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for EstimationMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "CSD" => Ok(EstimationMode::Csd),
            "POT" => Ok(EstimationMode::Pot),
            _ => Err(Error::InvalidEstimationMode { mode: mode.to_string() }),
        }
    }
}

#[test]
fn test_estimation_mode_from_str() {
    assert_eq!("CSD".parse::<EstimationMode>(), Ok(EstimationMode::Csd));
    assert_eq!("POT".parse::<EstimationMode>(), Ok(EstimationMode::Pot));
    assert_eq!(EstimationMode::Pot.to_string(), "POT");
    assert_eq!(
        "csd".parse::<EstimationMode>(),
        Err(Error::InvalidEstimationMode { mode: "csd".to_string() })
    );
}

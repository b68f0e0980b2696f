//! Encoder operating mode.

use serde::{Deserialize, Serialize};

/// Operating mode of an encoder.
///
/// The two states are mutually exclusive. `Inference` is read-only: encode
/// calls never touch parameters. `Training` allows an encoder to accumulate
/// the state needed for parameter updates and must have a single owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderMode {
    #[default]
    Inference,
    Training,
}

impl EncoderMode {
    pub fn is_training(self) -> bool {
        self == EncoderMode::Training
    }

    pub fn is_inference(self) -> bool {
        self == EncoderMode::Inference
    }
}

impl std::fmt::Display for EncoderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderMode::Inference => write!(f, "inference"),
            EncoderMode::Training => write!(f, "training"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_inference() {
        let mode = EncoderMode::default();
        assert!(mode.is_inference());
        assert!(!mode.is_training());
    }

    #[test]
    fn test_modes_are_exclusive() {
        for mode in [EncoderMode::Inference, EncoderMode::Training] {
            assert_ne!(mode.is_inference(), mode.is_training());
        }
    }
}

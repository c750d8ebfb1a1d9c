use std::fmt;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::PayloadError;

/// How the peripheral encodes the step count in the characteristic value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PayloadEncoding {
    #[default]
    Base64,
    Raw,
}

/// The step count exactly as sent by the peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepCount(String);

impl StepCount {
    pub fn new(value: impl Into<String>) -> Self {
        StepCount(value.into())
    }

    pub fn zero() -> Self {
        StepCount("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Percentage of `goal`. Not clamped, a count above the goal yields more than 100.
    pub fn progress(&self, goal: u32) -> f32 {
        if goal == 0 {
            return 0.0;
        }

        match self.0.trim().parse::<f32>() {
            Ok(steps) if steps.is_finite() => steps / goal as f32 * 100.0,
            _ => 0.0,
        }
    }
}

impl Default for StepCount {
    fn default() -> Self {
        StepCount::zero()
    }
}

impl fmt::Display for StepCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn decode_step_payload(encoding: PayloadEncoding, value: &[u8]) -> Result<StepCount, PayloadError> {
    let bytes = match encoding {
        PayloadEncoding::Base64 => STANDARD.decode(value)?,
        PayloadEncoding::Raw => value.to_vec(),
    };

    Ok(StepCount(String::from_utf8_lossy(&bytes).into_owned()))
}

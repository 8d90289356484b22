use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Device the model is expected to run on.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Whatever the inference server picked.
    #[default]
    Auto,

    /// Force CPU execution.
    Cpu,

    /// Force CUDA execution.
    Cuda,
}

impl Device {
    /// Returns true if `reported` (the server's device type) satisfies this selection.
    pub fn matches(&self, reported: &str) -> bool {
        match self {
            Device::Auto => true,
            Device::Cpu => reported.eq_ignore_ascii_case("cpu"),
            Device::Cuda => reported.to_ascii_lowercase().starts_with("cuda"),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Auto => write!(f, "auto"),
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda => write!(f, "cuda"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "auto" => Ok(Device::Auto),
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            other => Err(format!(
                "Invalid device: {other}. Valid options: auto, cpu, cuda"
            )),
        }
    }
}

/// Weight quantization requested for the model.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    /// Full precision.
    #[default]
    None,

    /// 8-bit weights.
    Int8,

    /// 4-bit weights.
    Int4,
}

impl Quantization {
    /// Resolves the two load toggles; 8-bit takes precedence over 4-bit.
    pub fn from_toggles(load_in_8bit: bool, load_in_4bit: bool) -> Self {
        if load_in_8bit {
            Quantization::Int8
        } else if load_in_4bit {
            Quantization::Int4
        } else {
            Quantization::None
        }
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantization::None => write!(f, "none"),
            Quantization::Int8 => write!(f, "8-bit"),
            Quantization::Int4 => write!(f, "4-bit"),
        }
    }
}

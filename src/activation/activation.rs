use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NnError;

/// Slope used by `LeakyReLU` for negative inputs.
pub const LEAKY_RELU_ALPHA: f64 = 0.001;

/// Element-wise nonlinearity applied after a layer's affine transform.
///
/// Every variant's derivative can be recovered from its own output, which is
/// what `Layer::backward` relies on: it only keeps the post-activation values.
/// A new variant is only admissible if that holds for it too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationFunction {
    #[serde(alias = "sigmoid")]
    Sigmoid,
    #[serde(alias = "relu")]
    ReLU,
    #[serde(alias = "leaky_relu")]
    LeakyReLU,
    #[serde(alias = "tanh")]
    Tanh,
}

impl ActivationFunction {
    pub fn function(&self, x: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationFunction::ReLU => x.max(0.0),
            ActivationFunction::LeakyReLU => (LEAKY_RELU_ALPHA * x).max(x),
            ActivationFunction::Tanh => x.tanh(),
        }
    }

    /// Derivative of the activation, expressed in terms of its output `y = function(x)`.
    pub fn derivative(&self, y: f64) -> f64 {
        match self {
            ActivationFunction::Sigmoid => y * (1.0 - y),
            ActivationFunction::ReLU => if y > 0.0 { 1.0 } else { 0.0 },
            ActivationFunction::LeakyReLU => if y > 0.0 { 1.0 } else { LEAKY_RELU_ALPHA },
            ActivationFunction::Tanh => 1.0 - y * y,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActivationFunction::Sigmoid => "sigmoid",
            ActivationFunction::ReLU => "relu",
            ActivationFunction::LeakyReLU => "leaky_relu",
            ActivationFunction::Tanh => "tanh",
        }
    }
}

impl fmt::Display for ActivationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ActivationFunction {
    type Err = NnError;

    /// Accepts the names used in layer tuples, case-insensitively
    /// (`"sigmoid"`, `"relu"`, `"leaky_relu"` / `"leakyrelu"`, `"tanh"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "sigmoid" => Ok(ActivationFunction::Sigmoid),
            "relu" => Ok(ActivationFunction::ReLU),
            "leaky_relu" | "leakyrelu" => Ok(ActivationFunction::LeakyReLU),
            "tanh" => Ok(ActivationFunction::Tanh),
            _ => Err(NnError::UnknownActivation(s.to_string())),
        }
    }
}

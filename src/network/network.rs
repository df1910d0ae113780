use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{NnError, Result},
    layers::dense::{ForwardContext, Layer},
    math::matrix::{malformed, Matrix},
};

/// An ordered stack of dense layers trained one sample at a time.
///
/// Serializes as a JSON array of layer records. Adjacent layers always agree on
/// size: `layers[i].output_size() == layers[i + 1].input_size()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Layer>", into = "Vec<Layer>")]
pub struct LayeredNeuralNetwork {
    layers: Vec<Layer>,
}

impl TryFrom<Vec<Layer>> for LayeredNeuralNetwork {
    type Error = NnError;

    fn try_from(layers: Vec<Layer>) -> Result<Self> {
        LayeredNeuralNetwork::new(layers)
    }
}

impl From<LayeredNeuralNetwork> for Vec<Layer> {
    fn from(network: LayeredNeuralNetwork) -> Self {
        network.layers
    }
}

impl LayeredNeuralNetwork {
    /// Wraps already-built layers, checking that each one feeds the next.
    pub fn new(layers: Vec<Layer>) -> Result<LayeredNeuralNetwork> {
        if layers.is_empty() {
            return Err(NnError::EmptyNetwork);
        }
        for (index, pair) in layers.windows(2).enumerate() {
            if pair[0].output_size() != pair[1].input_size() {
                return Err(NnError::TopologyMismatch {
                    index,
                    output_size: pair[0].output_size(),
                    next_input_size: pair[1].input_size(),
                });
            }
        }
        debug!(
            layers = layers.len(),
            inputs = layers[0].input_size(),
            outputs = layers[layers.len() - 1].output_size(),
            "network assembled"
        );
        Ok(LayeredNeuralNetwork { layers })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Layer] {
        &mut self.layers
    }

    pub fn input_size(&self) -> usize {
        self.layers[0].input_size()
    }

    pub fn output_size(&self) -> usize {
        self.layers[self.layers.len() - 1].output_size()
    }

    /// Runs every layer's forward pass, returning one context per layer.
    fn forward(&self, input: &[f64]) -> Result<Vec<ForwardContext>> {
        if input.len() != self.input_size() {
            return Err(NnError::DimensionMismatch {
                op: "input",
                left: (self.input_size(), 1),
                right: (input.len(), 1),
            });
        }

        let mut contexts: Vec<ForwardContext> = Vec::with_capacity(self.layers.len());
        let mut current = Matrix::from_array(input)?;
        for layer in &self.layers {
            let ctx = layer.forward(current)?;
            current = ctx.outputs().clone();
            contexts.push(ctx);
        }
        Ok(contexts)
    }

    /// Inference only; no layer is modified.
    pub fn predict(&self, input: &[f64]) -> Result<Vec<f64>> {
        let contexts = self.forward(input)?;
        Ok(last_outputs(&contexts))
    }

    /// One SGD step on a single sample.
    ///
    /// Returns the prediction made before this step's updates, although the
    /// updates have already been applied by the time it returns.
    pub fn train(&mut self, input: &[f64], target: &[f64]) -> Result<Vec<f64>> {
        if target.len() != self.output_size() {
            return Err(NnError::DimensionMismatch {
                op: "target",
                left: (self.output_size(), 1),
                right: (target.len(), 1),
            });
        }

        let contexts = self.forward(input)?;
        let prediction = last_outputs(&contexts);

        let mut errors = Matrix::from_array(target)?;
        errors.subtract(&Matrix::from_array(&prediction)?)?;

        for (layer, ctx) in self.layers.iter_mut().zip(contexts).rev() {
            errors = layer.backward(ctx, &errors)?;
        }

        Ok(prediction)
    }

    /// Fails with `NonFinite` if any layer holds a NaN or infinite parameter,
    /// e.g. after training diverged. Such a network could not be loaded back.
    pub fn ensure_finite(&self) -> Result<()> {
        for (index, layer) in self.layers.iter().enumerate() {
            layer.ensure_finite().map_err(|e| match e {
                NnError::NonFinite(what) => NnError::NonFinite(format!("layer {index} {what}")),
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        self.ensure_finite()?;
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        self.ensure_finite()?;
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes the string form produced by [`LayeredNeuralNetwork::to_json`].
    pub fn from_json(json: &str) -> Result<LayeredNeuralNetwork> {
        serde_json::from_str(json).map_err(malformed)
    }

    /// Decodes an already-parsed array of layer records.
    pub fn from_value(value: Value) -> Result<LayeredNeuralNetwork> {
        serde_json::from_value(value).map_err(malformed)
    }

    /// Serializes the network to a pretty-printed JSON file.
    /// Nothing is written if the network fails [`ensure_finite`](Self::ensure_finite).
    pub fn save_json(&self, path: &str) -> Result<()> {
        self.ensure_finite()?;
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        debug!(path, layers = self.layers.len(), "network saved");
        Ok(())
    }

    /// Deserializes a network from a JSON file previously written by `save_json`.
    pub fn load_json(path: &str) -> Result<LayeredNeuralNetwork> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let network: LayeredNeuralNetwork = serde_json::from_reader(reader).map_err(malformed)?;
        debug!(path, layers = network.layers.len(), "network loaded");
        Ok(network)
    }
}

fn last_outputs(contexts: &[ForwardContext]) -> Vec<f64> {
    contexts
        .last()
        .map(|ctx| ctx.outputs().to_array())
        .unwrap_or_default()
}

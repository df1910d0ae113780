use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::activation::activation::ActivationFunction;
use crate::error::{NnError, Result};
use crate::layers::dense::{ErrorPropagation, Layer, DEFAULT_LEARNING_RATE};
use crate::math::matrix::malformed;
use crate::math::rng;
use crate::network::network::LayeredNeuralNetwork;

/// Describes one layer in a network specification.
///
/// Fields:
/// - `input_size`    — values feeding into this layer (the previous layer's
///                     `output_size`, or the raw input dimension for the first layer)
/// - `output_size`   — number of neurons in this layer
/// - `activation`    — activation applied after the affine transform
/// - `learning_rate` — step size for this layer; defaults to 0.1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub input_size: usize,
    pub output_size: usize,
    pub activation: ActivationFunction,
    #[serde(default)]
    pub learning_rate: Option<f64>,
    #[serde(default)]
    pub propagation: ErrorPropagation,
}

impl LayerSpec {
    pub fn new(input_size: usize, output_size: usize, activation: ActivationFunction) -> LayerSpec {
        LayerSpec {
            input_size,
            output_size,
            activation,
            learning_rate: None,
            propagation: ErrorPropagation::default(),
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> LayerSpec {
        self.learning_rate = Some(learning_rate);
        self
    }

    /// Builds the layer, drawing its initial weights from `source`.
    pub fn build_with<R: Rng + ?Sized>(&self, source: &mut R) -> Result<Layer> {
        let layer = Layer::new_with(self.input_size, self.output_size, self.activation, source)?;
        Ok(layer
            .with_learning_rate(self.learning_rate.unwrap_or(DEFAULT_LEARNING_RATE))
            .with_propagation(self.propagation))
    }
}

impl From<(usize, usize, ActivationFunction)> for LayerSpec {
    fn from((input_size, output_size, activation): (usize, usize, ActivationFunction)) -> Self {
        LayerSpec::new(input_size, output_size, activation)
    }
}

/// `(input_size, output_size, activation name, learning rate)` as handed in by callers.
impl TryFrom<(usize, usize, &str, Option<f64>)> for LayerSpec {
    type Error = NnError;

    fn try_from(
        (input_size, output_size, activation, learning_rate): (usize, usize, &str, Option<f64>),
    ) -> Result<Self> {
        let mut spec = LayerSpec::new(input_size, output_size, activation.parse()?);
        spec.learning_rate = learning_rate;
        Ok(spec)
    }
}

/// A serializable network architecture, independent of trained weights.
///
/// When `seed` is set, `build` initializes every layer from a generator seeded
/// with it, so the same spec always yields the same starting weights. Without a
/// seed, weights come from the process-wide generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name, e.g. used as a model file stem.
    #[serde(default)]
    pub name: String,
    /// Ordered list of layer descriptions (input → output).
    pub layers: Vec<LayerSpec>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl NetworkSpec {
    pub fn new(layers: Vec<LayerSpec>) -> NetworkSpec {
        NetworkSpec {
            name: String::new(),
            layers,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> NetworkSpec {
        self.seed = Some(seed);
        self
    }

    pub fn build(&self) -> Result<LayeredNeuralNetwork> {
        let layers = match self.seed {
            Some(seed) => self.build_layers(&mut rng::seeded(seed))?,
            None => rng::with_global(|g| self.build_layers(g))?,
        };
        LayeredNeuralNetwork::new(layers)
    }

    fn build_layers<R: Rng + ?Sized>(&self, source: &mut R) -> Result<Vec<Layer>> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for spec in &self.layers {
            layers.push(spec.build_with(source)?);
        }
        Ok(layers)
    }

    pub fn from_json(json: &str) -> Result<NetworkSpec> {
        serde_json::from_str(json).map_err(malformed)
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json(&self, path: &str) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json(path: &str) -> Result<NetworkSpec> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        serde_json::from_reader(reader).map_err(malformed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_spec() -> NetworkSpec {
        NetworkSpec::new(vec![
            (2, 8, ActivationFunction::Sigmoid).into(),
            (8, 8, ActivationFunction::Sigmoid).into(),
            (8, 8, ActivationFunction::Sigmoid).into(),
            (8, 1, ActivationFunction::ReLU).into(),
        ])
    }

    #[test]
    fn seeded_specs_build_identical_networks() {
        let spec = xor_spec().with_seed(42);
        assert_eq!(spec.build().unwrap(), spec.build().unwrap());
        assert_ne!(spec.build().unwrap(), xor_spec().with_seed(43).build().unwrap());
    }

    #[test]
    fn learning_rates_and_defaults_are_applied() {
        let mut spec = xor_spec().with_seed(1);
        spec.layers[1] = spec.layers[1].clone().with_learning_rate(0.05);
        let net = spec.build().unwrap();
        assert_eq!(net.layers()[0].learning_rate, DEFAULT_LEARNING_RATE);
        assert_eq!(net.layers()[1].learning_rate, 0.05);
    }

    #[test]
    fn tuples_with_activation_names() {
        let spec = LayerSpec::try_from((3, 2, "tanh", Some(0.2))).unwrap();
        assert_eq!(spec.activation, ActivationFunction::Tanh);
        assert_eq!(spec.learning_rate, Some(0.2));
        assert!(matches!(
            LayerSpec::try_from((3, 2, "swish", None)),
            Err(NnError::UnknownActivation(_))
        ));
    }

    #[test]
    fn bad_topology_fails_to_build() {
        let spec = NetworkSpec::new(vec![
            (2, 3, ActivationFunction::Sigmoid).into(),
            (2, 1, ActivationFunction::Sigmoid).into(),
        ]);
        assert!(matches!(spec.build(), Err(NnError::TopologyMismatch { .. })));
    }

    #[test]
    fn parses_from_json() {
        let spec = NetworkSpec::from_json(
            r#"{
                "name": "xor",
                "seed": 7,
                "layers": [
                    { "input_size": 2, "output_size": 4, "activation": "Tanh" },
                    { "input_size": 4, "output_size": 1, "activation": "Sigmoid",
                      "learning_rate": 0.3, "propagation": "pre_update" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(spec.seed, Some(7));
        assert_eq!(spec.layers[1].propagation, ErrorPropagation::PreUpdate);
        let net = spec.build().unwrap();
        assert_eq!((net.input_size(), net.output_size()), (2, 1));
        assert_eq!(net.layers()[1].learning_rate, 0.3);
    }
}

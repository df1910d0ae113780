use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    activation::activation::ActivationFunction,
    error::{NnError, Result},
    math::matrix::{malformed, Matrix, RecordError},
    math::rng,
};

pub const DEFAULT_LEARNING_RATE: f64 = 0.1;

/// Which weights `Layer::backward` pushes the error through on its way to the
/// previous layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPropagation {
    /// Through the weights as they are after this step's update.
    #[default]
    PostUpdate,
    /// Through the weights that produced the forward pass (textbook backpropagation).
    PreUpdate,
}

impl ErrorPropagation {
    fn is_post_update(&self) -> bool {
        *self == ErrorPropagation::PostUpdate
    }
}

/// A fully-connected layer: `outputs = activation(weights × inputs + bias)`.
///
/// `weights` is `output_size × input_size` and `bias` is `output_size × 1`;
/// both shapes are fixed at construction and checked on deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "LayerRecord")]
pub struct Layer {
    input_size: usize,
    output_size: usize,
    pub activation: ActivationFunction,
    pub learning_rate: f64,
    weights: Matrix,
    bias: Matrix,
    #[serde(skip_serializing_if = "ErrorPropagation::is_post_update")]
    pub propagation: ErrorPropagation,
}

/// What one `forward` call saw and produced. `backward` consumes it, so every
/// backward step is paired with exactly one forward step.
#[derive(Debug)]
pub struct ForwardContext {
    inputs: Matrix,
    outputs: Matrix,
}

impl ForwardContext {
    pub fn inputs(&self) -> &Matrix {
        &self.inputs
    }

    pub fn outputs(&self) -> &Matrix {
        &self.outputs
    }
}

impl Layer {
    /// Creates a layer whose weights and bias are drawn from the process-wide generator.
    pub fn new(input_size: usize, output_size: usize, activation: ActivationFunction) -> Result<Layer> {
        rng::with_global(|g| Layer::new_with(input_size, output_size, activation, g))
    }

    /// Creates a layer whose weights and bias are drawn from `source`.
    pub fn new_with<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: ActivationFunction,
        source: &mut R,
    ) -> Result<Layer> {
        check_sizes(input_size, output_size)?;
        let weights = Matrix::randomized_with(output_size, input_size, source)?;
        let bias = Matrix::randomized_with(output_size, 1, source)?;

        Ok(Layer {
            input_size,
            output_size,
            activation,
            learning_rate: DEFAULT_LEARNING_RATE,
            weights,
            bias,
            propagation: ErrorPropagation::default(),
        })
    }

    /// Assembles a layer from known parameters. Sizes are taken from `weights`.
    pub fn from_parts(
        weights: Matrix,
        bias: Matrix,
        activation: ActivationFunction,
        learning_rate: f64,
    ) -> Result<Layer> {
        let (output_size, input_size) = weights.shape();
        check_sizes(input_size, output_size)?;
        if bias.shape() != (output_size, 1) {
            return Err(NnError::DimensionMismatch {
                op: "bias",
                left: weights.shape(),
                right: bias.shape(),
            });
        }

        Ok(Layer {
            input_size,
            output_size,
            activation,
            learning_rate,
            weights,
            bias,
            propagation: ErrorPropagation::default(),
        })
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Layer {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_propagation(mut self, propagation: ErrorPropagation) -> Layer {
        self.propagation = propagation;
        self
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn bias(&self) -> &Matrix {
        &self.bias
    }

    /// Computes `activation(weights × inputs + bias)` for an `input_size × 1` column.
    pub fn forward(&self, inputs: Matrix) -> Result<ForwardContext> {
        let activation = self.activation;
        let mut outputs = Matrix::multiply(&self.weights, &inputs)?;
        outputs
            .add(&self.bias)?
            .map(|x, _, _| activation.function(x));

        Ok(ForwardContext { inputs, outputs })
    }

    /// One delta-rule step. `errors` is the error attributed to this layer's
    /// outputs (`target - prediction` for the last layer). Weights and bias are
    /// updated in place; the returned `input_size × 1` matrix is the error for the
    /// previous layer.
    pub fn backward(&mut self, context: ForwardContext, errors: &Matrix) -> Result<Matrix> {
        let ForwardContext { inputs, outputs } = context;
        if inputs.shape() != (self.input_size, 1) || outputs.shape() != (self.output_size, 1) {
            return Err(NnError::DimensionMismatch {
                op: "backward",
                left: (self.output_size, self.input_size),
                right: (outputs.rows(), inputs.rows()),
            });
        }

        let activation = self.activation;
        let mut gradients = outputs;
        gradients
            .map(|y, _, _| activation.derivative(y))
            .multiply_hadamard(errors)?
            .multiply_scalar(self.learning_rate);

        let deltas = Matrix::multiply(&gradients, &inputs.transpose())?;

        let pre_update = match self.propagation {
            ErrorPropagation::PreUpdate => Some(self.weights.transpose()),
            ErrorPropagation::PostUpdate => None,
        };

        self.weights.add(&deltas)?;
        self.bias.add(&gradients)?;

        let weights_t = pre_update.unwrap_or_else(|| self.weights.transpose());
        Matrix::multiply(&weights_t, errors)
    }

    /// Fails with `NonFinite` if a weight, bias entry or the learning rate is NaN
    /// or infinite, i.e. the layer cannot be written out and read back.
    pub fn ensure_finite(&self) -> Result<()> {
        if !self.learning_rate.is_finite() {
            return Err(NnError::NonFinite(format!("learning rate is {}", self.learning_rate)));
        }
        self.weights.ensure_finite("weights")?;
        self.bias.ensure_finite("bias")
    }

    pub fn to_json(&self) -> Result<String> {
        self.ensure_finite()?;
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Layer> {
        serde_json::from_str(json).map_err(malformed)
    }

    pub fn from_value(value: Value) -> Result<Layer> {
        serde_json::from_value(value).map_err(malformed)
    }
}

fn check_sizes(input_size: usize, output_size: usize) -> Result<()> {
    if input_size == 0 || output_size == 0 {
        return Err(NnError::InvalidLayerSize { input_size, output_size });
    }
    Ok(())
}

fn default_learning_rate() -> f64 {
    DEFAULT_LEARNING_RATE
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayerRecord {
    input_size: usize,
    output_size: usize,
    activation: ActivationFunction,
    #[serde(default = "default_learning_rate")]
    learning_rate: f64,
    weights: Matrix,
    bias: Matrix,
    #[serde(default)]
    propagation: ErrorPropagation,
}

impl TryFrom<LayerRecord> for Layer {
    type Error = RecordError;

    fn try_from(record: LayerRecord) -> std::result::Result<Layer, RecordError> {
        let declared = (record.output_size, record.input_size);
        if record.weights.shape() != declared {
            return Err(RecordError(format!(
                "layer declares {}x{} weights but record holds {}x{}",
                declared.0,
                declared.1,
                record.weights.rows(),
                record.weights.cols()
            )));
        }
        let layer = Layer::from_parts(record.weights, record.bias, record.activation, record.learning_rate)
            .map_err(|e| RecordError(e.to_string()))?;
        Ok(layer.with_propagation(record.propagation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn known_layer(activation: ActivationFunction, learning_rate: f64) -> Layer {
        let weights = Matrix::from_data(vec![
            vec![0.1, -0.2, 0.3],
            vec![-0.5, 0.4, 0.25],
        ])
        .unwrap();
        let bias = Matrix::from_array(&[0.05, -0.1]).unwrap();
        Layer::from_parts(weights, bias, activation, learning_rate).unwrap()
    }

    #[test]
    fn new_layer_has_consistent_shapes() {
        let layer = Layer::new_with(3, 2, ActivationFunction::Tanh, &mut rng::seeded(3)).unwrap();
        assert_eq!(layer.weights().shape(), (2, 3));
        assert_eq!(layer.bias().shape(), (2, 1));
        assert_eq!(layer.learning_rate, DEFAULT_LEARNING_RATE);
        assert_eq!(layer.propagation, ErrorPropagation::PostUpdate);
    }

    #[test]
    fn zero_sized_layers_are_rejected() {
        let err = Layer::new(0, 4, ActivationFunction::ReLU).unwrap_err();
        assert!(matches!(err, NnError::InvalidLayerSize { input_size: 0, output_size: 4 }));
    }

    #[test]
    fn same_seed_same_parameters() {
        let a = Layer::new_with(4, 3, ActivationFunction::Sigmoid, &mut rng::seeded(11)).unwrap();
        let b = Layer::new_with(4, 3, ActivationFunction::Sigmoid, &mut rng::seeded(11)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn forward_applies_affine_then_activation() {
        let layer = known_layer(ActivationFunction::ReLU, 0.1);
        let ctx = layer.forward(Matrix::from_array(&[1.0, 2.0, 3.0]).unwrap()).unwrap();
        // row 0: 0.1 - 0.4 + 0.9 + 0.05 = 0.65, row 1: -0.5 + 0.8 + 0.75 - 0.1 = 0.95
        let out = ctx.outputs().to_array();
        assert!((out[0] - 0.65).abs() < 1e-12);
        assert!((out[1] - 0.95).abs() < 1e-12);
        assert_eq!(ctx.inputs().to_array(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn forward_rejects_wrong_input_length() {
        let layer = known_layer(ActivationFunction::Sigmoid, 0.1);
        let err = layer.forward(Matrix::from_array(&[1.0, 2.0]).unwrap()).unwrap_err();
        assert!(matches!(err, NnError::DimensionMismatch { op: "multiply", .. }));
    }

    #[test]
    fn backward_applies_delta_rule_exactly() {
        let lr = 0.5;
        let mut layer = known_layer(ActivationFunction::Sigmoid, lr);
        let w = layer.weights().clone();
        let b = layer.bias().clone();
        let x = [0.2, -0.4, 0.9];
        let e = [0.3, -0.7];

        let ctx = layer.forward(Matrix::from_array(&x).unwrap()).unwrap();
        let y = ctx.outputs().to_array();
        let returned = layer.backward(ctx, &Matrix::from_array(&e).unwrap()).unwrap();

        for i in 0..2 {
            let g = ActivationFunction::Sigmoid.derivative(y[i]) * e[i] * lr;
            for j in 0..3 {
                assert_eq!(layer.weights().get(i, j), w.get(i, j) + g * x[j]);
            }
            assert_eq!(layer.bias().get(i, 0), b.get(i, 0) + g);
        }

        // The returned error goes through the already-updated weights.
        for j in 0..3 {
            let mut expected = 0.0;
            for i in 0..2 {
                expected += layer.weights().get(i, j) * e[i];
            }
            assert_eq!(returned.get(j, 0), expected);
        }
    }

    #[test]
    fn pre_update_propagation_uses_forward_weights() {
        let mut layer = known_layer(ActivationFunction::Tanh, 0.3)
            .with_propagation(ErrorPropagation::PreUpdate);
        let w = layer.weights().clone();
        let e = Matrix::from_array(&[1.0, -2.0]).unwrap();

        let ctx = layer.forward(Matrix::from_array(&[0.5, 0.5, -1.0]).unwrap()).unwrap();
        let returned = layer.backward(ctx, &e).unwrap();

        assert_eq!(returned, Matrix::multiply(&w.transpose(), &e).unwrap());
        assert_ne!(layer.weights(), &w);
    }

    #[test]
    fn backward_rejects_foreign_context_without_updating() {
        let other = Layer::new_with(4, 2, ActivationFunction::Sigmoid, &mut rng::seeded(5)).unwrap();
        let ctx = other.forward(Matrix::from_array(&[1.0, 0.0, 1.0, 0.0]).unwrap()).unwrap();

        let mut layer = known_layer(ActivationFunction::Sigmoid, 0.1);
        let before = layer.clone();
        let err = layer.backward(ctx, &Matrix::from_array(&[0.1, 0.1]).unwrap()).unwrap_err();
        assert!(matches!(err, NnError::DimensionMismatch { op: "backward", .. }));
        assert_eq!(layer, before);
    }

    #[test]
    fn backward_rejects_wrong_error_shape_without_updating() {
        let mut layer = known_layer(ActivationFunction::Sigmoid, 0.1);
        let before = layer.clone();
        let ctx = layer.forward(Matrix::from_array(&[1.0, 1.0, 1.0]).unwrap()).unwrap();
        let err = layer.backward(ctx, &Matrix::from_array(&[0.1, 0.2, 0.3]).unwrap()).unwrap_err();
        assert!(matches!(err, NnError::DimensionMismatch { .. }));
        assert_eq!(layer, before);
    }

    #[test]
    fn record_uses_camel_case_keys() {
        let layer = known_layer(ActivationFunction::LeakyReLU, 0.2);
        let value = serde_json::to_value(&layer).unwrap();
        assert_eq!(value["inputSize"], 3);
        assert_eq!(value["outputSize"], 2);
        assert_eq!(value["activation"], "LeakyReLU");
        assert_eq!(value["learningRate"], 0.2);
        assert_eq!(value["weights"]["rows"], 2);
        assert_eq!(value["bias"]["cols"], 1);
        assert!(value.get("propagation").is_none());

        assert_eq!(Layer::from_json(&layer.to_json().unwrap()).unwrap(), layer);
    }

    #[test]
    fn record_with_mismatched_weights_is_malformed() {
        let record = json!({
            "inputSize": 2,
            "outputSize": 2,
            "activation": "Sigmoid",
            "learningRate": 0.1,
            "weights": { "rows": 2, "cols": 3, "data": [[1, 2, 3], [4, 5, 6]] },
            "bias": { "rows": 2, "cols": 1, "data": [[0], [0]] }
        });
        assert!(matches!(Layer::from_value(record), Err(NnError::MalformedRecord(_))));
    }

    #[test]
    fn record_without_learning_rate_gets_default() {
        let record = json!({
            "inputSize": 1,
            "outputSize": 1,
            "activation": "Tanh",
            "weights": { "rows": 1, "cols": 1, "data": [[0.5]] },
            "bias": { "rows": 1, "cols": 1, "data": [[0.0]] }
        });
        let layer = Layer::from_value(record).unwrap();
        assert_eq!(layer.learning_rate, DEFAULT_LEARNING_RATE);
    }

    #[test]
    fn nested_record_errors_are_prefixed_once() {
        let record = json!({
            "inputSize": 3,
            "outputSize": 1,
            "activation": "Sigmoid",
            "weights": { "rows": 1, "cols": 3, "data": [[1, 2, 3]] },
            "bias": { "rows": 2, "cols": 1, "data": [[0], [0]] }
        });
        let message = Layer::from_value(record).unwrap_err().to_string();
        assert!(message.starts_with("malformed record: dimension mismatch in bias"), "{message}");
        assert_eq!(message.matches("malformed record").count(), 1);

        let bad_matrix = json!({
            "inputSize": 1,
            "outputSize": 1,
            "activation": "Tanh",
            "weights": { "rows": 2, "cols": 1, "data": [[0.5]] },
            "bias": { "rows": 1, "cols": 1, "data": [[0.0]] }
        });
        let message = Layer::from_value(bad_matrix).unwrap_err().to_string();
        assert_eq!(message.matches("malformed record").count(), 1, "{message}");
    }

    #[test]
    fn diverged_layer_refuses_to_serialize() {
        let weights = Matrix::from_data(vec![vec![f64::NAN, 1.0]]).unwrap();
        let bias = Matrix::from_array(&[0.0]).unwrap();
        let layer = Layer::from_parts(weights, bias, ActivationFunction::ReLU, 0.1).unwrap();
        assert!(matches!(layer.to_json(), Err(NnError::NonFinite(_))));

        let layer = known_layer(ActivationFunction::ReLU, f64::INFINITY);
        assert!(matches!(layer.ensure_finite(), Err(NnError::NonFinite(_))));
        assert!(matches!(layer.to_json(), Err(NnError::NonFinite(_))));
        assert!(known_layer(ActivationFunction::ReLU, 0.1).ensure_finite().is_ok());
    }

    #[test]
    fn lowercase_activation_names_load() {
        let record = json!({
            "inputSize": 1,
            "outputSize": 1,
            "activation": "leaky_relu",
            "weights": { "rows": 1, "cols": 1, "data": [[0.5]] },
            "bias": { "rows": 1, "cols": 1, "data": [[0.0]] }
        });
        let layer = Layer::from_value(record).unwrap();
        assert_eq!(layer.activation, ActivationFunction::LeakyReLU);
        assert_eq!(serde_json::to_value(&layer).unwrap()["activation"], "LeakyReLU");
    }
}

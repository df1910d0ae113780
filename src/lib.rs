pub mod error;
pub mod math;
pub mod activation;
pub mod layers;
pub mod network;
pub mod loss;
pub mod train;

// Convenience re-exports
pub use error::{NnError, Result};
pub use math::matrix::Matrix;
pub use activation::activation::ActivationFunction;
pub use layers::dense::{ErrorPropagation, ForwardContext, Layer};
pub use network::network::LayeredNeuralNetwork;
pub use network::spec::{LayerSpec, NetworkSpec};
pub use train::{train_epoch, train_loop, TrainConfig};

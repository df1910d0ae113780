pub mod network;
pub mod spec;

pub use network::LayeredNeuralNetwork;
pub use spec::{NetworkSpec, LayerSpec};

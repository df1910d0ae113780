pub mod dense;

pub use dense::{ErrorPropagation, ForwardContext, Layer};

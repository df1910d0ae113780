use crate::error::{NnError, Result};

pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((predicted - expected)²)
    pub fn loss(predicted: &[f64], expected: &[f64]) -> Result<f64> {
        if predicted.len() != expected.len() || predicted.is_empty() {
            return Err(NnError::DimensionMismatch {
                op: "mse",
                left: (predicted.len(), 1),
                right: (expected.len(), 1),
            });
        }
        let n = predicted.len() as f64;
        Ok(predicted.iter().zip(expected.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>() / n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_squared_differences() {
        assert_eq!(MseLoss::loss(&[1.0, 0.0], &[0.0, 0.0]).unwrap(), 0.5);
        assert_eq!(MseLoss::loss(&[0.25], &[0.25]).unwrap(), 0.0);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        assert!(MseLoss::loss(&[1.0], &[1.0, 2.0]).is_err());
        assert!(MseLoss::loss(&[], &[]).is_err());
    }
}

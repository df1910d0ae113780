use crate::{
    error::{NnError, Result},
    loss::mse::MseLoss,
    network::network::LayeredNeuralNetwork,
};

/// One in-order pass of per-sample SGD over `inputs`/`targets`.
///
/// Returns the mean squared error of the predictions each `train` call made
/// before its own update.
pub fn train_epoch(
    network: &mut LayeredNeuralNetwork,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
) -> Result<f64> {
    check_paired(inputs.len(), targets.len())?;
    if inputs.is_empty() {
        return Ok(0.0);
    }

    let mut total_loss = 0.0;

    for (input, target) in inputs.iter().zip(targets.iter()) {
        let prediction = network.train(input, target)?;
        total_loss += MseLoss::loss(&prediction, target)?;
    }

    Ok(total_loss / inputs.len() as f64)
}

pub(crate) fn check_paired(inputs: usize, targets: usize) -> Result<()> {
    if inputs != targets {
        return Err(NnError::DimensionMismatch {
            op: "samples",
            left: (inputs, 1),
            right: (targets, 1),
        });
    }
    Ok(())
}

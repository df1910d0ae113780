use std::time::Instant;

use tracing::{debug, info};

use crate::error::Result;
use crate::network::network::LayeredNeuralNetwork;
use crate::train::epoch_stats::EpochStats;
use crate::train::train_config::TrainConfig;
use crate::train::trainer::{check_paired, train_epoch};

/// Trains `network` for `config.epochs` epochs, one sample at a time, visiting
/// samples in the order given. Returns the statistics of every epoch.
///
/// A failing sample aborts the run with that error; the updates made before it
/// stay applied.
pub fn train_loop(
    network: &mut LayeredNeuralNetwork,
    inputs: &[Vec<f64>],
    targets: &[Vec<f64>],
    config: &TrainConfig,
) -> Result<Vec<EpochStats>> {
    check_paired(inputs.len(), targets.len())?;

    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        let t_start = Instant::now();
        let mean_loss = train_epoch(network, inputs, targets)?;
        let elapsed_ms = t_start.elapsed().as_millis() as u64;

        debug!(epoch, mean_loss, elapsed_ms, "epoch finished");
        if config.log_every > 0 && (epoch % config.log_every == 0 || epoch == config.epochs) {
            info!(epoch, total = config.epochs, mean_loss, "training progress");
        }

        history.push(EpochStats {
            epoch,
            total_epochs: config.epochs,
            mean_loss,
            elapsed_ms,
        });
    }

    Ok(history)
}

/// Fraction of samples whose highest output matches the label.
pub fn accuracy(
    network: &LayeredNeuralNetwork,
    inputs: &[Vec<f64>],
    labels: &[usize],
) -> Result<f64> {
    check_paired(inputs.len(), labels.len())?;
    if inputs.is_empty() {
        return Ok(0.0);
    }

    let mut correct = 0;
    for (input, &label) in inputs.iter().zip(labels.iter()) {
        if argmax(&network.predict(input)?) == label {
            correct += 1;
        }
    }
    Ok(correct as f64 / inputs.len() as f64)
}

/// Index of the maximum element in a slice.
pub fn argmax(v: &[f64]) -> usize {
    v.iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

use layered_nn::{ActivationFunction, NetworkSpec, TrainConfig, train_loop};

fn main() -> layered_nn::Result<()> {
    tracing_subscriber::fmt::init();

    let mut network = NetworkSpec::new(vec![
        (2, 8, ActivationFunction::Sigmoid).into(),
        (8, 8, ActivationFunction::Sigmoid).into(),
        (8, 8, ActivationFunction::Sigmoid).into(),
        (8, 1, ActivationFunction::ReLU).into(),
    ])
    .with_seed(42)
    .build()?;

    let inputs = vec![
        vec![0.0, 0.0],
        vec![0.0, 1.0],
        vec![1.0, 0.0],
        vec![1.0, 1.0],
    ];
    let expected_outputs = vec![
        vec![0.0],
        vec![1.0],
        vec![1.0],
        vec![0.0],
    ];

    train_loop(&mut network, &inputs, &expected_outputs, &TrainConfig::new(10_000))?;

    for input in &inputs {
        println!("Input: {:?} -> Output: {:.4}", input, network.predict(input)?[0]);
    }

    Ok(())
}

//! Train the default stacking ensemble on synthetic four-class data.
//!
//! Run with: `cargo run -p harmony-classifiers --example stacking_synthetic`
use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use harmony_classifiers::config::EnsembleConfig;
use harmony_classifiers::labels::DemographicClass;
use harmony_classifiers::math::Array2;
use harmony_classifiers::metrics::{accuracy, confusion_matrix};
use harmony_classifiers::models::factory::build_stacker;
use harmony_classifiers::preprocessing::Scaler;

const N_FEATURES: usize = 12;

/// Gaussian-ish blobs with a class dependent shift on the first few features.
fn synthetic(n: usize, rng: &mut StdRng) -> Result<(Array2<f64>, Vec<i32>)> {
    let mut data = Vec::with_capacity(n * N_FEATURES);
    let mut labels = Vec::with_capacity(n);
    for _ in 0..n {
        let class = rng.gen_range(0..4);
        for j in 0..N_FEATURES {
            let shift = match j {
                0 => (class % 2) as f64 * 3.0,
                1 => (class / 2) as f64 * 3.0,
                2 => class as f64 * 50.0,
                _ => 0.0,
            };
            let noise: f64 = (0..3).map(|_| rng.gen_range(-1.0..1.0)).sum();
            data.push(shift + noise * if j == 2 { 40.0 } else { 1.0 });
        }
        labels.push(class);
    }
    Ok((Array2::from_shape_vec((n, N_FEATURES), data)?, labels))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut rng = StdRng::seed_from_u64(2024);
    let (x_train, y_train) = synthetic(600, &mut rng)?;
    let (x_test, y_test) = synthetic(200, &mut rng)?;

    let (scaler, x_train) = Scaler::fit_transform(&x_train)?;
    let x_test = scaler.transform(&x_test)?;

    let config = EnsembleConfig::default();
    let mut stacker = build_stacker(&config);
    stacker.fit(&x_train, &y_train)?;

    let pred = stacker.predict(&x_test)?;
    println!("Accuracy: {:.2}%", accuracy(&y_test, &pred)?);

    let matrix = confusion_matrix(&y_test, &pred, DemographicClass::ALL.len())?;
    for (class, row) in DemographicClass::ALL.iter().zip(&matrix) {
        println!("{:>16}: {:?}", class.name(), row);
    }

    let dir = tempfile::tempdir()?;
    stacker.save_models(dir.path())?;
    println!("Saved models to {}", dir.path().display());
    Ok(())
}

use anyhow::Result;
use clap::ArgMatches;
use log::LevelFilter;
use std::path::PathBuf;

use harmony_cli::cli::build_cli;
use harmony_cli::inference::inference;
use harmony_cli::inference::input::InferenceConfig;
use harmony_cli::train::input::TrainConfig;
use harmony_cli::train::trainer;

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("HARMONY_LOG", "error,harmony=info"))
        .init();

    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("inference", sub_m)) => handle_inference(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        anyhow::bail!("Missing training configuration file");
    };
    log::info!("[Harmony::Train] Training from config: {:?}", config_path);

    let params = TrainConfig::from_arguments(config_path, matches)?;

    match trainer::run_training(&params) {
        Ok(summary) => {
            log::info!(
                "[Harmony::Train] Trained on {} samples with {} features",
                summary.n_train,
                summary.n_features
            );
            Ok(())
        }
        Err(e) => {
            log::error!("Training failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

fn handle_inference(matches: &ArgMatches) -> Result<()> {
    let Some(config_path) = matches.get_one::<PathBuf>("config") else {
        anyhow::bail!("Missing inference configuration file");
    };
    log::info!("[Harmony::Inference] Inference using config: {:?}", config_path);

    let params = InferenceConfig::from_arguments(config_path, matches)?;

    match inference::run_inference(&params) {
        Ok(_) => Ok(()),
        Err(e) => {
            log::error!("Inference failed: {:#}", e);
            std::process::exit(1)
        }
    }
}

//! Integration tests for CLI config parsing, util helpers and the train /
//! inference round trip.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use harmony_classifiers::config::{DistanceMetric, EnsembleConfig, ModelType, StackingConfig};
use harmony_classifiers::labels::LabelTarget;
use harmony_cli::cli::build_cli;
use harmony_cli::inference::inference::run_inference;
use harmony_cli::inference::input::{InferenceConfig, InferenceMode};
use harmony_cli::train::input::TrainConfig;
use harmony_cli::train::trainer::run_training;
use harmony_cli::util::{
    read_target, validate_tsv_file, ENSEMBLE_FILE_NAME, SCALER_FILE_NAME, TARGET_FILE_NAME,
};

// ---------------------------------------------------------------------------
// validate_tsv_file
// ---------------------------------------------------------------------------

#[test]
fn validate_tsv_file_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.tsv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_tsv_file(path.to_str().unwrap()).is_ok());
}

#[test]
fn validate_wrong_extension_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("features.csv");
    std::fs::File::create(&path).unwrap();
    assert!(validate_tsv_file(path.to_str().unwrap()).is_err());
}

#[test]
fn validate_nonexistent_file_errors() {
    assert!(validate_tsv_file("/nonexistent/path/features.tsv").is_err());
}

// ---------------------------------------------------------------------------
// TrainConfig / InferenceConfig
// ---------------------------------------------------------------------------

#[test]
fn train_config_default_values() {
    let cfg = TrainConfig::default();
    assert!(cfg.scale_features);
    assert!(cfg.test_data.is_none());
    assert_eq!(cfg.output_dir, "models");
    assert_eq!(cfg.ensemble.stacking.n_folds, 5);
}

#[test]
fn train_config_round_trips_json() {
    let cfg = TrainConfig::default();
    let json = serde_json::to_string(&cfg).unwrap();
    let cfg2: TrainConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(cfg, cfg2);
}

#[test]
fn train_config_cli_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("train.tsv");
    std::fs::write(&data, "f1\tage\tgender\n").unwrap();
    let config_path = dir.path().join("train.json");
    std::fs::write(&config_path, r#"{"train_data": "missing.tsv", "scale_features": false}"#)
        .unwrap();

    let matches = build_cli()
        .try_get_matches_from([
            "harmony",
            "train",
            config_path.to_str().unwrap(),
            "-d",
            data.to_str().unwrap(),
            "-o",
            "out_models",
        ])
        .unwrap();
    let (_, sub_m) = matches.subcommand().unwrap();
    let cfg = TrainConfig::from_arguments(&config_path, sub_m).unwrap();
    assert_eq!(cfg.train_data, data.to_str().unwrap());
    assert_eq!(cfg.output_dir, "out_models");
    assert!(!cfg.scale_features);
}

#[test]
fn train_config_model_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("train.tsv");
    std::fs::write(&data, "f1\tage\tgender\n").unwrap();
    let config_path = dir.path().join("train.json");
    std::fs::write(
        &config_path,
        format!(r#"{{"train_data": {:?}}}"#, data.to_str().unwrap()),
    )
    .unwrap();

    let matches = build_cli()
        .try_get_matches_from([
            "harmony",
            "train",
            config_path.to_str().unwrap(),
            "--meta",
            "Logistic",
            "--bases",
            "rf,KNN,gbdt",
            "--target",
            "gender",
        ])
        .unwrap();
    let (_, sub_m) = matches.subcommand().unwrap();
    let cfg = TrainConfig::from_arguments(&config_path, sub_m).unwrap();
    assert_eq!(cfg.ensemble.meta, "lr".parse::<ModelType>().unwrap());
    let names: Vec<&str> = cfg.ensemble.bases.iter().map(ModelType::name).collect();
    assert_eq!(names, ["RandomForest", "KNN", "GBDT"]);
    assert_eq!(cfg.target, LabelTarget::Gender);
}

#[test]
fn train_config_rejects_unknown_model_name() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("train.tsv");
    std::fs::write(&data, "f1\tage\tgender\n").unwrap();
    let config_path = dir.path().join("train.json");
    std::fs::write(
        &config_path,
        format!(r#"{{"train_data": {:?}}}"#, data.to_str().unwrap()),
    )
    .unwrap();

    let matches = build_cli()
        .try_get_matches_from([
            "harmony",
            "train",
            config_path.to_str().unwrap(),
            "--bases",
            "knn,xgb",
        ])
        .unwrap();
    let (_, sub_m) = matches.subcommand().unwrap();
    let err = TrainConfig::from_arguments(&config_path, sub_m).unwrap_err();
    assert!(err.to_string().contains("Unknown model type: xgb"));

    assert!(build_cli()
        .try_get_matches_from([
            "harmony",
            "train",
            config_path.to_str().unwrap(),
            "--target",
            "speaker",
        ])
        .is_err());
}

#[test]
fn train_config_rejects_missing_data() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("train.json");
    std::fs::write(&config_path, r#"{"train_data": "/nonexistent/train.tsv"}"#).unwrap();
    let matches = build_cli()
        .try_get_matches_from(["harmony", "train", config_path.to_str().unwrap()])
        .unwrap();
    let (_, sub_m) = matches.subcommand().unwrap();
    assert!(TrainConfig::from_arguments(&config_path, sub_m).is_err());
}

#[test]
fn inference_config_uses_defaults_for_missing_fields() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("clips.tsv");
    std::fs::write(&data, "id\tf1\n").unwrap();
    let config_path = dir.path().join("inference.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{"inference_data": {:?}, "output_file": 12}}"#,
            data.to_str().unwrap()
        ),
    )
    .unwrap();

    let matches = build_cli()
        .try_get_matches_from([
            "harmony",
            "inference",
            config_path.to_str().unwrap(),
            "-m",
            dir.path().to_str().unwrap(),
        ])
        .unwrap();
    let (_, sub_m) = matches.subcommand().unwrap();
    let cfg = InferenceConfig::from_arguments(&config_path, sub_m).unwrap();
    assert_eq!(cfg.inference_data, data.to_str().unwrap());
    assert_eq!(cfg.model_dir, dir.path().to_str().unwrap());
    // Invalid value falls back to the default.
    assert_eq!(cfg.output_file, InferenceConfig::default().output_file);
    assert_eq!(cfg.mode, InferenceMode::Single);
    assert_eq!(cfg.gender_prefix, "gender");
    assert_eq!(cfg.age_prefix, "age");
}

#[test]
fn inference_config_mode_and_prefixes() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("clips.tsv");
    std::fs::write(&data, "id\tf1\n").unwrap();
    let config_path = dir.path().join("inference.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{"inference_data": {:?}, "model_dir": {:?}, "mode": "combined", "age_prefix": "age_v2"}}"#,
            data.to_str().unwrap(),
            dir.path().to_str().unwrap()
        ),
    )
    .unwrap();

    let matches = build_cli()
        .try_get_matches_from([
            "harmony",
            "inference",
            config_path.to_str().unwrap(),
            "--gender_prefix",
            "gender_v2",
        ])
        .unwrap();
    let (_, sub_m) = matches.subcommand().unwrap();
    let cfg = InferenceConfig::from_arguments(&config_path, sub_m).unwrap();
    assert_eq!(cfg.mode, InferenceMode::Combined);
    assert_eq!(cfg.gender_prefix, "gender_v2");
    assert_eq!(cfg.age_prefix, "age_v2");

    let matches = build_cli()
        .try_get_matches_from([
            "harmony",
            "inference",
            config_path.to_str().unwrap(),
            "--mode",
            "single",
        ])
        .unwrap();
    let (_, sub_m) = matches.subcommand().unwrap();
    let cfg = InferenceConfig::from_arguments(&config_path, sub_m).unwrap();
    assert_eq!(cfg.mode, InferenceMode::Single);
}

// ---------------------------------------------------------------------------
// train -> inference
// ---------------------------------------------------------------------------

const CLASSES: [(&str, &str); 4] = [
    ("twenties", "female"),
    ("twenties", "male"),
    ("fifties", "female"),
    ("fifties", "male"),
];

/// Deterministic, well separated feature table: class c sits around
/// (c % 2 * 10, c / 2 * 10) with a large-scale third feature.
fn write_labelled_table(path: &Path, n_per_class: usize, offset: usize) {
    let mut out = String::from("pitch_mean\tenergy\tspectral_centroid\tage\tgender\n");
    for i in 0..n_per_class {
        for (c, (age, gender)) in CLASSES.iter().enumerate() {
            let jitter = ((i + offset) * 37 % 11) as f64 / 10.0 - 0.5;
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                (c % 2) as f64 * 10.0 + jitter,
                (c / 2) as f64 * 10.0 - jitter,
                1000.0 + jitter * 100.0,
                age,
                gender
            )
            .unwrap();
        }
    }
    std::fs::write(path, out).unwrap();
}

fn small_ensemble() -> EnsembleConfig {
    EnsembleConfig {
        bases: vec![
            ModelType::KNN {
                k: 3,
                metric: DistanceMetric::Euclidean,
            },
            ModelType::KNN {
                k: 1,
                metric: DistanceMetric::Manhattan,
            },
        ],
        meta: ModelType::KNN {
            k: 3,
            metric: DistanceMetric::Euclidean,
        },
        stacking: StackingConfig {
            n_folds: 3,
            seed: 11,
            parallel: true,
        },
    }
}

#[test]
fn train_then_inference_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.tsv");
    let test_path = dir.path().join("test.tsv");
    write_labelled_table(&train_path, 10, 0);
    write_labelled_table(&test_path, 3, 5);
    let model_dir: PathBuf = dir.path().join("models");

    let train_cfg = TrainConfig {
        train_data: train_path.to_str().unwrap().to_string(),
        test_data: Some(test_path.to_str().unwrap().to_string()),
        output_dir: model_dir.to_str().unwrap().to_string(),
        scale_features: true,
        ensemble: small_ensemble(),
        ..TrainConfig::default()
    };
    let summary = run_training(&train_cfg).unwrap();
    assert_eq!(summary.n_train, 40);
    assert_eq!(summary.n_features, 3);
    assert_eq!(summary.test_accuracy, Some(100.0));

    assert!(model_dir.join("config.txt").exists());
    assert!(model_dir.join(ENSEMBLE_FILE_NAME).exists());
    assert!(model_dir.join(SCALER_FILE_NAME).exists());
    assert_eq!(read_target(&model_dir).unwrap(), LabelTarget::Class);

    // Labelled table doubles as inference input; age/gender are scored.
    let output = dir.path().join("predictions.tsv");
    let inference_cfg = InferenceConfig {
        model_dir: model_dir.to_str().unwrap().to_string(),
        inference_data: test_path.to_str().unwrap().to_string(),
        output_file: output.to_str().unwrap().to_string(),
        ..InferenceConfig::default()
    };
    let summary = run_inference(&inference_cfg).unwrap();
    assert_eq!(
        summary.labels,
        (0..12).map(|i| (i % 4) as i32).collect::<Vec<_>>()
    );
    assert_eq!(summary.target, LabelTarget::Class);
    assert_eq!(summary.accuracy, Some(100.0));

    let written = std::fs::read_to_string(&output).unwrap();
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("id\tlabel\tclass_name"));
    assert_eq!(lines.next(), Some("1\t0\ttwenties_female"));
    assert_eq!(written.lines().count(), 13);
}

#[test]
fn inference_on_unlabelled_table_reports_no_accuracy() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.tsv");
    write_labelled_table(&train_path, 10, 0);
    let model_dir = dir.path().join("models");
    run_training(&TrainConfig {
        train_data: train_path.to_str().unwrap().to_string(),
        output_dir: model_dir.to_str().unwrap().to_string(),
        ensemble: small_ensemble(),
        ..TrainConfig::default()
    })
    .unwrap();

    let clips = dir.path().join("clips.tsv");
    std::fs::write(
        &clips,
        "id\tpitch_mean\tenergy\tspectral_centroid\nclip_a\t10.0\t10.0\t1000.0\n",
    )
    .unwrap();
    let summary = run_inference(&InferenceConfig {
        model_dir: model_dir.to_str().unwrap().to_string(),
        inference_data: clips.to_str().unwrap().to_string(),
        output_file: dir.path().join("out.tsv").to_str().unwrap().to_string(),
        ..InferenceConfig::default()
    })
    .unwrap();
    assert_eq!(summary.labels, vec![3]);
    assert_eq!(summary.accuracy, None);
}

/// Train a gender and an age ensemble under `model_dir/<target>`.
fn train_split_models(train_path: &Path, model_dir: &Path, targets: [(&str, LabelTarget); 2]) {
    for (prefix, target) in targets {
        let summary = run_training(&TrainConfig {
            train_data: train_path.to_str().unwrap().to_string(),
            output_dir: model_dir.join(prefix).to_str().unwrap().to_string(),
            target,
            ensemble: small_ensemble(),
            ..TrainConfig::default()
        })
        .unwrap();
        assert_eq!(summary.n_train, 40);
    }
}

#[test]
fn combined_inference_merges_gender_and_age() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.tsv");
    let test_path = dir.path().join("test.tsv");
    write_labelled_table(&train_path, 10, 0);
    write_labelled_table(&test_path, 3, 5);
    let model_dir = dir.path().join("models");
    train_split_models(
        &train_path,
        &model_dir,
        [("gender", LabelTarget::Gender), ("age", LabelTarget::Age)],
    );
    assert_eq!(
        std::fs::read_to_string(model_dir.join("gender").join(TARGET_FILE_NAME)).unwrap(),
        "gender\n"
    );

    // A binary ensemble on its own predicts 0/1 and names them accordingly.
    let gender_out = dir.path().join("gender.tsv");
    let summary = run_inference(&InferenceConfig {
        model_dir: model_dir.join("gender").to_str().unwrap().to_string(),
        inference_data: test_path.to_str().unwrap().to_string(),
        output_file: gender_out.to_str().unwrap().to_string(),
        ..InferenceConfig::default()
    })
    .unwrap();
    assert_eq!(summary.target, LabelTarget::Gender);
    assert_eq!(summary.accuracy, Some(100.0));
    let written = std::fs::read_to_string(&gender_out).unwrap();
    assert_eq!(written.lines().nth(2), Some("2\t1\tmale"));

    let output = dir.path().join("combined.tsv");
    let summary = run_inference(&InferenceConfig {
        model_dir: model_dir.to_str().unwrap().to_string(),
        inference_data: test_path.to_str().unwrap().to_string(),
        output_file: output.to_str().unwrap().to_string(),
        mode: InferenceMode::Combined,
        ..InferenceConfig::default()
    })
    .unwrap();
    assert_eq!(
        summary.labels,
        (0..12).map(|i| (i % 4) as i32).collect::<Vec<_>>()
    );
    assert_eq!(summary.target, LabelTarget::Class);
    assert_eq!(summary.accuracy, Some(100.0));
    let written = std::fs::read_to_string(&output).unwrap();
    assert_eq!(written.lines().nth(3), Some("3\t2\tfifties_female"));
}

#[test]
fn combined_inference_rejects_swapped_targets() {
    let dir = tempfile::tempdir().unwrap();
    let train_path = dir.path().join("train.tsv");
    write_labelled_table(&train_path, 10, 0);
    let model_dir = dir.path().join("models");
    train_split_models(
        &train_path,
        &model_dir,
        [("gender", LabelTarget::Age), ("age", LabelTarget::Gender)],
    );

    let err = run_inference(&InferenceConfig {
        model_dir: model_dir.to_str().unwrap().to_string(),
        inference_data: train_path.to_str().unwrap().to_string(),
        output_file: dir.path().join("out.tsv").to_str().unwrap().to_string(),
        mode: InferenceMode::Combined,
        ..InferenceConfig::default()
    })
    .unwrap_err();
    assert!(err.to_string().contains("expected 'gender'"));
}

#[test]
fn inference_without_saved_ensemble_fails() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("clips.tsv");
    std::fs::write(&data, "f1\n1.0\n").unwrap();
    let cfg = InferenceConfig {
        model_dir: dir.path().to_str().unwrap().to_string(),
        inference_data: data.to_str().unwrap().to_string(),
        output_file: dir.path().join("out.tsv").to_str().unwrap().to_string(),
        ..InferenceConfig::default()
    };
    assert!(run_inference(&cfg).is_err());
}

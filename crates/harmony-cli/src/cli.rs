use std::path::PathBuf;

use clap::{Arg, Command, ValueHint};

/// Command line definition shared by the binary and the tests.
pub fn build_cli() -> Command {
    Command::new("harmony")
        .version(clap::crate_version!())
        .about("Harmony - stacked-ensemble speaker age and gender classification")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("train")
                .about("Train a stacking ensemble on a labelled feature table")
                .arg(
                    Arg::new("config")
                        .help("Path to training configuration file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("train_data")
                        .short('d')
                        .long("train_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to training features (TSV). Overrides the training data file \
                             specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("test_data")
                        .short('t')
                        .long("test_data")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Path to held-out labelled features (TSV) used to report accuracy. \
                             Overrides the test data file specified in the configuration file.",
                        )
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_dir")
                        .short('o')
                        .long("output_dir")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Directory the trained models are written to. \
                             Overrides the directory specified in the configuration file.",
                        )
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_parser(["class", "gender", "age"])
                        .help(
                            "Train on the four demographic classes, or on gender or age alone. \
                             Overrides the target specified in the configuration file.",
                        ),
                )
                .arg(
                    Arg::new("meta")
                        .long("meta")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help(
                            "Meta model type (gbdt, knn, lr, rf, svm). \
                             Overrides the meta model specified in the configuration file.",
                        ),
                )
                .arg(
                    Arg::new("bases")
                        .long("bases")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_delimiter(',')
                        .help(
                            "Comma-separated base model types, e.g. gbdt,rf,knn. \
                             Overrides the base models specified in the configuration file.",
                        ),
                ),
        )
        .subcommand(
            Command::new("inference")
                .about("Predict demographic classes for an unlabelled feature table")
                .arg(
                    Arg::new("config")
                        .help("Path to inference configuration file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("model_dir")
                        .short('m')
                        .long("model_dir")
                        .help("Directory holding a trained ensemble")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("inference_data")
                        .short('d')
                        .long("inference_data")
                        .help("Path to the input feature table (TSV)")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output_file")
                        .help("Path to the output file for predictions (TSV)")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("mode")
                        .long("mode")
                        .value_parser(["single", "combined"])
                        .help(
                            "single: one four-class ensemble in the model directory. \
                             combined: a gender and an age ensemble in subdirectories of it.",
                        ),
                )
                .arg(
                    Arg::new("gender_prefix")
                        .long("gender_prefix")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Subdirectory of the gender ensemble in combined mode"),
                )
                .arg(
                    Arg::new("age_prefix")
                        .long("age_prefix")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .help("Subdirectory of the age ensemble in combined mode"),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
}

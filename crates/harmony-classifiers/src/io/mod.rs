//! Readers and writers for the tab-separated feature tables produced by the
//! audio feature extractor.
pub mod feature_tsv;

pub use feature_tsv::{
    read_feature_tsv, read_unlabeled_tsv, write_predictions_tsv, FeatureDataset, UnlabeledDataset,
};

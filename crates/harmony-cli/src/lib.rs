//! harmony-cli: train stacking ensembles from feature tables and run them on
//! new recordings.
pub mod cli;
pub mod inference;
pub mod train;
pub mod util;

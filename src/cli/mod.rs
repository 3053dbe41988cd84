//! CLI argument parsing shared by both training binaries (§6).

use std::path::PathBuf;

use clap::Parser;

/// Flags common to both training drivers.
#[derive(Parser, Debug)]
pub struct CommonArgs {
    /// Number of training epochs.
    #[arg(short = 'e', long = "epochs", default_value_t = 10)]
    pub epochs: usize,

    /// Learning rate.
    #[arg(short = 'r', long = "lr", default_value_t = 1e-3)]
    pub lr: f64,

    /// Weight decay.
    #[arg(short = 'w', long = "weight-decay", default_value_t = 1e-2)]
    pub weight_decay: f64,

    /// Train batch size, optionally followed by `:test_batch_size`.
    #[arg(short = 'b', long = "batch", default_value = "8")]
    pub batch: String,

    /// Hidden layer sizes, space-separated (e.g. "128 64").
    #[arg(short = 'L', long = "layers", default_value = "128")]
    pub hidden_sizes: String,

    /// Load a model checkpoint directory before training.
    #[arg(short = 'l', long = "load")]
    pub load: Option<PathBuf>,

    /// Store the trained model checkpoint to this directory.
    #[arg(short = 's', long = "store")]
    pub store: Option<PathBuf>,

    /// File-list of utterance/experiment stems.
    #[arg(long = "file-list")]
    pub file_list: PathBuf,

    /// Directory holding the feature/sensor files.
    #[arg(long = "input-dir")]
    pub input_dir: PathBuf,
}

impl CommonArgs {
    pub fn hidden_sizes(&self) -> Vec<usize> {
        self.hidden_sizes
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect()
    }

    /// `(train_batch_size, test_batch_size)`; test defaults to train's size
    /// when no `:Tb` suffix is given.
    pub fn batch_sizes(&self) -> (usize, usize) {
        match self.batch.split_once(':') {
            Some((train, test)) => (train.parse().unwrap_or(8), test.parse().unwrap_or(8)),
            None => {
                let b = self.batch.parse().unwrap_or(8);
                (b, b)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(batch: &str, hidden: &str) -> CommonArgs {
        CommonArgs {
            epochs: 1,
            lr: 0.1,
            weight_decay: 0.0,
            batch: batch.into(),
            hidden_sizes: hidden.into(),
            load: None,
            store: None,
            file_list: PathBuf::from("list.txt"),
            input_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn hidden_sizes_parses_space_separated_list() {
        assert_eq!(args("8", "128 64 32").hidden_sizes(), vec![128, 64, 32]);
    }

    #[test]
    fn batch_sizes_splits_on_colon() {
        assert_eq!(args("16:4", "64").batch_sizes(), (16, 4));
    }

    #[test]
    fn batch_sizes_defaults_test_to_train() {
        assert_eq!(args("16", "64").batch_sizes(), (16, 16));
    }
}

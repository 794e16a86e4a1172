//! CLI surface and run configuration.
//!
//! Arguments are parsed once in the binary and passed by reference into the
//! orchestrator and loops; nothing reads configuration from globals.

use clap::{Parser, ValueEnum};
use models::Backbone;
use snake_dataset::{DatasetVariant, LoaderConfig};
use std::path::PathBuf;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum DatasetKind {
    /// Manually annotated curved-text corpus with a validation split.
    TotalText,
    /// Synthetically rendered corpus; training split only.
    SynthText,
}

impl DatasetKind {
    pub fn variant(self) -> DatasetVariant {
        match self {
            DatasetKind::TotalText => DatasetVariant::TotalText,
            DatasetKind::SynthText => DatasetVariant::SynthText,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackboneKind {
    Vgg,
    VggSlim,
}

impl BackboneKind {
    pub fn to_backbone(self) -> Backbone {
        match self {
            BackboneKind::Vgg => Backbone::Vgg,
            BackboneKind::VggSlim => Backbone::VggSlim,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum BackendKind {
    NdArray,
    Wgpu,
}

#[derive(Parser, Debug)]
#[command(
    name = "train",
    about = "Train the TextSnake curved-text detector",
    args_override_self = true
)]
pub struct TrainArgs {
    /// Dataset corpus to train on.
    #[arg(long, value_enum, default_value_t = DatasetKind::TotalText)]
    pub dataset: DatasetKind,
    /// Dataset root directory.
    #[arg(long, default_value = "data/total-text")]
    pub data_root: PathBuf,
    /// Square sample resolution; must be divisible by 8.
    #[arg(long, default_value_t = 512)]
    pub input_size: u32,
    /// Per-channel normalization means.
    #[arg(long, num_args = 3, default_values_t = [0.485, 0.456, 0.406])]
    pub means: Vec<f32>,
    /// Per-channel normalization standard deviations.
    #[arg(long, num_args = 3, default_values_t = [0.229, 0.224, 0.225])]
    pub stds: Vec<f32>,
    /// Backbone variant (also names checkpoint files).
    #[arg(long, value_enum, default_value_t = BackboneKind::Vgg)]
    pub backbone: BackboneKind,
    /// Backend to use (ndarray, or wgpu if enabled).
    #[arg(long, value_enum, default_value_t = BackendKind::NdArray)]
    pub backend: BackendKind,
    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,
    /// Parallel sample-decoding workers; 0 loads sequentially.
    #[arg(long, default_value_t = 0)]
    pub num_workers: usize,
    /// Initial learning rate.
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,
    #[arg(long, default_value_t = 0)]
    pub start_epoch: usize,
    #[arg(long, default_value_t = 200)]
    pub max_epoch: usize,
    /// Iterations between progress lines and term-log appends.
    #[arg(long, default_value_t = 10)]
    pub display_freq: usize,
    /// Iterations between visualization artifacts (needs --viz).
    #[arg(long, default_value_t = 50)]
    pub viz_freq: usize,
    /// Iterations between scalar pushes to the summary sink.
    #[arg(long, default_value_t = 10)]
    pub log_freq: usize,
    /// Epochs between "end"-tagged checkpoints.
    #[arg(long, default_value_t = 5)]
    pub save_freq: usize,
    /// Iterations between mid-epoch checkpoints.
    #[arg(long, default_value_t = 1000)]
    pub save_iter_freq: usize,
    /// Emit visualization PNGs.
    #[arg(long, default_value_t = false)]
    pub viz: bool,
    /// Checkpoint root; checkpoints land under <save_dir>/<exp_name>.
    #[arg(long, default_value = "save")]
    pub save_dir: PathBuf,
    /// Scalar-log root; events land under <log_dir>/<timestamp>_<exp_name>.
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,
    #[arg(long, default_value = "textsnake")]
    pub exp_name: String,
    /// Checkpoint to restore model and optimizer state from.
    #[arg(long)]
    pub resume: Option<PathBuf>,
    /// Shuffle seed for repeatable runs.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.batch_size > 0, "batch size must be greater than 0");
        anyhow::ensure!(self.lr > 0.0, "learning rate must be positive");
        anyhow::ensure!(
            self.input_size > 0 && self.input_size % 8 == 0,
            "input size must be a positive multiple of 8"
        );
        anyhow::ensure!(
            self.start_epoch < self.max_epoch,
            "start epoch {} is not before max epoch {}",
            self.start_epoch,
            self.max_epoch
        );
        for (name, freq) in [
            ("display-freq", self.display_freq),
            ("viz-freq", self.viz_freq),
            ("log-freq", self.log_freq),
            ("save-freq", self.save_freq),
            ("save-iter-freq", self.save_iter_freq),
        ] {
            anyhow::ensure!(freq > 0, "{name} must be greater than 0");
        }
        anyhow::ensure!(
            self.means.len() == 3 && self.stds.len() == 3,
            "means and stds each take exactly 3 values"
        );
        anyhow::ensure!(
            self.stds.iter().all(|s| *s > 0.0),
            "stds must be positive"
        );
        Ok(())
    }

    pub fn experiment_dir(&self) -> PathBuf {
        self.save_dir.join(&self.exp_name)
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            input_size: self.input_size,
            means: [self.means[0], self.means[1], self.means[2]],
            stds: [self.stds[0], self.stds[1], self.stds[2]],
            shuffle: true,
            seed: self.seed,
            num_workers: self.num_workers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_parse_and_validate() {
        let args = TrainArgs::parse_from(["train"]);
        args.validate().unwrap();
        assert_eq!(args.batch_size, 4);
        assert!(matches!(args.dataset, DatasetKind::TotalText));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let args = TrainArgs::parse_from(["train", "--display-freq", "0"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn input_size_must_be_divisible_by_eight() {
        let args = TrainArgs::parse_from(["train", "--input-size", "100"]);
        assert!(args.validate().is_err());
    }
}

#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod loss;
pub mod metrics;
pub mod run;
pub mod schedule;
pub mod summary;
pub mod trainer;
pub mod validate;
pub mod viz;

pub use checkpoint::{CheckpointError, CheckpointManager, CheckpointRecord, IterationLabel};
pub use config::TrainArgs;
pub use loss::{LossTerms, TermValues, TextLoss};
pub use metrics::AverageMeter;
pub use run::run_train;
pub use schedule::{LrPolicy, LrScheduler};
pub use summary::SummaryWriter;
pub use trainer::{train_one_epoch, RunContext};
pub use validate::validate;

/// Backend alias for training/eval (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn_wgpu::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn_ndarray::NdArray<f32>;

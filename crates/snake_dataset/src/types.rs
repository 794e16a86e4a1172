//! Core types, error definitions, and data structures for snake_dataset.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, SnakeDatasetError>;

#[derive(Debug, Error)]
pub enum SnakeDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("image file missing for sample {path}: {image}")]
    MissingImage { path: PathBuf, image: PathBuf },
    #[error("malformed maps file at {path}: {msg}")]
    Maps { path: PathBuf, msg: String },
    #[error("sample {path} is {actual_w}x{actual_h}, expected {expected}x{expected}")]
    DimMismatch {
        path: PathBuf,
        expected: u32,
        actual_w: u32,
        actual_h: u32,
    },
    #[error("no samples found under {root}")]
    Empty { root: PathBuf },
    #[error("{0}")]
    Other(String),
}

/// Number of ground-truth map planes stored per sample.
pub const MAP_CHANNELS: usize = 6;

/// Plane order inside a `.maps` blob and a [`GeoSample::maps`] buffer.
pub const MAP_TRAIN_MASK: usize = 0;
pub const MAP_TR_MASK: usize = 1;
pub const MAP_TCL_MASK: usize = 2;
pub const MAP_RADIUS: usize = 3;
pub const MAP_SIN: usize = 4;
pub const MAP_COS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleMeta {
    pub id: String,
    /// Image file name, relative to the sample directory.
    pub image: String,
    pub width: u32,
    pub height: u32,
}

/// One loaded sample: normalized image plus the six ground-truth maps.
#[derive(Debug, Clone)]
pub struct GeoSample {
    pub meta: SampleMeta,
    /// Image in CHW layout, normalized with the configured mean/std.
    pub image_chw: Vec<f32>,
    /// Six stacked planes of `height * width` values, in the `MAP_*` order.
    pub maps: Vec<f32>,
}

#[derive(Debug, Clone)]
pub struct SampleIndex {
    pub meta_path: PathBuf,
}

/// Loader settings shared by every sample read.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Expected square sample resolution; samples of any other size fail.
    pub input_size: u32,
    pub means: [f32; 3],
    pub stds: [f32; 3],
    pub shuffle: bool,
    pub seed: Option<u64>,
    /// Size of the rayon pool used for sample decoding; 0 loads sequentially.
    pub num_workers: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            input_size: 512,
            means: [0.485, 0.456, 0.406],
            stds: [0.229, 0.224, 0.225],
            shuffle: false,
            seed: None,
            num_workers: 0,
        }
    }
}

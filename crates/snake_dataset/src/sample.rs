//! On-disk sample format: `<stem>.json` metadata, `<stem>.png` image, and a
//! `<stem>.maps` binary blob holding the six ground-truth geometry maps.
//!
//! The maps blob layout (little-endian): 4-byte magic `GMAP`, u32 version,
//! u32 width, u32 height, u32 channels, then `channels * height * width`
//! f32 values in the `MAP_*` plane order.

use crate::types::{
    DatasetResult, GeoSample, LoaderConfig, SampleIndex, SampleMeta, SnakeDatasetError,
    MAP_CHANNELS,
};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAPS_MAGIC: &[u8; 4] = b"GMAP";
pub const MAPS_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 * 4;

/// Scan a directory for sample metadata files, in stable name order.
pub fn index_samples(dir: &Path) -> DatasetResult<Vec<SampleIndex>> {
    let mut indices = Vec::new();
    let entries = fs::read_dir(dir).map_err(|e| SnakeDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let entry = entry.map_err(|e| SnakeDatasetError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            indices.push(SampleIndex { meta_path: path });
        }
    }
    indices.sort_by(|a, b| a.meta_path.cmp(&b.meta_path));
    Ok(indices)
}

/// Load and normalize one sample. Fails fast on any malformed input.
pub fn load_sample(idx: &SampleIndex, cfg: &LoaderConfig) -> DatasetResult<GeoSample> {
    let raw = fs::read(&idx.meta_path).map_err(|e| SnakeDatasetError::Io {
        path: idx.meta_path.clone(),
        source: e,
    })?;
    let meta: SampleMeta =
        serde_json::from_slice(&raw).map_err(|e| SnakeDatasetError::Json {
            path: idx.meta_path.clone(),
            source: e,
        })?;

    let dir = idx.meta_path.parent().unwrap_or_else(|| Path::new("."));
    let image_path = dir.join(&meta.image);
    if !image_path.exists() {
        return Err(SnakeDatasetError::MissingImage {
            path: idx.meta_path.clone(),
            image: image_path,
        });
    }
    let img = image::open(&image_path)
        .map_err(|e| SnakeDatasetError::Image {
            path: image_path.clone(),
            source: e,
        })?
        .to_rgb8();
    let (width, height) = img.dimensions();
    if width != cfg.input_size || height != cfg.input_size {
        return Err(SnakeDatasetError::DimMismatch {
            path: image_path,
            expected: cfg.input_size,
            actual_w: width,
            actual_h: height,
        });
    }

    // Normalized CHW layout.
    let pixels = (width * height) as usize;
    let mut image_chw = Vec::with_capacity(3 * pixels);
    for c in 0..3usize {
        let mean = cfg.means[c];
        let std = cfg.stds[c];
        for y in 0..height {
            for x in 0..width {
                let v = img.get_pixel(x, y)[c] as f32 / 255.0;
                image_chw.push((v - mean) / std);
            }
        }
    }

    let maps_path = idx.meta_path.with_extension("maps");
    let maps = read_maps(&maps_path, width, height)?;

    Ok(GeoSample {
        meta,
        image_chw,
        maps,
    })
}

/// Read a `.maps` blob and validate it against the expected dimensions.
pub fn read_maps(path: &Path, width: u32, height: u32) -> DatasetResult<Vec<f32>> {
    let raw = fs::read(path).map_err(|e| SnakeDatasetError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let malformed = |msg: String| SnakeDatasetError::Maps {
        path: path.to_path_buf(),
        msg,
    };
    if raw.len() < HEADER_LEN {
        return Err(malformed(format!("truncated header ({} bytes)", raw.len())));
    }
    if &raw[0..4] != MAPS_MAGIC {
        return Err(malformed("bad magic".to_string()));
    }
    let read_u32 = |offset: usize| {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(&raw[offset..offset + 4]);
        u32::from_le_bytes(arr)
    };
    let version = read_u32(4);
    if version != MAPS_VERSION {
        return Err(malformed(format!("unsupported version {version}")));
    }
    let w = read_u32(8);
    let h = read_u32(12);
    let channels = read_u32(16);
    if w != width || h != height {
        return Err(malformed(format!(
            "maps are {w}x{h}, image is {width}x{height}"
        )));
    }
    if channels as usize != MAP_CHANNELS {
        return Err(malformed(format!(
            "expected {MAP_CHANNELS} planes, found {channels}"
        )));
    }
    let elems = MAP_CHANNELS * (width * height) as usize;
    let payload = &raw[HEADER_LEN..];
    if payload.len() != elems * 4 {
        return Err(malformed(format!(
            "payload is {} bytes, expected {}",
            payload.len(),
            elems * 4
        )));
    }
    let mut maps = Vec::with_capacity(elems);
    for chunk in payload.chunks_exact(4) {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(chunk);
        maps.push(f32::from_le_bytes(arr));
    }
    Ok(maps)
}

/// Write a complete sample (metadata, image, maps blob) under `dir`.
///
/// Used by the offline ground-truth export tooling and by tests; the trainer
/// itself only reads.
pub fn write_sample(
    dir: &Path,
    meta: &SampleMeta,
    image: &image::RgbImage,
    maps: &[f32],
) -> DatasetResult<PathBuf> {
    let expected = MAP_CHANNELS * (meta.width * meta.height) as usize;
    if maps.len() != expected {
        return Err(SnakeDatasetError::Other(format!(
            "maps buffer has {} values, expected {expected}",
            maps.len()
        )));
    }
    fs::create_dir_all(dir).map_err(|e| SnakeDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let meta_path = dir.join(format!("{}.json", meta.id));
    let data = serde_json::to_vec_pretty(meta).map_err(|e| SnakeDatasetError::Json {
        path: meta_path.clone(),
        source: e,
    })?;
    fs::write(&meta_path, data).map_err(|e| SnakeDatasetError::Io {
        path: meta_path.clone(),
        source: e,
    })?;

    let image_path = dir.join(&meta.image);
    image
        .save(&image_path)
        .map_err(|e| SnakeDatasetError::Image {
            path: image_path,
            source: e,
        })?;

    let maps_path = meta_path.with_extension("maps");
    let mut blob = Vec::with_capacity(HEADER_LEN + maps.len() * 4);
    blob.extend_from_slice(MAPS_MAGIC);
    blob.extend_from_slice(&MAPS_VERSION.to_le_bytes());
    blob.extend_from_slice(&meta.width.to_le_bytes());
    blob.extend_from_slice(&meta.height.to_le_bytes());
    blob.extend_from_slice(&(MAP_CHANNELS as u32).to_le_bytes());
    for v in maps {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    fs::write(&maps_path, blob).map_err(|e| SnakeDatasetError::Io {
        path: maps_path.clone(),
        source: e,
    })?;
    Ok(meta_path)
}

//! Batch iteration for training and validation.

use crate::sample::load_sample;
use crate::types::{
    DatasetResult, GeoSample, LoaderConfig, SampleIndex, SampleMeta, SnakeDatasetError,
    MAP_COS, MAP_RADIUS, MAP_SIN, MAP_TCL_MASK, MAP_TRAIN_MASK, MAP_TR_MASK,
};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

/// One assembled batch of image and ground-truth map tensors.
pub struct GeoBatch<B: Backend> {
    /// `[N, 3, H, W]`, normalized.
    pub images: Tensor<B, 4>,
    /// Pixels that participate in the loss (excludes don't-care regions).
    pub train_mask: Tensor<B, 3>,
    pub tr_mask: Tensor<B, 3>,
    pub tcl_mask: Tensor<B, 3>,
    pub radius_map: Tensor<B, 3>,
    pub sin_map: Tensor<B, 3>,
    pub cos_map: Tensor<B, 3>,
    pub metas: Vec<SampleMeta>,
}

/// Sequential batch iterator over an indexed sample set.
///
/// Sample decoding runs on an owned rayon pool when `num_workers > 0`; batch
/// order is always the (possibly shuffled) index order, and any sample error
/// aborts iteration.
#[derive(Debug)]
pub struct BatchIter {
    indices: Vec<SampleIndex>,
    cursor: usize,
    cfg: LoaderConfig,
    rng: StdRng,
    pool: Option<rayon::ThreadPool>,
}

impl BatchIter {
    pub fn new(indices: Vec<SampleIndex>, cfg: LoaderConfig) -> DatasetResult<Self> {
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        let pool = if cfg.num_workers > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(cfg.num_workers)
                .build()
                .map_err(|e| SnakeDatasetError::Other(format!("worker pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        let mut iter = Self {
            indices,
            cursor: 0,
            cfg,
            rng,
            pool,
        };
        if iter.cfg.shuffle {
            iter.indices.shuffle(&mut iter.rng);
        }
        Ok(iter)
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn num_batches(&self, batch_size: usize) -> usize {
        let batch_size = batch_size.max(1);
        self.indices.len().div_ceil(batch_size)
    }

    /// Rewind for a new epoch, reshuffling when the policy asks for it.
    pub fn reset(&mut self) {
        self.cursor = 0;
        if self.cfg.shuffle {
            self.indices.shuffle(&mut self.rng);
        }
    }

    pub fn next_batch<B: Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<GeoBatch<B>>> {
        if self.cursor >= self.indices.len() {
            return Ok(None);
        }
        let batch_size = batch_size.max(1);
        let end = (self.cursor + batch_size).min(self.indices.len());
        let slice = &self.indices[self.cursor..end];
        self.cursor = end;

        let loaded: Vec<DatasetResult<GeoSample>> = match &self.pool {
            Some(pool) => pool.install(|| {
                slice
                    .par_iter()
                    .map(|idx| load_sample(idx, &self.cfg))
                    .collect()
            }),
            None => slice.iter().map(|idx| load_sample(idx, &self.cfg)).collect(),
        };

        let side = self.cfg.input_size as usize;
        let plane = side * side;
        let n = loaded.len();
        let mut images_buf = Vec::with_capacity(n * 3 * plane);
        let mut map_bufs: [Vec<f32>; 6] = Default::default();
        for buf in &mut map_bufs {
            buf.reserve(n * plane);
        }
        let mut metas = Vec::with_capacity(n);

        for res in loaded {
            let sample = res?;
            images_buf.extend_from_slice(&sample.image_chw);
            for (m, buf) in map_bufs.iter_mut().enumerate() {
                buf.extend_from_slice(&sample.maps[m * plane..(m + 1) * plane]);
            }
            metas.push(sample.meta);
        }

        let images = Tensor::<B, 1>::from_floats(images_buf.as_slice(), device)
            .reshape([n, 3, side, side]);
        let map_tensor = |m: usize| {
            Tensor::<B, 1>::from_floats(map_bufs[m].as_slice(), device).reshape([n, side, side])
        };
        let train_mask = map_tensor(MAP_TRAIN_MASK);
        let tr_mask = map_tensor(MAP_TR_MASK);
        let tcl_mask = map_tensor(MAP_TCL_MASK);
        let radius_map = map_tensor(MAP_RADIUS);
        let sin_map = map_tensor(MAP_SIN);
        let cos_map = map_tensor(MAP_COS);

        Ok(Some(GeoBatch {
            images,
            train_mask,
            tr_mask,
            tcl_mask,
            radius_map,
            sin_map,
            cos_map,
            metas,
        }))
    }
}

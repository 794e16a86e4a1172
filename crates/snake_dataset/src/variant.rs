//! Dataset variant selection, resolved once at startup into concrete loaders.

use crate::batch::BatchIter;
use crate::sample::index_samples;
use crate::types::{DatasetResult, LoaderConfig, SnakeDatasetError};
use std::path::{Path, PathBuf};

/// The two supported corpora.
///
/// `TotalText` is the manually annotated curved-text corpus with `train/`
/// and `val/` splits. `SynthText` is the synthetically rendered corpus: flat
/// layout, training split only, no validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetVariant {
    TotalText,
    SynthText,
}

impl DatasetVariant {
    pub fn has_validation(&self) -> bool {
        matches!(self, DatasetVariant::TotalText)
    }

    pub fn train_dir(&self, root: &Path) -> PathBuf {
        match self {
            DatasetVariant::TotalText => root.join("train"),
            DatasetVariant::SynthText => root.to_path_buf(),
        }
    }

    pub fn val_dir(&self, root: &Path) -> Option<PathBuf> {
        match self {
            DatasetVariant::TotalText => Some(root.join("val")),
            DatasetVariant::SynthText => None,
        }
    }

    /// Build the training iterator and, when the corpus has a held-out
    /// split, the validation iterator. Validation never shuffles.
    pub fn build_loaders(
        &self,
        root: &Path,
        cfg: &LoaderConfig,
    ) -> DatasetResult<(BatchIter, Option<BatchIter>)> {
        let train_dir = self.train_dir(root);
        let train_idx = index_samples(&train_dir)?;
        if train_idx.is_empty() {
            return Err(SnakeDatasetError::Empty { root: train_dir });
        }
        let train = BatchIter::new(train_idx, cfg.clone())?;

        let val = match self.val_dir(root) {
            Some(dir) => {
                let val_cfg = LoaderConfig {
                    shuffle: false,
                    ..cfg.clone()
                };
                Some(BatchIter::new(index_samples(&dir)?, val_cfg)?)
            }
            None => None,
        };
        Ok((train, val))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synth_text_has_no_validation_split() {
        assert!(!DatasetVariant::SynthText.has_validation());
        assert!(DatasetVariant::SynthText.val_dir(Path::new("data")).is_none());
    }

    #[test]
    fn total_text_splits_under_root() {
        let root = Path::new("data/total-text");
        assert_eq!(
            DatasetVariant::TotalText.train_dir(root),
            root.join("train")
        );
        assert_eq!(
            DatasetVariant::TotalText.val_dir(root),
            Some(root.join("val"))
        );
    }
}

//! Checkpoint persistence.
//!
//! A checkpoint is one file under the experiment directory, named
//! `textsnake_<backbone>_<epoch>_<iter-or-"end">.pth`. The payload is a
//! little-endian container: 4-byte magic `TSCK`, u32 version, f64 learning
//! rate, u64 epoch, then the length-prefixed burn record bytes of the model
//! and the optimizer.
//!
//! The manager only moves bytes; restoring records into live model and
//! optimizer objects is the orchestrator's job.

use burn::module::AutodiffModule;
use burn::optim::Optimizer;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder, RecorderError};
use burn::tensor::backend::AutodiffBackend;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CHECKPOINT_MAGIC: &[u8; 4] = b"TSCK";
pub const CHECKPOINT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint not found at {path}")]
    NotFound { path: PathBuf },
    #[error("corrupt checkpoint at {path}: {msg}")]
    Corrupt { path: PathBuf, msg: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("record serialization failed for {path}: {source}")]
    Record {
        path: PathBuf,
        #[source]
        source: RecorderError,
    },
}

/// Tag distinguishing mid-epoch checkpoints from the epoch-end one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationLabel {
    Iter(usize),
    End,
}

impl fmt::Display for IterationLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationLabel::Iter(i) => write!(f, "{i}"),
            IterationLabel::End => write!(f, "end"),
        }
    }
}

/// Deserialized checkpoint contents. `model_bytes` and `optimizer_bytes`
/// are burn `BinBytesRecorder` payloads for the caller to decode.
#[derive(Debug, Clone)]
pub struct CheckpointRecord {
    pub lr: f64,
    pub epoch: usize,
    pub model_bytes: Vec<u8>,
    pub optimizer_bytes: Vec<u8>,
}

pub struct CheckpointManager {
    dir: PathBuf,
    backbone: String,
}

impl CheckpointManager {
    pub fn new(save_dir: &Path, exp_name: &str, backbone: &str) -> Self {
        Self {
            dir: save_dir.join(exp_name),
            backbone: backbone.to_string(),
        }
    }

    /// Deterministic per-(backbone, epoch, label) file path.
    pub fn checkpoint_path(&self, epoch: usize, label: IterationLabel) -> PathBuf {
        self.dir
            .join(format!("textsnake_{}_{}_{}.pth", self.backbone, epoch, label))
    }

    /// Snapshot model and optimizer state. Writes to a temporary sibling and
    /// renames, so a crash mid-write cannot leave a half-written `.pth`.
    pub fn save<B, M, O>(
        &self,
        model: &M,
        optim: &O,
        epoch: usize,
        lr: f64,
        label: IterationLabel,
    ) -> Result<PathBuf, CheckpointError>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B> + Clone,
        O: Optimizer<M, B>,
    {
        let path = self.checkpoint_path(epoch, label);
        fs::create_dir_all(&self.dir).map_err(|e| CheckpointError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let model_bytes =
            recorder
                .record(model.clone().into_record(), ())
                .map_err(|e| CheckpointError::Record {
                    path: path.clone(),
                    source: e,
                })?;
        let optimizer_bytes =
            recorder
                .record(optim.to_record(), ())
                .map_err(|e| CheckpointError::Record {
                    path: path.clone(),
                    source: e,
                })?;

        let mut blob =
            Vec::with_capacity(4 + 4 + 8 + 8 + 8 + model_bytes.len() + 8 + optimizer_bytes.len());
        blob.extend_from_slice(CHECKPOINT_MAGIC);
        blob.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
        blob.extend_from_slice(&lr.to_le_bytes());
        blob.extend_from_slice(&(epoch as u64).to_le_bytes());
        blob.extend_from_slice(&(model_bytes.len() as u64).to_le_bytes());
        blob.extend_from_slice(&model_bytes);
        blob.extend_from_slice(&(optimizer_bytes.len() as u64).to_le_bytes());
        blob.extend_from_slice(&optimizer_bytes);

        let tmp = path.with_extension("pth.tmp");
        fs::write(&tmp, &blob).map_err(|e| CheckpointError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &path).map_err(|e| CheckpointError::Io {
            path: path.clone(),
            source: e,
        })?;
        Ok(path)
    }

    /// Parse a checkpoint file back into its record.
    pub fn load(path: &Path) -> Result<CheckpointRecord, CheckpointError> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => {
                return Err(CheckpointError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };
        let corrupt = |msg: String| CheckpointError::Corrupt {
            path: path.to_path_buf(),
            msg,
        };

        let mut cursor = Cursor::new(&raw);
        let magic = cursor.take(4).map_err(|m| corrupt(m))?;
        if magic != CHECKPOINT_MAGIC {
            return Err(corrupt("bad magic".to_string()));
        }
        let version = cursor.u32().map_err(|m| corrupt(m))?;
        if version != CHECKPOINT_VERSION {
            return Err(corrupt(format!("unsupported version {version}")));
        }
        let lr = cursor.f64().map_err(|m| corrupt(m))?;
        let epoch = cursor.u64().map_err(|m| corrupt(m))? as usize;
        let model_bytes = cursor.length_prefixed().map_err(|m| corrupt(m))?;
        let optimizer_bytes = cursor.length_prefixed().map_err(|m| corrupt(m))?;
        if !cursor.is_empty() {
            return Err(corrupt("trailing bytes after optimizer record".to_string()));
        }

        Ok(CheckpointRecord {
            lr,
            epoch,
            model_bytes,
            optimizer_bytes,
        })
    }
}

struct Cursor<'a> {
    raw: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(raw: &'a [u8]) -> Self {
        Self { raw, offset: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], String> {
        if self.offset + len > self.raw.len() {
            return Err(format!(
                "truncated at byte {} (wanted {len} more)",
                self.offset
            ));
        }
        let slice = &self.raw[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, String> {
        let mut arr = [0u8; 4];
        arr.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(arr))
    }

    fn u64(&mut self) -> Result<u64, String> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(arr))
    }

    fn f64(&mut self) -> Result<f64, String> {
        let mut arr = [0u8; 8];
        arr.copy_from_slice(self.take(8)?);
        Ok(f64::from_le_bytes(arr))
    }

    fn length_prefixed(&mut self) -> Result<Vec<u8>, String> {
        let len = self.u64()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn is_empty(&self) -> bool {
        self.offset == self.raw.len()
    }
}

// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores backbone weights using Burn's CompactRecorder.
//
// What gets saved:
//   1. Model weights (.mpk.gz file) — every epoch
//   2. latest_epoch.json            — which epoch was last saved
//   3. best_epoch.json              — epoch with the lowest val loss
//   4. train_config.json            — data layout + architecture
//
// The config is needed to rebuild the backbone (and the sampler
// layout: cameras, chunk size, normalization bounds) before the
// weights can be loaded into it.
//
// File naming convention:
//   checkpoints/
//     model_epoch_1.mpk.gz
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json
//     best_epoch.json
//     train_config.json
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;

const LATEST_EPOCH_FILE: &str = "latest_epoch.json";
const BEST_EPOCH_FILE:   &str = "best_epoch.json";
const CONFIG_FILE:       &str = "train_config.json";

/// Manages saving and loading of checkpoints in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn weights_path(&self, epoch: usize) -> PathBuf {
        // The recorder appends the extension
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Writes {dir}/model_epoch_{epoch}.mpk.gz and moves the latest pointer.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.weights_path(epoch);
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_epoch(LATEST_EPOCH_FILE, epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Records `epoch` as the best one seen so far.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        self.write_epoch(BEST_EPOCH_FILE, epoch)
    }

    /// Loads the weights of `epoch`, or of the latest epoch when None.
    ///
    /// `model` must have the architecture the checkpoint was saved with.
    pub fn load_model<B: Backend, M: Module<B>>(
        &self,
        model:  M,
        device: &B::Device,
        epoch:  Option<usize>,
    ) -> Result<M> {
        let epoch = match epoch {
            Some(e) => e,
            None    => self.latest_epoch()?,
        };
        let path = self.weights_path(epoch);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?",
                    path.display())
            })?;
        Ok(model.load_record(record))
    }

    /// Must be called before training starts.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Make sure you have run 'train' before 'predict'.",
                    path.display()
                )
            })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_epoch(LATEST_EPOCH_FILE)
            .context("Cannot find 'latest_epoch.json'. Have you run 'train' first?")
    }

    /// None until a validation pass has improved on something.
    pub fn best_epoch(&self) -> Option<usize> {
        self.read_epoch(BEST_EPOCH_FILE).ok()
    }

    fn write_epoch(&self, file: &str, epoch: usize) -> Result<()> {
        fs::write(self.dir.join(file), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {file}"))
    }

    fn read_epoch(&self, file: &str) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(file))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = NdArray;

    #[test]
    fn test_weights_round_trip_and_epoch_pointers() {
        let tmp    = tempfile::tempdir().unwrap();
        let ckpt   = CheckpointManager::new(tmp.path().join("ckpt")).unwrap();
        let device = Default::default();

        let saved: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);
        ckpt.save_model(&saved, 1).unwrap();
        ckpt.save_model(&saved, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
        assert_eq!(ckpt.best_epoch(), None);

        ckpt.mark_best(1).unwrap();
        assert_eq!(ckpt.best_epoch(), Some(1));

        let fresh: Linear<TestBackend> = LinearConfig::new(3, 2).init(&device);
        let loaded = ckpt.load_model(fresh, &device, None).unwrap();
        let got    = loaded.weight.val().into_data().to_vec::<f32>().unwrap();
        let want   = saved.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(got.len(), want.len());
        // CompactRecorder stores half precision
        for (g, w) in got.iter().zip(&want) {
            assert!((g - w).abs() < 1e-3, "loaded {g} vs saved {w}");
        }
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let tmp  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path()).unwrap();
        assert!(ckpt.latest_epoch().is_err());
        assert!(ckpt.load_config().is_err());
    }
}

// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Predicts the action chunk for one recorded observation:
//   1. Load train_config.json and the chosen checkpoint
//   2. Sample the episode at the requested timestep with the
//      same layout and normalizer the model was trained with
//   3. Run the policy in inference mode
//   4. Map joint columns back to raw units when the training
//      data was transformed (legacy handling only clamps, so
//      its predictions are already in raw units)

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    loader::JsonEpisodeStore,
    normalizer::{BoundsHandling, Normalizer},
    sampler::TrajectorySampler,
    splitter::EpisodeRef,
};
use crate::domain::meta::EpisodeMeta;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::inferencer::Inferencer;

/// Which saved weights to predict with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointChoice {
    Latest,
    /// Falls back to the latest when no best epoch was recorded
    Best,
    Epoch(usize),
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub meta:     EpisodeMeta,
    pub timestep: usize,
    /// One row per step in training units: joints, then gripper
    pub actions: Vec<Vec<f32>>,
    /// Same rows with joints mapped back through the normalizer
    pub raw: Option<Vec<Vec<f32>>>,
}

pub struct PredictUseCase {
    config:     TrainConfig,
    normalizer: Option<Normalizer>,
    inferencer: Inferencer,
}

impl PredictUseCase {
    pub fn new(checkpoint_dir: &str, choice: CheckpointChoice) -> Result<Self> {
        let ckpt   = CheckpointManager::new(checkpoint_dir)?;
        let config = ckpt.load_config()?;

        let epoch = match choice {
            CheckpointChoice::Latest   => None,
            CheckpointChoice::Epoch(e) => Some(e),
            CheckpointChoice::Best     => {
                let best = ckpt.best_epoch();
                if best.is_none() {
                    tracing::warn!("No best epoch recorded; using the latest checkpoint");
                }
                best
            }
        };

        let normalizer = config.normalizer().context("Saved normalization bounds are invalid")?;
        let inferencer = Inferencer::from_checkpoint(&ckpt, &config, epoch)?;
        Ok(Self { config, normalizer, inferencer })
    }

    /// Predict from the observation at `timestep` of `episode`.
    pub fn predict(&self, episode: &Path, timestep: usize) -> Result<Prediction> {
        let sampler = TrajectorySampler::new(
            Arc::new(JsonEpisodeStore::new()),
            vec![EpisodeRef::new(episode.to_path_buf())],
            self.config.sampler_config(),
            self.normalizer.clone(),
        )?;
        let example = sampler
            .sample_at(0, timestep)
            .with_context(|| format!("Cannot build observation from '{}'", episode.display()))?;
        let meta = example.meta.clone();

        let actions = self.inferencer.predict(example)?;
        let raw = match &self.normalizer {
            Some(n) if n.handling() == BoundsHandling::ClampThenTransform => {
                Some(denormalize_rows(n, &actions, self.config.joint_dim)?)
            }
            _ => None,
        };

        Ok(Prediction { meta, timestep, actions, raw })
    }
}

/// Inverse-transform the joint columns of each row; the gripper
/// column is never normalized and passes through.
pub fn denormalize_rows(n: &Normalizer, rows: &[Vec<f32>], joint_dim: usize) -> Result<Vec<Vec<f32>>> {
    rows.iter()
        .map(|row| {
            let (joints, rest) = row.split_at(joint_dim.min(row.len()));
            let mut out = n.inverse_transform(joints)?;
            out.extend_from_slice(rest);
            Ok(out)
        })
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denormalize_keeps_gripper_column() {
        let n    = Normalizer::new(&[(0.0, 10.0), (-2.0, 2.0)]).unwrap();
        let rows = vec![vec![-1.0, 1.0, 0.7], vec![0.0, 0.0, 0.2]];
        let raw  = denormalize_rows(&n, &rows, 2).unwrap();
        assert_eq!(raw[0], vec![0.0, 2.0, 0.7]);
        assert_eq!(raw[1], vec![5.0, 0.0, 0.2]);
    }

    #[test]
    fn test_missing_checkpoint_dir_has_no_config() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nothing_here");
        let err = PredictUseCase::new(dir.to_str().unwrap(), CheckpointChoice::Latest)
            .err()
            .unwrap();
        assert!(err.to_string().contains("train_config.json"));
    }
}

// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Resolve the task and split its files   (Layer 4 - data)
//   Step 2: Build the normalizer                   (Layer 4 - data)
//   Step 3: Build one sampler per split            (Layer 4 - data)
//   Step 4: Wrap samplers as Burn datasets         (Layer 4 - data)
//   Step 5: Save config                            (Layer 6 - infra)
//   Step 6: Run training loop                      (Layer 5 - ml)
//
// Every random choice (split shuffle, chunk starts, loader
// shuffle) is derived from the single `seed` in TrainConfig.
//
// Reference: Burn Book §5 (Training)

use std::sync::Arc;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{
    dataset::TrajectoryDataset,
    loader::JsonEpisodeStore,
    normalizer::{BoundsHandling, Normalizer},
    sampler::{SamplerConfig, StartDistribution, TrajectorySampler},
    splitter::{split_task_files, SplitConfig, TaskRegistry, TaskSplit},
};
use crate::domain::error::NormalizerError;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{policy::ActPolicy, trainer::run_training};

/// Which backbone and loss to train.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyClass {
    /// CVAE transformer over action chunks
    #[default]
    Act,
    /// Single-step CNN + MLP baseline
    CnnMlp,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run. Serialisable so it can be saved
// next to the checkpoints and reloaded to rebuild the sampler layout
// and the backbone for prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    // data
    pub dataset_dir:        String,
    pub checkpoint_dir:     String,
    pub task_name:          String,
    pub required_keys:      Vec<String>,
    pub camera_names:       Vec<String>,
    pub image_height:       usize,
    pub image_width:        usize,
    pub chunk_size:         usize,
    pub joint_dim:          usize,
    pub norm_bounds:        Option<Vec<(f32, f32)>>,
    pub bounds_handling:    BoundsHandling,
    pub add_task_ind:       bool,
    pub start_distribution: StartDistribution,

    // split and optimisation
    pub batch_size:   usize,
    pub train_split:  f64,
    pub few_shot:     Option<usize>,
    pub epochs:       usize,
    pub lr:           f64,
    pub weight_decay: f64,
    pub seed:         u64,

    // loss weights
    pub kl_weight:  f64,
    pub ent_weight: Option<f64>,

    // model
    pub policy_class: PolicyClass,
    pub d_model:      usize,
    pub num_heads:    usize,
    pub num_layers:   usize,
    pub d_ff:         usize,
    pub latent_dim:   usize,
    pub dropout:      f64,
}

pub const DEFAULT_CAMERAS: [&str; 4] =
    ["front_rgb", "left_shoulder_rgb", "right_shoulder_rgb", "wrist_rgb"];

impl Default for TrainConfig {
    fn default() -> Self {
        let camera_names: Vec<String> = DEFAULT_CAMERAS.iter().map(|c| c.to_string()).collect();
        let mut required_keys = camera_names.clone();
        required_keys.extend(["joint_positions".to_string(), "gripper_open".to_string()]);

        Self {
            dataset_dir:        "data/episodes".to_string(),
            checkpoint_dir:     "checkpoints".to_string(),
            task_name:          "all".to_string(),
            required_keys,
            camera_names,
            image_height:       128,
            image_width:        128,
            chunk_size:         100,
            joint_dim:          7,
            norm_bounds:        None,
            bounds_handling:    BoundsHandling::default(),
            add_task_ind:       true,
            start_distribution: StartDistribution::default(),

            batch_size:   8,
            train_split:  0.8,
            few_shot:     None,
            epochs:       100,
            lr:           1e-5,
            weight_decay: 1e-4,
            seed:         0,

            kl_weight:  10.0,
            ent_weight: None,

            policy_class: PolicyClass::Act,
            d_model:      512,
            num_heads:    8,
            num_layers:   4,
            d_ff:         3200,
            latent_dim:   32,
            dropout:      0.1,
        }
    }
}

impl TrainConfig {
    pub fn sampler_config(&self) -> SamplerConfig {
        SamplerConfig {
            required_keys:      self.required_keys.clone(),
            camera_names:       self.camera_names.clone(),
            chunk_size:         self.chunk_size,
            joint_dim:          self.joint_dim,
            image_height:       self.image_height,
            image_width:        self.image_width,
            add_task_ind:       self.add_task_ind,
            start_distribution: self.start_distribution,
        }
    }

    pub fn split_config(&self) -> SplitConfig {
        SplitConfig { train_fraction: self.train_split, few_shot: self.few_shot }
    }

    /// None when no bounds were configured (joints pass through raw).
    pub fn normalizer(&self) -> Result<Option<Normalizer>, NormalizerError> {
        self.norm_bounds
            .as_deref()
            .map(|b| Normalizer::new(b).map(|n| n.with_handling(self.bounds_handling)))
            .transpose()
    }

    pub fn act_policy(&self) -> ActPolicy {
        ActPolicy::new(self.kl_weight, self.ent_weight, self.few_shot.is_some())
    }

    pub fn action_dim(&self) -> usize {
        self.joint_dim + 1
    }
}

/// Resolve the task name and split its files; nothing is loaded yet.
pub fn plan_split(cfg: &TrainConfig) -> Result<TaskSplit> {
    let registry = TaskRegistry::builtin(cfg.few_shot.is_some())?;
    let mut rng  = StdRng::seed_from_u64(cfg.seed);
    let split = split_task_files(
        cfg.dataset_dir.as_ref(),
        &cfg.task_name,
        &registry,
        &cfg.split_config(),
        &mut rng,
    )?;
    Ok(split)
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Task filter + split ───────────────────────────────────────
        // Unknown task names fail here, before any episode is read
        tracing::info!("Splitting task '{}' in '{}'", cfg.task_name, cfg.dataset_dir);
        let split = plan_split(cfg)?;
        tracing::info!("Train composition: {:?}", TaskSplit::composition(&split.train));
        if split.train.is_empty() {
            anyhow::bail!("Task '{}' left no episodes for training", cfg.task_name);
        }

        // ── Step 2: Normalizer ────────────────────────────────────────────────
        let normalizer = cfg.normalizer().context("Invalid normalization bounds")?;
        if normalizer.is_none() {
            tracing::warn!("No normalization bounds configured; joints are used raw");
        }

        // ── Step 3: Samplers ──────────────────────────────────────────────────
        // Both splits read through the same store and layout
        let store = Arc::new(JsonEpisodeStore::new());
        let train_sampler = TrajectorySampler::new(
            store.clone(), split.train, cfg.sampler_config(), normalizer.clone(),
        )?;
        let val_sampler = TrajectorySampler::new(
            store, split.validation, cfg.sampler_config(), normalizer,
        )?;
        // Without validation batches the loss is NaN and no best epoch is ever kept
        if val_sampler.is_empty() {
            anyhow::bail!(
                "Task '{}' left no episodes for validation; lower --few-shot or --train-split",
                cfg.task_name
            );
        }

        // ── Step 4: Burn datasets ─────────────────────────────────────────────
        // Distinct streams so train and validation starts are independent
        let train_dataset = TrajectoryDataset::new(train_sampler, cfg.seed.wrapping_add(1));
        let val_dataset   = TrajectoryDataset::new(val_sampler, cfg.seed.wrapping_add(2));

        // ── Step 5: Save config for prediction ────────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir)?;
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(cfg, train_dataset, val_dataset, ckpt_manager, metrics)?;

        Ok(())
    }
}

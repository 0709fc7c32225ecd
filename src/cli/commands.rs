// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `train`, `predict` and `split` and
// their flags. Defaults mirror TrainConfig::default().
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};

use crate::application::{
    predict_use_case::CheckpointChoice,
    train_use_case::{PolicyClass, TrainConfig},
};
use crate::data::{normalizer::BoundsHandling, sampler::StartDistribution};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a policy on the episodes of one task
    Train(TrainArgs),

    /// Predict an action chunk with a trained checkpoint
    Predict(PredictArgs),

    /// Print the train / validation files a task and seed would use
    Split(SplitArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum PolicyArg {
    Act,
    Cnnmlp,
}

impl From<PolicyArg> for PolicyClass {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Act    => PolicyClass::Act,
            PolicyArg::Cnnmlp => PolicyClass::CnnMlp,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum BoundsArg {
    /// Clamp only; the in-bounds transform is discarded
    Legacy,
    /// Clamp, then scale to [-1, 1]
    ClampThenTransform,
}

impl From<BoundsArg> for BoundsHandling {
    fn from(b: BoundsArg) -> Self {
        match b {
            BoundsArg::Legacy             => BoundsHandling::Legacy,
            BoundsArg::ClampThenTransform => BoundsHandling::ClampThenTransform,
        }
    }
}

/// Flags shared by `train` and `split`.
#[derive(Args, Debug, Clone)]
pub struct TaskArgs {
    /// Directory holding one .json file per episode
    #[arg(long, default_value = "data/episodes")]
    pub dataset_dir: String,

    /// Task name, e.g. box_open, bo_bc_tc or all (a sim_ prefix is ignored)
    #[arg(long, default_value = "all")]
    pub task_name: String,

    /// Fraction of matched episodes used for training
    #[arg(long, default_value_t = 0.8)]
    pub train_split: f64,

    /// Train on exactly this many episodes and validate on the next 10
    #[arg(long)]
    pub few_shot: Option<usize>,

    /// Seeds the split, the chunk starts and the loader shuffle
    #[arg(long, default_value_t = 0)]
    pub seed: u64,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[command(flatten)]
    pub task: TaskArgs,

    /// Directory to save checkpoints, config and metrics
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    #[arg(long, value_enum, default_value_t = PolicyArg::Act)]
    pub policy_class: PolicyArg,

    /// Stacking order of the camera streams
    #[arg(long, value_delimiter = ',',
          default_value = "front_rgb,left_shoulder_rgb,right_shoulder_rgb,wrist_rgb")]
    pub camera_names: Vec<String>,

    /// Non-camera streams every episode must carry
    #[arg(long, value_delimiter = ',', default_value = "joint_positions,gripper_open")]
    pub state_keys: Vec<String>,

    #[arg(long, default_value_t = 128)]
    pub image_height: usize,

    #[arg(long, default_value_t = 128)]
    pub image_width: usize,

    /// Timesteps per action chunk; also the number of decoder queries
    #[arg(long, default_value_t = 100)]
    pub chunk_size: usize,

    #[arg(long, default_value_t = 7)]
    pub joint_dim: usize,

    /// JSON file with one [min, max] pair per joint
    #[arg(long)]
    pub norm_bounds: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = BoundsArg::Legacy)]
    pub bounds_handling: BoundsArg,

    /// Leave skill indicators at zero
    #[arg(long)]
    pub no_task_ind: bool,

    /// Draw chunk starts from Beta(a, a) instead of uniform
    #[arg(long)]
    pub start_beta: Option<f64>,

    #[arg(long, default_value_t = 8)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-5)]
    pub lr: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub weight_decay: f64,

    /// Weight of the KL term
    #[arg(long, default_value_t = 10.0)]
    pub kl_weight: f64,

    /// Weight of the zeroed-skill L1 term (0.01 when unset)
    #[arg(long)]
    pub ent_weight: Option<f64>,

    #[arg(long, default_value_t = 512)]
    pub d_model: usize,

    /// d_model must be divisible by num_heads
    #[arg(long, default_value_t = 8)]
    pub num_heads: usize,

    /// Layers in each of the encoder and the decoder
    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    #[arg(long, default_value_t = 3200)]
    pub d_ff: usize,

    #[arg(long, default_value_t = 32)]
    pub latent_dim: usize,

    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

fn read_bounds(path: &Path) -> Result<Vec<(f32, f32)>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read bounds file '{}'", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Bounds file '{}' must hold [[min, max], ...]", path.display()))
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// Fallible because the bounds file is read here.
impl TryFrom<TrainArgs> for TrainConfig {
    type Error = anyhow::Error;

    fn try_from(a: TrainArgs) -> Result<Self> {
        let norm_bounds = a.norm_bounds.as_deref().map(read_bounds).transpose()?;
        let start_distribution = match a.start_beta {
            Some(ab) => StartDistribution::Beta { alpha: ab, beta: ab },
            None     => StartDistribution::Uniform,
        };
        let mut required_keys = a.camera_names.clone();
        required_keys.extend(a.state_keys);

        Ok(TrainConfig {
            dataset_dir:        a.task.dataset_dir,
            checkpoint_dir:     a.checkpoint_dir,
            task_name:          a.task.task_name,
            required_keys,
            camera_names:       a.camera_names,
            image_height:       a.image_height,
            image_width:        a.image_width,
            chunk_size:         a.chunk_size,
            joint_dim:          a.joint_dim,
            norm_bounds,
            bounds_handling:    a.bounds_handling.into(),
            add_task_ind:       !a.no_task_ind,
            start_distribution,

            batch_size:   a.batch_size,
            train_split:  a.task.train_split,
            few_shot:     a.task.few_shot,
            epochs:       a.epochs,
            lr:           a.lr,
            weight_decay: a.weight_decay,
            seed:         a.task.seed,

            kl_weight:  a.kl_weight,
            ent_weight: a.ent_weight,

            policy_class: a.policy_class.into(),
            d_model:      a.d_model,
            num_heads:    a.num_heads,
            num_layers:   a.num_layers,
            d_ff:         a.d_ff,
            latent_dim:   a.latent_dim,
            dropout:      a.dropout,
        })
    }
}

/// The split only needs the task fields.
impl From<TaskArgs> for TrainConfig {
    fn from(a: TaskArgs) -> Self {
        TrainConfig {
            dataset_dir: a.dataset_dir,
            task_name:   a.task_name,
            train_split: a.train_split,
            few_shot:    a.few_shot,
            seed:        a.seed,
            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Episode file to read the observation from
    #[arg(long)]
    pub episode: PathBuf,

    /// Timestep of the observation
    #[arg(long, default_value_t = 0)]
    pub timestep: usize,

    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Use the weights of this epoch
    #[arg(long, conflicts_with = "best")]
    pub epoch: Option<usize>,

    /// Use the epoch with the lowest validation loss
    #[arg(long)]
    pub best: bool,
}

impl PredictArgs {
    pub fn checkpoint_choice(&self) -> CheckpointChoice {
        match (self.epoch, self.best) {
            (Some(e), _)  => CheckpointChoice::Epoch(e),
            (None, true)  => CheckpointChoice::Best,
            (None, false) => CheckpointChoice::Latest,
        }
    }
}

#[derive(Args, Debug)]
pub struct SplitArgs {
    #[command(flatten)]
    pub task: TaskArgs,
}

// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds the trained backbone from train_config.json, loads
// its weights and predicts an action chunk for one sampled
// observation. ACT decodes with the latent at the prior mean;
// CNNMLP returns a chunk of length 1.

use anyhow::{anyhow, bail, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::application::train_use_case::{PolicyClass, TrainConfig};
use crate::data::batcher::TrajectoryBatcher;
use crate::domain::example::TrainingExample;
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::model::{ActBackbone, CnnMlpBackbone};
use crate::ml::policy::{ActPolicy, CnnMlpPolicy, PolicyInput, PolicyOutput};
use crate::ml::trainer::{act_backbone_config, cnnmlp_backbone_config};

type InferBackend = burn::backend::Wgpu;

enum LoadedBackbone {
    Act(ActBackbone<InferBackend>, ActPolicy),
    CnnMlp(CnnMlpBackbone<InferBackend>),
}

pub struct Inferencer {
    model:      LoadedBackbone,
    batcher:    TrajectoryBatcher<InferBackend>,
    action_dim: usize,
}

impl Inferencer {
    /// Loads `epoch`, or the latest checkpoint when None.
    pub fn from_checkpoint(
        ckpt_manager: &CheckpointManager,
        cfg:          &TrainConfig,
        epoch:        Option<usize>,
    ) -> Result<Self> {
        let device = burn::backend::wgpu::WgpuDevice::default();

        let model = match cfg.policy_class {
            PolicyClass::Act => {
                let mut model_cfg = act_backbone_config(cfg);
                model_cfg.dropout = 0.0;
                let model: ActBackbone<InferBackend> = model_cfg.init(&device);
                LoadedBackbone::Act(ckpt_manager.load_model(model, &device, epoch)?, cfg.act_policy())
            }
            PolicyClass::CnnMlp => {
                let mut model_cfg = cnnmlp_backbone_config(cfg);
                model_cfg.dropout = 0.0;
                let model: CnnMlpBackbone<InferBackend> = model_cfg.init(&device);
                LoadedBackbone::CnnMlp(ckpt_manager.load_model(model, &device, epoch)?)
            }
        };
        tracing::info!("{:?} backbone loaded from checkpoint", cfg.policy_class);

        Ok(Self {
            model,
            batcher:    TrajectoryBatcher::new(device, &cfg.sampler_config()),
            action_dim: cfg.action_dim(),
        })
    }

    /// Predicted chunk as rows of [joint_0 .. joint_n, gripper].
    pub fn predict(&self, example: TrainingExample) -> Result<Vec<Vec<f32>>> {
        let batch = self.batcher.batch(vec![example]);
        let input = PolicyInput::observation_only(batch.qpos, batch.images, batch.skill_ind, batch.env_ind);

        // Without ground-truth actions both policies take the inference path
        let actions = match &self.model {
            LoadedBackbone::Act(model, policy) => match policy.forward(model, input)? {
                PolicyOutput::Actions(a) => a,
                PolicyOutput::Losses(_)  => bail!("ACT policy returned losses at inference"),
            },
            LoadedBackbone::CnnMlp(model) => match CnnMlpPolicy.forward(model, input)? {
                PolicyOutput::Actions(a) => a,
                PolicyOutput::Losses(_)  => bail!("CNNMLP policy returned losses at inference"),
            },
        };

        let flat = actions
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read predicted actions: {e:?}"))?;

        tracing::debug!("Predicted {} steps", flat.len() / self.action_dim);
        Ok(flat.chunks(self.action_dim).map(|row| row.to_vec()).collect())
    }
}

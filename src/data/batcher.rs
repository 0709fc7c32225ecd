// ============================================================
// Layer 4 — Trajectory Batcher
// ============================================================
// Implements Burn's Batcher trait to collate a Vec of
// TrainingExamples into one TrajectoryBatch of tensors.
//
// Shapes (N = batch size, Q = chunk size, A = joint_dim + 1):
//   images    [N, cams, 3, H, W]
//   qpos      [N, A]           first action of each chunk
//   actions   [N, Q, A]        joint action ‖ gripper action
//   is_pad    [N, Q]           Bool, true = padding
//   skill_ind [N, 2]
//   env_ind   [N, 3]
//
// Every example already has the configured shape (the sampler
// enforces it), so collation is just flattening and reshaping.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::{Bool, TensorData},
};

use crate::data::sampler::SamplerConfig;
use crate::domain::example::TrainingExample;
use crate::domain::meta::{ENV_CLASSES, SKILL_CLASSES};

// ─── TrajectoryBatch ──────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TrajectoryBatch<B: Backend> {
    pub images:    Tensor<B, 5>,
    pub qpos:      Tensor<B, 2>,
    pub actions:   Tensor<B, 3>,
    pub is_pad:    Tensor<B, 2, Bool>,
    pub skill_ind: Tensor<B, 2>,
    pub env_ind:   Tensor<B, 2>,
}

// ─── TrajectoryBatcher ────────────────────────────────────────────────────────
/// Holds the target device plus the layout needed to reshape.
#[derive(Clone, Debug)]
pub struct TrajectoryBatcher<B: Backend> {
    pub device: B::Device,
    cameras:    usize,
    height:     usize,
    width:      usize,
    chunk_size: usize,
    joint_dim:  usize,
}

impl<B: Backend> TrajectoryBatcher<B> {
    pub fn new(device: B::Device, cfg: &SamplerConfig) -> Self {
        Self {
            device,
            cameras:    cfg.camera_names.len(),
            height:     cfg.image_height,
            width:      cfg.image_width,
            chunk_size: cfg.chunk_size,
            joint_dim:  cfg.joint_dim,
        }
    }

    fn action_dim(&self) -> usize {
        self.joint_dim + 1
    }
}

impl<B: Backend> Batcher<TrainingExample, TrajectoryBatch<B>> for TrajectoryBatcher<B> {
    fn batch(&self, items: Vec<TrainingExample>) -> TrajectoryBatch<B> {
        let n   = items.len();
        let q   = self.chunk_size;
        let a   = self.action_dim();
        let dev = &self.device;

        // ── Actions: interleave joint rows with the gripper value ─────────────
        let actions_flat: Vec<f32> = items
            .iter()
            .flat_map(|ex| (0..q).flat_map(move |t| ex.action_at(t, self.joint_dim)))
            .collect();

        // qpos is the first row of every chunk
        let qpos_flat: Vec<f32> = items
            .iter()
            .flat_map(|ex| ex.action_at(0, self.joint_dim))
            .collect();

        let images_flat: Vec<f32> = items.iter().flat_map(|ex| ex.images.iter().copied()).collect();
        let pad_flat:    Vec<bool> = items.iter().flat_map(|ex| ex.is_pad.iter().copied()).collect();
        let skill_flat:  Vec<f32> = items.iter().flat_map(|ex| ex.skill_ind).collect();
        let env_flat:    Vec<f32> = items.iter().flat_map(|ex| ex.env_ind).collect();

        TrajectoryBatch {
            images: Tensor::from_data(
                TensorData::new(images_flat, [n, self.cameras, 3, self.height, self.width]),
                dev,
            ),
            qpos:      Tensor::from_data(TensorData::new(qpos_flat, [n, a]), dev),
            actions:   Tensor::from_data(TensorData::new(actions_flat, [n, q, a]), dev),
            is_pad:    Tensor::from_data(TensorData::new(pad_flat, [n, q]), dev),
            skill_ind: Tensor::from_data(TensorData::new(skill_flat, [n, SKILL_CLASSES]), dev),
            env_ind:   Tensor::from_data(TensorData::new(env_flat, [n, ENV_CLASSES]), dev),
        }
    }
}

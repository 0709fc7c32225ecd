// ============================================================
// Layer 5 — Backbone Contracts
// ============================================================
// The policies in policy.rs never see a concrete network. They
// talk to these traits, so the loss and mode logic can be tested
// against small stub backbones on the NdArray backend.
//
//   ChunkBackbone  observation + indicators → action chunk
//                  (training also encodes the true chunk into
//                   a latent and returns its mean / log-variance)
//
//   StepBackbone   observation → single next action
//
// Reference: Zhao et al. (2023) Learning Fine-Grained Bimanual
//            Manipulation with Low-Cost Hardware (ACT)

use burn::{prelude::*, tensor::Bool};

/// What the robot sees at the chunk start.
#[derive(Debug, Clone)]
pub struct Observation<B: Backend> {
    /// [batch, action_dim]
    pub qpos:   Tensor<B, 2>,
    /// [batch, cameras, 3, H, W], already ImageNet-normalized
    pub images: Tensor<B, 5>,
}

/// Diagonal Gaussian posterior, both [batch, latent_dim]
#[derive(Debug, Clone)]
pub struct LatentParams<B: Backend> {
    pub mu:     Tensor<B, 2>,
    pub logvar: Tensor<B, 2>,
}

#[derive(Debug, Clone)]
pub struct ChunkPrediction<B: Backend> {
    /// [batch, num_queries, action_dim]
    pub actions:    Tensor<B, 3>,
    /// [batch, num_queries]
    pub pad_logits: Tensor<B, 2>,
}

pub trait ChunkBackbone<B: Backend> {
    /// Longest chunk the decoder can emit
    fn num_queries(&self) -> usize;

    /// `actions` and `is_pad` are already truncated to `num_queries`.
    fn forward_train(
        &self,
        obs:       Observation<B>,
        actions:   Tensor<B, 3>,
        is_pad:    Tensor<B, 2, Bool>,
        skill_ind: Tensor<B, 2>,
        env_ind:   Tensor<B, 2>,
    ) -> (ChunkPrediction<B>, LatentParams<B>);

    /// Decodes with the latent taken from the prior.
    fn forward_infer(
        &self,
        obs:       Observation<B>,
        skill_ind: Tensor<B, 2>,
        env_ind:   Tensor<B, 2>,
    ) -> ChunkPrediction<B>;
}

pub trait StepBackbone<B: Backend> {
    /// [batch, action_dim]
    fn forward(&self, obs: Observation<B>) -> Tensor<B, 2>;
}

// ============================================================
// Layer 5 — Backbone Networks
// ============================================================
// Two concrete backbones behind the traits in backbone.rs:
//
//   ActBackbone    CVAE transformer
//     encoder  [CLS, qpos, a_1 .. a_k] + pos  → (mu, logvar)
//              padded action tokens are masked out of attention
//     decoder  [z, qpos, skill, env, cam_1 .. cam_n,
//               query_1 .. query_Q] + pos       → Q actions,
//                                                Q pad logits
//
//   CnnMlpBackbone  camera features ‖ qpos → MLP → one action
//
// Each camera frame goes through the same small CNN
// (conv → relu → conv → relu → global avg pool → linear),
// producing one d_model token per camera.
//
// Reference: Burn Book §3 (Building Blocks)
//            Vaswani et al. (2017) Attention Is All You Need
//            Kingma & Welling (2014) Auto-Encoding Variational Bayes

use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
        PaddingConfig2d,
    },
    optim::{AdamWConfig, Optimizer},
    prelude::*,
    tensor::{activation::relu, backend::AutodiffBackend, Bool, Distribution, TensorData},
};

use crate::data::sampler::IMAGE_CHANNELS;
use crate::domain::meta::{ENV_CLASSES, SKILL_CLASSES};
use crate::ml::backbone::{ChunkBackbone, ChunkPrediction, LatentParams, Observation, StepBackbone};

const CONV1_CHANNELS: usize = 16;
const CONV2_CHANNELS: usize = 32;

/// Decoder tokens ahead of the camera tokens: latent, qpos, skill, env
const DECODER_PREFIX_TOKENS: usize = 4;

// ─── Shared blocks ────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    fn new(d_model: usize, num_heads: usize, d_ff: usize, dropout: f64, device: &B::Device) -> Self {
        Self {
            self_attn: MultiHeadAttentionConfig::new(d_model, num_heads)
                .with_dropout(dropout)
                .init(device),
            ffn_linear1: LinearConfig::new(d_model, d_ff).init(device),
            ffn_linear2: LinearConfig::new(d_ff, d_model).init(device),
            norm1:       LayerNormConfig::new(d_model).init(device),
            norm2:       LayerNormConfig::new(d_model).init(device),
            dropout:     DropoutConfig::new(dropout).init(),
        }
    }

    /// `pad_mask` [batch, seq]: true tokens are never attended to.
    pub fn forward(&self, x: Tensor<B, 3>, pad_mask: Option<Tensor<B, 2, Bool>>) -> Tensor<B, 3> {
        let mut input = MhaInput::self_attn(x.clone());
        if let Some(mask) = pad_mask {
            input = input.mask_pad(mask);
        }
        let attn_output = self.self_attn.forward(input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

/// Per-camera CNN, weights shared across cameras.
#[derive(Module, Debug)]
pub struct ImageEncoder<B: Backend> {
    pub conv1: Conv2d<B>,
    pub conv2: Conv2d<B>,
    pub pool:  AdaptiveAvgPool2d,
    pub proj:  Linear<B>,
}

impl<B: Backend> ImageEncoder<B> {
    fn new(d_model: usize, device: &B::Device) -> Self {
        let conv = |c_in, c_out| {
            Conv2dConfig::new([c_in, c_out], [3, 3])
                .with_stride([2, 2])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init(device)
        };
        Self {
            conv1: conv(IMAGE_CHANNELS, CONV1_CHANNELS),
            conv2: conv(CONV1_CHANNELS, CONV2_CHANNELS),
            pool:  AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            proj:  LinearConfig::new(CONV2_CHANNELS, d_model).init(device),
        }
    }

    /// [batch, cams, 3, H, W] → [batch, cams, d_model]
    pub fn forward(&self, images: Tensor<B, 5>) -> Tensor<B, 3> {
        let [batch, cams, channels, height, width] = images.dims();
        let x = images.reshape([batch * cams, channels, height, width]);
        let x = relu(self.conv1.forward(x));
        let x = relu(self.conv2.forward(x));
        let x = self.pool.forward(x).reshape([batch * cams, CONV2_CHANNELS]);
        let x = self.proj.forward(x);
        let [_, d_model] = x.dims();
        x.reshape([batch, cams, d_model])
    }
}

/// [batch, n] of 0..n, used to index positional and query embeddings
fn positions<B: Backend>(n: usize, batch: usize, device: &B::Device) -> Tensor<B, 2, Int> {
    Tensor::<B, 1, Int>::arange(0..n as i64, device)
        .unsqueeze::<2>()
        .expand([batch, n])
}

// ─── ACT (CVAE transformer) ───────────────────────────────────────────────────

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct ActBackboneConfig {
    pub action_dim:  usize,
    pub num_cameras: usize,
    pub num_queries: usize,
    pub d_model:     usize,
    pub num_heads:   usize,
    pub num_layers:  usize,
    pub d_ff:        usize,
    pub latent_dim:  usize,
    pub dropout:     f64,
    #[config(default = 1e-4)]
    pub weight_decay: f64,
}

impl ActBackboneConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ActBackbone<B> {
        let block = || EncoderBlock::new(self.d_model, self.num_heads, self.d_ff, self.dropout, device);
        let linear = |d_in, d_out| LinearConfig::new(d_in, d_out).init(device);
        let embedding = |n| EmbeddingConfig::new(n, self.d_model).init(device);

        ActBackbone {
            cls_embed:       embedding(1),
            enc_qpos_proj:   linear(self.action_dim, self.d_model),
            enc_action_proj: linear(self.action_dim, self.d_model),
            enc_pos:         embedding(self.num_queries + 2),
            encoder:         (0..self.num_layers).map(|_| block()).collect(),
            latent_proj:     linear(self.d_model, 2 * self.latent_dim),

            image_encoder:   ImageEncoder::new(self.d_model, device),
            latent_out_proj: linear(self.latent_dim, self.d_model),
            qpos_proj:       linear(self.action_dim, self.d_model),
            skill_proj:      linear(SKILL_CLASSES, self.d_model),
            env_proj:        linear(ENV_CLASSES, self.d_model),
            query_embed:     embedding(self.num_queries),
            dec_pos:         embedding(DECODER_PREFIX_TOKENS + self.num_cameras + self.num_queries),
            decoder:         (0..self.num_layers).map(|_| block()).collect(),
            final_norm:      LayerNormConfig::new(self.d_model).init(device),
            action_head:     linear(self.d_model, self.action_dim),
            pad_head:        linear(self.d_model, 1),

            dropout:     DropoutConfig::new(self.dropout).init(),
            num_queries: self.num_queries,
            latent_dim:  self.latent_dim,
        }
    }

    /// AdamW paired with this backbone
    pub fn init_optimizer<B: AutodiffBackend>(&self) -> impl Optimizer<ActBackbone<B>, B> {
        AdamWConfig::new()
            .with_weight_decay(self.weight_decay as f32)
            .init()
    }
}

#[derive(Module, Debug)]
pub struct ActBackbone<B: Backend> {
    // posterior encoder
    pub cls_embed:       Embedding<B>,
    pub enc_qpos_proj:   Linear<B>,
    pub enc_action_proj: Linear<B>,
    pub enc_pos:         Embedding<B>,
    pub encoder:         Vec<EncoderBlock<B>>,
    pub latent_proj:     Linear<B>,

    // decoder
    pub image_encoder:   ImageEncoder<B>,
    pub latent_out_proj: Linear<B>,
    pub qpos_proj:       Linear<B>,
    pub skill_proj:      Linear<B>,
    pub env_proj:        Linear<B>,
    pub query_embed:     Embedding<B>,
    pub dec_pos:         Embedding<B>,
    pub decoder:         Vec<EncoderBlock<B>>,
    pub final_norm:      LayerNorm<B>,
    pub action_head:     Linear<B>,
    pub pad_head:        Linear<B>,

    pub dropout:     Dropout,
    pub num_queries: usize,
    pub latent_dim:  usize,
}

impl<B: Backend> ActBackbone<B> {
    /// Posterior q(z | qpos, actions) from the CLS token output.
    pub fn encode(
        &self,
        qpos:    Tensor<B, 2>,
        actions: Tensor<B, 3>,
        is_pad:  Tensor<B, 2, Bool>,
    ) -> LatentParams<B> {
        let [batch, steps, _] = actions.dims();
        let device = actions.device();

        let cls      = self.cls_embed.forward(Tensor::<B, 2, Int>::zeros([batch, 1], &device));
        let qpos_tok = self.enc_qpos_proj.forward(qpos).unsqueeze_dim::<3>(1);
        let act_tok  = self.enc_action_proj.forward(actions);

        let x = Tensor::cat(vec![cls, qpos_tok, act_tok], 1);
        let x = x + self.enc_pos.forward(positions(steps + 2, batch, &device));

        // CLS and qpos are always visible
        let head = Tensor::<B, 2, Bool>::from_data(TensorData::new(vec![false; batch * 2], [batch, 2]), &device);
        let mask = Tensor::cat(vec![head, is_pad], 1);

        let mut x = self.dropout.forward(x);
        for layer in &self.encoder {
            x = layer.forward(x, Some(mask.clone()));
        }

        let [_, _, d_model] = x.dims();
        let cls_out = x.slice([0..batch, 0..1, 0..d_model]).reshape([batch, d_model]);
        let stats   = self.latent_proj.forward(cls_out);
        let l = self.latent_dim;
        LatentParams {
            mu:     stats.clone().slice([0..batch, 0..l]),
            logvar: stats.slice([0..batch, l..2 * l]),
        }
    }

    /// z = mu + exp(logvar / 2) * eps, eps ~ N(0, I)
    fn reparameterize(latent: &LatentParams<B>) -> Tensor<B, 2> {
        let std = latent.logvar.clone().div_scalar(2.0).exp();
        let eps = Tensor::random(std.shape(), Distribution::Normal(0.0, 1.0), &std.device());
        latent.mu.clone() + std * eps
    }

    pub fn decode(
        &self,
        z:         Tensor<B, 2>,
        obs:       Observation<B>,
        skill_ind: Tensor<B, 2>,
        env_ind:   Tensor<B, 2>,
    ) -> ChunkPrediction<B> {
        let [batch, _] = z.dims();
        let device = z.device();

        let tokens = vec![
            self.latent_out_proj.forward(z).unsqueeze_dim::<3>(1),
            self.qpos_proj.forward(obs.qpos).unsqueeze_dim::<3>(1),
            self.skill_proj.forward(skill_ind).unsqueeze_dim::<3>(1),
            self.env_proj.forward(env_ind).unsqueeze_dim::<3>(1),
            self.image_encoder.forward(obs.images),
            self.query_embed.forward(positions(self.num_queries, batch, &device)),
        ];
        let x = Tensor::cat(tokens, 1);
        let [_, seq_len, d_model] = x.dims();
        let x = x + self.dec_pos.forward(positions(seq_len, batch, &device));

        let mut x = self.dropout.forward(x);
        for layer in &self.decoder {
            x = layer.forward(x, None);
        }
        let x = self.final_norm.forward(x);

        // The query tokens sit at the end of the sequence
        let q   = self.num_queries;
        let out = x.slice([0..batch, seq_len - q..seq_len, 0..d_model]);
        ChunkPrediction {
            actions:    self.action_head.forward(out.clone()),
            pad_logits: self.pad_head.forward(out).reshape([batch, q]),
        }
    }
}

impl<B: Backend> ChunkBackbone<B> for ActBackbone<B> {
    fn num_queries(&self) -> usize {
        self.num_queries
    }

    fn forward_train(
        &self,
        obs:       Observation<B>,
        actions:   Tensor<B, 3>,
        is_pad:    Tensor<B, 2, Bool>,
        skill_ind: Tensor<B, 2>,
        env_ind:   Tensor<B, 2>,
    ) -> (ChunkPrediction<B>, LatentParams<B>) {
        let latent = self.encode(obs.qpos.clone(), actions, is_pad);
        let z      = Self::reparameterize(&latent);
        (self.decode(z, obs, skill_ind, env_ind), latent)
    }

    fn forward_infer(
        &self,
        obs:       Observation<B>,
        skill_ind: Tensor<B, 2>,
        env_ind:   Tensor<B, 2>,
    ) -> ChunkPrediction<B> {
        // Prior mean
        let [batch, _] = obs.qpos.dims();
        let z = Tensor::zeros([batch, self.latent_dim], &obs.qpos.device());
        self.decode(z, obs, skill_ind, env_ind)
    }
}

// ─── CNN + MLP baseline ───────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct CnnMlpBackboneConfig {
    pub action_dim:  usize,
    pub num_cameras: usize,
    pub d_model:     usize,
    pub d_ff:        usize,
    pub dropout:     f64,
    #[config(default = 1e-4)]
    pub weight_decay: f64,
}

impl CnnMlpBackboneConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CnnMlpBackbone<B> {
        let features = self.num_cameras * self.d_model + self.action_dim;
        CnnMlpBackbone {
            image_encoder: ImageEncoder::new(self.d_model, device),
            mlp1:    LinearConfig::new(features, self.d_ff).init(device),
            mlp2:    LinearConfig::new(self.d_ff, self.d_ff).init(device),
            head:    LinearConfig::new(self.d_ff, self.action_dim).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    pub fn init_optimizer<B: AutodiffBackend>(&self) -> impl Optimizer<CnnMlpBackbone<B>, B> {
        AdamWConfig::new()
            .with_weight_decay(self.weight_decay as f32)
            .init()
    }
}

#[derive(Module, Debug)]
pub struct CnnMlpBackbone<B: Backend> {
    pub image_encoder: ImageEncoder<B>,
    pub mlp1:          Linear<B>,
    pub mlp2:          Linear<B>,
    pub head:          Linear<B>,
    pub dropout:       Dropout,
}

impl<B: Backend> StepBackbone<B> for CnnMlpBackbone<B> {
    fn forward(&self, obs: Observation<B>) -> Tensor<B, 2> {
        let features = self.image_encoder.forward(obs.images);
        let [batch, cams, d_model] = features.dims();
        let x = Tensor::cat(vec![features.reshape([batch, cams * d_model]), obs.qpos], 1);
        let x = self.dropout.forward(relu(self.mlp1.forward(x)));
        let x = self.dropout.forward(relu(self.mlp2.forward(x)));
        self.head.forward(x)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn act_config() -> ActBackboneConfig {
        ActBackboneConfig::new(8, 2, 5, 16, 2, 1, 32, 4, 0.0)
    }

    fn observation(batch: usize, device: &<TestBackend as Backend>::Device) -> Observation<TestBackend> {
        Observation {
            qpos:   Tensor::ones([batch, 8], device),
            images: Tensor::ones([batch, 2, 3, 8, 8], device),
        }
    }

    #[test]
    fn test_act_train_shapes() {
        let device = Default::default();
        let model: ActBackbone<TestBackend> = act_config().init(&device);
        let actions = Tensor::<TestBackend, 3>::zeros([3, 5, 8], &device);
        let is_pad  = Tensor::<TestBackend, 2>::zeros([3, 5], &device).equal_elem(1.0);
        let (pred, latent) = model.forward_train(
            observation(3, &device),
            actions,
            is_pad,
            Tensor::zeros([3, SKILL_CLASSES], &device),
            Tensor::zeros([3, ENV_CLASSES], &device),
        );
        assert_eq!(pred.actions.dims(), [3, 5, 8]);
        assert_eq!(pred.pad_logits.dims(), [3, 5]);
        assert_eq!(latent.mu.dims(), [3, 4]);
        assert_eq!(latent.logvar.dims(), [3, 4]);
    }

    #[test]
    fn test_act_encoder_accepts_shorter_chunk() {
        let device = Default::default();
        let model: ActBackbone<TestBackend> = act_config().init(&device);
        let actions = Tensor::<TestBackend, 3>::zeros([2, 3, 8], &device);
        let is_pad  = Tensor::<TestBackend, 2>::zeros([2, 3], &device).equal_elem(1.0);
        let latent = model.encode(Tensor::zeros([2, 8], &device), actions, is_pad);
        assert_eq!(latent.mu.dims(), [2, 4]);
    }

    #[test]
    fn test_act_inference_is_deterministic() {
        let device = Default::default();
        let model: ActBackbone<TestBackend> = act_config().init(&device);
        let run = || {
            model
                .forward_infer(
                    observation(1, &device),
                    Tensor::zeros([1, SKILL_CLASSES], &device),
                    Tensor::zeros([1, ENV_CLASSES], &device),
                )
                .actions
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_cnnmlp_shapes() {
        let device = Default::default();
        let model: CnnMlpBackbone<TestBackend> =
            CnnMlpBackboneConfig::new(8, 2, 16, 32, 0.0).init(&device);
        let out = model.forward(observation(4, &device));
        assert_eq!(out.dims(), [4, 8]);
    }
}

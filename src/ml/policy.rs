// ============================================================
// Layer 5 — Policies
// ============================================================
// Wraps a backbone with image normalization, mode selection
// and the training losses.
//
//   ActPolicy     (ChunkBackbone)
//     training   l1       masked L1 over real timesteps
//                kl       KL(q(z | obs, actions) ‖ N(0, I))
//                l1_uninf ent_weight · L1 of a rerun with the
//                         skill indicator zeroed (skipped in
//                         few-shot runs)
//                loss = l1 + l1_uninf + kl · kl_weight
//     inference  decoded chunk, latent from the prior
//
//   CnnMlpPolicy  (StepBackbone)
//     training   mse against the first action of the chunk
//     inference  one action
//
// Mode is picked by whether a ground-truth chunk is supplied.
//
// Reference: Zhao et al. (2023) ACT
//            Kingma & Welling (2014), Appendix B (closed-form KL)

use std::collections::BTreeMap;

use burn::{
    nn::loss::{MseLoss, Reduction},
    prelude::*,
    tensor::Bool,
};

use crate::data::batcher::TrajectoryBatch;
use crate::domain::error::PolicyError;
use crate::ml::backbone::{ChunkBackbone, Observation, StepBackbone};

pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD:  [f32; 3] = [0.229, 0.224, 0.225];

pub const DEFAULT_ENT_WEIGHT: f64 = 0.01;

// ─── Inputs and outputs ───────────────────────────────────────────────────────

/// Everything a policy call can receive. `actions` and `is_pad`
/// are present for training and absent for inference.
#[derive(Debug, Clone)]
pub struct PolicyInput<B: Backend> {
    pub qpos:      Tensor<B, 2>,
    pub images:    Tensor<B, 5>,
    pub skill_ind: Tensor<B, 2>,
    pub env_ind:   Tensor<B, 2>,
    pub actions:   Option<Tensor<B, 3>>,
    pub is_pad:    Option<Tensor<B, 2, Bool>>,
}

impl<B: Backend> From<TrajectoryBatch<B>> for PolicyInput<B> {
    fn from(batch: TrajectoryBatch<B>) -> Self {
        Self {
            qpos:      batch.qpos,
            images:    batch.images,
            skill_ind: batch.skill_ind,
            env_ind:   batch.env_ind,
            actions:   Some(batch.actions),
            is_pad:    Some(batch.is_pad),
        }
    }
}

impl<B: Backend> PolicyInput<B> {
    /// Inference input: no ground-truth chunk.
    pub fn observation_only(
        qpos:      Tensor<B, 2>,
        images:    Tensor<B, 5>,
        skill_ind: Tensor<B, 2>,
        env_ind:   Tensor<B, 2>,
    ) -> Self {
        Self { qpos, images, skill_ind, env_ind, actions: None, is_pad: None }
    }

    fn observation(&self) -> Observation<B> {
        Observation {
            qpos:   self.qpos.clone(),
            images: normalize_images(self.images.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LossBreakdown<B: Backend> {
    pub l1:       Tensor<B, 1>,
    pub l1_uninf: Tensor<B, 1>,
    pub kl:       Tensor<B, 1>,
    pub loss:     Tensor<B, 1>,
}

#[derive(Debug, Clone)]
pub struct StepLoss<B: Backend> {
    pub mse:  Tensor<B, 1>,
    pub loss: Tensor<B, 1>,
}

/// Host-side copy of one batch's losses, keyed by term name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossScalars {
    pub loss:  f64,
    pub terms: BTreeMap<&'static str, f64>,
}

fn scalar<B: Backend>(t: &Tensor<B, 1>) -> f64 {
    t.clone().into_scalar().elem::<f64>()
}

impl<B: Backend> LossBreakdown<B> {
    pub fn scalars(&self) -> LossScalars {
        LossScalars {
            loss:  scalar(&self.loss),
            terms: BTreeMap::from([
                ("l1", scalar(&self.l1)),
                ("l1_uninf", scalar(&self.l1_uninf)),
                ("kl", scalar(&self.kl)),
            ]),
        }
    }
}

impl<B: Backend> StepLoss<B> {
    pub fn scalars(&self) -> LossScalars {
        LossScalars {
            loss:  scalar(&self.loss),
            terms: BTreeMap::from([("mse", scalar(&self.mse))]),
        }
    }
}

/// Result of a policy call in either mode.
#[derive(Debug, Clone)]
pub enum PolicyOutput<B: Backend, L> {
    Losses(L),
    Actions(Tensor<B, 3>),
}

// ─── Loss helpers ─────────────────────────────────────────────────────────────

/// Per-channel ImageNet normalization of [batch, cams, 3, H, W] images.
pub fn normalize_images<B: Backend>(images: Tensor<B, 5>) -> Tensor<B, 5> {
    let device = images.device();
    let mean = Tensor::<B, 1>::from_floats(IMAGENET_MEAN, &device).reshape([1, 1, 3, 1, 1]);
    let std  = Tensor::<B, 1>::from_floats(IMAGENET_STD, &device).reshape([1, 1, 3, 1, 1]);
    (images - mean) / std
}

#[derive(Debug, Clone)]
pub struct KlDivergence<B: Backend> {
    /// Summed over latent dims, averaged over the batch: [1]
    pub total:          Tensor<B, 1>,
    /// Averaged over the batch: [latent_dim]
    pub dimension_wise: Tensor<B, 1>,
    /// Averaged over latent dims, then the batch: [1]
    pub mean:           Tensor<B, 1>,
}

/// Closed-form KL between N(mu, exp(logvar)) and N(0, I).
///
/// Per element: -0.5 * (1 + logvar - mu² - exp(logvar)).
pub fn kl_divergence<B: Backend>(
    mu:     Tensor<B, 2>,
    logvar: Tensor<B, 2>,
) -> Result<KlDivergence<B>, PolicyError> {
    let [batch, latent_dim] = mu.dims();
    if batch == 0 {
        return Err(PolicyError::EmptyBatch);
    }

    let klds = (logvar.clone().exp() + mu.powf_scalar(2.0) - logvar)
        .sub_scalar(1.0)
        .mul_scalar(0.5);

    Ok(KlDivergence {
        total:          klds.clone().sum_dim(1).mean(),
        dimension_wise: klds.clone().mean_dim(0).reshape([latent_dim]),
        mean:           klds.mean_dim(1).mean(),
    })
}

/// L1 averaged over unmasked elements only.
///
/// `a_hat` may carry more timesteps than `actions`; the extra
/// steps are ignored. A fully padded batch yields 0.
pub fn masked_l1<B: Backend>(
    actions: Tensor<B, 3>,
    a_hat:   Tensor<B, 3>,
    is_pad:  Tensor<B, 2, Bool>,
) -> Tensor<B, 1> {
    let [batch, steps, action_dim] = actions.dims();
    let a_hat = a_hat.slice([0..batch, 0..steps, 0..action_dim]);

    let valid = is_pad.bool_not().float();
    let denom = valid.clone().sum().mul_scalar(action_dim as f64).clamp_min(1.0);

    let abs_err = (actions - a_hat).abs() * valid.unsqueeze_dim::<3>(2);
    abs_err.sum() / denom
}

// ─── Training objective ───────────────────────────────────────────────────────

/// What the trainer needs from a policy: a differentiable loss
/// for one batch plus its host-side breakdown for logging.
pub trait TrainingObjective<B: Backend, M> {
    fn objective(
        &self,
        model: &M,
        batch: TrajectoryBatch<B>,
    ) -> Result<(Tensor<B, 1>, LossScalars), PolicyError>;
}

// ─── ACT ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ActPolicy {
    pub kl_weight:  f64,
    pub ent_weight: f64,
    pub few_shot:   bool,
}

impl ActPolicy {
    /// A missing or zero `ent_weight` falls back to 0.01.
    pub fn new(kl_weight: f64, ent_weight: Option<f64>, few_shot: bool) -> Self {
        let ent_weight = ent_weight
            .filter(|w| *w != 0.0)
            .unwrap_or(DEFAULT_ENT_WEIGHT);
        Self { kl_weight, ent_weight, few_shot }
    }

    pub fn forward<B: Backend, M: ChunkBackbone<B>>(
        &self,
        model: &M,
        input: PolicyInput<B>,
    ) -> Result<PolicyOutput<B, LossBreakdown<B>>, PolicyError> {
        match (input.actions.is_some(), input.is_pad.is_some()) {
            (true, true)  => self.training_losses(model, input).map(PolicyOutput::Losses),
            (true, false) => Err(PolicyError::MissingPadMask),
            (false, _)    => Ok(PolicyOutput::Actions(self.predict(model, input))),
        }
    }

    pub fn training_losses<B: Backend, M: ChunkBackbone<B>>(
        &self,
        model: &M,
        input: PolicyInput<B>,
    ) -> Result<LossBreakdown<B>, PolicyError> {
        let obs = input.observation();
        let (Some(actions), Some(is_pad)) = (input.actions, input.is_pad) else {
            return Err(PolicyError::MissingPadMask);
        };

        let [batch, steps, action_dim] = actions.dims();
        if batch == 0 {
            return Err(PolicyError::EmptyBatch);
        }
        let keep    = steps.min(model.num_queries());
        let actions = actions.slice([0..batch, 0..keep, 0..action_dim]);
        let is_pad  = is_pad.slice([0..batch, 0..keep]);

        let (pred, latent) = model.forward_train(
            obs.clone(),
            actions.clone(),
            is_pad.clone(),
            input.skill_ind.clone(),
            input.env_ind.clone(),
        );
        let kl = kl_divergence(latent.mu, latent.logvar)?.total;
        let l1 = masked_l1(actions.clone(), pred.actions, is_pad.clone());

        let l1_uninf = if self.few_shot {
            Tensor::zeros([1], &l1.device())
        } else {
            let (uninf, _) = model.forward_train(
                obs,
                actions.clone(),
                is_pad.clone(),
                input.skill_ind.zeros_like(),
                input.env_ind,
            );
            masked_l1(actions, uninf.actions, is_pad).mul_scalar(self.ent_weight)
        };

        let loss = l1.clone() + l1_uninf.clone() + kl.clone().mul_scalar(self.kl_weight);
        Ok(LossBreakdown { l1, l1_uninf, kl, loss })
    }

    /// Predicted chunk [batch, num_queries, action_dim].
    pub fn predict<B: Backend, M: ChunkBackbone<B>>(&self, model: &M, input: PolicyInput<B>) -> Tensor<B, 3> {
        let obs = input.observation();
        model.forward_infer(obs, input.skill_ind, input.env_ind).actions
    }
}

impl<B: Backend, M: ChunkBackbone<B>> TrainingObjective<B, M> for ActPolicy {
    fn objective(
        &self,
        model: &M,
        batch: TrajectoryBatch<B>,
    ) -> Result<(Tensor<B, 1>, LossScalars), PolicyError> {
        let losses  = self.training_losses(model, batch.into())?;
        let scalars = losses.scalars();
        Ok((losses.loss, scalars))
    }
}

// ─── CNN + MLP ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CnnMlpPolicy;

impl CnnMlpPolicy {
    pub fn forward<B: Backend, M: StepBackbone<B>>(
        &self,
        model: &M,
        input: PolicyInput<B>,
    ) -> Result<PolicyOutput<B, StepLoss<B>>, PolicyError> {
        if input.actions.is_some() {
            self.training_loss(model, input).map(PolicyOutput::Losses)
        } else {
            Ok(PolicyOutput::Actions(self.predict(model, input)))
        }
    }

    /// MSE against the first action of the chunk.
    pub fn training_loss<B: Backend, M: StepBackbone<B>>(
        &self,
        model: &M,
        input: PolicyInput<B>,
    ) -> Result<StepLoss<B>, PolicyError> {
        let obs     = input.observation();
        let actions = input.actions.ok_or(PolicyError::MissingActions)?;
        if actions.dims()[0] == 0 {
            return Err(PolicyError::EmptyBatch);
        }
        let a_hat = model.forward(obs);
        let [batch, action_dim] = a_hat.dims();
        let target = actions.slice([0..batch, 0..1, 0..action_dim]).reshape([batch, action_dim]);
        let mse = MseLoss::new().forward(a_hat, target, Reduction::Mean);
        Ok(StepLoss { mse: mse.clone(), loss: mse })
    }

    /// One action per sample, as a chunk of length 1.
    pub fn predict<B: Backend, M: StepBackbone<B>>(&self, model: &M, input: PolicyInput<B>) -> Tensor<B, 3> {
        model.forward(input.observation()).unsqueeze_dim::<3>(1)
    }
}

impl<B: Backend, M: StepBackbone<B>> TrainingObjective<B, M> for CnnMlpPolicy {
    fn objective(
        &self,
        model: &M,
        batch: TrajectoryBatch<B>,
    ) -> Result<(Tensor<B, 1>, LossScalars), PolicyError> {
        let losses  = self.training_loss(model, batch.into())?;
        let scalars = losses.scalars();
        Ok((losses.loss, scalars))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::TensorData;

    use crate::ml::backbone::{ChunkPrediction, LatentParams};

    type TestBackend = NdArray;

    const A: usize = 3;
    const LATENT: usize = 2;

    /// Predicts `offset + sum(skill_ind)` everywhere, fixed latent.
    struct StubChunk {
        num_queries: usize,
        offset:      f32,
        mu:          f32,
        logvar:      f32,
    }

    impl<B: Backend> ChunkBackbone<B> for StubChunk {
        fn num_queries(&self) -> usize { self.num_queries }

        fn forward_train(
            &self,
            obs:       Observation<B>,
            _actions:  Tensor<B, 3>,
            _is_pad:   Tensor<B, 2, Bool>,
            skill_ind: Tensor<B, 2>,
            env_ind:   Tensor<B, 2>,
        ) -> (ChunkPrediction<B>, LatentParams<B>) {
            let [batch, _] = obs.qpos.dims();
            let device = obs.qpos.device();
            let latent = LatentParams {
                mu:     Tensor::full([batch, LATENT], self.mu, &device),
                logvar: Tensor::full([batch, LATENT], self.logvar, &device),
            };
            (self.forward_infer(obs, skill_ind, env_ind), latent)
        }

        fn forward_infer(
            &self,
            obs:       Observation<B>,
            skill_ind: Tensor<B, 2>,
            _env_ind:  Tensor<B, 2>,
        ) -> ChunkPrediction<B> {
            let [batch, _] = obs.qpos.dims();
            let device = obs.qpos.device();
            let shift  = skill_ind.sum_dim(1).unsqueeze_dim::<3>(2);
            ChunkPrediction {
                actions:    Tensor::zeros([batch, self.num_queries, A], &device).add_scalar(self.offset) + shift,
                pad_logits: Tensor::zeros([batch, self.num_queries], &device),
            }
        }
    }

    struct StubStep;

    impl<B: Backend> StepBackbone<B> for StubStep {
        fn forward(&self, obs: Observation<B>) -> Tensor<B, 2> {
            obs.qpos.add_scalar(1.0)
        }
    }

    fn pad_mask(rows: Vec<bool>, batch: usize, steps: usize) -> Tensor<TestBackend, 2, Bool> {
        Tensor::from_data(TensorData::new(rows, [batch, steps]), &Default::default())
    }

    fn training_input(batch: usize, steps: usize, is_pad: Tensor<TestBackend, 2, Bool>) -> PolicyInput<TestBackend> {
        let device = Default::default();
        PolicyInput {
            qpos:      Tensor::zeros([batch, A], &device),
            images:    Tensor::ones([batch, 2, 3, 4, 4], &device),
            skill_ind: Tensor::from_data(TensorData::new(vec![1.0f32, 0.0].repeat(batch), [batch, 2]), &device),
            env_ind:   Tensor::zeros([batch, 3], &device),
            actions:   Some(Tensor::zeros([batch, steps, A], &device)),
            is_pad:    Some(is_pad),
        }
    }

    fn value(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    #[test]
    fn test_kl_is_zero_at_standard_normal() {
        let device = Default::default();
        let kl = kl_divergence::<TestBackend>(
            Tensor::zeros([4, LATENT], &device),
            Tensor::zeros([4, LATENT], &device),
        ).unwrap();
        assert!(value(kl.total).abs() < 1e-6);
        assert!(value(kl.mean).abs() < 1e-6);
        assert_eq!(kl.dimension_wise.dims(), [LATENT]);
    }

    #[test]
    fn test_kl_grows_with_mu_under_tiny_variance() {
        let device = Default::default();
        let kl_at = |mu: f32| {
            let kl = kl_divergence::<TestBackend>(
                Tensor::full([2, LATENT], mu, &device),
                Tensor::full([2, LATENT], -10.0, &device),
            ).unwrap();
            value(kl.total)
        };
        let (small, large) = (kl_at(1.0), kl_at(2.0));
        assert!(large > small);
        // Same mu, same logvar in every dim: total = LATENT * mean
        let kl = kl_divergence::<TestBackend>(
            Tensor::full([2, LATENT], 2.0, &device),
            Tensor::full([2, LATENT], -10.0, &device),
        ).unwrap();
        assert!((value(kl.total) - LATENT as f64 * value(kl.mean)).abs() < 1e-4);
    }

    #[test]
    fn test_kl_rejects_empty_batch() {
        let device = Default::default();
        let err = kl_divergence::<TestBackend>(
            Tensor::zeros([0, LATENT], &device),
            Tensor::zeros([0, LATENT], &device),
        ).unwrap_err();
        assert_eq!(err, PolicyError::EmptyBatch);
    }

    #[test]
    fn test_masked_l1_ignores_padding() {
        let device = Default::default();
        let actions = Tensor::<TestBackend, 3>::zeros([1, 4, A], &device);
        let a_hat = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(
                [vec![1.0f32; 2 * A], vec![100.0f32; 2 * A]].concat(),
                [1, 4, A],
            ),
            &device,
        );
        let l1 = masked_l1(actions, a_hat, pad_mask(vec![false, false, true, true], 1, 4));
        assert!((value(l1) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_masked_l1_fully_padded_is_zero() {
        let device = Default::default();
        let l1 = masked_l1(
            Tensor::<TestBackend, 3>::zeros([1, 2, A], &device),
            Tensor::<TestBackend, 3>::ones([1, 2, A], &device),
            pad_mask(vec![true, true], 1, 2),
        );
        assert_eq!(value(l1), 0.0);
    }

    #[test]
    fn test_loss_decomposition() {
        let policy = ActPolicy::new(10.0, None, false);
        let model  = StubChunk { num_queries: 4, offset: 0.5, mu: 1.0, logvar: 0.0 };
        let input  = training_input(2, 4, pad_mask(vec![false, false, false, true, false, true, true, true], 2, 4));

        let losses = policy.training_losses(&model, input).unwrap().scalars();
        let l1       = losses.terms["l1"];
        let l1_uninf = losses.terms["l1_uninf"];
        let kl       = losses.terms["kl"];

        // skill_ind sums to 1 → prediction 1.5; zeroed → 0.5
        assert!((l1 - 1.5).abs() < 1e-6);
        assert!((l1_uninf - DEFAULT_ENT_WEIGHT * 0.5).abs() < 1e-6);
        // 0.5 * mu² per dim, two dims
        assert!((kl - 1.0).abs() < 1e-6);
        assert!((losses.loss - (l1 + l1_uninf + kl * 10.0)).abs() < 1e-5);
    }

    #[test]
    fn test_few_shot_skips_uninformative_term() {
        let policy = ActPolicy::new(1.0, Some(0.5), true);
        let model  = StubChunk { num_queries: 4, offset: 0.5, mu: 0.0, logvar: 0.0 };
        let input  = training_input(1, 4, pad_mask(vec![false; 4], 1, 4));

        let losses = policy.training_losses(&model, input).unwrap().scalars();
        assert_eq!(losses.terms["l1_uninf"], 0.0);
        assert!((losses.loss - losses.terms["l1"]).abs() < 1e-6);
    }

    #[test]
    fn test_zero_ent_weight_falls_back_to_default() {
        assert_eq!(ActPolicy::new(1.0, Some(0.0), false).ent_weight, DEFAULT_ENT_WEIGHT);
        assert_eq!(ActPolicy::new(1.0, Some(0.2), false).ent_weight, 0.2);
    }

    #[test]
    fn test_actions_truncated_to_num_queries() {
        let policy = ActPolicy::new(1.0, None, true);
        let model  = StubChunk { num_queries: 3, offset: 0.0, mu: 0.0, logvar: 0.0 };
        // Six steps, the last three padded: truncation drops exactly those
        let input = training_input(1, 6, pad_mask(vec![false, false, false, true, true, true], 1, 6));
        let losses = policy.training_losses(&model, input).unwrap().scalars();
        // prediction = sum(skill_ind) = 1 on every real element
        assert!((losses.terms["l1"] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_mode_dispatch() {
        let policy = ActPolicy::new(1.0, None, false);
        let model  = StubChunk { num_queries: 4, offset: 0.0, mu: 0.0, logvar: 0.0 };

        let mut input = training_input(2, 4, pad_mask(vec![false; 8], 2, 4));
        assert!(matches!(policy.forward(&model, input.clone()), Ok(PolicyOutput::Losses(_))));

        input.is_pad = None;
        assert_eq!(policy.forward(&model, input.clone()).unwrap_err(), PolicyError::MissingPadMask);

        input.actions = None;
        match policy.forward(&model, input) {
            Ok(PolicyOutput::Actions(a)) => assert_eq!(a.dims(), [2, 4, A]),
            other => panic!("expected actions, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_images_uses_imagenet_stats() {
        let device = Default::default();
        let images = Tensor::<TestBackend, 5>::zeros([1, 1, 3, 1, 1], &device);
        let out = normalize_images(images).into_data().to_vec::<f32>().unwrap();
        for c in 0..3 {
            assert!((out[c] + IMAGENET_MEAN[c] / IMAGENET_STD[c]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_cnnmlp_mse_on_first_action() {
        let policy = CnnMlpPolicy;
        // qpos = 0 → prediction 1 everywhere, target row 0 = 0
        let input  = training_input(2, 4, pad_mask(vec![false; 8], 2, 4));
        let losses = policy.training_loss(&StubStep, input.clone()).unwrap().scalars();
        assert!((losses.terms["mse"] - 1.0).abs() < 1e-6);
        assert_eq!(losses.loss, losses.terms["mse"]);

        let mut infer = input;
        infer.actions = None;
        match policy.forward(&StubStep, infer.clone()) {
            Ok(PolicyOutput::Actions(a)) => assert_eq!(a.dims(), [2, 1, A]),
            other => panic!("expected actions, got {other:?}"),
        }
        assert_eq!(policy.training_loss(&StubStep, infer).unwrap_err(), PolicyError::MissingActions);
    }

    #[test]
    fn test_empty_batch_is_rejected_before_the_backbone_runs() {
        use crate::ml::model::{ActBackboneConfig, CnnMlpBackboneConfig};

        let device = Default::default();
        let input  = training_input(0, 4, pad_mask(vec![], 0, 4));

        let act: crate::ml::model::ActBackbone<TestBackend> =
            ActBackboneConfig::new(A, 2, 4, 16, 2, 1, 32, LATENT, 0.0).init(&device);
        let err = ActPolicy::new(1.0, None, false).training_losses(&act, input.clone()).unwrap_err();
        assert_eq!(err, PolicyError::EmptyBatch);

        let step: crate::ml::model::CnnMlpBackbone<TestBackend> =
            CnnMlpBackboneConfig::new(A, 2, 16, 32, 0.0).init(&device);
        assert_eq!(CnnMlpPolicy.training_loss(&step, input).unwrap_err(), PolicyError::EmptyBatch);
    }

    #[test]
    fn test_loss_backpropagates() {
        type AdBackend = Autodiff<NdArray>;
        let device = Default::default();
        let mu = Tensor::<AdBackend, 2>::full([2, LATENT], 1.5, &device).require_grad();
        let kl = kl_divergence(mu.clone(), Tensor::zeros([2, LATENT], &device)).unwrap();
        let grads = kl.total.backward();
        // d/dmu of mean_b sum_d 0.5 mu² = mu / batch
        let g = mu.grad(&grads).unwrap().into_data().to_vec::<f32>().unwrap();
        assert!(g.iter().all(|v| (v - 0.75).abs() < 1e-5));
    }
}

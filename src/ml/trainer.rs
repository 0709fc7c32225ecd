// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Full train + validation loop using Burn's DataLoader and AdamW,
// shared by both policy classes:
//
//   ActPolicy    + ActBackbone     (chunk CVAE)
//   CnnMlpPolicy + CnnMlpBackbone  (single-step baseline)
//
// Key Burn insight:
//   - Training uses MyBackend (Autodiff<Wgpu>) for gradients
//   - model.valid() returns the model on MyInnerBackend (Wgpu),
//     which also switches dropout off
//   - Validation batcher must also use MyInnerBackend
//
// Every epoch saves a checkpoint; the epoch with the lowest
// validation loss is recorded as best.
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use std::collections::BTreeMap;

use anyhow::Result;
use burn::{
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
};

use crate::application::train_use_case::{PolicyClass, TrainConfig};
use crate::data::{batcher::TrajectoryBatcher, dataset::TrajectoryDataset};
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EpochMetrics, MetricsLogger},
};
use crate::ml::model::{ActBackboneConfig, CnnMlpBackboneConfig};
use crate::ml::policy::{CnnMlpPolicy, LossScalars, TrainingObjective};

type MyBackend      = burn::backend::Autodiff<burn::backend::Wgpu>;
type MyInnerBackend = burn::backend::Wgpu;

/// Backbone architecture for the ACT policy.
pub fn act_backbone_config(cfg: &TrainConfig) -> ActBackboneConfig {
    ActBackboneConfig::new(
        cfg.action_dim(), cfg.camera_names.len(), cfg.chunk_size,
        cfg.d_model, cfg.num_heads, cfg.num_layers, cfg.d_ff,
        cfg.latent_dim, cfg.dropout,
    )
    .with_weight_decay(cfg.weight_decay)
}

pub fn cnnmlp_backbone_config(cfg: &TrainConfig) -> CnnMlpBackboneConfig {
    CnnMlpBackboneConfig::new(
        cfg.action_dim(), cfg.camera_names.len(), cfg.d_model, cfg.d_ff, cfg.dropout,
    )
    .with_weight_decay(cfg.weight_decay)
}

pub fn run_training(
    cfg:           &TrainConfig,
    train_dataset: TrajectoryDataset,
    val_dataset:   TrajectoryDataset,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
) -> Result<()> {
    let device = burn::backend::wgpu::WgpuDevice::default();
    tracing::info!("Using WGPU device: {:?}", device);

    let run = RunContext { cfg, train_dataset, val_dataset, ckpt_manager, metrics, device };
    match cfg.policy_class {
        PolicyClass::Act => {
            let model_cfg = act_backbone_config(cfg);
            let model = model_cfg.init::<MyBackend>(&run.device);
            tracing::info!(
                "ACT backbone ready: {} layers, d_model={}, latent_dim={}, {} queries",
                cfg.num_layers, cfg.d_model, cfg.latent_dim, cfg.chunk_size,
            );
            train_loop(run, model, model_cfg.init_optimizer::<MyBackend>(), &cfg.act_policy())
        }
        PolicyClass::CnnMlp => {
            let model_cfg = cnnmlp_backbone_config(cfg);
            let model = model_cfg.init::<MyBackend>(&run.device);
            tracing::info!("CNNMLP backbone ready: d_model={}, d_ff={}", cfg.d_model, cfg.d_ff);
            train_loop(run, model, model_cfg.init_optimizer::<MyBackend>(), &CnnMlpPolicy)
        }
    }
}

struct RunContext<'a> {
    cfg:           &'a TrainConfig,
    train_dataset: TrajectoryDataset,
    val_dataset:   TrajectoryDataset,
    ckpt_manager:  CheckpointManager,
    metrics:       MetricsLogger,
    device:        burn::backend::wgpu::WgpuDevice,
}

/// Running sums of the per-batch losses of one phase.
#[derive(Debug, Default)]
struct EpochMeter {
    loss:    f64,
    terms:   BTreeMap<&'static str, f64>,
    batches: usize,
}

impl EpochMeter {
    fn add(&mut self, s: &LossScalars) {
        self.loss += s.loss;
        for (name, v) in &s.terms {
            *self.terms.entry(*name).or_insert(0.0) += *v;
        }
        self.batches += 1;
    }

    /// NaN when the phase saw no batches
    fn mean_loss(&self) -> f64 {
        if self.batches > 0 { self.loss / self.batches as f64 } else { f64::NAN }
    }

    fn mean_terms(&self) -> BTreeMap<String, f64> {
        self.terms
            .iter()
            .map(|(k, v)| (k.to_string(), v / self.batches.max(1) as f64))
            .collect()
    }
}

fn train_loop<M, O, P>(run: RunContext<'_>, mut model: M, mut optim: O, policy: &P) -> Result<()>
where
    M: AutodiffModule<MyBackend>,
    O: Optimizer<M, MyBackend>,
    P: TrainingObjective<MyBackend, M> + TrainingObjective<MyInnerBackend, M::InnerModule>,
{
    let RunContext { cfg, train_dataset, val_dataset, ckpt_manager, metrics, device } = run;
    let layout = train_dataset.sampler().config().clone();
    tracing::info!(
        "{} training episodes, {} validation episodes",
        train_dataset.episode_count(),
        val_dataset.episode_count(),
    );

    // ── Training data loader (AutodiffBackend) ────────────────────────────────
    let train_batcher = TrajectoryBatcher::<MyBackend>::new(device.clone(), &layout);
    let train_loader  = DataLoaderBuilder::new(train_batcher)
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);

    // ── Validation data loader (InnerBackend — no autodiff overhead) ──────────
    let val_batcher = TrajectoryBatcher::<MyInnerBackend>::new(device.clone(), &layout);
    let val_loader  = DataLoaderBuilder::new(val_batcher)
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let mut best_val = f64::INFINITY;

    // ── Epoch loop ────────────────────────────────────────────────────────────
    for epoch in 1..=cfg.epochs {

        // ── Training phase ────────────────────────────────────────────────────
        let mut train_meter = EpochMeter::default();

        for batch in train_loader.iter() {
            let (loss, scalars) =
                <P as TrainingObjective<MyBackend, M>>::objective(policy, &model, batch)?;
            train_meter.add(&scalars);

            // Backward pass + AdamW update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let model_valid = model.valid();
        let mut val_meter = EpochMeter::default();

        for batch in val_loader.iter() {
            let (_, scalars) = <P as TrainingObjective<MyInnerBackend, M::InnerModule>>::objective(
                policy, &model_valid, batch,
            )?;
            val_meter.add(&scalars);
        }

        let row = EpochMetrics::new(
            epoch,
            train_meter.mean_loss(),
            val_meter.mean_loss(),
            val_meter.mean_terms(),
        );

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | val_loss={:.4} | {}",
            epoch, cfg.epochs, row.train_loss, row.val_loss,
            row.terms.iter().map(|(k, v)| format!("{k}={v:.4}")).collect::<Vec<_>>().join(" "),
        );
        metrics.log(&row)?;

        ckpt_manager.save_model::<MyBackend, M>(&model, epoch)?;
        if row.is_improvement(best_val) {
            best_val = row.val_loss;
            ckpt_manager.mark_best(epoch)?;
            tracing::info!("New best validation loss {:.4} at epoch {}", best_val, epoch);
        }
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    tracing::info!(
        "Training complete! Checkpoints in '{}', metrics in '{}'",
        ckpt_manager.dir().display(),
        metrics.csv_path().display(),
    );
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_meter_averages_terms() {
        let mut meter = EpochMeter::default();
        meter.add(&LossScalars { loss: 2.0, terms: BTreeMap::from([("l1", 1.0)]) });
        meter.add(&LossScalars { loss: 4.0, terms: BTreeMap::from([("l1", 3.0)]) });
        assert_eq!(meter.mean_loss(), 3.0);
        assert_eq!(meter.mean_terms()["l1"], 2.0);
    }

    #[test]
    fn test_empty_phase_is_nan() {
        assert!(EpochMeter::default().mean_loss().is_nan());
    }

    #[test]
    fn test_backbone_configs_follow_train_config() {
        let cfg = TrainConfig::default();
        let act = act_backbone_config(&cfg);
        assert_eq!(act.action_dim, 8);
        assert_eq!(act.num_cameras, 4);
        assert_eq!(act.num_queries, 100);
        assert_eq!(act.weight_decay, cfg.weight_decay);

        let mlp = cnnmlp_backbone_config(&cfg);
        assert_eq!(mlp.action_dim, 8);
    }
}

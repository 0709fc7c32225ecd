// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the network, loss and training code.
//
// What's in this layer:
//
//   backbone.rs   — Traits the policies consume:
//                   ChunkBackbone (action chunk + latent)
//                   StepBackbone  (single next action)
//
//   model.rs      — Concrete backbones:
//                   • ACT: transformer CVAE encoder over the
//                     action chunk, transformer decoder over
//                     latent, qpos, task indicators, camera
//                     tokens and learned action queries
//                   • CNNMLP: camera CNN features + qpos → MLP
//
//   policy.rs     — Image normalization, mode selection,
//                   KL / masked L1 / MSE losses
//
//   trainer.rs    — The training loop
//                   Forward pass, loss, backward pass,
//                   AdamW step, validation, checkpoint per epoch
//
//   inferencer.rs — Loads a checkpoint and predicts a chunk
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Zhao et al. (2023) ACT

/// Backbone traits and the tensors passed across them
pub mod backbone;

/// ACT and CNNMLP backbone architectures
pub mod model;

/// Policies: losses and inference around a backbone
pub mod policy;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Inference engine — loads checkpoint and predicts action chunks
pub mod inferencer;

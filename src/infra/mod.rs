// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence that doesn't belong in any
// specific business layer:
//
//   checkpoint.rs — Saving and loading backbone weights
//                   with Burn's CompactRecorder, plus the
//                   TrainConfig as JSON so prediction can
//                   rebuild the same backbone and sampler.
//
//   metrics.rs    — Writes epoch-level losses and their
//                   individual terms to a CSV file.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

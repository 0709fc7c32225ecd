// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer handles everything from episode files on disk
// all the way to device-ready tensor batches.
//
// The pipeline flows in this order:
//
//   episode .json files
//       │
//       ▼
//   Splitter          → regex task filter, seeded train/val split
//       │
//       ▼
//   JsonEpisodeStore  → reads one episode into a Demonstration
//       │
//       ▼
//   TrajectorySampler → one random chunk per episode, padded,
//       │               normalized, cameras stacked
//       ▼
//   TrajectoryDataset → implements Burn's Dataset trait
//       │
//       ▼
//   TrajectoryBatcher → stacks examples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Each module is responsible for exactly one step.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Per-dimension min-max scaling of joint positions into [-1, 1]
pub mod normalizer;

/// Reads and writes JSON episode files
pub mod loader;

/// Task registry plus train/validation/few-shot splitting
pub mod splitter;

/// Builds one TrainingExample from an episode and a start time
pub mod sampler;

/// Implements Burn's Dataset trait over sampled chunks
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination for the three things the binary does:
// train a policy, predict a chunk from a checkpoint, and plan
// a task split without training.
//
// No tensor math and no printing here; the use cases call into
// data, ml and infra and hand results back to the CLI.
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The training workflow, plus TrainConfig and split planning
pub mod train_use_case;

// The checkpoint → action chunk workflow
pub mod predict_use_case;

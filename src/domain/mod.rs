// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits that define the core concepts:
// demonstrations, their filename-derived metadata, and the
// fixed-shape training example the sampler produces.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

/// A recorded demonstration: named streams of per-timestep frames
pub mod episode;

/// Environment / skill metadata parsed from episode filenames
pub mod meta;

/// One sampled chunk, the unit the batcher consumes
pub mod example;

/// Typed errors for normalizer, sampler, splitter and policies
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;

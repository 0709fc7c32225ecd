// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The sampler reads episodes through EpisodeStore instead of
// touching the filesystem directly. That keeps the sampler
// testable with in-memory fixtures:
//
//   - JsonEpisodeStore → reads one .json file per episode
//   - MemoryEpisodeStore (tests) → HashMap<PathBuf, Demonstration>
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use std::path::Path;

use crate::domain::episode::Demonstration;
use crate::domain::error::SampleError;

// ─── EpisodeStore ─────────────────────────────────────────────────────────────
/// Anything that can hand out a full demonstration for a path.
///
/// Implementations must be shareable across data loader workers,
/// hence the Send + Sync bound.
pub trait EpisodeStore: Send + Sync {
    /// Load the demonstration stored at `path`
    fn load(&self, path: &Path) -> Result<Demonstration, SampleError>;
}

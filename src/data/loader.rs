// ============================================================
// Layer 4 — Episode Loader
// ============================================================
// Reads demonstration episodes from disk. One episode is one
// JSON file holding the stream map:
//
//   {
//     "streams": {
//       "joint_positions": { "frame_shape": [7], "frames": [[...], ...] },
//       "gripper_open":    { "frame_shape": [],  "frames": [[1.0], ...] },
//       "front_rgb":       { "frame_shape": [128,128,3], "frames": [...] }
//     }
//   }
//
// Directory listing lives here too, so the splitter never has
// to know which extension an episode file carries.
//
// Reference: serde_json crate documentation
//            Rust Book §9 (Error Handling)

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::episode::Demonstration;
use crate::domain::error::{SampleError, SplitError};
use crate::domain::traits::EpisodeStore;

/// File extension of a persisted episode
pub const EPISODE_EXT: &str = "json";

/// Loads episodes stored as JSON files.
#[derive(Debug, Clone, Default)]
pub struct JsonEpisodeStore;

impl JsonEpisodeStore {
    pub fn new() -> Self {
        Self
    }
}

impl EpisodeStore for JsonEpisodeStore {
    fn load(&self, path: &Path) -> Result<Demonstration, SampleError> {
        let load_err = |message: String| SampleError::Load {
            path: path.to_path_buf(),
            message,
        };

        let bytes = fs::read(path).map_err(|e| load_err(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| load_err(e.to_string()))
    }
}

/// List every episode file directly inside `dir`, sorted by path.
///
/// Sorting makes the candidate order independent of the
/// filesystem, so a seeded shuffle is reproducible.
pub fn list_episode_files(dir: &Path) -> Result<Vec<PathBuf>, SplitError> {
    let io_err = |source| SplitError::Io { dir: dir.to_path_buf(), source };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(EPISODE_EXT) {
            files.push(path);
        }
    }
    files.sort();

    tracing::debug!("Found {} episode files in '{}'", files.len(), dir.display());
    Ok(files)
}

// ============================================================
// Layer 3 — Demonstration Domain Type
// ============================================================
// One recorded demonstration episode: a set of named data
// streams (joint positions, gripper state, camera frames, ...)
// each holding one frame per timestep.
//
// Every frame is stored flat as Vec<f32> together with the
// stream's frame shape, e.g.
//   joint_positions → frame_shape [7]         (7 values per step)
//   gripper_open    → frame_shape []          (1 value per step)
//   front_rgb       → frame_shape [128,128,3] (H*W*C values per step)
//
// Streams that were not recorded in an episode are stored
// with zero frames — they exist as keys but are not "valid".
//
// Reference: Rust Book §8 (Collections)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One named data stream of an episode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Stream {
    /// Shape of a single frame. Empty for scalar streams.
    pub frame_shape: Vec<usize>,

    /// One flat frame per timestep
    pub frames: Vec<Vec<f32>>,
}

impl Stream {
    /// Number of timesteps recorded in this stream
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Number of values in one frame (product of the frame shape)
    pub fn frame_len(&self) -> usize {
        self.frame_shape.iter().product()
    }
}

/// A full demonstration episode, keyed by stream name.
///
/// BTreeMap keeps iteration order stable, so "the first valid
/// stream" is the same on every load of the same file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Demonstration {
    pub streams: BTreeMap<String, Stream>,
}

impl Demonstration {
    pub fn get(&self, key: &str) -> Option<&Stream> {
        self.streams.get(key)
    }

    /// Keys of all streams holding at least one frame
    pub fn valid_keys(&self) -> Vec<&str> {
        self.streams
            .iter()
            .filter(|(_, s)| !s.is_empty())
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Episode length taken from the first valid stream.
    /// All streams of one episode are recorded in lockstep.
    pub fn episode_len(&self) -> Option<usize> {
        self.streams.values().find(|s| !s.is_empty()).map(Stream::len)
    }
}

// ─── Fixture builders ─────────────────────────────────────────────────────────
#[cfg(test)]
impl Stream {
    pub fn new(frame_shape: Vec<usize>, frames: Vec<Vec<f32>>) -> Self {
        Self { frame_shape, frames }
    }

    /// Scalar stream, one value per timestep
    pub fn scalars(values: impl IntoIterator<Item = f32>) -> Self {
        Self {
            frame_shape: Vec::new(),
            frames:      values.into_iter().map(|v| vec![v]).collect(),
        }
    }
}

#[cfg(test)]
impl Demonstration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stream(mut self, key: impl Into<String>, stream: Stream) -> Self {
        self.streams.insert(key.into(), stream);
        self
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_keys_skip_empty_streams() {
        let demo = Demonstration::new()
            .with_stream("gripper_open", Stream::scalars([1.0, 0.0]))
            .with_stream("front_depth", Stream::default());

        assert_eq!(demo.valid_keys(), vec!["gripper_open"]);
        assert_eq!(demo.episode_len(), Some(2));
    }

    #[test]
    fn test_empty_demo_has_no_length() {
        let demo = Demonstration::new().with_stream("front_depth", Stream::default());
        assert!(demo.valid_keys().is_empty());
        assert_eq!(demo.episode_len(), None);
    }

    #[test]
    fn test_frame_len_of_scalar_stream_is_one() {
        assert_eq!(Stream::scalars([0.5]).frame_len(), 1);
        assert_eq!(Stream::new(vec![4, 4, 3], vec![]).frame_len(), 48);
    }
}

// ============================================================
// Layer 4 — Trajectory Chunk Sampler
// ============================================================
// Turns one demonstration episode into one TrainingExample:
//
//   episode (len L)   ─────────────────────────────────────
//                              ▲ start = floor(u * L)
//   chunk (chunk_size)         [#########.............]
//                               valid      zero-padded
//
//   u comes from a unit-interval distribution (uniform by
//   default, Beta to bias toward the start/end or the middle).
//
// Streams are routed by name:
//   "...position..." → joint_action   (sliced chunk, normalized)
//   "...gripper..."  → gripper_action (sliced chunk)
//   "...rgb..."      → single camera frame at `start`
//   anything else    → single frame at `start`, kept in extras
//
// Camera frames are stacked in the configured camera order,
// scaled from [0, 255] to [0, 1] and reordered HWC → CHW.
//
// Every shape is checked before the example is returned. A
// mismatch aborts the sample; no partial examples escape.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};

use crate::data::normalizer::Normalizer;
use crate::data::splitter::EpisodeRef;
use crate::domain::episode::{Demonstration, Stream};
use crate::domain::error::SampleError;
use crate::domain::example::TrainingExample;
use crate::domain::meta::{ENV_CLASSES, SKILL_CLASSES};
use crate::domain::traits::EpisodeStore;

/// Image channels expected in every camera frame
pub const IMAGE_CHANNELS: usize = 3;

/// Distribution of the unit-interval draw that picks the chunk start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StartDistribution {
    #[default]
    Uniform,
    /// Beta(alpha, beta); alpha = beta = 1.5 favours the middle
    Beta { alpha: f64, beta: f64 },
    /// Always the same point, e.g. 0.0 to start every chunk at t = 0
    Fixed { u: f64 },
}

/// Prepared form of StartDistribution, validated once.
#[derive(Debug, Clone)]
enum UnitSampler {
    Uniform,
    Beta(Beta<f64>),
    Fixed(f64),
}

impl UnitSampler {
    fn new(dist: StartDistribution) -> Result<Self, SampleError> {
        match dist {
            StartDistribution::Uniform => Ok(Self::Uniform),
            StartDistribution::Beta { alpha, beta } => Beta::new(alpha, beta)
                .map(Self::Beta)
                .map_err(|e| SampleError::InvalidConfig(format!("beta start distribution: {e}"))),
            StartDistribution::Fixed { u } if (0.0..=1.0).contains(&u) => Ok(Self::Fixed(u)),
            StartDistribution::Fixed { u } => Err(SampleError::InvalidConfig(format!(
                "fixed start point {u} is outside [0, 1]"
            ))),
        }
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Self::Uniform   => rng.gen::<f64>(),
            Self::Beta(b)   => b.sample(rng),
            Self::Fixed(u)  => *u,
        }
    }
}

/// Everything the sampler needs to know about the expected layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub required_keys: Vec<String>,
    /// Stacking order of the camera streams
    pub camera_names:  Vec<String>,
    pub chunk_size:    usize,
    pub joint_dim:     usize,
    pub image_height:  usize,
    pub image_width:   usize,
    pub add_task_ind:  bool,
    pub start_distribution: StartDistribution,
}

impl SamplerConfig {
    /// Expected shape of the stacked image tensor [cams, C, H, W]
    pub fn image_shape(&self) -> [usize; 4] {
        [self.camera_names.len(), IMAGE_CHANNELS, self.image_height, self.image_width]
    }

    /// Joint dims plus one gripper dim
    pub fn action_dim(&self) -> usize {
        self.joint_dim + 1
    }
}

// ─── TrajectorySampler ────────────────────────────────────────────────────────
/// Samples fixed-length chunks from a list of episodes.
///
/// Holds no mutable state: randomness is passed in per call, so
/// the sampler can be shared by every loader worker.
pub struct TrajectorySampler {
    store:      Arc<dyn EpisodeStore>,
    episodes:   Vec<EpisodeRef>,
    cfg:        SamplerConfig,
    normalizer: Option<Normalizer>,
    unit:       UnitSampler,
}

impl TrajectorySampler {
    pub fn new(
        store:      Arc<dyn EpisodeStore>,
        episodes:   Vec<EpisodeRef>,
        cfg:        SamplerConfig,
        normalizer: Option<Normalizer>,
    ) -> Result<Self, SampleError> {
        if cfg.chunk_size == 0 {
            return Err(SampleError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if let Some(n) = &normalizer {
            if n.dims() != cfg.joint_dim {
                return Err(SampleError::InvalidConfig(format!(
                    "normalizer has {} dims but joint_dim is {}",
                    n.dims(),
                    cfg.joint_dim
                )));
            }
        }
        let unit = UnitSampler::new(cfg.start_distribution)?;
        Ok(Self { store, episodes, cfg, normalizer, unit })
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.cfg
    }

    /// Sample a chunk from episode `index` at a random start.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        index: usize,
        rng:   &mut R,
    ) -> Result<TrainingExample, SampleError> {
        let (episode, demo, episode_len) = self.load_checked(index)?;

        // u == 1.0 would land one past the end
        let u     = self.unit.draw(rng);
        let start = ((u * episode_len as f64).floor() as usize).min(episode_len - 1);

        self.assemble(episode, &demo, episode_len, start)
    }

    /// Sample a chunk from episode `index` starting exactly at `start`.
    pub fn sample_at(&self, index: usize, start: usize) -> Result<TrainingExample, SampleError> {
        let (episode, demo, episode_len) = self.load_checked(index)?;
        if start >= episode_len {
            return Err(SampleError::StartOutOfRange { start, len: episode_len });
        }
        self.assemble(episode, &demo, episode_len, start)
    }

    /// Load an episode and check the stream contract.
    fn load_checked(&self, index: usize) -> Result<(&EpisodeRef, Demonstration, usize), SampleError> {
        let episode = self.episodes.get(index).ok_or(SampleError::IndexOutOfRange {
            index,
            len: self.episodes.len(),
        })?;
        let demo = self.store.load(&episode.path)?;

        let valid_keys = demo.valid_keys();
        if valid_keys.is_empty() {
            return Err(SampleError::EmptyEpisode { path: episode.path.clone() });
        }
        if let Some(missing) = self
            .cfg
            .required_keys
            .iter()
            .find(|k| !valid_keys.contains(&k.as_str()))
        {
            return Err(SampleError::MissingStream {
                path: episode.path.clone(),
                key:  missing.clone(),
            });
        }

        let episode_len = demo
            .episode_len()
            .ok_or_else(|| SampleError::EmptyEpisode { path: episode.path.clone() })?;
        Ok((episode, demo, episode_len))
    }

    fn assemble(
        &self,
        episode:     &EpisodeRef,
        demo:        &Demonstration,
        episode_len: usize,
        start:       usize,
    ) -> Result<TrainingExample, SampleError> {
        let cfg   = &self.cfg;
        let end   = episode_len.min(start + cfg.chunk_size);
        let valid = end - start;

        let mut joint_action   = None;
        let mut gripper_action = None;
        let mut camera_frames: HashMap<&str, &Stream> = HashMap::new();
        let mut extras = BTreeMap::new();

        for key in &cfg.required_keys {
            // Presence was checked in load_checked
            let Some(stream) = demo.get(key) else { continue };

            if key.contains("position") {
                joint_action = Some(self.joint_chunk(stream, start, end)?);
            } else if key.contains("gripper") {
                gripper_action = Some(gripper_chunk(stream, start, end, cfg.chunk_size)?);
            } else if key.contains("rgb") {
                camera_frames.insert(key.as_str(), stream);
            } else {
                extras.insert(key.clone(), frame_at(stream, start)?.to_vec());
            }
        }

        let images = self.stack_cameras(&camera_frames, start)?;

        let is_pad: Vec<bool> = (0..cfg.chunk_size).map(|i| i >= valid).collect();

        let example = TrainingExample {
            joint_action:   joint_action.unwrap_or_default(),
            gripper_action: gripper_action.unwrap_or_default(),
            is_pad,
            images,
            skill_ind: episode.meta.skill_indicator(cfg.add_task_ind),
            env_ind:   episode.meta.env_indicator(),
            extras,
            start_ts: start,
            meta:     episode.meta,
        };

        self.check_shapes(&example)?;
        Ok(example)
    }

    /// Slice [start, end) of the joint stream, normalize, zero-pad.
    fn joint_chunk(&self, stream: &Stream, start: usize, end: usize) -> Result<Vec<f32>, SampleError> {
        let dim = self.cfg.joint_dim;
        let mut data = vec![0.0f32; self.cfg.chunk_size * dim];

        for (i, js) in frames_in(stream, start, end)?.iter().enumerate() {
            if js.len() != dim {
                return Err(SampleError::ShapeMismatch {
                    field:    "joint_action",
                    expected: vec![dim],
                    got:      vec![js.len()],
                });
            }
            let row = match &self.normalizer {
                Some(n) => n.process_timestep(js)?,
                None    => js.clone(),
            };
            data[i * dim..(i + 1) * dim].copy_from_slice(&row);
        }
        Ok(data)
    }

    /// Stack camera frames in the configured order as [cams, C, H, W] in [0, 1].
    fn stack_cameras(
        &self,
        frames: &HashMap<&str, &Stream>,
        start:  usize,
    ) -> Result<Vec<f32>, SampleError> {
        let (h, w, c) = (self.cfg.image_height, self.cfg.image_width, IMAGE_CHANNELS);
        let mut images = Vec::with_capacity(self.cfg.camera_names.len() * c * h * w);

        for cam in &self.cfg.camera_names {
            let stream = frames
                .get(cam.as_str())
                .ok_or_else(|| SampleError::MissingCamera { camera: cam.clone() })?;

            if stream.frame_shape != [h, w, c] {
                return Err(SampleError::ShapeMismatch {
                    field:    "images",
                    expected: vec![h, w, c],
                    got:      stream.frame_shape.clone(),
                });
            }
            let hwc = frame_at(stream, start)?;
            if hwc.len() != stream.frame_len() {
                return Err(SampleError::ShapeMismatch {
                    field:    "images",
                    expected: vec![stream.frame_len()],
                    got:      vec![hwc.len()],
                });
            }

            // HWC → CHW
            for ch in 0..c {
                for y in 0..h {
                    for x in 0..w {
                        images.push(hwc[(y * w + x) * c + ch] / 255.0);
                    }
                }
            }
        }
        Ok(images)
    }

    /// Final contract check on the assembled example.
    fn check_shapes(&self, ex: &TrainingExample) -> Result<(), SampleError> {
        let cfg = &self.cfg;
        let checks: [(&'static str, usize, usize); 6] = [
            ("images",         cfg.image_shape().iter().product::<usize>(), ex.images.len()),
            ("is_pad",         cfg.chunk_size,                  ex.is_pad.len()),
            ("joint_action",   cfg.chunk_size * cfg.joint_dim,  ex.joint_action.len()),
            ("gripper_action", cfg.chunk_size,                  ex.gripper_action.len()),
            ("skill_ind",      SKILL_CLASSES,                   ex.skill_ind.len()),
            ("env_ind",        ENV_CLASSES,                     ex.env_ind.len()),
        ];
        for (field, expected, got) in checks {
            if expected != got {
                return Err(SampleError::ShapeMismatch {
                    field,
                    expected: vec![expected],
                    got:      vec![got],
                });
            }
        }
        Ok(())
    }
}

/// Slice [start, end) of a gripper stream into a zero-padded chunk.
fn gripper_chunk(
    stream:     &Stream,
    start:      usize,
    end:        usize,
    chunk_size: usize,
) -> Result<Vec<f32>, SampleError> {
    let mut data = vec![0.0f32; chunk_size];
    for (i, frame) in frames_in(stream, start, end)?.iter().enumerate() {
        data[i] = *frame.first().ok_or(SampleError::ShapeMismatch {
            field:    "gripper_action",
            expected: vec![1],
            got:      vec![0],
        })?;
    }
    Ok(data)
}

fn frame_at(stream: &Stream, t: usize) -> Result<&[f32], SampleError> {
    stream
        .frames
        .get(t)
        .map(Vec::as_slice)
        .ok_or(SampleError::ShapeMismatch {
            field:    "frame",
            expected: vec![t + 1],
            got:      vec![stream.len()],
        })
}

/// Frames [start, end) of a stream; a stream shorter than the
/// episode is a shape error rather than a panic.
fn frames_in(stream: &Stream, start: usize, end: usize) -> Result<&[Vec<f32>], SampleError> {
    stream.frames.get(start..end).ok_or(SampleError::ShapeMismatch {
        field:    "frames",
        expected: vec![end],
        got:      vec![stream.len()],
    })
}

// ============================================================
// Layer 3 — Training Example
// ============================================================
// One sampled chunk of a demonstration, ready to be batched.
//
// Layouts (all row-major, flat):
//   joint_action   [chunk_size, joint_dim]
//   gripper_action [chunk_size]
//   is_pad         [chunk_size]        true = padding, not real data
//   images         [cameras, 3, H, W]  values in [0, 1]
//   skill_ind      [2]
//   env_ind        [3]
//
// Built fresh for every sample request and never mutated after.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::meta::{EpisodeMeta, ENV_CLASSES, SKILL_CLASSES};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingExample {
    pub joint_action:   Vec<f32>,
    pub gripper_action: Vec<f32>,
    pub is_pad:         Vec<bool>,
    pub images:         Vec<f32>,
    pub skill_ind:      [f32; SKILL_CLASSES],
    pub env_ind:        [f32; ENV_CLASSES],

    /// Single-frame values of any other required stream, keyed by name
    pub extras: BTreeMap<String, Vec<f32>>,

    /// Timestep the chunk starts at
    pub start_ts: usize,

    pub meta: EpisodeMeta,
}

impl TrainingExample {
    /// Joint + gripper action for one timestep
    pub fn action_at(&self, t: usize, joint_dim: usize) -> Vec<f32> {
        let mut a = self.joint_action[t * joint_dim..(t + 1) * joint_dim].to_vec();
        a.push(self.gripper_action[t]);
        a
    }
}

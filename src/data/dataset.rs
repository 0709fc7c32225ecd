use std::sync::{Arc, Mutex};

use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, SeedableRng};

use crate::data::sampler::TrajectorySampler;
use crate::domain::example::TrainingExample;

/// Burn dataset over a list of episodes: `get(i)` samples a fresh
/// random chunk from episode `i` every time it is called.
///
/// The RNG is the only mutable state shared between loader workers.
pub struct TrajectoryDataset {
    sampler: Arc<TrajectorySampler>,
    rng:     Mutex<StdRng>,
}

impl TrajectoryDataset {
    pub fn new(sampler: TrajectorySampler, seed: u64) -> Self {
        Self {
            sampler: Arc::new(sampler),
            rng:     Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn episode_count(&self) -> usize { self.sampler.len() }

    pub fn sampler(&self) -> &TrajectorySampler { &self.sampler }
}

impl Dataset<TrainingExample> for TrajectoryDataset {
    /// A data contract violation aborts the sample with a panic:
    /// the Dataset trait cannot carry an error, and returning None
    /// would silently shorten the epoch.
    fn get(&self, index: usize) -> Option<TrainingExample> {
        if index >= self.sampler.len() {
            return None;
        }
        // A poisoned lock still holds a usable RNG
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        match self.sampler.sample(index, &mut *rng) {
            Ok(example) => Some(example),
            Err(e) => {
                tracing::error!("Sample {} violates the data contract: {}", index, e);
                panic!("sample {index} aborted: {e}");
            }
        }
    }

    fn len(&self) -> usize {
        self.sampler.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sampler::tests::{make_sampler, sampler_config};

    #[test]
    fn test_get_returns_one_example_per_episode() {
        let ds = TrajectoryDataset::new(make_sampler("demo_forward_01.json", 20, sampler_config(5), None), 1);
        assert_eq!(ds.len(), 1);
        let ex = ds.get(0).unwrap();
        assert_eq!(ex.is_pad.len(), 5);
        assert!(ds.get(1).is_none());
    }

    #[test]
    #[should_panic(expected = "aborted")]
    fn test_contract_violation_panics() {
        let mut cfg = sampler_config(5);
        cfg.image_width = 99;
        let ds = TrajectoryDataset::new(make_sampler("demo_forward_01.json", 20, cfg, None), 1);
        let _ = ds.get(0);
    }
}

// ============================================================
// Layer 4 — Joint-Space Min-Max Normalizer
// ============================================================
// Rescales each joint dimension from [min, max] to [-1, 1]:
//
//   x' = (x - min) / (max - min) * 2 - 1
//   x  = (x' + 1) / 2 * (max - min) + min
//
// Bounds come from configuration, one (min, max) pair per joint,
// and never change afterwards. A pair with min >= max is rejected
// at construction, since transform would divide by zero.
//
// Chunk processing (process_timestep) follows the recorded
// datasets' convention: validate, transform if in-bounds, and then
// store the clamp of the RAW value. The transform result is
// therefore discarded. BoundsHandling::ClampThenTransform gives the
// normalized alternative.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::domain::error::NormalizerError;

/// How a chunk timestep is brought into bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsHandling {
    /// validate → transform (if in bounds) → clamp raw value
    #[default]
    Legacy,
    /// clamp raw value → transform to [-1, 1]
    ClampThenTransform,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    min:      Vec<f32>,
    max:      Vec<f32>,
    handling: BoundsHandling,
}

impl Normalizer {
    /// Build from a bounds table with one (min, max) row per dimension.
    pub fn new(bounds: &[(f32, f32)]) -> Result<Self, NormalizerError> {
        if bounds.is_empty() {
            return Err(NormalizerError::EmptyBounds);
        }
        for (dim, &(min, max)) in bounds.iter().enumerate() {
            // NaN bounds compare as None and are rejected too
            if min.partial_cmp(&max) != Some(Ordering::Less) {
                return Err(NormalizerError::DegenerateBounds { dim, min, max });
            }
        }
        Ok(Self {
            min:      bounds.iter().map(|b| b.0).collect(),
            max:      bounds.iter().map(|b| b.1).collect(),
            handling: BoundsHandling::default(),
        })
    }

    pub fn with_handling(mut self, handling: BoundsHandling) -> Self {
        self.handling = handling;
        self
    }

    pub fn dims(&self) -> usize {
        self.min.len()
    }

    pub fn handling(&self) -> BoundsHandling {
        self.handling
    }

    /// Rescale `x` from [min, max] to [-1, 1] per dimension.
    pub fn transform(&self, x: &[f32]) -> Result<Vec<f32>, NormalizerError> {
        self.check_dims(x)?;
        Ok(x.iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(&v, (&lo, &hi))| (v - lo) / (hi - lo) * 2.0 - 1.0)
            .collect())
    }

    /// Exact inverse of `transform`.
    pub fn inverse_transform(&self, x: &[f32]) -> Result<Vec<f32>, NormalizerError> {
        self.check_dims(x)?;
        Ok(x.iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(&v, (&lo, &hi))| (v + 1.0) / 2.0 * (hi - lo) + lo)
            .collect())
    }

    /// True when every dimension lies strictly inside (min, max).
    pub fn validate_bounds(&self, x: &[f32]) -> Result<bool, NormalizerError> {
        self.check_dims(x)?;
        Ok(x.iter()
            .zip(self.min.iter().zip(&self.max))
            .all(|(&v, (&lo, &hi))| v > lo && v < hi))
    }

    /// Element-wise clip to [min, max].
    pub fn clamp(&self, x: &[f32]) -> Result<Vec<f32>, NormalizerError> {
        self.check_dims(x)?;
        Ok(x.iter()
            .zip(self.min.iter().zip(&self.max))
            .map(|(&v, (&lo, &hi))| v.max(lo).min(hi))
            .collect())
    }

    /// Bring one chunk timestep into bounds according to `handling`.
    pub fn process_timestep(&self, x: &[f32]) -> Result<Vec<f32>, NormalizerError> {
        match self.handling {
            // In-bounds values were transformed, then overwritten by the raw clamp.
            BoundsHandling::Legacy if self.validate_bounds(x)? => Ok(x.to_vec()),
            BoundsHandling::Legacy => self.clamp(x),
            BoundsHandling::ClampThenTransform => self.transform(&self.clamp(x)?),
        }
    }

    fn check_dims(&self, x: &[f32]) -> Result<(), NormalizerError> {
        if x.len() != self.dims() {
            return Err(NormalizerError::DimensionMismatch {
                expected: self.dims(),
                got:      x.len(),
            });
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Vec<(f32, f32)> {
        vec![(-1.0, 1.0), (0.0, 10.0), (-3.0, 3.0)]
    }

    fn assert_close(a: &[f32], b: &[f32]) {
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{a:?} != {b:?}");
        }
    }

    #[test]
    fn test_transform_maps_bounds_to_unit_range() {
        let n = Normalizer::new(&bounds()).unwrap();
        assert_close(&n.transform(&[-1.0, 0.0, -3.0]).unwrap(), &[-1.0, -1.0, -1.0]);
        assert_close(&n.transform(&[1.0, 10.0, 3.0]).unwrap(), &[1.0, 1.0, 1.0]);
        assert_close(&n.transform(&[0.0, 5.0, 0.0]).unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_round_trip() {
        let n = Normalizer::new(&bounds()).unwrap();
        for x in [[-0.5, 2.5, 1.0], [1.0, 0.0, -3.0], [0.123, 9.99, 0.001]] {
            let back = n.inverse_transform(&n.transform(&x).unwrap()).unwrap();
            assert_close(&back, &x);
        }
    }

    #[test]
    fn test_clamp_is_idempotent() {
        let n = Normalizer::new(&bounds()).unwrap();
        for x in [[-5.0, 20.0, 0.0], [0.5, -1.0, 100.0], [0.0, 5.0, 1.0]] {
            let once  = n.clamp(&x).unwrap();
            let twice = n.clamp(&once).unwrap();
            assert_eq!(once, twice);
        }
        assert_eq!(n.clamp(&[-5.0, 20.0, 0.0]).unwrap(), vec![-1.0, 10.0, 0.0]);
    }

    #[test]
    fn test_validate_bounds_is_strict() {
        let n = Normalizer::new(&bounds()).unwrap();
        assert!(n.validate_bounds(&[0.0, 5.0, 0.0]).unwrap());
        // Exactly on the boundary is not "within"
        assert!(!n.validate_bounds(&[1.0, 5.0, 0.0]).unwrap());
        assert!(!n.validate_bounds(&[0.0, 11.0, 0.0]).unwrap());
    }

    #[test]
    fn test_legacy_processing_keeps_raw_units() {
        let n = Normalizer::new(&bounds()).unwrap();
        // In bounds: stored untouched
        assert_eq!(n.process_timestep(&[0.5, 5.0, 0.0]).unwrap(), vec![0.5, 5.0, 0.0]);
        // Out of bounds: clamped in raw units
        assert_eq!(n.process_timestep(&[2.0, -1.0, 0.0]).unwrap(), vec![1.0, 0.0, 0.0]);
        assert!(matches!(
            n.process_timestep(&[0.5]),
            Err(NormalizerError::DimensionMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn test_clamp_then_transform() {
        let n = Normalizer::new(&bounds())
            .unwrap()
            .with_handling(BoundsHandling::ClampThenTransform);
        assert_close(&n.process_timestep(&[2.0, 5.0, 0.0]).unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_degenerate_bounds_rejected() {
        let err = Normalizer::new(&[(0.0, 1.0), (2.0, 2.0)]).unwrap_err();
        assert_eq!(err, NormalizerError::DegenerateBounds { dim: 1, min: 2.0, max: 2.0 });
        assert_eq!(Normalizer::new(&[]).unwrap_err(), NormalizerError::EmptyBounds);
    }

    #[test]
    fn test_dimension_mismatch() {
        let n = Normalizer::new(&bounds()).unwrap();
        assert!(matches!(
            n.transform(&[0.0]),
            Err(NormalizerError::DimensionMismatch { expected: 3, got: 1 })
        ));
    }
}

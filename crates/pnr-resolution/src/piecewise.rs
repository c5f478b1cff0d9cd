//! Time-of-flight data stitched from several incidence angles.
//!
//! Each angle covers a contiguous Q range. A segment applies from its
//! `q_start` up to the next segment's `q_start`; Q below the first start
//! uses the first segment.

use serde::{Deserialize, Serialize};

use crate::model::{validate_sigma, ResolutionError, ResolutionModel};
use crate::tof::TimeOfFlight;

/// One incidence angle and the Q range it was measured over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleSegment {
    /// Lower Q bound of this segment (Å⁻¹).
    pub q_start: f64,
    /// Incidence angle (rad).
    pub theta: f64,
    /// Angular divergence (rad).
    pub d_theta: f64,
}

/// Multi-angle time-of-flight resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PiecewiseTimeOfFlight {
    /// Segments ordered by `q_start`.
    pub segments: Vec<AngleSegment>,
    /// Wavelength spread (Å), shared by all segments.
    pub d_lambda: f64,
}

impl Default for PiecewiseTimeOfFlight {
    fn default() -> Self {
        Self {
            segments: vec![
                AngleSegment {
                    q_start: 0.0,
                    theta: 0.0068,
                    d_theta: 0.00032,
                },
                AngleSegment {
                    q_start: 0.03,
                    theta: 0.01,
                    d_theta: 0.00045,
                },
                AngleSegment {
                    q_start: 0.045,
                    theta: 0.017,
                    d_theta: 0.00075,
                },
            ],
            d_lambda: 0.005,
        }
    }
}

impl PiecewiseTimeOfFlight {
    pub fn new(mut segments: Vec<AngleSegment>, d_lambda: f64) -> Self {
        segments.sort_by(|a, b| a.q_start.total_cmp(&b.q_start));
        Self { segments, d_lambda }
    }

    fn segment_for(&self, q: f64) -> Option<&AngleSegment> {
        let after = self.segments.partition_point(|s| s.q_start <= q);
        self.segments.get(after.saturating_sub(1))
    }
}

impl ResolutionModel for PiecewiseTimeOfFlight {
    fn name(&self) -> &str {
        "piecewise time-of-flight"
    }

    fn sigma(&self, q: &[f64]) -> Result<Vec<f64>, ResolutionError> {
        let sigma: Vec<f64> = q
            .iter()
            .map(|&q| match self.segment_for(q) {
                Some(seg) => TimeOfFlight::sigma_at(q, seg.theta, seg.d_theta, self.d_lambda),
                // no segments at all
                None => f64::NAN,
            })
            .collect();
        validate_sigma(&sigma, q.len())?;
        Ok(sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_segments_select_angle() {
        let model = PiecewiseTimeOfFlight::default();
        let q = [0.01, 0.035, 0.1];
        let sigma = model.sigma(&q).unwrap();
        let expected = [
            TimeOfFlight::sigma_at(0.01, 0.0068, 0.00032, 0.005),
            TimeOfFlight::sigma_at(0.035, 0.01, 0.00045, 0.005),
            TimeOfFlight::sigma_at(0.1, 0.017, 0.00075, 0.005),
        ];
        for (s, e) in sigma.iter().zip(expected) {
            assert_relative_eq!(*s, e, max_relative = 1e-14);
        }
    }

    #[test]
    fn test_boundary_belongs_to_upper_segment() {
        let model = PiecewiseTimeOfFlight::default();
        assert_eq!(model.segment_for(0.03).map(|s| s.theta), Some(0.01));
        assert_eq!(model.segment_for(-1.0).map(|s| s.theta), Some(0.0068));
    }

    #[test]
    fn test_empty_model_is_invalid() {
        let model = PiecewiseTimeOfFlight::new(Vec::new(), 0.005);
        assert!(model.sigma(&[0.01]).is_err());
    }
}

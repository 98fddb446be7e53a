//! Terrain generalization: damping of fine Laplacian pyramid levels before
//! re-synthesis.

use crate::core::laplacian::LaplacianPyramid;
use crate::core::operator::ScaleToRangeOperator;
use crate::grid::Grid;
use crate::types::{ReliefError, ReliefResult};
use serde::{Deserialize, Serialize};

/// Parameters of the generalization weight curve
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralizationParams {
    /// Number of fine levels that are damped. 0 disables generalization.
    pub max_levels: usize,
    /// Amount of detail kept in the damped levels, in `[-1, 1]`. With -1
    /// all damped levels keep full weight, with 1 they are removed.
    pub details: f64,
}

impl Default for GeneralizationParams {
    fn default() -> Self {
        Self {
            max_levels: 0,
            details: -0.8,
        }
    }
}

impl GeneralizationParams {
    pub fn validate(&self) -> ReliefResult<()> {
        if !(-1.0..=1.0).contains(&self.details) {
            return Err(ReliefError::InvalidArgument(format!(
                "generalization details must be in [-1, 1], got {}",
                self.details
            )));
        }
        Ok(())
    }

    /// Weight in `[0, 1]` of Laplacian level `level`.
    pub fn level_weight(&self, level: usize) -> f32 {
        if self.max_levels == 0 || level >= self.max_levels {
            return 1.0;
        }
        if self.details == 1.0 {
            return 0.0;
        }

        // line w = m * level + c
        let max_levels = self.max_levels as f64;
        let (m, c) = if self.details > 0.0 {
            // crosses zero at level = details * max_levels
            (
                1.0 / (max_levels * (1.0 - self.details)),
                self.details / (self.details - 1.0),
            )
        } else {
            ((1.0 + self.details) / max_levels, -self.details)
        };
        (m * level as f64 + c).clamp(0.0, 1.0) as f32
    }

    /// Weights for a pyramid with `level_count` levels.
    pub fn weights(&self, level_count: usize) -> ReliefResult<Vec<f32>> {
        self.validate()?;
        Ok((0..level_count).map(|i| self.level_weight(i)).collect())
    }
}

/// Re-synthesize a generalized grid from `pyramid` and rescale it to
/// `range` (usually the min/max of the original grid).
pub fn generalize(
    pyramid: &LaplacianPyramid,
    params: &GeneralizationParams,
    range: (f32, f32),
) -> ReliefResult<Grid> {
    let weights = params.weights(pyramid.level_count())?;
    log::info!(
        "Generalizing {} levels with details {}",
        params.max_levels,
        params.details
    );
    let sum = pyramid.sum_levels(Some(&weights))?;
    Ok(ScaleToRangeOperator::new(range.0, range.1).operate(&sum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gaussian::GaussianPyramid;
    use approx::assert_relative_eq;

    #[test]
    fn test_disabled_generalization_keeps_all_levels() {
        let params = GeneralizationParams::default();
        assert_eq!(params.weights(5).unwrap(), vec![1.0; 5]);
    }

    #[test]
    fn test_levels_beyond_max_levels_have_full_weight() {
        let params = GeneralizationParams {
            max_levels: 3,
            details: 0.5,
        };
        let w = params.weights(6).unwrap();
        assert_eq!(&w[3..], &[1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_details_one_removes_damped_levels() {
        let params = GeneralizationParams {
            max_levels: 2,
            details: 1.0,
        };
        assert_eq!(params.weights(4).unwrap(), vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_negative_details_line() {
        let params = GeneralizationParams {
            max_levels: 4,
            details: -0.8,
        };
        // c = 0.8, m = 0.05
        assert_relative_eq!(params.level_weight(0), 0.8);
        assert_relative_eq!(params.level_weight(2), 0.9);
        let params = GeneralizationParams {
            max_levels: 4,
            details: -1.0,
        };
        assert_relative_eq!(params.level_weight(1), 1.0);
    }

    #[test]
    fn test_positive_details_line_is_clamped() {
        let params = GeneralizationParams {
            max_levels: 4,
            details: 0.5,
        };
        // m = 0.5, c = -1
        assert_relative_eq!(params.level_weight(0), 0.0);
        assert_relative_eq!(params.level_weight(2), 0.0);
        assert_relative_eq!(params.level_weight(3), 0.5);
    }

    #[test]
    fn test_details_out_of_range() {
        let params = GeneralizationParams {
            max_levels: 2,
            details: 1.5,
        };
        assert!(params.weights(3).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_generalize_keeps_value_range() {
        let mut grid = Grid::new(32, 32, 10.0).unwrap();
        for row in 0..32 {
            for col in 0..32 {
                let v = (col as f32 * 0.7).sin() * 50.0 + row as f32 * 3.0;
                grid.set_value(col, row, v);
            }
        }
        let range = grid.min_max();
        let gaussian = GaussianPyramid::with_default_params(grid).unwrap();
        let laplacian = LaplacianPyramid::from_gaussian(&gaussian).unwrap();
        let params = GeneralizationParams {
            max_levels: 2,
            details: 0.0,
        };
        let generalized = generalize(&laplacian, &params, range).unwrap();
        let (min, max) = generalized.min_max();
        assert_relative_eq!(min, range.0, epsilon = 1e-3);
        assert_relative_eq!(max, range.1, epsilon = 1e-3);
    }
}

// THEORY:
// The scorer condenses a pair of images into one number: the mutual information of
// their binned intensity distributions,
//
//     MI = sum_i sum_j pxy[i, j] * log2(pxy[i, j] / (px[i] * py[j]))
//
// The joint PMF is additive by default (see `histogram`), so the score depends on the
// two images only through their marginals. The co-occurrence strategy is the textbook
// construction and is offered as a labelled alternative.
//
// A term whose marginal bucket is empty is undefined. `ZeroMassPolicy::Skip`
// contributes nothing for such terms; `ZeroMassPolicy::Reject` treats the first one as
// a fatal domain error naming the bucket pair. An empty joint cell over non-empty
// marginals follows the usual 0 * log(0) = 0 convention under both policies. The score
// is not normalised and may be negative.

use crate::core_modules::histogram::{
    BinLayout, BinSize, JointPmf, MarginalPmf, co_occurrence_pmf, joint_pmf, marginal_pmf,
};
use crate::core_modules::image_grid::IntensityImage;
use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};

/// How the joint PMF is built from the two images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JointStrategy {
    /// `x[i] + y[j]`, renormalised. Matches historical traces.
    #[default]
    Additive,
    /// Per-pixel bucket-pair counts.
    CoOccurrence,
}

/// What to do with a term whose marginal bucket holds no mass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZeroMassPolicy {
    #[default]
    Skip,
    Reject,
}

/// The score together with the signed contribution of every bucket pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MiBreakdown {
    pub score: f64,
    /// Row-major `x_bins * y_bins` grid of per-term contributions.
    pub contributions: Vec<f64>,
    pub x_bins: usize,
    pub y_bins: usize,
}

impl MiBreakdown {
    pub fn contribution(&self, x_bin: usize, y_bin: usize) -> f64 {
        self.contributions[x_bin * self.y_bins + y_bin]
    }
}

/// Mutual information scorer for a fixed bucket configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MutualInformation {
    pub bin_size: BinSize,
    pub layout: BinLayout,
    pub joint: JointStrategy,
    pub zero_mass: ZeroMassPolicy,
}

impl MutualInformation {
    pub fn new(bin_size: BinSize) -> Self {
        Self {
            bin_size,
            ..Self::default()
        }
    }

    pub fn with_layout(mut self, layout: BinLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_joint(mut self, joint: JointStrategy) -> Self {
        self.joint = joint;
        self
    }

    pub fn with_zero_mass(mut self, zero_mass: ZeroMassPolicy) -> Self {
        self.zero_mass = zero_mass;
        self
    }

    pub fn score(&self, image_a: &IntensityImage, image_b: &IntensityImage) -> Result<f64> {
        self.breakdown(image_a, image_b).map(|b| b.score)
    }

    pub fn breakdown(
        &self,
        image_a: &IntensityImage,
        image_b: &IntensityImage,
    ) -> Result<MiBreakdown> {
        let px = marginal_pmf(image_a, self.bin_size, self.layout)?;
        let py = marginal_pmf(image_b, self.bin_size, self.layout)?;
        let pxy = match self.joint {
            JointStrategy::Additive => joint_pmf(&px, &py)?,
            JointStrategy::CoOccurrence => {
                co_occurrence_pmf(image_a, image_b, self.bin_size, self.layout)?
            }
        };
        self.score_pmfs(&px, &py, &pxy)
    }

    /// Accumulates the score from already estimated PMFs.
    pub fn score_pmfs(
        &self,
        px: &MarginalPmf,
        py: &MarginalPmf,
        pxy: &JointPmf,
    ) -> Result<MiBreakdown> {
        if pxy.rows() != px.len() || pxy.cols() != py.len() {
            return Err(AlignError::shape(format!(
                "joint PMF is {}x{} but the marginals have {} and {} buckets",
                pxy.rows(),
                pxy.cols(),
                px.len(),
                py.len()
            )));
        }

        let mut contributions = vec![0.0; px.len() * py.len()];
        let mut score = 0.0;
        for i in 0..px.len() {
            for j in 0..py.len() {
                let joint = pxy.get(i, j);
                let term = match (px.mass(i), py.mass(j)) {
                    (Some(x), Some(y)) if joint > 0.0 => joint * (joint / (x * y)).log2(),
                    // 0 * log(0) is taken as 0.
                    (Some(_), Some(_)) => 0.0,
                    _ => match self.zero_mass {
                        ZeroMassPolicy::Skip => 0.0,
                        ZeroMassPolicy::Reject => {
                            return Err(AlignError::domain(format!(
                                "zero-mass bucket at (x bin {i}, y bin {j}): \
                                 pxy={joint}, px={}, py={}",
                                px.probabilities()[i],
                                py.probabilities()[j]
                            )));
                        }
                    },
                };
                contributions[i * py.len() + j] = term;
                score += term;
            }
        }

        Ok(MiBreakdown {
            score,
            contributions,
            x_bins: px.len(),
            y_bins: py.len(),
        })
    }
}

// THEORY:
// The `pipeline` module is the top-level API of the registration engine. It wires the
// core modules into the exhaustive shift scan:
//
//     source image -> prepare -> for shift in 0..=40 { window -> score } -> ResultSeries
//
// Each shift is scored independently with a full histogram recomputation; nothing is
// memoised or shared between iterations. A failure at any shift aborts the run and is
// reported with that shift's index. Choosing the "best" shift from the series is left
// to the caller: the series exposes both its minimum and its maximum.

use crate::core_modules::image_grid::RgbImage;
use crate::core_modules::mutual_information::MutualInformation;
use crate::core_modules::overlap::window;
use crate::core_modules::preprocess::prepare;
use crate::error::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};

// Re-export key data structures for the public API.
pub use crate::core_modules::histogram::{BinLayout, BinSize};
pub use crate::core_modules::mutual_information::{JointStrategy, MiBreakdown, ZeroMassPolicy};
pub use crate::core_modules::overlap::{MAX_SHIFT, SHIFT_COUNT, Shift};
pub use crate::core_modules::preprocess::PreparedPair;

/// Configuration for a registration run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Raw intensities merged per bucket. Historical runs mostly used 3.
    pub bin_size: BinSize,
    pub layout: BinLayout,
    pub joint: JointStrategy,
    pub zero_mass: ZeroMassPolicy,
}

impl RegistrationConfig {
    pub fn with_bin_size(bin_size: BinSize) -> Self {
        Self {
            bin_size,
            ..Self::default()
        }
    }

    pub fn scorer(&self) -> MutualInformation {
        MutualInformation::new(self.bin_size)
            .with_layout(self.layout)
            .with_joint(self.joint)
            .with_zero_mass(self.zero_mass)
    }
}

/// The score obtained for one shift hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShiftScore {
    pub shift: Shift,
    pub score: f64,
}

/// Which extreme of the series counts as the registration answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Selection {
    /// Lowest score. This is what historical experiment reports used.
    #[default]
    Minimum,
    /// Highest score, the conventional choice for MI registration.
    Maximum,
}

/// Ordered `(shift, score)` pairs of one run, ascending by shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSeries {
    entries: Vec<ShiftScore>,
}

impl ResultSeries {
    pub(crate) fn from_scores(scores: Vec<f64>) -> Self {
        Self {
            entries: scores
                .into_iter()
                .enumerate()
                .map(|(shift, score)| ShiftScore { shift, score })
                .collect(),
        }
    }

    pub fn entries(&self) -> &[ShiftScore] {
        &self.entries
    }

    pub fn scores(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.score).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry with the lowest score.
    pub fn argmin(&self) -> Option<ShiftScore> {
        self.first_extreme(|candidate, best| candidate.total_cmp(&best).is_lt())
    }

    /// First entry with the highest score.
    pub fn argmax(&self) -> Option<ShiftScore> {
        self.first_extreme(|candidate, best| candidate.total_cmp(&best).is_gt())
    }

    pub fn select(&self, selection: Selection) -> Option<ShiftScore> {
        match selection {
            Selection::Minimum => self.argmin(),
            Selection::Maximum => self.argmax(),
        }
    }

    fn first_extreme(&self, better: impl Fn(f64, f64) -> bool) -> Option<ShiftScore> {
        self.entries.iter().copied().fold(None, |best, entry| match best {
            Some(current) if !better(entry.score, current.score) => Some(current),
            _ => Some(entry),
        })
    }
}

/// Runs the exhaustive shift scan with a fixed configuration.
#[derive(Debug, Clone)]
pub struct RegistrationPipeline {
    config: RegistrationConfig,
    scorer: MutualInformation,
}

impl RegistrationPipeline {
    pub fn new(config: RegistrationConfig) -> Self {
        Self {
            scorer: config.scorer(),
            config,
        }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    pub fn register(&self, image: &RgbImage) -> Result<ResultSeries> {
        self.register_prepared(&prepare(image)?)
    }

    pub fn register_prepared(&self, pair: &PreparedPair) -> Result<ResultSeries> {
        info!(
            "Scanning {SHIFT_COUNT} shifts: reference {}x{}, comparison {}x{}, bin size {}",
            pair.reference.height(),
            pair.reference.width(),
            pair.comparison.height(),
            pair.comparison.width(),
            self.config.bin_size.get()
        );
        let scores = (0..SHIFT_COUNT)
            .map(|shift| score_shift(&self.scorer, pair, shift))
            .collect::<Result<Vec<_>>>()?;
        Ok(ResultSeries::from_scores(scores))
    }

    /// Score plus per-bucket contributions for one shift, for visualisation.
    pub fn breakdown_at(&self, pair: &PreparedPair, shift: Shift) -> Result<MiBreakdown> {
        window(&pair.reference, &pair.comparison, shift)
            .and_then(|region| self.scorer.breakdown(&pair.reference, &region))
            .map_err(|e| e.at_shift(shift))
    }
}

/// Scores a single shift hypothesis. Errors carry the shift index.
pub fn score_shift(scorer: &MutualInformation, pair: &PreparedPair, shift: Shift) -> Result<f64> {
    let score = window(&pair.reference, &pair.comparison, shift)
        .and_then(|region| scorer.score(&pair.reference, &region))
        .map_err(|e| e.at_shift(shift))?;
    debug!("shift {shift}: MI {score}");
    Ok(score)
}

/// Registers `image` with `config`; see [`RegistrationPipeline::register`].
pub fn register(image: &RgbImage, config: &RegistrationConfig) -> Result<ResultSeries> {
    RegistrationPipeline::new(*config).register(image)
}

// THEORY:
// This file is the main entry point for the `mi_align` library crate. It exposes the
// registration engine: given one RGB source image, estimate the horizontal shift
// between its green and red channels by scanning 41 shift hypotheses and scoring each
// with histogram-based mutual information.
//
// The high-level interface is `pipeline` (sequential scan), `parallel_pipeline` (the
// same scan over a worker pool) and `experiment` (file-to-report runs with optional
// synthetic noise). The building blocks live in `core_modules` and are public so the
// individual stages can be tested and reused on their own.

pub mod core_modules;
pub mod error;
pub mod experiment;
pub mod parallel_pipeline;
pub mod pipeline;

pub use error::{AlignError, Result};

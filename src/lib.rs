// THEORY:
// This file is the main entry point for the `patch_extraction` library crate.
// It exposes the `PatchPipeline` (and its parallel sibling) as the high-level
// interface, and the individual components for callers that want to drive the
// stages themselves:
//
// - `core_modules::preprocess`: color frame -> binary foreground `Mask`
// - `core_modules::window_locator`: `Mask` -> non-overlapping square `Window`s
// - `core_modules::cluster_builder`: `Window`s -> spatial `Cluster`s
// - `core_modules::histogram`: grayscale patch -> `OrientationHistogram`
//
// The core works on in-memory buffers only. Decoding, encoding and display are
// left to the caller (the bundled binary is one such caller).

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use crate::core_modules::cluster_builder::{Cluster, ClusterStrategy};
pub use crate::core_modules::histogram::OrientationHistogram;
pub use crate::core_modules::mask::Mask;
pub use crate::core_modules::preprocess::{ChannelDifferencePreprocessor, MaskPreprocessor};
pub use crate::core_modules::window::Window;
pub use crate::core_modules::window_locator::{FitMode, LocatorParams};
pub use crate::error::{PatchError, Result};
pub use crate::parallel_pipeline::ParallelPipeline;
pub use crate::pipeline::{PatchPipeline, PatchReport, PipelineConfig, StageTimings};

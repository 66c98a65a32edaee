// THEORY:
// The `pipeline` module is the top-level API of the crate. It chains the
// components in the order they depend on each other and hands back a single
// report for one frame:
//
//   color frame -> Mask Preprocessor -> Window Locator -> Cluster Builder
//                                               \-> Histogram Engine (per window)
//
// The pipeline owns nothing but its configuration and its preprocessor. Each call
// to `process` borrows the frame, builds fresh results and keeps no state, so a
// single `PatchPipeline` can be shared between threads (see `parallel_pipeline`).
// Every stage is timed and the timings are logged at debug level and returned
// with the report.

use crate::core_modules::cluster_builder::{
    Cluster, ClusterStrategy, DEFAULT_PROXIMITY_THRESHOLD, cluster_builder,
};
use crate::core_modules::histogram::{
    DEFAULT_BIN_SIZE, OrientationHistogram, compute_orientation_histogram, validate_bin_size,
};
use crate::core_modules::mask::Mask;
use crate::core_modules::patch::extract_patch;
use crate::core_modules::preprocess::{
    ChannelDifferencePreprocessor, MaskPreprocessor, ensure_frame_size,
};
use crate::core_modules::window::Window;
use crate::core_modules::window_locator::{
    DEFAULT_SAMPLE_STRIDE, FitMode, LocatorParams, window_locator,
};
use crate::error::{PatchError, Result};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

pub const DEFAULT_WINDOW_SIZE: u32 = 75;
pub const DEFAULT_ROW_STRIDE: u32 = 10;

/// Configuration for the PatchPipeline, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Edge length of every sampled window, in pixels.
    pub window_size: u32,
    /// Vertical scan decimation: only every `row_stride`-th row anchors windows.
    pub row_stride: u32,
    pub fit_mode: FitMode,
    /// Spacing of the edge samples used by `FitMode::Sparse`.
    pub sample_stride: u32,
    /// Maximum centroid distance for two windows to be connected.
    pub proximity_threshold: f64,
    pub cluster_strategy: ClusterStrategy,
    /// Angular bin width of the orientation histograms, a divisor of 360.
    pub bin_size: u32,
    /// When false, `process` skips the histogram stage entirely.
    pub compute_histograms: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            row_stride: DEFAULT_ROW_STRIDE,
            fit_mode: FitMode::Sparse,
            sample_stride: DEFAULT_SAMPLE_STRIDE,
            proximity_threshold: DEFAULT_PROXIMITY_THRESHOLD,
            cluster_strategy: ClusterStrategy::Legacy,
            bin_size: DEFAULT_BIN_SIZE,
            compute_histograms: true,
        }
    }
}

impl PipelineConfig {
    pub fn locator_params(&self) -> LocatorParams {
        LocatorParams {
            window_size: self.window_size,
            row_stride: self.row_stride,
            fit_mode: self.fit_mode,
            sample_stride: self.sample_stride,
        }
    }

    /// Fails fast on any out-of-range value so no stage starts with bad input.
    pub fn validate(&self) -> Result<()> {
        self.locator_params().validate()?;
        if !self.proximity_threshold.is_finite() || self.proximity_threshold < 0.0 {
            return Err(PatchError::parameter(
                "proximity_threshold",
                format!(
                    "must be a finite, non-negative distance, got {}",
                    self.proximity_threshold
                ),
            ));
        }
        validate_bin_size(self.bin_size)
    }
}

/// Wall-clock time spent in each stage of one `process` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub threshold: Duration,
    pub cleanup: Duration,
    pub locate: Duration,
    pub cluster: Duration,
    pub histograms: Duration,
}

impl StageTimings {
    pub fn total(&self) -> Duration {
        self.threshold + self.cleanup + self.locate + self.cluster + self.histograms
    }
}

/// Everything the pipeline learned about one frame.
#[derive(Debug, Clone, Serialize)]
pub struct PatchReport {
    /// The cleaned mask the windows were located on.
    #[serde(skip)]
    pub mask: Mask,
    /// Accepted windows in discovery order.
    pub windows: Vec<Window>,
    /// Spatial grouping of `windows`; every window appears in exactly one cluster.
    pub clusters: Vec<Cluster>,
    /// One histogram per window, in window order. Empty when histograms are disabled.
    pub histograms: Vec<OrientationHistogram>,
    pub timings: StageTimings,
}

impl PatchReport {
    /// Clusters that still hold at least one window.
    pub fn occupied_clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|c| !c.is_empty())
    }
}

/// The main, top-level struct for patch extraction.
pub struct PatchPipeline<P = ChannelDifferencePreprocessor> {
    config: PipelineConfig,
    preprocessor: P,
}

impl PatchPipeline<ChannelDifferencePreprocessor> {
    /// A pipeline using the default green-over-red preprocessor.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_preprocessor(config, ChannelDifferencePreprocessor::default())
    }
}

impl<P: MaskPreprocessor> PatchPipeline<P> {
    pub fn with_preprocessor(config: PipelineConfig, preprocessor: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            preprocessor,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn preprocessor(&self) -> &P {
        &self.preprocessor
    }

    /// Runs every stage on one color frame.
    pub fn process(&self, image: &RgbImage) -> Result<PatchReport> {
        if image.width() == 0 || image.height() == 0 {
            return Err(PatchError::DegenerateInput(format!(
                "{}x{} frame has no pixels",
                image.width(),
                image.height()
            )));
        }
        if self.config.window_size > image.width().min(image.height()) {
            log::warn!(
                "window size {} does not fit a {}x{} frame",
                self.config.window_size,
                image.width(),
                image.height()
            );
        }
        let mut timings = StageTimings::default();

        // Stage 1: Threshold
        let started = Instant::now();
        let raw = self.preprocessor.threshold(image)?;
        timings.threshold = started.elapsed();
        log::debug!("threshold completed in {:?}", timings.threshold);

        // Stage 2: Morphological cleanup
        let started = Instant::now();
        let mask = self.preprocessor.cleanup(&raw)?;
        timings.cleanup = started.elapsed();
        log::debug!("cleanup completed in {:?}", timings.cleanup);
        ensure_frame_size(image, &mask)?;

        // Stage 3: Window search
        let started = Instant::now();
        let windows = window_locator::locate(&mask, &self.config.locator_params())?;
        timings.locate = started.elapsed();
        log::debug!("found {} windows in {:?}", windows.len(), timings.locate);

        // Stage 4: Spatial grouping
        let started = Instant::now();
        let clusters = cluster_builder::cluster_with(
            &windows,
            self.config.proximity_threshold,
            self.config.cluster_strategy,
        )?;
        timings.cluster = started.elapsed();
        log::debug!("found {} clusters in {:?}", clusters.len(), timings.cluster);

        // Stage 5: Descriptors
        let histograms = if self.config.compute_histograms {
            let started = Instant::now();
            let gray = image::imageops::grayscale(image);
            let histograms = self.describe(&gray, &windows)?;
            timings.histograms = started.elapsed();
            log::debug!(
                "computed {} histograms in {:?}",
                histograms.len(),
                timings.histograms
            );
            histograms
        } else {
            Vec::new()
        };

        log::debug!("frame processed in {:?}", timings.total());
        Ok(PatchReport {
            mask,
            windows,
            clusters,
            histograms,
            timings,
        })
    }

    /// Locates and groups windows on a mask produced elsewhere.
    pub fn process_mask(&self, mask: &Mask) -> Result<(Vec<Window>, Vec<Cluster>)> {
        let windows = window_locator::locate(mask, &self.config.locator_params())?;
        let clusters = cluster_builder::cluster_with(
            &windows,
            self.config.proximity_threshold,
            self.config.cluster_strategy,
        )?;
        Ok((windows, clusters))
    }

    /// Computes one histogram per window over a grayscale frame.
    pub fn describe(&self, gray: &GrayImage, windows: &[Window]) -> Result<Vec<OrientationHistogram>> {
        windows
            .iter()
            .map(|w| {
                let patch = extract_patch(gray, w)?;
                compute_orientation_histogram(&patch, self.config.bin_size)
            })
            .collect()
    }
}

// THEORY:
// Every stage of the patch pipeline is a pure function of one frame, so batches
// parallelise cleanly at frame granularity (and the histogram stage at patch
// granularity). The `ParallelPipeline` exploits that without touching the
// algorithms themselves: each unit of work runs the ordinary sequential code on
// tokio's blocking pool, and a semaphore sized to the machine caps how many run
// at once.
//
// Results always come back in input order, independent of which worker finished
// first, and one failing frame does not poison the rest of the batch.

use crate::core_modules::histogram::{OrientationHistogram, compute_orientation_histogram};
use crate::core_modules::patch::extract_patch;
use crate::core_modules::preprocess::{ChannelDifferencePreprocessor, MaskPreprocessor};
use crate::core_modules::window::Window;
use crate::error::{PatchError, Result};
use crate::pipeline::{PatchPipeline, PatchReport, PipelineConfig};
use futures::future::join_all;
use image::{GrayImage, RgbImage};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct ParallelPipeline<P = ChannelDifferencePreprocessor> {
    pipeline: Arc<PatchPipeline<P>>,
    permits: Arc<Semaphore>,
    workers: usize,
}

impl ParallelPipeline<ChannelDifferencePreprocessor> {
    /// One worker per logical CPU.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self::from_pipeline(PatchPipeline::new(config)?, num_cpus::get()))
    }
}

impl<P> ParallelPipeline<P>
where
    P: MaskPreprocessor + Send + Sync + 'static,
{
    pub fn from_pipeline(pipeline: PatchPipeline<P>, workers: usize) -> Self {
        let workers = workers.max(1);
        Self {
            pipeline: Arc::new(pipeline),
            permits: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn pipeline(&self) -> &PatchPipeline<P> {
        &self.pipeline
    }

    /// Processes every frame, returning one result per frame in input order.
    pub async fn process_images(&self, images: Vec<RgbImage>) -> Vec<Result<PatchReport>> {
        log::debug!(
            "processing {} frames on {} workers",
            images.len(),
            self.workers
        );
        let jobs = images.into_iter().enumerate().map(|(index, image)| {
            let pipeline = Arc::clone(&self.pipeline);
            self.run_blocking(move || {
                log::trace!("frame {} started", index);
                pipeline.process(&image)
            })
        });
        join_all(jobs).await
    }

    /// Computes one histogram per window over `gray`, in window order.
    pub async fn histograms(
        &self,
        gray: Arc<GrayImage>,
        windows: &[Window],
    ) -> Result<Vec<OrientationHistogram>> {
        let bin_size = self.pipeline.config().bin_size;
        let jobs = windows.iter().copied().map(|window| {
            let gray = Arc::clone(&gray);
            self.run_blocking(move || {
                let patch = extract_patch(gray.as_ref(), &window)?;
                compute_orientation_histogram(&patch, bin_size)
            })
        });
        join_all(jobs).await.into_iter().collect()
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| PatchError::WorkerFailed(e.to_string()))?;
        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| PatchError::WorkerFailed(e.to_string()))?
    }
}

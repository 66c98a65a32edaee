use approx::assert_relative_eq;
use image::{Rgb, RgbImage};
use patch_extraction::core_modules::cluster_builder::cluster_builder;
use patch_extraction::core_modules::window_locator::window_locator;
use patch_extraction::{
    ClusterStrategy, FitMode, Mask, MaskPreprocessor, ParallelPipeline, PatchPipeline,
    PipelineConfig, Window,
};
use std::collections::HashSet;

const SOIL: Rgb<u8> = Rgb([120, 95, 70]);

/// Two textured canopy blocks far apart on bare soil.
fn two_plots() -> RgbImage {
    RgbImage::from_fn(500, 450, |x, y| {
        let in_a = (20..140).contains(&x) && (20..140).contains(&y);
        let in_b = (360..480).contains(&x) && (300..420).contains(&y);
        if in_a || in_b {
            Rgb([40, 150 + ((x * 7 + y * 13) % 60) as u8, 30])
        } else {
            SOIL
        }
    })
}

fn config(strategy: ClusterStrategy, fit_mode: FitMode) -> PipelineConfig {
    PipelineConfig {
        window_size: 30,
        row_stride: 10,
        fit_mode,
        cluster_strategy: strategy,
        ..Default::default()
    }
}

fn canopy_mask(pipeline: &PatchPipeline, image: &RgbImage) -> Mask {
    pipeline.preprocessor().preprocess(image).unwrap()
}

fn assert_report_invariants(windows: &[Window], clusters: &[patch_extraction::Cluster], mask: &Mask) {
    for (i, a) in windows.iter().enumerate() {
        assert!(a.fits_within(mask.width(), mask.height()));
        for b in &windows[i + 1..] {
            assert!(!a.intersects(b), "{a:?} overlaps {b:?}");
        }
    }

    let mut seen = HashSet::new();
    for cluster in clusters {
        for w in cluster.iter() {
            assert!(seen.insert(*w), "{w:?} appears in two clusters");
        }
    }
    assert_eq!(seen.len(), windows.len());
}

#[test]
fn two_plots_form_two_clusters() {
    let _ = env_logger::builder().is_test(true).try_init();

    for strategy in [ClusterStrategy::Legacy, ClusterStrategy::UnionFind] {
        for fit_mode in [FitMode::Sparse, FitMode::Exhaustive] {
            let pipeline = PatchPipeline::new(config(strategy, fit_mode)).unwrap();
            let report = pipeline.process(&two_plots()).unwrap();

            assert!(!report.windows.is_empty());
            assert_report_invariants(&report.windows, &report.clusters, &report.mask);
            assert_eq!(report.occupied_clusters().count(), 2, "{strategy:?} / {fit_mode:?}");

            // Every window sits entirely on canopy.
            for w in &report.windows {
                for y in w.y..w.bottom() {
                    for x in w.x..w.right() {
                        assert!(report.mask.is_foreground(x, y));
                    }
                }
            }
        }
    }
}

#[test]
fn histograms_describe_every_window() {
    let pipeline = PatchPipeline::new(config(ClusterStrategy::Legacy, FitMode::Sparse)).unwrap();
    let report = pipeline.process(&two_plots()).unwrap();

    assert_eq!(report.histograms.len(), report.windows.len());
    for histogram in &report.histograms {
        assert_eq!(histogram.bin_count(), 12);
        assert!(!histogram.is_flat());
        assert_relative_eq!(histogram.intensity.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        let peak = histogram.intensity[0];
        assert!(histogram.intensity.iter().all(|&v| v <= peak));
    }
}

#[test]
fn components_can_be_driven_individually() {
    let pipeline = PatchPipeline::new(config(ClusterStrategy::Legacy, FitMode::Sparse)).unwrap();
    let mask = canopy_mask(&pipeline, &two_plots());

    let windows = window_locator::locate(&mask, &pipeline.config().locator_params()).unwrap();
    let clusters = cluster_builder::cluster(&windows, 82.0).unwrap();
    let report = pipeline.process(&two_plots()).unwrap();

    assert_eq!(windows, report.windows);
    assert_eq!(clusters, report.clusters);
}

#[test]
fn inverted_mask_samples_the_soil() {
    let pipeline = PatchPipeline::new(config(ClusterStrategy::UnionFind, FitMode::Exhaustive)).unwrap();
    let canopy = canopy_mask(&pipeline, &two_plots());
    let soil = canopy.inverted();

    let (windows, clusters) = pipeline.process_mask(&soil).unwrap();
    assert!(!windows.is_empty());
    assert_report_invariants(&windows, &clusters, &soil);
    for w in &windows {
        assert!(!canopy.is_foreground(w.x, w.y));
    }
}

#[tokio::test]
async fn parallel_batch_matches_sequential_runs() {
    let config = config(ClusterStrategy::Legacy, FitMode::Sparse);
    let sequential = PatchPipeline::new(config.clone()).unwrap();
    let frames = vec![two_plots(), RgbImage::from_pixel(64, 64, SOIL), two_plots()];

    let expected: Vec<_> = frames.iter().map(|f| sequential.process(f).unwrap()).collect();
    let parallel = ParallelPipeline::new(config).unwrap();
    let reports = parallel.process_images(frames).await;

    assert_eq!(reports.len(), expected.len());
    for (got, want) in reports.into_iter().zip(expected) {
        let got = got.unwrap();
        assert_eq!(got.windows, want.windows);
        assert_eq!(got.clusters, want.clusters);
        assert_eq!(got.histograms, want.histograms);
    }
}

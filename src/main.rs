// Command-line driver: decodes images from disk, runs them through the parallel
// pipeline and prints what was found. Decoding and encoding live here only; the
// library itself never touches files.

use anyhow::Context;
use clap::Parser;
use image::{Rgb, RgbImage};
use patch_extraction::{
    Cluster, ClusterStrategy, FitMode, ParallelPipeline, PatchPipeline, PatchReport,
    PipelineConfig, Window,
};
use serde::Serialize;
use std::path::{Path, PathBuf};

// Outline colours, cycled by cluster index.
const PALETTE: [Rgb<u8>; 6] = [
    Rgb([255, 0, 0]),
    Rgb([0, 128, 255]),
    Rgb([255, 200, 0]),
    Rgb([255, 0, 255]),
    Rgb([0, 255, 255]),
    Rgb([255, 255, 255]),
];
const OUTLINE_THICKNESS: u32 = 2;

#[derive(Parser, Debug)]
#[command(name = "patch_extraction", about = "Sample, cluster and describe vegetation patches")]
struct Args {
    /// Color images to process.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// JSON file with a `PipelineConfig`; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    window_size: Option<u32>,

    #[arg(long)]
    row_stride: Option<u32>,

    #[arg(long)]
    proximity: Option<f64>,

    #[arg(long)]
    bin_size: Option<u32>,

    /// Verify every pixel of a candidate window instead of sampling its edges.
    #[arg(long)]
    exhaustive: bool,

    /// Use order-independent connected components instead of the legacy grouping.
    #[arg(long)]
    union_find: bool,

    #[arg(long)]
    no_histograms: bool,

    /// Directory receiving one `<name>_patches.png` per input, with window
    /// outlines coloured by cluster.
    #[arg(long)]
    overlay_dir: Option<PathBuf>,

    /// Print full reports as JSON lines instead of a summary.
    #[arg(long)]
    json: bool,

    /// Worker threads; defaults to the number of logical CPUs.
    #[arg(long)]
    workers: Option<usize>,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    input: &'a Path,
    #[serde(flatten)]
    report: &'a PatchReport,
}

fn build_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(v) = args.window_size {
        config.window_size = v;
    }
    if let Some(v) = args.row_stride {
        config.row_stride = v;
    }
    if let Some(v) = args.proximity {
        config.proximity_threshold = v;
    }
    if let Some(v) = args.bin_size {
        config.bin_size = v;
    }
    if args.exhaustive {
        config.fit_mode = FitMode::Exhaustive;
    }
    if args.union_find {
        config.cluster_strategy = ClusterStrategy::UnionFind;
    }
    if args.no_histograms {
        config.compute_histograms = false;
    }
    Ok(config)
}

/// Draws a hollow rectangle for every window, clipped to the image. Windows of
/// the same cluster share a colour.
fn draw_outlines(image: &mut RgbImage, clusters: &[Cluster]) {
    for (index, cluster) in clusters.iter().enumerate() {
        let colour = PALETTE[index % PALETTE.len()];
        for window in cluster.iter() {
            draw_outline(image, window, colour);
        }
    }
}

fn draw_outline(image: &mut RgbImage, window: &Window, colour: Rgb<u8>) {
    let (width, height) = image.dimensions();
    for y in window.y..window.bottom().min(height) {
        for x in window.x..window.right().min(width) {
            let on_border = x < window.x.saturating_add(OUTLINE_THICKNESS)
                || y < window.y.saturating_add(OUTLINE_THICKNESS)
                || x.saturating_add(OUTLINE_THICKNESS) >= window.right()
                || y.saturating_add(OUTLINE_THICKNESS) >= window.bottom();
            if on_border {
                image.put_pixel(x, y, colour);
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = build_config(&args)?;
    let pipeline = PatchPipeline::new(config)?;
    let workers = args.workers.unwrap_or_else(num_cpus::get);
    let parallel = ParallelPipeline::from_pipeline(pipeline, workers);

    let mut images = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let image = image::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .to_rgb8();
        images.push(image);
    }

    let originals = if args.overlay_dir.is_some() {
        images.clone()
    } else {
        Vec::new()
    };
    let results = parallel.process_images(images).await;

    for (index, (path, result)) in args.inputs.iter().zip(results).enumerate() {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                log::error!("{}: {}", path.display(), e);
                continue;
            }
        };

        if args.json {
            println!(
                "{}",
                serde_json::to_string(&JsonLine {
                    input: path,
                    report: &report
                })?
            );
        } else {
            println!(
                "{}: {} windows, {} clusters ({} occupied) in {:?}",
                path.display(),
                report.windows.len(),
                report.clusters.len(),
                report.occupied_clusters().count(),
                report.timings.total()
            );
        }

        if let (Some(dir), Some(original)) = (&args.overlay_dir, originals.get(index)) {
            let mut overlay = original.clone();
            draw_outlines(&mut overlay, &report.clusters);
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("input_{index}"));
            let target = dir.join(format!("{stem}_patches.png"));
            overlay
                .save(&target)
                .with_context(|| format!("writing {}", target.display()))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use patch_extraction::core_modules::cluster_builder::cluster_builder;

    #[test]
    fn flags_override_the_default_config() {
        let args = Args::try_parse_from([
            "patch_extraction",
            "plot.png",
            "--window-size",
            "32",
            "--union-find",
            "--exhaustive",
            "--overlay-dir",
            "out",
        ])
        .unwrap();
        let config = build_config(&args).unwrap();

        assert_eq!(config.window_size, 32);
        assert_eq!(config.cluster_strategy, ClusterStrategy::UnionFind);
        assert_eq!(config.fit_mode, FitMode::Exhaustive);
        assert_eq!(config.row_stride, PipelineConfig::default().row_stride);
        assert_eq!(args.overlay_dir, Some(PathBuf::from("out")));
    }

    #[test]
    fn inputs_are_required() {
        assert!(Args::try_parse_from(["patch_extraction"]).is_err());
    }

    #[test]
    fn outlines_are_coloured_by_cluster() {
        let windows = [Window::new(0, 0, 10), Window::new(10, 0, 10), Window::new(40, 40, 10)];
        let clusters = cluster_builder::cluster(&windows, 10.0).unwrap();
        assert_eq!(clusters.len(), 2);

        let mut image = RgbImage::new(60, 60);
        draw_outlines(&mut image, &clusters);

        assert_eq!(*image.get_pixel(0, 0), PALETTE[0]);
        assert_eq!(*image.get_pixel(19, 9), PALETTE[0]);
        assert_eq!(*image.get_pixel(40, 40), PALETTE[1]);
        // Interiors stay untouched.
        assert_eq!(*image.get_pixel(5, 5), Rgb([0, 0, 0]));
    }
}

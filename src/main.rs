mod error;
mod ingest;
mod media;
mod ml;
mod screens;
mod utils;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use crate::ingest::scanner;
use crate::media::ffmpeg::{self, FfmpegGrabber};
use crate::ml::metrics::{AnalysisMetrics, ImageMetrics};
use crate::screens::capture::{self, CaptureReport};
use crate::screens::manifest;
use crate::screens::planner::{Planner, VideoSource};
use crate::screens::selector::{Selection, Selector};
use crate::screens::workdir::ScreensDir;
use crate::utils::config::{self, Settings, DEFAULT_SETTINGS_FILE};

#[derive(Parser, Debug)]
#[command(author, version, about = "Capture and pick the best screenshots of a release", long_about = None)]
struct Args {
    /// Video file, or a directory of video files
    input: PathBuf,

    /// Score quality and sharpness as well as file size
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    analyze: Option<bool>,

    /// Only capture from the first half of each video
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    no_spoilers: Option<bool>,

    /// Normalize file sizes against the 10 MiB ceiling
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    theoretical_fs: Option<bool>,

    /// Delete unselected screenshots when done
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    delete_after_use: Option<bool>,

    #[arg(long)]
    n_preprocess: Option<usize>,

    #[arg(long)]
    n_outlier_prunes: Option<usize>,

    #[arg(long)]
    n_upload: Option<usize>,

    /// ONNX model predicting a 0..=100 quality score (lower is better)
    #[arg(long)]
    quality_model: Option<PathBuf>,

    /// Write the selection as JSON to this path
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// Settings file
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,

    /// Write the effective settings back to the settings file before running
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(v) = self.analyze {
            settings.analyze = v;
        }
        if let Some(v) = self.no_spoilers {
            settings.no_spoilers = v;
        }
        if let Some(v) = self.theoretical_fs {
            settings.theoretical_fs = v;
        }
        if let Some(v) = self.delete_after_use {
            settings.delete_after_use = v;
        }
        if let Some(v) = self.n_preprocess {
            settings.preprocess_count = v;
        }
        if let Some(v) = self.n_outlier_prunes {
            settings.outlier_prunes = v;
        }
        if let Some(v) = self.n_upload {
            settings.upload_count = v;
        }
        if let Some(path) = &self.quality_model {
            settings.quality_model = Some(path.clone());
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut settings = Settings::load(&args.config)?;
    args.apply_overrides(&mut settings);
    if args.save_config {
        settings.save(&args.config)?;
        info!("Settings saved to {:?}", args.config);
    }

    let input = args
        .input
        .canonicalize()
        .with_context(|| format!("Input not found: {:?}", args.input))?;
    info!("Input: {:?}", input);

    let sources = probe_sources(&input)?;
    let plan = Planner::new(settings.planner_config())
        .plan(&sources)
        .context("Failed to plan screenshots")?;
    if plan.is_empty() {
        bail!("Nothing to capture, the screenshot budget is 0");
    }

    let anchor = if input.is_file() {
        input.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        input.clone()
    };
    let screens = ScreensDir::locate(&anchor)?;
    screens.create()?;

    let report = capture::capture_plan(
        Arc::new(FfmpegGrabber),
        &sources,
        &plan,
        screens.path(),
        settings.capture_workers,
        true,
    );
    info!(
        "captured {} of {} screenshots",
        report.created.len(),
        plan.len()
    );

    let selection = select(&settings, &args, screens.path());

    if settings.delete_after_use {
        clean_up(&screens, &report, selection.as_ref().ok());
    }

    let selection = selection?;
    if let Some(path) = &args.manifest {
        manifest::write_manifest(path, &selection)
            .with_context(|| format!("Failed to write manifest {:?}", path))?;
        info!("Manifest written to {:?}", path);
    }
    for path in selection.paths() {
        println!("{}", path.display());
    }

    info!("Selection completed.");
    Ok(())
}

fn probe_sources(input: &Path) -> Result<Vec<VideoSource>> {
    let files = scanner::resolve_media_files(input)?;
    let sources = files
        .into_iter()
        .enumerate()
        .map(|(ordinal, path)| {
            let duration_ms = ffmpeg::probe_duration_ms(&path).unwrap_or_else(|e| {
                warn!("Failed to probe {:?}, skipping it: {}", path, e);
                0
            });
            VideoSource::new(path, duration_ms, ordinal)
        })
        .collect();
    Ok(sources)
}

fn select(settings: &Settings, args: &Args, dir: &Path) -> Result<Selection> {
    let metrics: Arc<dyn ImageMetrics> = if settings.analyze {
        let model = config::resolve_quality_model(settings, &args.config);
        Arc::new(AnalysisMetrics::from_model(model.as_deref())?)
    } else {
        Arc::new(AnalysisMetrics::builtin())
    };

    let selection = Selector::new(settings.selector_config(true), metrics)
        .process(dir)
        .context("Screenshot selection failed")?;

    for (path, reason) in &selection.failed {
        warn!("Not scored: {:?}: {}", path, reason);
    }
    Ok(selection)
}

fn clean_up(screens: &ScreensDir, report: &CaptureReport, selection: Option<&Selection>) {
    let keep = selection.map(|s| s.paths()).unwrap_or_default();
    match screens.cleanup(&report.all_outputs(), &keep) {
        Ok(removed) => info!("Deleted {} unused screenshots", removed),
        Err(e) => error!("Cleanup of {:?} failed: {}", screens.path(), e),
    }
}

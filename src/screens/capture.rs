use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use crossbeam::channel::{bounded, unbounded};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::screens::planner::{format_hhmmss, ExtractionPlan, VideoSource};
use crate::utils::progress;

/// Produces one image file from a video at a millisecond offset.
pub trait FrameGrabber: Send + Sync {
    fn grab(&self, source: &Path, at_ms: u64, output: &Path) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct CaptureReport {
    pub created: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl CaptureReport {
    /// Every output path that may exist on disk, failed captures included.
    pub fn all_outputs(&self) -> Vec<PathBuf> {
        self.created
            .iter()
            .cloned()
            .chain(self.failed.iter().map(|(path, _)| path.clone()))
            .collect()
    }
}

struct CaptureJob {
    number: usize,
    source: PathBuf,
    at_ms: u64,
    output: PathBuf,
}

/// Runs every planned shot through `grabber` on `workers` threads.
///
/// Failed captures are logged and reported, never retried.
pub fn capture_plan(
    grabber: Arc<dyn FrameGrabber>,
    sources: &[VideoSource],
    plan: &ExtractionPlan,
    out_dir: &Path,
    workers: usize,
    show_progress: bool,
) -> CaptureReport {
    let workers = workers.max(1);
    let total = plan.len();

    let (job_tx, job_rx) = bounded::<CaptureJob>(workers * 2);
    let (done_tx, done_rx) = unbounded::<(CaptureJob, Result<()>)>();

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let rx = job_rx.clone();
        let tx = done_tx.clone();
        let grabber = Arc::clone(&grabber);

        handles.push(thread::spawn(move || {
            debug!("capture worker {} started", i);
            for job in rx {
                let result = grabber.grab(&job.source, job.at_ms, &job.output);
                if tx.send((job, result)).is_err() {
                    break;
                }
            }
            debug!("capture worker {} finished", i);
        }));
    }
    drop(job_rx);
    drop(done_tx);

    info!("capturing {} screenshots into {:?}", total, out_dir);
    for shot in &plan.shots {
        let Some(source) = sources.get(shot.source_index) else {
            warn!("shot {} refers to an unknown source, skipping", shot.number);
            continue;
        };
        let job = CaptureJob {
            number: shot.number,
            source: source.path.clone(),
            at_ms: shot.timestamp_ms,
            output: out_dir.join(shot.file_name()),
        };
        if job_tx.send(job).is_err() {
            error!("all capture workers exited early");
            break;
        }
    }
    drop(job_tx);

    let bar = progress::bar(total as u64, show_progress, "capturing screenshots");
    let mut report = CaptureReport::default();
    for (job, result) in done_rx {
        bar.inc(1);
        match result {
            Ok(()) => {
                debug!("{}/{} ({})", job.number, total, format_hhmmss(job.at_ms));
                report.created.push(job.output);
            }
            Err(e) => {
                error!(
                    "failed to capture {:?} at {}: {}",
                    job.source,
                    format_hhmmss(job.at_ms),
                    e
                );
                report.failed.push((job.output, e.to_string()));
            }
        }
    }
    bar.finish_and_clear();

    for handle in handles {
        if handle.join().is_err() {
            error!("a capture worker panicked");
        }
    }

    report.created.sort();
    report.failed.sort();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::screens::planner::{Planner, PlannerConfig};
    use std::fs;
    use std::sync::Mutex;

    /// Writes the timestamp into the output, failing for one source.
    struct FakeGrabber {
        broken_source: PathBuf,
        calls: Mutex<Vec<u64>>,
    }

    impl FrameGrabber for FakeGrabber {
        fn grab(&self, source: &Path, at_ms: u64, output: &Path) -> Result<()> {
            self.calls.lock().unwrap().push(at_ms);
            if source == self.broken_source {
                return Err(Error::ExternalTool {
                    tool: "ffmpeg",
                    reason: "invalid data found when processing input".to_string(),
                });
            }
            fs::write(output, at_ms.to_string())?;
            Ok(())
        }
    }

    #[test]
    fn test_capture_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();
        let sources = vec![
            VideoSource::new("good.mkv", 600_000, 0),
            VideoSource::new("broken.mkv", 600_000, 1),
        ];
        let plan = Planner::new(PlannerConfig {
            preprocess_count: 5,
            no_spoilers: false,
        })
        .plan(&sources)
        .unwrap();

        let grabber = Arc::new(FakeGrabber {
            broken_source: PathBuf::from("broken.mkv"),
            calls: Mutex::new(Vec::new()),
        });
        let report = capture_plan(grabber.clone(), &sources, &plan, dir.path(), 3, false);

        assert_eq!(grabber.calls.lock().unwrap().len(), 5);
        assert_eq!(report.created.len(), 3);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.created[0], dir.path().join("pre_001.png"));
        assert_eq!(
            fs::read_to_string(&report.created[0]).unwrap(),
            plan.shots[0].timestamp_ms.to_string()
        );
        assert_eq!(report.all_outputs().len(), 5);
    }

    #[test]
    fn test_empty_plan_captures_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let grabber = Arc::new(FakeGrabber {
            broken_source: PathBuf::new(),
            calls: Mutex::new(Vec::new()),
        });
        let report = capture_plan(grabber, &[], &ExtractionPlan::default(), dir.path(), 2, false);
        assert!(report.created.is_empty());
        assert!(report.failed.is_empty());
    }
}

use std::f64::consts::SQRT_2;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::ingest::scanner;
use crate::ml::metrics::ImageMetrics;
use crate::ml::pipeline;
use crate::screens::prune::{self, CandidateImage};
use crate::utils::progress;

/// Files at or above this size are never considered. Also the theoretical
/// file-size ceiling for scoring.
pub const SIZE_CEILING: u64 = 10 * 1024 * 1024;

pub const FS_WEIGHT: f64 = 25.0;
pub const QUALITY_WEIGHT: f64 = 55.0;
pub const SHARPNESS_WEIGHT: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Per-bound outlier removal limit, 0 disables pruning.
    pub outlier_prune_count: usize,
    pub analyze: bool,
    pub theoretical_fs_ceiling: bool,
    pub upload_count: usize,
    /// Scoring workers; `None` picks [`default_worker_count`].
    pub workers: Option<usize>,
    /// Longest wait for the next score before outstanding candidates are dropped.
    pub score_timeout: Option<Duration>,
    pub show_progress: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            outlier_prune_count: 3,
            analyze: true,
            theoretical_fs_ceiling: false,
            upload_count: 3,
            workers: None,
            score_timeout: Some(Duration::from_secs(120)),
            show_progress: false,
        }
    }
}

/// About 85% of the available cores, never fewer than two.
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    ((cores as f64 * 0.85) as usize).max(2)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageScore {
    pub fs_score: f64,
    pub quality_score: f64,
    pub sharpness_score: f64,
}

impl ImageScore {
    pub fn total(&self) -> f64 {
        self.fs_score + self.quality_score + self.sharpness_score
    }
}

impl fmt::Display for ImageScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.02}% FS, {:.02}% quality, {:.02}% sharpness",
            self.fs_score, self.quality_score, self.sharpness_score
        )
    }
}

#[derive(Debug, Clone)]
pub struct Pick {
    pub candidate: CandidateImage,
    /// Absent in size-only mode.
    pub score: Option<ImageScore>,
}

#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Best first.
    pub picks: Vec<Pick>,
    pub lower_removed: usize,
    pub upper_removed: usize,
    pub oversized: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl Selection {
    pub fn paths(&self) -> Vec<&Path> {
        self.picks.iter().map(|p| p.candidate.path.as_path()).collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// Eligible files with their sizes, in index order.
    pub entries: Vec<(PathBuf, u64)>,
    pub oversized: Vec<PathBuf>,
}

pub fn discover(dir: &Path) -> Result<Discovery> {
    let mut discovery = Discovery::default();

    for path in scanner::scan_candidates(dir)? {
        let size = fs::metadata(&path)?.len();
        if size >= SIZE_CEILING {
            let diagnostic = Error::OversizedCandidate {
                path: path.clone(),
                size,
                limit: SIZE_CEILING,
            };
            warn!("{}, skipping", diagnostic);
            discovery.oversized.push(path);
            continue;
        }
        discovery.entries.push((path, size));
    }

    if discovery.entries.is_empty() {
        return Err(Error::EmptyPool(format!(
            "no screenshots found for processing in {:?}",
            dir
        )));
    }

    info!("pre-processing {} screenshots", discovery.entries.len());
    Ok(discovery)
}

pub struct Selector {
    config: SelectorConfig,
    metrics: Arc<dyn ImageMetrics>,
}

impl Selector {
    pub fn new(config: SelectorConfig, metrics: Arc<dyn ImageMetrics>) -> Self {
        Self { config, metrics }
    }

    pub fn process(&self, dir: &Path) -> Result<Selection> {
        let discovery = discover(dir)?;
        let outcome = prune::prune(&discovery.entries, self.config.outlier_prune_count);
        debug!(
            "file size band: {:.0} to {:.0} bytes",
            outcome.bounds.lower, outcome.bounds.upper
        );
        if outcome.survivors.is_empty() {
            return Err(Error::AllPruned);
        }

        let mut selection = Selection {
            lower_removed: outcome.lower_removed,
            upper_removed: outcome.upper_removed,
            oversized: discovery.oversized,
            ..Selection::default()
        };

        let top_k = self.config.upload_count;
        if self.config.analyze {
            let scored = self.score_pool(&outcome.survivors)?;
            selection.failed = scored.failed;
            selection.picks = rank_by_score(scored.scores, top_k)
                .into_iter()
                .map(|(candidate, score)| Pick {
                    candidate,
                    score: Some(score),
                })
                .collect();
        } else {
            selection.picks = rank_by_size(outcome.survivors, top_k)
                .into_iter()
                .map(|candidate| Pick {
                    candidate,
                    score: None,
                })
                .collect();
        }

        report(&selection, top_k);
        Ok(selection)
    }

    fn score_pool(&self, candidates: &[CandidateImage]) -> Result<ScoredPool> {
        let workers = self
            .config
            .workers
            .unwrap_or_else(default_worker_count)
            .max(1);
        info!("parallelizing visual metric scoring to {} workers", workers);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("score-{}", i))
            .panic_handler(|_| error!("a scoring worker panicked"))
            .build()
            .map_err(|e| Error::InvalidArgument(format!("failed to build scoring pool: {}", e)))?;

        let (tx, rx) = channel::unbounded::<(usize, Result<ImageScore>)>();
        for (index, candidate) in candidates.iter().enumerate() {
            let tx = tx.clone();
            let candidate = candidate.clone();
            let metrics = Arc::clone(&self.metrics);
            let theoretical = self.config.theoretical_fs_ceiling;

            pool.spawn(move || {
                let result = score_candidate(&candidate, metrics.as_ref(), theoretical);
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let bar = progress::bar(
            candidates.len() as u64,
            self.config.show_progress,
            "scoring screenshots",
        );
        let mut slots: Vec<Option<Result<ImageScore>>> = candidates.iter().map(|_| None).collect();
        let mut timed_out = false;

        loop {
            let received = match self.config.score_timeout {
                Some(timeout) => rx.recv_timeout(timeout),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok((index, result)) => {
                    slots[index] = Some(result);
                    bar.inc(1);
                }
                Err(RecvTimeoutError::Timeout) => {
                    timed_out = true;
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        bar.finish_and_clear();

        if timed_out {
            warn!(
                "scoring stalled for {:?}, dropping outstanding candidates",
                self.config.score_timeout.unwrap_or_default()
            );
        }
        info!("finished analyzing data");

        let mut scored = ScoredPool::default();
        for (candidate, slot) in candidates.iter().zip(slots) {
            let err = match slot {
                Some(Ok(score)) => {
                    scored.scores.push((candidate.clone(), score));
                    continue;
                }
                Some(Err(e)) => e,
                None if timed_out => Error::ScoreTimeout(candidate.path.clone()),
                None => Error::Metric {
                    path: candidate.path.clone(),
                    reason: "scoring worker exited without a result".to_string(),
                },
            };
            warn!("excluding {:?}: {}", candidate.path, err);
            scored.failed.push((candidate.path.clone(), err.to_string()));
        }

        if scored.scores.is_empty() {
            warn!("every candidate failed scoring, nothing to select");
        }
        Ok(scored)
    }
}

#[derive(Default)]
struct ScoredPool {
    /// In candidate order, independent of completion order.
    scores: Vec<(CandidateImage, ImageScore)>,
    failed: Vec<(PathBuf, String)>,
}

/// Largest files first; equal sizes keep discovery order.
pub fn rank_by_size(mut candidates: Vec<CandidateImage>, top_k: usize) -> Vec<CandidateImage> {
    candidates.sort_by(|a, b| {
        b.file_size
            .cmp(&a.file_size)
            .then(a.discovery_index.cmp(&b.discovery_index))
    });
    candidates.truncate(top_k);
    candidates
}

/// Highest total first; equal totals keep discovery order.
pub fn rank_by_score(
    mut scores: Vec<(CandidateImage, ImageScore)>,
    top_k: usize,
) -> Vec<(CandidateImage, ImageScore)> {
    scores.sort_by(|a, b| {
        b.1.total()
            .total_cmp(&a.1.total())
            .then(a.0.discovery_index.cmp(&b.0.discovery_index))
    });
    scores.truncate(top_k);
    scores
}

pub fn score_candidate(
    candidate: &CandidateImage,
    metrics: &dyn ImageMetrics,
    theoretical_ceiling: bool,
) -> Result<ImageScore> {
    let image = pipeline::load_rgb(&candidate.path)?;
    let quality = metrics.score_quality(&pipeline::downscale_for_quality(&image))?;
    let sharpness = metrics.score_sharpness(&image)?;

    for (name, value) in [("quality", quality), ("sharpness", sharpness)] {
        if !value.is_finite() {
            return Err(Error::Metric {
                path: candidate.path.clone(),
                reason: format!("{} metric returned {}", name, value),
            });
        }
    }

    Ok(ImageScore {
        fs_score: file_size_score(candidate, theoretical_ceiling),
        quality_score: quality_score(quality),
        sharpness_score: sharpness_score(sharpness),
    })
}

pub fn file_size_score(candidate: &CandidateImage, theoretical_ceiling: bool) -> f64 {
    let ceiling = if theoretical_ceiling {
        SIZE_CEILING
    } else {
        candidate.max_file_size
    };
    if ceiling == 0 {
        return 0.0;
    }
    FS_WEIGHT * (candidate.file_size as f64 / ceiling as f64)
}

/// Raw quality is lower-is-better; the term is inverted.
pub fn quality_score(raw: f64) -> f64 {
    QUALITY_WEIGHT * ((100.0 - raw.clamp(0.0, 100.0)) / 100.0)
}

pub fn sharpness_score(raw: f64) -> f64 {
    SHARPNESS_WEIGHT * (raw.clamp(0.0, SQRT_2) / SQRT_2)
}

fn report(selection: &Selection, top_k: usize) {
    if !selection.oversized.is_empty() {
        info!(
            "{} screenshot(s) excluded at the {} byte ceiling",
            selection.oversized.len(),
            SIZE_CEILING
        );
    }
    info!("top-{} screenshot results (to be uploaded):", top_k);
    for (i, pick) in selection.picks.iter().enumerate() {
        let name = pick
            .candidate
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match &pick.score {
            Some(score) => info!("  #{:02}: {}: {:.02} points ({})", i + 1, name, score.total(), score),
            None => info!("  #{:02}: {}", i + 1, name),
        }
    }
}

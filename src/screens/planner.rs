use std::ops::Range;
use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::{Error, Result};

/// A single video file that screenshots are sampled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub path: PathBuf,
    /// Zero when the duration is unknown.
    pub duration_ms: u64,
    pub ordinal: usize,
}

impl VideoSource {
    pub fn new(path: impl Into<PathBuf>, duration_ms: u64, ordinal: usize) -> Self {
        Self {
            path: path.into(),
            duration_ms,
            ordinal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    pub preprocess_count: usize,
    pub no_spoilers: bool,
}

/// One frame capture request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedShot {
    /// Index into the source list handed to [`Planner::plan`].
    pub source_index: usize,
    /// Global 1-based screenshot number, unique across all sources.
    pub number: usize,
    pub timestamp_ms: u64,
}

impl PlannedShot {
    pub fn file_name(&self) -> String {
        format!("pre_{:03}.png", self.number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionPlan {
    pub shots: Vec<PlannedShot>,
}

impl ExtractionPlan {
    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    #[cfg(test)]
    pub fn count_for(&self, source_index: usize) -> usize {
        self.shots
            .iter()
            .filter(|s| s.source_index == source_index)
            .count()
    }
}

pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, sources: &[VideoSource]) -> Result<ExtractionPlan> {
        if sources.is_empty() {
            return Err(Error::EmptyPool("no video sources to plan for".to_string()));
        }

        let total = self.config.preprocess_count;
        let shares = if sources.len() == 1 {
            vec![0..total]
        } else {
            partition(total, sources.len())
        };

        let mut shots = Vec::with_capacity(total);
        let mut usable = 0;

        for (source_index, (source, share)) in sources.iter().zip(shares).enumerate() {
            if source.duration_ms == 0 {
                warn!(
                    "skipping screenshots for {:?}: video duration is unknown or zero",
                    source.path
                );
                continue;
            }
            usable += 1;

            info!(
                "planning screenshots for #{} {:?}: considering {} (divided into {} pieces)",
                source.ordinal + 1,
                source.path,
                format_hhmmss(self.window_ms(source.duration_ms)),
                share.len()
            );

            for (number, timestamp_ms) in self.timestamps(source.duration_ms, &share) {
                shots.push(PlannedShot {
                    source_index,
                    number,
                    timestamp_ms,
                });
            }
        }

        if usable == 0 {
            return Err(Error::EmptyPool(
                "no video source has a usable duration".to_string(),
            ));
        }

        Ok(ExtractionPlan { shots })
    }

    fn window_ms(&self, duration_ms: u64) -> u64 {
        if self.config.no_spoilers {
            duration_ms / 2
        } else {
            duration_ms
        }
    }

    /// Numbered offsets for one source's share of the global numbering.
    ///
    /// Shot `i` lands at `floor(i * duration / (divisor * (share.end + 1)))`.
    /// The divisor is applied before the floor so the spoiler-free half keeps
    /// its fractional part.
    fn timestamps(&self, duration_ms: u64, share: &Range<usize>) -> Vec<(usize, u64)> {
        let divisor: u128 = if self.config.no_spoilers { 2 } else { 1 };
        let denominator = divisor * (share.end as u128 + 1);

        (share.start + 1..=share.end)
            .map(|i| (i, (i as u128 * duration_ms as u128 / denominator) as u64))
            .collect()
    }
}

/// Splits `total` screenshot numbers across `parts` sources, giving the
/// remainder to the first one.
pub fn partition(total: usize, parts: usize) -> Vec<Range<usize>> {
    if parts == 0 {
        return Vec::new();
    }
    let (k, r) = (total / parts, total % parts);

    (0..parts)
        .map(|j| {
            let start = if j == 0 { 0 } else { k * j + r };
            start..k * (j + 1) + r
        })
        .collect()
}

pub fn format_hhmmss(ms: u64) -> String {
    let secs = ms / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60
    )
}

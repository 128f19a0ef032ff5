use std::path::PathBuf;

use tracing::info;

/// Cutoff as a multiple of the sample standard deviation of file sizes.
pub const CUTOFF_FACTOR: f64 = 1.25;

/// A screenshot on disk that survived pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateImage {
    /// Position in discovery order, the tie-breaker for equal ranks.
    pub discovery_index: usize,
    pub path: PathBuf,
    pub file_size: u64,
    /// Largest file size in the eligible pool, pruned files included.
    pub max_file_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn from_sizes(sizes: &[u64]) -> Self {
        let (mean, stdev) = mean_stdev(sizes);
        let cutoff = stdev * CUTOFF_FACTOR;
        Self {
            lower: mean - cutoff,
            upper: mean + cutoff,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PruneOutcome {
    /// Survivors, largest first.
    pub survivors: Vec<CandidateImage>,
    pub lower_removed: usize,
    pub upper_removed: usize,
    pub bounds: Bounds,
}

/// Removes up to `limit` file-size outliers from each side of the
/// `mean ± 1.25σ` band. `entries` must be in discovery order.
pub fn prune(entries: &[(PathBuf, u64)], limit: usize) -> PruneOutcome {
    let sizes: Vec<u64> = entries.iter().map(|(_, size)| *size).collect();
    prune_with_bounds(entries, Bounds::from_sizes(&sizes), limit)
}

pub fn prune_with_bounds(entries: &[(PathBuf, u64)], bounds: Bounds, limit: usize) -> PruneOutcome {
    let max_file_size = entries.iter().map(|(_, size)| *size).max().unwrap_or(0);

    // Stable: equal sizes keep discovery order.
    let mut sorted: Vec<(usize, &(PathBuf, u64))> = entries.iter().enumerate().collect();
    sorted.sort_by(|a, b| b.1 .1.cmp(&a.1 .1));

    // At least one candidate always survives.
    let max_removals = entries.len().saturating_sub(1);

    let mut lower_removed = 0;
    let mut upper_removed = 0;
    let mut survivors = Vec::with_capacity(entries.len());

    for (discovery_index, (path, size)) in sorted {
        let value = *size as f64;
        let can_remove = lower_removed + upper_removed < max_removals;

        if can_remove && value < bounds.lower && lower_removed < limit {
            lower_removed += 1;
        } else if can_remove && value > bounds.upper && upper_removed < limit {
            upper_removed += 1;
        } else {
            survivors.push(CandidateImage {
                discovery_index,
                path: path.clone(),
                file_size: *size,
                max_file_size,
            });
        }
    }

    if lower_removed > 0 {
        info!("removed {} lower bound outlier{}", lower_removed, plural(lower_removed));
    }
    if upper_removed > 0 {
        info!("removed {} upper bound outlier{}", upper_removed, plural(upper_removed));
    }

    PruneOutcome {
        survivors,
        lower_removed,
        upper_removed,
        bounds,
    }
}

/// Arithmetic mean and sample standard deviation. A single value has no spread.
pub fn mean_stdev(values: &[u64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let variance = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    (mean, variance.sqrt())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(sizes: &[u64]) -> Vec<(PathBuf, u64)> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| (PathBuf::from(format!("pre_{:03}.png", i + 1)), size))
            .collect()
    }

    #[test]
    fn test_single_large_outlier_is_pruned() {
        let unit = 1000;
        let sizes: Vec<u64> = [1, 2, 3, 4, 5, 6, 7, 8, 9, 50].iter().map(|s| s * unit).collect();
        let outcome = prune(&pool(&sizes), 3);

        assert_eq!(outcome.upper_removed, 1);
        assert_eq!(outcome.lower_removed, 0);
        assert_eq!(outcome.survivors.len(), 9);
        assert!(outcome.bounds.lower < 0.0);
        assert!(outcome.survivors.iter().all(|c| c.file_size < 50 * unit));
        assert!(outcome.survivors.iter().all(|c| c.max_file_size == 50 * unit));
        assert_eq!(outcome.survivors[0].file_size, 9 * unit);
    }

    #[test]
    fn test_zero_limit_disables_pruning() {
        let sizes = [1, 2, 3, 4, 5, 6, 7, 8, 9, 50];
        let outcome = prune(&pool(&sizes), 0);
        assert_eq!(outcome.survivors.len(), 10);
        assert_eq!(outcome.lower_removed + outcome.upper_removed, 0);
    }

    #[test]
    fn test_removals_are_capped_per_bound() {
        let sizes = [1, 1, 1, 50, 50, 50, 50, 100, 100, 100];
        let bounds = Bounds {
            lower: 10.0,
            upper: 90.0,
        };
        for limit in 0..5 {
            let outcome = prune_with_bounds(&pool(&sizes), bounds, limit);
            assert!(outcome.lower_removed <= limit);
            assert!(outcome.upper_removed <= limit);
            assert_eq!(outcome.lower_removed, limit.min(3));
            assert_eq!(outcome.upper_removed, limit.min(3));
            assert_eq!(
                outcome.survivors.len(),
                sizes.len() - outcome.lower_removed - outcome.upper_removed
            );
        }
    }

    #[test]
    fn test_pruning_with_fixed_bounds_is_idempotent() {
        let sizes: Vec<u64> = vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 50];
        let entries = pool(&sizes);
        let bounds = Bounds::from_sizes(&sizes);

        let first = prune_with_bounds(&entries, bounds, 3);
        let again: Vec<(PathBuf, u64)> = first
            .survivors
            .iter()
            .map(|c| (c.path.clone(), c.file_size))
            .collect();
        let second = prune_with_bounds(&again, bounds, 3);

        assert_eq!(second.lower_removed + second.upper_removed, 0);
        assert_eq!(second.survivors.len(), first.survivors.len());
    }

    #[test]
    fn test_at_least_one_candidate_survives() {
        let sizes = [5, 6, 7];
        let bounds = Bounds {
            lower: 100.0,
            upper: 200.0,
        };
        let outcome = prune_with_bounds(&pool(&sizes), bounds, 10);
        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.lower_removed, 2);
        assert_eq!(outcome.survivors[0].file_size, 5);
    }

    #[test]
    fn test_single_candidate_has_no_spread() {
        let outcome = prune(&pool(&[42]), 3);
        assert_eq!(outcome.survivors.len(), 1);
        assert_eq!(outcome.bounds.lower, 42.0);
        assert_eq!(outcome.bounds.upper, 42.0);
    }

    #[test]
    fn test_equal_sizes_keep_discovery_order() {
        let outcome = prune(&pool(&[10, 20, 10, 20]), 3);
        let names: Vec<String> = outcome
            .survivors
            .iter()
            .map(|c| c.path.display().to_string())
            .collect();
        assert_eq!(names, vec!["pre_002.png", "pre_004.png", "pre_001.png", "pre_003.png"]);
        let order: Vec<usize> = outcome.survivors.iter().map(|c| c.discovery_index).collect();
        assert_eq!(order, vec![1, 3, 0, 2]);
    }

    #[test]
    fn test_mean_stdev() {
        let (mean, stdev) = mean_stdev(&[2, 4, 4, 4, 5, 5, 7, 9]);
        assert!((mean - 5.0).abs() < 1e-9);
        assert!((stdev - 2.138_089_935).abs() < 1e-6);
    }
}

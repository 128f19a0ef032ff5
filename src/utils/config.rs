use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::screens::planner::PlannerConfig;
use crate::screens::selector::SelectorConfig;

pub const DEFAULT_SETTINGS_FILE: &str = "screenpick.env";
pub const QUALITY_MODEL_FILE: &str = "quality.onnx";
const MODEL_SEARCH_DEPTH: usize = 5;

const NO_SPOILERS: &str = "SCREENS_NO_SPOILERS";
const ANALYZE: &str = "SCREENS_ANALYZE";
const THEORETICAL_FS: &str = "SCREENS_THEORETICAL_FS";
const N_PREPROCESS: &str = "SCREENS_N_PREPROCESS";
const N_OUTLIER_PRUNES: &str = "SCREENS_N_OUTLIER_PRUNES";
const N_UPLOAD: &str = "SCREENS_N_UPLOAD";
const DELETE_AFTER_USE: &str = "SCREENS_DELETE_AFTER_USE";
const CAPTURE_WORKERS: &str = "CAPTURE_WORKERS";
const SCORE_WORKERS: &str = "SCORE_WORKERS";
const SCORE_TIMEOUT_SECS: &str = "SCORE_TIMEOUT_SECS";
const QUALITY_MODEL_PATH: &str = "QUALITY_MODEL_PATH";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Only sample the first half of each video.
    pub no_spoilers: bool,
    /// Score by file size, quality and sharpness instead of file size alone.
    pub analyze: bool,
    /// Normalize file sizes by the 10 MiB ceiling instead of the largest capture.
    pub theoretical_fs: bool,
    pub preprocess_count: usize,
    pub outlier_prunes: usize,
    pub upload_count: usize,
    pub delete_after_use: bool,
    pub capture_workers: usize,
    pub score_workers: Option<usize>,
    pub score_timeout_secs: Option<u64>,
    pub quality_model: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            no_spoilers: true,
            analyze: true,
            theoretical_fs: false,
            preprocess_count: 15,
            outlier_prunes: 3,
            upload_count: 3,
            delete_after_use: true,
            capture_workers: 2,
            score_workers: None,
            score_timeout_secs: Some(120),
            quality_model: None,
        }
    }
}

impl Settings {
    /// Reads `KEY=VALUE` lines over the defaults. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut settings = Self::default();
        if !path.exists() {
            return Ok(settings);
        }

        let file = File::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| anyhow!("{:?} line {}: expected KEY=VALUE", path, number + 1))?;
            settings
                .apply(key.trim(), value.trim())
                .with_context(|| format!("{:?} line {}", path, number + 1))?;
        }

        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            NO_SPOILERS => self.no_spoilers = parse_bool(value)?,
            ANALYZE => self.analyze = parse_bool(value)?,
            THEORETICAL_FS => self.theoretical_fs = parse_bool(value)?,
            N_PREPROCESS => self.preprocess_count = parse_count(value)?,
            N_OUTLIER_PRUNES => self.outlier_prunes = parse_count(value)?,
            N_UPLOAD => self.upload_count = parse_count(value)?,
            DELETE_AFTER_USE => self.delete_after_use = parse_bool(value)?,
            CAPTURE_WORKERS => self.capture_workers = parse_count(value)?.max(1),
            SCORE_WORKERS => {
                self.score_workers = match parse_count(value)? {
                    0 => None,
                    n => Some(n),
                }
            }
            SCORE_TIMEOUT_SECS => {
                self.score_timeout_secs = match parse_count(value)? {
                    0 => None,
                    n => Some(n as u64),
                }
            }
            QUALITY_MODEL_PATH => {
                self.quality_model = (!value.is_empty()).then(|| PathBuf::from(value))
            }
            _ => warn!("ignoring unknown setting {}", key),
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
        writeln!(file, "{}={}", NO_SPOILERS, self.no_spoilers)?;
        writeln!(file, "{}={}", ANALYZE, self.analyze)?;
        writeln!(file, "{}={}", THEORETICAL_FS, self.theoretical_fs)?;
        writeln!(file, "{}={}", N_PREPROCESS, self.preprocess_count)?;
        writeln!(file, "{}={}", N_OUTLIER_PRUNES, self.outlier_prunes)?;
        writeln!(file, "{}={}", N_UPLOAD, self.upload_count)?;
        writeln!(file, "{}={}", DELETE_AFTER_USE, self.delete_after_use)?;
        writeln!(file, "{}={}", CAPTURE_WORKERS, self.capture_workers)?;
        writeln!(file, "{}={}", SCORE_WORKERS, self.score_workers.unwrap_or(0))?;
        writeln!(file, "{}={}", SCORE_TIMEOUT_SECS, self.score_timeout_secs.unwrap_or(0))?;
        if let Some(model) = &self.quality_model {
            writeln!(file, "{}={}", QUALITY_MODEL_PATH, model.display())?;
        }
        Ok(())
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            preprocess_count: self.preprocess_count,
            no_spoilers: self.no_spoilers,
        }
    }

    pub fn selector_config(&self, show_progress: bool) -> SelectorConfig {
        SelectorConfig {
            outlier_prune_count: self.outlier_prunes,
            analyze: self.analyze,
            theoretical_fs_ceiling: self.theoretical_fs,
            upload_count: self.upload_count,
            workers: self.score_workers,
            score_timeout: self.score_timeout_secs.map(Duration::from_secs),
            show_progress,
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        other => bail!("expected a boolean, got {:?}", other),
    }
}

fn parse_count(value: &str) -> Result<usize> {
    value
        .parse()
        .with_context(|| format!("expected a non-negative integer, got {:?}", value))
}

/// Finds the quality model: configured path first, then a search of the
/// working directory and its parent. A search hit is remembered in the
/// settings file.
pub fn resolve_quality_model(settings: &Settings, settings_path: &Path) -> Option<PathBuf> {
    if let Some(path) = &settings.quality_model {
        return Some(path.clone());
    }

    let root = std::env::current_dir().ok()?;
    match find_file(&root, QUALITY_MODEL_FILE, MODEL_SEARCH_DEPTH) {
        Ok(path) => {
            info!("Found quality model: {:?}", path);
            if let Err(e) = remember_model_path(settings_path, &path) {
                warn!("Failed to save model path: {}", e);
            }
            Some(path)
        }
        Err(_) => None,
    }
}

fn find_file(root: &Path, filename: &str, max_depth: usize) -> Result<PathBuf> {
    let search = |dir: &Path| {
        WalkDir::new(dir)
            .max_depth(max_depth)
            .into_iter()
            .filter_map(|e| e.ok())
            .find(|e| e.file_name() == filename)
            .map(|e| e.path().to_path_buf())
    };

    if let Some(path) = search(root) {
        return Ok(path);
    }
    // Useful when running from a subdirectory.
    if let Some(path) = root.parent().and_then(search) {
        return Ok(path);
    }

    Err(anyhow!("Could not find file '{}' in nearby directories.", filename))
}

fn remember_model_path(settings_path: &Path, model: &Path) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(settings_path)
        .with_context(|| format!("Failed to open {:?}", settings_path))?;
    writeln!(file, "{}={}", QUALITY_MODEL_PATH, model.display())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_save_and_load_settings() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);

        let settings = Settings {
            no_spoilers: false,
            analyze: false,
            preprocess_count: 24,
            outlier_prunes: 0,
            score_workers: Some(6),
            score_timeout_secs: None,
            quality_model: Some(PathBuf::from("/tmp/quality.onnx")),
            ..Settings::default()
        };
        settings.save(&path)?;

        let content = fs::read_to_string(&path)?;
        assert!(content.contains("SCREENS_N_PREPROCESS=24"));
        assert!(content.contains("QUALITY_MODEL_PATH=/tmp/quality.onnx"));

        assert_eq!(Settings::load(&path)?, settings);
        Ok(())
    }

    #[test]
    fn test_missing_file_gives_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(Settings::load(&dir.path().join("absent.env"))?, Settings::default());
        Ok(())
    }

    #[test]
    fn test_comments_unknown_keys_and_bad_values() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("custom.env");

        fs::write(&path, "# tuned for anime\nSCREENS_N_UPLOAD = 5\nTRACKER_URL=x\n")?;
        let settings = Settings::load(&path)?;
        assert_eq!(settings.upload_count, 5);
        assert!(settings.no_spoilers);

        fs::write(&path, "SCREENS_ANALYZE=maybe\n")?;
        assert!(Settings::load(&path).is_err());

        fs::write(&path, "SCREENS_N_UPLOAD=-1\n")?;
        assert!(Settings::load(&path).is_err());

        fs::write(&path, "just some words\n")?;
        assert!(Settings::load(&path).is_err());
        Ok(())
    }

    #[test]
    fn test_settings_feed_pipeline_configs() {
        let settings = Settings::default();
        let planner = settings.planner_config();
        assert_eq!(planner.preprocess_count, 15);
        assert!(planner.no_spoilers);

        let selector = settings.selector_config(false);
        assert_eq!(selector.outlier_prune_count, 3);
        assert_eq!(selector.upload_count, 3);
        assert_eq!(selector.score_timeout, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_find_file_and_remember_it() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("models").join("iqa");
        fs::create_dir_all(&nested)?;
        fs::write(nested.join(QUALITY_MODEL_FILE), b"onnx")?;

        let found = find_file(dir.path(), QUALITY_MODEL_FILE, 5)?;
        assert_eq!(found, nested.join(QUALITY_MODEL_FILE));

        let settings_path = dir.path().join(DEFAULT_SETTINGS_FILE);
        remember_model_path(&settings_path, &found)?;
        assert_eq!(Settings::load(&settings_path)?.quality_model, Some(found));
        Ok(())
    }
}

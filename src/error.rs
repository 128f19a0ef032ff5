use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("inference error: {0}")]
    Inference(#[from] ort::Error),

    #[error("unexpected model output: {0}")]
    ModelOutput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("empty candidate pool: {0}")]
    EmptyPool(String),

    #[error("image \"{}\" is {size} bytes, at or above the {limit} byte ceiling", .path.display())]
    OversizedCandidate { path: PathBuf, size: u64, limit: u64 },

    #[error("outlier pruning removed every candidate")]
    AllPruned,

    #[error("metric failed for \"{}\": {reason}", .path.display())]
    Metric { path: PathBuf, reason: String },

    #[error("no score arrived for \"{}\" before the timeout", .0.display())]
    ScoreTimeout(PathBuf),

    #[error("{tool} failed: {reason}")]
    ExternalTool { tool: &'static str, reason: String },

    #[error("unreadable probe output: {0}")]
    Probe(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

use std::path::Path;

use crate::error::Result;

/// Container extensions accepted without sniffing.
pub const VIDEO_EXTENSIONS: &[&str] = &["mkv", "mp4", "avi"];

pub fn detect_mimetype(path: &Path) -> Result<String> {
    let kind = infer::get_from_path(path)?;

    match kind {
        Some(k) => Ok(k.mime_type().to_string()),
        None => Ok("application/octet-stream".to_string()),
    }
}

/// Known container extension, or content that sniffs as `video/*`.
pub fn is_video(path: &Path) -> bool {
    let by_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false);

    by_extension
        || detect_mimetype(path)
            .map(|mime| mime.starts_with("video/"))
            .unwrap_or(false)
}

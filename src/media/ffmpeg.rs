use std::path::Path;
use std::process::{Command, Output, Stdio};

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::screens::capture::FrameGrabber;

/// Captures a single PNG frame at a millisecond offset with the `ffmpeg` CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegGrabber;

impl FrameGrabber for FfmpegGrabber {
    fn grab(&self, source: &Path, at_ms: u64, output: &Path) -> Result<()> {
        let result = Command::new("ffmpeg")
            // overwrite, report errors only
            .arg("-y")
            .arg("-loglevel")
            .arg("level+error")
            .arg("-ss")
            .arg(format!("{}ms", at_ms))
            .arg("-i")
            .arg(source)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("10")
            .arg("-c:v")
            .arg("png")
            .arg(output)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| Error::ExternalTool {
                tool: "ffmpeg",
                reason: format!("failed to spawn: {}", e),
            })?;

        check_status("ffmpeg", &result)
    }
}

/// Duration of the first video stream, falling back to the container's,
/// as reported by `ffprobe`.
pub fn probe_duration_ms(path: &Path) -> Result<u64> {
    let result = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration:stream=codec_type,duration")
        .arg("-of")
        .arg("json")
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| Error::ExternalTool {
            tool: "ffprobe",
            reason: format!("failed to spawn: {}", e),
        })?;

    check_status("ffprobe", &result)?;
    parse_probe_output(&String::from_utf8_lossy(&result.stdout))
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

pub fn parse_probe_output(json: &str) -> Result<u64> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let has_video = probe
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("video"));
    if !has_video {
        return Err(Error::Probe("no video track".to_string()));
    }

    let stream_duration = probe
        .streams
        .iter()
        .filter(|s| s.codec_type.as_deref() == Some("video"))
        .find_map(|s| s.duration.as_deref().and_then(seconds_to_ms));
    let format_duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(seconds_to_ms);

    stream_duration
        .or(format_duration)
        .ok_or_else(|| Error::Probe("failed to obtain video track duration".to_string()))
}

fn seconds_to_ms(value: &str) -> Option<u64> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    Some((seconds * 1000.0) as u64)
}

fn check_status(tool: &'static str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(Error::ExternalTool {
        tool,
        reason: format!("exited with {}: {}", output.status, stderr.trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_stream_duration_wins() {
        let json = r#"{
            "streams": [
                {"codec_type": "audio", "duration": "10.0"},
                {"codec_type": "video", "duration": "5423.125"}
            ],
            "format": {"duration": "5500.0"}
        }"#;
        assert_eq!(parse_probe_output(json).unwrap(), 5_423_125);
    }

    #[test]
    fn test_container_duration_fallback() {
        // Matroska streams usually carry no duration of their own.
        let json = r#"{
            "streams": [{"codec_type": "video"}, {"codec_type": "audio"}],
            "format": {"duration": "1320.500000"}
        }"#;
        assert_eq!(parse_probe_output(json).unwrap(), 1_320_500);
    }

    #[test]
    fn test_missing_video_or_duration() {
        let audio_only = r#"{"streams": [{"codec_type": "audio", "duration": "3.0"}]}"#;
        assert!(matches!(parse_probe_output(audio_only), Err(Error::Probe(_))));

        let no_duration = r#"{"streams": [{"codec_type": "video", "duration": "N/A"}], "format": {}}"#;
        assert!(matches!(parse_probe_output(no_duration), Err(Error::Probe(_))));

        assert!(matches!(parse_probe_output("not json"), Err(Error::Json(_))));
    }
}

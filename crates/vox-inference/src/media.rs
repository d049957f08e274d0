//! Media probing via `ffprobe` and splitting via `ffmpeg`.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use vox_core::defaults::{FFMPEG_PATH, FFPROBE_PATH};
use vox_core::{Error, MediaInfo, Result};

/// Shown to operators when `ffmpeg` is missing.
pub const FFMPEG_INSTALL_COMMAND: &str = "apt install ffmpeg (or: brew install ffmpeg)";

/// Human-readable duration: `12.5 seconds`, `m:ss`, or `h:mm:ss`.
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds < 60.0 {
        return format!("{:.1} seconds", seconds);
    }
    let total = seconds.floor() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours == 0 {
        format!("{}:{:02}", minutes, secs)
    } else {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    size: Option<String>,
    format_name: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

fn parse_num<T: std::str::FromStr + Default>(value: Option<&str>) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or_default()
}

/// Build [`MediaInfo`] from `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_ffprobe_output(json: &str) -> Result<MediaInfo> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let stream_of = |kind: &str| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    };
    let audio = stream_of("audio");
    let video = stream_of("video");

    let duration_secs: f64 = parse_num(probe.format.duration.as_deref());
    Ok(MediaInfo {
        duration_secs,
        formatted_duration: format_duration(duration_secs),
        size_bytes: parse_num(probe.format.size.as_deref()),
        format_name: probe.format.format_name.clone().unwrap_or_default(),
        bit_rate: parse_num(probe.format.bit_rate.as_deref()),
        has_audio: audio.is_some(),
        has_video: video.is_some(),
        audio_codec: audio.and_then(|s| s.codec_name.clone()),
        video_codec: video.and_then(|s| s.codec_name.clone()),
        sample_rate: parse_num(audio.and_then(|s| s.sample_rate.as_deref())),
        channels: audio.and_then(|s| s.channels).unwrap_or(0),
    })
}

/// Thin wrapper around the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    ffprobe_path: String,
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::new(FFPROBE_PATH)
    }
}

impl MediaProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn from_env() -> Self {
        std::env::var("FFPROBE_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(Self::new)
            .unwrap_or_default()
    }

    /// Whether `ffprobe` can be executed.
    pub async fn is_available(&self) -> bool {
        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.arg("-version").kill_on_drop(true);
        cmd.output()
            .await
            .map(|out| out.status.success())
            .unwrap_or(false)
    }

    /// Probe a media file on disk.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let mut cmd = Command::new(&self.ffprobe_path);
        cmd.args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .arg(path)
            .kill_on_drop(true);

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ServiceUnavailable("ffprobe is not installed".to_string())
            } else {
                Error::Io(e)
            }
        })?;

        if !output.status.success() {
            return Err(Error::UnsupportedFormat(format!(
                "ffprobe could not read {}",
                path.display()
            )));
        }

        let info = parse_ffprobe_output(&String::from_utf8_lossy(&output.stdout))?;
        debug!(
            path = %path.display(),
            duration = %info.formatted_duration,
            format = %info.format_name,
            "Media probed"
        );
        Ok(info)
    }
}

/// A time slice of a media file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkSpan {
    pub start_secs: f64,
    pub duration_secs: f64,
}

/// Cut `duration_secs` into equal slices so each encodes to at most about
/// `target_bytes`, assuming a constant bit rate.
pub fn plan_chunks(
    duration_secs: f64,
    size_bytes: u64,
    target_bytes: u64,
) -> Result<Vec<ChunkSpan>> {
    if !duration_secs.is_finite() || duration_secs <= 0.0 {
        return Err(Error::UnsupportedFormat(
            "could not determine media duration".to_string(),
        ));
    }
    let count = size_bytes.div_ceil(target_bytes.max(1)).max(1);
    let span = duration_secs / count as f64;
    Ok((0..count)
        .map(|i| ChunkSpan {
            start_secs: i as f64 * span,
            duration_secs: span,
        })
        .collect())
}

/// Splits media too large for a single transcription request.
#[async_trait]
pub trait MediaSplitter: Send + Sync {
    /// Cut `data` into independently playable pieces of roughly
    /// `target_bytes` each, in playback order.
    async fn split(
        &self,
        data: &[u8],
        extension: &str,
        target_bytes: u64,
    ) -> Result<Vec<Vec<u8>>>;
}

/// Splits by stream-copying time slices with `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegSplitter {
    ffmpeg_path: String,
    probe: MediaProbe,
}

impl Default for FfmpegSplitter {
    fn default() -> Self {
        Self::new(FFMPEG_PATH, MediaProbe::default())
    }
}

impl FfmpegSplitter {
    pub fn new(ffmpeg_path: impl Into<String>, probe: MediaProbe) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            probe,
        }
    }

    /// Read `FFMPEG_PATH`, falling back to `ffmpeg` on `PATH`.
    pub fn from_env(probe: MediaProbe) -> Self {
        let path = std::env::var("FFMPEG_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| FFMPEG_PATH.to_string());
        Self::new(path, probe)
    }

    async fn cut(&self, input: &Path, span: ChunkSpan, output: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-v", "error", "-y", "-ss"])
            .arg(format!("{:.3}", span.start_secs))
            .arg("-t")
            .arg(format!("{:.3}", span.duration_secs))
            .arg("-i")
            .arg(input)
            .args(["-c", "copy"])
            .arg(output)
            .kill_on_drop(true);

        let result = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::MissingDependency {
                    tool: "ffmpeg".to_string(),
                    install_command: FFMPEG_INSTALL_COMMAND.to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;

        if !result.status.success() {
            return Err(Error::UnsupportedFormat(format!(
                "ffmpeg could not split media: {}",
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl MediaSplitter for FfmpegSplitter {
    async fn split(
        &self,
        data: &[u8],
        extension: &str,
        target_bytes: u64,
    ) -> Result<Vec<Vec<u8>>> {
        // Scratch files live only as long as this call
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(format!("input.{extension}"));
        tokio::fs::write(&input, data).await?;

        let info = self.probe.probe(&input).await?;
        let spans = plan_chunks(info.duration_secs, data.len() as u64, target_bytes)?;
        debug!(
            size = data.len(),
            duration = %info.formatted_duration,
            chunks = spans.len(),
            "Splitting media"
        );

        let mut chunks = Vec::with_capacity(spans.len());
        for (index, span) in spans.into_iter().enumerate() {
            let output = dir.path().join(format!("chunk_{index:03}.{extension}"));
            self.cut(&input, span, &output).await?;
            chunks.push(tokio::fs::read(&output).await?);
        }
        Ok(chunks)
    }
}

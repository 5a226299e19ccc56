// ReelForge Media Probe - ffmpeg/ffprobe plumbing
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Resolves the ffmpeg/ffprobe binaries, probes durations and frame sizes,
// and runs ffmpeg with its stderr captured for error reporting.

use anyhow::{bail, Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Paths to the external media binaries.
///
/// `REELFORGE_FFMPEG` / `REELFORGE_FFPROBE` override the defaults, which are
/// looked up on PATH.
#[derive(Debug, Clone, PartialEq)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for Toolchain {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Toolchain {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            ffmpeg: std::env::var_os("REELFORGE_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg),
            ffprobe: std::env::var_os("REELFORGE_FFPROBE")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe),
        }
    }

    /// `ffmpeg -y -nostdin -hide_banner -loglevel error`
    pub fn ffmpeg_command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(["-y", "-nostdin", "-hide_banner", "-loglevel", "error"]);
        cmd
    }
}

/// Relative paths that start with '-' would be read as flags by ffmpeg.
pub fn safe_arg_path(path: &Path) -> OsString {
    if path.is_relative() && path.to_string_lossy().starts_with('-') {
        let mut prefixed = OsString::from("./");
        prefixed.push(path.as_os_str());
        prefixed
    } else {
        path.as_os_str().to_os_string()
    }
}

/// Run a prepared ffmpeg command; on failure the error carries ffmpeg's stderr.
pub async fn run_ffmpeg(mut cmd: Command, what: &str) -> Result<()> {
    debug!("[FFMPEG] {:?}", cmd.as_std());
    let output = cmd
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to launch ffmpeg for {}", what))?;
    if !output.status.success() {
        bail!(
            "ffmpeg {} failed ({}): {}",
            what,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

async fn run_ffprobe(tools: &Toolchain, args: &[&str], path: &Path) -> Result<String> {
    let output = tokio::time::timeout(
        PROBE_TIMEOUT,
        Command::new(&tools.ffprobe)
            .kill_on_drop(true)
            .args(["-v", "error"])
            .args(args)
            .arg(safe_arg_path(path))
            .output(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("ffprobe timed out on {:?}", path))?
    .with_context(|| format!("failed to launch ffprobe for {:?}", path))?;

    if !output.status.success() {
        bail!(
            "ffprobe failed on {:?}: {}",
            path,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Container duration in seconds.
pub async fn get_video_duration(tools: &Toolchain, path: &Path) -> Result<f64> {
    let out = run_ffprobe(
        tools,
        &[
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ],
        path,
    )
    .await?;
    parse_duration(&out).with_context(|| format!("no duration for {:?}", path))
}

/// Width and height of the first video stream.
pub async fn get_video_dimensions(tools: &Toolchain, path: &Path) -> Result<(u32, u32)> {
    let out = run_ffprobe(
        tools,
        &[
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height",
            "-of",
            "csv=p=0:s=x",
        ],
        path,
    )
    .await?;
    parse_dimensions(&out).with_context(|| format!("no video stream in {:?}", path))
}

/// Whether the file carries at least one audio stream.
pub async fn has_audio_stream(tools: &Toolchain, path: &Path) -> Result<bool> {
    let out = run_ffprobe(
        tools,
        &[
            "-select_streams",
            "a",
            "-show_entries",
            "stream=index",
            "-of",
            "csv=p=0",
        ],
        path,
    )
    .await?;
    Ok(!out.is_empty())
}

fn parse_duration(out: &str) -> Result<f64> {
    let duration: f64 = out
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .parse()
        .with_context(|| format!("unparseable ffprobe duration '{}'", out))?;
    if !duration.is_finite() || duration < 0.0 {
        bail!("invalid duration {}", duration);
    }
    Ok(duration)
}

/// Parses "1280x720" (ffprobe csv with `s=x`).
fn parse_dimensions(out: &str) -> Result<(u32, u32)> {
    let line = out.lines().next().unwrap_or_default().trim();
    let (w, h) = line
        .split_once('x')
        .with_context(|| format!("unparseable ffprobe size '{}'", line))?;
    let width: u32 = w.trim().parse()?;
    let height: u32 = h.trim().trim_end_matches('x').parse()?;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_arg_path() {
        assert_eq!(safe_arg_path(Path::new("-evil.mp4")), OsString::from("./-evil.mp4"));
        assert_eq!(safe_arg_path(Path::new("clip.mp4")), OsString::from("clip.mp4"));
        assert_eq!(safe_arg_path(Path::new("/tmp/-a.mp4")), OsString::from("/tmp/-a.mp4"));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5.005000\n").unwrap(), 5.005);
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1280x720\n").unwrap(), (1280, 720));
        // Some ffprobe builds emit a trailing separator.
        assert_eq!(parse_dimensions("640x360x").unwrap(), (640, 360));
        assert!(parse_dimensions("garbage").is_err());
    }

    #[test]
    fn test_toolchain_defaults() {
        let tools = Toolchain::default();
        assert_eq!(tools.ffmpeg, PathBuf::from("ffmpeg"));
        assert_eq!(tools.ffprobe, PathBuf::from("ffprobe"));
    }
}

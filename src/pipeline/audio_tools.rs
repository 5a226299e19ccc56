// ReelForge Audio Tools
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Lays an audio track under a finished video. Audio shorter than the video
// is looped; audio longer than the video is cut at the video's end.

use crate::encoder_backend::EncodeSettings;
use crate::pipeline::media_probe::{get_video_duration, run_ffmpeg, safe_arg_path, Toolchain};
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// How the audio input is fitted to the video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioPlan {
    /// Repeat the audio input indefinitely (`-stream_loop -1`).
    pub loop_audio: bool,
    /// Output duration in seconds; always the video's.
    pub duration: f64,
}

impl AudioPlan {
    pub fn for_durations(video_duration: f64, audio_duration: f64) -> Result<Self> {
        if !(audio_duration.is_finite() && audio_duration > 0.0) {
            bail!("audio track has no usable duration ({})", audio_duration);
        }
        if !(video_duration.is_finite() && video_duration > 0.0) {
            bail!("video has no usable duration ({})", video_duration);
        }
        Ok(Self {
            loop_audio: audio_duration < video_duration,
            duration: video_duration,
        })
    }
}

/// Overlay `audio_path` onto `video_path`, writing `output_path`.
pub async fn add_audio(
    tools: &Toolchain,
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    settings: &EncodeSettings,
) -> Result<PathBuf> {
    let video_duration = get_video_duration(tools, video_path).await?;
    let audio_duration = get_video_duration(tools, audio_path).await?;
    let plan = AudioPlan::for_durations(video_duration, audio_duration)?;

    info!(
        "[AUDIO] Overlaying {:?} ({:.2}s) on {:?} ({:.2}s){}",
        audio_path,
        audio_duration,
        video_path,
        video_duration,
        if plan.loop_audio { ", looping audio" } else { "" }
    );

    let mut cmd = tools.ffmpeg_command();
    cmd.arg("-i").arg(safe_arg_path(video_path));
    if plan.loop_audio {
        cmd.args(["-stream_loop", "-1"]);
    }
    cmd.arg("-i")
        .arg(safe_arg_path(audio_path))
        .args(["-map", "0:v:0", "-map", "1:a:0"])
        .args(settings.video_args())
        .args(["-c:a", "aac", "-b:a", "192k"])
        .arg("-t")
        .arg(format!("{:.3}", plan.duration))
        .args(["-movflags", "+faststart"])
        .arg(safe_arg_path(output_path));

    run_ffmpeg(cmd, "audio overlay").await?;

    info!("[AUDIO] ✅ Audio overlay saved: {:?}", output_path);
    Ok(output_path.to_path_buf())
}

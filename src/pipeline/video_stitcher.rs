// ReelForge Video Stitcher: Segment Concatenation
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Two ways to join segments:
//   • Compose – every segment is centered on a shared canvas (the largest
//     width and height among the inputs, black border), resampled to the
//     target frame rate and re-encoded through the concat filter. If any
//     segment has audio, audio is joined too; silent segments get silence.
//   • Copy    – FFmpeg's concat demuxer with `-c copy`. Lossless and
//     near-free, but all segments must share codec, size and timebase.

use crate::encoder_backend::EncodeSettings;
use crate::pipeline::media_probe::{
    get_video_dimensions, get_video_duration, has_audio_stream, run_ffmpeg, safe_arg_path,
    Toolchain,
};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StitchMode {
    #[default]
    Compose,
    Copy,
}

/// What the compose filter needs to know about one input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentInfo {
    pub width: u32,
    pub height: u32,
    /// Seconds; sizes the silence or padding of the segment's audio.
    pub duration: f64,
    pub has_audio: bool,
}

pub struct VideoStitcher;

impl VideoStitcher {
    /// Build the contents of an FFmpeg concat manifest.
    ///
    /// Each line is `file '<path>'`; single quotes in paths are escaped the
    /// way the concat demuxer expects.
    pub fn create_concat_manifest(segments: &[PathBuf]) -> String {
        segments
            .iter()
            .map(|p| format!("file '{}'", p.to_string_lossy().replace('\'', "'\\''")))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Smallest even canvas that holds every segment.
    pub fn canvas_for(dims: &[(u32, u32)]) -> (u32, u32) {
        let width = dims.iter().map(|d| d.0).max().unwrap_or(0);
        let height = dims.iter().map(|d| d.1).max().unwrap_or(0);
        (width + width % 2, height + height % 2)
    }

    /// `filter_complex` that pads each input onto the shared canvas and
    /// concatenates the video streams into `[outv]`. When any input has
    /// audio, the audio is concatenated into `[outa]` as well.
    pub fn compose_filter(segments: &[SegmentInfo], fps: u32) -> String {
        let dims: Vec<(u32, u32)> = segments.iter().map(|s| (s.width, s.height)).collect();
        let (cw, ch) = Self::canvas_for(&dims);
        let with_audio = segments.iter().any(|s| s.has_audio);

        let mut filter = String::new();
        for (i, segment) in segments.iter().enumerate() {
            filter.push_str(&format!(
                "[{i}:v:0]pad={cw}:{ch}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps},format=yuv420p[v{i}];"
            ));
            if !with_audio {
                continue;
            }
            let d = segment.duration;
            if segment.has_audio {
                filter.push_str(&format!(
                    "[{i}:a:0]aresample=48000,aformat=sample_fmts=fltp:channel_layouts=stereo,apad,atrim=duration={d:.3},asetpts=N/SR/TB[a{i}];"
                ));
            } else {
                filter.push_str(&format!(
                    "anullsrc=channel_layout=stereo:sample_rate=48000,atrim=duration={d:.3},aformat=sample_fmts=fltp[a{i}];"
                ));
            }
        }
        for i in 0..segments.len() {
            filter.push_str(&format!("[v{i}]"));
            if with_audio {
                filter.push_str(&format!("[a{i}]"));
            }
        }
        if with_audio {
            filter.push_str(&format!("concat=n={}:v=1:a=1[outv][outa]", segments.len()));
        } else {
            filter.push_str(&format!("concat=n={}:v=1:a=0[outv]", segments.len()));
        }
        filter
    }

    /// Join `segments` in order into `output_path`.
    pub async fn finalize(
        tools: &Toolchain,
        segments: &[PathBuf],
        output_path: &Path,
        mode: StitchMode,
        settings: &EncodeSettings,
    ) -> Result<PathBuf> {
        if segments.is_empty() {
            bail!("No segments to stitch.");
        }
        for segment in segments {
            if !segment.exists() {
                bail!("segment {:?} does not exist", segment);
            }
        }

        match mode {
            StitchMode::Compose => Self::stitch_compose(tools, segments, output_path, settings).await?,
            StitchMode::Copy => Self::stitch_copy(tools, segments, output_path).await?,
        }

        info!("[STITCHER] ✅ Final output: {:?}", output_path);
        Ok(output_path.to_path_buf())
    }

    async fn stitch_compose(
        tools: &Toolchain,
        segments: &[PathBuf],
        output_path: &Path,
        settings: &EncodeSettings,
    ) -> Result<()> {
        let mut infos = Vec::with_capacity(segments.len());
        for segment in segments {
            let (width, height) = get_video_dimensions(tools, segment).await?;
            infos.push(SegmentInfo {
                width,
                height,
                duration: get_video_duration(tools, segment).await?,
                has_audio: has_audio_stream(tools, segment).await?,
            });
        }
        let dims: Vec<(u32, u32)> = infos.iter().map(|s| (s.width, s.height)).collect();
        let (cw, ch) = Self::canvas_for(&dims);
        let with_audio = infos.iter().any(|s| s.has_audio);
        info!(
            "[STITCHER] Composing {} segments onto {}x{} canvas{}",
            segments.len(),
            cw,
            ch,
            if with_audio { " with audio" } else { "" }
        );

        let mut cmd = tools.ffmpeg_command();
        for segment in segments {
            cmd.arg("-i").arg(safe_arg_path(segment));
        }
        cmd.arg("-filter_complex")
            .arg(Self::compose_filter(&infos, settings.fps))
            .args(["-map", "[outv]"]);
        if with_audio {
            cmd.args(["-map", "[outa]", "-c:a", "aac", "-b:a", "192k"]);
        }
        cmd.args(settings.video_args())
            .args(["-movflags", "+faststart"])
            .arg(safe_arg_path(output_path));

        run_ffmpeg(cmd, "stitch").await
    }

    async fn stitch_copy(tools: &Toolchain, segments: &[PathBuf], output_path: &Path) -> Result<()> {
        // Demuxer resolves relative entries against the manifest's directory.
        let absolute: Vec<PathBuf> = segments
            .iter()
            .map(|p| std::path::absolute(p).unwrap_or_else(|_| p.clone()))
            .collect();

        let manifest_path = output_path.with_extension("concat_manifest.txt");
        std::fs::write(&manifest_path, Self::create_concat_manifest(&absolute))
            .with_context(|| format!("writing concat manifest {:?}", manifest_path))?;

        info!(
            "[STITCHER] Manifest written ({} segments): {:?}",
            segments.len(),
            manifest_path
        );

        let mut cmd = tools.ffmpeg_command();
        cmd.args(["-f", "concat", "-safe", "0", "-i"])
            .arg(safe_arg_path(&manifest_path))
            .args(["-c", "copy"])
            .arg(safe_arg_path(output_path));
        let result = run_ffmpeg(cmd, "concat").await;

        let _ = std::fs::remove_file(&manifest_path);
        result
    }
}

/// Concatenate `segments` into `output_path` with the default compose mode.
pub async fn stitch_segments(
    tools: &Toolchain,
    segments: &[PathBuf],
    output_path: &Path,
    settings: &EncodeSettings,
) -> Result<PathBuf> {
    VideoStitcher::finalize(tools, segments, output_path, StitchMode::Compose, settings).await
}

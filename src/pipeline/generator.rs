// ReelForge Segment Generator
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Turns one segment config into one video file: sample `frames` frames from
// the configured diffusion model, then pipe them as rgb24 rawvideo into
// ffmpeg.

use crate::config::SegmentConfig;
use crate::encoder_backend::EncodeSettings;
use crate::model::{build_model, DiffusionModel, Frame};
use crate::pipeline::media_probe::{safe_arg_path, Toolchain};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

pub struct VideoGenerator {
    config: SegmentConfig,
    model: Box<dyn DiffusionModel>,
}

impl VideoGenerator {
    /// Load `config_path` and build its model, seeded with `seed` when given.
    pub fn new(config_path: &Path, seed: Option<u64>) -> Result<Self> {
        let config = SegmentConfig::load(config_path)?;
        Ok(Self::from_config(config, seed))
    }

    pub fn from_config(config: SegmentConfig, seed: Option<u64>) -> Self {
        let model = build_model(&config.model, seed);
        let (width, height) = model.dimensions();
        info!(
            "[GENERATOR] Model '{}' ready: {}x{}, {} frames, seed={:?}, sampling on {} CPU threads",
            model.name(),
            width,
            height,
            config.frames,
            seed,
            rayon::current_num_threads()
        );
        Self { config, model }
    }

    /// Sample every frame of the segment, in order.
    pub fn forward(&mut self) -> Result<Vec<Frame>> {
        let total = self.config.frames;
        let mut frames = Vec::with_capacity(total as usize);
        for i in 0..total {
            let frame = self
                .model
                .sample()
                .with_context(|| format!("sampling frame {}/{}", i + 1, total))?;
            frames.push(frame);
            if (i + 1) % 10 == 0 || i + 1 == total {
                debug!("[GENERATOR] Sampled {}/{} frames", i + 1, total);
            }
        }
        Ok(frames)
    }

    /// Encode `frames` into `path` at this segment's frame rate.
    pub async fn save_video(
        &self,
        tools: &Toolchain,
        frames: &[Frame],
        path: &Path,
        settings: &EncodeSettings,
    ) -> Result<PathBuf> {
        save_video(tools, frames, path, &settings.with_fps(self.config.fps)).await
    }
}

/// Size shared by every frame of a segment. The first frame fixes it.
pub fn segment_frame_size(frames: &[Frame]) -> Result<(u32, u32)> {
    let first = match frames.first() {
        Some(f) => f,
        None => bail!("cannot encode a segment with no frames"),
    };
    let (width, height) = first.dimensions();
    for (i, frame) in frames.iter().enumerate() {
        if frame.dimensions() != (width, height) {
            let (w, h) = frame.dimensions();
            bail!(
                "frame {} is {}x{} but the segment is {}x{}",
                i,
                w,
                h,
                width,
                height
            );
        }
    }
    Ok((width, height))
}

/// Pipe frames into ffmpeg as rawvideo, one frame at a time, and encode them to `path`.
pub async fn save_video(
    tools: &Toolchain,
    frames: &[Frame],
    path: &Path,
    settings: &EncodeSettings,
) -> Result<PathBuf> {
    let (width, height) = segment_frame_size(frames)?;
    info!(
        "[GENERATOR] Encoding {} frames ({}x{} @ {}fps) -> {:?}",
        frames.len(),
        width,
        height,
        settings.fps,
        path
    );

    let mut cmd = tools.ffmpeg_command();
    cmd.args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
        .arg("-s")
        .arg(format!("{}x{}", width, height))
        .arg("-r")
        .arg(settings.fps.to_string())
        .args(["-i", "pipe:0"])
        // yuv420p needs even dimensions
        .args(["-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2"])
        .args(settings.video_args())
        .arg(safe_arg_path(path))
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn ffmpeg encoder")?;
    let mut stdin = child
        .stdin
        .take()
        .context("ffmpeg encoder stdin unavailable")?;
    let mut stderr = child
        .stderr
        .take()
        .context("ffmpeg encoder stderr unavailable")?;

    let write_frames = async move {
        for frame in frames {
            stdin.write_all(frame.as_raw()).await?;
        }
        stdin.shutdown().await
    };
    let read_stderr = async move {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).await.map(|_| buf)
    };
    let (write_result, stderr_bytes, status) =
        tokio::join!(write_frames, read_stderr, child.wait());
    let status = status.context("waiting for ffmpeg encoder")?;

    if !status.success() {
        bail!(
            "ffmpeg encode of {:?} failed ({}): {}",
            path,
            status,
            String::from_utf8_lossy(&stderr_bytes.unwrap_or_default()).trim()
        );
    }
    write_result.context("failed to stream frames into ffmpeg")?;

    Ok(path.to_path_buf())
}

/// Generate one segment: load config, sample on a blocking thread, encode.
pub async fn generate_segment(
    tools: &Toolchain,
    config_path: &Path,
    seed: Option<u64>,
    output: &Path,
    settings: &EncodeSettings,
) -> Result<PathBuf> {
    let config = SegmentConfig::load(config_path)?;

    let (generator, frames) = tokio::task::spawn_blocking(move || -> Result<_> {
        let mut generator = VideoGenerator::from_config(config, seed);
        let frames = generator.forward()?;
        Ok((generator, frames))
    })
    .await
    .context("sampling task panicked")??;

    generator
        .save_video(tools, &frames, output, settings)
        .await
        .with_context(|| format!("saving segment from {:?}", config_path))
}

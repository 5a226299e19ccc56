// ReelForge Command Model Backend
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Delegates sampling to an external program (a Python diffusion script, a
// compiled inference binary, ...). The program is run once per frame and
// must write either raw rgb24 bytes or an encoded image to stdout.

use super::{frame_len, DiffusionModel, Frame, ModelError};
use crate::config::CommandModelConfig;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::runtime::{Builder, Handle};
use tracing::debug;

pub struct CommandModel {
    config: CommandModelConfig,
    seed: Option<u64>,
    frame_index: u64,
}

impl CommandModel {
    pub fn new(config: CommandModelConfig, seed: Option<u64>) -> Self {
        Self {
            config,
            seed,
            frame_index: 0,
        }
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .env("REELFORGE_FRAME_INDEX", self.frame_index.to_string())
            .env("REELFORGE_WIDTH", self.config.width.to_string())
            .env("REELFORGE_HEIGHT", self.config.height.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(seed) = self.seed {
            // Per-frame seed so frames differ but the run stays reproducible.
            cmd.env("REELFORGE_SEED", seed.wrapping_add(self.frame_index).to_string());
        }
        cmd
    }

    /// Run the program to completion; it is killed once `timeout_secs` elapses.
    async fn run_once(&self) -> Result<Vec<u8>, ModelError> {
        let mut cmd = self.build_command();
        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            cmd.output(),
        )
        .await
        .map_err(|_| ModelError::Timeout(self.config.timeout_secs))?
        .map_err(|source| ModelError::Spawn {
            program: self.config.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ModelError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Drive `run_once` from synchronous code. Sampling runs on a blocking
    /// thread, so the surrounding runtime is reused when there is one.
    fn run_blocking(&self) -> Result<Vec<u8>, ModelError> {
        match Handle::try_current() {
            Ok(handle) => handle.block_on(self.run_once()),
            Err(_) => Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(self.run_once()),
        }
    }
}

/// Interpret model output as a `width`x`height` frame.
///
/// Exactly `width * height * 3` bytes are taken as raw rgb24; anything else
/// must decode as an image of the expected size.
pub fn decode_frame(bytes: Vec<u8>, width: u32, height: u32) -> Result<Frame, ModelError> {
    let raw_len = frame_len(width, height)?;
    if bytes.len() == raw_len {
        return Frame::from_raw(width, height, bytes).ok_or(ModelError::Buffer(width, height));
    }

    let len = bytes.len();
    let frame = image::load_from_memory(&bytes)
        .map_err(|_| ModelError::Undecodable(len))?
        .to_rgb8();
    let (actual_width, actual_height) = frame.dimensions();
    if (actual_width, actual_height) != (width, height) {
        return Err(ModelError::FrameSize {
            width,
            height,
            actual_width,
            actual_height,
        });
    }
    Ok(frame)
}

impl DiffusionModel for CommandModel {
    fn sample(&mut self) -> Result<Frame, ModelError> {
        debug!(
            "[MODEL] Running '{}' for frame {}",
            self.config.program, self.frame_index
        );
        let bytes = self.run_blocking()?;
        let frame = decode_frame(bytes, self.config.width, self.config.height)?;
        self.frame_index += 1;
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn name(&self) -> &str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn config(program: &str, args: &[&str]) -> CommandModelConfig {
        CommandModelConfig {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            width: 2,
            height: 2,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_decode_raw_rgb() {
        let frame = decode_frame(vec![7u8; 12], 2, 2).unwrap();
        assert_eq!(frame.get_pixel(1, 1), &Rgb([7, 7, 7]));
    }

    #[test]
    fn test_decode_png() {
        let img = RgbImage::from_pixel(3, 2, Rgb([10, 20, 30]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();
        let frame = decode_frame(png, 3, 2).unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_png_wrong_size() {
        let img = RgbImage::from_pixel(4, 4, Rgb([0, 0, 0]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageOutputFormat::Png)
            .unwrap();
        let err = decode_frame(png, 3, 2).unwrap_err();
        assert!(matches!(err, ModelError::FrameSize { actual_width: 4, .. }));
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_frame(vec![1, 2, 3], 2, 2).unwrap_err();
        assert!(matches!(err, ModelError::Undecodable(3)));
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let err = decode_frame(vec![0u8; 12], u32::MAX, u32::MAX).unwrap_err();
        assert!(matches!(err, ModelError::Buffer(_, _)));
    }

    #[test]
    fn test_missing_program_fails_to_spawn() {
        let mut model = CommandModel::new(config("__reelforge_no_such_model__", &[]), None);
        assert!(matches!(model.sample(), Err(ModelError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_model_emits_raw_frames() {
        // 12 bytes = 2x2 rgb24
        let mut model = CommandModel::new(
            config("sh", &["-c", "printf 'abcdefghijkl'"]),
            Some(9),
        );
        let frame = model.sample().unwrap();
        assert_eq!(frame.get_pixel(0, 0), &Rgb([b'a', b'b', b'c']));
    }

    #[cfg(unix)]
    #[test]
    fn test_shell_model_sees_seed_env() {
        // Fails unless the per-frame seed is exported.
        let script = "[ \"$REELFORGE_SEED\" = \"9\" ] && printf 'abcdefghijkl'";
        let mut model = CommandModel::new(config("sh", &["-c", script]), Some(9));
        assert!(model.sample().is_ok());
        // Second frame gets seed 10, so the check fails.
        assert!(matches!(model.sample(), Err(ModelError::CommandFailed { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_kills_model() {
        let mut cfg = config("sh", &["-c", "sleep 5"]);
        cfg.timeout_secs = 0;
        let mut model = CommandModel::new(cfg, None);
        assert!(matches!(model.sample(), Err(ModelError::Timeout(0))));
    }

    #[cfg(unix)]
    #[test]
    fn test_timeout_returns_while_grandchild_holds_stdout() {
        // The backgrounded sleep inherits stdout and outlives its parent.
        let mut cfg = config("sh", &["-c", "sleep 30 & sleep 30"]);
        cfg.timeout_secs = 1;
        let mut model = CommandModel::new(cfg, None);
        let started = std::time::Instant::now();
        assert!(matches!(model.sample(), Err(ModelError::Timeout(1))));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test(flavor = "multi_thread")]
    async fn test_sample_on_blocking_thread_uses_runtime() {
        let mut model = CommandModel::new(config("sh", &["-c", "printf 'abcdefghijkl'"]), None);
        let frame = tokio::task::spawn_blocking(move || model.sample())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame.dimensions(), (2, 2));
    }
}

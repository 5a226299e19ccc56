// ReelForge Diffusion Model Layer
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// A model produces one RGB frame per `sample()` call. Backends:
//   • noise   – built-in seeded reverse-diffusion sampler (no weights)
//   • command – any external program that writes a frame to stdout

pub mod command_backend;
pub mod noise_sampler;

use crate::config::{ModelConfig, MAX_FRAME_DIMENSION};
use image::RgbImage;
use thiserror::Error;

pub use command_backend::CommandModel;
pub use noise_sampler::NoiseSampler;

/// A single generated RGB frame.
pub type Frame = RgbImage;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to launch model command '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("model command timed out after {0}s")]
    Timeout(u64),
    #[error("frame is {actual_width}x{actual_height}, expected {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("model output of {0} bytes is neither raw rgb24 nor a decodable image")]
    Undecodable(usize),
    #[error("sampler buffer could not be shaped into a {0}x{1} frame")]
    Buffer(u32, u32),
    #[error("model I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte length of one rgb24 frame, refusing sizes outside the accepted range.
pub fn frame_len(width: u32, height: u32) -> Result<usize, ModelError> {
    if width == 0 || height == 0 || width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
        return Err(ModelError::Buffer(width, height));
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|px| px.checked_mul(3))
        .ok_or(ModelError::Buffer(width, height))
}

pub trait DiffusionModel: Send {
    /// Draw the next frame.
    fn sample(&mut self) -> Result<Frame, ModelError>;

    /// Output frame size as (width, height).
    fn dimensions(&self) -> (u32, u32);

    fn name(&self) -> &str;
}

/// Construct the backend named by `config`, seeded with `seed` when given.
pub fn build_model(config: &ModelConfig, seed: Option<u64>) -> Box<dyn DiffusionModel> {
    match config {
        ModelConfig::Noise(c) => Box::new(NoiseSampler::new(c.clone(), seed)),
        ModelConfig::Command(c) => Box::new(CommandModel::new(c.clone(), seed)),
    }
}

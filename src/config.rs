// ReelForge Segment Configuration
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// One TOML file describes one segment: how many frames to sample, the
// frame rate, and which diffusion backend produces the frames.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_FRAMES: u32 = 60;
pub const DEFAULT_FPS: u32 = 24;
pub const DEFAULT_FRAME_SIZE: u32 = 256;
pub const DEFAULT_STEPS: u32 = 30;
/// Largest accepted frame width or height.
pub const MAX_FRAME_DIMENSION: u32 = 8192;
/// Frames are held in memory until encoded, so a segment is capped.
pub const MAX_FRAMES: u32 = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-segment settings loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentConfig {
    #[serde(default = "default_frames")]
    pub frames: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    pub model: ModelConfig,
}

/// The `[model]` table. `backend` selects the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ModelConfig {
    Noise(NoiseModelConfig),
    Command(CommandModelConfig),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NoiseModelConfig {
    #[serde(default = "default_frame_size")]
    pub width: u32,
    #[serde(default = "default_frame_size")]
    pub height: u32,
    /// Reverse-diffusion steps per frame.
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// Phase advance of the target field between consecutive frames.
    #[serde(default = "default_drift")]
    pub drift: f32,
    /// Amplitude of noise left in the final frame.
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f32,
}

impl Default for NoiseModelConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_FRAME_SIZE,
            height: DEFAULT_FRAME_SIZE,
            steps: DEFAULT_STEPS,
            drift: default_drift(),
            noise_floor: default_noise_floor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandModelConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_frame_size")]
    pub width: u32,
    #[serde(default = "default_frame_size")]
    pub height: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_frames() -> u32 {
    DEFAULT_FRAMES
}
fn default_fps() -> u32 {
    DEFAULT_FPS
}
fn default_frame_size() -> u32 {
    DEFAULT_FRAME_SIZE
}
fn default_steps() -> u32 {
    DEFAULT_STEPS
}
fn default_drift() -> f32 {
    0.04
}
fn default_noise_floor() -> f32 {
    0.02
}
fn default_timeout_secs() -> u64 {
    120
}

impl ModelConfig {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            ModelConfig::Noise(c) => (c.width, c.height),
            ModelConfig::Command(c) => (c.width, c.height),
        }
    }

}

impl SegmentConfig {
    /// Read, parse and validate a segment config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SegmentConfig = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames == 0 {
            return Err(ConfigError::Invalid("frames must be greater than 0".into()));
        }
        if self.frames > MAX_FRAMES {
            return Err(ConfigError::Invalid(format!(
                "frames must be at most {}, got {}",
                MAX_FRAMES, self.frames
            )));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be greater than 0".into()));
        }
        let (width, height) = self.model.dimensions();
        if width == 0 || height == 0 {
            return Err(ConfigError::Invalid(format!(
                "frame size {}x{} has a zero dimension",
                width, height
            )));
        }
        if width > MAX_FRAME_DIMENSION || height > MAX_FRAME_DIMENSION {
            return Err(ConfigError::Invalid(format!(
                "frame size {}x{} exceeds {}x{}",
                width, height, MAX_FRAME_DIMENSION, MAX_FRAME_DIMENSION
            )));
        }
        match &self.model {
            ModelConfig::Noise(c) if c.steps == 0 => {
                Err(ConfigError::Invalid("model.steps must be greater than 0".into()))
            }
            ModelConfig::Noise(c) if !(0.0..=1.0).contains(&c.noise_floor) => Err(
                ConfigError::Invalid("model.noise_floor must be within [0, 1]".into()),
            ),
            ModelConfig::Command(c) if c.program.trim().is_empty() => {
                Err(ConfigError::Invalid("model.program must not be empty".into()))
            }
            _ => Ok(()),
        }
    }
}

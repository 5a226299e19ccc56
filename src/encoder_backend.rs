// ReelForge Encoder Backend - Device Selection
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Picks the H.264 encoder: NVENC when an NVIDIA GPU answers nvidia-smi,
// otherwise libx264 on the CPU. Frame sampling always runs on the rayon pool.

use std::process::Command;
use tracing::{info, warn};

pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
pub const DEFAULT_FPS: u32 = 24;

/// Encoder backend selection
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderBackend {
    /// NVIDIA GPU with NVENC (detected via nvidia-smi)
    Nvenc { name: String, driver_version: String },
    /// CPU fallback
    Cpu { threads: usize },
}

impl std::fmt::Display for EncoderBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncoderBackend::Nvenc {
                name,
                driver_version,
            } => write!(f, "NVENC: {} (Driver {})", name, driver_version),
            EncoderBackend::Cpu { threads } => write!(f, "CPU ({} threads)", threads),
        }
    }
}

impl EncoderBackend {
    /// Detect the best available backend.
    pub fn detect() -> Self {
        if let Some(nvenc) = Self::try_nvenc() {
            return nvenc;
        }
        let threads = rayon::current_num_threads();
        warn!("[GPU] No NVIDIA GPU detected. Encoding on CPU ({} threads)", threads);
        EncoderBackend::Cpu { threads }
    }

    pub fn cpu() -> Self {
        EncoderBackend::Cpu {
            threads: rayon::current_num_threads(),
        }
    }

    fn try_nvenc() -> Option<Self> {
        let output = Command::new("nvidia-smi")
            .args(["--query-gpu=name,driver_version", "--format=csv,noheader"])
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let backend = parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))?;
        info!("[GPU] ✓ NVIDIA GPU detected: {}", backend);
        Some(backend)
    }

    pub fn video_codec(&self) -> &'static str {
        match self {
            EncoderBackend::Nvenc { .. } => "h264_nvenc",
            EncoderBackend::Cpu { .. } => DEFAULT_VIDEO_CODEC,
        }
    }

    /// Quality arguments that go after `-c:v <codec>`.
    pub fn codec_args(&self) -> Vec<&'static str> {
        match self {
            EncoderBackend::Nvenc { .. } => {
                vec!["-preset", "p4", "-rc", "vbr", "-cq", "23", "-b:v", "0"]
            }
            EncoderBackend::Cpu { .. } => vec!["-preset", "medium", "-crf", "23"],
        }
    }
}

/// First line of `nvidia-smi --format=csv,noheader` output: "<name>, <driver>".
fn parse_nvidia_smi(stdout: &str) -> Option<EncoderBackend> {
    let line = stdout.lines().next()?;
    let mut parts = line.split(',');
    let name = parts.next()?.trim();
    let driver_version = parts.next()?.trim();
    if name.is_empty() || driver_version.is_empty() {
        return None;
    }
    Some(EncoderBackend::Nvenc {
        name: name.to_string(),
        driver_version: driver_version.to_string(),
    })
}

/// Frame rate plus encoder used by every ffmpeg re-encode in the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub fps: u32,
    pub backend: EncoderBackend,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            backend: EncoderBackend::cpu(),
        }
    }
}

impl EncodeSettings {
    pub fn with_fps(&self, fps: u32) -> Self {
        Self {
            fps,
            backend: self.backend.clone(),
        }
    }

    /// `-c:v <codec> <quality args> -pix_fmt yuv420p -r <fps>`
    pub fn video_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.backend.video_codec().to_string()];
        args.extend(self.backend.codec_args().into_iter().map(String::from));
        args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            self.fps.to_string(),
        ]);
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nvidia_smi() {
        let backend = parse_nvidia_smi("NVIDIA GeForce RTX 4090, 550.54.14\n").unwrap();
        assert_eq!(backend.video_codec(), "h264_nvenc");
        assert_eq!(
            backend.to_string(),
            "NVENC: NVIDIA GeForce RTX 4090 (Driver 550.54.14)"
        );
    }

    #[test]
    fn test_parse_nvidia_smi_garbage() {
        assert!(parse_nvidia_smi("").is_none());
        assert!(parse_nvidia_smi("No devices were found").is_none());
    }

    #[test]
    fn test_default_settings_use_libx264_at_24fps() {
        let args = EncodeSettings::default().video_args();
        assert_eq!(&args[..2], &["-c:v", "libx264"]);
        let r = args.iter().position(|a| a == "-r").unwrap();
        assert_eq!(args[r + 1], "24");
        assert!(args.contains(&"yuv420p".to_string()));
    }
}

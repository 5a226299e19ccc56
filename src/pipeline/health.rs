// ReelForge Dependency Health Check
// Copyright (c) 2026 Xing_The_Creator | ReelForge

use crate::pipeline::media_probe::Toolchain;
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

/// First line of `<binary> -version`, or `None` when it cannot be run.
pub fn tool_version(binary: &Path) -> Option<String> {
    let output = Command::new(binary).arg("-version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|l| l.trim().to_string())
}

/// Names of required binaries that are missing or broken.
pub fn check_dependencies(tools: &Toolchain) -> Vec<String> {
    let mut missing = Vec::new();
    for binary in [&tools.ffmpeg, &tools.ffprobe] {
        match tool_version(binary) {
            Some(version) => info!("[HEALTH] ✓ {}", version),
            None => {
                warn!("[HEALTH] ✗ {} not available", binary.display());
                missing.push(binary.display().to_string());
            }
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_missing_binaries_are_reported() {
        let tools = Toolchain {
            ffmpeg: PathBuf::from("__reelforge_missing_ffmpeg__"),
            ffprobe: PathBuf::from("__reelforge_missing_ffprobe__"),
        };
        let missing = check_dependencies(&tools);
        assert_eq!(
            missing,
            vec![
                "__reelforge_missing_ffmpeg__".to_string(),
                "__reelforge_missing_ffprobe__".to_string()
            ]
        );
    }
}

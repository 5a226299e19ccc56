// ReelForge Validation Gate: Null-Decode Integrity Checker
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Performs a "Null Decode" pass on a media file: FFmpeg reads and decodes
// every packet but writes nothing. Any bitstream corruption surfaces as
// text on stderr.

use crate::pipeline::media_probe::{safe_arg_path, Toolchain};
use std::path::Path;
use tokio::process::Command;
use tracing::{error, info};

pub struct ValidationGate;

impl ValidationGate {
    /// Deep-stream integrity check on a media file.
    ///
    /// Returns `true` if FFmpeg can fully decode the file with zero errors.
    pub async fn verify(tools: &Toolchain, path: &Path) -> bool {
        if !path.exists() {
            error!("[VALIDATION] ❌ Missing file: {:?}", path);
            return false;
        }

        let output = Command::new(&tools.ffmpeg)
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(safe_arg_path(path))
            .args(["-f", "null", "-"])
            .kill_on_drop(true)
            .output()
            .await;

        match output {
            Ok(res) => {
                let stderr = String::from_utf8_lossy(&res.stderr);
                if res.status.success() && stderr.trim().is_empty() {
                    info!(
                        "[VALIDATION] ✅ Segment verified: {:?}",
                        path.file_name().unwrap_or_default()
                    );
                    true
                } else {
                    error!("[VALIDATION] ❌ Corruption in {:?}: {}", path, stderr.trim());
                    false
                }
            }
            Err(e) => {
                error!("[VALIDATION] Failed to spawn ffmpeg for verification: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_verify_nonexistent_file() {
        let result = ValidationGate::verify(
            &Toolchain::default(),
            &PathBuf::from("__nonexistent_segment_xyz.mp4"),
        )
        .await;
        assert!(!result, "Non-existent file should fail validation");
    }

    #[tokio::test]
    async fn test_verify_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();
        assert!(!ValidationGate::verify(&Toolchain::default(), &path).await);
    }
}

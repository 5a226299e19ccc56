// ReelForge Run Manifest: Resumable Segment Generation
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// After every finished segment the run state is written to
// `<work_dir>/run_manifest.json`. A later `--resume` run skips segments
// whose config (path and contents) and seed are unchanged and whose file is
// still on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const MANIFEST_FILE: &str = "run_manifest.json";

/// One generated segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SegmentRecord {
    pub index: usize,
    pub config: PathBuf,
    /// SHA-256 of the config file when the segment was generated.
    #[serde(default)]
    pub config_sha256: String,
    pub seed: Option<u64>,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunManifest {
    /// Final output the run is producing.
    pub output: PathBuf,
    pub segments: Vec<SegmentRecord>,
    /// Unix seconds of the last save.
    pub timestamp: u64,
}

impl RunManifest {
    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            segments: Vec::new(),
            timestamp: unix_now(),
        }
    }

    pub fn path_in(work_dir: &Path) -> PathBuf {
        work_dir.join(MANIFEST_FILE)
    }

    /// Record a finished segment, replacing any older record for the same index.
    pub fn record(&mut self, record: SegmentRecord) {
        self.segments.retain(|s| s.index != record.index);
        self.segments.push(record);
        self.segments.sort_by_key(|s| s.index);
    }

    /// Path of a reusable segment, if one matches and still exists.
    pub fn completed(
        &self,
        index: usize,
        config: &Path,
        config_sha256: &str,
        seed: Option<u64>,
    ) -> Option<&Path> {
        self.segments
            .iter()
            .find(|s| {
                s.index == index
                    && s.config == config
                    && s.config_sha256 == config_sha256
                    && s.seed == seed
            })
            .filter(|s| s.path.exists())
            .map(|s| s.path.as_path())
    }

    pub fn save(&mut self, work_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(work_dir)
            .with_context(|| format!("creating work dir {:?}", work_dir))?;
        self.timestamp = unix_now();
        let path = Self::path_in(work_dir);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).with_context(|| format!("writing manifest {:?}", path))?;
        info!("[RECOVERY] 💾 Manifest saved: {:?}", path);
        Ok(path)
    }

    /// Load the manifest from `work_dir`; `None` when absent or unreadable.
    pub fn load(work_dir: &Path) -> Option<Self> {
        let path = Self::path_in(work_dir);
        if !path.exists() {
            return None;
        }

        match fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str::<RunManifest>(&json) {
                Ok(manifest) => {
                    info!(
                        "[RECOVERY] 📂 Found manifest: {} segments done for {:?}",
                        manifest.segments.len(),
                        manifest.output
                    );
                    Some(manifest)
                }
                Err(e) => {
                    error!("[RECOVERY] Failed to parse manifest: {}", e);
                    None
                }
            },
            Err(e) => {
                error!("[RECOVERY] Failed to read manifest: {}", e);
                None
            }
        }
    }

    pub fn clear(work_dir: &Path) -> Result<()> {
        let path = Self::path_in(work_dir);
        if path.exists() {
            fs::remove_file(&path).with_context(|| format!("removing manifest {:?}", path))?;
            info!("[RECOVERY] 🗑️ Manifest cleared.");
        }
        Ok(())
    }
}

/// Hex SHA-256 of a config file's contents.
pub fn config_digest(path: &Path) -> Result<String> {
    let mut file = File::open(path).with_context(|| format!("opening config {:?}", path))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0; 4096];

    loop {
        let count = file.read(&mut buffer)?;
        if count == 0 {
            break;
        }
        hasher.update(&buffer[..count]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

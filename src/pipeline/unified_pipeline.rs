// ReelForge Production Pipeline - Orchestrator
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// generate every segment -> stitch -> overlay audio (or move) -> output

use crate::encoder_backend::EncodeSettings;
use crate::pipeline::audio_tools::add_audio;
use crate::pipeline::generator::generate_segment;
use crate::pipeline::media_probe::Toolchain;
use crate::pipeline::recovery::{config_digest, RunManifest, SegmentRecord};
use crate::pipeline::validation_gate::ValidationGate;
use crate::pipeline::video_stitcher::{stitch_segments, StitchMode, VideoStitcher};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_OUTPUT: &str = "final.mp4";
pub const STITCHED_FILE: &str = "stitched.mp4";
const WORK_DIR_NAME: &str = ".reelforge_work";

/// Configuration for one production run
pub struct PipelineConfig {
    /// One TOML file per segment, in playback order
    pub configs: Vec<PathBuf>,
    /// Seeds matched to configs by index
    pub seeds: Vec<u64>,
    pub audio: Option<PathBuf>,
    pub output: PathBuf,
    /// Where segments and the stitched file live (default: next to output)
    pub work_dir: Option<PathBuf>,
    pub encode: EncodeSettings,
    pub stitch_mode: StitchMode,
    /// Null-decode each segment after encoding
    pub verify: bool,
    /// Reuse segments recorded in the run manifest
    pub resume: bool,
    /// Leave intermediates on disk
    pub keep_work: bool,
    pub progress_callback: Option<Arc<dyn Fn(&str) + Send + Sync>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            configs: Vec::new(),
            seeds: Vec::new(),
            audio: None,
            output: PathBuf::from(DEFAULT_OUTPUT),
            work_dir: None,
            encode: EncodeSettings::default(),
            stitch_mode: StitchMode::Compose,
            verify: false,
            resume: false,
            keep_work: false,
            progress_callback: None,
        }
    }
}

impl PipelineConfig {
    pub fn resolved_work_dir(&self) -> PathBuf {
        match &self.work_dir {
            Some(dir) => dir.clone(),
            None => default_work_dir(&self.output),
        }
    }
}

/// Seed for segment `index`; configs past the end of `seeds` get none.
pub fn seed_for(seeds: &[u64], index: usize) -> Option<u64> {
    seeds.get(index).copied()
}

pub fn segment_path(work_dir: &Path, index: usize) -> PathBuf {
    work_dir.join(format!("segment_{}.mp4", index))
}

pub fn default_work_dir(output: &Path) -> PathBuf {
    output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .join(WORK_DIR_NAME)
}

/// Rename, falling back to copy + remove across filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to).with_context(|| format!("copying {:?} to {:?}", from, to))?;
    std::fs::remove_file(from).with_context(|| format!("removing {:?}", from))?;
    Ok(())
}

pub struct ProductionPipeline {
    tools: Toolchain,
}

impl ProductionPipeline {
    pub fn new(tools: Toolchain) -> Self {
        Self { tools }
    }

    /// Execute the full pipeline and return the output path.
    pub async fn run(&self, config: &PipelineConfig) -> Result<PathBuf> {
        if config.configs.is_empty() {
            bail!("at least one segment config is required");
        }
        let missing: Vec<&PathBuf> = config.configs.iter().filter(|p| !p.is_file()).collect();
        if !missing.is_empty() {
            bail!("segment config(s) not found: {:?}", missing);
        }
        if config.seeds.len() > config.configs.len() {
            warn!(
                "[PIPELINE] {} seeds for {} configs; extra seeds ignored",
                config.seeds.len(),
                config.configs.len()
            );
        }
        if let Some(audio) = &config.audio {
            if !audio.is_file() {
                bail!("audio file {:?} not found", audio);
            }
        }

        let work_dir = config.resolved_work_dir();
        let created_work_dir = !work_dir.exists();
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("creating work dir {:?}", work_dir))?;
        if let Some(parent) = config.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating output dir {:?}", parent))?;
        }

        let mut manifest = if config.resume {
            RunManifest::load(&work_dir).unwrap_or_else(|| RunManifest::new(&config.output))
        } else {
            RunManifest::new(&config.output)
        };

        self.report_progress(
            config,
            &format!(
                "Starting pipeline: {} segments, encoder {}",
                config.configs.len(),
                config.encode.backend
            ),
        );

        let mut segments = Vec::with_capacity(config.configs.len());
        for (i, cfg) in config.configs.iter().enumerate() {
            let seed = seed_for(&config.seeds, i);
            let seg_path = segment_path(&work_dir, i);
            let digest = config_digest(cfg)?;

            if config.resume {
                if let Some(done) = manifest.completed(i, cfg, &digest, seed) {
                    self.report_progress(
                        config,
                        &format!("Reusing segment {} from {:?}", i, done),
                    );
                    segments.push(done.to_path_buf());
                    continue;
                }
            }

            self.report_progress(
                config,
                &format!("Generating segment {} from {} (seed={:?})...", i, cfg.display(), seed),
            );
            generate_segment(&self.tools, cfg, seed, &seg_path, &config.encode)
                .await
                .with_context(|| format!("segment {} ({:?})", i, cfg))?;

            if config.verify && !ValidationGate::verify(&self.tools, &seg_path).await {
                bail!("segment {} failed integrity check: {:?}", i, seg_path);
            }

            manifest.record(SegmentRecord {
                index: i,
                config: cfg.clone(),
                config_sha256: digest,
                seed,
                path: seg_path.clone(),
            });
            manifest.save(&work_dir)?;
            segments.push(seg_path);
        }

        let stitched = work_dir.join(STITCHED_FILE);
        self.report_progress(config, "Stitching segments...");
        match config.stitch_mode {
            StitchMode::Compose => {
                stitch_segments(&self.tools, &segments, &stitched, &config.encode).await?
            }
            StitchMode::Copy => {
                VideoStitcher::finalize(
                    &self.tools,
                    &segments,
                    &stitched,
                    StitchMode::Copy,
                    &config.encode,
                )
                .await?
            }
        };

        match &config.audio {
            Some(audio) => {
                self.report_progress(config, &format!("Adding audio {}...", audio.display()));
                add_audio(&self.tools, &stitched, audio, &config.output, &config.encode).await?;
                let _ = std::fs::remove_file(&stitched);
            }
            None => {
                self.report_progress(
                    config,
                    &format!(
                        "No audio specified, saving stitched video to {}",
                        config.output.display()
                    ),
                );
                move_file(&stitched, &config.output)?;
            }
        }

        if !config.keep_work {
            self.cleanup(&work_dir, &segments, created_work_dir);
        }

        self.report_progress(config, &format!("Video ready: {}", config.output.display()));
        Ok(config.output.clone())
    }

    /// Remove only what this run produced; the directory itself only if we made it.
    fn cleanup(&self, work_dir: &Path, segments: &[PathBuf], created_work_dir: bool) {
        for segment in segments {
            if let Err(e) = std::fs::remove_file(segment) {
                warn!("[PIPELINE] Cleanup warning for {:?}: {}", segment, e);
            }
        }
        if let Err(e) = RunManifest::clear(work_dir) {
            warn!("[PIPELINE] Cleanup warning: {}", e);
        }
        if created_work_dir {
            let _ = std::fs::remove_dir(work_dir);
        }
    }

    fn report_progress(&self, config: &PipelineConfig, msg: &str) {
        info!("[PIPELINE] {}", msg);
        if let Some(ref callback) = config.progress_callback {
            callback(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_seed_for_matches_by_index() {
        let seeds = [10, 20];
        assert_eq!(seed_for(&seeds, 0), Some(10));
        assert_eq!(seed_for(&seeds, 1), Some(20));
        assert_eq!(seed_for(&seeds, 2), None);
        assert_eq!(seed_for(&[], 0), None);
    }

    #[test]
    fn test_segment_path_naming() {
        assert_eq!(
            segment_path(Path::new("work"), 3),
            PathBuf::from("work/segment_3.mp4")
        );
    }

    #[test]
    fn test_default_work_dir_sits_next_to_output() {
        assert_eq!(
            default_work_dir(Path::new("final.mp4")),
            PathBuf::from("./.reelforge_work")
        );
        assert_eq!(
            default_work_dir(Path::new("/renders/final.mp4")),
            PathBuf::from("/renders/.reelforge_work")
        );
    }

    #[test]
    fn test_move_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("stitched.mp4");
        let to = dir.path().join("final.mp4");
        std::fs::write(&from, b"video").unwrap();
        move_file(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_run_requires_configs() {
        let pipeline = ProductionPipeline::new(Toolchain::default());
        let err = pipeline.run(&PipelineConfig::default()).await.unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[tokio::test]
    async fn test_run_rejects_missing_config_before_work() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let messages = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = messages.clone();
        let callback: Arc<dyn Fn(&str) + Send + Sync> =
            Arc::new(move |m: &str| sink.lock().unwrap().push(m.to_string()));
        let config = PipelineConfig {
            configs: vec![dir.path().join("missing.toml")],
            work_dir: Some(work.clone()),
            progress_callback: Some(callback),
            ..Default::default()
        };
        let err = ProductionPipeline::new(Toolchain::default())
            .run(&config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(!work.exists());
        assert!(messages.lock().unwrap().is_empty());
    }
}

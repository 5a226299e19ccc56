// ReelForge Pipeline Modules
// Copyright (c) 2026 Xing_The_Creator | ReelForge

pub mod audio_tools;
pub mod generator;
pub mod health;
pub mod media_probe;
pub mod recovery;
pub mod unified_pipeline;
pub mod validation_gate;
pub mod video_stitcher;

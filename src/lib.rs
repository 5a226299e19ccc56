// ReelForge Library Root
// Copyright (c) 2026 Xing_The_Creator | ReelForge

pub mod config;
pub mod encoder_backend;
pub mod model;
pub mod pipeline;

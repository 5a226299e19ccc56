// ReelForge Main Entry Point
// Copyright (c) 2026 Xing_The_Creator | ReelForge

use reelforge::encoder_backend::{EncodeSettings, EncoderBackend};
use reelforge::pipeline::audio_tools::add_audio;
use reelforge::pipeline::generator::generate_segment;
use reelforge::pipeline::health::check_dependencies;
use reelforge::pipeline::media_probe::Toolchain;
use reelforge::pipeline::unified_pipeline::{PipelineConfig, ProductionPipeline, DEFAULT_OUTPUT};
use reelforge::pipeline::video_stitcher::{StitchMode, VideoStitcher};

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "reelforge")]
#[command(about = "Generate video segments with a diffusion model, stitch them and add audio", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every segment, stitch them and optionally overlay audio
    Run {
        /// Config TOML files for each segment
        #[arg(long, num_args = 1.., required = true)]
        configs: Vec<PathBuf>,

        /// Seeds corresponding to each config
        #[arg(long, num_args = 1..)]
        seeds: Vec<u64>,

        /// Path to audio file to overlay
        #[arg(long)]
        audio: Option<PathBuf>,

        /// Output video path
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Directory for segments and the stitched intermediate
        #[arg(long)]
        work_dir: Option<PathBuf>,

        /// Join segments with stream copy instead of re-encoding
        #[arg(long)]
        fast_stitch: bool,

        /// Use NVENC when an NVIDIA GPU is present
        #[arg(long)]
        hw_encode: bool,

        /// Null-decode each segment after encoding
        #[arg(long)]
        verify: bool,

        /// Skip segments already recorded in the work directory
        #[arg(long)]
        resume: bool,

        /// Keep intermediate files
        #[arg(long)]
        keep_work: bool,
    },

    /// Generate a single segment
    Segment {
        /// Segment config TOML
        #[arg(short, long)]
        config: PathBuf,

        #[arg(short, long)]
        seed: Option<u64>,

        #[arg(short, long, default_value = "segment.mp4")]
        output: PathBuf,

        #[arg(long)]
        hw_encode: bool,
    },

    /// Concatenate existing videos in order
    Stitch {
        /// Input videos
        #[arg(short, long, num_args = 1.., required = true)]
        inputs: Vec<PathBuf>,

        #[arg(short, long)]
        output: PathBuf,

        /// Stream copy instead of re-encoding (inputs must match)
        #[arg(long)]
        fast: bool,

        #[arg(long)]
        hw_encode: bool,
    },

    /// Overlay an audio track on a video, looping it if shorter
    Overlay {
        #[arg(short, long)]
        video: PathBuf,

        #[arg(short, long)]
        audio: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(long)]
        hw_encode: bool,
    },

    /// Check ffmpeg/ffprobe and the encoder backend
    Doctor,
}

fn encode_settings(hw_encode: bool) -> EncodeSettings {
    let backend = if hw_encode {
        EncoderBackend::detect()
    } else {
        EncoderBackend::cpu()
    };
    EncodeSettings {
        backend,
        ..EncodeSettings::default()
    }
}

fn stitch_mode(fast: bool) -> StitchMode {
    if fast {
        StitchMode::Copy
    } else {
        StitchMode::Compose
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Cli::parse();
    let tools = Toolchain::from_env();
    debug!("[MAIN] Toolchain: {:?}", tools);

    match args.command {
        Commands::Run {
            configs,
            seeds,
            audio,
            output,
            work_dir,
            fast_stitch,
            hw_encode,
            verify,
            resume,
            keep_work,
        } => {
            let config = PipelineConfig {
                configs,
                seeds,
                audio,
                output,
                work_dir,
                encode: encode_settings(hw_encode),
                stitch_mode: stitch_mode(fast_stitch),
                verify,
                resume,
                keep_work,
                progress_callback: None,
            };
            let output = ProductionPipeline::new(tools).run(&config).await?;
            println!("Video ready: {}", output.display());
        }
        Commands::Segment {
            config,
            seed,
            output,
            hw_encode,
        } => {
            let path =
                generate_segment(&tools, &config, seed, &output, &encode_settings(hw_encode))
                    .await?;
            println!("Segment ready: {}", path.display());
        }
        Commands::Stitch {
            inputs,
            output,
            fast,
            hw_encode,
        } => {
            let path = VideoStitcher::finalize(
                &tools,
                &inputs,
                &output,
                stitch_mode(fast),
                &encode_settings(hw_encode),
            )
            .await?;
            println!("Video ready: {}", path.display());
        }
        Commands::Overlay {
            video,
            audio,
            output,
            hw_encode,
        } => {
            let path =
                add_audio(&tools, &video, &audio, &output, &encode_settings(hw_encode)).await?;
            println!("Video ready: {}", path.display());
        }
        Commands::Doctor => {
            info!("--- REELFORGE v{} ---", env!("CARGO_PKG_VERSION"));
            let missing = check_dependencies(&tools);
            println!("Encoder backend: {}", EncoderBackend::detect());
            if !missing.is_empty() {
                anyhow::bail!("missing dependencies: {}", missing.join(", "));
            }
            println!("✅ ffmpeg and ffprobe available");
        }
    }

    Ok(())
}

//! FixIt AR
//!
//! Camera-guided repair assistant: sends a frame to a multimodal model and
//! renders the returned diagnosis as animated AR markers over the frame.

mod app;
mod constants;
mod core;
mod providers;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::core::paths::default_config_path;
use crate::state::{AppConfig, QuickPrompt};

#[derive(Parser)]
#[command(
    name = "fixit-ar",
    about = "Diagnose a repair scene and render animated AR guidance",
    version
)]
struct Cli {
    /// Config file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a camera frame for diagnosis and render the overlay cue
    Analyze {
        /// Camera frame (any format the image crate reads)
        frame: PathBuf,
        #[arg(long, conflicts_with = "quick")]
        prompt: Option<String>,
        /// Preset prompt: leak, power-outage, battery-jump, gas-smell
        #[arg(long)]
        quick: Option<QuickPrompt>,
        /// Output directory for analysis.json and frames/
        #[arg(long)]
        out: Option<PathBuf>,
        /// Seconds of overlay to render (defaults to one timeline)
        #[arg(long)]
        seconds: Option<f64>,
        /// Skip spoken guidance
        #[arg(long)]
        no_speech: bool,
    },
    /// Re-render a saved analysis.json
    Render {
        analysis: PathBuf,
        /// Frame to draw over; a blank demo canvas when omitted
        #[arg(long)]
        frame: Option<PathBuf>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        seconds: Option<f64>,
    },
    /// Show the effective configuration
    Config {
        /// Write the defaults to the config path if none exists
        #[arg(long)]
        init: bool,
    },
    /// List the preset diagnostic prompts
    Prompts,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;

    match cli.command {
        Commands::Analyze {
            frame,
            prompt,
            quick,
            out,
            seconds,
            no_speech,
        } => {
            app::run_analyze(
                &config,
                app::AnalyzeArgs {
                    frame,
                    prompt,
                    quick,
                    out,
                    seconds,
                    no_speech,
                },
            )
            .await
        }
        Commands::Render {
            analysis,
            frame,
            out,
            seconds,
        } => app::run_render(
            &config,
            app::RenderArgs {
                analysis,
                frame,
                out,
                seconds,
            },
        ),
        Commands::Config { init } => app::run_config(&config, &config_path, init),
        Commands::Prompts => {
            app::list_quick_prompts();
            Ok(())
        }
    }
}

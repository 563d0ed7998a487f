mod analyze;
mod context;
mod key;
mod output;
mod settings;
mod subtitle;
mod video;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use context::Context;

#[derive(Parser)]
#[command(
    name = "subgenius",
    version,
    about = "Extract SRT subtitles, generate video and analyze images with Gemini"
)]
struct Cli {
    /// Directory for settings, the key vault and logs (defaults to platform dirs)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the stored Gemini API key
    Key {
        #[command(subcommand)]
        action: key::KeyAction,
    },
    /// Extract subtitles from a video as an .srt file
    Subtitle(subtitle::SubtitleArgs),
    /// Generate a short video from a text prompt
    Video(video::VideoArgs),
    /// Describe or answer questions about an image
    Analyze(analyze::AnalyzeArgs),
    /// Inspect or reset settings
    Settings {
        #[command(subcommand)]
        action: settings::SettingsAction,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let ctx = match Context::new(cli.config_dir, cli.json) {
        Ok(ctx) => ctx,
        Err(err) => {
            output::report_error(&err, cli.json);
            return ExitCode::FAILURE;
        }
    };

    subgenius_core::init_logging(ctx.log_dir().as_deref(), cli.verbose);

    let result = match cli.command {
        Commands::Key { action } => key::run(action, &ctx).await,
        Commands::Subtitle(args) => subtitle::run(args, &ctx).await,
        Commands::Video(args) => video::run(args, &ctx).await,
        Commands::Analyze(args) => analyze::run(args, &ctx).await,
        Commands::Settings { action } => settings::run(action, &ctx),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::report_error(&err, cli.json);
            ExitCode::FAILURE
        }
    }
}

use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use subgenius_core::core::{AspectRatio, GenerationRequest};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::context::Context;
use crate::output::print_json;

#[derive(Args)]
pub struct VideoArgs {
    /// What the video should show
    pub prompt: String,

    /// Frame shape: 16:9 (landscape) or 9:16 (portrait)
    #[arg(short, long, default_value = "16:9")]
    pub aspect_ratio: AspectRatio,

    /// Output file (default: generated_video.<ext> in the current directory)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Give up after this many seconds of polling (0 waits indefinitely)
    #[arg(long)]
    pub max_wait: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoOutput {
    output: PathBuf,
    media_type: String,
    bytes: usize,
}

/// First Ctrl-C cancels the job; a second one exits immediately.
fn cancel_on_interrupt(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping video generation");
            cancel.cancel();
            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(130);
            }
        }
    })
}

pub async fn run(args: VideoArgs, ctx: &Context) -> anyhow::Result<()> {
    let mut settings = ctx.load_settings();
    if let Some(secs) = args.max_wait {
        settings.polling.max_wait_secs = secs;
    }

    let request = GenerationRequest::new(args.prompt).with_aspect_ratio(args.aspect_ratio);
    let adapter = ctx.adapter(&settings)?;

    if !ctx.json {
        eprintln!(
            "Generating {} video; this usually takes a few minutes (Ctrl-C to stop)...",
            request.aspect_ratio
        );
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_interrupt(cancel.clone());
    let result = adapter.generate_video_with_cancel(&request, &cancel).await;
    interrupt.abort();
    let video = result?;

    let output = args
        .output
        .unwrap_or_else(|| PathBuf::from(format!("generated_video.{}", video.extension())));

    tokio::fs::write(&output, &video.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    if ctx.json {
        return print_json(&VideoOutput {
            output,
            media_type: video.media_type,
            bytes: video.bytes.len(),
        });
    }

    println!("Wrote {} ({} bytes)", output.display(), video.bytes.len());
    Ok(())
}

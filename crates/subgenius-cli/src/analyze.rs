use std::path::PathBuf;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use subgenius_core::core::jobs::DEFAULT_ANALYSIS_PROMPT;
use subgenius_core::core::media::{self, FileBlob, MediaKind};

use crate::context::Context;
use crate::output::print_json;

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Image file to analyze
    pub image: PathBuf,

    /// Question or instruction about the image
    #[arg(short, long, default_value = DEFAULT_ANALYSIS_PROMPT)]
    pub prompt: String,

    /// Also write the analysis to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Serialize)]
struct AnalyzeOutput {
    text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<PathBuf>,
}

pub async fn run(args: AnalyzeArgs, ctx: &Context) -> anyhow::Result<()> {
    let settings = ctx.load_settings();

    let blob = FileBlob::new(&args.image);
    media::validate_blob(&blob, MediaKind::Image, settings.media.max_image_bytes).await?;
    let payload = media::encode(&blob).await?;

    let adapter = ctx.adapter(&settings)?;
    let result = adapter.analyze(&payload, &args.prompt).await?;

    if let Some(path) = &args.output {
        tokio::fs::write(path, &result.text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if ctx.json {
        return print_json(&AnalyzeOutput {
            text: result.text,
            output: args.output,
        });
    }

    println!("{}", result.text);
    Ok(())
}

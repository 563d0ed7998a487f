use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use subgenius_core::core::captions::{validate_srt, SrtReport};
use subgenius_core::core::media::{self, FileBlob, MediaKind};
use subgenius_core::core::ExtractionMode;

use crate::context::Context;
use crate::output::print_json;

#[derive(Args)]
pub struct SubtitleArgs {
    /// Video file to extract subtitles from
    pub video: PathBuf,

    /// What to extract: spoken dialogue (audio) or burned-in text (visual)
    #[arg(short, long, default_value = "audio")]
    pub mode: ExtractionMode,

    /// Output file; `-` prints to stdout (default: <video stem>.srt beside the video)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report structural problems in the returned SRT
    #[arg(long)]
    pub check: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubtitleOutput {
    output: Option<PathBuf>,
    mode: ExtractionMode,
    srt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<SrtReport>,
}

/// `clip.final.mp4` becomes `clip.srt`
fn default_output(video: &Path) -> PathBuf {
    let stem = video
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("subtitles");
    video.with_file_name(format!("{}.srt", stem))
}

pub async fn run(args: SubtitleArgs, ctx: &Context) -> anyhow::Result<()> {
    let settings = ctx.load_settings();

    let blob = FileBlob::new(&args.video);
    media::validate_blob(&blob, MediaKind::Video, settings.media.max_video_bytes).await?;
    let payload = media::encode(&blob).await?;

    let adapter = ctx.adapter(&settings)?;
    if !ctx.json {
        eprintln!("Extracting subtitles ({} mode)...", args.mode);
    }
    let result = adapter.transcribe(&payload, args.mode).await?;

    let target = match args.output {
        Some(path) if path.as_os_str() == "-" => None,
        Some(path) => Some(path),
        None => Some(default_output(&args.video)),
    };

    if let Some(path) = &target {
        tokio::fs::write(path, &result.text)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let report = args.check.then(|| validate_srt(&result.text));

    if ctx.json {
        return print_json(&SubtitleOutput {
            output: target,
            mode: args.mode,
            srt: result.text,
            report,
        });
    }

    match &target {
        Some(path) => println!("Wrote {}", path.display()),
        None => print!("{}", result.text),
    }

    if let Some(report) = report {
        if report.is_valid() {
            eprintln!("SRT check passed ({} cues)", report.cue_count);
        } else {
            eprintln!("SRT check found {} issue(s):", report.issues.len());
            for issue in &report.issues {
                eprintln!("  {}", issue);
            }
        }
    }

    Ok(())
}

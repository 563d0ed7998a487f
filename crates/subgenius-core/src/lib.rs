//! SubGenius Core Library
//!
//! Client-side orchestration for a hosted multimodal AI service:
//! SRT subtitle extraction from video, text-to-video generation, and
//! free-text image analysis.

pub mod core;

pub use crate::core::{CoreError, CoreResult};

use std::path::Path;
use std::sync::OnceLock;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Installs the global tracing subscriber.
///
/// Logs go to stderr (stdout is reserved for command output) and, when
/// `log_dir` is given, to a daily-rolling file in that directory.
/// Calling this more than once is a no-op.
pub fn init_logging(log_dir: Option<&Path>, verbose: bool) {
    use tracing_subscriber::prelude::*;

    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let env_filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into());

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = log_dir.and_then(|dir| {
        // Best effort: an unwritable log dir only disables the file layer.
        std::fs::create_dir_all(dir).ok()?;

        let file_appender = tracing_appender::rolling::daily(dir, "subgenius.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer);

    // Avoid panics if already initialized (tests, repeated CLI setup).
    let _ = tracing::subscriber::set_global_default(subscriber);
}

//! SRT Subtitle Utilities
//!
//! Subtitle text from the transcription service is passed through
//! unchanged. These helpers sit beside that path for callers who want to
//! inspect it:
//! - Cue model
//! - SRT parsing and export
//! - A non-destructive validator that lists structural problems
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use subgenius_core::core::captions::{parse_srt, validate_srt, export_srt};
//!
//! let report = validate_srt(&srt_text);
//! if report.is_valid() {
//!     let cues = parse_srt(&srt_text)?;
//!     let renumbered = export_srt(&cues);
//! }
//! ```

mod formats;
mod models;

pub use formats::{
    export_srt, format_timestamp, parse_srt, parse_timestamp, validate_srt, IssueKind, ParseError,
    SrtIssue, SrtReport,
};
pub use models::Cue;

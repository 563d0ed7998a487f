//! SRT Parsing, Export and Validation
//!
//! # SRT Format
//!
//! ```text
//! 1
//! 00:00:01,000 --> 00:00:04,000
//! First caption text
//!
//! 2
//! 00:00:05,500 --> 00:00:08,000
//! Second caption text
//! with multiple lines
//! ```
//!
//! Model output is not always clean, so the reader accepts CRLF line
//! endings, a UTF-8 BOM, `.` as the millisecond separator, and markdown
//! code fences around the whole document.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::Cue;

static RE_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):([0-5]\d):([0-5]\d)[,.](\d{1,3})$").expect("valid timestamp regex")
});

const ARROW: &str = "-->";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during SRT parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid timestamp format
    InvalidTimestamp(String),
    /// Invalid cue structure
    InvalidFormat(String),
    /// Missing required data
    MissingData(String),
    /// Unexpected end of input
    UnexpectedEnd,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTimestamp(s) => write!(f, "Invalid timestamp: {}", s),
            Self::InvalidFormat(s) => write!(f, "Invalid format: {}", s),
            Self::MissingData(s) => write!(f, "Missing data: {}", s),
            Self::UnexpectedEnd => write!(f, "Unexpected end of input"),
        }
    }
}

impl std::error::Error for ParseError {}

// =============================================================================
// Blocks
// =============================================================================

/// Consecutive non-blank lines
struct Block<'a> {
    /// 1-based line number of the first line
    line: usize,
    lines: Vec<&'a str>,
}

fn is_fence(line: &str) -> bool {
    line.trim_start().starts_with("```")
}

/// Splits content into blank-line separated blocks, skipping code fences
fn split_blocks(content: &str) -> Vec<Block<'_>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for (i, raw) in content.lines().enumerate() {
        let line = raw.trim_end();

        if line.trim().is_empty() || is_fence(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }

        current
            .get_or_insert_with(|| Block {
                line: i + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }

    if let Some(block) = current {
        blocks.push(block);
    }

    blocks
}

// =============================================================================
// Timestamps
// =============================================================================

/// Parses an SRT timestamp (e.g., "00:01:23,456") into milliseconds.
///
/// A fraction shorter than three digits is read as a decimal fraction,
/// so "00:00:01,5" is 1500 ms.
pub fn parse_timestamp(ts: &str) -> Result<u64, ParseError> {
    let invalid = || ParseError::InvalidTimestamp(ts.to_string());

    let caps = RE_TIMESTAMP.captures(ts.trim()).ok_or_else(invalid)?;
    let field = |i: usize| caps[i].parse::<u64>().map_err(|_| invalid());

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;

    let fraction = &caps[4];
    let scale = 10u64.pow(3 - fraction.len() as u32);
    let millis = field(4)? * scale;

    hours
        .checked_mul(60)
        .and_then(|m| m.checked_add(minutes))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(seconds))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis))
        .ok_or_else(invalid)
}

/// Formats milliseconds as an SRT timestamp (00:00:00,000)
pub fn format_timestamp(ms: u64) -> String {
    let millis = ms % 1000;
    let total_secs = ms / 1000;
    let secs = total_secs % 60;
    let total_mins = total_secs / 60;
    let mins = total_mins % 60;
    let hours = total_mins / 60;

    format!("{:02}:{:02}:{:02},{:03}", hours, mins, secs, millis)
}

/// Parses a timing line (e.g., "00:00:01,000 --> 00:00:04,000").
///
/// Anything after the end timestamp (position hints) is ignored.
fn parse_timing_line(line: &str) -> Result<(u64, u64), ParseError> {
    let (start, end) = line.split_once(ARROW).ok_or_else(|| {
        ParseError::InvalidFormat(format!("Expected 'start --> end' format: {}", line))
    })?;

    let end = end.split_whitespace().next().unwrap_or("");
    Ok((parse_timestamp(start)?, parse_timestamp(end)?))
}

// =============================================================================
// Parse / Export
// =============================================================================

/// Parses SRT content into cues.
///
/// A block without a sequence number is accepted and numbered by position.
pub fn parse_srt(content: &str) -> Result<Vec<Cue>, ParseError> {
    let mut cues = Vec::new();

    for block in split_blocks(content) {
        let mut lines = block.lines.iter().copied();
        let first = lines.next().ok_or(ParseError::UnexpectedEnd)?;

        let (index, timing) = if first.contains(ARROW) {
            ((cues.len() + 1) as u32, first)
        } else {
            let index = first.trim().parse::<u32>().map_err(|_| {
                ParseError::InvalidFormat(format!(
                    "Expected sequence number at line {}: {}",
                    block.line, first
                ))
            })?;
            (index, lines.next().ok_or(ParseError::UnexpectedEnd)?)
        };

        let (start_ms, end_ms) = parse_timing_line(timing)?;

        let text = lines.collect::<Vec<_>>().join("\n");
        if text.trim().is_empty() {
            return Err(ParseError::MissingData(format!("Text for cue {}", index)));
        }

        cues.push(Cue::new(index, start_ms, end_ms, text));
    }

    Ok(cues)
}

/// Exports cues to SRT, renumbering from 1
pub fn export_srt(cues: &[Cue]) -> String {
    let mut output = String::new();

    for (i, cue) in cues.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} {} {}\n",
            format_timestamp(cue.start_ms),
            ARROW,
            format_timestamp(cue.end_ms)
        ));
        output.push_str(&cue.text);
        output.push_str("\n\n");
    }

    output
}

// =============================================================================
// Validation
// =============================================================================

/// Kind of structural problem found by [`validate_srt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The document has no cues at all
    NoCues,
    /// Sequence number missing or not a number
    BadIndex,
    /// Sequence number does not follow the previous one
    UnexpectedIndex,
    /// Timing line missing or malformed
    BadTimestamp,
    /// Cue ends before it starts
    EndBeforeStart,
    /// Cue starts before the previous one
    OutOfOrder,
    /// Cue starts before the previous one ends
    Overlap,
    /// Cue has no text
    EmptyText,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IssueKind::NoCues => "no cues",
            IssueKind::BadIndex => "bad index",
            IssueKind::UnexpectedIndex => "unexpected index",
            IssueKind::BadTimestamp => "bad timestamp",
            IssueKind::EndBeforeStart => "end before start",
            IssueKind::OutOfOrder => "out of order",
            IssueKind::Overlap => "overlap",
            IssueKind::EmptyText => "empty text",
        };
        f.write_str(label)
    }
}

/// One problem, located by line and cue ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SrtIssue {
    /// 1-based line number in the input
    pub line: usize,
    /// 1-based position of the cue block
    pub cue: usize,
    pub kind: IssueKind,
    pub message: String,
}

impl std::fmt::Display for SrtIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {} (cue {}): {}: {}",
            self.line, self.cue, self.kind, self.message
        )
    }
}

/// Result of validating SRT text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SrtReport {
    /// Number of cue blocks found
    pub cue_count: usize,
    pub issues: Vec<SrtIssue>,
}

impl SrtReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    fn push(&mut self, line: usize, cue: usize, kind: IssueKind, message: impl Into<String>) {
        self.issues.push(SrtIssue {
            line,
            cue,
            kind,
            message: message.into(),
        });
    }
}

/// Checks SRT structure without modifying it.
///
/// Accepts the same input variations as [`parse_srt`] but keeps going
/// after a problem so every issue is reported.
pub fn validate_srt(content: &str) -> SrtReport {
    let blocks = split_blocks(content);
    let mut report = SrtReport {
        cue_count: blocks.len(),
        issues: Vec::new(),
    };

    if blocks.is_empty() {
        report.push(0, 0, IssueKind::NoCues, "document contains no cues");
        return report;
    }

    let mut previous: Option<(u64, u64)> = None;

    for (ordinal, block) in blocks.iter().enumerate() {
        let cue = ordinal + 1;
        let first = block.lines[0];

        let timing_pos = if first.contains(ARROW) {
            report.push(block.line, cue, IssueKind::BadIndex, "missing sequence number");
            0
        } else {
            match first.trim().parse::<u32>() {
                Ok(n) if n as usize == cue => {}
                Ok(n) => report.push(
                    block.line,
                    cue,
                    IssueKind::UnexpectedIndex,
                    format!("expected {}, found {}", cue, n),
                ),
                Err(_) => report.push(
                    block.line,
                    cue,
                    IssueKind::BadIndex,
                    format!("not a sequence number: {}", first.trim()),
                ),
            }
            1
        };

        let timing_line = block.line + timing_pos;
        let Some(timing) = block.lines.get(timing_pos) else {
            report.push(timing_line, cue, IssueKind::BadTimestamp, "missing timing line");
            continue;
        };

        match parse_timing_line(timing) {
            Ok((start, end)) => {
                if end < start {
                    report.push(
                        timing_line,
                        cue,
                        IssueKind::EndBeforeStart,
                        format!("{} ends before it starts", timing.trim()),
                    );
                }

                if let Some((prev_start, prev_end)) = previous {
                    if start < prev_start {
                        report.push(
                            timing_line,
                            cue,
                            IssueKind::OutOfOrder,
                            format!(
                                "starts at {} before previous cue at {}",
                                format_timestamp(start),
                                format_timestamp(prev_start)
                            ),
                        );
                    } else if start < prev_end {
                        report.push(
                            timing_line,
                            cue,
                            IssueKind::Overlap,
                            format!(
                                "starts at {} before previous cue ends at {}",
                                format_timestamp(start),
                                format_timestamp(prev_end)
                            ),
                        );
                    }
                }

                previous = Some((start, end));
            }
            Err(e) => report.push(timing_line, cue, IssueKind::BadTimestamp, e.to_string()),
        }

        if block.lines.len() <= timing_pos + 1 {
            report.push(timing_line, cue, IssueKind::EmptyText, "cue has no text");
        }
    }

    report
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "1
00:00:01,000 --> 00:00:04,000
First caption text

2
00:00:05,500 --> 00:00:08,000
Second caption text
with multiple lines
";

    #[test]
    fn test_parse_srt() {
        let cues = parse_srt(SAMPLE).unwrap();

        assert_eq!(cues.len(), 2);
        assert_eq!(cues[0], Cue::new(1, 1_000, 4_000, "First caption text"));
        assert_eq!(cues[1].index, 2);
        assert_eq!(cues[1].start_ms, 5_500);
        assert_eq!(cues[1].text, "Second caption text\nwith multiple lines");
    }

    #[test]
    fn test_parse_srt_crlf_and_bom() {
        let content = "\u{feff}1\r\n00:00:00,000 --> 00:00:02,000\r\nHello\r\n\r\n";
        let cues = parse_srt(content).unwrap();
        assert_eq!(cues, vec![Cue::new(1, 0, 2_000, "Hello")]);
    }

    #[test]
    fn test_parse_srt_inside_code_fence() {
        let content = "```srt\n1\n00:00:00,000 --> 00:00:02,000\nHola\n```\n";
        let cues = parse_srt(content).unwrap();
        assert_eq!(cues.len(), 1);
        assert_eq!(cues[0].text, "Hola");
    }

    #[test]
    fn test_parse_srt_dot_separator_and_position_hint() {
        let content = "1\n00:00:01.250 --> 00:00:02.5 X1:100 X2:200\nText\n";
        let cues = parse_srt(content).unwrap();
        assert_eq!(cues[0].start_ms, 1_250);
        assert_eq!(cues[0].end_ms, 2_500);
    }

    #[test]
    fn test_parse_srt_without_sequence_numbers() {
        let content = "00:00:00,000 --> 00:00:01,000\nA\n\n00:00:01,000 --> 00:00:02,000\nB\n";
        let cues = parse_srt(content).unwrap();
        assert_eq!(cues[0].index, 1);
        assert_eq!(cues[1].index, 2);
    }

    #[test]
    fn test_parse_srt_errors() {
        assert!(matches!(
            parse_srt("1\n00:00:01 --> 00:00:02,000\nText\n"),
            Err(ParseError::InvalidTimestamp(_))
        ));
        assert!(matches!(
            parse_srt("1\n00:00:01,000 --> 00:00:02,000\n"),
            Err(ParseError::MissingData(_))
        ));
        assert!(matches!(parse_srt("1\n"), Err(ParseError::UnexpectedEnd)));
        assert!(matches!(
            parse_srt("first\n00:00:01,000 --> 00:00:02,000\nText\n"),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_parse_empty_content() {
        assert!(parse_srt("").unwrap().is_empty());
        assert!(parse_srt("\n\n  \n").unwrap().is_empty());
    }

    #[test]
    fn test_export_srt_renumbers() {
        let cues = vec![
            Cue::new(7, 0, 1_500, "Hello"),
            Cue::new(9, 2_000, 3_723_456, "World\nAgain"),
        ];

        let srt = export_srt(&cues);
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n\
             2\n00:00:02,000 --> 01:02:03,456\nWorld\nAgain\n\n"
        );
    }

    #[test]
    fn test_export_reproduces_clean_transcript() {
        let transcript = "1\n00:00:00,000 --> 00:00:02,000\nHello\n\n";
        let cues = parse_srt(transcript).unwrap();
        assert_eq!(export_srt(&cues), transcript);
    }

    #[test]
    fn test_timestamps() {
        assert_eq!(format_timestamp(0), "00:00:00,000");
        assert_eq!(format_timestamp(3_723_456), "01:02:03,456");
        assert_eq!(format_timestamp(100 * 3_600_000), "100:00:00,000");

        assert_eq!(parse_timestamp("01:02:03,456").unwrap(), 3_723_456);
        assert_eq!(parse_timestamp(" 00:00:01.5 ").unwrap(), 1_500);
        assert!(parse_timestamp("00:61:00,000").is_err());
        assert!(parse_timestamp("1:2:3").is_err());
    }

    #[test]
    fn test_parse_timestamp_rejects_overflowing_hours() {
        assert!(matches!(
            parse_timestamp("10000000000000000:00:00,000"),
            Err(ParseError::InvalidTimestamp(_))
        ));
        assert!(parse_timestamp("99999999999999999999999:00:00,000").is_err());
    }

    #[test]
    fn test_validate_reports_overflowing_timestamp() {
        let report =
            validate_srt("1\n10000000000000000:00:00,000 --> 10000000000000000:00:01,000\nHi\n");
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::BadTimestamp);
        assert_eq!(report.issues[0].line, 2);
    }

    #[test]
    fn test_validate_clean_srt() {
        let report = validate_srt(SAMPLE);
        assert!(report.is_valid(), "{:?}", report.issues);
        assert_eq!(report.cue_count, 2);
    }

    #[test]
    fn test_validate_reports_every_issue() {
        let content = "\
1
00:00:05,000 --> 00:00:04,000
Backwards

3
00:00:03,000 --> 00:00:06,000
Out of order and misnumbered

x
00:00:05,500 --> 00:00:07,000
Overlapping

4
00:00:08,000 -> 00:00:09,000
Bad arrow

5
00:00:10,000 --> 00:00:11,000
";
        let report = validate_srt(content);
        let kinds: Vec<IssueKind> = report.issues.iter().map(|i| i.kind).collect();

        assert_eq!(report.cue_count, 5);
        assert_eq!(
            kinds,
            vec![
                IssueKind::EndBeforeStart,
                IssueKind::UnexpectedIndex,
                IssueKind::OutOfOrder,
                IssueKind::BadIndex,
                IssueKind::Overlap,
                IssueKind::BadTimestamp,
                IssueKind::EmptyText,
            ]
        );

        assert_eq!(report.issues[0].line, 2);
        assert_eq!(report.issues[1].line, 5);
        assert_eq!(report.issues[1].cue, 2);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_validate_empty_document() {
        let report = validate_srt("");
        assert_eq!(report.cue_count, 0);
        assert_eq!(report.issues[0].kind, IssueKind::NoCues);
    }

    #[test]
    fn test_validate_missing_timing_line() {
        let report = validate_srt("1\n");
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::BadTimestamp);
    }

    #[test]
    fn test_report_serializes_for_display() {
        let report = validate_srt("1\n00:00:02,000 --> 00:00:01,000\nHi\n");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cueCount"], 1);
        assert_eq!(json["issues"][0]["kind"], "end_before_start");
        assert!(report.issues[0].to_string().starts_with("line 2 (cue 1): end before start"));
    }
}

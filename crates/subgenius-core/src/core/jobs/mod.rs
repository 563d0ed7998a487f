//! Job orchestration
//!
//! [`JobAdapter`] turns user requests into API calls and normalizes the
//! results; [`PollingDriver`] carries long-running video jobs to completion.

mod adapter;
mod polling;

pub use adapter::{AdapterConfig, JobAdapter, DEFAULT_ANALYSIS_PROMPT, DEFAULT_VIDEO_MEDIA_TYPE};
pub use polling::{
    JobState, PollOutcome, PollPolicy, PollingDriver, DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL,
};

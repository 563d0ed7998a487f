//! SubGenius Core Engine
//!
//! Credential handling, media encoding, the job adapter with its polling
//! driver, and the SRT utilities that sit beside it.

pub mod ai;
pub mod captions;
pub mod credentials;
pub mod jobs;
pub mod media;
pub mod settings;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;

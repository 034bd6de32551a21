//! Shared types for the media ingestion gatekeeper: error taxonomy and
//! process bootstrap configuration used by the `gatekeeper` binary.

pub mod bootstrap;
pub mod error;

pub use error::{Error, Result};

//! Transcriber (C2): two-tier speech-to-text dispatch. Cloud is tried
//! first; local is a fallback gated by the Detection Engine's retry budget
//! (SPEC_FULL.md §4.3), not by this module.

pub mod cloud;
pub mod local;

use crate::models::config::RuntimeSettings;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Cloud,
    Local,
}

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("cloud transcription failed: {0}")]
    CloudFailed(String),
    #[error("local transcription failed: {0}")]
    LocalFailed(String),
    #[error("no transcription provider available")]
    NoProviderAvailable,
}

pub type TranscribeResult = Result<(String, Provider), TranscribeError>;

/// Everything needed to transcribe one audio segment. Exists as a trait so
/// the Detection Engine can be tested against a fake instead of a live
/// cloud endpoint or a loaded local model.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe_cloud(&self, wav: &Path, cfg: &RuntimeSettings) -> TranscribeResult;

    async fn transcribe_local(&self, wav: &Path, cfg: &RuntimeSettings) -> TranscribeResult;
}

/// The real two-tier implementation: cloud via HTTP, local via the
/// process-wide single-holder model lock. Dispatch between the two (which
/// tier runs on a given attempt) is the Detection Engine's call, not this
/// type's — see SPEC_FULL.md §4.3 step 6b.
pub struct TwoTierTranscriber {
    http: reqwest::Client,
}

impl TwoTierTranscriber {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("reqwest client builder with static config");
        Self { http }
    }
}

impl Default for TwoTierTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transcriber for TwoTierTranscriber {
    async fn transcribe_cloud(&self, wav: &Path, cfg: &RuntimeSettings) -> TranscribeResult {
        cloud::transcribe(&self.http, wav, cfg)
            .await
            .map(|text| (text, Provider::Cloud))
            .map_err(|e| TranscribeError::CloudFailed(e.to_string()))
    }

    async fn transcribe_local(&self, wav: &Path, cfg: &RuntimeSettings) -> TranscribeResult {
        local::transcribe(wav, cfg)
            .await
            .map(|text| (text, Provider::Local))
            .map_err(|e| TranscribeError::LocalFailed(e.to_string()))
    }
}

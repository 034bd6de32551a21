//! Cloud transcription: multipart POST of a wav segment to a configurable
//! HTTP endpoint (SPEC_FULL.md §4.2).

use crate::models::config::RuntimeSettings;
use anyhow::{bail, Context, Result};
use std::path::Path;

pub async fn transcribe(client: &reqwest::Client, wav: &Path, cfg: &RuntimeSettings) -> Result<String> {
    if cfg.cloud_api_url.is_empty() {
        bail!("cloud_api_url is not configured");
    }

    let bytes = tokio::fs::read(wav).await.context("reading wav segment")?;
    let file_name = wav.file_name().and_then(|n| n.to_str()).unwrap_or("segment.wav").to_string();

    let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name).mime_str("audio/wav")?;
    let form = reqwest::multipart::Form::new()
        .part("file", part)
        .text("model", cfg.cloud_model.clone())
        .text("language", "zh")
        .text("response_format", "json");

    let mut request = client.post(&cfg.cloud_api_url).multipart(form);
    if !cfg.cloud_api_key.is_empty() {
        request = request.bearer_auth(&cfg.cloud_api_key);
    }

    let response = request.send().await.context("sending cloud transcription request")?;
    if !response.status().is_success() {
        bail!("cloud transcriber returned status {}", response.status());
    }

    let body: serde_json::Value = response.json().await.context("parsing cloud transcriber response")?;
    Ok(body.get("text").and_then(|t| t.as_str()).unwrap_or("").to_string())
}

//! Local transcription: a `whisper-rs` model loaded lazily and guarded by a
//! process-wide single-holder lock (SPEC_FULL.md §4.2). Acquired only
//! around one segment's inference, never across segments or across a whole
//! task — this trades latency for steady-state memory.

use crate::models::config::RuntimeSettings;
use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use std::path::Path;
use tokio::sync::Mutex;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

struct LocalModel {
    ctx: WhisperContext,
}

impl LocalModel {
    fn load(model_path: &str) -> Result<Self> {
        let params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(model_path, params)
            .with_context(|| format!("failed to load local model from {model_path}"))?;
        Ok(Self { ctx })
    }

    fn transcribe(&self, samples: &[f32]) -> Result<String> {
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(num_cpus::get() as i32);
        params.set_language(Some("zh"));
        params.set_no_context(true);
        params.set_single_segment(false);
        params.set_print_progress(false);
        params.set_print_special(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        let mut state = self.ctx.create_state().context("failed to create whisper state")?;
        state.full(params, samples).context("failed to run whisper full()")?;

        let num_segments = state.full_n_segments().context("failed to read segment count")?;
        let mut text = String::new();
        for i in 0..num_segments {
            if let Ok(segment_text) = state.full_get_segment_text(i) {
                text.push_str(&segment_text);
            }
        }
        Ok(text.trim().to_string())
    }
}

static MODEL_SLOT: Lazy<Mutex<Option<LocalModel>>> = Lazy::new(|| Mutex::new(None));

pub async fn transcribe(wav: &Path, cfg: &RuntimeSettings) -> Result<String> {
    if cfg.local_model_path.is_empty() {
        bail!("local_model_path is not configured");
    }

    let samples = read_wav_samples(wav)?;
    let model_path = cfg.local_model_path.clone();

    let mut guard = MODEL_SLOT.lock().await;
    let needs_load = match guard.as_ref() {
        Some(_) => false,
        None => true,
    };
    if needs_load {
        let loaded = tokio::task::spawn_blocking(move || LocalModel::load(&model_path)).await??;
        *guard = Some(loaded);
    }

    let model = guard.as_ref().expect("just loaded or already present");
    let result = tokio::task::block_in_place(|| model.transcribe(&samples));

    // Release-on-every-use: drop the model and hand memory back to the
    // kernel before the guard unlocks, per SPEC_FULL.md §4.2.
    *guard = None;
    drop(guard);
    release_native_memory();

    result
}

#[cfg(unix)]
fn release_native_memory() {
    unsafe {
        libc::malloc_trim(0);
    }
}

#[cfg(not(unix))]
fn release_native_memory() {}

fn read_wav_samples(path: &Path) -> Result<Vec<f32>> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("opening wav {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1 {
        bail!("expected mono wav, got {} channels", spec.channels);
    }
    if spec.sample_rate != 16_000 {
        bail!("expected 16kHz wav, got {} Hz", spec.sample_rate);
    }

    let mut samples = Vec::new();
    for s in reader.samples::<i16>() {
        samples.push(s? as f32 / i16::MAX as f32);
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_model_path_is_an_error() {
        let cfg = RuntimeSettings {
            check_audio: true,
            check_subtitles: true,
            sanitize_metadata: true,
            enable_local_model: true,
            detailed_mode: false,
            notify_upload_success: false,
            notify_errors: true,
            audio_threshold_multi: 600,
            audio_threshold_long: 3600,
            audio_len_head: 240,
            audio_len_mid: 240,
            audio_len_tail: 300,
            audio_len_tail_long: 600,
            concurrency_detect: 2,
            concurrency_upload: 9,
            cloud_api_url: String::new(),
            cloud_api_key: String::new(),
            cloud_model: String::new(),
            local_model_path: String::new(),
            rclone_remote: "default".to_string(),
            notify_url: String::new(),
            notify_token: String::new(),
            download_proxy: String::new(),
        };

        let wav = Path::new("/nonexistent.wav");
        assert!(transcribe(wav, &cfg).await.is_err());
    }
}

//! Audio sampling plan: which segments of a file get transcribed, and in
//! what order (SPEC_FULL.md §4.3 step 5).

use crate::models::config::RuntimeSettings;

pub const SEGMENT_TAIL: &str = "片尾";
pub const SEGMENT_MID: &str = "中间";
pub const SEGMENT_HEAD: &str = "片头";

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub name: &'static str,
    pub start_s: f64,
    pub duration_s: f64,
}

/// Tail is always planned (when duration is known); mid and head only once
/// the file clears `audio_threshold_multi`. Execution order is tail → mid →
/// head — tail is the most likely ad location, so check it first.
pub fn plan_segments(duration_s: f64, cfg: &RuntimeSettings) -> Vec<Segment> {
    if duration_s <= 0.0 {
        return Vec::new();
    }

    let mut segments = Vec::with_capacity(3);

    let tail_len = if duration_s >= cfg.audio_threshold_long as f64 {
        cfg.audio_len_tail_long as f64
    } else {
        cfg.audio_len_tail as f64
    };
    let tail_start = (duration_s - tail_len).max(0.0);
    segments.push(Segment { name: SEGMENT_TAIL, start_s: tail_start, duration_s: tail_len.min(duration_s) });

    if duration_s > cfg.audio_threshold_multi as f64 {
        let mid_len = cfg.audio_len_mid as f64;
        let mid_start = (duration_s / 2.0 - mid_len / 2.0).max(0.0);
        segments.push(Segment { name: SEGMENT_MID, start_s: mid_start, duration_s: mid_len });

        let head_len = cfg.audio_len_head as f64;
        segments.push(Segment { name: SEGMENT_HEAD, start_s: 0.0, duration_s: head_len });
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RuntimeSettings {
        RuntimeSettings {
            check_audio: true,
            check_subtitles: true,
            sanitize_metadata: true,
            enable_local_model: false,
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
        }
    }

    #[test]
    fn zero_duration_plans_nothing() {
        assert_eq!(plan_segments(0.0, &cfg()), Vec::new());
    }

    #[test]
    fn short_clip_plans_only_tail() {
        let segments = plan_segments(120.0, &cfg());
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].name, SEGMENT_TAIL);
        assert_eq!(segments[0].start_s, 0.0);
        assert_eq!(segments[0].duration_s, 120.0);
    }

    #[test]
    fn long_clip_plans_all_three_in_tail_mid_head_order() {
        let segments = plan_segments(1800.0, &cfg());
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].name, SEGMENT_TAIL);
        assert_eq!(segments[1].name, SEGMENT_MID);
        assert_eq!(segments[2].name, SEGMENT_HEAD);
        assert_eq!(segments[0].start_s, 1800.0 - 300.0);
    }

    #[test]
    fn very_long_clip_uses_extended_tail_window() {
        let segments = plan_segments(4000.0, &cfg());
        assert_eq!(segments[0].duration_s, 600.0);
        assert_eq!(segments[0].start_s, 4000.0 - 600.0);
    }
}

//! Typed runtime settings (the `Config` table) and the key/type table the
//! Supervisor uses to coerce persisted string values.

use std::collections::HashMap;

/// The type a Config key is declared as. Drives coercion in
/// [`RuntimeSettings::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingType {
    Bool,
    Int,
    Str,
}

/// `(key, type, default-as-text)` — the single source of truth for every
/// Config key named in SPEC_FULL.md §6. Both schema seeding
/// ([`crate::db::schema`]) and settings resolution
/// ([`crate::supervisor::resolve_settings`]) iterate this table instead of
/// repeating key names.
pub const SETTING_DEFS: &[(&str, SettingType, &str)] = &[
    ("check_audio", SettingType::Bool, "true"),
    ("check_subtitles", SettingType::Bool, "true"),
    ("sanitize_metadata", SettingType::Bool, "true"),
    ("enable_local_model", SettingType::Bool, "false"),
    ("detailed_mode", SettingType::Bool, "false"),
    ("notify_upload_success", SettingType::Bool, "false"),
    ("notify_errors", SettingType::Bool, "true"),
    ("audio_threshold_multi", SettingType::Int, "600"),
    ("audio_threshold_long", SettingType::Int, "3600"),
    ("audio_len_head", SettingType::Int, "240"),
    ("audio_len_mid", SettingType::Int, "240"),
    ("audio_len_tail", SettingType::Int, "300"),
    ("audio_len_tail_long", SettingType::Int, "600"),
    ("concurrency_detect", SettingType::Int, "2"),
    ("concurrency_upload", SettingType::Int, "9"),
    ("cloud_api_url", SettingType::Str, ""),
    ("cloud_api_key", SettingType::Str, ""),
    ("cloud_model", SettingType::Str, "whisper-1"),
    ("local_model_path", SettingType::Str, ""),
    ("rclone_remote", SettingType::Str, "default"),
    ("notify_url", SettingType::Str, ""),
    ("notify_token", SettingType::Str, ""),
    ("download_proxy", SettingType::Str, ""),
];

pub fn setting_type(key: &str) -> Option<SettingType> {
    SETTING_DEFS.iter().find(|(k, ..)| *k == key).map(|(_, t, _)| *t)
}

/// Fully-resolved, typed configuration in effect for one task (or for the
/// Supervisor/worker pools when no task-specific overrides apply).
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeSettings {
    pub check_audio: bool,
    pub check_subtitles: bool,
    pub sanitize_metadata: bool,
    pub enable_local_model: bool,
    pub detailed_mode: bool,
    pub notify_upload_success: bool,
    pub notify_errors: bool,
    pub audio_threshold_multi: i64,
    pub audio_threshold_long: i64,
    pub audio_len_head: i64,
    pub audio_len_mid: i64,
    pub audio_len_tail: i64,
    pub audio_len_tail_long: i64,
    pub concurrency_detect: i64,
    pub concurrency_upload: i64,
    pub cloud_api_url: String,
    pub cloud_api_key: String,
    pub cloud_model: String,
    pub local_model_path: String,
    pub rclone_remote: String,
    pub notify_url: String,
    pub notify_token: String,
    pub download_proxy: String,
}

/// A coerced setting value, used as the intermediate representation between
/// raw text (persisted or overridden) and the typed struct above.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl SettingValue {
    pub fn coerce(ty: SettingType, text: &str) -> SettingValue {
        match ty {
            SettingType::Bool => SettingValue::Bool(text == "true"),
            SettingType::Int => SettingValue::Int(text.parse().unwrap_or(0)),
            SettingType::Str => SettingValue::Str(text.to_string()),
        }
    }

    /// Interpret a raw JSON value (as stored in a task's `overrides` blob)
    /// as a setting of the declared type, used by
    /// [`crate::supervisor::resolve_settings`]'s override-shadowing step.
    pub fn from_json_value(ty: SettingType, value: &serde_json::Value) -> Option<SettingValue> {
        match ty {
            SettingType::Bool => value.as_bool().map(SettingValue::Bool),
            SettingType::Int => value.as_i64().map(SettingValue::Int),
            SettingType::Str => value.as_str().map(|s| SettingValue::Str(s.to_string())),
        }
    }

    fn as_bool(&self) -> bool {
        matches!(self, SettingValue::Bool(b) if *b)
    }

    fn as_int(&self) -> i64 {
        match self {
            SettingValue::Int(i) => *i,
            _ => 0,
        }
    }

    fn as_str(&self) -> String {
        match self {
            SettingValue::Str(s) => s.clone(),
            _ => String::new(),
        }
    }
}

impl RuntimeSettings {
    /// Build the typed struct out of a fully-folded `key -> value` map
    /// (defaults already merged with persisted Config and, for a specific
    /// task, its overrides — see [`crate::supervisor::resolve_settings`]).
    pub fn from_resolved(map: &HashMap<String, SettingValue>) -> RuntimeSettings {
        let get = |key: &str| map.get(key).cloned().unwrap_or_else(|| default_value(key));

        RuntimeSettings {
            check_audio: get("check_audio").as_bool(),
            check_subtitles: get("check_subtitles").as_bool(),
            sanitize_metadata: get("sanitize_metadata").as_bool(),
            enable_local_model: get("enable_local_model").as_bool(),
            detailed_mode: get("detailed_mode").as_bool(),
            notify_upload_success: get("notify_upload_success").as_bool(),
            notify_errors: get("notify_errors").as_bool(),
            audio_threshold_multi: get("audio_threshold_multi").as_int(),
            audio_threshold_long: get("audio_threshold_long").as_int(),
            audio_len_head: get("audio_len_head").as_int(),
            audio_len_mid: get("audio_len_mid").as_int(),
            audio_len_tail: get("audio_len_tail").as_int(),
            audio_len_tail_long: get("audio_len_tail_long").as_int(),
            concurrency_detect: get("concurrency_detect").as_int().max(1),
            concurrency_upload: get("concurrency_upload").as_int().max(1),
            cloud_api_url: get("cloud_api_url").as_str(),
            cloud_api_key: get("cloud_api_key").as_str(),
            cloud_model: get("cloud_model").as_str(),
            local_model_path: get("local_model_path").as_str(),
            rclone_remote: get("rclone_remote").as_str(),
            notify_url: get("notify_url").as_str(),
            notify_token: get("notify_token").as_str(),
            download_proxy: get("download_proxy").as_str(),
        }
    }
}

fn default_value(key: &str) -> SettingValue {
    let (_, ty, default_text) = SETTING_DEFS
        .iter()
        .find(|(k, ..)| *k == key)
        .unwrap_or(&("", SettingType::Str, ""));
    SettingValue::coerce(*ty, default_text)
}

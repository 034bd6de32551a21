//! Operator-supplied keyword lists used by the Detection Engine.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeywordKind {
    Audio,
    Subtitle,
    Meta,
}

impl KeywordKind {
    pub fn as_db_str(self) -> &'static str {
        match self {
            KeywordKind::Audio => "audio",
            KeywordKind::Subtitle => "subtitle",
            KeywordKind::Meta => "meta",
        }
    }

    pub fn from_db_str(s: &str) -> Option<KeywordKind> {
        Some(match s {
            "audio" => KeywordKind::Audio,
            "subtitle" => KeywordKind::Subtitle,
            "meta" => KeywordKind::Meta,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub id: i64,
    pub kind: KeywordKind,
    pub content: String,
    pub enabled: bool,
}

/// Seeded on first run. Kept intentionally small and generic; operators are
/// expected to manage the real list through the keyword CRUD surface.
pub const BUILTIN_KEYWORDS: &[(KeywordKind, &str)] = &[
    (KeywordKind::Audio, "加群"),
    (KeywordKind::Audio, "微信号"),
    (KeywordKind::Subtitle, "http://"),
    (KeywordKind::Subtitle, "https://"),
    (KeywordKind::Meta, "微信号"),
];

//! Per-task setting overrides.
//!
//! `overrides` is an opaque JSON object shadowing selected [`RuntimeSettings`]
//! keys for one task, plus two reserved keys: `_passed` (the segment
//! checkpoint list) and `direct_upload` (detection short-circuit).

use serde_json::{Map, Value};

pub const PASSED_KEY: &str = "_passed";
pub const DIRECT_UPLOAD_KEY: &str = "direct_upload";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides(Map<String, Value>);

impl Overrides {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_json::from_str(s)?;
        Ok(Self(value.as_object().cloned().unwrap_or_default()))
    }

    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Segment names already verified clean.
    pub fn passed(&self) -> Vec<String> {
        self.0
            .get(PASSED_KEY)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    }

    pub fn mark_passed(&mut self, segment: &str) {
        let mut passed = self.passed();
        if !passed.iter().any(|s| s == segment) {
            passed.push(segment.to_string());
        }
        self.0.insert(
            PASSED_KEY.to_string(),
            Value::Array(passed.into_iter().map(Value::String).collect()),
        );
    }

    pub fn clear_passed(&mut self) {
        self.0.remove(PASSED_KEY);
    }

    pub fn direct_upload(&self) -> bool {
        self.0.get(DIRECT_UPLOAD_KEY).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn set_direct_upload(&mut self, value: bool) {
        self.0.insert(DIRECT_UPLOAD_KEY.to_string(), Value::Bool(value));
    }

    /// Merge in a caller-supplied shadow map (used by `adjust_and_retry`).
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (k, v) in other {
            self.0.insert(k, v);
        }
    }

    /// Raw lookup used by [`crate::supervisor::resolve_settings`] to find a
    /// per-task shadow for an arbitrary Config key.
    pub fn get_raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passed_round_trips_through_json() {
        let mut o = Overrides::new();
        o.mark_passed("片尾");
        o.mark_passed("片头");
        let s = o.to_json_string();
        let parsed = Overrides::from_json_str(&s).unwrap();
        assert_eq!(parsed.passed(), vec!["片尾".to_string(), "片头".to_string()]);
    }

    #[test]
    fn mark_passed_is_idempotent() {
        let mut o = Overrides::new();
        o.mark_passed("片尾");
        o.mark_passed("片尾");
        assert_eq!(o.passed(), vec!["片尾".to_string()]);
    }

    #[test]
    fn direct_upload_defaults_false() {
        let o = Overrides::new();
        assert!(!o.direct_upload());
    }

    #[test]
    fn empty_string_parses_to_empty_overrides() {
        let o = Overrides::from_json_str("").unwrap();
        assert!(o.passed().is_empty());
        assert!(!o.direct_upload());
    }

    #[test]
    fn clear_passed_removes_checkpoint() {
        let mut o = Overrides::new();
        o.mark_passed("片尾");
        o.clear_passed();
        assert!(o.passed().is_empty());
    }
}

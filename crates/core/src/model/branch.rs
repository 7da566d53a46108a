use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::score::BranchOutcome;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BranchRulesError {
    #[error("malformed branch rules: {0}")]
    Malformed(String),

    #[error("unknown text format: {0}")]
    UnknownTextFormat(String),
}

//
// ─── RICH TEXT ────────────────────────────────────────────────────────────────
//

/// Markup dialect of author-provided text.
///
/// Numeric codes follow the platform's text format constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "FormatRepr")]
pub enum TextFormat {
    /// Platform auto-format: HTML allowed, line breaks preserved.
    Moodle,
    #[default]
    Html,
    Plain,
    Markdown,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FormatRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<FormatRepr> for TextFormat {
    type Error = BranchRulesError;

    fn try_from(repr: FormatRepr) -> Result<Self, Self::Error> {
        let name = match repr {
            FormatRepr::Code(code) => code.to_string(),
            FormatRepr::Name(name) => name.trim().to_ascii_lowercase(),
        };
        match name.as_str() {
            "0" | "moodle" => Ok(Self::Moodle),
            "1" | "html" => Ok(Self::Html),
            "2" | "plain" => Ok(Self::Plain),
            "4" | "markdown" => Ok(Self::Markdown),
            _ => Err(BranchRulesError::UnknownTextFormat(name)),
        }
    }
}

/// Author text shown after an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub format: TextFormat,
}

impl RichText {
    #[must_use]
    pub fn new(text: impl Into<String>, format: TextFormat) -> Self {
        Self {
            text: text.into(),
            format,
        }
    }

    #[must_use]
    pub fn html(text: impl Into<String>) -> Self {
        Self::new(text, TextFormat::Html)
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

//
// ─── BRANCH ACTION ────────────────────────────────────────────────────────────
//

/// How the learner is sent to the branch target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    /// Seek and resume automatically after the branch delay.
    Forced { target_ms: u64 },
    /// Offer a single follow-up control; the learner decides.
    Offer { target_ms: u64 },
}

/// Actions configured for one side (pass or fail) of the outcome.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchAction {
    pub enabled: bool,
    pub forced: bool,
    #[serde(rename = "targetTime")]
    pub target_time_ms: u64,
    pub show_text: bool,
    pub text: RichText,
}

impl BranchAction {
    #[must_use]
    pub fn navigation(&self) -> Option<Navigation> {
        if !self.enabled {
            return None;
        }
        let target_ms = self.target_time_ms;
        Some(if self.forced {
            Navigation::Forced { target_ms }
        } else {
            Navigation::Offer { target_ms }
        })
    }

    /// Text to display, if enabled and non-empty.
    #[must_use]
    pub fn display_text(&self) -> Option<&RichText> {
        (self.show_text && !self.text.is_blank()).then_some(&self.text)
    }

    fn normalized(mut self) -> Self {
        self.forced = self.enabled && self.forced;
        if !self.enabled {
            self.target_time_ms = 0;
        }
        self
    }
}

//
// ─── BRANCH RULES ─────────────────────────────────────────────────────────────
//

/// Pass/fail branching for a session. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BranchRules {
    on_pass: BranchAction,
    on_fail: BranchAction,
}

impl BranchRules {
    #[must_use]
    pub fn new(on_pass: BranchAction, on_fail: BranchAction) -> Self {
        Self {
            on_pass: on_pass.normalized(),
            on_fail: on_fail.normalized(),
        }
    }

    #[must_use]
    pub fn on_pass(&self) -> &BranchAction {
        &self.on_pass
    }

    #[must_use]
    pub fn on_fail(&self) -> &BranchAction {
        &self.on_fail
    }

    #[must_use]
    pub fn for_outcome(&self, outcome: BranchOutcome) -> &BranchAction {
        match outcome {
            BranchOutcome::Pass => &self.on_pass,
            BranchOutcome::Fail => &self.on_fail,
        }
    }

    #[must_use]
    pub fn normalized(self) -> Self {
        Self::new(self.on_pass, self.on_fail)
    }

    /// Parse the flat form encoding (`gotoonpassing`, `timeonfailed`, ...).
    ///
    /// An empty string means no rules are configured.
    ///
    /// # Errors
    ///
    /// Returns `BranchRulesError::Malformed` if the JSON cannot be decoded.
    pub fn from_legacy_json(input: &str) -> Result<Option<Self>, BranchRulesError> {
        if input.trim().is_empty() {
            return Ok(None);
        }
        let legacy: LegacyBranchRules = serde_json::from_str(input)
            .map_err(|e| BranchRulesError::Malformed(e.to_string()))?;
        Ok(Some(legacy.into_rules()))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LegacyBranchRules {
    #[serde(deserialize_with = "flag")]
    gotoonpassing: bool,
    #[serde(deserialize_with = "flag")]
    forceonpassing: bool,
    #[serde(deserialize_with = "seconds_as_ms")]
    timeonpassing: u64,
    #[serde(deserialize_with = "flag")]
    showtextonpassing: bool,
    #[serde(deserialize_with = "legacy_text")]
    textonpassing: RichText,
    #[serde(deserialize_with = "flag")]
    gotoonfailed: bool,
    #[serde(deserialize_with = "flag")]
    forceonfailed: bool,
    #[serde(deserialize_with = "seconds_as_ms")]
    timeonfailed: u64,
    #[serde(deserialize_with = "flag")]
    showtextonfailed: bool,
    #[serde(deserialize_with = "legacy_text")]
    textonfailed: RichText,
}

impl LegacyBranchRules {
    fn into_rules(self) -> BranchRules {
        BranchRules::new(
            BranchAction {
                enabled: self.gotoonpassing,
                forced: self.forceonpassing,
                target_time_ms: self.timeonpassing,
                show_text: self.showtextonpassing,
                text: self.textonpassing,
            },
            BranchAction {
                enabled: self.gotoonfailed,
                forced: self.forceonfailed,
                target_time_ms: self.timeonfailed,
                show_text: self.showtextonfailed,
                text: self.textonfailed,
            },
        )
    }
}

fn flag<'de, D: Deserializer<'de>>(de: D) -> Result<bool, D::Error> {
    use serde::de::Error;
    match Value::deserialize(de)? {
        Value::Null => Ok(false),
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(s) => match s.trim() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(D::Error::custom(format!("invalid flag: {other}"))),
        },
        other => Err(D::Error::custom(format!("invalid flag: {other}"))),
    }
}

fn seconds_as_ms<'de, D: Deserializer<'de>>(de: D) -> Result<u64, D::Error> {
    use serde::de::Error;
    let seconds = match Value::deserialize(de)? {
        Value::Null => return Ok(0),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => return Ok(0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite() && *s >= 0.0)
    .ok_or_else(|| D::Error::custom("timestamp must be a non-negative number of seconds"))?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok((seconds * 1000.0).round() as u64)
}

fn legacy_text<'de, D: Deserializer<'de>>(de: D) -> Result<RichText, D::Error> {
    use serde::de::Error;
    match Value::deserialize(de)? {
        Value::Null => Ok(RichText::default()),
        Value::String(text) => Ok(RichText::html(text)),
        value @ Value::Object(_) => serde_json::from_value(value).map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("invalid text: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORM_JSON: &str = r#"{
        "gotoonpassing": "1",
        "forceonpassing": 0,
        "timeonpassing": 90,
        "showtextonpassing": "1",
        "textonpassing": { "text": "<p>Well done</p>", "format": "1" },
        "gotoonfailed": 1,
        "forceonfailed": "1",
        "timeonfailed": 5,
        "showtextonfailed": 0,
        "textonfailed": { "text": "", "format": 1 }
    }"#;

    #[test]
    fn parses_form_encoding() {
        let rules = BranchRules::from_legacy_json(FORM_JSON).unwrap().unwrap();
        assert_eq!(
            rules.on_pass().navigation(),
            Some(Navigation::Offer { target_ms: 90_000 })
        );
        assert_eq!(
            rules.on_fail().navigation(),
            Some(Navigation::Forced { target_ms: 5_000 })
        );
        assert_eq!(rules.on_pass().display_text().unwrap().text, "<p>Well done</p>");
        assert!(rules.on_fail().display_text().is_none());
    }

    #[test]
    fn empty_input_means_no_rules() {
        assert_eq!(BranchRules::from_legacy_json("  ").unwrap(), None);
    }

    #[test]
    fn malformed_json_is_an_error() {
        let err = BranchRules::from_legacy_json("{\"gotoonpassing\": ").unwrap_err();
        assert!(matches!(err, BranchRulesError::Malformed(_)));
        let err = BranchRules::from_legacy_json("{\"gotoonfailed\": \"maybe\"}").unwrap_err();
        assert!(matches!(err, BranchRulesError::Malformed(_)));
    }

    #[test]
    fn forced_requires_enabled() {
        let rules = BranchRules::new(
            BranchAction {
                enabled: false,
                forced: true,
                target_time_ms: 42,
                ..BranchAction::default()
            },
            BranchAction::default(),
        );
        assert!(!rules.on_pass().forced);
        assert_eq!(rules.on_pass().navigation(), None);
    }

    #[test]
    fn blank_text_is_not_displayed() {
        let action = BranchAction {
            show_text: true,
            text: RichText::html("   "),
            ..BranchAction::default()
        };
        assert!(action.display_text().is_none());
    }

    #[test]
    fn native_encoding_uses_target_time() {
        let json = r#"{ "onFail": { "enabled": true, "forced": true, "targetTime": 5000 } }"#;
        let rules: BranchRules = serde_json::from_str(json).unwrap();
        assert_eq!(
            rules.on_fail().navigation(),
            Some(Navigation::Forced { target_ms: 5000 })
        );
        assert_eq!(rules.on_pass().navigation(), None);
    }

    #[test]
    fn text_format_accepts_codes_and_names() {
        let text: RichText = serde_json::from_str(r#"{ "text": "*hi*", "format": 4 }"#).unwrap();
        assert_eq!(text.format, TextFormat::Markdown);
        let text: RichText = serde_json::from_str(r#"{ "text": "hi", "format": "plain" }"#).unwrap();
        assert_eq!(text.format, TextFormat::Plain);
        assert!(serde_json::from_str::<RichText>(r#"{ "text": "hi", "format": 9 }"#).is_err());
    }
}

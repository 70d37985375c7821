//! Masking policies for leaf values.
//!
//! A policy decides what a single leaf becomes. It never traverses containers;
//! the sanitizer hands it one `(key, value)` pair at a time, where `key` is the
//! nearest enclosing mapping key (or `None` at the top level).

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::{
    error::SanitizerError,
    value::{Text, Value},
};

/// Token that replaces a masked value.
pub const MASK: &str = "********";

/// Placeholder for a mapping that is already on the descent path.
pub const MAPPING_PLACEHOLDER: &str = "{...}";

/// Placeholder for a sequence (or structured string) already on the descent path.
pub const SEQUENCE_PLACEHOLDER: &str = "[...]";

/// Field names that are always treated as sensitive.
pub const DEFAULT_FIELDS: [&str; 4] = ["authorization", "password", "passwd", "secret"];

/// Compiled default field pattern and card-number pattern.
///
/// Both are built from constants, so compilation cannot fail at runtime.
#[allow(clippy::expect_used)]
static DEFAULT_PATTERNS: Lazy<(Regex, Regex)> = Lazy::new(|| {
    let fields = RegexBuilder::new(&DEFAULT_FIELDS.join("|"))
        .case_insensitive(true)
        .build()
        .expect("default field pattern is valid");
    let card_numbers = Regex::new(r"\A[0-9]{16}\z").expect("valid pattern");
    (fields, card_numbers)
});

fn default_field_regex() -> Regex {
    DEFAULT_PATTERNS.0.clone()
}

fn card_number_regex() -> Regex {
    DEFAULT_PATTERNS.1.clone()
}

/// Decides what a leaf value becomes.
///
/// Closures of the form `Fn(Option<&str>, &Value) -> Value` are policies too,
/// which is handy for one-off masking rules.
pub trait MaskingPolicy {
    /// Returns the sanitized replacement for `value` found under `key`.
    ///
    /// This method is total; it must not panic for any input.
    fn sanitize(&self, key: Option<&str>, value: &Value) -> Value;
}

impl<F> MaskingPolicy for F
where
    F: Fn(Option<&str>, &Value) -> Value,
{
    fn sanitize(&self, key: Option<&str>, value: &Value) -> Value {
        self(key, value)
    }
}

/// Settings for [`FieldPolicy`].
///
/// All fields are optional when deserializing, so a host application can embed
/// this in its own configuration file and override only what it needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeConfig {
    /// Extra sensitive field names, matched case-insensitively as substrings
    /// of the key. An entry written as `/pattern/` is used as a regular
    /// expression instead.
    pub fields: Vec<String>,
    /// Whether 16-digit strings are masked regardless of their key.
    pub mask_card_numbers: bool,
    /// Replacement token for masked values.
    pub mask: String,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            mask_card_numbers: true,
            mask: MASK.to_owned(),
        }
    }
}

impl SanitizeConfig {
    /// Adds a sensitive field name (or `/pattern/`).
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Uses a specific mask token.
    #[must_use]
    pub fn with_mask(mut self, mask: impl Into<String>) -> Self {
        self.mask = mask.into();
        self
    }

    #[must_use]
    pub fn with_card_numbers(mut self, enabled: bool) -> Self {
        self.mask_card_numbers = enabled;
        self
    }
}

/// The default masking policy.
///
/// - Non-string values and empty strings pass through unchanged.
/// - Invalid UTF-8 is dropped from the string.
/// - The result is replaced by the mask when it is exactly 16 ASCII digits, or
///   when the key contains a sensitive field name.
#[derive(Clone, Debug)]
pub struct FieldPolicy {
    fields: Regex,
    card_numbers: Option<Regex>,
    mask: Cow<'static, str>,
}

impl FieldPolicy {
    /// Builds a policy from configuration.
    ///
    /// Fails only when a `/pattern/` entry is not a valid regular expression.
    pub fn new(config: &SanitizeConfig) -> Result<Self, SanitizerError> {
        let fields = if config.fields.is_empty() {
            default_field_regex()
        } else {
            field_regex(&config.fields)?
        };
        let mask = if config.mask == MASK {
            Cow::Borrowed(MASK)
        } else {
            Cow::Owned(config.mask.clone())
        };

        Ok(Self {
            fields,
            card_numbers: config.mask_card_numbers.then(card_number_regex),
            mask,
        })
    }

    /// Returns `true` when `key` contains a sensitive field name.
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.fields.is_match(key)
    }

    /// Returns `true` when `value` is exactly 16 ASCII digits and card numbers
    /// are being masked.
    pub fn looks_like_card_number(&self, value: &str) -> bool {
        self.card_numbers
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(value))
    }

    pub fn mask(&self) -> &str {
        &self.mask
    }
}

impl Default for FieldPolicy {
    fn default() -> Self {
        Self {
            fields: default_field_regex(),
            card_numbers: Some(card_number_regex()),
            mask: Cow::Borrowed(MASK),
        }
    }
}

impl MaskingPolicy for FieldPolicy {
    fn sanitize(&self, key: Option<&str>, value: &Value) -> Value {
        let Value::String(text) = value else {
            return value.clone();
        };
        if text.is_empty() {
            return value.clone();
        }

        let repaired = text.repaired();
        if self.looks_like_card_number(&repaired)
            || key.is_some_and(|key| self.is_sensitive_key(key))
        {
            return Value::from(self.mask.as_ref());
        }

        match repaired {
            Cow::Borrowed(_) => value.clone(),
            Cow::Owned(repaired) => Value::String(Text::from(repaired)),
        }
    }
}

/// Drops invalid UTF-8 byte sequences.
///
/// Valid input is borrowed as-is. This never fails.
pub fn clean_invalid_utf8(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(valid) => Cow::Borrowed(valid),
        Err(_) => Cow::Owned(bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()),
    }
}

fn field_regex(extra: &[String]) -> Result<Regex, SanitizerError> {
    let mut alternatives: Vec<Cow<'_, str>> = DEFAULT_FIELDS
        .iter()
        .map(|field| Cow::Borrowed(*field))
        .collect();

    for field in extra.iter().filter(|field| !field.is_empty()) {
        let alternative = match field.strip_prefix('/').and_then(|f| f.strip_suffix('/')) {
            Some(raw) if !raw.is_empty() => {
                // Compile on its own first so the error names the offending entry.
                Regex::new(raw).map_err(|source| SanitizerError::InvalidFieldPattern {
                    pattern: field.clone(),
                    source,
                })?;
                Cow::Owned(format!("(?:{raw})"))
            }
            _ => Cow::Owned(regex::escape(field)),
        };
        alternatives.push(alternative);
    }

    let pattern = alternatives.join("|");
    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| SanitizerError::InvalidFieldPattern { pattern, source })
}

//! Recursive sanitizing traversal.
//!
//! The sanitizer walks a payload and rebuilds it, handing every leaf to a
//! [`MaskingPolicy`]. The key passed to the policy is the nearest enclosing
//! mapping key: sequences inherit the key they were found under.
//!
//! Self-reference is cut by tracking the identities of the nodes on the current
//! descent path. A node already on that path is replaced by a placeholder
//! string; a node reached again through an unrelated branch is processed
//! normally.

use once_cell::sync::Lazy;
use serde_json::Value as JsonValue;

use crate::{
    error::SanitizerError,
    policy::{
        FieldPolicy, MaskingPolicy, SanitizeConfig, MAPPING_PLACEHOLDER, SEQUENCE_PLACEHOLDER,
    },
    structured,
    value::{Ancestors, Mapping, Sequence, Text, Value},
};

static DEFAULT_SANITIZER: Lazy<Sanitizer> = Lazy::new(Sanitizer::default);

/// Sanitizes `data` with the default [`FieldPolicy`].
///
/// The input is never modified; the result is a fresh tree that shares no
/// containers with it.
pub fn process(data: &Value) -> Value {
    DEFAULT_SANITIZER.process(data)
}

/// Applies a masking policy to every leaf of a payload.
pub struct Sanitizer<P = FieldPolicy> {
    policy: P,
    #[cfg(feature = "slog")]
    logger: slog::Logger,
}

impl Sanitizer<FieldPolicy> {
    /// Builds a sanitizer around a [`FieldPolicy`] created from `config`.
    pub fn from_config(config: &SanitizeConfig) -> Result<Self, SanitizerError> {
        Ok(Self::new(FieldPolicy::new(config)?))
    }
}

impl Default for Sanitizer<FieldPolicy> {
    fn default() -> Self {
        Self::new(FieldPolicy::default())
    }
}

impl<P> Sanitizer<P>
where
    P: MaskingPolicy,
{
    pub fn new(policy: P) -> Self {
        Self {
            policy,
            #[cfg(feature = "slog")]
            logger: slog::Logger::root(slog::Discard, slog::o!()),
        }
    }

    /// Emits debug records for elided cycles and expanded structured strings.
    #[cfg(feature = "slog")]
    #[must_use]
    pub fn with_logger(mut self, logger: slog::Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Returns a sanitized copy of `data`.
    ///
    /// This is total: cyclic input, malformed structured text and invalid
    /// UTF-8 all resolve to a value.
    pub fn process(&self, data: &Value) -> Value {
        self.apply(data, None, &Ancestors::Root)
    }

    /// Sanitizes a `serde_json::Value`.
    pub fn process_json(&self, data: &JsonValue) -> JsonValue {
        self.process(&Value::from(data)).to_json()
    }

    fn apply(&self, value: &Value, key: Option<&str>, ancestors: &Ancestors<'_>) -> Value {
        match value {
            Value::Mapping(mapping) => self.apply_mapping(mapping, key, ancestors),
            Value::Sequence(sequence) => self.apply_sequence(sequence, key, ancestors),
            Value::String(text) => match structured::decode(text) {
                Some(decoded) => self.apply_structured(text, &decoded, key, ancestors),
                None => self.policy.sanitize(key, value),
            },
            Value::Null | Value::Bool(_) | Value::Number(_) => self.policy.sanitize(key, value),
        }
    }

    fn apply_mapping(
        &self,
        mapping: &Mapping,
        key: Option<&str>,
        ancestors: &Ancestors<'_>,
    ) -> Value {
        if ancestors.contains(mapping.id()) {
            self.log_elided(key, MAPPING_PLACEHOLDER);
            return Value::from(MAPPING_PLACEHOLDER);
        }
        let ancestors = ancestors.descend(mapping.id());

        let sanitized: Mapping = mapping
            .entries()
            .into_iter()
            .map(|(key, value)| {
                let value = self.apply(&value, Some(key.as_str()), &ancestors);
                (key, value)
            })
            .collect();
        Value::Mapping(sanitized)
    }

    fn apply_sequence(
        &self,
        sequence: &Sequence,
        key: Option<&str>,
        ancestors: &Ancestors<'_>,
    ) -> Value {
        if ancestors.contains(sequence.id()) {
            self.log_elided(key, SEQUENCE_PLACEHOLDER);
            return Value::from(SEQUENCE_PLACEHOLDER);
        }
        let ancestors = ancestors.descend(sequence.id());

        let sanitized: Sequence = sequence
            .items()
            .iter()
            .map(|item| self.apply(item, key, &ancestors))
            .collect();
        Value::Sequence(sanitized)
    }

    fn apply_structured(
        &self,
        text: &Text,
        decoded: &Value,
        key: Option<&str>,
        ancestors: &Ancestors<'_>,
    ) -> Value {
        // Decoded trees are fresh allocations; this only fires if a text identity is reused.
        if ancestors.contains(text.id()) {
            self.log_elided(key, SEQUENCE_PLACEHOLDER);
            return Value::from(SEQUENCE_PLACEHOLDER);
        }
        let ancestors = ancestors.descend(text.id());

        #[cfg(feature = "slog")]
        slog::debug!(
            self.logger, "expanding structured text";
            "key" => key, "bytes" => text.len()
        );

        let sanitized = self.apply(decoded, key, &ancestors);
        Value::String(structured::encode(&sanitized))
    }

    #[cfg_attr(not(feature = "slog"), allow(unused_variables, clippy::unused_self))]
    fn log_elided(&self, key: Option<&str>, placeholder: &'static str) {
        #[cfg(feature = "slog")]
        slog::debug!(
            self.logger, "elided self-reference";
            "key" => key, "placeholder" => placeholder
        );
    }
}

impl<P> std::fmt::Debug for Sanitizer<P>
where
    P: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{process, Sanitizer};
    use crate::{Mapping, SanitizeConfig, Sequence, Value, MASK};

    #[test]
    fn masks_nested_leaves() {
        let sanitizer: Sanitizer = Sanitizer::default();
        let sanitized = sanitizer.process_json(&json!({
            "user": {"name": "alice", "password": "hunter2"},
            "card": "1234567890123456",
            "count": 3
        }));
        assert_eq!(
            sanitized,
            json!({
                "user": {"name": "alice", "password": MASK},
                "card": MASK,
                "count": 3
            })
        );
    }

    #[test]
    fn sequences_inherit_the_enclosing_key() {
        let input = json!({"secret": ["a", ["b", ""]], "list": ["c"]});
        let sanitized = process(&Value::from(input));
        assert_eq!(
            sanitized.to_json(),
            json!({"secret": [MASK, [MASK, ""]], "list": ["c"]})
        );
    }

    #[test]
    fn mappings_inside_sequences_use_their_own_keys() {
        let sanitized = process(&Value::from(json!({"secret": [{"name": "x"}]})));
        assert_eq!(sanitized.to_json(), json!({"secret": [{"name": "x"}]}));
    }

    #[test]
    fn self_reference_becomes_placeholder() {
        let mapping = Mapping::new();
        mapping.insert("password", "abc");
        mapping.insert("self", mapping.clone());

        let sanitized = process(&Value::from(mapping.clone()));
        assert_eq!(
            sanitized.to_json(),
            json!({"password": MASK, "self": "{...}"})
        );
        // input untouched
        assert_eq!(mapping.get("password").unwrap().as_str(), Some("abc"));
    }

    #[test]
    fn shared_subgraphs_are_processed_on_every_branch() {
        let shared = Mapping::new();
        shared.insert("secret", "s");
        let list = Sequence::new();
        list.push(shared.clone());
        list.push(shared.clone());

        let sanitized = process(&Value::from(list));
        assert_eq!(
            sanitized.to_json(),
            json!([{"secret": MASK}, {"secret": MASK}])
        );
    }

    #[test]
    fn output_shares_no_containers_with_input() {
        let inner = Mapping::new();
        inner.insert("a", 1);
        let outer = Mapping::new();
        outer.insert("inner", inner.clone());

        let sanitized = process(&Value::from(outer.clone()));
        let sanitized = sanitized.as_mapping().unwrap();
        assert!(!sanitized.ptr_eq(&outer));
        let sanitized_inner = sanitized.get("inner").unwrap();
        assert!(!sanitized_inner.as_mapping().unwrap().ptr_eq(&inner));
    }

    #[test]
    fn structured_strings_are_sanitized_and_reencoded() {
        let sanitized = process(&Value::from(json!({"payload": r#"{"password":"abc"}"#})));
        assert_eq!(
            sanitized.to_json(),
            json!({"payload": r#"{"password":"********"}"#})
        );
    }

    #[test]
    fn structured_arrays_inherit_the_key() {
        let sanitized = process(&Value::from(json!({"password": r#"["a", 1]"#})));
        assert_eq!(
            sanitized.to_json(),
            json!({"password": r#"["********",1]"#})
        );
    }

    #[test]
    fn custom_policy_sees_every_leaf() {
        let sanitizer = Sanitizer::new(|key: Option<&str>, value: &Value| {
            Value::from(format!("{}={}", key.unwrap_or("-"), value.to_json()))
        });
        let sanitized = sanitizer.process_json(&json!({"a": [1, true], "b": null}));
        assert_eq!(sanitized, json!({"a": ["a=1", "a=true"], "b": "b=null"}));
    }

    #[test]
    fn from_config_applies_settings() {
        let config = SanitizeConfig::default().with_field("token");
        let sanitizer = Sanitizer::from_config(&config).unwrap();
        let sanitized = sanitizer.process_json(&json!({"access_token": "t", "name": "n"}));
        assert_eq!(sanitized, json!({"access_token": MASK, "name": "n"}));
    }
}

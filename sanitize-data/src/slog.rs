//! Adapters for emitting sanitized payloads through `slog`.
//!
//! This module provides a `slog::Value` that serializes the *sanitized* form
//! of a payload as structured JSON via `slog`'s nested-value support.
//!
//! It is responsible for:
//! - Ensuring the logged representation comes from a [`Sanitizer`], never
//!   from the original value.
//! - Avoiding fallible logging APIs: conversion failures are represented as
//!   placeholder strings rather than propagated as errors.
//!
//! It does not configure `slog` or define masking policy.

use serde::Serialize;
use serde_json::Value as JsonValue;
use slog::{Key, Record, Result as SlogResult, Serializer, Value as SlogValue};

use crate::{policy::MaskingPolicy, sanitizer::Sanitizer, value::Value};

const CONVERSION_FAILED: &str = "Failed to convert value for sanitizing";

/// A `slog::Value` that emits a sanitized payload as structured JSON.
///
/// The payload is sanitized when the wrapper is built, not when the record is
/// emitted.
#[derive(Clone, Debug)]
pub struct SanitizedJson {
    value: JsonValue,
}

impl SanitizedJson {
    fn new(value: JsonValue) -> Self {
        Self { value }
    }

    /// The sanitized payload that will be logged.
    pub fn as_json(&self) -> &JsonValue {
        &self.value
    }
}

impl SlogValue for SanitizedJson {
    fn serialize(
        &self,
        record: &Record<'_>,
        key: Key,
        serializer: &mut dyn Serializer,
    ) -> SlogResult {
        let nested = slog::Serde(self.value.clone());
        SlogValue::serialize(&nested, record, key, serializer)
    }
}

/// Converts values into a `slog::Value` that logs their sanitized form.
///
/// Uses the default sanitizer; see [`Sanitizer::sanitized_json`] for a
/// configured one.
///
/// ## Example
/// ```ignore
/// use sanitize_data::slog::IntoSanitizedJson;
///
/// info!(logger, "request failed"; "params" => params.into_sanitized_json());
/// ```
pub trait IntoSanitizedJson {
    /// Sanitizes `self` and returns a `slog::Value` that serializes as
    /// structured JSON.
    ///
    /// If `self` cannot be converted into a payload tree, the returned value
    /// holds a JSON string describing the failure instead.
    fn into_sanitized_json(self) -> SanitizedJson;
}

impl<T> IntoSanitizedJson for T
where
    T: Serialize,
{
    fn into_sanitized_json(self) -> SanitizedJson {
        sanitize_serializable(&self, crate::process)
    }
}

impl<P> Sanitizer<P>
where
    P: MaskingPolicy,
{
    /// Sanitizes `value` with this sanitizer and wraps it for logging.
    pub fn sanitized_json<T>(&self, value: &T) -> SanitizedJson
    where
        T: Serialize + ?Sized,
    {
        sanitize_serializable(value, |value| self.process(value))
    }
}

fn sanitize_serializable<T, F>(value: &T, process: F) -> SanitizedJson
where
    T: Serialize + ?Sized,
    F: FnOnce(&Value) -> Value,
{
    let json = Value::from_serialize(value).map_or_else(
        |_| JsonValue::String(CONVERSION_FAILED.to_owned()),
        |value| process(&value).to_json(),
    );
    SanitizedJson::new(json)
}

//! Masking of credentials and card-like numbers inside nested report data.
//!
//! Payloads handed to an error-reporting pipeline are arbitrary trees of
//! mappings, sequences, strings and scalars. This crate walks such a tree and
//! returns a sanitized copy:
//!
//! - string leaves under a sensitive key (`authorization`, `password`,
//!   `passwd`, `secret`, case-insensitive substring) become `"********"`
//! - strings made of exactly 16 ASCII digits become `"********"` wherever they
//!   appear
//! - strings that hold a serialized JSON object or array are decoded,
//!   sanitized and re-encoded
//! - a container that is already on the current descent path is replaced by
//!   `"{...}"` (mapping) or `"[...]"` (sequence), so self-referential payloads
//!   terminate
//!
//! ```rust
//! use sanitize_data::{process, Mapping, Value};
//!
//! let payload = Mapping::new();
//! payload.insert("card", "1234567890123456");
//! payload.insert("note", "hello world");
//! payload.insert("self", payload.clone());
//!
//! let sanitized = process(&Value::from(payload)).to_json();
//! assert_eq!(sanitized["card"], "********");
//! assert_eq!(sanitized["note"], "hello world");
//! assert_eq!(sanitized["self"], "{...}");
//! ```
//!
//! What this crate does not do:
//! - transport, persist or log payloads on its own
//! - validate payload schemas
//!
//! The `slog` feature adds an adapter that logs the sanitized form of a value.

// <https://doc.rust-lang.org/rustc/lints/listing/allowed-by-default.html>
#![warn(
    anonymous_parameters,
    bare_trait_objects,
    elided_lifetimes_in_paths,
    missing_copy_implementations,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_code,
    unused_extern_crates,
    unused_import_braces
)]
// <https://rust-lang.github.io/rust-clippy/stable>
#![warn(
    clippy::all,
    clippy::cargo,
    clippy::dbg_macro,
    clippy::float_cmp_const,
    clippy::get_unwrap,
    clippy::mem_forget,
    clippy::nursery,
    clippy::pedantic,
    clippy::todo,
    clippy::unwrap_used,
    clippy::uninlined_format_args
)]
// Allow some clippy lints
#![allow(
    clippy::doc_markdown,
    clippy::module_name_repetitions,
    clippy::multiple_crate_versions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::use_self,
    clippy::cargo_common_metadata,
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::option_if_let_else,
    clippy::non_std_lazy_statics
)]
// Allow some lints while testing
#![cfg_attr(test, allow(clippy::non_ascii_literal, clippy::unwrap_used))]

// Module declarations
mod error;
mod policy;
mod sanitizer;
#[cfg(feature = "slog")]
pub mod slog;
mod structured;
mod value;

// Re-exports
pub use error::SanitizerError;
pub use policy::{
    clean_invalid_utf8, FieldPolicy, MaskingPolicy, SanitizeConfig, DEFAULT_FIELDS,
    MAPPING_PLACEHOLDER, MASK, SEQUENCE_PLACEHOLDER,
};
pub use sanitizer::{process, Sanitizer};
pub use value::{Mapping, NodeId, Sequence, Text, Value};

//! Dynamic value model for report payloads.
//!
//! A [`Value`] is one of four shapes: a mapping, a sequence, a string, or some
//! other scalar. Containers are shared handles: cloning a [`Mapping`] or
//! [`Sequence`] yields another handle to the *same* container, which is what
//! lets a payload hold shared subgraphs and self-references. Mutation goes
//! through `&self` for the same reason.
//!
//! Cycle detection works on identity, not equality. Every container and every
//! [`Text`] exposes a [`NodeId`] derived from its allocation.

use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde::{Serialize, Serializer};
use serde_json::{Number, Value as JsonValue};

use crate::{
    error::SanitizerError,
    policy::{clean_invalid_utf8, MAPPING_PLACEHOLDER, SEQUENCE_PLACEHOLDER},
};

// =============================================================================
// Identity
// =============================================================================

/// Opaque identity of a container or string allocation.
///
/// Two handles have the same `NodeId` exactly when they point at the same
/// allocation. An id is only meaningful while the node it was taken from is
/// alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Identities of the nodes on the current descent path.
///
/// Each level borrows its parent, so a branch sees only its own ancestors and
/// siblings never observe each other's entries.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Ancestors<'a> {
    Root,
    Node {
        id: NodeId,
        parent: &'a Ancestors<'a>,
    },
}

impl<'a> Ancestors<'a> {
    pub(crate) fn contains(&self, id: NodeId) -> bool {
        let mut current = self;
        while let Ancestors::Node { id: seen, parent } = current {
            if *seen == id {
                return true;
            }
            current = *parent;
        }
        false
    }

    pub(crate) fn descend(&'a self, id: NodeId) -> Ancestors<'a> {
        Ancestors::Node { id, parent: self }
    }
}

// =============================================================================
// Text
// =============================================================================

/// An immutable string leaf.
///
/// The bytes are not required to be valid UTF-8; payloads collected from the
/// outside world often are not. Clones share the allocation and therefore the
/// identity.
#[derive(Clone)]
pub struct Text(Arc<[u8]>);

impl Text {
    /// Builds a text from raw bytes, valid UTF-8 or not.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the text as `&str` when it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.0).ok()
    }

    /// Returns the text with invalid byte sequences dropped.
    pub fn repaired(&self) -> Cow<'_, str> {
        clean_invalid_utf8(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn id(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.0).cast::<u8>() as usize)
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&String::from_utf8_lossy(&self.0), f)
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Text {}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        *self.0 == *other.as_bytes()
    }
}

impl PartialEq<&str> for Text {
    fn eq(&self, other: &&str) -> bool {
        *self.0 == *other.as_bytes()
    }
}

impl From<&str> for Text {
    fn from(value: &str) -> Self {
        Self::from_bytes(value)
    }
}

impl From<String> for Text {
    fn from(value: String) -> Self {
        Self(Arc::from(value.into_bytes()))
    }
}

impl From<Vec<u8>> for Text {
    fn from(value: Vec<u8>) -> Self {
        Self(Arc::from(value))
    }
}

// =============================================================================
// Containers
// =============================================================================

/// A shared, mutable string-keyed mapping.
///
/// Keys iterate in sorted order, so traversal is deterministic.
#[derive(Clone, Default)]
pub struct Mapping(Arc<RwLock<BTreeMap<String, Value>>>);

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under `key`, returning the previous value if any.
    ///
    /// Inserting a handle to this mapping (or to one of its ancestors) builds a
    /// cycle; that is allowed.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.write().insert(key.into(), value.into())
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.write().remove(key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Snapshot of the entries in key order.
    ///
    /// Values are handles, so the snapshot is cheap and no lock outlives the
    /// call.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.read()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn id(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.0) as usize)
    }

    /// Returns `true` when both handles point at the same mapping.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("keys", &self.keys())
            .finish_non_exhaustive()
    }
}

impl<K, V> FromIterator<(K, V)> for Mapping
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self(Arc::new(RwLock::new(entries)))
    }
}

/// A shared, mutable ordered list.
#[derive(Clone, Default)]
pub struct Sequence(Arc<RwLock<Vec<Value>>>);

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.write().push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.read().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Snapshot of the elements in order.
    pub fn items(&self) -> Vec<Value> {
        self.read().clone()
    }

    pub fn id(&self) -> NodeId {
        NodeId(Arc::as_ptr(&self.0) as usize)
    }

    /// Returns `true` when both handles point at the same sequence.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Value>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Value>> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<V> FromIterator<V> for Sequence
where
    V: Into<Value>,
{
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let items = iter.into_iter().map(Into::into).collect();
        Self(Arc::new(RwLock::new(items)))
    }
}

// =============================================================================
// Value
// =============================================================================

/// A dynamically typed payload node.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(Number),
    String(Text),
    Mapping(Mapping),
    Sequence(Sequence),
}

impl Value {
    /// Identity of the node, for containers and strings.
    pub fn id(&self) -> Option<NodeId> {
        match self {
            Value::String(text) => Some(text.id()),
            Value::Mapping(mapping) => Some(mapping.id()),
            Value::Sequence(sequence) => Some(sequence.id()),
            Value::Null | Value::Bool(_) | Value::Number(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Value::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the string content when this is valid UTF-8 text.
    pub fn as_str(&self) -> Option<&str> {
        self.as_text().and_then(Text::as_str)
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Value::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&Sequence> {
        match self {
            Value::Sequence(sequence) => Some(sequence),
            _ => None,
        }
    }

    /// Converts any serializable value into a payload tree.
    pub fn from_serialize<T>(value: &T) -> Result<Self, SanitizerError>
    where
        T: Serialize + ?Sized,
    {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Converts the tree into a `serde_json::Value`.
    ///
    /// Containers already on the descent path become `"{...}"` / `"[...]"`,
    /// and invalid UTF-8 in strings is dropped, so this is total even for
    /// cyclic input.
    pub fn to_json(&self) -> JsonValue {
        self.to_json_within(&Ancestors::Root)
    }

    fn to_json_within(&self, ancestors: &Ancestors<'_>) -> JsonValue {
        match self {
            Value::Null => JsonValue::Null,
            Value::Bool(flag) => JsonValue::Bool(*flag),
            Value::Number(number) => JsonValue::Number(number.clone()),
            Value::String(text) => JsonValue::String(text.repaired().into_owned()),
            Value::Mapping(mapping) => {
                if ancestors.contains(mapping.id()) {
                    return JsonValue::String(MAPPING_PLACEHOLDER.to_owned());
                }
                let ancestors = ancestors.descend(mapping.id());
                JsonValue::Object(
                    mapping
                        .entries()
                        .into_iter()
                        .map(|(key, value)| (key, value.to_json_within(&ancestors)))
                        .collect(),
                )
            }
            Value::Sequence(sequence) => {
                if ancestors.contains(sequence.id()) {
                    return JsonValue::String(SEQUENCE_PLACEHOLDER.to_owned());
                }
                let ancestors = ancestors.descend(sequence.id());
                JsonValue::Array(
                    sequence
                        .items()
                        .iter()
                        .map(|item| item.to_json_within(&ancestors))
                        .collect(),
                )
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(flag) => Value::Bool(flag),
            JsonValue::Number(number) => Value::Number(number),
            JsonValue::String(text) => Value::String(Text::from(text)),
            JsonValue::Array(items) => Value::Sequence(items.into_iter().collect()),
            JsonValue::Object(entries) => Value::Mapping(entries.into_iter().collect()),
        }
    }
}

impl From<&JsonValue> for Value {
    fn from(value: &JsonValue) -> Self {
        Value::from(value.clone())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Number(Number::from(value))
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<f64> for Value {
    /// Non-finite floats have no JSON number form and become `Null`.
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(Value::Null, Value::Number)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(Text::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(Text::from(value))
    }
}

impl From<Text> for Value {
    fn from(value: Text) -> Self {
        Value::String(value)
    }
}

impl From<Mapping> for Value {
    fn from(value: Mapping) -> Self {
        Value::Mapping(value)
    }
}

impl From<Sequence> for Value {
    fn from(value: Sequence) -> Self {
        Value::Sequence(value)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

//! Property values and the merge rule shared by nodes and edges.
//!
//! Properties are restricted to scalars (integer, float, boolean, string).
//! A property becomes multi-valued when a later update submits a different
//! value for the same key: `[first-distinct, ..., last-distinct]`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// ── Scalar Values ─────────────────────────────────────────────────

/// A scalar property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    /// Convert a raw JSON value. Returns `None` for null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
        }
    }
}

/// Plain rendering, as used in tabular exports (strings are not quoted).
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(fl) => write!(f, "{fl}"),
            Self::String(s) => f.write_str(s),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

// ── Single or Multi-Valued ────────────────────────────────────────

/// A stored property: a single scalar, or the ordered list of distinct
/// values it has taken after conflicting updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Property {
    Single(PropertyValue),
    Multi(Vec<PropertyValue>),
}

impl Property {
    /// All values held, in submission order.
    pub fn values(&self) -> &[PropertyValue] {
        match self {
            Self::Single(v) => std::slice::from_ref(v),
            Self::Multi(vs) => vs,
        }
    }

    pub fn is_multi(&self) -> bool {
        matches!(self, Self::Multi(_))
    }

    /// The value if this property is single-valued.
    pub fn as_single(&self) -> Option<&PropertyValue> {
        match self {
            Self::Single(v) => Some(v),
            Self::Multi(_) => None,
        }
    }

    /// Join all values with `sep` (multi-valued CSV cells use `;`).
    pub fn join(&self, sep: &str) -> String {
        self.values()
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(sep)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Single(v) => v.to_json(),
            Self::Multi(vs) => serde_json::Value::Array(vs.iter().map(|v| v.to_json()).collect()),
        }
    }

    /// Fold one submitted value in. Returns true if this call turned a
    /// single value into a list.
    fn absorb(&mut self, value: &PropertyValue) -> bool {
        match self {
            Self::Single(old) if old == value => false,
            Self::Single(old) => {
                let old = old.clone();
                *self = Self::Multi(vec![old, value.clone()]);
                true
            }
            Self::Multi(values) => {
                if !values.contains(value) {
                    values.push(value.clone());
                }
                false
            }
        }
    }
}

impl From<PropertyValue> for Property {
    fn from(v: PropertyValue) -> Self {
        Self::Single(v)
    }
}

macro_rules! single_from {
    ($($t:ty),*) => {
        $(impl From<$t> for Property {
            fn from(v: $t) -> Self {
                Self::Single(PropertyValue::from(v))
            }
        })*
    };
}

single_from!(bool, i64, i32, f64, &str, String);

// ── Property Map ──────────────────────────────────────────────────

/// Insertion-ordered mapping of property keys to stored properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap(IndexMap<String, Property>);

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, overwriting any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a scalar, overwriting any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.0.insert(key.into(), Property::Single(value.into()));
    }

    /// Insert a stored property (single or multi-valued) as-is.
    pub fn insert_property(&mut self, key: impl Into<String>, property: Property) {
        self.0.insert(key.into(), property);
    }

    pub fn get(&self, key: &str) -> Option<&Property> {
        self.0.get(key)
    }

    /// The value of `key` if it is present and single-valued.
    pub fn get_value(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key).and_then(Property::as_single)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<Property> {
        self.0.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Property)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply the merge rule for every incoming key.
    ///
    /// - absent: set it
    /// - equal scalar: no-op
    /// - different scalar: replace with `[old, new]`
    /// - already multi-valued: append unless present
    ///
    /// An incoming multi-valued property is folded in value by value.
    /// Returns the keys that became multi-valued during this call.
    pub fn merge(&mut self, incoming: &PropertyMap) -> Vec<String> {
        let mut promoted = Vec::new();
        for (key, property) in incoming.iter() {
            match self.0.get_mut(key) {
                None => {
                    self.0.insert(key.clone(), property.clone());
                }
                Some(existing) => {
                    let mut became_multi = false;
                    for value in property.values() {
                        became_multi |= existing.absorb(value);
                    }
                    if became_multi {
                        tracing::warn!(key = %key, "Property changed into a list");
                        promoted.push(key.clone());
                    }
                }
            }
        }
        promoted
    }

    /// Build from a raw JSON object.
    ///
    /// Scalars are kept, arrays of scalars become multi-valued properties,
    /// and every other value (null, object, nested array) is dropped with a
    /// warning instead of failing the whole record.
    pub fn from_json(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut props = Self::new();
        for (key, value) in map {
            match value {
                serde_json::Value::Array(items) => {
                    let mut values: Vec<PropertyValue> = Vec::with_capacity(items.len());
                    let mut valid = true;
                    for item in items {
                        match PropertyValue::from_json(item) {
                            Some(v) if !values.contains(&v) => values.push(v),
                            Some(_) => {}
                            None => {
                                valid = false;
                                break;
                            }
                        }
                    }
                    match (valid, values.len()) {
                        (false, _) | (true, 0) => {
                            tracing::warn!(key = %key, "Dropping property with unsupported list value");
                        }
                        (true, 1) => {
                            props.0.insert(key.clone(), Property::Single(values.remove(0)));
                        }
                        (true, _) => {
                            props.0.insert(key.clone(), Property::Multi(values));
                        }
                    }
                }
                other => match PropertyValue::from_json(other) {
                    Some(v) => {
                        props.0.insert(key.clone(), Property::Single(v));
                    }
                    None => {
                        tracing::warn!(key = %key, value = %other, "Dropping property with unsupported type");
                    }
                },
            }
        }
        props
    }

    /// Multi-valued properties serialize as arrays.
    pub fn to_json(&self) -> serde_json::Map<String, serde_json::Value> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Property)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, Property)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = (&'a String, &'a Property);
    type IntoIter = indexmap::map::Iter<'a, String, Property>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ── Labels ────────────────────────────────────────────────────────

/// Ordered set union: append each incoming label not already present.
pub fn merge_labels(existing: &mut Vec<String>, incoming: &[String]) {
    for label in incoming {
        if !existing.contains(label) {
            existing.push(label.clone());
        }
    }
}

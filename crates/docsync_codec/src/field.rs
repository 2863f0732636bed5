//! Local property bag model.

use crate::value::Timestamp;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

/// The property bag of one local entity (top-level or embedded).
pub type FieldMap = BTreeMap<String, FieldValue>;

/// A local-store property value.
///
/// Mirrors the local store's scalar repertoire. Enumerations are stored as
/// their declared raw scalar and need no variant of their own.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Null / absent value.
    Null,
    /// Signed integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// Single-precision float.
    Float(f32),
    /// Double-precision float.
    Double(f64),
    /// Text string.
    String(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Point in time.
    Date(Timestamp),
    /// Unique identifier.
    Uuid(Uuid),
    /// High-precision decimal.
    Decimal(Decimal),
    /// Embedded object owned by this entity.
    Embedded(EmbeddedRecord),
    /// Ordered list of values.
    List(Vec<FieldValue>),
    /// Unique set of values, in application-defined order.
    Set(Vec<FieldValue>),
    /// String-keyed map of values.
    Dict(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Get this value as an integer, if it is one.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as a double, if it is one.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            FieldValue::Double(f) => Some(*f),
            _ => None,
        }
    }

    /// Get this value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as an embedded record, if it is one.
    pub fn as_embedded(&self) -> Option<&EmbeddedRecord> {
        match self {
            FieldValue::Embedded(record) => Some(record),
            _ => None,
        }
    }

    /// Name of this value's variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Int(_) => "int",
            FieldValue::Bool(_) => "bool",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
            FieldValue::String(_) => "string",
            FieldValue::Bytes(_) => "bytes",
            FieldValue::Date(_) => "date",
            FieldValue::Uuid(_) => "uuid",
            FieldValue::Decimal(_) => "decimal",
            FieldValue::Embedded(_) => "embedded object",
            FieldValue::List(_) => "list",
            FieldValue::Set(_) => "set",
            FieldValue::Dict(_) => "dict",
        }
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Int(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<f64> for FieldValue {
    fn from(f: f64) -> Self {
        FieldValue::Double(f)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::String(s)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(t: Timestamp) -> Self {
        FieldValue::Date(t)
    }
}

/// An embedded entity: a property bag owned exclusively by a parent entity.
///
/// Embedded entities have no identifier of their own and carry only the
/// `synced_at` marker; the marker is local bookkeeping and never crosses the
/// store boundary outbound.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedRecord {
    /// The user property bag.
    pub fields: FieldMap,
    /// When this entity's last mutation was confirmed by the remote store.
    pub synced_at: Option<Timestamp>,
}

impl EmbeddedRecord {
    /// Creates an embedded record with no sync confirmation yet.
    pub fn new(fields: FieldMap) -> Self {
        Self {
            fields,
            synced_at: None,
        }
    }

    /// Sets the sync marker.
    #[must_use]
    pub fn with_synced_at(mut self, synced_at: Timestamp) -> Self {
        self.synced_at = Some(synced_at);
        self
    }
}

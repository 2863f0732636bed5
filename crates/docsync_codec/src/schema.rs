//! Per-entity-type schema descriptors.
//!
//! The codec is driven by explicit property metadata built at registration
//! time, not by runtime reflection. Each synchronizable entity type supplies
//! an [`EntitySchema`] naming its properties, their semantic types, and
//! their collection kinds.

use std::collections::BTreeSet;
use std::sync::Arc;

/// Semantic type of one property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyType {
    /// Signed integer.
    Int,
    /// Boolean.
    Bool,
    /// Single-precision float.
    Float,
    /// Double-precision float.
    Double,
    /// Text string.
    String,
    /// Binary data.
    Bytes,
    /// Point in time.
    Date,
    /// Unique identifier.
    Uuid,
    /// High-precision decimal.
    Decimal,
    /// Arbitrary-variant value. Never synchronizable; hitting one in the
    /// codec is a contract violation.
    Any,
    /// Reference to another object, embedded or linked.
    Object(ObjectRef),
    /// Inverse link. Never synchronizable.
    LinkingObjects,
}

impl PropertyType {
    /// Name of this type, for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::Int => "int",
            PropertyType::Bool => "bool",
            PropertyType::Float => "float",
            PropertyType::Double => "double",
            PropertyType::String => "string",
            PropertyType::Bytes => "bytes",
            PropertyType::Date => "date",
            PropertyType::Uuid => "uuid",
            PropertyType::Decimal => "decimal",
            PropertyType::Any => "any",
            PropertyType::Object(ObjectRef::Embedded(_)) => "embedded object",
            PropertyType::Object(ObjectRef::Linked(_)) => "linked object",
            PropertyType::LinkingObjects => "linking objects",
        }
    }
}

/// What an object-typed property points at.
///
/// Embedded objects are owned by the parent and inline into its document;
/// linked objects are top-level entities of their own and must be modeled
/// as remote subcollections, never inlined.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectRef {
    /// An embedded object with the given schema.
    Embedded(Arc<EntitySchema>),
    /// A link to the named top-level entity type.
    Linked(String),
}

/// Key type of a keyed-map property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapKeyType {
    /// String keys. The only supported key type.
    String,
    /// Integer keys. Unsupported by the remote store.
    Int,
}

/// Collection kind of one property.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionKind {
    /// A single value.
    Single,
    /// An ordered list of values.
    List,
    /// A unique set of values, in application-defined order.
    Set,
    /// A keyed map of values.
    Map {
        /// The declared key type.
        key: MapKeyType,
    },
}

/// Metadata for one property of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Semantic element type.
    pub ty: PropertyType,
    /// Collection kind.
    pub collection: CollectionKind,
}

impl Property {
    /// Creates a single-valued property.
    pub fn scalar(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            collection: CollectionKind::Single,
        }
    }

    /// Creates an ordered-list property.
    pub fn list(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            collection: CollectionKind::List,
        }
    }

    /// Creates a unique-set property.
    pub fn set(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            collection: CollectionKind::Set,
        }
    }

    /// Creates a string-keyed map property.
    pub fn map(name: impl Into<String>, ty: PropertyType) -> Self {
        Self::map_keyed(name, ty, MapKeyType::String)
    }

    /// Creates a keyed map property with an explicit key type.
    pub fn map_keyed(name: impl Into<String>, ty: PropertyType, key: MapKeyType) -> Self {
        Self {
            name: name.into(),
            ty,
            collection: CollectionKind::Map { key },
        }
    }

    /// Creates an embedded-object property.
    pub fn embedded(name: impl Into<String>, schema: Arc<EntitySchema>) -> Self {
        Self::scalar(name, PropertyType::Object(ObjectRef::Embedded(schema)))
    }

    /// Creates a linked-object property.
    ///
    /// Linked objects cannot cross the store boundary; declaring one is only
    /// useful together with an outbound-ignore entry.
    pub fn linked(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::scalar(name, PropertyType::Object(ObjectRef::Linked(target.into())))
    }
}

/// Whether an entity type is top-level or embedded, and whether it supports
/// local deletion tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// A top-level entity with a stable string identifier.
    TopLevel {
        /// True if local deletes are tracked until the remote delete lands.
        deletable: bool,
    },
    /// An embedded entity owned by a parent.
    Embedded,
}

/// Schema descriptor for one synchronizable entity type.
///
/// The identifier and the sync markers are structural fields of entity
/// records, not schema properties, so they never appear in an outbound
/// document and are never read from an inbound one. The ignore sets are the
/// per-type customization hooks for excluding ordinary properties from one
/// direction of the conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    /// Entity type name.
    pub name: String,
    /// Top-level or embedded, and deletability.
    pub kind: SchemaKind,
    /// Ordered property metadata.
    pub properties: Vec<Property>,
    /// Properties excluded from outbound documents.
    pub outbound_ignore: BTreeSet<String>,
    /// Properties never read from inbound documents.
    pub inbound_ignore: BTreeSet<String>,
}

impl EntitySchema {
    /// Creates a top-level, non-deletable entity schema.
    pub fn top_level(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SchemaKind::TopLevel { deletable: false },
            properties: Vec::new(),
            outbound_ignore: BTreeSet::new(),
            inbound_ignore: BTreeSet::new(),
        }
    }

    /// Creates an embedded entity schema.
    pub fn embedded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SchemaKind::Embedded,
            properties: Vec::new(),
            outbound_ignore: BTreeSet::new(),
            inbound_ignore: BTreeSet::new(),
        }
    }

    /// Marks a top-level schema as deletable. No effect on embedded schemas.
    #[must_use]
    pub fn deletable(mut self) -> Self {
        if let SchemaKind::TopLevel { deletable } = &mut self.kind {
            *deletable = true;
        }
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Excludes a property from outbound documents.
    #[must_use]
    pub fn ignore_outbound(mut self, name: impl Into<String>) -> Self {
        self.outbound_ignore.insert(name.into());
        self
    }

    /// Excludes a property from inbound conversion.
    #[must_use]
    pub fn ignore_inbound(mut self, name: impl Into<String>) -> Self {
        self.inbound_ignore.insert(name.into());
        self
    }

    /// True if this schema tracks local deletions.
    pub fn is_deletable(&self) -> bool {
        matches!(self.kind, SchemaKind::TopLevel { deletable: true })
    }

    /// True if this is an embedded entity schema.
    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, SchemaKind::Embedded)
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_builder() {
        let child = Arc::new(
            EntitySchema::embedded("Address")
                .with_property(Property::scalar("street", PropertyType::String)),
        );

        let schema = EntitySchema::top_level("Person")
            .deletable()
            .with_property(Property::scalar("name", PropertyType::String))
            .with_property(Property::list("tags", PropertyType::String))
            .with_property(Property::embedded("address", Arc::clone(&child)))
            .ignore_outbound("tags");

        assert_eq!(schema.name, "Person");
        assert!(schema.is_deletable());
        assert!(!schema.is_embedded());
        assert!(child.is_embedded());
        assert_eq!(schema.properties.len(), 3);
        assert!(schema.outbound_ignore.contains("tags"));
        assert!(schema.inbound_ignore.is_empty());
    }

    #[test]
    fn deletable_has_no_effect_on_embedded() {
        let schema = EntitySchema::embedded("Address").deletable();
        assert!(!schema.is_deletable());
        assert!(schema.is_embedded());
    }

    #[test]
    fn property_lookup() {
        let schema = EntitySchema::top_level("Person")
            .with_property(Property::scalar("name", PropertyType::String));

        assert!(schema.property("name").is_some());
        assert!(schema.property("missing").is_none());
    }

    #[test]
    fn property_constructors() {
        let p = Property::map("labels", PropertyType::String);
        assert_eq!(
            p.collection,
            CollectionKind::Map {
                key: MapKeyType::String
            }
        );

        let p = Property::linked("owner", "Person");
        assert_eq!(p.ty.name(), "linked object");

        let p = Property::set("tags", PropertyType::String);
        assert_eq!(p.collection, CollectionKind::Set);
    }
}

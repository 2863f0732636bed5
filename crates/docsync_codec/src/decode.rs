//! Inbound conversion: remote documents to local property bags.

use crate::encode::is_coordinates;
use crate::error::{CodecError, CodecResult};
use crate::field::{EmbeddedRecord, FieldMap, FieldValue};
use crate::schema::{CollectionKind, EntitySchema, MapKeyType, ObjectRef, Property, PropertyType};
use crate::value::{Document, Timestamp, Value};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Converts a remote document into a local property bag.
///
/// Properties in the schema's inbound-ignore set are skipped. A field absent
/// from the document leaves the property untouched, never zeroed. Embedded
/// objects recurse and are stamped with the supplied `synced_at`; a geo
/// point decodes back to a two-element `[longitude, latitude]` collection.
///
/// The caller supplies the sync timestamp and, for top-level entities, the
/// document identifier; together with the returned bag they form a record
/// usable directly for create-or-update.
///
/// # Errors
///
/// Returns a [`CodecError`] contract violation under the same conditions as
/// the outbound direction.
pub fn from_document(
    schema: &EntitySchema,
    document: &Document,
    synced_at: Timestamp,
) -> CodecResult<FieldMap> {
    let mut fields = FieldMap::new();

    for property in &schema.properties {
        if schema.inbound_ignore.contains(&property.name) {
            continue;
        }
        let Some(value) = document.get(&property.name) else {
            continue;
        };

        match &property.collection {
            CollectionKind::Single => {
                fields.insert(
                    property.name.clone(),
                    decode_element(value, property, synced_at)?,
                );
            }
            CollectionKind::List | CollectionKind::Set => {
                let elements = if is_coordinates(property) {
                    decode_geo_point(value, property)?
                } else {
                    let array = value.as_array().ok_or_else(|| {
                        CodecError::type_mismatch(&property.name, "array", value.type_name())
                    })?;
                    array
                        .iter()
                        .map(|element| decode_element(element, property, synced_at))
                        .collect::<CodecResult<Vec<_>>>()?
                };
                let collection = match property.collection {
                    CollectionKind::List => FieldValue::List(elements),
                    _ => FieldValue::Set(elements),
                };
                fields.insert(property.name.clone(), collection);
            }
            CollectionKind::Map { key } => {
                if *key != MapKeyType::String {
                    return Err(CodecError::UnsupportedKeyType {
                        property: property.name.clone(),
                    });
                }
                let map = value.as_map().ok_or_else(|| {
                    CodecError::type_mismatch(&property.name, "map", value.type_name())
                })?;
                let mut dict = BTreeMap::new();
                for (key, element) in map {
                    dict.insert(key.clone(), decode_element(element, property, synced_at)?);
                }
                fields.insert(property.name.clone(), FieldValue::Dict(dict));
            }
        }
    }

    Ok(fields)
}

fn decode_geo_point(value: &Value, property: &Property) -> CodecResult<Vec<FieldValue>> {
    let (latitude, longitude) = value.as_geo_point().ok_or_else(|| {
        CodecError::type_mismatch(&property.name, "geo point", value.type_name())
    })?;
    Ok(vec![
        FieldValue::Double(longitude),
        FieldValue::Double(latitude),
    ])
}

/// Converts one remote value back following the fixed type table.
#[allow(clippy::cast_possible_truncation)]
fn decode_element(
    value: &Value,
    property: &Property,
    synced_at: Timestamp,
) -> CodecResult<FieldValue> {
    match (&property.ty, value) {
        (PropertyType::Int, Value::Integer(n)) => Ok(FieldValue::Int(*n)),
        (PropertyType::Bool, Value::Bool(b)) => Ok(FieldValue::Bool(*b)),
        (PropertyType::Float, Value::Float(f)) => Ok(FieldValue::Float(*f as f32)),
        (PropertyType::Double, Value::Float(f)) => Ok(FieldValue::Double(*f)),
        (PropertyType::String, Value::Text(s)) => Ok(FieldValue::String(s.clone())),
        (PropertyType::Bytes, Value::Bytes(b)) => Ok(FieldValue::Bytes(b.clone())),
        (PropertyType::Date, Value::Timestamp(t)) => Ok(FieldValue::Date(*t)),
        (PropertyType::Uuid, Value::Text(s)) => {
            let uuid = Uuid::parse_str(s)
                .map_err(|e| CodecError::invalid_value(&property.name, e.to_string()))?;
            Ok(FieldValue::Uuid(uuid))
        }
        (PropertyType::Decimal, Value::Float(f)) => {
            let decimal = Decimal::from_f64(*f).ok_or_else(|| {
                CodecError::invalid_value(&property.name, "number out of decimal range")
            })?;
            Ok(FieldValue::Decimal(decimal))
        }
        (PropertyType::Object(ObjectRef::Embedded(schema)), Value::Map(nested)) => {
            let fields = from_document(schema, nested, synced_at)?;
            Ok(FieldValue::Embedded(
                EmbeddedRecord::new(fields).with_synced_at(synced_at),
            ))
        }
        (PropertyType::Object(ObjectRef::Linked(_)), _) => {
            Err(CodecError::LinkedObjectNotSupported {
                property: property.name.clone(),
            })
        }
        (ty @ (PropertyType::Any | PropertyType::LinkingObjects), _) => {
            Err(CodecError::UnsupportedPropertyType {
                property: property.name.clone(),
                type_name: ty.name(),
            })
        }
        (declared, actual) => Err(CodecError::type_mismatch(
            &property.name,
            declared.name(),
            actual.type_name(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::COORDINATES_PROPERTY;
    use std::sync::Arc;

    fn doc(entries: Vec<(&str, Value)>) -> Document {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn decodes_scalars() {
        let schema = EntitySchema::top_level("All")
            .with_property(Property::scalar("int", PropertyType::Int))
            .with_property(Property::scalar("float", PropertyType::Float))
            .with_property(Property::scalar("uuid", PropertyType::Uuid))
            .with_property(Property::scalar("decimal", PropertyType::Decimal));

        let uuid = Uuid::new_v4();
        let document = doc(vec![
            ("int", Value::Integer(7)),
            ("float", Value::Float(1.5)),
            ("uuid", Value::Text(uuid.to_string())),
            ("decimal", Value::Float(5.12345)),
        ]);

        let fields = from_document(&schema, &document, Timestamp::from_millis(1)).unwrap();
        assert_eq!(fields["int"], FieldValue::Int(7));
        assert_eq!(fields["float"], FieldValue::Float(1.5));
        assert_eq!(fields["uuid"], FieldValue::Uuid(uuid));
        assert_eq!(
            fields["decimal"],
            FieldValue::Decimal(Decimal::from_f64(5.12345).unwrap())
        );
    }

    #[test]
    fn absent_field_leaves_property_untouched() {
        let schema = EntitySchema::top_level("T")
            .with_property(Property::scalar("present", PropertyType::Int))
            .with_property(Property::scalar("absent", PropertyType::Int));

        let document = doc(vec![("present", Value::Integer(1))]);
        let fields = from_document(&schema, &document, Timestamp::from_millis(1)).unwrap();
        assert_eq!(fields.len(), 1);
        assert!(!fields.contains_key("absent"));
    }

    #[test]
    fn inbound_ignore_is_honored() {
        let schema = EntitySchema::top_level("T")
            .with_property(Property::scalar("kept", PropertyType::Int))
            .with_property(Property::scalar("hidden", PropertyType::Int))
            .ignore_inbound("hidden");

        let document = doc(vec![
            ("kept", Value::Integer(1)),
            ("hidden", Value::Integer(2)),
        ]);
        let fields = from_document(&schema, &document, Timestamp::from_millis(1)).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["kept"], FieldValue::Int(1));
    }

    #[test]
    fn geo_point_decodes_to_longitude_latitude() {
        let schema = EntitySchema::top_level("Place")
            .with_property(Property::list(COORDINATES_PROPERTY, PropertyType::Double));

        let document = doc(vec![(
            "coordinates",
            Value::GeoPoint {
                latitude: 45.6,
                longitude: 12.3,
            },
        )]);

        let fields = from_document(&schema, &document, Timestamp::from_millis(1)).unwrap();
        assert_eq!(
            fields["coordinates"],
            FieldValue::List(vec![FieldValue::Double(12.3), FieldValue::Double(45.6)])
        );
    }

    #[test]
    fn embedded_object_is_stamped_with_synced_at() {
        let child = Arc::new(
            EntitySchema::embedded("Child")
                .with_property(Property::scalar("name", PropertyType::String)),
        );
        let schema = EntitySchema::top_level("Parent")
            .with_property(Property::embedded("child", child));

        let document = doc(vec![(
            "child",
            Value::Map(doc(vec![("name", Value::Text("n".into()))])),
        )]);

        let synced_at = Timestamp::from_millis(99);
        let fields = from_document(&schema, &document, synced_at).unwrap();
        let record = fields["child"].as_embedded().unwrap();
        assert_eq!(record.synced_at, Some(synced_at));
        assert_eq!(record.fields["name"], FieldValue::from("n"));
    }

    #[test]
    fn invalid_uuid_is_a_contract_violation() {
        let schema = EntitySchema::top_level("T")
            .with_property(Property::scalar("uuid", PropertyType::Uuid));

        let document = doc(vec![("uuid", Value::Text("not-a-uuid".into()))]);
        let err = from_document(&schema, &document, Timestamp::from_millis(1)).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { .. }));
    }

    #[test]
    fn mismatched_remote_value_fails() {
        let schema = EntitySchema::top_level("T")
            .with_property(Property::scalar("age", PropertyType::Int));

        let document = doc(vec![("age", Value::Text("forty".into()))]);
        let err = from_document(&schema, &document, Timestamp::from_millis(1)).unwrap_err();
        assert_eq!(err, CodecError::type_mismatch("age", "int", "text"));
    }

    #[test]
    fn set_round_trips_as_array() {
        let schema = EntitySchema::top_level("T")
            .with_property(Property::set("tags", PropertyType::String));

        let document = doc(vec![(
            "tags",
            Value::Array(vec![Value::Text("c".into()), Value::Text("d".into())]),
        )]);
        let fields = from_document(&schema, &document, Timestamp::from_millis(1)).unwrap();
        assert_eq!(
            fields["tags"],
            FieldValue::Set(vec![FieldValue::from("c"), FieldValue::from("d")])
        );
    }
}

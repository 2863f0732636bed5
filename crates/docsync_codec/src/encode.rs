//! Outbound conversion: local property bags to remote documents.

use crate::error::{CodecError, CodecResult};
use crate::field::{FieldMap, FieldValue};
use crate::schema::{CollectionKind, EntitySchema, MapKeyType, ObjectRef, Property, PropertyType};
use crate::value::{Document, Value};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

/// The one property name encoded as a geo point instead of an array.
///
/// A two-element double collection named `coordinates` becomes a single geo
/// point value: element 1 is the latitude, element 0 the longitude. This is
/// a deliberate narrow exception.
pub const COORDINATES_PROPERTY: &str = "coordinates";

/// Converts a local property bag into a remote document.
///
/// Properties in the schema's outbound-ignore set are skipped, as are null
/// or absent values (an absent value means the field is not written).
/// Collections convert element-wise; embedded objects recurse.
///
/// # Errors
///
/// Returns a [`CodecError`] contract violation if a value does not match its
/// declared type, a map key type is not string, a linked object or an
/// unsupported property type is encountered, or a `coordinates` collection
/// is malformed.
pub fn to_document(schema: &EntitySchema, fields: &FieldMap) -> CodecResult<Document> {
    let mut document = Document::new();

    for property in &schema.properties {
        if schema.outbound_ignore.contains(&property.name) {
            continue;
        }
        let Some(value) = fields.get(&property.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }

        match &property.collection {
            CollectionKind::Single => {
                document.insert(property.name.clone(), encode_element(value, property)?);
            }
            CollectionKind::List | CollectionKind::Set => {
                let elements = match value {
                    FieldValue::List(items) | FieldValue::Set(items) => items,
                    other => {
                        return Err(CodecError::type_mismatch(
                            &property.name,
                            "collection",
                            other.type_name(),
                        ))
                    }
                };

                if is_coordinates(property) {
                    document.insert(property.name.clone(), encode_geo_point(elements, property)?);
                } else {
                    let mut array = Vec::with_capacity(elements.len());
                    for element in elements {
                        array.push(encode_element(element, property)?);
                    }
                    document.insert(property.name.clone(), Value::Array(array));
                }
            }
            CollectionKind::Map { key } => {
                if *key != MapKeyType::String {
                    return Err(CodecError::UnsupportedKeyType {
                        property: property.name.clone(),
                    });
                }
                let FieldValue::Dict(entries) = value else {
                    return Err(CodecError::type_mismatch(
                        &property.name,
                        "dict",
                        value.type_name(),
                    ));
                };
                let mut map = BTreeMap::new();
                for (key, element) in entries {
                    map.insert(key.clone(), encode_element(element, property)?);
                }
                document.insert(property.name.clone(), Value::Map(map));
            }
        }
    }

    Ok(document)
}

pub(crate) fn is_coordinates(property: &Property) -> bool {
    matches!(property.ty, PropertyType::Double) && property.name == COORDINATES_PROPERTY
}

fn encode_geo_point(elements: &[FieldValue], property: &Property) -> CodecResult<Value> {
    // Element 1 is the latitude, element 0 the longitude.
    let [FieldValue::Double(longitude), FieldValue::Double(latitude)] = elements else {
        return Err(CodecError::InvalidCoordinates {
            property: property.name.clone(),
        });
    };
    Ok(Value::GeoPoint {
        latitude: *latitude,
        longitude: *longitude,
    })
}

/// Converts one scalar or embedded value following the fixed type table.
fn encode_element(value: &FieldValue, property: &Property) -> CodecResult<Value> {
    match (&property.ty, value) {
        (PropertyType::Int, FieldValue::Int(n)) => Ok(Value::Integer(*n)),
        (PropertyType::Bool, FieldValue::Bool(b)) => Ok(Value::Bool(*b)),
        (PropertyType::Float, FieldValue::Float(f)) => Ok(Value::Float(f64::from(*f))),
        (PropertyType::Double, FieldValue::Double(f)) => Ok(Value::Float(*f)),
        (PropertyType::String, FieldValue::String(s)) => Ok(Value::Text(s.clone())),
        (PropertyType::Bytes, FieldValue::Bytes(b)) => Ok(Value::Bytes(b.clone())),
        (PropertyType::Date, FieldValue::Date(t)) => Ok(Value::Timestamp(*t)),
        (PropertyType::Uuid, FieldValue::Uuid(u)) => Ok(Value::Text(u.to_string())),
        (PropertyType::Decimal, FieldValue::Decimal(d)) => {
            let number = d.to_f64().ok_or_else(|| {
                CodecError::invalid_value(&property.name, "decimal out of number range")
            })?;
            Ok(Value::Float(number))
        }
        (PropertyType::Object(ObjectRef::Embedded(schema)), FieldValue::Embedded(record)) => {
            Ok(Value::Map(to_document(schema, &record.fields)?))
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

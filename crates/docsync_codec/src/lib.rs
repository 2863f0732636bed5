//! # DocSync Codec
//!
//! Object-to-document marshalling for DocSync.
//!
//! This crate converts a local-store entity's property bag into a remote
//! document's value bag and back, driven by explicit per-entity-type schema
//! descriptors:
//!
//! - [`Value`] / [`Document`] — the remote store's value vocabulary
//! - [`FieldValue`] / [`FieldMap`] — the local store's property bag
//! - [`EntitySchema`] — property name, semantic type, and collection kind
//!   metadata for one entity type
//! - [`to_document`] / [`from_document`] — the two conversion directions
//!
//! ## Conversion rules
//!
//! - Scalars follow a fixed type table (integers, booleans, floats,
//!   strings, bytes, timestamps, unique identifiers as strings, decimals as
//!   numbers)
//! - Collections convert element-wise; keyed maps require string keys
//! - Embedded objects recurse; linked top-level objects fail loudly
//! - A two-element double collection named `coordinates` is encoded as a
//!   single geo point instead of an array
//!
//! Any divergence between declared metadata and a runtime value is a
//! contract violation ([`CodecError`]), not a recoverable error.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decode;
mod encode;
mod error;
mod field;
mod schema;
mod value;

pub use decode::from_document;
pub use encode::{to_document, COORDINATES_PROPERTY};
pub use error::{CodecError, CodecResult};
pub use field::{EmbeddedRecord, FieldMap, FieldValue};
pub use schema::{
    CollectionKind, EntitySchema, MapKeyType, ObjectRef, Property, PropertyType, SchemaKind,
};
pub use value::{Document, Timestamp, Value};

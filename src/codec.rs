//! Value codec between native field values and stored scalars
//!
//! The stored scalar model is `rusqlite::types::Value`. Conversion strategy
//! is fixed per column at schema-definition time:
//! - `Plain`: pass through, narrowed by the declared native kind on decode
//! - `UniqueId`: canonical 36-character identifier text
//! - `Opaque`: base64-wrapped JSON produced by the external serializer

use crate::schema::FieldDescriptor;
use crate::types::{CodecKind, NativeKind};
use crate::value::FieldValue;
use crate::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::Value as Scalar;
use tracing::warn;
use uuid::Uuid;

/// Serialize an opaque document into its text-safe stored form.
pub fn serialize_opaque(json: &serde_json::Value) -> Result<String> {
    let bytes = serde_json::to_vec(json)
        .map_err(|e| Error::Decode(format!("cannot serialize opaque value: {}", e)))?;
    Ok(BASE64.encode(bytes))
}

/// Parse the text-safe stored form back into an opaque document.
pub fn deserialize_opaque(text: &str) -> Result<serde_json::Value> {
    let bytes = BASE64
        .decode(text)
        .map_err(|e| Error::Decode(format!("opaque value is not base64: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::Decode(format!("opaque value is not valid JSON: {}", e)))
}

/// Encode a native field value into the scalar bound for its column.
pub fn encode(value: &FieldValue, descriptor: &FieldDescriptor) -> Result<Scalar> {
    if value.is_null() {
        return Ok(Scalar::Null);
    }

    match descriptor.codec {
        CodecKind::Plain => encode_plain(value),
        CodecKind::UniqueId => match value {
            FieldValue::Uuid(id) => Ok(Scalar::Text(id.to_string())),
            FieldValue::Text(text) => Ok(Scalar::Text(text.clone())),
            other => Err(Error::Decode(format!(
                "column {} expects a unique identifier, got {:?}",
                descriptor.column, other
            ))),
        },
        CodecKind::Opaque => match value {
            FieldValue::Opaque(json) => Ok(Scalar::Text(serialize_opaque(json)?)),
            other => Err(Error::Decode(format!(
                "column {} expects an opaque value, got {:?}",
                descriptor.column, other
            ))),
        },
    }
}

/// Encode a value with no declared descriptor, e.g. a WHERE predicate
/// against an undeclared column.
pub fn encode_plain(value: &FieldValue) -> Result<Scalar> {
    match value {
        FieldValue::Null => Ok(Scalar::Null),
        FieldValue::I8(v) => Ok(Scalar::Integer(i64::from(*v))),
        FieldValue::I16(v) => Ok(Scalar::Integer(i64::from(*v))),
        FieldValue::I32(v) => Ok(Scalar::Integer(i64::from(*v))),
        FieldValue::I64(v) => Ok(Scalar::Integer(*v)),
        FieldValue::Bool(v) => Ok(Scalar::Integer(i64::from(*v))),
        FieldValue::Char(v) => Ok(Scalar::Text(v.to_string())),
        FieldValue::Text(v) => Ok(Scalar::Text(v.clone())),
        FieldValue::F32(v) => Ok(Scalar::Real(f64::from(*v))),
        FieldValue::F64(v) => Ok(Scalar::Real(*v)),
        FieldValue::Uuid(v) => Ok(Scalar::Text(v.to_string())),
        FieldValue::Opaque(_) => Err(Error::Decode(
            "opaque values cannot be bound without a declared column".to_string(),
        )),
    }
}

/// Decode a stored scalar back into the native value its column declares.
pub fn decode(scalar: Scalar, descriptor: &FieldDescriptor) -> Result<FieldValue> {
    if matches!(scalar, Scalar::Null) {
        return Ok(FieldValue::Null);
    }

    match descriptor.codec {
        CodecKind::Plain => decode_plain(scalar, descriptor),
        CodecKind::UniqueId => match scalar {
            Scalar::Text(text) => Uuid::parse_str(&text).map(FieldValue::Uuid).map_err(|e| {
                Error::Decode(format!(
                    "column {} holds a malformed unique identifier: {}",
                    descriptor.column, e
                ))
            }),
            other => Err(mismatch(descriptor, "identifier text", &other)),
        },
        CodecKind::Opaque => decode_opaque(scalar, descriptor),
    }
}

fn decode_opaque(scalar: Scalar, descriptor: &FieldDescriptor) -> Result<FieldValue> {
    match scalar {
        Scalar::Text(text) => match deserialize_opaque(&text) {
            Ok(json) => Ok(FieldValue::Opaque(json)),
            // Legacy rows written before the column carried the opaque
            // codec: keep the raw text as a JSON string.
            Err(_) => {
                warn!(
                    column = %descriptor.column,
                    "opaque column holds a non-enveloped value, keeping raw text"
                );
                Ok(FieldValue::Opaque(serde_json::Value::String(text)))
            }
        },
        Scalar::Integer(v) => Ok(FieldValue::Opaque(serde_json::Value::from(v))),
        Scalar::Real(v) => Ok(FieldValue::Opaque(serde_json::Value::from(v))),
        other => Err(mismatch(descriptor, "opaque text", &other)),
    }
}

fn decode_plain(scalar: Scalar, descriptor: &FieldDescriptor) -> Result<FieldValue> {
    match descriptor.native {
        NativeKind::I8 => narrow_integer(scalar, descriptor, |v| {
            i8::try_from(v).ok().map(FieldValue::I8)
        }),
        NativeKind::I16 => narrow_integer(scalar, descriptor, |v| {
            i16::try_from(v).ok().map(FieldValue::I16)
        }),
        NativeKind::I32 => narrow_integer(scalar, descriptor, |v| {
            i32::try_from(v).ok().map(FieldValue::I32)
        }),
        NativeKind::I64 => narrow_integer(scalar, descriptor, |v| Some(FieldValue::I64(v))),
        NativeKind::Bool => match scalar {
            Scalar::Integer(0) => Ok(FieldValue::Bool(false)),
            Scalar::Integer(1) => Ok(FieldValue::Bool(true)),
            other => Err(mismatch(descriptor, "boolean", &other)),
        },
        NativeKind::Char => match scalar {
            Scalar::Text(text) => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(FieldValue::Char(c)),
                    _ => Err(Error::Decode(format!(
                        "column {} holds {:?}, expected a single character",
                        descriptor.column, text
                    ))),
                }
            }
            other => Err(mismatch(descriptor, "character", &other)),
        },
        NativeKind::Text => match scalar {
            Scalar::Text(text) => Ok(FieldValue::Text(text)),
            other => Err(mismatch(descriptor, "text", &other)),
        },
        NativeKind::F32 => match scalar {
            Scalar::Real(v) => Ok(FieldValue::F32(v as f32)),
            Scalar::Integer(v) => Ok(FieldValue::F32(v as f32)),
            other => Err(mismatch(descriptor, "float", &other)),
        },
        NativeKind::F64 => match scalar {
            Scalar::Real(v) => Ok(FieldValue::F64(v)),
            Scalar::Integer(v) => Ok(FieldValue::F64(v as f64)),
            other => Err(mismatch(descriptor, "double", &other)),
        },
        // Uuid and Opaque columns carry their own codec kind and never
        // reach the plain path.
        NativeKind::Uuid | NativeKind::Opaque => Err(Error::Decode(format!(
            "column {} declares {} but uses the plain codec",
            descriptor.column, descriptor.native
        ))),
    }
}

fn narrow_integer(
    scalar: Scalar,
    descriptor: &FieldDescriptor,
    narrow: fn(i64) -> Option<FieldValue>,
) -> Result<FieldValue> {
    match scalar {
        Scalar::Integer(v) => narrow(v).ok_or_else(|| {
            Error::Decode(format!(
                "column {} holds {} which is out of range for {}",
                descriptor.column, v, descriptor.native
            ))
        }),
        other => Err(mismatch(descriptor, "integer", &other)),
    }
}

fn mismatch(descriptor: &FieldDescriptor, expected: &str, got: &Scalar) -> Error {
    Error::Decode(format!(
        "column {} holds {:?}, expected {}",
        descriptor.column, got, expected
    ))
}

//! Native value model
//!
//! `FieldValue` is the single currency between field accessors, the value
//! codec and the reference resolver. Every declared field reads to and
//! writes from one of these variants.

use crate::types::NativeKind;
use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use uuid::Uuid;

/// A native field value in transit between an instance and storage.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    Bool(bool),
    Char(char),
    Text(String),
    F32(f32),
    F64(f64),
    Uuid(Uuid),
    /// Opaque serialized value carried as a JSON document
    Opaque(serde_json::Value),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// The native kind this value carries, if any
    pub fn kind(&self) -> Option<NativeKind> {
        match self {
            FieldValue::Null => None,
            FieldValue::I8(_) => Some(NativeKind::I8),
            FieldValue::I16(_) => Some(NativeKind::I16),
            FieldValue::I32(_) => Some(NativeKind::I32),
            FieldValue::I64(_) => Some(NativeKind::I64),
            FieldValue::Bool(_) => Some(NativeKind::Bool),
            FieldValue::Char(_) => Some(NativeKind::Char),
            FieldValue::Text(_) => Some(NativeKind::Text),
            FieldValue::F32(_) => Some(NativeKind::F32),
            FieldValue::F64(_) => Some(NativeKind::F64),
            FieldValue::Uuid(_) => Some(NativeKind::Uuid),
            FieldValue::Opaque(_) => Some(NativeKind::Opaque),
        }
    }

    /// Wrap any serializable value as an opaque document
    pub fn opaque<T: Serialize>(value: &T) -> Result<FieldValue> {
        let json = serde_json::to_value(value)
            .map_err(|e| Error::Decode(format!("cannot serialize opaque value: {}", e)))?;
        Ok(FieldValue::Opaque(json))
    }

    /// Unwrap an opaque document back into its native type
    pub fn into_opaque<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            FieldValue::Opaque(json) => serde_json::from_value(json)
                .map_err(|e| Error::Decode(format!("cannot deserialize opaque value: {}", e))),
            other => Err(Error::Decode(format!(
                "expected an opaque value, got {:?}",
                other
            ))),
        }
    }
}

/// Canonical string form, used when a reference predicate compares
/// a field against a literal.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::I8(v) => write!(f, "{}", v),
            FieldValue::I16(v) => write!(f, "{}", v),
            FieldValue::I32(v) => write!(f, "{}", v),
            FieldValue::I64(v) => write!(f, "{}", v),
            FieldValue::Bool(v) => write!(f, "{}", v),
            FieldValue::Char(v) => write!(f, "{}", v),
            FieldValue::Text(v) => write!(f, "{}", v),
            FieldValue::F32(v) => write!(f, "{}", v),
            FieldValue::F64(v) => write!(f, "{}", v),
            FieldValue::Uuid(v) => write!(f, "{}", v),
            FieldValue::Opaque(v) => write!(f, "{}", v),
        }
    }
}

macro_rules! value_conversions {
    ($($variant:ident => $native:ty),* $(,)?) => {
        $(
            impl From<$native> for FieldValue {
                fn from(v: $native) -> Self {
                    FieldValue::$variant(v)
                }
            }

            impl From<Option<$native>> for FieldValue {
                fn from(v: Option<$native>) -> Self {
                    match v {
                        Some(v) => FieldValue::$variant(v),
                        None => FieldValue::Null,
                    }
                }
            }

            impl TryFrom<FieldValue> for $native {
                type Error = Error;

                fn try_from(value: FieldValue) -> Result<Self> {
                    match value {
                        FieldValue::$variant(v) => Ok(v),
                        other => Err(Error::Decode(format!(
                            "expected {}, got {:?}",
                            stringify!($native),
                            other
                        ))),
                    }
                }
            }

            impl TryFrom<FieldValue> for Option<$native> {
                type Error = Error;

                fn try_from(value: FieldValue) -> Result<Self> {
                    match value {
                        FieldValue::Null => Ok(None),
                        FieldValue::$variant(v) => Ok(Some(v)),
                        other => Err(Error::Decode(format!(
                            "expected {} or null, got {:?}",
                            stringify!($native),
                            other
                        ))),
                    }
                }
            }
        )*
    };
}

value_conversions! {
    I8 => i8,
    I16 => i16,
    I32 => i32,
    I64 => i64,
    Bool => bool,
    Char => char,
    Text => String,
    F32 => f32,
    F64 => f64,
    Uuid => Uuid,
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

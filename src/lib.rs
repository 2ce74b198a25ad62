//! # Rowmap - Declarative object-relational mapping
//!
//! Maps plain Rust structs to relational tables and back, driven by
//! per-field metadata declared once per type.
//!
//! Rowmap provides:
//! - Schema derivation from declared field metadata, memoized per type
//! - Canonical SQL text generation with positional placeholders
//! - Value codecs for primitives, unique identifiers and opaque blobs
//! - Statement execution mapping result rows back into instances
//! - In-memory reference resolution stitching fetched sets into a graph

pub mod access;
pub mod codec;
pub mod config;
pub mod connection;
pub mod driver;
pub mod executor;
pub mod meta;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod source;
pub mod types;
pub mod value;

// Re-exports for convenient access
pub use access::{AccessMode, FieldAccessor};
pub use config::DriverConfig;
pub use connection::SqlConnection;
pub use driver::SqlDriver;
pub use executor::Where;
pub use meta::{Cardinality, Entity, EntityMeta, FieldSpec, FieldVtable, Record, ReferenceDef};
pub use resolver::{FetchedSet, GraphQuery, ObjectGraph};
pub use schema::{FieldDescriptor, Schema, SchemaCatalog};
pub use types::{CodecKind, NativeKind, SqlType};
pub use value::FieldValue;

/// Result type alias for Rowmap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Rowmap operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid declarative metadata
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Statement preparation, execution or row-read failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] rusqlite::Error),

    /// A stored scalar cannot be converted back to its declared type
    #[error("Decode error: {0}")]
    Decode(String),

    /// A reference target type was not part of the same load
    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Schema derivation and the per-type catalog
//!
//! A `Schema` is derived once per type from its declared metadata and
//! accessor table, then cached for the process lifetime. Derivation is
//! where every configuration default and invariant is applied:
//! - column name: declared override or lower-cased field name
//! - column type: declared override or inferred from the native kind
//! - transient fields are excluded entirely
//! - column names must be unique within a table

use crate::meta::Entity;
use crate::types::{CodecKind, NativeKind, SqlType};
use crate::{Error, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Per-field storage metadata, fixed at schema-definition time.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Declared field identifier
    pub logical: &'static str,
    /// Storage column name
    pub column: String,
    /// Rendered column type
    pub sql_type: SqlType,
    /// Native shape of the field value
    pub native: NativeKind,
    pub nullable: bool,
    /// Conversion strategy between native value and stored scalar
    pub codec: CodecKind,
    /// Participates in derived WHERE clauses for update/delete
    pub primary: bool,
}

/// Derived table description for a mapped type. Immutable after
/// construction.
#[derive(Debug, Clone)]
pub struct Schema {
    pub table: String,
    pub fields: Vec<FieldDescriptor>,
}

impl Schema {
    /// Reverse lookup by storage column name
    pub fn field_by_column(&self, column: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Lookup by declared field identifier
    pub fn field_by_logical(&self, logical: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.logical == logical)
    }

    /// Fields marked as primary key, in declared order
    pub fn primary_fields(&self) -> Vec<&FieldDescriptor> {
        self.fields.iter().filter(|f| f.primary).collect()
    }

    /// Derive the schema for a type from its declared metadata.
    pub fn derive<E: Entity>() -> Result<Self> {
        let meta = E::meta();

        let table = meta.table.ok_or_else(|| {
            Error::Configuration(format!("{} declares no table name", E::entity_name()))
        })?;
        if table.is_empty() {
            return Err(Error::Configuration(format!(
                "{} declares an empty table name",
                E::entity_name()
            )));
        }

        for spec in &meta.fields {
            if !E::accessors().iter().any(|f| f.name == spec.name) {
                return Err(Error::Configuration(format!(
                    "{} configures unknown field {}",
                    E::entity_name(),
                    spec.name
                )));
            }
        }

        let mut fields: Vec<FieldDescriptor> = Vec::new();
        for entry in E::accessors() {
            let spec = meta.spec_for(entry.name);

            if spec.is_some_and(|s| s.transient) {
                continue;
            }

            let column = spec
                .and_then(|s| s.column)
                .map(str::to_string)
                .unwrap_or_else(|| entry.name.to_lowercase());
            if fields.iter().any(|f| f.column == column) {
                return Err(Error::Configuration(format!(
                    "{} maps two fields to column {}",
                    E::entity_name(),
                    column
                )));
            }

            let sql_type = spec
                .and_then(|s| s.sql_type.clone())
                .unwrap_or_else(|| entry.kind.default_sql_type());

            fields.push(FieldDescriptor {
                logical: entry.name,
                column,
                sql_type,
                native: entry.kind,
                nullable: spec.is_some_and(|s| s.nullable),
                codec: entry.kind.codec_kind(),
                primary: spec.is_some_and(|s| s.primary),
            });
        }

        if fields.is_empty() {
            return Err(Error::Configuration(format!(
                "{} has no persistable fields",
                E::entity_name()
            )));
        }

        debug!(
            entity = E::entity_name(),
            table, columns = fields.len(), "derived schema"
        );

        Ok(Schema {
            table: table.to_string(),
            fields,
        })
    }
}

/// Memoizing schema catalog, keyed by type identity.
///
/// Concurrent first use of the same type is safe: derivation may race, but
/// exactly one result is published and readers never observe a partially
/// built schema.
pub struct SchemaCatalog {
    cache: RwLock<HashMap<TypeId, Arc<Schema>>>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get the schema for a type, deriving and caching it on first use.
    pub fn describe<E: Entity>(&self) -> Result<Arc<Schema>> {
        let key = TypeId::of::<E>();

        if let Some(schema) = self
            .cache
            .read()
            .expect("schema cache lock poisoned")
            .get(&key)
        {
            return Ok(schema.clone());
        }

        let derived = Arc::new(Schema::derive::<E>()?);

        let mut cache = self.cache.write().expect("schema cache lock poisoned");
        Ok(cache.entry(key).or_insert(derived).clone())
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::fixtures::{Clan, User};
    use crate::meta::{EntityMeta, FieldSpec, FieldVtable};
    use crate::value::FieldValue;

    #[test]
    fn test_defaults_and_overrides() {
        let schema = Schema::derive::<User>().unwrap();
        assert_eq!(schema.table, "users");

        let columns: Vec<&str> = schema.fields.iter().map(|f| f.column.as_str()).collect();
        assert_eq!(columns, vec!["unique_id", "clan_tag", "note", "membership"]);

        let id = schema.field_by_logical("unique_id").unwrap();
        assert_eq!(id.sql_type, SqlType::UniqueId);
        assert_eq!(id.codec, CodecKind::UniqueId);
        assert!(id.primary);
        assert!(!id.nullable);

        let note = schema.field_by_logical("note").unwrap();
        assert!(note.nullable);

        let membership = schema.field_by_column("membership").unwrap();
        assert_eq!(membership.logical, "membership_status");
        assert_eq!(membership.sql_type, SqlType::TinyInt);
    }

    #[test]
    fn test_reference_fields_are_not_stored() {
        let schema = Schema::derive::<Clan>().unwrap();
        assert!(schema.field_by_logical("members").is_none());
        assert_eq!(schema.fields.len(), 2);
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Unnamed {
        value: i32,
    }

    impl Entity for Unnamed {
        fn meta() -> EntityMeta<Self> {
            EntityMeta::new()
        }

        fn accessors() -> &'static [FieldVtable<Self>] {
            const FIELDS: &[FieldVtable<Unnamed>] = &[FieldVtable {
                name: "value",
                kind: NativeKind::I32,
                get: |e| Ok(FieldValue::from(e.value)),
                set: |e, v| {
                    e.value = v.try_into()?;
                    Ok(())
                },
            }];
            FIELDS
        }
    }

    #[test]
    fn test_missing_table_name_is_rejected() {
        assert!(matches!(
            Schema::derive::<Unnamed>(),
            Err(Error::Configuration(_))
        ));
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Colliding {
        a: i32,
        b: i32,
    }

    impl Entity for Colliding {
        fn meta() -> EntityMeta<Self> {
            EntityMeta::table("colliding").field(FieldSpec::new("b").column("a"))
        }

        fn accessors() -> &'static [FieldVtable<Self>] {
            const FIELDS: &[FieldVtable<Colliding>] = &[
                FieldVtable {
                    name: "a",
                    kind: NativeKind::I32,
                    get: |e| Ok(FieldValue::from(e.a)),
                    set: |e, v| {
                        e.a = v.try_into()?;
                        Ok(())
                    },
                },
                FieldVtable {
                    name: "b",
                    kind: NativeKind::I32,
                    get: |e| Ok(FieldValue::from(e.b)),
                    set: |e, v| {
                        e.b = v.try_into()?;
                        Ok(())
                    },
                },
            ];
            FIELDS
        }
    }

    #[test]
    fn test_duplicate_column_is_rejected() {
        assert!(matches!(
            Schema::derive::<Colliding>(),
            Err(Error::Configuration(_))
        ));
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Cached {
        key: String,
        hits: i64,
    }

    impl Entity for Cached {
        fn meta() -> EntityMeta<Self> {
            EntityMeta::table("cached").field(FieldSpec::new("hits").transient())
        }

        fn accessors() -> &'static [FieldVtable<Self>] {
            const FIELDS: &[FieldVtable<Cached>] = &[
                FieldVtable {
                    name: "key",
                    kind: NativeKind::Text,
                    get: |e| Ok(FieldValue::from(e.key.clone())),
                    set: |e, v| {
                        e.key = v.try_into()?;
                        Ok(())
                    },
                },
                FieldVtable {
                    name: "hits",
                    kind: NativeKind::I64,
                    get: |e| Ok(FieldValue::from(e.hits)),
                    set: |e, v| {
                        e.hits = v.try_into()?;
                        Ok(())
                    },
                },
            ];
            FIELDS
        }
    }

    #[test]
    fn test_transient_fields_are_excluded() {
        let schema = Schema::derive::<Cached>().unwrap();
        assert_eq!(schema.fields.len(), 1);
        assert!(schema.field_by_logical("hits").is_none());
        assert!(schema.field_by_column("key").is_some());
    }

    #[test]
    fn test_catalog_memoizes() {
        let catalog = SchemaCatalog::new();
        let first = catalog.describe::<User>().unwrap();
        let second = catalog.describe::<User>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_concurrent_first_use_publishes_once() {
        let catalog = Arc::new(SchemaCatalog::new());

        let schemas: Vec<Arc<Schema>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let catalog = catalog.clone();
                    scope.spawn(move || catalog.describe::<User>().unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for schema in &schemas {
            assert!(Arc::ptr_eq(schema, &schemas[0]));
        }
    }
}

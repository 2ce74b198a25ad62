//! Declarative entity metadata
//!
//! A mapped type declares three things, evaluated once at registration:
//! - a table name plus optional per-field overrides (`EntityMeta`, `FieldSpec`)
//! - an accessor table reading/writing each field by name (`FieldVtable`)
//! - zero or more cross-entity reference rules (`ReferenceDef`)
//!
//! Reference fields are never stored; they are stitched in memory after a
//! multi-type fetch by matching attribute equality across the fetched sets.

use crate::types::{NativeKind, SqlType};
use crate::value::FieldValue;
use crate::{Error, Result};
use std::any::{Any, TypeId};

/// One entry of a type's accessor table: a named, typed field with
/// read and write functions.
pub struct FieldVtable<E> {
    /// Declared field identifier (logical name)
    pub name: &'static str,
    /// Native shape of the field value
    pub kind: NativeKind,
    pub get: fn(&E) -> Result<FieldValue>,
    pub set: fn(&mut E, FieldValue) -> Result<()>,
}

/// A type that can be mapped to a relational table.
///
/// Implementations declare their metadata explicitly; no runtime type
/// inspection happens at call sites.
pub trait Entity: Default + Clone + Send + 'static {
    /// Declarative metadata: table name, field overrides, reference rules
    fn meta() -> EntityMeta<Self>;

    /// The accessor table, one entry per declared field
    fn accessors() -> &'static [FieldVtable<Self>];

    /// Short type name used in error messages and logs
    fn entity_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Per-field declarative overrides. Every knob is optional; a field
/// without a spec gets full defaults from its accessor entry.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    pub(crate) name: &'static str,
    pub(crate) column: Option<&'static str>,
    pub(crate) sql_type: Option<SqlType>,
    pub(crate) nullable: bool,
    pub(crate) transient: bool,
    pub(crate) primary: bool,
}

impl FieldSpec {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            sql_type: None,
            nullable: false,
            transient: false,
            primary: false,
        }
    }

    /// Override the storage column name (default: lower-cased field name)
    pub fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Override the storage column type (default: inferred from native kind)
    pub fn sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = Some(sql_type);
        self
    }

    /// Allow NULL in the column (default: NOT NULL)
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Exclude the field from storage entirely
    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    /// Mark the field as part of the primary key, used to derive WHERE
    /// clauses for update/delete when no explicit predicates are given
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// Whether a reference field holds a single instance or a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    One,
    Many,
}

/// One equality predicate of a reference rule.
///
/// `target` is resolved against each candidate in the target set, `source`
/// against the owning instance. Either side that does not name a declared
/// field is treated as a literal constant compared by string form.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub(crate) target: &'static str,
    pub(crate) source: &'static str,
}

/// A declared cross-entity reference: which field to populate, from which
/// target type, under which conjunctive equality predicates.
pub struct ReferenceDef<E> {
    pub(crate) field: &'static str,
    pub(crate) target_id: TypeId,
    pub(crate) target_name: &'static str,
    pub(crate) cardinality: Cardinality,
    pub(crate) predicates: Vec<Predicate>,
    pub(crate) assign: Box<dyn Fn(&mut E, Vec<Box<dyn Record>>) -> Result<()> + Send + Sync>,
}

impl<E: Entity> ReferenceDef<E> {
    /// Declare a single-instance reference. The field is set to the first
    /// match, or to the apply function's zero value when nothing matches.
    pub fn one<T: Entity>(field: &'static str, apply: fn(&mut E, Option<T>)) -> Self {
        Self {
            field,
            target_id: TypeId::of::<T>(),
            target_name: T::entity_name(),
            cardinality: Cardinality::One,
            predicates: Vec::new(),
            assign: Box::new(move |owner, found| {
                let first = found
                    .into_iter()
                    .next()
                    .map(downcast_record::<T>)
                    .transpose()?;
                apply(owner, first);
                Ok(())
            }),
        }
    }

    /// Declare a list reference. The field is set to every match, in
    /// target-set order; an empty list when nothing matches.
    pub fn many<T: Entity>(field: &'static str, apply: fn(&mut E, Vec<T>)) -> Self {
        Self {
            field,
            target_id: TypeId::of::<T>(),
            target_name: T::entity_name(),
            cardinality: Cardinality::Many,
            predicates: Vec::new(),
            assign: Box::new(move |owner, found| {
                let items = found
                    .into_iter()
                    .map(downcast_record::<T>)
                    .collect::<Result<Vec<T>>>()?;
                apply(owner, items);
                Ok(())
            }),
        }
    }

    /// Add an equality predicate: candidate `target_attr` must equal the
    /// owner's `source_attr`. Predicates combine with AND, in declaration
    /// order. Either attribute may be a literal constant.
    pub fn matching(mut self, target_attr: &'static str, source_attr: &'static str) -> Self {
        self.predicates.push(Predicate {
            target: target_attr,
            source: source_attr,
        });
        self
    }

    pub fn field(&self) -> &'static str {
        self.field
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }
}

fn downcast_record<T: Entity>(record: Box<dyn Record>) -> Result<T> {
    record
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| {
            Error::Resolution(format!(
                "fetched set holds a record that is not a {}",
                T::entity_name()
            ))
        })
}

/// Declarative metadata for one mapped type.
pub struct EntityMeta<E> {
    pub(crate) table: Option<&'static str>,
    pub(crate) fields: Vec<FieldSpec>,
    pub(crate) references: Vec<ReferenceDef<E>>,
}

impl<E: Entity> EntityMeta<E> {
    /// Metadata with no table declaration; schema derivation will reject it
    pub fn new() -> Self {
        Self {
            table: None,
            fields: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Metadata for the given table name (required for storage)
    pub fn table(table: &'static str) -> Self {
        Self {
            table: Some(table),
            fields: Vec::new(),
            references: Vec::new(),
        }
    }

    /// Attach per-field overrides
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    /// Attach a reference rule
    pub fn reference(mut self, def: ReferenceDef<E>) -> Self {
        self.references.push(def);
        self
    }

    pub(crate) fn spec_for(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|s| s.name == name)
    }
}

impl<E: Entity> Default for EntityMeta<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Object-safe view of a fetched instance, used by the reference resolver
/// to read attributes and move instances across type boundaries.
pub trait Record: Any + Send {
    /// Short type name of the underlying entity
    fn entity(&self) -> &'static str;

    /// Read a field by its logical name
    fn field(&self, logical: &str) -> Result<FieldValue>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn clone_record(&self) -> Box<dyn Record>;
}

impl<E: Entity> Record for E {
    fn entity(&self) -> &'static str {
        E::entity_name()
    }

    fn field(&self, logical: &str) -> Result<FieldValue> {
        for entry in E::accessors() {
            if entry.name == logical {
                return (entry.get)(self);
            }
        }
        Err(Error::Configuration(format!(
            "{} has no field named {}",
            E::entity_name(),
            logical
        )))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn clone_record(&self) -> Box<dyn Record> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Shared test entities modeled on a small clan/user domain.

    use super::*;
    use uuid::Uuid;

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct User {
        pub unique_id: Uuid,
        pub clan_tag: String,
        pub note: Option<String>,
        pub membership_status: i32,
        pub clan: Option<Clan>,
    }

    impl Entity for User {
        fn meta() -> EntityMeta<Self> {
            EntityMeta::table("users")
                .field(FieldSpec::new("unique_id").primary())
                .field(FieldSpec::new("note").nullable())
                .field(
                    FieldSpec::new("membership_status")
                        .column("membership")
                        .sql_type(SqlType::TinyInt),
                )
                .reference(
                    ReferenceDef::one("clan", |u: &mut User, c: Option<Clan>| u.clan = c)
                        .matching("tag", "clan_tag"),
                )
        }

        fn accessors() -> &'static [FieldVtable<Self>] {
            const FIELDS: &[FieldVtable<User>] = &[
                FieldVtable {
                    name: "unique_id",
                    kind: NativeKind::Uuid,
                    get: |u| Ok(FieldValue::from(u.unique_id)),
                    set: |u, v| {
                        u.unique_id = v.try_into()?;
                        Ok(())
                    },
                },
                FieldVtable {
                    name: "clan_tag",
                    kind: NativeKind::Text,
                    get: |u| Ok(FieldValue::from(u.clan_tag.clone())),
                    set: |u, v| {
                        u.clan_tag = v.try_into()?;
                        Ok(())
                    },
                },
                FieldVtable {
                    name: "note",
                    kind: NativeKind::Text,
                    get: |u| Ok(FieldValue::from(u.note.clone())),
                    set: |u, v| {
                        u.note = v.try_into()?;
                        Ok(())
                    },
                },
                FieldVtable {
                    name: "membership_status",
                    kind: NativeKind::I32,
                    get: |u| Ok(FieldValue::from(u.membership_status)),
                    set: |u, v| {
                        u.membership_status = v.try_into()?;
                        Ok(())
                    },
                },
            ];
            FIELDS
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Clan {
        pub tag: String,
        pub name: String,
        pub members: Vec<User>,
    }

    impl Entity for Clan {
        fn meta() -> EntityMeta<Self> {
            EntityMeta::table("clans")
                .field(FieldSpec::new("tag").primary())
                .reference(
                    ReferenceDef::many("members", |c: &mut Clan, m: Vec<User>| c.members = m)
                        .matching("clan_tag", "tag")
                        .matching("membership", "4"),
                )
        }

        fn accessors() -> &'static [FieldVtable<Self>] {
            const FIELDS: &[FieldVtable<Clan>] = &[
                FieldVtable {
                    name: "tag",
                    kind: NativeKind::Text,
                    get: |c| Ok(FieldValue::from(c.tag.clone())),
                    set: |c, v| {
                        c.tag = v.try_into()?;
                        Ok(())
                    },
                },
                FieldVtable {
                    name: "name",
                    kind: NativeKind::Text,
                    get: |c| Ok(FieldValue::from(c.name.clone())),
                    set: |c, v| {
                        c.name = v.try_into()?;
                        Ok(())
                    },
                },
            ];
            FIELDS
        }
    }
}

//! In-memory reference resolution
//!
//! After a multi-type fetch, declared reference rules are resolved by
//! joining the already-fetched sets on attribute equality. No I/O happens
//! here; the resolver only mutates reference fields on instances the
//! caller already owns.
//!
//! Matching is conjunctive: a candidate joins a reference iff every
//! predicate of the rule holds. Resolution is two-phase - matches for a
//! type are computed against the pre-resolution state of every set, then
//! applied - so self-referencing types resolve deterministically.

use crate::connection::SqlConnection;
use crate::meta::{Entity, Predicate, Record};
use crate::schema::Schema;
use crate::value::FieldValue;
use crate::{Error, Result};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// The in-memory result of one type's SELECT, used as join input.
pub struct FetchedSet {
    pub(crate) type_id: TypeId,
    pub(crate) entity: &'static str,
    pub(crate) schema: Arc<Schema>,
    pub(crate) records: Vec<Box<dyn Record>>,
}

impl FetchedSet {
    pub(crate) fn from_instances<E: Entity>(schema: Arc<Schema>, instances: Vec<E>) -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            entity: E::entity_name(),
            schema,
            records: instances
                .into_iter()
                .map(|e| Box::new(e) as Box<dyn Record>)
                .collect(),
        }
    }

    pub fn entity(&self) -> &'static str {
        self.entity
    }

    pub fn table(&self) -> &str {
        &self.schema.table
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Declares which types one load call fetches and resolves together.
///
/// Every type participating in a reference must be included; resolving a
/// reference whose target was not fetched fails rather than silently
/// yielding nothing.
pub struct GraphQuery {
    pub(crate) loaders: Vec<TypeLoader>,
}

pub(crate) struct TypeLoader {
    pub(crate) type_id: TypeId,
    pub(crate) fetch: fn(&SqlConnection) -> Result<FetchedSet>,
    pub(crate) resolve: fn(&mut ObjectGraph) -> Result<()>,
}

impl GraphQuery {
    pub fn new() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Include a type in the fetch. Inclusion order is fetch and
    /// resolution order.
    pub fn include<E: Entity>(mut self) -> Self {
        let type_id = TypeId::of::<E>();
        if !self.loaders.iter().any(|l| l.type_id == type_id) {
            self.loaders.push(TypeLoader {
                type_id,
                fetch: fetch_set::<E>,
                resolve: resolve_type::<E>,
            });
        }
        self
    }
}

impl Default for GraphQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// The stitched result of a multi-type load: one fetched set per type,
/// with reference fields populated.
pub struct ObjectGraph {
    sets: Vec<FetchedSet>,
    by_type: HashMap<TypeId, usize>,
}

impl ObjectGraph {
    pub(crate) fn new() -> Self {
        Self {
            sets: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    pub(crate) fn push(&mut self, set: FetchedSet) {
        match self.by_type.get(&set.type_id) {
            Some(&index) => self.sets[index] = set,
            None => {
                self.by_type.insert(set.type_id, self.sets.len());
                self.sets.push(set);
            }
        }
    }

    fn index_of(&self, type_id: TypeId) -> Option<usize> {
        self.by_type.get(&type_id).copied()
    }

    /// The fetched set for a type, if it was part of the load.
    pub fn set<E: Entity>(&self) -> Option<&FetchedSet> {
        self.index_of(TypeId::of::<E>()).map(|i| &self.sets[i])
    }

    /// Borrow every fetched instance of a type, in fetch order.
    pub fn records<E: Entity>(&self) -> Result<Vec<&E>> {
        let set = self.set::<E>().ok_or_else(|| not_loaded::<E>())?;
        set.records
            .iter()
            .map(|r| {
                r.as_any().downcast_ref::<E>().ok_or_else(|| {
                    Error::Resolution(format!(
                        "fetched set for {} holds a foreign record",
                        E::entity_name()
                    ))
                })
            })
            .collect()
    }

    /// Move every fetched instance of a type out of the graph.
    pub fn take<E: Entity>(&mut self) -> Result<Vec<E>> {
        let index = self
            .index_of(TypeId::of::<E>())
            .ok_or_else(|| not_loaded::<E>())?;
        let records = std::mem::take(&mut self.sets[index].records);
        records
            .into_iter()
            .map(|r| {
                r.into_any().downcast::<E>().map(|b| *b).map_err(|_| {
                    Error::Resolution(format!(
                        "fetched set for {} holds a foreign record",
                        E::entity_name()
                    ))
                })
            })
            .collect()
    }
}

fn not_loaded<E: Entity>() -> Error {
    Error::Resolution(format!(
        "referenced type {} was not loaded in the same call",
        E::entity_name()
    ))
}

pub(crate) fn fetch_set<E: Entity>(conn: &SqlConnection) -> Result<FetchedSet> {
    let schema = conn.schema::<E>()?;
    let instances = conn.select::<E>(&[])?;
    Ok(FetchedSet::from_instances::<E>(schema, instances))
}

/// Resolve every declared reference of type `E` against the graph.
pub(crate) fn resolve_type<E: Entity>(graph: &mut ObjectGraph) -> Result<()> {
    let meta = E::meta();
    if meta.references.is_empty() {
        return Ok(());
    }

    let Some(source_index) = graph.index_of(TypeId::of::<E>()) else {
        return Ok(());
    };

    // Compute phase: match against the pre-resolution state of every set.
    let mut pending: Vec<(usize, usize, Vec<Box<dyn Record>>)> = Vec::new();
    {
        let source_set = &graph.sets[source_index];
        for (rule_index, rule) in meta.references.iter().enumerate() {
            let target_set = graph
                .index_of(rule.target_id)
                .map(|i| &graph.sets[i])
                .ok_or_else(|| {
                    Error::Resolution(format!(
                        "referenced type {} was not loaded in the same call",
                        rule.target_name
                    ))
                })?;

            for (record_index, source) in source_set.records.iter().enumerate() {
                let matches = matching_records(
                    source.as_ref(),
                    &source_set.schema,
                    target_set,
                    &rule.predicates,
                )?;
                pending.push((record_index, rule_index, matches));
            }

            debug!(
                entity = E::entity_name(),
                field = rule.field(),
                target = rule.target_name,
                "resolved reference"
            );
        }
    }

    // Apply phase: the only mutation, confined to the source set.
    for (record_index, rule_index, matches) in pending {
        let rule = &meta.references[rule_index];
        let owner = graph.sets[source_index].records[record_index]
            .as_any_mut()
            .downcast_mut::<E>()
            .ok_or_else(|| {
                Error::Resolution(format!(
                    "fetched set for {} holds a foreign record",
                    E::entity_name()
                ))
            })?;
        (rule.assign)(owner, matches)?;
    }

    Ok(())
}

/// All candidates of the target set matching every predicate, in target
/// set order.
fn matching_records(
    source: &dyn Record,
    source_schema: &Schema,
    target_set: &FetchedSet,
    predicates: &[Predicate],
) -> Result<Vec<Box<dyn Record>>> {
    let mut matches = Vec::new();

    'candidates: for candidate in &target_set.records {
        for predicate in predicates {
            let source_term = resolve_term(predicate.source, source, source_schema)?;
            let target_term =
                resolve_term(predicate.target, candidate.as_ref(), &target_set.schema)?;
            if !terms_equal(&source_term, &target_term) {
                continue 'candidates;
            }
        }
        matches.push(candidate.clone_record());
    }

    Ok(matches)
}

/// An attribute resolved against one instance: a field value when the
/// name is declared, a literal constant otherwise.
enum Term {
    Field(FieldValue),
    Literal(&'static str),
}

fn resolve_term(attr: &'static str, record: &dyn Record, schema: &Schema) -> Result<Term> {
    if let Some(descriptor) = schema.field_by_logical(attr) {
        return Ok(Term::Field(record.field(descriptor.logical)?));
    }
    if let Some(descriptor) = schema.field_by_column(attr) {
        return Ok(Term::Field(record.field(descriptor.logical)?));
    }
    Ok(Term::Literal(attr))
}

/// Field-to-field terms compare by value, literal terms by canonical
/// string form. A null field never matches anything.
fn terms_equal(a: &Term, b: &Term) -> bool {
    match (a, b) {
        (Term::Field(x), Term::Field(y)) => !x.is_null() && !y.is_null() && x == y,
        (Term::Field(x), Term::Literal(l)) | (Term::Literal(l), Term::Field(x)) => {
            !x.is_null() && x.to_string() == *l
        }
        (Term::Literal(x), Term::Literal(y)) => x == y,
    }
}

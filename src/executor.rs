//! Statement execution
//!
//! `Statement` binds codec-converted arguments to generated SQL, executes
//! once, and for reads maps each result row back into a new instance by
//! matching reported column names to their field descriptors. Failures are
//! fatal to the operation and never retried; a row that cannot be fully
//! decoded fails the whole select.

use crate::access::FieldAccessor;
use crate::meta::Entity;
use crate::schema::Schema;
use crate::value::FieldValue;
use crate::{Error, Result, codec, query};
use rusqlite::Connection;
use rusqlite::params_from_iter;
use rusqlite::types::Value as Scalar;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// One WHERE predicate: a storage column compared for equality against a
/// native value.
#[derive(Debug, Clone)]
pub struct Where {
    pub column: String,
    pub value: FieldValue,
}

impl Where {
    pub fn new(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Executes the mapped operations for one type over one borrowed handle.
pub struct Statement<'a, E: Entity> {
    conn: &'a Connection,
    schema: Arc<Schema>,
    accessor: &'a FieldAccessor,
    _entity: PhantomData<E>,
}

impl<'a, E: Entity> Statement<'a, E> {
    pub(crate) fn new(conn: &'a Connection, schema: Arc<Schema>, accessor: &'a FieldAccessor) -> Self {
        Self {
            conn,
            schema,
            accessor,
            _entity: PhantomData,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create the backing table if it does not exist yet.
    pub fn create_table(&self) -> Result<()> {
        let sql = query::create_table(&self.schema.table, &self.schema.fields)?;
        debug!(table = %self.schema.table, %sql, "create table");
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    /// Insert one instance, binding every field in schema order.
    pub fn insert(&self, instance: &E) -> Result<()> {
        let sql = query::insert(&self.schema.table, self.schema.fields.len())?;
        let args = self.field_arguments(instance)?;
        debug!(table = %self.schema.table, %sql, "insert");
        self.conn.execute(&sql, params_from_iter(args))?;
        Ok(())
    }

    /// Select all rows matching the given predicates (all rows when none
    /// are given), mapping each into a new instance.
    pub fn select(&self, wheres: &[Where]) -> Result<Vec<E>> {
        let columns: Vec<&str> = wheres.iter().map(|w| w.column.as_str()).collect();
        let sql = query::select(&self.schema.table, &columns)?;
        let args = self.where_arguments(wheres)?;
        debug!(table = %self.schema.table, %sql, "select");

        let mut stmt = self.conn.prepare(&sql)?;
        let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();

        let mut rows = stmt.query(params_from_iter(args))?;
        let mut selected = Vec::new();
        while let Some(row) = rows.next()? {
            let mut instance = E::default();
            for (i, name) in names.iter().enumerate() {
                let descriptor = self.schema.field_by_column(name).ok_or_else(|| {
                    Error::Decode(format!(
                        "table {} returned undeclared column {}",
                        self.schema.table, name
                    ))
                })?;
                let scalar: Scalar = row.get(i)?;
                let value = codec::decode(scalar, descriptor)?;
                trace!(column = %name, ?value, "decoded column");
                self.accessor.set(&mut instance, descriptor.logical, value)?;
            }
            selected.push(instance);
        }
        Ok(selected)
    }

    /// Update all fields of the matching rows. With no explicit predicates
    /// the WHERE clause is derived from the instance's primary key fields.
    pub fn update(&self, instance: &E, wheres: &[Where]) -> Result<()> {
        let wheres = self.effective_wheres(instance, wheres)?;
        let columns: Vec<&str> = wheres.iter().map(|w| w.column.as_str()).collect();
        let sql = query::update(&self.schema.table, &self.schema.fields, &columns)?;

        let mut args = self.field_arguments(instance)?;
        args.extend(self.where_arguments(&wheres)?);
        debug!(table = %self.schema.table, %sql, "update");
        self.conn.execute(&sql, params_from_iter(args))?;
        Ok(())
    }

    /// Delete the matching rows. With no explicit predicates the WHERE
    /// clause is derived from the instance's primary key fields.
    pub fn delete(&self, instance: &E, wheres: &[Where]) -> Result<()> {
        let wheres = self.effective_wheres(instance, wheres)?;
        let columns: Vec<&str> = wheres.iter().map(|w| w.column.as_str()).collect();
        let sql = query::delete(&self.schema.table, &columns)?;

        let args = self.where_arguments(&wheres)?;
        debug!(table = %self.schema.table, %sql, "delete");
        self.conn.execute(&sql, params_from_iter(args))?;
        Ok(())
    }

    /// Drop the backing table.
    pub fn drop_table(&self) -> Result<()> {
        let sql = query::drop(&self.schema.table)?;
        debug!(table = %self.schema.table, %sql, "drop table");
        self.conn.execute(&sql, [])?;
        Ok(())
    }

    /// Encode every schema field of the instance, in declared order.
    fn field_arguments(&self, instance: &E) -> Result<Vec<Scalar>> {
        self.schema
            .fields
            .iter()
            .map(|descriptor| {
                let value = self.accessor.get(instance, descriptor.logical)?;
                codec::encode(&value, descriptor)
            })
            .collect()
    }

    /// Encode WHERE values with the matching descriptor's codec when the
    /// column is declared, plain passthrough otherwise.
    fn where_arguments(&self, wheres: &[Where]) -> Result<Vec<Scalar>> {
        wheres
            .iter()
            .map(|w| match self.schema.field_by_column(&w.column) {
                Some(descriptor) => codec::encode(&w.value, descriptor),
                None => codec::encode_plain(&w.value),
            })
            .collect()
    }

    /// Explicit predicates when given, otherwise predicates derived from
    /// the primary key fields on the instance's current values. An empty
    /// derivation is rejected before any execution.
    fn effective_wheres(&self, instance: &E, explicit: &[Where]) -> Result<Vec<Where>> {
        if !explicit.is_empty() {
            return Ok(explicit.to_vec());
        }

        let mut derived = Vec::new();
        for descriptor in self.schema.primary_fields() {
            let value = self.accessor.get(instance, descriptor.logical)?;
            derived.push(Where {
                column: descriptor.column.clone(),
                value,
            });
        }

        if derived.is_empty() {
            return Err(Error::Configuration(format!(
                "{} declares no primary key fields and no predicates were given, refusing an empty WHERE clause",
                E::entity_name()
            )));
        }
        Ok(derived)
    }
}

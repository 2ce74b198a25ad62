//! Borrowed connection surface
//!
//! `SqlConnection` wraps one handle lent by the driver's source and exposes
//! the typed mapping operations. A connection is single-owner: operations
//! go through `&self` but the handle itself is never shared; concurrent
//! work uses independently borrowed connections.

use crate::access::FieldAccessor;
use crate::driver::DriverCore;
use crate::executor::{Statement, Where};
use crate::meta::Entity;
use crate::resolver::{GraphQuery, ObjectGraph};
use crate::schema::Schema;
use crate::Result;
use rusqlite::Connection;
use std::sync::Arc;

/// One borrowed database handle with the typed operation surface.
pub struct SqlConnection {
    conn: Connection,
    core: Arc<DriverCore>,
}

impl SqlConnection {
    pub(crate) fn new(conn: Connection, core: Arc<DriverCore>) -> Self {
        Self { conn, core }
    }

    fn statement<E: Entity>(&self) -> Result<Statement<'_, E>> {
        let schema = self.core.catalog.describe::<E>()?;
        Ok(Statement::new(&self.conn, schema, &self.core.accessor))
    }

    /// The derived schema for a type, from the shared catalog.
    pub fn schema<E: Entity>(&self) -> Result<Arc<Schema>> {
        self.core.catalog.describe::<E>()
    }

    /// Create the backing table for a type if it does not exist yet.
    pub fn create_table<E: Entity>(&self) -> Result<()> {
        self.statement::<E>()?.create_table()
    }

    /// Insert one instance.
    pub fn insert<E: Entity>(&self, instance: &E) -> Result<()> {
        self.statement::<E>()?.insert(instance)
    }

    /// Select instances matching the predicates; all instances when the
    /// predicate list is empty.
    pub fn select<E: Entity>(&self, wheres: &[Where]) -> Result<Vec<E>> {
        self.statement::<E>()?.select(wheres)
    }

    /// Update all fields of the matching rows; predicates derived from
    /// primary key fields when none are given.
    pub fn update<E: Entity>(&self, instance: &E, wheres: &[Where]) -> Result<()> {
        self.statement::<E>()?.update(instance, wheres)
    }

    /// Delete the matching rows; predicates derived from primary key
    /// fields when none are given.
    pub fn delete<E: Entity>(&self, instance: &E, wheres: &[Where]) -> Result<()> {
        self.statement::<E>()?.delete(instance, wheres)
    }

    /// Drop the backing table for a type.
    pub fn drop_table<E: Entity>(&self) -> Result<()> {
        self.statement::<E>()?.drop_table()
    }

    /// Fetch every included type, then resolve all declared references
    /// across the fetched sets.
    ///
    /// Every type participating in a reference must be included in the
    /// same call; a missing target fails resolution instead of silently
    /// leaving fields empty.
    pub fn load_graph(&self, query: GraphQuery) -> Result<ObjectGraph> {
        let mut graph = ObjectGraph::new();
        for loader in &query.loaders {
            graph.push((loader.fetch)(self)?);
        }
        for loader in &query.loaders {
            (loader.resolve)(&mut graph)?;
        }
        Ok(graph)
    }

    /// Access to the raw handle for scenarios the mapped surface does not
    /// cover. Generally try to avoid using it.
    pub fn raw(&self) -> &Connection {
        &self.conn
    }

    /// The field accessor shared by every connection of this driver.
    pub fn accessor(&self) -> &FieldAccessor {
        &self.core.accessor
    }

    /// Return the handle to the driver's source for reuse. Dropping the
    /// connection instead closes the underlying handle outright.
    pub fn close(self) {
        let Self { conn, core } = self;
        core.source.restore(conn);
    }
}

//! Driver entry point
//!
//! `SqlDriver` owns everything shared across connections: the schema
//! catalog, the field accessor and the connection source. Registering a
//! type up front derives and caches its schema so first use inside a hot
//! path pays nothing.

use crate::access::{AccessMode, FieldAccessor};
use crate::config::DriverConfig;
use crate::connection::SqlConnection;
use crate::meta::Entity;
use crate::schema::SchemaCatalog;
use crate::source::Source;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) struct DriverCore {
    pub(crate) catalog: SchemaCatalog,
    pub(crate) accessor: FieldAccessor,
    pub(crate) source: Source,
}

/// The main entry of the mapping layer; combines catalog, accessor and
/// connection source behind borrow/close.
pub struct SqlDriver {
    core: Arc<DriverCore>,
}

impl SqlDriver {
    /// Open a driver for the configured target.
    pub fn open(config: DriverConfig) -> Result<Self> {
        let busy_timeout = config.busy_timeout_ms.map(Duration::from_millis);
        let source = match &config.database {
            Some(path) => Source::file(path, busy_timeout),
            None => Source::memory(),
        };

        let mode = if config.indexed_access {
            AccessMode::Indexed
        } else {
            AccessMode::Scan
        };

        info!(
            database = config.database.as_deref().unwrap_or(":memory:"),
            ?mode,
            "opened driver"
        );

        Ok(Self {
            core: Arc::new(DriverCore {
                catalog: SchemaCatalog::new(),
                accessor: FieldAccessor::new(mode),
                source,
            }),
        })
    }

    /// Driver over a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::open(DriverConfig::in_memory())
    }

    /// Driver over a database file.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(DriverConfig::file(path))
    }

    /// Register a type: derive and cache its schema, validate its
    /// metadata, and warm the accessor index.
    pub fn register<E: Entity>(&self) -> Result<()> {
        let schema = self.core.catalog.describe::<E>()?;
        self.core.accessor.register::<E>();
        info!(
            entity = E::entity_name(),
            table = %schema.table,
            "registered entity"
        );
        Ok(())
    }

    /// Switch to the indexed field-access strategy.
    ///
    /// Strategy selection is configuration-time only: the switch is
    /// refused once any connection has been borrowed.
    pub fn use_indexed_access(&mut self) -> Result<()> {
        match Arc::get_mut(&mut self.core) {
            Some(core) => {
                core.accessor = FieldAccessor::new(AccessMode::Indexed);
                Ok(())
            }
            None => Err(Error::Configuration(
                "cannot switch field access strategy while connections are borrowed".to_string(),
            )),
        }
    }

    /// Borrow a connection from the source. Close it after use to return
    /// the handle for reuse.
    pub fn borrow(&self) -> Result<SqlConnection> {
        let conn = self.core.source.borrow()?;
        Ok(SqlConnection::new(conn, self.core.clone()))
    }

    /// Drop every idle handle held by the source.
    pub fn close(&self) {
        self.core.source.close();
        info!("closed driver source");
    }
}

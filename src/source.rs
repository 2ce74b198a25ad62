//! Connection lending
//!
//! `Source` abstracts where handles come from: a database file or an
//! in-memory database. Borrowed handles are created on demand; handles
//! returned through `restore` are lent out again before any new handle is
//! opened, which keeps an in-memory database alive across borrow/close
//! cycles on the same source.

use crate::Result;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

enum Target {
    File(PathBuf),
    Memory,
}

/// Lends database handles for one configured target.
pub struct Source {
    target: Target,
    busy_timeout: Option<Duration>,
    idle: Mutex<Vec<Connection>>,
}

impl Source {
    pub fn file(path: impl Into<PathBuf>, busy_timeout: Option<Duration>) -> Self {
        Self {
            target: Target::File(path.into()),
            busy_timeout,
            idle: Mutex::new(Vec::new()),
        }
    }

    pub fn memory() -> Self {
        Self {
            target: Target::Memory,
            busy_timeout: None,
            idle: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a handle, reusing a restored one when available.
    pub fn borrow(&self) -> Result<Connection> {
        if let Some(conn) = self.idle.lock().expect("source lock poisoned").pop() {
            return Ok(conn);
        }

        let conn = match &self.target {
            Target::File(path) => Connection::open(path)?,
            Target::Memory => Connection::open_in_memory()?,
        };
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        Ok(conn)
    }

    /// Take a handle back for later reuse.
    pub fn restore(&self, conn: Connection) {
        self.idle.lock().expect("source lock poisoned").push(conn);
    }

    /// Drop every idle handle. Outstanding borrowed handles are closed by
    /// their owners.
    pub fn close(&self) {
        self.idle.lock().expect("source lock poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_database_survives_restore() {
        let source = Source::memory();

        let conn = source.borrow().unwrap();
        conn.execute("CREATE TABLE t (x INT NOT NULL)", []).unwrap();
        conn.execute("INSERT INTO t VALUES (7)", []).unwrap();
        source.restore(conn);

        let conn = source.borrow().unwrap();
        let x: i64 = conn
            .query_row("SELECT x FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(x, 7);
    }

    #[test]
    fn test_file_database_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lend.db");
        let source = Source::file(&path, None);

        let conn = source.borrow().unwrap();
        conn.execute("CREATE TABLE t (x INT NOT NULL)", []).unwrap();
        drop(conn);

        // A dropped handle was not restored; the next borrow reopens.
        let conn = source.borrow().unwrap();
        conn.execute("INSERT INTO t VALUES (1)", []).unwrap();
    }
}

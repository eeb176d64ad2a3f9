mod datastore;

pub use datastore::Datastore;

use parking_lot::ReentrantMutex;
use std::path::{Path, PathBuf};

use anyhow::Result;
use rusqlite::Connection;

#[derive(Debug)]
pub struct Store {
    conn: ReentrantMutex<Connection>,
    db_path: PathBuf,
}

impl Store {
    const TABLE_DATASTORE: &'static str = "datastore";

    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = match Connection::open(&path) {
            Ok(conn) => conn,
            Err(e) => {
                tracing::error!(
                    "Open db `{:?}` error: {}. Delete and reinitialize db",
                    &path,
                    e
                );
                std::fs::remove_file(&path)?;
                Connection::open(&path)?
            }
        };
        let store = Store {
            db_path: path,
            conn: ReentrantMutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Store {
            db_path: PathBuf::new(),
            conn: ReentrantMutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn init_tables(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );
            "#,
            table = Self::TABLE_DATASTORE,
        ))?;
        Ok(())
    }
}

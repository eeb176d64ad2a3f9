use anyhow::Result;

use crate::Store;

/// Byte-oriented key/value persistence.
pub trait Datastore: Send + Sync {
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn has(&self, key: &str) -> Result<bool>;
    fn delete(&self, key: &str) -> Result<()>;
    /// All entries whose key starts with `prefix`, ordered by key.
    fn query_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;
}

// region: key value
impl Datastore for Store {
    fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            r#"INSERT OR REPLACE INTO {} (key, value) VALUES (?, ?)"#,
            Self::TABLE_DATASTORE
        ))?;
        let affected = stmt.execute((key, value))?;
        debug_assert_eq!(affected, 1);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            r#"SELECT value FROM {} WHERE key = ?"#,
            Self::TABLE_DATASTORE
        ))?;
        match stmt.query_row((key,), |row| row.get::<_, Vec<u8>>("value")) {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn has(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            r#"SELECT 1 FROM {} WHERE key = ?"#,
            Self::TABLE_DATASTORE
        ))?;
        Ok(stmt.exists((key,))?)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            r#"DELETE FROM {} WHERE key = ?"#,
            Self::TABLE_DATASTORE
        ))?;
        let _affected = stmt.execute((key,))?;
        Ok(())
    }

    fn query_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            r#"SELECT key, value FROM {} WHERE substr(key, 1, ?) = ? ORDER BY key"#,
            Self::TABLE_DATASTORE
        ))?;
        let rows = stmt.query_map((prefix.len() as i64, prefix), |row| {
            Ok((row.get::<_, String>("key")?, row.get::<_, Vec<u8>>("value")?))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
// endregion: key value

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_has() -> Result<()> {
        let store = Store::new_in_memory()?;
        assert!(!store.has("/a")?);
        assert_eq!(store.get("/a")?, None);
        store.put("/a", b"hello")?;
        assert!(store.has("/a")?);
        assert_eq!(store.get("/a")?, Some(b"hello".to_vec()));
        store.put("/a", b"world")?;
        assert_eq!(store.get("/a")?, Some(b"world".to_vec()));
        store.delete("/a")?;
        assert!(!store.has("/a")?);
        Ok(())
    }

    #[test]
    fn test_query_prefix() -> Result<()> {
        let store = Store::new_in_memory()?;
        store.put("/dht/record/b", b"2")?;
        store.put("/dht/record/a", b"1")?;
        store.put("/dht/recorder", b"x")?;
        store.put("/other/a", b"3")?;
        let entries = store.query_prefix("/dht/record/")?;
        assert_eq!(
            entries,
            vec![
                ("/dht/record/a".to_string(), b"1".to_vec()),
                ("/dht/record/b".to_string(), b"2".to_vec()),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_persists_across_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("namesys.sqlite");
        {
            let store = Store::new(&path)?;
            store.put("/k", b"v")?;
        }
        let store = Store::new(&path)?;
        assert_eq!(store.get("/k")?, Some(b"v".to_vec()));
        Ok(())
    }
}

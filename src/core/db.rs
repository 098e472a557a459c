use anyhow::{Error, Result};
use std::path::Path;
use tokio_rusqlite::Connection;

pub const DB_FILE_NAME: &str = "parley.db";

/// Opens (creating if needed) the database in the `storage_path`
/// directory.
pub async fn async_db(storage_path: &str) -> Result<Connection, Error> {
    let path = Path::new(storage_path).join(DB_FILE_NAME);
    let db = Connection::open(path).await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

pub fn initialize_db(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS kv (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL
        );
        "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn it_creates_the_kv_table() {
        let dir = tempfile::tempdir().unwrap();
        let db = async_db(dir.path().to_str().unwrap()).await.unwrap();

        let count: i64 = db
            .call(|conn| {
                let count = conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'kv'",
                    [],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
        assert!(dir.path().join(DB_FILE_NAME).exists());
    }

    #[test]
    fn it_initializes_idempotently() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        initialize_db(&conn).unwrap();
        initialize_db(&conn).unwrap();
    }
}

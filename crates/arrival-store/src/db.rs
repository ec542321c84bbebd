use rusqlite::Connection;

use crate::error::Result;

/// Initialise the workflow schema in `conn`.
///
/// Creates the `workflow_kv` table (idempotent). Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS workflow_kv (
            key         TEXT    NOT NULL PRIMARY KEY,
            value       TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL    -- ISO-8601
        ) STRICT;
        ",
    )?;
    Ok(())
}

use diesel::connection::SimpleConnection;
use diesel::prelude::*;

use crate::error::Result;

/// The connection type every registry operation runs on.
pub type DbConnection = SqliteConnection;

/// Opens the database at `url`, a file path or `:memory:`.
pub fn establish_connection(url: &str) -> Result<DbConnection> {
    let mut conn = SqliteConnection::establish(url)?;
    // SQLite leaves foreign keys unchecked unless asked per connection
    conn.batch_execute("PRAGMA foreign_keys = ON")?;
    debug!("Connected to database at {}", url);
    Ok(conn)
}

/// Opens the database at `url` for reading only. Writes fail with a storage error.
pub fn establish_read_only(url: &str) -> Result<DbConnection> {
    let mut conn = establish_connection(url)?;
    conn.batch_execute("PRAGMA query_only = ON")?;
    Ok(conn)
}

/// Creates the registry tables if they do not exist yet.
pub fn initialize(conn: &mut DbConnection) -> Result<()> {
    let init_sql = include_str!("../db/schema.sql");
    conn.batch_execute(init_sql)?;
    Ok(())
}

use crate::DbPool;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

const ENABLE_FOREIGN_KEYS: &str = "PRAGMA foreign_keys = ON;";

/// Opens a pool over the database file. Every connection enforces foreign keys.
pub fn file_pool(db_path: &Path) -> Result<DbPool, SetupError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch(ENABLE_FOREIGN_KEYS));
    Ok(Pool::builder().build(manager)?)
}

/// A single-connection pool over a private in-memory database, schema included.
///
/// Capped at one connection because every in-memory connection is its own database.
pub fn memory_pool() -> Result<DbPool, SetupError> {
    let manager = SqliteConnectionManager::memory()
        .with_init(|conn| conn.execute_batch(ENABLE_FOREIGN_KEYS));
    let pool = Pool::builder()
        .max_size(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .build(manager)?;
    {
        let mut conn = pool.get()?;
        setup_database(&mut conn)?;
    }
    Ok(pool)
}

pub fn setup_database(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    log::info!("Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            joined_at TEXT NOT NULL
        )",
        [],
    )?;

    log::info!("Creating 'post_groups' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS post_groups (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    log::info!("Creating 'posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            pub_date TEXT NOT NULL,
            author_id INTEGER NOT NULL,
            group_id INTEGER,
            image TEXT,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (group_id) REFERENCES post_groups(id) ON DELETE SET NULL
        )",
        [],
    )?;

    tx.execute("CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts (pub_date DESC, id DESC)", [])?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_posts_author ON posts (author_id)", [])?;
    tx.execute("CREATE INDEX IF NOT EXISTS idx_posts_group ON posts (group_id)", [])?;

    tx.commit()?;
    Ok(())
}

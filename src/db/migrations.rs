//! Database schema migrations
//!
//! Versioned migrations tracked in a schema_migrations table. Each pending
//! migration runs inside its own transaction.

use crate::core::error::{ApiError, Result};
use rusqlite::Connection;
use tracing::info;

/// Migration version tracking table
const MIGRATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

/// Initial schema migration (version 1)
const MIGRATION_V1: &str = r#"
-- Users table (authentication)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Books table
CREATE TABLE IF NOT EXISTS books (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    year INTEGER NOT NULL,
    genre TEXT NOT NULL,
    image_url TEXT NOT NULL,
    average_rating REAL NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
);

-- Ratings table: one grade per user per book
CREATE TABLE IF NOT EXISTS ratings (
    book_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    grade REAL NOT NULL CHECK (grade >= 0 AND grade <= 5),
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY (book_id, user_id),
    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_books_average_rating ON books(average_rating);
"#;

/// All migrations in order; index + 1 is the version number
const MIGRATIONS: &[&str] = &[MIGRATION_V1];

/// Current schema version
pub const CURRENT_VERSION: i64 = MIGRATIONS.len() as i64;

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(MIGRATION_TABLE)
        .map_err(ApiError::Database)?;

    let current = current_version(conn)?;

    for (idx, migration) in MIGRATIONS.iter().enumerate() {
        let version = idx as i64 + 1;
        if version <= current {
            continue;
        }

        info!(version, "Applying database migration");

        let tx = conn.transaction().map_err(ApiError::Database)?;
        tx.execute_batch(migration).map_err(ApiError::Database)?;
        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [version],
        )
        .map_err(ApiError::Database)?;
        tx.commit().map_err(ApiError::Database)?;
    }

    Ok(())
}

/// Get the highest applied migration version
fn current_version(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(ApiError::Database)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_and_migrate() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_migrations_create_tables() {
        let conn = open_and_migrate();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();

        assert!(tables.contains(&"users".to_string()));
        assert!(tables.contains(&"books".to_string()));
        assert!(tables.contains(&"ratings".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migrations_are_idempotent() {
        let mut conn = open_and_migrate();
        run_migrations(&mut conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_email_unique_constraint() {
        let conn = open_and_migrate();

        conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)",
            ["u1", "dup@example.com", "h1"],
        )
        .unwrap();

        let err = conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)",
            ["u2", "dup@example.com", "h2"],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_one_rating_per_user_per_book() {
        let conn = open_and_migrate();

        conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)",
            ["u1", "a@example.com", "h"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO books (id, user_id, title, author, year, genre, image_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params!["b1", "u1", "T", "A", 2020, "G", "http://x/images/a.jpg"],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO ratings (book_id, user_id, grade) VALUES (?, ?, ?)",
            rusqlite::params!["b1", "u2", 4.0],
        )
        .unwrap();

        let err = conn.execute(
            "INSERT INTO ratings (book_id, user_id, grade) VALUES (?, ?, ?)",
            rusqlite::params!["b1", "u2", 5.0],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_ratings_cascade_on_book_delete() {
        let conn = open_and_migrate();

        conn.execute(
            "INSERT INTO users (id, email, password_hash) VALUES (?, ?, ?)",
            ["u1", "a@example.com", "h"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO books (id, user_id, title, author, year, genre, image_url) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            rusqlite::params!["b1", "u1", "T", "A", 2020, "G", "http://x/images/a.jpg"],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO ratings (book_id, user_id, grade) VALUES (?, ?, ?)",
            rusqlite::params!["b1", "u2", 4.0],
        )
        .unwrap();

        conn.execute("DELETE FROM books WHERE id = ?", ["b1"]).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM ratings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}

//! Database migrations
//!
//! This module provides versioned schema migrations tracked in a
//! `schema_migrations` table.

use crate::core::error::{GrimoireError, Result};
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
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    year INTEGER NOT NULL,
    image_url TEXT NOT NULL,
    owner_user_id TEXT NOT NULL,
    average_rating REAL NOT NULL DEFAULT 0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

-- Ratings table; insertion order (rowid) is the submission order.
-- The unique index backstops the one-rating-per-user rule at the
-- storage level.
CREATE TABLE IF NOT EXISTS ratings (
    book_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    grade REAL NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (book_id, user_id),
    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_books_average_rating ON books(average_rating DESC);
CREATE INDEX IF NOT EXISTS idx_ratings_book ON ratings(book_id);
"#;

/// Run all pending migrations against the given connection
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute(MIGRATION_TABLE, [])
        .map_err(GrimoireError::Database)?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(GrimoireError::Database)?;

    let migrations: &[(i64, &str)] = &[(1, MIGRATION_V1)];

    for (version, sql) in migrations {
        if *version > current {
            info!(version, "Applying database migration");
            let tx = conn.transaction().map_err(GrimoireError::Database)?;
            tx.execute_batch(sql).map_err(GrimoireError::Database)?;
            tx.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [version],
            )
            .map_err(GrimoireError::Database)?;
            tx.commit().map_err(GrimoireError::Database)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_apply_once() {
        let mut conn = Connection::open_in_memory().unwrap();

        run_migrations(&mut conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);

        // Re-running is a no-op
        run_migrations(&mut conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_ratings_unique_per_user() {
        let mut conn = Connection::open_in_memory().unwrap();
        run_migrations(&mut conn).unwrap();

        conn.execute(
            "INSERT INTO books (id, title, author, year, image_url, owner_user_id) \
             VALUES ('b1', 'Dune', 'Herbert', 1965, 'http://x/images/a.png', 'u1')",
            [],
        )
        .unwrap();

        conn.execute(
            "INSERT INTO ratings (book_id, user_id, grade) VALUES ('b1', 'u2', 4)",
            [],
        )
        .unwrap();

        let duplicate = conn.execute(
            "INSERT INTO ratings (book_id, user_id, grade) VALUES ('b1', 'u2', 5)",
            [],
        );
        assert!(duplicate.is_err());
    }
}

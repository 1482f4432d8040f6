//! Repository pattern implementation for data access layer
//!
//! This module provides the Repository pattern for abstracting database
//! operations on users and books.

use crate::core::error::{GrimoireError, Result};
use crate::db::manager::DatabaseManager;
use crate::db::models::{Book, Rating, User};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Arc;

/// Generic repository trait for CRUD operations
#[async_trait]
pub trait Repository<T>: Send + Sync {
    /// Find an entity by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<T>>;

    /// Find all entities
    async fn find_all(&self) -> Result<Vec<T>>;

    /// Create a new entity
    async fn create(&self, entity: &T) -> Result<()>;

    /// Update an existing entity
    async fn update(&self, entity: &T) -> Result<()>;

    /// Delete an entity by its ID
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Repository for User entities
///
/// Users are immutable after sign-up, so only the create/find surface
/// exists here.
pub struct UserRepository {
    db: Arc<DatabaseManager>,
}

impl UserRepository {
    /// Create a new UserRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Persist a new user; a taken email maps to ConflictError
    pub async fn create(&self, user: &User) -> Result<()> {
        let user = user.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
                    rusqlite::params![&user.id, &user.email, &user.password_hash, &user.created_at],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        GrimoireError::Conflict(format!(
                            "Email {} is already registered",
                            user.email
                        ))
                    }
                    other => GrimoireError::Database(other),
                })?;
                Ok(())
            })
            .await
    }

    /// Find a user by email
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
                    [&email],
                    map_user_row,
                )
                .optional()
                .map_err(GrimoireError::Database)
            })
            .await
    }

    /// Find a user by ID
    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
                    [&id],
                    map_user_row,
                )
                .optional()
                .map_err(GrimoireError::Database)
            })
            .await
    }
}

fn map_user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

/// Repository for Book entities
pub struct BookRepository {
    db: Arc<DatabaseManager>,
}

const BOOK_COLUMNS: &str =
    "id, title, author, year, image_url, owner_user_id, average_rating, created_at";

impl BookRepository {
    /// Create a new BookRepository
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }

    /// Find up to `n` books ordered by average rating, highest first.
    ///
    /// Ties fall back to storage order, which is unspecified.
    pub async fn top_rated(&self, n: u32) -> Result<Vec<Book>> {
        self.db
            .execute(move |conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM books ORDER BY average_rating DESC LIMIT ?",
                        BOOK_COLUMNS
                    ))
                    .map_err(GrimoireError::Database)?;

                let mut books = stmt
                    .query_map([n], map_book_row)
                    .map_err(GrimoireError::Database)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(GrimoireError::Database)?;

                for book in books.iter_mut() {
                    book.ratings = load_ratings(conn, &book.id)?;
                }
                Ok(books)
            })
            .await
    }

    /// Append a rating and store the recomputed average in one pooled
    /// connection.
    ///
    /// The duplicate check happens at the service layer; the UNIQUE index
    /// on (book_id, user_id) is only a storage-level backstop and maps to
    /// DuplicateRatingError here.
    pub async fn append_rating(
        &self,
        book_id: &str,
        rating: &Rating,
        new_average: f64,
    ) -> Result<()> {
        let book_id = book_id.to_string();
        let rating = rating.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO ratings (book_id, user_id, grade) VALUES (?, ?, ?)",
                    rusqlite::params![&book_id, &rating.user_id, rating.grade],
                )
                .map_err(|e| match e {
                    rusqlite::Error::SqliteFailure(err, _)
                        if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                    {
                        GrimoireError::DuplicateRating(format!(
                            "User {} has already rated book {}",
                            rating.user_id, book_id
                        ))
                    }
                    other => GrimoireError::Database(other),
                })?;

                conn.execute(
                    "UPDATE books SET average_rating = ? WHERE id = ?",
                    rusqlite::params![new_average, &book_id],
                )
                .map_err(GrimoireError::Database)?;

                Ok(())
            })
            .await
    }
}

#[async_trait]
impl Repository<Book> for BookRepository {
    async fn find_by_id(&self, id: &str) -> Result<Option<Book>> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                let book = conn
                    .query_row(
                        &format!("SELECT {} FROM books WHERE id = ?", BOOK_COLUMNS),
                        [&id],
                        map_book_row,
                    )
                    .optional()
                    .map_err(GrimoireError::Database)?;

                let Some(mut book) = book else {
                    return Ok(None);
                };

                book.ratings = load_ratings(conn, &book.id)?;
                Ok(Some(book))
            })
            .await
    }

    async fn find_all(&self) -> Result<Vec<Book>> {
        self.db
            .execute(|conn| {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM books ORDER BY created_at DESC",
                        BOOK_COLUMNS
                    ))
                    .map_err(GrimoireError::Database)?;

                let mut books = stmt
                    .query_map([], map_book_row)
                    .map_err(GrimoireError::Database)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(GrimoireError::Database)?;

                attach_ratings(conn, &mut books)?;
                Ok(books)
            })
            .await
    }

    async fn create(&self, book: &Book) -> Result<()> {
        let book = book.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO books (id, title, author, year, image_url, owner_user_id, \
                     average_rating, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                    rusqlite::params![
                        &book.id,
                        &book.title,
                        &book.author,
                        book.year,
                        &book.image_url,
                        &book.owner_user_id,
                        book.average_rating,
                        &book.created_at,
                    ],
                )
                .map_err(GrimoireError::Database)?;
                Ok(())
            })
            .await
    }

    async fn update(&self, book: &Book) -> Result<()> {
        // owner_user_id is intentionally absent from the SET list: ownership
        // is immutable after creation.
        let book = book.clone();
        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE books SET title = ?, author = ?, year = ?, image_url = ?, \
                     average_rating = ? WHERE id = ?",
                    rusqlite::params![
                        &book.title,
                        &book.author,
                        book.year,
                        &book.image_url,
                        book.average_rating,
                        &book.id,
                    ],
                )
                .map_err(GrimoireError::Database)?;
                Ok(())
            })
            .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        // Ratings cascade via the foreign key
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                conn.execute("DELETE FROM books WHERE id = ?", [&id])
                    .map_err(GrimoireError::Database)?;
                Ok(())
            })
            .await
    }
}

fn map_book_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        year: row.get(3)?,
        image_url: row.get(4)?,
        owner_user_id: row.get(5)?,
        average_rating: row.get(6)?,
        created_at: row.get(7)?,
        ratings: Vec::new(),
    })
}

/// Load the ratings of a single book, in submission (rowid) order
fn load_ratings(conn: &Connection, book_id: &str) -> Result<Vec<Rating>> {
    let mut stmt = conn
        .prepare("SELECT user_id, grade FROM ratings WHERE book_id = ? ORDER BY rowid ASC")
        .map_err(GrimoireError::Database)?;

    let ratings = stmt
        .query_map([book_id], |row| {
            Ok(Rating {
                user_id: row.get(0)?,
                grade: row.get(1)?,
            })
        })
        .map_err(GrimoireError::Database)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(GrimoireError::Database);
    ratings
}

/// Load the ratings for the given books in one scan, in submission
/// (rowid) order
fn attach_ratings(conn: &Connection, books: &mut [Book]) -> Result<()> {
    if books.is_empty() {
        return Ok(());
    }

    let mut stmt = conn
        .prepare("SELECT book_id, user_id, grade FROM ratings ORDER BY rowid ASC")
        .map_err(GrimoireError::Database)?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                Rating {
                    user_id: row.get(1)?,
                    grade: row.get(2)?,
                },
            ))
        })
        .map_err(GrimoireError::Database)?;

    let mut by_book: HashMap<String, Vec<Rating>> = HashMap::new();
    for row in rows {
        let (book_id, rating) = row.map_err(GrimoireError::Database)?;
        by_book.entry(book_id).or_default().push(rating);
    }

    for book in books.iter_mut() {
        if let Some(ratings) = by_book.remove(&book.id) {
            book.ratings = ratings;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn test_db() -> Arc<DatabaseManager> {
        Arc::new(DatabaseManager::new_in_memory().unwrap())
    }

    fn sample_user(email: &str) -> User {
        User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    fn sample_book(owner: &str, title: &str, average: f64) -> Book {
        Book {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            author: "Herbert".to_string(),
            year: 1965,
            image_url: format!("http://localhost:4000/images/{}.png", title),
            owner_user_id: owner.to_string(),
            ratings: Vec::new(),
            average_rating: average,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    #[tokio::test]
    async fn test_user_create_and_find() {
        let repo = UserRepository::new(test_db());
        let user = sample_user("reader@example.com");

        repo.create(&user).await.unwrap();

        let by_email = repo.find_by_email("reader@example.com").await.unwrap();
        assert_eq!(by_email.unwrap().id, user.id);

        let by_id = repo.find_by_id(&user.id).await.unwrap();
        assert_eq!(by_id.unwrap().email, "reader@example.com");

        assert!(repo.find_by_email("ghost@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_email_conflict() {
        let repo = UserRepository::new(test_db());
        repo.create(&sample_user("reader@example.com")).await.unwrap();

        let duplicate = repo.create(&sample_user("reader@example.com")).await;
        assert!(matches!(duplicate, Err(GrimoireError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_book_crud() {
        let repo = BookRepository::new(test_db());
        let mut book = sample_book("u1", "dune", 0.0);

        repo.create(&book).await.unwrap();

        let loaded = repo.find_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "dune");
        assert_eq!(loaded.owner_user_id, "u1");
        assert!(loaded.ratings.is_empty());

        book.title = "Dune".to_string();
        repo.update(&book).await.unwrap();
        let updated = repo.find_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(updated.title, "Dune");

        repo.delete(&book.id).await.unwrap();
        assert!(repo.find_by_id(&book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_rating_and_load_order() {
        let repo = BookRepository::new(test_db());
        let book = sample_book("u1", "dune", 0.0);
        repo.create(&book).await.unwrap();

        for (user, grade) in [("u2", 5.0), ("u3", 3.0), ("u4", 4.0)] {
            let rating = Rating {
                user_id: user.to_string(),
                grade,
            };
            repo.append_rating(&book.id, &rating, 4.0).await.unwrap();
        }

        let loaded = repo.find_by_id(&book.id).await.unwrap().unwrap();
        assert_eq!(loaded.average_rating, 4.0);
        let users: Vec<&str> = loaded.ratings.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(users, vec!["u2", "u3", "u4"]);
    }

    #[tokio::test]
    async fn test_append_rating_duplicate_backstop() {
        let repo = BookRepository::new(test_db());
        let book = sample_book("u1", "dune", 0.0);
        repo.create(&book).await.unwrap();

        let rating = Rating {
            user_id: "u2".to_string(),
            grade: 5.0,
        };
        repo.append_rating(&book.id, &rating, 5.0).await.unwrap();

        let second = repo.append_rating(&book.id, &rating, 5.0).await;
        assert!(matches!(second, Err(GrimoireError::DuplicateRating(_))));
    }

    #[tokio::test]
    async fn test_top_rated_ordering_and_limit() {
        let repo = BookRepository::new(test_db());
        for (title, average) in [("a", 2.5), ("b", 4.8), ("c", 3.2), ("d", 4.0)] {
            repo.create(&sample_book("u1", title, average)).await.unwrap();
        }

        let top = repo.top_rated(3).await.unwrap();
        assert_eq!(top.len(), 3);
        let averages: Vec<f64> = top.iter().map(|b| b.average_rating).collect();
        assert_eq!(averages, vec![4.8, 4.0, 3.2]);
    }

    #[tokio::test]
    async fn test_delete_cascades_ratings() {
        let db = test_db();
        let repo = BookRepository::new(db.clone());
        let book = sample_book("u1", "dune", 0.0);
        repo.create(&book).await.unwrap();
        repo.append_rating(
            &book.id,
            &Rating {
                user_id: "u2".to_string(),
                grade: 4.0,
            },
            4.0,
        )
        .await
        .unwrap();

        repo.delete(&book.id).await.unwrap();

        let orphans: i64 = db
            .execute(|conn| {
                conn.query_row("SELECT COUNT(*) FROM ratings", [], |row| row.get(0))
                    .map_err(GrimoireError::Database)
            })
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }
}

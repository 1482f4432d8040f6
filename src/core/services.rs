//! Business logic services
//!
//! This module implements the application layer service that coordinates
//! between the REST API layer and the infrastructure layer (database,
//! image storage).

use crate::api::models::{CreateBookRequest, UpdateBookRequest};
use crate::core::error::{GrimoireError, Result};
use crate::core::images::{ImageStore, ImageUpload};
use crate::db::models::{Book, Rating};
use crate::db::repository::{BookRepository, Repository};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

/// Number of books returned by the best-rating listing
const TOP_RATED_COUNT: u32 = 3;

/// Book service for managing book business logic
pub struct BookService {
    book_repo: Arc<BookRepository>,
    images: Arc<ImageStore>,
}

impl BookService {
    /// Create a new BookService
    pub fn new(book_repo: Arc<BookRepository>, images: Arc<ImageStore>) -> Self {
        Self { book_repo, images }
    }

    /// Get all books
    pub async fn list_books(&self) -> Result<Vec<Book>> {
        self.book_repo.find_all().await
    }

    /// Get a book by ID
    pub async fn get_book(&self, id: &str) -> Result<Book> {
        self.book_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| GrimoireError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Create a new book owned by the caller.
    ///
    /// The cover image is mandatory; ownership comes from the
    /// authenticated identity, never from the payload.
    pub async fn create_book(
        &self,
        caller_user_id: &str,
        request: CreateBookRequest,
        image: ImageUpload,
        base_url: &str,
    ) -> Result<Book> {
        if request.title.trim().is_empty() {
            return Err(GrimoireError::Validation("Title is required".to_string()));
        }
        if request.author.trim().is_empty() {
            return Err(GrimoireError::Validation("Author is required".to_string()));
        }

        let filename = self.images.store(image).await?;

        let book = Book {
            id: Uuid::new_v4().to_string(),
            title: request.title,
            author: request.author,
            year: request.year,
            image_url: ImageStore::public_url(base_url, &filename),
            owner_user_id: caller_user_id.to_string(),
            ratings: Vec::new(),
            average_rating: 0.0,
            created_at: Utc::now().to_rfc3339(),
        };

        self.book_repo.create(&book).await?;

        tracing::info!(book_id = %book.id, user_id = %caller_user_id, "Book created");

        Ok(book)
    }

    /// Update an existing book owned by the caller.
    ///
    /// A replacement image goes through the image store and the previous
    /// file is removed best-effort.
    pub async fn update_book(
        &self,
        caller_user_id: &str,
        id: &str,
        patch: UpdateBookRequest,
        image: Option<ImageUpload>,
        base_url: &str,
    ) -> Result<Book> {
        let mut book = self.get_book(id).await?;

        if book.owner_user_id != caller_user_id {
            return Err(GrimoireError::Forbidden(
                "Only the owner may modify this book".to_string(),
            ));
        }

        if let Some(title) = patch.title {
            if !title.trim().is_empty() {
                book.title = title;
            }
        }
        if let Some(author) = patch.author {
            if !author.trim().is_empty() {
                book.author = author;
            }
        }
        if let Some(year) = patch.year {
            book.year = year;
        }

        if let Some(image) = image {
            let filename = self.images.store(image).await?;
            let old_url = std::mem::replace(
                &mut book.image_url,
                ImageStore::public_url(base_url, &filename),
            );
            self.images.delete_by_url(&old_url);
        }

        self.book_repo.update(&book).await?;

        tracing::info!(book_id = %book.id, user_id = %caller_user_id, "Book updated");

        Ok(book)
    }

    /// Delete a book owned by the caller.
    ///
    /// The stored cover is removed best-effort; the record deletion
    /// proceeds regardless.
    pub async fn delete_book(&self, caller_user_id: &str, id: &str) -> Result<()> {
        let book = self.get_book(id).await?;

        if book.owner_user_id != caller_user_id {
            return Err(GrimoireError::Forbidden(
                "Only the owner may delete this book".to_string(),
            ));
        }

        self.images.delete_by_url(&book.image_url);
        self.book_repo.delete(&book.id).await?;

        tracing::info!(book_id = %book.id, user_id = %caller_user_id, "Book deleted");

        Ok(())
    }

    /// Get the top rated books, highest average first.
    ///
    /// Image URLs are rewritten to be absolute for the current host, so
    /// records survive a host change.
    pub async fn top_rated(&self, base_url: &str) -> Result<Vec<Book>> {
        let mut books = self.book_repo.top_rated(TOP_RATED_COUNT).await?;

        for book in &mut books {
            if let Some(idx) = book.image_url.find("/images/") {
                book.image_url = format!("{}{}", base_url, &book.image_url[idx..]);
            }
            book.average_rating = round_two_decimals(book.average_rating);
        }

        Ok(books)
    }

    /// Submit a rating for a book.
    ///
    /// Each user may rate a book once; grades live in [0, 5]. The load,
    /// duplicate check and average recompute are not serialized across
    /// callers: two different users racing on the same book can
    /// interleave. The UNIQUE index on (book_id, user_id) only prevents
    /// the same user landing twice.
    pub async fn rate_book(&self, caller_user_id: &str, id: &str, grade: f64) -> Result<Book> {
        if !(0.0..=5.0).contains(&grade) {
            return Err(GrimoireError::Validation(
                "Rating must be between 0 and 5".to_string(),
            ));
        }

        let book = self.get_book(id).await?;

        if book.ratings.iter().any(|r| r.user_id == caller_user_id) {
            return Err(GrimoireError::DuplicateRating(format!(
                "User {} has already rated this book",
                caller_user_id
            )));
        }

        let mut grades: Vec<f64> = book.ratings.iter().map(|r| r.grade).collect();
        grades.push(grade);
        let average = average_grade(&grades);

        let rating = Rating {
            user_id: caller_user_id.to_string(),
            grade,
        };
        self.book_repo.append_rating(&book.id, &rating, average).await?;

        tracing::info!(
            book_id = %book.id,
            user_id = %caller_user_id,
            grade,
            average,
            "Rating recorded"
        );

        self.get_book(id).await
    }
}

/// Arithmetic mean of the grades, rounded to two decimals; 0 when empty
fn average_grade(grades: &[f64]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    let sum: f64 = grades.iter().sum();
    round_two_decimals(sum / grades.len() as f64)
}

fn round_two_decimals(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

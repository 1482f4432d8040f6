//! Book API handlers

use crate::api::models::{CreateBookRequest, MessageResponse, RatingRequest, UpdateBookRequest};
use crate::auth::middleware::AuthUser;
use crate::core::error::{GrimoireError, Result};
use crate::core::images::ImageUpload;
use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use super::AppState;

/// Maximum accepted size for a bare JSON update body
const JSON_BODY_LIMIT: usize = 1 << 20;

/// Handler for GET /api/books - List all books
pub async fn list_books(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let books = state.book_service.list_books().await?;
    Ok(Json(books))
}

/// Handler for GET /api/books/:id - Get book by ID
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let book = state.book_service.get_book(&id).await?;
    Ok(Json(book))
}

/// Handler for GET /api/books/bestrating - Top three books by average rating
pub async fn best_rated_books(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let base_url = request_base_url(&headers);
    let books = state.book_service.top_rated(&base_url).await?;
    Ok(Json(books))
}

/// Handler for POST /api/books - Create a new book (multipart: book + image)
pub async fn create_book(
    State(state): State<AppState>,
    user: AuthUser,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (payload, image) = read_book_form(multipart).await?;

    let payload = payload
        .ok_or_else(|| GrimoireError::Validation("Missing book payload".to_string()))?;
    let request: CreateBookRequest = serde_json::from_str(&payload)
        .map_err(|e| GrimoireError::Validation(format!("Invalid book payload: {}", e)))?;

    let image =
        image.ok_or_else(|| GrimoireError::Validation("An image file is required".to_string()))?;

    let base_url = request_base_url(&headers);
    let book = state
        .book_service
        .create_book(&user.user_id, request, image, &base_url)
        .await?;

    Ok((StatusCode::CREATED, Json(book)))
}

/// Handler for PUT /api/books/:id - Update a book
///
/// Accepts multipart when a replacement image rides along, bare JSON
/// otherwise.
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
    request: Request,
) -> Result<impl IntoResponse> {
    let base_url = request_base_url(request.headers());

    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let (patch, image) = if is_multipart {
        let multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| GrimoireError::Validation(format!("Invalid multipart body: {}", e)))?;
        let (payload, image) = read_book_form(multipart).await?;
        let patch = match payload {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| GrimoireError::Validation(format!("Invalid book payload: {}", e)))?,
            None => UpdateBookRequest::default(),
        };
        (patch, image)
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), JSON_BODY_LIMIT)
            .await
            .map_err(|e| GrimoireError::Validation(format!("Invalid request body: {}", e)))?;
        let patch = if bytes.is_empty() {
            UpdateBookRequest::default()
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| GrimoireError::Validation(format!("Invalid book payload: {}", e)))?
        };
        (patch, None)
    };

    let book = state
        .book_service
        .update_book(&user.user_id, &id, patch, image, &base_url)
        .await?;

    Ok(Json(book))
}

/// Handler for DELETE /api/books/:id - Delete a book
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    state.book_service.delete_book(&user.user_id, &id).await?;
    Ok(Json(MessageResponse {
        message: "Book deleted".to_string(),
    }))
}

/// Handler for POST /api/books/:id/rating - Submit a rating
pub async fn rate_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
    Json(req): Json<RatingRequest>,
) -> Result<impl IntoResponse> {
    if id.is_empty() || id == "undefined" {
        return Err(GrimoireError::Validation("Book id is missing".to_string()));
    }

    let grade = req
        .rating
        .ok_or_else(|| GrimoireError::Validation("Missing rating value".to_string()))?;

    let book = state.book_service.rate_book(&user.user_id, &id, grade).await?;
    Ok(Json(book))
}

/// Build the public base URL from the request's scheme and host
fn request_base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{}://{}", scheme, host)
}

/// Read the `book` JSON field and the `image` file field from a multipart
/// body
async fn read_book_form(mut multipart: Multipart) -> Result<(Option<String>, Option<ImageUpload>)> {
    let mut payload = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| GrimoireError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            Some("book") => {
                payload = Some(field.text().await.map_err(|e| {
                    GrimoireError::Validation(format!("Invalid book field: {}", e))
                })?);
            }
            Some("image") => {
                let original_name = field.file_name().unwrap_or("cover").to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(|e| {
                    GrimoireError::Validation(format!("Invalid image field: {}", e))
                })?;
                image = Some(ImageUpload {
                    original_name,
                    content_type,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok((payload, image))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_base_url_defaults() {
        let headers = HeaderMap::new();
        assert_eq!(request_base_url(&headers), "http://localhost");
    }

    #[test]
    fn test_request_base_url_uses_host_and_proto() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "books.example.org".parse().unwrap());
        headers.insert("x-forwarded-proto", "https".parse().unwrap());
        assert_eq!(request_base_url(&headers), "https://books.example.org");
    }
}

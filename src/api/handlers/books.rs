//! Book route handlers
//!
//! Reads are public; create, update, delete, and rate require a bearer
//! token. Update and delete are owner-only; rating is non-owner-only.

use crate::api::models::{BookPayload, RateRequest};
use crate::auth::middleware::AuthUser;
use crate::auth::models::MessageResponse;
use crate::core::error::{ApiError, Result};
use crate::db::models::Book;
use crate::db::repository::Repository;
use crate::media::public_url;
use axum::{
    extract::{FromRequest, Host, Multipart, Path, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use super::AppState;

/// Reject ids that cannot be record ids
fn parse_book_id(id: &str) -> Result<()> {
    Uuid::parse_str(id).map_err(|_| ApiError::Validation("Invalid book id".to_string()))?;
    Ok(())
}

/// Scheme + host of the incoming request, honoring X-Forwarded-Proto
fn base_url(headers: &HeaderMap, host: &str) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    format!("{}://{}", scheme, host)
}

/// An uploaded image field: raw bytes plus declared content type
struct UploadedImage {
    data: Vec<u8>,
    content_type: String,
}

/// Pull the `book` JSON field and optional `image` file out of a multipart form
async fn read_multipart(
    multipart: &mut Multipart,
) -> Result<(Option<String>, Option<UploadedImage>)> {
    let mut book_json = None;
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        match field.name() {
            Some("book") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Invalid book field: {}", e)))?;
                book_json = Some(text);
            }
            Some("image") => {
                let content_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(format!("Invalid image field: {}", e)))?;
                image = Some(UploadedImage {
                    data: data.to_vec(),
                    content_type,
                });
            }
            _ => {}
        }
    }

    Ok((book_json, image))
}

/// Handler for GET /api/books - List all books
pub async fn list_books(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let books = state.book_repo.find_all().await?;
    Ok(Json(books))
}

/// Handler for GET /api/books/bestrating - Top three rated books
pub async fn best_rating(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let books = state.book_repo.top_rated(3).await?;
    Ok(Json(books))
}

/// Handler for GET /api/books/:id - Get book by ID
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    parse_book_id(&id)?;

    let book = state
        .book_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    Ok(Json(book))
}

/// Handler for POST /api/books - Create a new book
///
/// Multipart body: a `book` JSON field plus an `image` file. The image is
/// processed before anything is persisted.
pub async fn create_book(
    State(state): State<AppState>,
    Host(host): Host,
    headers: HeaderMap,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let (book_json, image) = read_multipart(&mut multipart).await?;

    let payload = match book_json {
        Some(text) => BookPayload::from_json_str(&text)?,
        None => BookPayload::default(),
    };
    let fields = payload.validated().map_err(|_| {
        ApiError::Validation("title, author, year, genre and image are required".to_string())
    })?;

    let image = image.ok_or_else(|| {
        ApiError::Validation("title, author, year, genre and image are required".to_string())
    })?;

    let filename = state
        .images
        .process_upload(image.data, &image.content_type)
        .await?;
    let image_url = public_url(&base_url(&headers, &host), &filename);

    let book = Book {
        id: Uuid::new_v4().to_string(),
        user_id: user.user_id,
        title: fields.title,
        author: fields.author,
        year: fields.year,
        genre: fields.genre,
        image_url,
        ratings: Vec::new(),
        average_rating: 0.0,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    state.book_repo.create(&book).await?;

    tracing::info!(book_id = %book.id, owner = %book.user_id, "Book created");

    Ok((StatusCode::CREATED, Json(book)))
}

/// Handler for PUT /api/books/:id - Update a book (owner only)
///
/// Accepts a JSON body, or a multipart form when a new image is supplied;
/// a replaced image's old file is deleted best-effort.
pub async fn update_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Host(host): Host,
    user: AuthUser,
    request: Request,
) -> Result<impl IntoResponse> {
    parse_book_id(&id)?;

    let mut book = state
        .book_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    if book.user_id != user.user_id {
        return Err(ApiError::Forbidden("Not authorized".to_string()));
    }

    let headers = request.headers().clone();
    let is_multipart = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false);

    // The image pipeline only runs for multipart requests; JSON updates
    // leave the stored image untouched.
    let (payload, image) = if is_multipart {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {}", e)))?;
        let (book_json, image) = read_multipart(&mut multipart).await?;
        let payload = match book_json {
            Some(text) => BookPayload::from_json_str(&text)?,
            None => BookPayload::default(),
        };
        (payload, image)
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), crate::media::MAX_IMAGE_BYTES)
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read body: {}", e)))?;
        (BookPayload::from_json_body(&bytes)?, None)
    };

    let fields = payload.validated()?;

    if let Some(image) = image {
        let filename = state
            .images
            .process_upload(image.data, &image.content_type)
            .await?;
        state.images.delete_by_url(&book.image_url).await;
        book.image_url = public_url(&base_url(&headers, &host), &filename);
    }

    book.title = fields.title;
    book.author = fields.author;
    book.year = fields.year;
    book.genre = fields.genre;

    state.book_repo.update(&book).await?;

    tracing::info!(book_id = %book.id, "Book updated");

    Ok(Json(book))
}

/// Handler for DELETE /api/books/:id - Delete a book (owner only)
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
) -> Result<impl IntoResponse> {
    parse_book_id(&id)?;

    let book = state
        .book_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    if book.user_id != user.user_id {
        return Err(ApiError::Forbidden("Not authorized".to_string()));
    }

    // Cleanup is best-effort; the record delete proceeds regardless
    state.images.delete_by_url(&book.image_url).await;
    state.book_repo.delete(&id).await?;

    tracing::info!(book_id = %id, "Book deleted");

    Ok(Json(MessageResponse {
        message: "Book deleted".to_string(),
    }))
}

/// Handler for POST /api/books/:id/rating - Rate a book
///
/// One vote per user, owners cannot vote, grade must be in [0, 5].
pub async fn rate_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: AuthUser,
    Json(req): Json<RateRequest>,
) -> Result<impl IntoResponse> {
    parse_book_id(&id)?;

    let book = state
        .book_repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Book not found".to_string()))?;

    if book.user_id == user.user_id {
        return Err(ApiError::Forbidden(
            "You cannot rate your own book".to_string(),
        ));
    }

    let grade = req
        .grade
        .filter(|g| g.is_finite() && (0.0..=5.0).contains(g))
        .ok_or_else(|| ApiError::Validation("Grade must be between 0 and 5".to_string()))?;

    let updated = state.book_repo.add_rating(&id, &user.user_id, grade).await?;

    tracing::info!(book_id = %id, rater = %user.user_id, grade, "Rating added");

    Ok((StatusCode::CREATED, Json(updated)))
}

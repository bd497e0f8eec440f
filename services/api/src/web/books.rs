//! services/api/src/web/books.rs
//!
//! Catalog endpoints: uploads, listings, reading the stored PDF and deletion.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use bookflow_core::domain::PDF_CONTENT_TYPE;
use bookflow_core::services::{BookDetails, Upload};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::HttpError;
use crate::web::rest::{BookListResponse, BookResponse};
use crate::web::state::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 100;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PublicBooksQuery {
    /// Rows to skip.
    pub skip: Option<i64>,
    /// Maximum rows to return.
    pub limit: Option<i64>,
}

//=========================================================================================
// Uploads
//=========================================================================================

/// Upload a PDF as a public catalog book.
#[utoipa::path(
    post,
    path = "/books/public",
    tag = "books",
    request_body(content_type = "multipart/form-data", description = "Fields `title`, `author`, `pages` and a `file` part."),
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Missing or invalid form fields"),
        (status = 503, description = "File storage unavailable")
    )
)]
pub async fn create_public_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(_user_id): Extension<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let (details, upload) = read_book_form(multipart).await?;
    let book = state.catalog.register_public(details, upload).await?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// Upload a private PDF. The book is added to the uploader's library as planned.
#[utoipa::path(
    post,
    path = "/books/private",
    tag = "books",
    request_body(content_type = "multipart/form-data", description = "Fields `title`, `author`, `pages` and a PDF `file` part of at most 20 MB."),
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Not a PDF, too large, or invalid form fields"),
        (status = 503, description = "File storage unavailable")
    )
)]
pub async fn create_private_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let (details, upload) = read_book_form(multipart).await?;
    let book = state.catalog.register_private(details, upload, user_id).await?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

//=========================================================================================
// Reads
//=========================================================================================

#[utoipa::path(
    get,
    path = "/books/public",
    tag = "books",
    params(PublicBooksQuery),
    responses((status = 200, description = "Public books, oldest first", body = BookListResponse))
)]
pub async fn list_public_books_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicBooksQuery>,
) -> Result<Json<BookListResponse>, HttpError> {
    let books = state
        .catalog
        .list_public(query.skip.unwrap_or(0), query.limit.unwrap_or(DEFAULT_PAGE_LIMIT))
        .await?;
    Ok(Json(books.into()))
}

/// Books the current user can see: public ones plus the ones they own.
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses((status = 200, description = "Accessible books", body = BookListResponse))
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<BookListResponse>, HttpError> {
    let books = state.catalog.list_accessible(user_id).await?;
    Ok(Json(books.into()))
}

#[utoipa::path(
    get,
    path = "/books/{book_id}",
    tag = "books",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "The book", body = BookResponse),
        (status = 403, description = "Another user's private book"),
        (status = 404, description = "No such book")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookResponse>, HttpError> {
    let book = state
        .catalog
        .get_by_id(book_id)
        .await?
        .ok_or_else(|| HttpError::not_found("Book not found"))?;

    // Ownerless books come from ISBN lookups and are shared catalog rows.
    if book.owner_id.is_some() && !book.is_owned_by(user_id) {
        return Err(HttpError::new(StatusCode::FORBIDDEN, "Access denied"));
    }
    Ok(Json(book.into()))
}

/// Stream the stored PDF.
#[utoipa::path(
    get,
    path = "/books/{book_id}/read",
    tag = "books",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 200, description = "PDF content", content_type = "application/pdf", body = Vec<u8>),
        (status = 403, description = "Access denied"),
        (status = 404, description = "No such book, or the book has no file")
    )
)]
pub async fn read_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let bytes = state.catalog.read_file(book_id, user_id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, PDF_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"book_{}.pdf\"", book_id),
            ),
        ],
        bytes,
    ))
}

//=========================================================================================
// Deletion
//=========================================================================================

/// Delete one of your private books along with its file.
#[utoipa::path(
    delete,
    path = "/books/{book_id}",
    tag = "books",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Public book, or not the owner"),
        (status = 404, description = "No such book")
    )
)]
pub async fn delete_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    state.catalog.delete(book_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Multipart Parsing
//=========================================================================================

async fn read_book_form(mut multipart: Multipart) -> Result<(BookDetails, Upload), HttpError> {
    let mut title = None;
    let mut author = None;
    let mut pages = None;
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| HttpError::bad_request(format!("Failed to read multipart data: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    HttpError::bad_request(format!("Failed to read file bytes: {}", e.body_text()))
                })?;
                upload = Some(Upload {
                    bytes: bytes.to_vec(),
                    content_type,
                });
            }
            "title" | "author" | "pages" => {
                let text = field.text().await.map_err(|e| {
                    HttpError::bad_request(format!("Failed to read field '{}': {}", name, e.body_text()))
                })?;
                match name.as_str() {
                    "title" => title = Some(text),
                    "author" => author = Some(text),
                    _ => pages = Some(text),
                }
            }
            _ => {}
        }
    }

    let title = required_text(title, "title")?;
    let author = required_text(author, "author")?;
    let pages = required_text(pages, "pages")?
        .parse::<i32>()
        .map_err(|_| HttpError::bad_request("Field 'pages' must be an integer"))?;
    let upload = upload.ok_or_else(|| HttpError::bad_request("Multipart form must include a file"))?;

    Ok((BookDetails { title, author, pages }, upload))
}

fn required_text(value: Option<String>, field: &str) -> Result<String, HttpError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| HttpError::bad_request(format!("Field '{}' is required", field)))
}

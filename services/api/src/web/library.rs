//! services/api/src/web/library.rs
//!
//! The current user's library under `/users/me/library`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use bookflow_core::BookStatus;
use serde::Deserialize;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::HttpError;
use crate::web::rest::{UserBookResponse, UserLibraryResponse};
use crate::web::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddByIsbnRequest {
    pub isbn: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "planned")]
    pub status: Option<BookStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddPublicBookRequest {
    pub book_id: Uuid,
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "planned")]
    pub status: Option<BookStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    #[schema(value_type = String, example = "reading")]
    pub status: BookStatus,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct LibraryQuery {
    /// One of `planned`, `reading`, `finished`.
    #[param(value_type = Option<String>)]
    pub status: Option<BookStatus>,
}

/// Add a book to your library by ISBN, registering it from Google Books if needed.
#[utoipa::path(
    post,
    path = "/users/me/library/isbn",
    tag = "library",
    request_body = AddByIsbnRequest,
    responses(
        (status = 201, description = "Added", body = UserBookResponse),
        (status = 404, description = "No book found for this ISBN"),
        (status = 409, description = "Book already in your library")
    )
)]
pub async fn add_by_isbn_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AddByIsbnRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let isbn = req.isbn.trim();
    if isbn.is_empty() {
        return Err(HttpError::bad_request("ISBN must not be empty"));
    }
    let entry = state
        .library
        .add_by_isbn(user_id, isbn, req.status.unwrap_or_default())
        .await?;
    Ok((StatusCode::CREATED, Json(UserBookResponse::from(entry))))
}

/// Add a public catalog book to your library.
#[utoipa::path(
    post,
    path = "/users/me/library/public",
    tag = "library",
    request_body = AddPublicBookRequest,
    responses(
        (status = 201, description = "Added", body = UserBookResponse),
        (status = 403, description = "Book is not public"),
        (status = 404, description = "No such book"),
        (status = 409, description = "Book already in your library")
    )
)]
pub async fn add_public_book_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<AddPublicBookRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let entry = state
        .library
        .add_public_book(user_id, req.book_id, req.status.unwrap_or_default())
        .await?;
    Ok((StatusCode::CREATED, Json(UserBookResponse::from(entry))))
}

#[utoipa::path(
    get,
    path = "/users/me/library",
    tag = "library",
    params(LibraryQuery),
    responses((status = 200, description = "Library entries in the order they were added", body = UserLibraryResponse))
)]
pub async fn list_library_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(query): Query<LibraryQuery>,
) -> Result<Json<UserLibraryResponse>, HttpError> {
    let books: Vec<UserBookResponse> = state
        .library
        .list(user_id, query.status)
        .await?
        .into_iter()
        .map(UserBookResponse::from)
        .collect();
    Ok(Json(UserLibraryResponse {
        total: books.len(),
        books,
    }))
}

#[utoipa::path(
    put,
    path = "/users/me/library/{book_id}/status",
    tag = "library",
    params(("book_id" = Uuid, Path, description = "Book id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated", body = UserBookResponse),
        (status = 404, description = "Book not found in your library")
    )
)]
pub async fn update_status_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<UserBookResponse>, HttpError> {
    let entry = state.library.update_status(user_id, book_id, req.status).await?;
    Ok(Json(entry.into()))
}

#[utoipa::path(
    delete,
    path = "/users/me/library/{book_id}",
    tag = "library",
    params(("book_id" = Uuid, Path, description = "Book id")),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Book not found in library")
    )
)]
pub async fn remove_from_library_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, HttpError> {
    if state.library.remove(user_id, book_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(HttpError::not_found("Book not found in library"))
    }
}

//! services/api/src/web/rest.rs
//!
//! Contains the shared response payloads, the service-level handlers, and the master
//! definition for the OpenAPI specification.

use axum::response::Json;
use bookflow_core::{Book, BookStatus, LibraryEntry};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::web::{auth, books, integrations, library, reading};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    info(title = "BookFlow API", description = "Personal library and reading tracker."),
    paths(
        auth::register_handler,
        auth::login_handler,
        auth::logout_handler,
        auth::me_handler,
        books::create_public_book_handler,
        books::create_private_book_handler,
        books::list_public_books_handler,
        books::list_books_handler,
        books::get_book_handler,
        books::read_book_handler,
        books::delete_book_handler,
        library::add_by_isbn_handler,
        library::add_public_book_handler,
        library::list_library_handler,
        library::update_status_handler,
        library::remove_from_library_handler,
        reading::update_progress_handler,
        reading::get_progress_handler,
        reading::list_progress_handler,
        reading::get_habit_handler,
        reading::update_habit_handler,
        reading::get_stats_handler,
        integrations::search_handler,
        integrations::isbn_lookup_handler,
    ),
    components(
        schemas(
            auth::CredentialsRequest,
            auth::UserResponse,
            auth::AuthResponse,
            BookResponse,
            BookListResponse,
            UserBookResponse,
            UserLibraryResponse,
            library::AddByIsbnRequest,
            library::AddPublicBookRequest,
            library::UpdateStatusRequest,
            reading::ProgressUpdateRequest,
            reading::ProgressResponse,
            reading::HabitResponse,
            reading::HabitUpdateRequest,
            reading::StatsResponse,
            integrations::BookSearchResult,
            integrations::BookSearchResponse,
        )
    ),
    tags(
        (name = "users", description = "Registration and cookie sessions."),
        (name = "books", description = "The book catalog and stored PDFs."),
        (name = "library", description = "The current user's library."),
        (name = "reading", description = "Reading progress, daily goal and streak."),
        (name = "integrations", description = "Google Books metadata.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct BookResponse {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub pages: i32,
    pub isbn: Option<String>,
    pub is_public: bool,
    pub owner_id: Option<Uuid>,
    /// `None` when the book was added by ISBN without a file.
    pub file_path: Option<String>,
    pub has_pdf: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            id: book.id,
            is_public: book.is_public(),
            has_pdf: book.has_file(),
            title: book.title,
            author: book.author,
            pages: book.pages,
            isbn: book.isbn,
            owner_id: book.owner_id,
            file_path: book.file_path,
            created_at: book.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct BookListResponse {
    pub books: Vec<BookResponse>,
    pub total: usize,
}

impl From<Vec<Book>> for BookListResponse {
    fn from(books: Vec<Book>) -> Self {
        let books: Vec<BookResponse> = books.into_iter().map(BookResponse::from).collect();
        Self {
            total: books.len(),
            books,
        }
    }
}

/// A library membership together with the book it points at.
#[derive(Serialize, ToSchema)]
pub struct UserBookResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    #[schema(value_type = String, example = "planned")]
    pub status: BookStatus,
    pub added_at: DateTime<Utc>,
    pub book: BookResponse,
}

impl From<LibraryEntry> for UserBookResponse {
    fn from(entry: LibraryEntry) -> Self {
        let LibraryEntry { membership, book } = entry;
        Self {
            id: membership.id,
            user_id: membership.user_id,
            book_id: membership.book_id,
            status: membership.status,
            added_at: membership.added_at,
            book: book.into(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct UserLibraryResponse {
    pub books: Vec<UserBookResponse>,
    pub total: usize,
}

//=========================================================================================
// Service Handlers
//=========================================================================================

pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "message": "BookFlow API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookflow_core::{Membership, Visibility};

    fn book(visibility: Visibility, file_path: Option<&str>) -> Book {
        Book {
            id: Uuid::new_v4(),
            title: "Dune".into(),
            author: "Frank Herbert".into(),
            pages: 612,
            isbn: None,
            visibility,
            owner_id: None,
            file_path: file_path.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn book_response_derives_flags() {
        let response = BookResponse::from(book(Visibility::Public, Some("public/a.pdf")));
        assert!(response.is_public);
        assert!(response.has_pdf);

        let response = BookResponse::from(book(Visibility::Private, None));
        assert!(!response.is_public);
        assert!(!response.has_pdf);
    }

    #[test]
    fn library_entry_serializes_lowercase_status() {
        let book = book(Visibility::Public, None);
        let entry = LibraryEntry {
            membership: Membership {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                book_id: book.id,
                status: BookStatus::Reading,
                added_at: Utc::now(),
            },
            book,
        };
        let value = serde_json::to_value(UserBookResponse::from(entry)).unwrap();
        assert_eq!(value["status"], "reading");
        assert_eq!(value["book"]["title"], "Dune");
    }

    #[test]
    fn openapi_document_lists_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/users/me/library/isbn"));
        assert!(doc.paths.paths.contains_key("/reading/progress/{book_id}"));
    }
}

//! crates/bookflow_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the database, the file store, the metadata API and the broker.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Book, BookMetadata, BookStatus, DomainEvent, HabitState, LibraryEntry, Membership, NewBook,
    ProgressRecord, User, UserCredentials,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Uniqueness violated: {0}")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Repository Ports
//=========================================================================================

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user(&self, user_id: Uuid) -> PortResult<User>;

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a live session id to its user. Expired or unknown ids are `Unauthorized`.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Fails with `Conflict` when the ISBN is already taken.
    async fn create_book(&self, book: NewBook) -> PortResult<Book>;

    async fn get_book(&self, book_id: Uuid) -> PortResult<Option<Book>>;

    async fn get_book_by_isbn(&self, isbn: &str) -> PortResult<Option<Book>>;

    async fn list_public_books(&self, offset: i64, limit: i64) -> PortResult<Vec<Book>>;

    /// Public books plus the private books owned by `user_id`.
    async fn list_accessible_books(&self, user_id: Uuid) -> PortResult<Vec<Book>>;

    /// Removes the row together with its memberships and progress rows.
    async fn delete_book(&self, book_id: Uuid) -> PortResult<bool>;
}

#[async_trait]
pub trait MembershipRepository: Send + Sync {
    /// Inserts a new membership. A second insert for the same pair fails with `Conflict`
    /// at the storage level; callers must not pre-check.
    async fn insert_membership(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<Membership>;

    /// Inserts the membership unless one already exists for the pair.
    async fn ensure_membership(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<()>;

    async fn get_membership(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Option<Membership>>;

    async fn update_membership_status(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<Option<Membership>>;

    async fn delete_membership(&self, user_id: Uuid, book_id: Uuid) -> PortResult<bool>;

    async fn list_library(
        &self,
        user_id: Uuid,
        status: Option<BookStatus>,
    ) -> PortResult<Vec<LibraryEntry>>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    async fn get_progress(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Option<ProgressRecord>>;

    /// Creates the row for the pair or overwrites its page and timestamp.
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        current_page: i32,
        updated_at: DateTime<Utc>,
    ) -> PortResult<ProgressRecord>;

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressRecord>>;

    /// Sum of `current_page` over the user's rows with `from <= updated_at < to`.
    async fn sum_current_pages_updated_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<i64>;
}

#[async_trait]
pub trait HabitRepository: Send + Sync {
    async fn get_or_create_habit(&self, user_id: Uuid, default_goal: i32) -> PortResult<HabitState>;

    async fn save_habit(&self, habit: &HabitState) -> PortResult<HabitState>;
}

//=========================================================================================
// Collaborator Ports
//=========================================================================================

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Stores the bytes under a location derived from `path_hint` and returns its reference.
    async fn put(&self, path_hint: &str, bytes: &[u8], content_type: &str) -> PortResult<String>;

    async fn get(&self, reference: &str) -> PortResult<Vec<u8>>;

    /// Best-effort removal. Returns whether the object is gone.
    async fn delete(&self, reference: &str) -> bool;
}

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn lookup_by_isbn(&self, isbn: &str) -> PortResult<Option<BookMetadata>>;

    async fn search(&self, query: &str, max_results: u32) -> PortResult<Vec<BookMetadata>>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Fire-and-forget. Returns whether the event was handed off.
    async fn publish(&self, event: &DomainEvent) -> bool;
}

/// The single time source for "now" and "today".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

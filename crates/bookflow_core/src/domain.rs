//! crates/bookflow_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or transport format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default daily page goal for a freshly created habit.
pub const DEFAULT_DAILY_GOAL: i32 = 10;

/// Largest accepted private upload, in bytes.
pub const MAX_PRIVATE_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// The only media type accepted for private uploads.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

//=========================================================================================
// Identity
//=========================================================================================

// Represents a user - used throughout app
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}

//=========================================================================================
// Catalog
//=========================================================================================

/// Whether a book is shared with everyone or belongs to a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

/// A catalog entry.
///
/// A public book never has an owner. A private book always has exactly one owner and,
/// once uploaded, a file reference. Books registered from a metadata lookup carry an ISBN
/// and no file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub pages: i32,
    pub isbn: Option<String>,
    pub visibility: Visibility,
    pub owner_id: Option<Uuid>,
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Book {
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == Some(user_id)
    }

    pub fn has_file(&self) -> bool {
        self.file_path.is_some()
    }
}

/// The insertable part of a `Book`. Ids and timestamps are assigned by the repository.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub pages: i32,
    pub isbn: Option<String>,
    pub visibility: Visibility,
    pub owner_id: Option<Uuid>,
    pub file_path: Option<String>,
}

/// What the external metadata service knows about a volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
    pub pages: Option<i32>,
    pub description: String,
    pub published_date: String,
    pub isbn: Option<String>,
    pub thumbnail: String,
}

//=========================================================================================
// Library membership
//=========================================================================================

/// Where a book sits in a user's library. Any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    #[default]
    Planned,
    Reading,
    Finished,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Planned => "planned",
            BookStatus::Reading => "reading",
            BookStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(BookStatus::Planned),
            "reading" => Ok(BookStatus::Reading),
            "finished" => Ok(BookStatus::Finished),
            other => Err(format!("unknown book status '{}'", other)),
        }
    }
}

/// A user's inclusion of a book in their personal library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub status: BookStatus,
    pub added_at: DateTime<Utc>,
}

/// A membership joined with the book it points at.
#[derive(Debug, Clone)]
pub struct LibraryEntry {
    pub membership: Membership,
    pub book: Book,
}

//=========================================================================================
// Reading progress and habits
//=========================================================================================

/// A user's current page within one book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub current_page: i32,
    pub updated_at: DateTime<Utc>,
}

/// Per-user daily goal and consecutive-day streak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HabitState {
    pub id: Uuid,
    pub user_id: Uuid,
    pub daily_goal_pages: i32,
    pub current_streak: i32,
    pub last_reading_date: Option<DateTime<Utc>>,
}

/// Aggregate reading numbers for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingStats {
    pub total_books_read: i64,
    pub total_pages_read: i64,
    pub current_streak: i32,
    pub daily_goal_pages: i32,
}

//=========================================================================================
// Domain events
//=========================================================================================

/// Notifications emitted by the core. Delivery is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    ReadingProgressUpdated {
        user_id: Uuid,
        book_id: Uuid,
        pages_read: i32,
    },
    BookFinished {
        user_id: Uuid,
        book_id: Uuid,
    },
}

impl DomainEvent {
    /// The event type, also used as the routing key by publishers.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::ReadingProgressUpdated { .. } => "reading_progress_updated",
            DomainEvent::BookFinished { .. } => "book_finished",
        }
    }

    /// The wire message: `{ "event": <type>, ...payload }`.
    pub fn to_message(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "event": self.event_type() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_its_own_string_form() {
        for status in [BookStatus::Planned, BookStatus::Reading, BookStatus::Finished] {
            assert_eq!(status.as_str().parse::<BookStatus>(), Ok(status));
        }
        assert!("abandoned".parse::<BookStatus>().is_err());
    }

    #[test]
    fn event_message_carries_type_and_payload() {
        let user_id = Uuid::new_v4();
        let book_id = Uuid::new_v4();
        let event = DomainEvent::ReadingProgressUpdated {
            user_id,
            book_id,
            pages_read: 42,
        };

        let message = event.to_message();
        assert_eq!(message["event"], "reading_progress_updated");
        assert_eq!(message["user_id"], user_id.to_string());
        assert_eq!(message["pages_read"], 42);
        assert_eq!(message["event"], event.event_type());
    }
}

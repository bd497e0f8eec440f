//! crates/bookflow_core/src/services/progress.rs
//!
//! Per-book reading position, completion percentage and reading statistics.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{Book, DomainEvent, ProgressRecord, ReadingStats};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{BookRepository, Clock, EventPublisher, MembershipRepository, ProgressRepository};
use crate::services::habit::HabitService;

#[derive(Clone)]
pub struct ProgressService {
    books: Arc<dyn BookRepository>,
    memberships: Arc<dyn MembershipRepository>,
    progress: Arc<dyn ProgressRepository>,
    events: Arc<dyn EventPublisher>,
    habits: Arc<HabitService>,
    clock: Arc<dyn Clock>,
}

impl ProgressService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        memberships: Arc<dyn MembershipRepository>,
        progress: Arc<dyn ProgressRepository>,
        events: Arc<dyn EventPublisher>,
        habits: Arc<HabitService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            books,
            memberships,
            progress,
            events,
            habits,
            clock,
        }
    }

    /// Moves the user's position in a book to `current_page`.
    ///
    /// Allowed when the book is in the user's library, is public, or is owned by the user.
    /// Emits `reading_progress_updated`, plus `book_finished` on the last page, and then
    /// re-evaluates the streak.
    pub async fn update_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        current_page: i32,
    ) -> ServiceResult<ProgressRecord> {
        let book = self
            .books
            .get_book(book_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Book not found".to_string()))?;

        if !self.can_track(user_id, &book).await? {
            return Err(ServiceError::Forbidden("Book not in your library".to_string()));
        }

        if current_page < 0 || current_page > book.pages {
            return Err(ServiceError::InvalidInput(format!(
                "Page number must be between 0 and {}",
                book.pages
            )));
        }

        let record = self
            .progress
            .upsert_progress(user_id, book_id, current_page, self.clock.now())
            .await?;

        self.publish(DomainEvent::ReadingProgressUpdated {
            user_id,
            book_id,
            pages_read: current_page,
        })
        .await;
        if current_page >= book.pages {
            info!("User {} finished book {}", user_id, book_id);
            self.publish(DomainEvent::BookFinished { user_id, book_id }).await;
        }

        self.habits.recompute_streak(user_id).await?;
        Ok(record)
    }

    pub async fn get_progress(&self, user_id: Uuid, book_id: Uuid) -> ServiceResult<Option<ProgressRecord>> {
        Ok(self.progress.get_progress(user_id, book_id).await?)
    }

    pub async fn list_progress(&self, user_id: Uuid) -> ServiceResult<Vec<ProgressRecord>> {
        Ok(self.progress.list_progress(user_id).await?)
    }

    /// `current_page / pages * 100`, or 0.0 without a record or for a zero-page book.
    pub async fn percentage(&self, user_id: Uuid, book_id: Uuid) -> ServiceResult<f64> {
        let Some(record) = self.progress.get_progress(user_id, book_id).await? else {
            return Ok(0.0);
        };
        let Some(book) = self.books.get_book(book_id).await? else {
            return Ok(0.0);
        };
        Ok(percentage_of(record.current_page, book.pages))
    }

    pub async fn stats(&self, user_id: Uuid) -> ServiceResult<ReadingStats> {
        let records = self.progress.list_progress(user_id).await?;
        let habit = self.habits.get_or_create(user_id).await?;
        Ok(ReadingStats {
            total_books_read: records.len() as i64,
            total_pages_read: records.iter().map(|r| i64::from(r.current_page)).sum(),
            current_streak: habit.current_streak,
            daily_goal_pages: habit.daily_goal_pages,
        })
    }

    async fn can_track(&self, user_id: Uuid, book: &Book) -> ServiceResult<bool> {
        if book.is_public() || book.is_owned_by(user_id) {
            return Ok(true);
        }
        Ok(self.memberships.get_membership(user_id, book.id).await?.is_some())
    }

    async fn publish(&self, event: DomainEvent) {
        if !self.events.publish(&event).await {
            warn!("Event {} was not delivered", event.event_type());
        }
    }
}

pub fn percentage_of(current_page: i32, pages: i32) -> f64 {
    if pages == 0 {
        return 0.0;
    }
    f64::from(current_page) / f64::from(pages) * 100.0
}

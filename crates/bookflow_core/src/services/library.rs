//! crates/bookflow_core/src/services/library.rs
//!
//! A user's personal library: which books they hold and in what status.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::domain::{BookStatus, LibraryEntry, Membership};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{MembershipRepository, PortError};
use crate::services::catalog::CatalogService;

#[derive(Clone)]
pub struct LibraryService {
    catalog: Arc<CatalogService>,
    memberships: Arc<dyn MembershipRepository>,
}

impl LibraryService {
    pub fn new(catalog: Arc<CatalogService>, memberships: Arc<dyn MembershipRepository>) -> Self {
        Self {
            catalog,
            memberships,
        }
    }

    pub async fn add_by_isbn(
        &self,
        user_id: Uuid,
        isbn: &str,
        status: BookStatus,
    ) -> ServiceResult<LibraryEntry> {
        let book = self.catalog.register_by_external_lookup(isbn, user_id).await?;
        let membership = self.insert(user_id, book.id, status).await?;
        Ok(LibraryEntry { membership, book })
    }

    pub async fn add_public_book(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> ServiceResult<LibraryEntry> {
        let book = self.catalog.require_book(book_id).await?;
        if !book.is_public() {
            return Err(ServiceError::Forbidden("Book is not public".to_string()));
        }
        let membership = self.insert(user_id, book.id, status).await?;
        Ok(LibraryEntry { membership, book })
    }

    /// Overwrites the status. There is no transition graph.
    pub async fn update_status(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> ServiceResult<LibraryEntry> {
        let membership = self
            .memberships
            .update_membership_status(user_id, book_id, status)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Book not found in your library".to_string()))?;
        let book = self.catalog.require_book(book_id).await?;
        Ok(LibraryEntry { membership, book })
    }

    /// Returns whether a membership was removed.
    pub async fn remove(&self, user_id: Uuid, book_id: Uuid) -> ServiceResult<bool> {
        Ok(self.memberships.delete_membership(user_id, book_id).await?)
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        status: Option<BookStatus>,
    ) -> ServiceResult<Vec<LibraryEntry>> {
        Ok(self.memberships.list_library(user_id, status).await?)
    }

    // Uniqueness is enforced by the repository; a duplicate surfaces as a conflict.
    async fn insert(&self, user_id: Uuid, book_id: Uuid, status: BookStatus) -> ServiceResult<Membership> {
        match self.memberships.insert_membership(user_id, book_id, status).await {
            Ok(membership) => {
                info!("User {} added book {} as {}", user_id, book_id, status);
                Ok(membership)
            }
            Err(PortError::Conflict(_)) => {
                Err(ServiceError::Conflict("Book already in your library".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

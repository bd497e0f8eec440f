//! crates/bookflow_core/src/services/catalog.rs
//!
//! Book registration, lookup and removal.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    Book, BookMetadata, BookStatus, NewBook, Visibility, MAX_PRIVATE_UPLOAD_BYTES,
    PDF_CONTENT_TYPE,
};
use crate::error::{ServiceError, ServiceResult};
use crate::ports::{BookRepository, FileStorage, MembershipRepository, MetadataLookup, PortError};

/// A file handed in by the caller for a public or private book.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Title, author and page count supplied with an upload.
#[derive(Debug, Clone)]
pub struct BookDetails {
    pub title: String,
    pub author: String,
    pub pages: i32,
}

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BookRepository>,
    memberships: Arc<dyn MembershipRepository>,
    storage: Arc<dyn FileStorage>,
    metadata: Arc<dyn MetadataLookup>,
}

impl CatalogService {
    pub fn new(
        books: Arc<dyn BookRepository>,
        memberships: Arc<dyn MembershipRepository>,
        storage: Arc<dyn FileStorage>,
        metadata: Arc<dyn MetadataLookup>,
    ) -> Self {
        Self {
            books,
            memberships,
            storage,
            metadata,
        }
    }

    /// Returns the book with this ISBN, registering it from the metadata service if needed.
    ///
    /// Books created here are ownerless, private and have no file. A missing page count
    /// becomes 0. Both "no match" and an unreachable metadata service surface as `NotFound`.
    pub async fn register_by_external_lookup(
        &self,
        isbn: &str,
        requesting_user: Uuid,
    ) -> ServiceResult<Book> {
        if let Some(book) = self.books.get_book_by_isbn(isbn).await? {
            return Ok(book);
        }

        let metadata = match self.metadata.lookup_by_isbn(isbn).await {
            Ok(Some(metadata)) => metadata,
            Ok(None) => return Err(ServiceError::NotFound(format!("Book with ISBN {} not found", isbn))),
            Err(e) => {
                warn!("Metadata lookup for ISBN {} failed: {}", isbn, e);
                return Err(ServiceError::NotFound(format!("Book with ISBN {} not found", isbn)));
            }
        };

        let new_book = NewBook {
            title: metadata.title,
            author: metadata.author,
            pages: metadata.pages.unwrap_or(0),
            isbn: Some(isbn.to_string()),
            visibility: Visibility::Private,
            owner_id: None,
            file_path: None,
        };

        match self.books.create_book(new_book).await {
            Ok(book) => {
                info!("Registered book {} from ISBN {} for user {}", book.id, isbn, requesting_user);
                Ok(book)
            }
            // Lost a race with a concurrent registration of the same ISBN.
            Err(PortError::Conflict(_)) => self
                .books
                .get_book_by_isbn(isbn)
                .await?
                .ok_or_else(|| ServiceError::Conflict(format!("ISBN {} already registered", isbn))),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn register_public(&self, details: BookDetails, upload: Upload) -> ServiceResult<Book> {
        validate_pages(details.pages)?;

        let path_hint = format!("public/{}.pdf", Uuid::new_v4());
        let file_path = self
            .storage
            .put(&path_hint, &upload.bytes, &upload.content_type)
            .await
            .map_err(|e| ServiceError::StorageUnavailable(e.to_string()))?;

        let book = self
            .books
            .create_book(NewBook {
                title: details.title,
                author: details.author,
                pages: details.pages,
                isbn: None,
                visibility: Visibility::Public,
                owner_id: None,
                file_path: Some(file_path),
            })
            .await?;

        info!("Registered public book {}", book.id);
        Ok(book)
    }

    /// Uploads a private PDF for `owner` and puts it on the owner's library as planned.
    pub async fn register_private(
        &self,
        details: BookDetails,
        upload: Upload,
        owner: Uuid,
    ) -> ServiceResult<Book> {
        validate_private_upload(&upload)?;
        validate_pages(details.pages)?;

        let path_hint = format!("private/{}/{}.pdf", owner, Uuid::new_v4());
        let file_path = self
            .storage
            .put(&path_hint, &upload.bytes, &upload.content_type)
            .await
            .map_err(|e| ServiceError::StorageUnavailable(e.to_string()))?;

        let book = self
            .books
            .create_book(NewBook {
                title: details.title,
                author: details.author,
                pages: details.pages,
                isbn: None,
                visibility: Visibility::Private,
                owner_id: Some(owner),
                file_path: Some(file_path),
            })
            .await?;

        self.memberships
            .ensure_membership(owner, book.id, BookStatus::Planned)
            .await?;

        info!("Registered private book {} for owner {}", book.id, owner);
        Ok(book)
    }

    /// Deletes a private book owned by `requesting_user`. The stored file is removed
    /// best-effort; a storage failure does not keep the row.
    pub async fn delete(&self, book_id: Uuid, requesting_user: Uuid) -> ServiceResult<()> {
        let book = self.require_book(book_id).await?;

        if book.is_public() {
            return Err(ServiceError::Forbidden("Cannot delete public books".to_string()));
        }
        if !book.is_owned_by(requesting_user) {
            return Err(ServiceError::Forbidden(
                "Only book owner can delete the book".to_string(),
            ));
        }

        if let Some(file_path) = &book.file_path {
            if !self.storage.delete(file_path).await {
                warn!("Failed to delete stored file {} for book {}", file_path, book_id);
            }
        }

        self.books.delete_book(book_id).await?;
        info!("Deleted book {} by owner {}", book_id, requesting_user);
        Ok(())
    }

    /// Returns the PDF behind a book the user may read.
    pub async fn read_file(&self, book_id: Uuid, user_id: Uuid) -> ServiceResult<Vec<u8>> {
        let book = self.require_book(book_id).await?;

        if !book.is_public() && !book.is_owned_by(user_id) {
            return Err(ServiceError::Forbidden("Access denied".to_string()));
        }

        let file_path = book.file_path.as_deref().ok_or_else(|| {
            ServiceError::NotFound("This book has no PDF file. It was added by ISBN without file.".to_string())
        })?;

        self.storage.get(file_path).await.map_err(|e| {
            warn!("Could not read file {} for book {}: {}", file_path, book_id, e);
            ServiceError::NotFound("Book file not found in storage".to_string())
        })
    }

    pub async fn get_by_id(&self, book_id: Uuid) -> ServiceResult<Option<Book>> {
        Ok(self.books.get_book(book_id).await?)
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> ServiceResult<Option<Book>> {
        Ok(self.books.get_book_by_isbn(isbn).await?)
    }

    pub async fn list_public(&self, offset: i64, limit: i64) -> ServiceResult<Vec<Book>> {
        Ok(self.books.list_public_books(offset.max(0), limit.max(0)).await?)
    }

    pub async fn list_accessible(&self, user_id: Uuid) -> ServiceResult<Vec<Book>> {
        Ok(self.books.list_accessible_books(user_id).await?)
    }

    pub async fn search_metadata(&self, query: &str, max_results: u32) -> ServiceResult<Vec<BookMetadata>> {
        self.metadata
            .search(query, max_results)
            .await
            .map_err(|e| ServiceError::ExternalLookupFailed(e.to_string()))
    }

    pub async fn lookup_metadata(&self, isbn: &str) -> ServiceResult<BookMetadata> {
        self.metadata
            .lookup_by_isbn(isbn)
            .await
            .map_err(|e| ServiceError::ExternalLookupFailed(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound("Book not found".to_string()))
    }

    pub(crate) async fn require_book(&self, book_id: Uuid) -> ServiceResult<Book> {
        self.books
            .get_book(book_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Book not found".to_string()))
    }
}

/// Private uploads must be PDFs no larger than 20 MiB. Checked before any storage call.
pub fn validate_private_upload(upload: &Upload) -> ServiceResult<()> {
    if upload.content_type != PDF_CONTENT_TYPE {
        return Err(ServiceError::InvalidInput("Only PDF files are allowed".to_string()));
    }
    if upload.bytes.len() > MAX_PRIVATE_UPLOAD_BYTES {
        return Err(ServiceError::InvalidInput("File size exceeds 20 MB limit".to_string()));
    }
    Ok(())
}

fn validate_pages(pages: i32) -> ServiceResult<()> {
    if pages <= 0 {
        return Err(ServiceError::InvalidInput("Page count must be positive".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(content_type: &str, len: usize) -> Upload {
        Upload {
            bytes: vec![0u8; len],
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn private_upload_accepts_pdf_up_to_limit() {
        assert!(validate_private_upload(&upload(PDF_CONTENT_TYPE, MAX_PRIVATE_UPLOAD_BYTES)).is_ok());
    }

    #[test]
    fn private_upload_rejects_other_media_types() {
        let err = validate_private_upload(&upload("application/epub+zip", 10)).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[test]
    fn private_upload_rejects_oversized_files() {
        let err = validate_private_upload(&upload(PDF_CONTENT_TYPE, MAX_PRIVATE_UPLOAD_BYTES + 1))
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }
}

//! services/api/src/web/integrations.rs
//!
//! Direct access to Google Books metadata.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use bookflow_core::BookMetadata;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::HttpError;
use crate::web::state::AppState;

const DEFAULT_MAX_RESULTS: u32 = 10;
const MAX_RESULTS_LIMIT: u32 = 40;

#[derive(Debug, Deserialize, IntoParams)]
pub struct SearchQuery {
    /// Title, author or free text.
    pub query: String,
    /// 1 to 40, default 10.
    pub max_results: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookSearchResult {
    pub title: String,
    pub author: String,
    pub pages: i32,
    pub description: Option<String>,
    pub published_date: Option<String>,
    pub isbn: Option<String>,
    pub thumbnail: Option<String>,
}

impl From<BookMetadata> for BookSearchResult {
    fn from(metadata: BookMetadata) -> Self {
        let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
        Self {
            title: metadata.title,
            author: metadata.author,
            pages: metadata.pages.unwrap_or(0),
            description: non_empty(metadata.description),
            published_date: non_empty(metadata.published_date),
            isbn: metadata.isbn,
            thumbnail: non_empty(metadata.thumbnail),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookSearchResponse {
    pub books: Vec<BookSearchResult>,
    pub total: usize,
}

#[utoipa::path(
    get,
    path = "/integrations/google-books/search",
    tag = "integrations",
    params(SearchQuery),
    responses(
        (status = 200, description = "Matching volumes", body = BookSearchResponse),
        (status = 400, description = "max_results outside 1..=40"),
        (status = 502, description = "Google Books unavailable")
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<BookSearchResponse>, HttpError> {
    let max_results = query.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    if !(1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        return Err(HttpError::bad_request(format!(
            "max_results must be between 1 and {}",
            MAX_RESULTS_LIMIT
        )));
    }
    if query.query.trim().is_empty() {
        return Err(HttpError::bad_request("query must not be empty"));
    }

    let books: Vec<BookSearchResult> = state
        .catalog
        .search_metadata(query.query.trim(), max_results)
        .await?
        .into_iter()
        .map(BookSearchResult::from)
        .collect();
    Ok(Json(BookSearchResponse {
        total: books.len(),
        books,
    }))
}

#[utoipa::path(
    get,
    path = "/integrations/google-books/isbn/{isbn}",
    tag = "integrations",
    params(("isbn" = String, Path, description = "ISBN-10 or ISBN-13")),
    responses(
        (status = 200, description = "The volume", body = BookSearchResult),
        (status = 404, description = "Book not found"),
        (status = 502, description = "Google Books unavailable")
    )
)]
pub async fn isbn_lookup_handler(
    State(state): State<Arc<AppState>>,
    Path(isbn): Path<String>,
) -> Result<Json<BookSearchResult>, HttpError> {
    let metadata = state.catalog.lookup_metadata(&isbn).await?;
    Ok(Json(metadata.into()))
}

//! services/api/src/adapters/metadata.rs
//!
//! This module contains the adapter for the Google Books volumes API.
//! It implements the `MetadataLookup` port from the `core` crate.

use async_trait::async_trait;
use bookflow_core::domain::BookMetadata;
use bookflow_core::ports::{MetadataLookup, PortError, PortResult};
use serde::Deserialize;
use std::time::Duration;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct GoogleBooksAdapter {
    client: reqwest::Client,
    api_url: String,
}

impl GoogleBooksAdapter {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    async fn query_volumes(&self, query: &str, max_results: u32) -> PortResult<VolumesResponse> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&[("q", query.to_string()), ("maxResults", max_results.to_string())])
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        response
            .json::<VolumesResponse>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed volumes response: {}", e)))
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Default, Deserialize)]
struct VolumesResponse {
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    page_count: Option<i32>,
    description: Option<String>,
    published_date: Option<String>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Default, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

impl VolumeInfo {
    fn into_metadata(self) -> BookMetadata {
        let isbn = self
            .industry_identifiers
            .iter()
            .find(|id| id.kind == "ISBN_13" || id.kind == "ISBN_10")
            .map(|id| id.identifier.clone());
        let author = if self.authors.is_empty() {
            "Unknown".to_string()
        } else {
            self.authors.join(", ")
        };

        BookMetadata {
            title: self.title.unwrap_or_else(|| "Unknown".to_string()),
            author,
            pages: self.page_count,
            description: self.description.unwrap_or_default(),
            published_date: self.published_date.unwrap_or_default(),
            isbn,
            thumbnail: self.image_links.and_then(|l| l.thumbnail).unwrap_or_default(),
        }
    }
}

//=========================================================================================
// `MetadataLookup` Trait Implementation
//=========================================================================================

#[async_trait]
impl MetadataLookup for GoogleBooksAdapter {
    async fn lookup_by_isbn(&self, isbn: &str) -> PortResult<Option<BookMetadata>> {
        let volumes = self.query_volumes(&format!("isbn:{}", isbn), 1).await?;
        Ok(volumes.items.into_iter().next().map(|volume| {
            let mut metadata = volume.volume_info.into_metadata();
            metadata.isbn = Some(isbn.to_string());
            metadata
        }))
    }

    async fn search(&self, query: &str, max_results: u32) -> PortResult<Vec<BookMetadata>> {
        let volumes = self.query_volumes(query, max_results).await?;
        Ok(volumes
            .items
            .into_iter()
            .map(|volume| volume.volume_info.into_metadata())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_volume_fields() {
        let body = r#"{
            "items": [{
                "volumeInfo": {
                    "title": "Dune",
                    "authors": ["Frank Herbert", "Brian Herbert"],
                    "pageCount": 612,
                    "publishedDate": "1965",
                    "industryIdentifiers": [
                        {"type": "OTHER", "identifier": "x"},
                        {"type": "ISBN_13", "identifier": "9780441013593"}
                    ],
                    "imageLinks": {"thumbnail": "http://img/dune.jpg"}
                }
            }]
        }"#;
        let response: VolumesResponse = serde_json::from_str(body).unwrap();
        let metadata = response.items.into_iter().next().unwrap().volume_info.into_metadata();

        assert_eq!(metadata.title, "Dune");
        assert_eq!(metadata.author, "Frank Herbert, Brian Herbert");
        assert_eq!(metadata.pages, Some(612));
        assert_eq!(metadata.isbn.as_deref(), Some("9780441013593"));
        assert_eq!(metadata.thumbnail, "http://img/dune.jpg");
        assert_eq!(metadata.description, "");
    }

    #[test]
    fn sparse_volume_gets_defaults() {
        let response: VolumesResponse = serde_json::from_str(r#"{"items":[{"volumeInfo":{}}]}"#).unwrap();
        let metadata = response.items.into_iter().next().unwrap().volume_info.into_metadata();

        assert_eq!(metadata.title, "Unknown");
        assert_eq!(metadata.author, "Unknown");
        assert_eq!(metadata.pages, None);
        assert!(metadata.isbn.is_none());
    }

    #[test]
    fn missing_items_means_no_match() {
        let response: VolumesResponse = serde_json::from_str(r#"{"kind":"books#volumes","totalItems":0}"#).unwrap();
        assert!(response.items.is_empty());
    }
}

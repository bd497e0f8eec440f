pub mod db;
pub mod events;
pub mod metadata;
pub mod storage;

pub use db::DbAdapter;
pub use events::{LogEventPublisher, WebhookEventPublisher};
pub use metadata::GoogleBooksAdapter;
pub use storage::LocalFileStorage;

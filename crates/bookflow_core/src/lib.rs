pub mod domain;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod ports;
pub mod services;

pub use domain::{
    Book, BookMetadata, BookStatus, DomainEvent, HabitState, LibraryEntry, Membership, NewBook,
    ProgressRecord, ReadingStats, User, UserCredentials, Visibility,
};
pub use error::{ServiceError, ServiceResult};
pub use ports::{
    BookRepository, Clock, EventPublisher, FileStorage, HabitRepository, IdentityRepository,
    MembershipRepository, MetadataLookup, PortError, PortResult, ProgressRepository, SystemClock,
};
pub use services::{CatalogService, HabitService, LibraryService, ProgressService};

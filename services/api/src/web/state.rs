//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use bookflow_core::ports::{
    BookRepository, Clock, EventPublisher, FileStorage, HabitRepository, IdentityRepository,
    MembershipRepository, MetadataLookup, ProgressRepository,
};
use bookflow_core::services::{CatalogService, HabitService, LibraryService, ProgressService};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityRepository>,
    pub catalog: Arc<CatalogService>,
    pub library: Arc<LibraryService>,
    pub progress: Arc<ProgressService>,
    pub habits: Arc<HabitService>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires the services over a single repository that backs every table.
    pub fn new<R>(
        repository: Arc<R>,
        storage: Arc<dyn FileStorage>,
        metadata: Arc<dyn MetadataLookup>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        config: Arc<Config>,
    ) -> Self
    where
        R: IdentityRepository
            + BookRepository
            + MembershipRepository
            + ProgressRepository
            + HabitRepository
            + 'static,
    {
        let books: Arc<dyn BookRepository> = repository.clone();
        let memberships: Arc<dyn MembershipRepository> = repository.clone();
        let progress: Arc<dyn ProgressRepository> = repository.clone();
        let habit_repo: Arc<dyn HabitRepository> = repository.clone();
        let identity: Arc<dyn IdentityRepository> = repository;

        let catalog = Arc::new(CatalogService::new(
            books.clone(),
            memberships.clone(),
            storage,
            metadata,
        ));
        let library = Arc::new(LibraryService::new(catalog.clone(), memberships.clone()));
        let habits = Arc::new(HabitService::new(habit_repo, progress.clone(), clock.clone()));
        let progress = Arc::new(ProgressService::new(
            books,
            memberships,
            progress,
            events,
            habits.clone(),
            clock,
        ));

        Self {
            identity,
            catalog,
            library,
            progress,
            habits,
            config,
        }
    }
}

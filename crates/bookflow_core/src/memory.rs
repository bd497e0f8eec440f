//! crates/bookflow_core/src/memory.rs
//!
//! In-process implementations of every port. They apply the same uniqueness and cascade
//! rules as the SQL schema and back the service tests and the HTTP tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{
    Book, BookMetadata, BookStatus, DomainEvent, HabitState, LibraryEntry, Membership, NewBook,
    ProgressRecord, User, UserCredentials, Visibility,
};
use crate::ports::{
    BookRepository, Clock, EventPublisher, FileStorage, HabitRepository, IdentityRepository,
    MembershipRepository, MetadataLookup, PortError, PortResult, ProgressRepository,
};

fn lock<T>(mutex: &Mutex<T>) -> PortResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| PortError::Unexpected("in-memory store poisoned".to_string()))
}

//=========================================================================================
// Relational store
//=========================================================================================

#[derive(Default)]
struct Tables {
    users: Vec<(User, String)>,
    auth_sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    books: Vec<Book>,
    memberships: Vec<Membership>,
    progress: Vec<ProgressRecord>,
    habits: Vec<HabitState>,
}

/// A single store implementing every repository port.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalog rows.
    pub fn book_count(&self) -> usize {
        self.tables.lock().map(|t| t.books.len()).unwrap_or(0)
    }
}

#[async_trait]
impl IdentityRepository for InMemoryStore {
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let mut t = lock(&self.tables)?;
        if t.users.iter().any(|(u, _)| u.email == email) {
            return Err(PortError::Conflict(format!("email {} already registered", email)));
        }
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            created_at: Utc::now(),
        };
        t.users.push((user.clone(), hashed_password.to_string()));
        Ok(user)
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let t = lock(&self.tables)?;
        t.users
            .iter()
            .find(|(u, _)| u.id == user_id)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let t = lock(&self.tables)?;
        t.users
            .iter()
            .find(|(u, _)| u.email == email)
            .map(|(u, hash)| UserCredentials {
                user_id: u.id,
                email: u.email.clone(),
                hashed_password: hash.clone(),
            })
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut t = lock(&self.tables)?;
        t.auth_sessions
            .insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let t = lock(&self.tables)?;
        match t.auth_sessions.get(session_id) {
            Some((user_id, expires_at)) if *expires_at > Utc::now() => Ok(*user_id),
            _ => Err(PortError::Unauthorized),
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        lock(&self.tables)?.auth_sessions.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn create_book(&self, book: NewBook) -> PortResult<Book> {
        let mut t = lock(&self.tables)?;
        if let Some(isbn) = &book.isbn {
            if t.books.iter().any(|b| b.isbn.as_deref() == Some(isbn.as_str())) {
                return Err(PortError::Conflict(format!("ISBN {} already registered", isbn)));
            }
        }
        let book = Book {
            id: Uuid::new_v4(),
            title: book.title,
            author: book.author,
            pages: book.pages,
            isbn: book.isbn,
            visibility: book.visibility,
            owner_id: book.owner_id,
            file_path: book.file_path,
            created_at: Utc::now(),
        };
        t.books.push(book.clone());
        Ok(book)
    }

    async fn get_book(&self, book_id: Uuid) -> PortResult<Option<Book>> {
        Ok(lock(&self.tables)?.books.iter().find(|b| b.id == book_id).cloned())
    }

    async fn get_book_by_isbn(&self, isbn: &str) -> PortResult<Option<Book>> {
        Ok(lock(&self.tables)?
            .books
            .iter()
            .find(|b| b.isbn.as_deref() == Some(isbn))
            .cloned())
    }

    async fn list_public_books(&self, offset: i64, limit: i64) -> PortResult<Vec<Book>> {
        Ok(lock(&self.tables)?
            .books
            .iter()
            .filter(|b| b.visibility == Visibility::Public)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_accessible_books(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        Ok(lock(&self.tables)?
            .books
            .iter()
            .filter(|b| b.is_public() || b.is_owned_by(user_id))
            .cloned()
            .collect())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<bool> {
        let mut t = lock(&self.tables)?;
        let before = t.books.len();
        t.books.retain(|b| b.id != book_id);
        t.memberships.retain(|m| m.book_id != book_id);
        t.progress.retain(|p| p.book_id != book_id);
        Ok(t.books.len() != before)
    }
}

#[async_trait]
impl MembershipRepository for InMemoryStore {
    async fn insert_membership(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<Membership> {
        let mut t = lock(&self.tables)?;
        if t
            .memberships
            .iter()
            .any(|m| m.user_id == user_id && m.book_id == book_id)
        {
            return Err(PortError::Conflict("uq_user_book".to_string()));
        }
        let membership = Membership {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            status,
            added_at: Utc::now(),
        };
        t.memberships.push(membership.clone());
        Ok(membership)
    }

    async fn ensure_membership(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<()> {
        match self.insert_membership(user_id, book_id, status).await {
            Ok(_) | Err(PortError::Conflict(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn get_membership(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Option<Membership>> {
        Ok(lock(&self.tables)?
            .memberships
            .iter()
            .find(|m| m.user_id == user_id && m.book_id == book_id)
            .cloned())
    }

    async fn update_membership_status(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<Option<Membership>> {
        let mut t = lock(&self.tables)?;
        Ok(t
            .memberships
            .iter_mut()
            .find(|m| m.user_id == user_id && m.book_id == book_id)
            .map(|m| {
                m.status = status;
                m.clone()
            }))
    }

    async fn delete_membership(&self, user_id: Uuid, book_id: Uuid) -> PortResult<bool> {
        let mut t = lock(&self.tables)?;
        let before = t.memberships.len();
        t.memberships
            .retain(|m| !(m.user_id == user_id && m.book_id == book_id));
        Ok(t.memberships.len() != before)
    }

    async fn list_library(
        &self,
        user_id: Uuid,
        status: Option<BookStatus>,
    ) -> PortResult<Vec<LibraryEntry>> {
        let t = lock(&self.tables)?;
        Ok(t.memberships
            .iter()
            .filter(|m| m.user_id == user_id && status.map_or(true, |s| m.status == s))
            .filter_map(|m| {
                t.books.iter().find(|b| b.id == m.book_id).map(|b| LibraryEntry {
                    membership: m.clone(),
                    book: b.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryStore {
    async fn get_progress(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Option<ProgressRecord>> {
        Ok(lock(&self.tables)?
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.book_id == book_id)
            .cloned())
    }

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        current_page: i32,
        updated_at: DateTime<Utc>,
    ) -> PortResult<ProgressRecord> {
        let mut t = lock(&self.tables)?;
        if let Some(p) = t
            .progress
            .iter_mut()
            .find(|p| p.user_id == user_id && p.book_id == book_id)
        {
            p.current_page = current_page;
            p.updated_at = updated_at;
            return Ok(p.clone());
        }
        let record = ProgressRecord {
            id: Uuid::new_v4(),
            user_id,
            book_id,
            current_page,
            updated_at,
        };
        t.progress.push(record.clone());
        Ok(record)
    }

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressRecord>> {
        Ok(lock(&self.tables)?
            .progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn sum_current_pages_updated_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<i64> {
        Ok(lock(&self.tables)?
            .progress
            .iter()
            .filter(|p| p.user_id == user_id && p.updated_at >= from && p.updated_at < to)
            .map(|p| i64::from(p.current_page))
            .sum())
    }
}

#[async_trait]
impl HabitRepository for InMemoryStore {
    async fn get_or_create_habit(&self, user_id: Uuid, default_goal: i32) -> PortResult<HabitState> {
        let mut t = lock(&self.tables)?;
        if let Some(h) = t.habits.iter().find(|h| h.user_id == user_id) {
            return Ok(h.clone());
        }
        let habit = HabitState {
            id: Uuid::new_v4(),
            user_id,
            daily_goal_pages: default_goal,
            current_streak: 0,
            last_reading_date: None,
        };
        t.habits.push(habit.clone());
        Ok(habit)
    }

    async fn save_habit(&self, habit: &HabitState) -> PortResult<HabitState> {
        let mut t = lock(&self.tables)?;
        let slot = t
            .habits
            .iter_mut()
            .find(|h| h.user_id == habit.user_id)
            .ok_or_else(|| PortError::NotFound(format!("Habit for user {} not found", habit.user_id)))?;
        *slot = habit.clone();
        Ok(habit.clone())
    }
}

//=========================================================================================
// Collaborators
//=========================================================================================

/// Keeps uploaded files in a map. Can be switched offline to simulate an outage.
#[derive(Default)]
pub struct InMemoryFileStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    offline: Mutex<bool>,
    puts: Mutex<usize>,
}

impl InMemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut flag) = self.offline.lock() {
            *flag = offline;
        }
    }

    /// How many times `put` was attempted.
    pub fn put_attempts(&self) -> usize {
        self.puts.lock().map(|n| *n).unwrap_or(0)
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.objects
            .lock()
            .map(|o| o.contains_key(reference))
            .unwrap_or(false)
    }

    fn is_offline(&self) -> bool {
        self.offline.lock().map(|f| *f).unwrap_or(true)
    }
}

#[async_trait]
impl FileStorage for InMemoryFileStorage {
    async fn put(&self, path_hint: &str, bytes: &[u8], _content_type: &str) -> PortResult<String> {
        *lock(&self.puts)? += 1;
        if self.is_offline() {
            return Err(PortError::Unavailable("storage offline".to_string()));
        }
        lock(&self.objects)?.insert(path_hint.to_string(), bytes.to_vec());
        Ok(path_hint.to_string())
    }

    async fn get(&self, reference: &str) -> PortResult<Vec<u8>> {
        if self.is_offline() {
            return Err(PortError::Unavailable("storage offline".to_string()));
        }
        lock(&self.objects)?
            .get(reference)
            .cloned()
            .ok_or_else(|| PortError::NotFound(reference.to_string()))
    }

    async fn delete(&self, reference: &str) -> bool {
        if self.is_offline() {
            return false;
        }
        match self.objects.lock() {
            Ok(mut objects) => {
                objects.remove(reference);
                true
            }
            Err(_) => false,
        }
    }
}

/// Answers ISBN lookups from a fixed table.
#[derive(Default)]
pub struct StaticMetadata {
    volumes: Mutex<HashMap<String, BookMetadata>>,
    lookups: Mutex<usize>,
    unreachable: Mutex<bool>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(self, isbn: &str, metadata: BookMetadata) -> Self {
        if let Ok(mut volumes) = self.volumes.lock() {
            volumes.insert(isbn.to_string(), metadata);
        }
        self
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        if let Ok(mut flag) = self.unreachable.lock() {
            *flag = unreachable;
        }
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().map(|n| *n).unwrap_or(0)
    }

    fn check_reachable(&self) -> PortResult<()> {
        if *lock(&self.unreachable)? {
            return Err(PortError::Unavailable("metadata service unreachable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataLookup for StaticMetadata {
    async fn lookup_by_isbn(&self, isbn: &str) -> PortResult<Option<BookMetadata>> {
        *lock(&self.lookups)? += 1;
        self.check_reachable()?;
        Ok(lock(&self.volumes)?.get(isbn).cloned())
    }

    async fn search(&self, query: &str, max_results: u32) -> PortResult<Vec<BookMetadata>> {
        self.check_reachable()?;
        let needle = query.to_lowercase();
        Ok(lock(&self.volumes)?
            .values()
            .filter(|m| m.title.to_lowercase().contains(&needle) || m.author.to_lowercase().contains(&needle))
            .take(max_results as usize)
            .cloned()
            .collect())
    }
}

/// Remembers every published event. Can be told to refuse delivery.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
    refuse: Mutex<bool>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_refuse(&self, refuse: bool) {
        if let Ok(mut flag) = self.refuse.lock() {
            *flag = refuse;
        }
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> bool {
        if self.refuse.lock().map(|f| *f).unwrap_or(false) {
            return false;
        }
        match self.events.lock() {
            Ok(mut events) => {
                events.push(event.clone());
                true
            }
            Err(_) => false,
        }
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut slot) = self.now.lock() {
            *slot = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut slot) = self.now.lock() {
            *slot += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|n| *n).unwrap_or_else(|_| Utc::now())
    }
}

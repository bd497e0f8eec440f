//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! repository ports from the `core` crate. It handles all interactions with the
//! PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use bookflow_core::domain::{
    Book, BookStatus, HabitState, LibraryEntry, Membership, NewBook, ProgressRecord, User,
    UserCredentials, Visibility,
};
use bookflow_core::ports::{
    BookRepository, HabitRepository, IdentityRepository, MembershipRepository, PortError,
    PortResult, ProgressRepository,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every repository port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

/// Maps driver errors onto port errors. Unique violations become `Conflict`.
fn db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            PortError::Conflict(db.constraint().unwrap_or("unique").to_string())
        }
        other => PortError::Unexpected(other.to_string()),
    }
}

fn parse_status(raw: &str) -> PortResult<BookStatus> {
    raw.parse::<BookStatus>().map_err(PortError::Unexpected)
}

const BOOK_COLUMNS: &str =
    "id, title, author, pages, isbn, is_public, owner_id, file_path, created_at";

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    email: String,
    created_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            id: self.id,
            email: self.email,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct BookRecord {
    id: Uuid,
    title: String,
    author: String,
    pages: i32,
    isbn: Option<String>,
    is_public: bool,
    owner_id: Option<Uuid>,
    file_path: Option<String>,
    created_at: DateTime<Utc>,
}
impl BookRecord {
    fn to_domain(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            author: self.author,
            pages: self.pages,
            isbn: self.isbn,
            visibility: if self.is_public {
                Visibility::Public
            } else {
                Visibility::Private
            },
            owner_id: self.owner_id,
            file_path: self.file_path,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct MembershipRecord {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    status: String,
    added_at: DateTime<Utc>,
}
impl MembershipRecord {
    fn to_domain(self) -> PortResult<Membership> {
        Ok(Membership {
            id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            status: parse_status(&self.status)?,
            added_at: self.added_at,
        })
    }
}

/// One row of the membership/book join.
#[derive(FromRow)]
struct LibraryRecord {
    membership_id: Uuid,
    user_id: Uuid,
    status: String,
    added_at: DateTime<Utc>,
    #[sqlx(flatten)]
    book: BookRecord,
}
impl LibraryRecord {
    fn to_domain(self) -> PortResult<LibraryEntry> {
        let book = self.book.to_domain();
        Ok(LibraryEntry {
            membership: Membership {
                id: self.membership_id,
                user_id: self.user_id,
                book_id: book.id,
                status: parse_status(&self.status)?,
                added_at: self.added_at,
            },
            book,
        })
    }
}

#[derive(FromRow)]
struct ProgressRow {
    id: Uuid,
    user_id: Uuid,
    book_id: Uuid,
    current_page: i32,
    updated_at: DateTime<Utc>,
}
impl ProgressRow {
    fn to_domain(self) -> ProgressRecord {
        ProgressRecord {
            id: self.id,
            user_id: self.user_id,
            book_id: self.book_id,
            current_page: self.current_page,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct HabitRecord {
    id: Uuid,
    user_id: Uuid,
    daily_goal_pages: i32,
    current_streak: i32,
    last_reading_date: Option<DateTime<Utc>>,
}
impl HabitRecord {
    fn to_domain(self) -> HabitState {
        HabitState {
            id: self.id,
            user_id: self.user_id,
            daily_goal_pages: self.daily_goal_pages,
            current_streak: self.current_streak,
            last_reading_date: self.last_reading_date,
        }
    }
}

//=========================================================================================
// `IdentityRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityRepository for DbAdapter {
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING id, email, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", user_id)),
            _ => db_error(e),
        })?;
        Ok(record.to_domain())
    }

    async fn get_credentials_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::NotFound(format!("User {} not found", email)),
            _ => db_error(e),
        })?;
        Ok(UserCredentials {
            user_id: record.id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id: Option<Uuid> = sqlx::query_scalar(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

//=========================================================================================
// `BookRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl BookRepository for DbAdapter {
    async fn create_book(&self, book: NewBook) -> PortResult<Book> {
        let sql = format!(
            "INSERT INTO books (id, title, author, pages, isbn, is_public, owner_id, file_path) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            BOOK_COLUMNS
        );
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(Uuid::new_v4())
            .bind(&book.title)
            .bind(&book.author)
            .bind(book.pages)
            .bind(&book.isbn)
            .bind(book.visibility == Visibility::Public)
            .bind(book.owner_id)
            .bind(&book.file_path)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(record.to_domain())
    }

    async fn get_book(&self, book_id: Uuid) -> PortResult<Option<Book>> {
        let sql = format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS);
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(record.map(BookRecord::to_domain))
    }

    async fn get_book_by_isbn(&self, isbn: &str) -> PortResult<Option<Book>> {
        let sql = format!("SELECT {} FROM books WHERE isbn = $1", BOOK_COLUMNS);
        let record = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(isbn)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(record.map(BookRecord::to_domain))
    }

    async fn list_public_books(&self, offset: i64, limit: i64) -> PortResult<Vec<Book>> {
        let sql = format!(
            "SELECT {} FROM books WHERE is_public ORDER BY created_at ASC, id ASC OFFSET $1 LIMIT $2",
            BOOK_COLUMNS
        );
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn list_accessible_books(&self, user_id: Uuid) -> PortResult<Vec<Book>> {
        let sql = format!(
            "SELECT {} FROM books WHERE is_public OR owner_id = $1 ORDER BY created_at ASC, id ASC",
            BOOK_COLUMNS
        );
        let records = sqlx::query_as::<_, BookRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(records.into_iter().map(BookRecord::to_domain).collect())
    }

    async fn delete_book(&self, book_id: Uuid) -> PortResult<bool> {
        // Memberships and progress rows go with the book through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

//=========================================================================================
// `MembershipRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl MembershipRepository for DbAdapter {
    async fn insert_membership(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<Membership> {
        let record = sqlx::query_as::<_, MembershipRecord>(
            "INSERT INTO user_books (id, user_id, book_id, status) VALUES ($1, $2, $3, $4) \
             RETURNING id, user_id, book_id, status, added_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(book_id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        record.to_domain()
    }

    async fn ensure_membership(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO user_books (id, user_id, book_id, status) VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_user_book DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(book_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_membership(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Option<Membership>> {
        let record = sqlx::query_as::<_, MembershipRecord>(
            "SELECT id, user_id, book_id, status, added_at FROM user_books \
             WHERE user_id = $1 AND book_id = $2",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        record.map(MembershipRecord::to_domain).transpose()
    }

    async fn update_membership_status(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        status: BookStatus,
    ) -> PortResult<Option<Membership>> {
        let record = sqlx::query_as::<_, MembershipRecord>(
            "UPDATE user_books SET status = $3 WHERE user_id = $1 AND book_id = $2 \
             RETURNING id, user_id, book_id, status, added_at",
        )
        .bind(user_id)
        .bind(book_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        record.map(MembershipRecord::to_domain).transpose()
    }

    async fn delete_membership(&self, user_id: Uuid, book_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM user_books WHERE user_id = $1 AND book_id = $2")
            .bind(user_id)
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_library(
        &self,
        user_id: Uuid,
        status: Option<BookStatus>,
    ) -> PortResult<Vec<LibraryEntry>> {
        let records = sqlx::query_as::<_, LibraryRecord>(
            "SELECT m.id AS membership_id, m.user_id, m.status, m.added_at, \
                    b.id, b.title, b.author, b.pages, b.isbn, b.is_public, b.owner_id, \
                    b.file_path, b.created_at \
             FROM user_books m JOIN books b ON b.id = m.book_id \
             WHERE m.user_id = $1 AND ($2::text IS NULL OR m.status = $2) \
             ORDER BY m.added_at ASC, m.id ASC",
        )
        .bind(user_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        records.into_iter().map(LibraryRecord::to_domain).collect()
    }
}

//=========================================================================================
// `ProgressRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressRepository for DbAdapter {
    async fn get_progress(&self, user_id: Uuid, book_id: Uuid) -> PortResult<Option<ProgressRecord>> {
        let record = sqlx::query_as::<_, ProgressRow>(
            "SELECT id, user_id, book_id, current_page, updated_at FROM reading_progress \
             WHERE user_id = $1 AND book_id = $2",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.map(ProgressRow::to_domain))
    }

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        current_page: i32,
        updated_at: DateTime<Utc>,
    ) -> PortResult<ProgressRecord> {
        let record = sqlx::query_as::<_, ProgressRow>(
            "INSERT INTO reading_progress (id, user_id, book_id, current_page, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT ON CONSTRAINT uq_progress_user_book \
             DO UPDATE SET current_page = EXCLUDED.current_page, updated_at = EXCLUDED.updated_at \
             RETURNING id, user_id, book_id, current_page, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(book_id)
        .bind(current_page)
        .bind(updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.to_domain())
    }

    async fn list_progress(&self, user_id: Uuid) -> PortResult<Vec<ProgressRecord>> {
        let records = sqlx::query_as::<_, ProgressRow>(
            "SELECT id, user_id, book_id, current_page, updated_at FROM reading_progress \
             WHERE user_id = $1 ORDER BY updated_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(records.into_iter().map(ProgressRow::to_domain).collect())
    }

    async fn sum_current_pages_updated_between(
        &self,
        user_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(current_page), 0)::BIGINT FROM reading_progress \
             WHERE user_id = $1 AND updated_at >= $2 AND updated_at < $3",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }
}

//=========================================================================================
// `HabitRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl HabitRepository for DbAdapter {
    async fn get_or_create_habit(&self, user_id: Uuid, default_goal: i32) -> PortResult<HabitState> {
        sqlx::query(
            "INSERT INTO reading_habits (id, user_id, daily_goal_pages, current_streak) \
             VALUES ($1, $2, $3, 0) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(default_goal)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        let record = sqlx::query_as::<_, HabitRecord>(
            "SELECT id, user_id, daily_goal_pages, current_streak, last_reading_date \
             FROM reading_habits WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.to_domain())
    }

    async fn save_habit(&self, habit: &HabitState) -> PortResult<HabitState> {
        let record = sqlx::query_as::<_, HabitRecord>(
            "UPDATE reading_habits \
             SET daily_goal_pages = $2, current_streak = $3, last_reading_date = $4 \
             WHERE user_id = $1 \
             RETURNING id, user_id, daily_goal_pages, current_streak, last_reading_date",
        )
        .bind(habit.user_id)
        .bind(habit.daily_goal_pages)
        .bind(habit.current_streak)
        .bind(habit.last_reading_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                PortError::NotFound(format!("Habit for user {} not found", habit.user_id))
            }
            _ => db_error(e),
        })?;
        Ok(record.to_domain())
    }
}

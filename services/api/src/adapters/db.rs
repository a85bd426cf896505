//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `AccountStore` and `CommentStore` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use bookcorner_core::domain::{AccountCredentials, Comment, Role, UserAccount};
use bookcorner_core::ports::{AccountStore, CommentStore, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `AccountStore` and `CommentStore` ports.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a unique-constraint violation to `Conflict`, everything else to
/// `Unexpected`.
fn map_write_err(e: sqlx::Error, what: &str) -> PortError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            return PortError::Conflict(what.to_string());
        }
    }
    PortError::Unexpected(e.to_string())
}

fn map_read_err(e: sqlx::Error, what: &str) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct AccountRecord {
    email: String,
    nickname: String,
    role: String,
    created_at: DateTime<Utc>,
}
impl AccountRecord {
    fn to_domain(self) -> UserAccount {
        UserAccount {
            email: self.email,
            nickname: self.nickname,
            // Unrecognized stored roles demote to plain user.
            role: Role::parse(&self.role).unwrap_or(Role::User),
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    email: String,
    nickname: String,
    role: String,
    password_hash: String,
}
impl CredentialsRecord {
    fn to_domain(self) -> AccountCredentials {
        AccountCredentials {
            email: self.email,
            nickname: self.nickname,
            role: Role::parse(&self.role).unwrap_or(Role::User),
            hashed_password: self.password_hash,
        }
    }
}

#[derive(FromRow)]
struct CommentRecord {
    id: Uuid,
    book_title: String,
    author_email: String,
    author_nickname: String,
    text: String,
    edited: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CommentRecord {
    fn to_domain(self) -> Comment {
        Comment {
            id: self.id,
            book_title: self.book_title,
            author_email: self.author_email,
            author_nickname: self.author_nickname,
            text: self.text,
            edited: self.edited,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `AccountStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(
        &self,
        email: &str,
        nickname: &str,
        hashed_password: &str,
    ) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "INSERT INTO accounts (email, nickname, password_hash, role) \
             VALUES ($1, $2, $3, 'user') \
             RETURNING email, nickname, role, created_at",
        )
        .bind(email)
        .bind(nickname)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_err(e, "an account with this email or nickname"))?;
        Ok(record.to_domain())
    }

    async fn get_account(&self, email: &str) -> PortResult<UserAccount> {
        let record = sqlx::query_as::<_, AccountRecord>(
            "SELECT email, nickname, role, created_at FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_err(e, &format!("account {email}")))?;
        Ok(record.to_domain())
    }

    async fn get_credentials(&self, email: &str) -> PortResult<AccountCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT email, nickname, role, password_hash FROM accounts WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_err(e, &format!("account {email}")))?;
        Ok(record.to_domain())
    }

    async fn set_role(&self, email: &str, role: Role) -> PortResult<()> {
        let result = sqlx::query("UPDATE accounts SET role = $1 WHERE email = $2")
            .bind(role.as_str())
            .bind(email)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("account {email}")));
        }
        Ok(())
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, email, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(email)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String> {
        let email: Option<(String,)> = sqlx::query_as(
            "SELECT email FROM auth_sessions WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        match email {
            Some((email,)) => Ok(email),
            None => {
                // A miss is the cheap moment to sweep out everything that
                // has expired, so the table shrinks with expiry instead of
                // growing until the next explicit logout.
                let _ = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= NOW()")
                    .execute(&self.pool)
                    .await;
                Err(PortError::Unauthorized)
            }
        }
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

//=========================================================================================
// `CommentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CommentStore for PgStore {
    async fn list_for_book(&self, book_title: &str) -> PortResult<Vec<Comment>> {
        let records = sqlx::query_as::<_, CommentRecord>(
            "SELECT id, book_title, author_email, author_nickname, text, edited, \
                    created_at, updated_at \
             FROM comments WHERE book_title = $1 ORDER BY created_at ASC",
        )
        .bind(book_title)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unavailable(e.to_string()))?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn get(&self, id: Uuid) -> PortResult<Comment> {
        let record = sqlx::query_as::<_, CommentRecord>(
            "SELECT id, book_title, author_email, author_nickname, text, edited, \
                    created_at, updated_at \
             FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_read_err(e, &format!("comment {id}")))?;
        Ok(record.to_domain())
    }

    async fn create(&self, comment: &Comment) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO comments \
             (id, book_title, author_email, author_nickname, text, edited, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(comment.id)
        .bind(&comment.book_title)
        .bind(&comment.author_email)
        .bind(&comment.author_nickname)
        .bind(&comment.text)
        .bind(comment.edited)
        .bind(comment.created_at)
        .bind(comment.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn update_text(
        &self,
        id: Uuid,
        text: &str,
        updated_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let result = sqlx::query(
            "UPDATE comments SET text = $1, updated_at = $2, edited = TRUE WHERE id = $3",
        )
        .bind(text)
        .bind(updated_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("comment {id}")));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> PortResult<()> {
        // Zero rows affected means someone else already deleted it, which
        // must be tolerated.
        sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

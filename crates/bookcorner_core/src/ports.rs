//! crates/bookcorner_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or the
//! remote catalog sheet.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{AccountCredentials, BookRecord, Comment, Role, UserAccount};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    Conflict(String),
    #[error("Invalid input: {0}")]
    Invalid(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Upstream unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Creates a new account. Fails with `Conflict` when the email or the
    /// nickname is already taken.
    async fn create_account(
        &self,
        email: &str,
        nickname: &str,
        hashed_password: &str,
    ) -> PortResult<UserAccount>;

    async fn get_account(&self, email: &str) -> PortResult<UserAccount>;

    async fn get_credentials(&self, email: &str) -> PortResult<AccountCredentials>;

    /// Owner-only role reassignment.
    async fn set_role(&self, email: &str, role: Role) -> PortResult<()>;

    // --- Auth session methods ---
    async fn create_auth_session(
        &self,
        session_id: &str,
        email: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Returns the email of the session holder when the session exists and
    /// has not expired.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<String>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    /// The thread for one book title, in server-assigned creation order.
    async fn list_for_book(&self, book_title: &str) -> PortResult<Vec<Comment>>;

    async fn get(&self, id: Uuid) -> PortResult<Comment>;

    async fn create(&self, comment: &Comment) -> PortResult<()>;

    /// In-place text overwrite; refreshes the timestamp and sets the edited
    /// flag. No revision history is kept.
    async fn update_text(&self, id: Uuid, text: &str, updated_at: DateTime<Utc>)
        -> PortResult<()>;

    /// Hard delete. Deleting a missing comment is a no-op so that two
    /// moderators racing on the same comment both succeed.
    async fn delete(&self, id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches the full catalog from the upstream sheet. A fetch or parse
    /// failure surfaces as `Unavailable`; the caller decides how to degrade.
    async fn fetch_catalog(&self) -> PortResult<Vec<BookRecord>>;
}

//! crates/bookcorner_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database format; they carry plain
//! serde derives so the API layer can serialize them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The broad category label carried by the catalog sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Fiction,
    Nonfiction,
}

impl Category {
    /// Parses the sheet's free-form category label. Anything that is not
    /// recognizably fiction/nonfiction yields `None`; such a row never
    /// matches a category filter but still matches "All".
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("fiction") {
            Some(Category::Fiction)
        } else if label.eq_ignore_ascii_case("nonfiction")
            || label.eq_ignore_ascii_case("non-fiction")
        {
            Some(Category::Nonfiction)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fiction => "Fiction",
            Category::Nonfiction => "Nonfiction",
        }
    }
}

/// One row of the book catalog, parsed into named fields at the ingestion
/// boundary so nothing downstream ever touches positional columns. The
/// title acts as the natural key for comments and favorites; uniqueness is
/// not enforced upstream. Immutable once loaded, never written back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookRecord {
    pub title: String,
    pub author: String,
    pub interest_level: String,
    /// ATOS readability score, extracted from a semi-structured column.
    /// Always a defined number; 0.0 when the source field does not parse.
    pub atos_level: f64,
    pub quiz_id: String,
    /// Always a defined number; 0 when the source field does not parse.
    pub word_count: u32,
    pub category: Option<Category>,
    pub topic: String,
    pub series: String,
    pub recommender: String,
    pub rationale_en: String,
    pub rationale_zh: String,
}

impl BookRecord {
    /// Concatenation of every field, lowercased, for fuzzy full-row search.
    pub fn searchable_text(&self) -> String {
        let category = self.category.map(|c| c.as_str()).unwrap_or("");
        format!(
            "{} {} {} {} {} {} {} {} {} {} {} {}",
            self.title,
            self.author,
            self.interest_level,
            self.atos_level,
            self.quiz_id,
            self.word_count,
            category,
            self.topic,
            self.series,
            self.recommender,
            self.rationale_en,
            self.rationale_zh,
        )
        .to_lowercase()
    }
}

/// Privilege tiers, ascending. Guest is the absence of an authenticated
/// session and is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    User,
    Admin,
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::User => "user",
            Role::Admin => "admin",
            Role::Owner => "owner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guest" => Some(Role::Guest),
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            "owner" => Some(Role::Owner),
            _ => None,
        }
    }

    /// Admin and owner may moderate any comment.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Owner)
    }
}

// Represents a registered account - used throughout the app.
#[derive(Debug, Clone)]
pub struct UserAccount {
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Only used internally for login - carries the password hash.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    pub email: String,
    pub nickname: String,
    pub role: Role,
    pub hashed_password: String,
}

// Represents a browser login session (auth cookie).
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// The identity a request acts under. Guests carry empty identity fields.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub email: String,
    pub nickname: String,
    pub role: Role,
}

impl Viewer {
    pub fn guest() -> Self {
        Viewer {
            email: String::new(),
            nickname: String::new(),
            role: Role::Guest,
        }
    }
}

/// One persisted comment in a book's thread. Authorship is keyed by email;
/// the nickname is display-only. Edits overwrite in place, no history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: Uuid,
    pub book_title: String,
    pub author_email: String,
    pub author_nickname: String,
    pub text: String,
    pub edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

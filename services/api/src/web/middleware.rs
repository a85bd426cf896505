//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;

use crate::web::state::AppState;
use bookcorner_core::domain::{Role, Viewer};

/// The authenticated identity attached to a request: the viewer plus the
/// auth-session id its scratch state is keyed by.
#[derive(Debug, Clone)]
pub struct AuthedSession {
    pub session_id: String,
    pub viewer: Viewer,
}

/// Pulls the session id out of the `Cookie` header, if present.
pub fn session_cookie(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
}

/// The role a session acts under: the configured owner email outranks the
/// stored role, upward only.
pub fn effective_role(owner_email: Option<&str>, email: &str, stored: Role) -> Role {
    match owner_email {
        Some(owner) if owner == email => Role::Owner,
        _ => stored,
    }
}

/// Resolves a session cookie to a full `Viewer`, applying the configured
/// owner-email promotion on top of the stored role.
async fn resolve_viewer(state: &AppState, session_id: &str) -> Option<AuthedSession> {
    let email = match state.accounts.validate_auth_session(session_id).await {
        Ok(email) => email,
        Err(_) => {
            // The session is gone or expired; its scratch state has no
            // owner left to come back for it.
            state.sessions.remove(session_id).await;
            return None;
        }
    };
    let account = match state.accounts.get_account(&email).await {
        Ok(a) => a,
        Err(e) => {
            error!("Session {session_id} resolved to missing account: {e:?}");
            return None;
        }
    };
    let role = effective_role(
        state.config.owner_email.as_deref(),
        &account.email,
        account.role,
    );
    Some(AuthedSession {
        session_id: session_id.to_string(),
        viewer: Viewer {
            email: account.email,
            nickname: account.nickname,
            role,
        },
    })
}

/// Middleware that validates the auth session cookie and extracts the viewer.
///
/// If valid, inserts an `AuthedSession` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let session_id = session_cookie(req.headers())
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let authed = resolve_viewer(&state, &session_id)
        .await
        .ok_or(StatusCode::UNAUTHORIZED)?;

    req.extensions_mut().insert(authed);
    Ok(next.run(req).await)
}

/// Middleware for read endpoints that guests may hit: a valid cookie yields
/// the real viewer, anything else yields a guest instead of a rejection.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    let authed = match session_cookie(req.headers()).map(str::to_string) {
        Some(session_id) => resolve_viewer(&state, &session_id)
            .await
            .unwrap_or_else(|| AuthedSession {
                session_id: String::new(),
                viewer: Viewer::guest(),
            }),
        None => AuthedSession {
            session_id: String::new(),
            viewer: Viewer::guest(),
        },
    };
    req.extensions_mut().insert(authed);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::web::state::{AppState, CatalogCache, SessionRegistry};
    use async_trait::async_trait;
    use bookcorner_core::domain::{AccountCredentials, BookRecord, Comment, UserAccount};
    use bookcorner_core::ports::{
        AccountStore, CatalogSource, CommentStore, PortError, PortResult,
    };
    use chrono::{DateTime, Utc};
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    /// Rejects every session, like a store whose rows have all expired.
    struct ExpiredSessions;

    #[async_trait]
    impl AccountStore for ExpiredSessions {
        async fn create_account(
            &self,
            _email: &str,
            _nickname: &str,
            _hashed_password: &str,
        ) -> PortResult<UserAccount> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn get_account(&self, email: &str) -> PortResult<UserAccount> {
            Err(PortError::NotFound(email.to_string()))
        }
        async fn get_credentials(&self, email: &str) -> PortResult<AccountCredentials> {
            Err(PortError::NotFound(email.to_string()))
        }
        async fn set_role(
            &self,
            _email: &str,
            _role: bookcorner_core::domain::Role,
        ) -> PortResult<()> {
            Err(PortError::Unexpected("not under test".to_string()))
        }
        async fn create_auth_session(
            &self,
            _session_id: &str,
            _email: &str,
            _expires_at: DateTime<Utc>,
        ) -> PortResult<()> {
            Ok(())
        }
        async fn validate_auth_session(&self, _session_id: &str) -> PortResult<String> {
            Err(PortError::Unauthorized)
        }
        async fn delete_auth_session(&self, _session_id: &str) -> PortResult<()> {
            Ok(())
        }
    }

    struct NoComments;

    #[async_trait]
    impl CommentStore for NoComments {
        async fn list_for_book(&self, _book_title: &str) -> PortResult<Vec<Comment>> {
            Ok(Vec::new())
        }
        async fn get(&self, id: Uuid) -> PortResult<Comment> {
            Err(PortError::NotFound(format!("comment {id}")))
        }
        async fn create(&self, _comment: &Comment) -> PortResult<()> {
            Ok(())
        }
        async fn update_text(
            &self,
            _id: Uuid,
            _text: &str,
            _updated_at: DateTime<Utc>,
        ) -> PortResult<()> {
            Ok(())
        }
        async fn delete(&self, _id: Uuid) -> PortResult<()> {
            Ok(())
        }
    }

    struct EmptySheet;

    #[async_trait]
    impl CatalogSource for EmptySheet {
        async fn fetch_catalog(&self) -> PortResult<Vec<BookRecord>> {
            Ok(Vec::new())
        }
    }

    fn test_state() -> Arc<AppState> {
        let config = Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            sheet_url: String::new(),
            sheet_ttl: Duration::from_secs(600),
            owner_email: None,
            cors_origin: "http://localhost:3000".to_string(),
        };
        Arc::new(AppState {
            accounts: Arc::new(ExpiredSessions),
            comments: Arc::new(NoComments),
            config: Arc::new(config),
            catalog: Arc::new(CatalogCache::new(
                Arc::new(EmptySheet),
                Duration::from_secs(600),
            )),
            sessions: Arc::new(SessionRegistry::default()),
        })
    }

    #[tokio::test]
    async fn rejected_session_drops_its_scratch_state() {
        let state = test_state();
        state
            .sessions
            .with("stale-session", |s| {
                s.favorites.insert("The Mitten".to_string());
            })
            .await;

        assert!(resolve_viewer(&state, "stale-session").await.is_none());

        // The favorites the dead session accumulated are gone, not leaked.
        let leftover = state
            .sessions
            .with("stale-session", |s| s.favorites.len())
            .await;
        assert_eq!(leftover, 0);
    }

    #[test]
    fn owner_email_promotes_upward_only() {
        assert_eq!(
            effective_role(Some("boss@example.com"), "boss@example.com", Role::User),
            Role::Owner
        );
        assert_eq!(
            effective_role(Some("boss@example.com"), "alice@example.com", Role::Admin),
            Role::Admin
        );
        assert_eq!(effective_role(None, "alice@example.com", Role::User), Role::User);
    }
}

//! services/api/src/web/state.rs
//!
//! Defines the application's shared and session-specific states.

use crate::config::Config;
use bookcorner_core::compose::ComposeState;
use bookcorner_core::domain::BookRecord;
use bookcorner_core::ports::{AccountStore, CatalogSource, CommentStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub comments: Arc<dyn CommentStore>,
    pub config: Arc<Config>,
    pub catalog: Arc<CatalogCache>,
    pub sessions: Arc<SessionRegistry>,
}

//=========================================================================================
// CatalogCache (TTL-refreshed snapshot of the remote sheet)
//=========================================================================================

struct CatalogSnapshot {
    fetched_at: Instant,
    books: Arc<Vec<BookRecord>>,
}

/// Holds the most recent catalog snapshot and refreshes it lazily once the
/// TTL has elapsed. A failed refresh degrades softly: the stale snapshot is
/// served if one exists, an empty catalog otherwise. Reads never fail.
pub struct CatalogCache {
    source: Arc<dyn CatalogSource>,
    ttl: Duration,
    snapshot: RwLock<Option<CatalogSnapshot>>,
}

impl CatalogCache {
    pub fn new(source: Arc<dyn CatalogSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    /// The current book set, fetching from upstream when the cache is cold
    /// or expired.
    pub async fn books(&self) -> Arc<Vec<BookRecord>> {
        {
            let guard = self.snapshot.read().await;
            if let Some(snap) = guard.as_ref() {
                if snap.fetched_at.elapsed() < self.ttl {
                    return Arc::clone(&snap.books);
                }
            }
        }

        let mut guard = self.snapshot.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(snap) = guard.as_ref() {
            if snap.fetched_at.elapsed() < self.ttl {
                return Arc::clone(&snap.books);
            }
        }

        match self.source.fetch_catalog().await {
            Ok(books) => {
                let books = Arc::new(books);
                *guard = Some(CatalogSnapshot {
                    fetched_at: Instant::now(),
                    books: Arc::clone(&books),
                });
                books
            }
            Err(e) => match guard.as_ref() {
                Some(stale) => {
                    warn!("catalog refresh failed, serving stale snapshot: {e}");
                    Arc::clone(&stale.books)
                }
                None => {
                    warn!("catalog fetch failed with no snapshot to fall back to: {e}");
                    Arc::new(Vec::new())
                }
            },
        }
    }
}

//=========================================================================================
// SessionRegistry (Ephemeral Per-Session Scratch State)
//=========================================================================================

/// What one logged-in session carries between requests: the favorites set
/// and the compose-area state. Never persisted; dropped at logout.
#[derive(Default)]
pub struct SessionScratch {
    pub favorites: HashSet<String>,
    pub compose: ComposeState,
}

/// In-memory map from auth-session id to its scratch state. Each session
/// only ever sees its own entry, so sessions stay isolated.
#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<HashMap<String, SessionScratch>>,
}

impl SessionRegistry {
    /// Runs `f` against the session's scratch state, creating a default
    /// entry on first touch.
    pub async fn with<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut SessionScratch) -> T,
    ) -> T {
        let mut map = self.inner.write().await;
        let scratch = map.entry(session_id.to_string()).or_default();
        f(scratch)
    }

    /// Drops everything the session accumulated. Called at logout.
    pub async fn remove(&self, session_id: &str) {
        self.inner.write().await.remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bookcorner_core::ports::{PortError, PortResult};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakySource {
        calls: AtomicU32,
        fail_from: u32,
    }

    #[async_trait]
    impl CatalogSource for FlakySource {
        async fn fetch_catalog(&self) -> PortResult<Vec<BookRecord>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n >= self.fail_from {
                return Err(PortError::Unavailable("sheet down".to_string()));
            }
            Ok(vec![BookRecord {
                title: format!("book-{n}"),
                author: String::new(),
                interest_level: String::new(),
                atos_level: 0.0,
                quiz_id: String::new(),
                word_count: 0,
                category: None,
                topic: String::new(),
                series: String::new(),
                recommender: String::new(),
                rationale_en: String::new(),
                rationale_zh: String::new(),
            }])
        }
    }

    #[tokio::test]
    async fn fresh_snapshot_is_reused_within_ttl() {
        let source = Arc::new(FlakySource {
            calls: AtomicU32::new(0),
            fail_from: 1,
        });
        let cache = CatalogCache::new(source.clone(), Duration::from_secs(600));
        let first = cache.books().await;
        let second = cache.books().await;
        assert_eq!(first[0].title, "book-0");
        assert_eq!(second[0].title, "book-0");
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_refresh_serves_stale_snapshot() {
        let source = Arc::new(FlakySource {
            calls: AtomicU32::new(0),
            fail_from: 1,
        });
        let cache = CatalogCache::new(source, Duration::from_secs(0));
        let first = cache.books().await;
        assert_eq!(first.len(), 1);
        // TTL of zero forces a refresh, which now fails.
        let second = cache.books().await;
        assert_eq!(second[0].title, "book-0");
    }

    #[tokio::test]
    async fn cold_cache_with_dead_upstream_degrades_to_empty() {
        let source = Arc::new(FlakySource {
            calls: AtomicU32::new(0),
            fail_from: 0,
        });
        let cache = CatalogCache::new(source, Duration::from_secs(600));
        assert!(cache.books().await.is_empty());
    }

    #[tokio::test]
    async fn session_scratch_is_isolated_and_removable() {
        let registry = SessionRegistry::default();
        registry
            .with("sess-a", |s| {
                s.favorites.insert("The Mitten".to_string());
            })
            .await;
        let a_count = registry.with("sess-a", |s| s.favorites.len()).await;
        let b_count = registry.with("sess-b", |s| s.favorites.len()).await;
        assert_eq!(a_count, 1);
        assert_eq!(b_count, 0);

        registry.remove("sess-a").await;
        let after = registry.with("sess-a", |s| s.favorites.len()).await;
        assert_eq!(after, 0);
    }
}

//! crates/bookcorner_core/src/workflow.rs
//!
//! The comment thread operations. Every mutation re-checks the permission
//! predicate here, against the store, before anything is written; what a
//! client chose to render is irrelevant.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Comment, Viewer};
use crate::permissions::{can_delete, can_edit, can_post};
use crate::ports::{CommentStore, PortError, PortResult};

/// Publishes a new comment under the viewer's identity. Rejects guests and
/// blank text; nothing is persisted on rejection.
pub async fn post_comment(
    store: &dyn CommentStore,
    viewer: &Viewer,
    book_title: &str,
    text: &str,
) -> PortResult<Comment> {
    if !can_post(viewer) {
        return Err(PortError::Unauthorized);
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(PortError::Invalid("comment text must not be empty".to_string()));
    }
    let now = Utc::now();
    let comment = Comment {
        id: Uuid::new_v4(),
        book_title: book_title.to_string(),
        author_email: viewer.email.clone(),
        author_nickname: viewer.nickname.clone(),
        text: text.to_string(),
        edited: false,
        created_at: now,
        updated_at: now,
    };
    store.create(&comment).await?;
    Ok(comment)
}

/// Loads a comment for editing. Returns the current text so the caller can
/// pre-fill its buffer; nothing is written.
pub async fn begin_edit(
    store: &dyn CommentStore,
    viewer: &Viewer,
    comment_id: Uuid,
) -> PortResult<Comment> {
    let comment = store.get(comment_id).await?;
    if !can_edit(viewer, &comment) {
        return Err(PortError::Unauthorized);
    }
    Ok(comment)
}

/// Persists an in-place edit: new text, refreshed timestamp, edited flag.
/// Last write wins under concurrent saves; there is no version counter.
pub async fn save_edit(
    store: &dyn CommentStore,
    viewer: &Viewer,
    comment_id: Uuid,
    text: &str,
) -> PortResult<Comment> {
    let comment = store.get(comment_id).await?;
    if !can_edit(viewer, &comment) {
        return Err(PortError::Unauthorized);
    }
    let text = text.trim();
    if text.is_empty() {
        return Err(PortError::Invalid("comment text must not be empty".to_string()));
    }
    let updated_at = Utc::now();
    store.update_text(comment_id, text, updated_at).await?;
    Ok(Comment {
        text: text.to_string(),
        edited: true,
        updated_at,
        ..comment
    })
}

/// Hard delete. A comment that is already gone counts as success so that
/// two moderators racing on the same delete both come back clean.
pub async fn delete_comment(
    store: &dyn CommentStore,
    viewer: &Viewer,
    comment_id: Uuid,
) -> PortResult<()> {
    let comment = match store.get(comment_id).await {
        Ok(c) => c,
        Err(PortError::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e),
    };
    if !can_delete(viewer, &comment) {
        return Err(PortError::Unauthorized);
    }
    store.delete(comment_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// A store over a plain Vec, good enough to exercise the workflow.
    #[derive(Default)]
    struct MemoryCommentStore {
        comments: Mutex<Vec<Comment>>,
    }

    #[async_trait]
    impl CommentStore for MemoryCommentStore {
        async fn list_for_book(&self, book_title: &str) -> PortResult<Vec<Comment>> {
            let comments = self.comments.lock().unwrap();
            Ok(comments
                .iter()
                .filter(|c| c.book_title == book_title)
                .cloned()
                .collect())
        }

        async fn get(&self, id: Uuid) -> PortResult<Comment> {
            let comments = self.comments.lock().unwrap();
            comments
                .iter()
                .find(|c| c.id == id)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("comment {id}")))
        }

        async fn create(&self, comment: &Comment) -> PortResult<()> {
            self.comments.lock().unwrap().push(comment.clone());
            Ok(())
        }

        async fn update_text(
            &self,
            id: Uuid,
            text: &str,
            updated_at: DateTime<Utc>,
        ) -> PortResult<()> {
            let mut comments = self.comments.lock().unwrap();
            let comment = comments
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| PortError::NotFound(format!("comment {id}")))?;
            comment.text = text.to_string();
            comment.updated_at = updated_at;
            comment.edited = true;
            Ok(())
        }

        async fn delete(&self, id: Uuid) -> PortResult<()> {
            self.comments.lock().unwrap().retain(|c| c.id != id);
            Ok(())
        }
    }

    fn viewer(email: &str, nickname: &str, role: Role) -> Viewer {
        Viewer {
            email: email.to_string(),
            nickname: nickname.to_string(),
            role,
        }
    }

    #[tokio::test]
    async fn guest_never_creates_a_comment() {
        let store = MemoryCommentStore::default();
        let result = post_comment(&store, &Viewer::guest(), "The Mitten", "hi").await;
        assert!(matches!(result, Err(PortError::Unauthorized)));
        assert!(store.list_for_book("The Mitten").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_rejected_without_persisting() {
        let store = MemoryCommentStore::default();
        let alice = viewer("alice@example.com", "Alice", Role::User);
        let result = post_comment(&store, &alice, "The Mitten", "   ").await;
        assert!(matches!(result, Err(PortError::Invalid(_))));
        assert!(store.list_for_book("The Mitten").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn post_records_viewer_identity() {
        let store = MemoryCommentStore::default();
        let alice = viewer("alice@example.com", "Alice", Role::User);
        let posted = post_comment(&store, &alice, "The Mitten", "  cozy story  ")
            .await
            .unwrap();
        assert_eq!(posted.author_email, "alice@example.com");
        assert_eq!(posted.author_nickname, "Alice");
        assert_eq!(posted.text, "cozy story");
        assert!(!posted.edited);
        assert_eq!(store.list_for_book("The Mitten").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn edit_then_save_updates_exactly_one_record() {
        let store = MemoryCommentStore::default();
        let alice = viewer("alice@example.com", "Alice", Role::User);
        let posted = post_comment(&store, &alice, "The Mitten", "first draft")
            .await
            .unwrap();

        let loaded = begin_edit(&store, &alice, posted.id).await.unwrap();
        assert_eq!(loaded.text, "first draft");

        let saved = save_edit(&store, &alice, posted.id, "final version")
            .await
            .unwrap();
        assert_eq!(saved.text, "final version");
        assert!(saved.edited);
        assert!(saved.updated_at >= posted.updated_at);

        let thread = store.list_for_book("The Mitten").await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].text, "final version");
    }

    #[tokio::test]
    async fn edit_then_cancel_leaves_store_untouched() {
        let store = MemoryCommentStore::default();
        let alice = viewer("alice@example.com", "Alice", Role::User);
        let posted = post_comment(&store, &alice, "The Mitten", "keep me")
            .await
            .unwrap();

        // A cancelled edit is just a begin_edit with no save: the buffer
        // lives in session state and nothing reaches the store.
        let _ = begin_edit(&store, &alice, posted.id).await.unwrap();

        let thread = store.list_for_book("The Mitten").await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].text, "keep me");
        assert_eq!(thread[0].updated_at, posted.updated_at);
        assert!(!thread[0].edited);
    }

    #[tokio::test]
    async fn foreign_user_cannot_save_or_delete() {
        let store = MemoryCommentStore::default();
        let alice = viewer("alice@example.com", "Alice", Role::User);
        let bob = viewer("bob@example.com", "Bob", Role::User);
        let posted = post_comment(&store, &alice, "The Mitten", "mine").await.unwrap();

        assert!(matches!(
            save_edit(&store, &bob, posted.id, "hijacked").await,
            Err(PortError::Unauthorized)
        ));
        assert!(matches!(
            delete_comment(&store, &bob, posted.id).await,
            Err(PortError::Unauthorized)
        ));
        assert_eq!(store.get(posted.id).await.unwrap().text, "mine");
    }

    #[tokio::test]
    async fn admin_delete_leaves_sibling_comment_intact() {
        let store = MemoryCommentStore::default();
        let alice = viewer("alice@example.com", "Alice", Role::User);
        let first = post_comment(&store, &alice, "The Mitten", "first").await.unwrap();
        let second = post_comment(&store, &alice, "The Mitten", "second").await.unwrap();

        let admin = viewer("admin@example.com", "Admin", Role::Admin);
        delete_comment(&store, &admin, first.id).await.unwrap();

        let thread = store.list_for_book("The Mitten").await.unwrap();
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].id, second.id);
        assert_eq!(thread[0].text, "second");
    }

    #[tokio::test]
    async fn double_delete_is_a_no_op() {
        let store = MemoryCommentStore::default();
        let admin = viewer("admin@example.com", "Admin", Role::Admin);
        let alice = viewer("alice@example.com", "Alice", Role::User);
        let posted = post_comment(&store, &alice, "The Mitten", "gone soon").await.unwrap();

        delete_comment(&store, &admin, posted.id).await.unwrap();
        // Second moderator racing on the same comment.
        delete_comment(&store, &admin, posted.id).await.unwrap();
    }
}

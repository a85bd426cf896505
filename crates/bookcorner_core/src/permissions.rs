//! crates/bookcorner_core/src/permissions.rs
//!
//! The role/authorship permission predicates. These are evaluated at the
//! point of mutation by the service layer, not merely to decide what a UI
//! renders.

use crate::domain::{Comment, Role, Viewer};

/// Guests may read but never post.
pub fn can_post(viewer: &Viewer) -> bool {
    viewer.role != Role::Guest
}

/// Staff may edit anything; a regular user only their own comments,
/// matched on the stable email identity.
pub fn can_edit(viewer: &Viewer, comment: &Comment) -> bool {
    viewer.role.is_staff()
        || (viewer.role == Role::User && viewer.email == comment.author_email)
}

/// Deletion follows the same rule as editing.
pub fn can_delete(viewer: &Viewer, comment: &Comment) -> bool {
    can_edit(viewer, comment)
}

/// Only the owner may reassign account roles, and never to/from owner or guest.
pub fn can_assign_role(viewer: &Viewer, new_role: Role) -> bool {
    viewer.role == Role::Owner && matches!(new_role, Role::User | Role::Admin)
}

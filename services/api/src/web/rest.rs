//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the catalog REST endpoints and the master
//! definition for the OpenAPI specification.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use crate::web::comments::{
    CommentDto, EditBufferResponse, PostCommentRequest, SaveCommentRequest,
};
use crate::web::middleware::AuthedSession;
use crate::web::state::AppState;
use bookcorner_core::catalog::{distinct_interest_levels, pick_random, BookFilter};
use bookcorner_core::domain::{BookRecord, Role, Viewer};
use bookcorner_core::permissions::can_assign_role;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
        list_books_handler,
        get_book_handler,
        random_book_handler,
        list_levels_handler,
        crate::web::comments::list_comments_handler,
        crate::web::comments::post_comment_handler,
        crate::web::comments::begin_edit_handler,
        crate::web::comments::save_comment_handler,
        crate::web::comments::cancel_edit_handler,
        crate::web::comments::delete_comment_handler,
        list_favorites_handler,
        add_favorite_handler,
        remove_favorite_handler,
        set_role_handler,
    ),
    components(
        schemas(
            crate::web::auth::SignupRequest,
            crate::web::auth::LoginRequest,
            crate::web::auth::AuthResponse,
            BookDto,
            CommentDto,
            PostCommentRequest,
            SaveCommentRequest,
            EditBufferResponse,
            SetRoleRequest,
        )
    ),
    tags(
        (name = "Book Corner API", description = "Catalog browsing, blind box picks, and per-book comment threads.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One catalog record as served to clients.
#[derive(Serialize, ToSchema)]
pub struct BookDto {
    pub title: String,
    pub author: String,
    pub interest_level: String,
    pub atos_level: f64,
    pub quiz_id: String,
    pub word_count: u32,
    pub category: Option<String>,
    pub topic: String,
    pub series: String,
    pub recommender: String,
    pub rationale_en: String,
    pub rationale_zh: String,
}

impl From<&BookRecord> for BookDto {
    fn from(b: &BookRecord) -> Self {
        BookDto {
            title: b.title.clone(),
            author: b.author.clone(),
            interest_level: b.interest_level.clone(),
            atos_level: b.atos_level,
            quiz_id: b.quiz_id.clone(),
            word_count: b.word_count,
            category: b.category.map(|c| c.as_str().to_string()),
            topic: b.topic.clone(),
            series: b.series.clone(),
            recommender: b.recommender.clone(),
            rationale_en: b.rationale_en.clone(),
            rationale_zh: b.rationale_zh.clone(),
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: String,
}

//=========================================================================================
// Catalog Handlers
//=========================================================================================

/// List the catalog, narrowed by any combination of filter dimensions.
///
/// All filter parameters are optional; with none given this returns the
/// full catalog in sheet order.
#[utoipa::path(
    get,
    path = "/books",
    params(
        ("fuzzy" = Option<String>, Query, description = "Substring over every field of a row"),
        ("title" = Option<String>, Query, description = "Title substring"),
        ("author" = Option<String>, Query, description = "Author substring"),
        ("topic" = Option<String>, Query, description = "Topic substring"),
        ("series" = Option<String>, Query, description = "Series substring"),
        ("quiz_id" = Option<String>, Query, description = "Quiz id substring"),
        ("category" = Option<String>, Query, description = "All, Fiction or Nonfiction"),
        ("interest_level" = Option<String>, Query, description = "Exact interest level, ALL passes everything"),
        ("atos_min" = Option<f64>, Query, description = "Inclusive lower ATOS bound"),
        ("atos_max" = Option<f64>, Query, description = "Inclusive upper ATOS bound"),
        ("min_words" = Option<u32>, Query, description = "Inclusive word-count floor"),
    ),
    responses(
        (status = 200, description = "Matching records in original sheet order", body = [BookDto])
    )
)]
pub async fn list_books_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BookFilter>,
) -> Json<Vec<BookDto>> {
    let books = state.catalog.books().await;
    Json(filter.apply(&books).into_iter().map(BookDto::from).collect())
}

/// Fetch one record by its title key.
#[utoipa::path(
    get,
    path = "/books/{title}",
    params(("title" = String, Path, description = "Exact book title")),
    responses(
        (status = 200, description = "The record", body = BookDto),
        (status = 404, description = "No such title")
    )
)]
pub async fn get_book_handler(
    State(state): State<Arc<AppState>>,
    Path(title): Path<String>,
) -> Result<Json<BookDto>, (StatusCode, String)> {
    let books = state.catalog.books().await;
    books
        .iter()
        .find(|b| b.title == title)
        .map(|b| Json(BookDto::from(b)))
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("No book titled '{title}'")))
}

/// The blind box: one uniformly sampled record.
///
/// Accepts the same filter parameters as /books and samples from the
/// matching subset; an empty match falls back to the whole catalog. Calling
/// again re-rolls.
#[utoipa::path(
    get,
    path = "/books/random",
    params(
        ("fuzzy" = Option<String>, Query, description = "Substring over every field of a row"),
        ("title" = Option<String>, Query, description = "Title substring"),
        ("author" = Option<String>, Query, description = "Author substring"),
        ("topic" = Option<String>, Query, description = "Topic substring"),
        ("series" = Option<String>, Query, description = "Series substring"),
        ("quiz_id" = Option<String>, Query, description = "Quiz id substring"),
        ("category" = Option<String>, Query, description = "All, Fiction or Nonfiction"),
        ("interest_level" = Option<String>, Query, description = "Exact interest level, ALL passes everything"),
        ("atos_min" = Option<f64>, Query, description = "Inclusive lower ATOS bound"),
        ("atos_max" = Option<f64>, Query, description = "Inclusive upper ATOS bound"),
        ("min_words" = Option<u32>, Query, description = "Inclusive word-count floor"),
    ),
    responses(
        (status = 200, description = "One uniformly sampled record", body = BookDto),
        (status = 404, description = "The catalog is empty")
    )
)]
pub async fn random_book_handler(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<BookFilter>,
) -> Result<Json<BookDto>, (StatusCode, String)> {
    let books = state.catalog.books().await;
    let mut rng = rand::thread_rng();
    pick_random(&books, &filter, &mut rng)
        .map(|b| Json(BookDto::from(b)))
        .ok_or_else(|| (StatusCode::NOT_FOUND, "The catalog is empty".to_string()))
}

/// Distinct interest-level labels present in the catalog.
#[utoipa::path(
    get,
    path = "/books/levels",
    responses(
        (status = 200, description = "Labels in first-seen order", body = [String])
    )
)]
pub async fn list_levels_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let books = state.catalog.books().await;
    Json(distinct_interest_levels(&books))
}

//=========================================================================================
// Favorites Handlers (per-session, never persisted)
//=========================================================================================

/// The session's favorited titles.
#[utoipa::path(
    get,
    path = "/favorites",
    responses((status = 200, description = "Favorited titles", body = [String]))
)]
pub async fn list_favorites_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
) -> Json<Vec<String>> {
    let favorites = state
        .sessions
        .with(&authed.session_id, |s| {
            let mut titles: Vec<String> = s.favorites.iter().cloned().collect();
            titles.sort();
            titles
        })
        .await;
    Json(favorites)
}

/// Add a title to the session's favorites.
#[utoipa::path(
    put,
    path = "/favorites/{title}",
    params(("title" = String, Path, description = "Exact book title")),
    responses(
        (status = 204, description = "Favorited"),
        (status = 404, description = "No such title in the catalog")
    )
)]
pub async fn add_favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(title): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let books = state.catalog.books().await;
    if !books.iter().any(|b| b.title == title) {
        return Err((StatusCode::NOT_FOUND, format!("No book titled '{title}'")));
    }
    state
        .sessions
        .with(&authed.session_id, |s| {
            s.favorites.insert(title);
        })
        .await;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove a title from the session's favorites. Removing a title that was
/// never favorited succeeds.
#[utoipa::path(
    delete,
    path = "/favorites/{title}",
    params(("title" = String, Path, description = "Exact book title")),
    responses((status = 204, description = "No longer favorited"))
)]
pub async fn remove_favorite_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(title): Path<String>,
) -> StatusCode {
    state
        .sessions
        .with(&authed.session_id, |s| {
            s.favorites.remove(&title);
        })
        .await;
    StatusCode::NO_CONTENT
}

//=========================================================================================
// Account Role Management (owner only)
//=========================================================================================

/// Resolves a role-change request into an assignable role: non-owners get
/// 403, everything the owner still may not hand out (owner, guest, typos)
/// gets 422.
fn authorize_role_change(
    viewer: &Viewer,
    requested: &str,
) -> Result<Role, (StatusCode, String)> {
    if viewer.role != Role::Owner {
        return Err((
            StatusCode::FORBIDDEN,
            "Only the owner may assign roles".to_string(),
        ));
    }
    let role = Role::parse(requested).ok_or((
        StatusCode::UNPROCESSABLE_ENTITY,
        format!("'{requested}' is not a role"),
    ))?;
    if !can_assign_role(viewer, role) {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("The {} role is not assignable", role.as_str()),
        ));
    }
    Ok(role)
}

/// Reassign an account's role. Owner only; owner and guest are not
/// assignable.
#[utoipa::path(
    put,
    path = "/accounts/{email}/role",
    params(("email" = String, Path, description = "Account email")),
    request_body = SetRoleRequest,
    responses(
        (status = 204, description = "Role updated"),
        (status = 403, description = "Viewer is not the owner"),
        (status = 404, description = "No such account"),
        (status = 422, description = "Role not assignable")
    )
)]
pub async fn set_role_handler(
    State(state): State<Arc<AppState>>,
    Extension(authed): Extension<AuthedSession>,
    Path(email): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let role = authorize_role_change(&authed.viewer, &req.role)?;
    state
        .accounts
        .set_role(&email, role)
        .await
        .map_err(|e| match e {
            bookcorner_core::ports::PortError::NotFound(what) => {
                (StatusCode::NOT_FOUND, what)
            }
            other => {
                error!("Failed to set role: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to set role".to_string(),
                )
            }
        })?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewer(role: Role) -> Viewer {
        Viewer {
            email: "someone@example.com".to_string(),
            nickname: "someone".to_string(),
            role,
        }
    }

    #[test]
    fn non_owner_gets_forbidden_regardless_of_requested_role() {
        for role in ["user", "admin", "owner", "nonsense"] {
            let (status, _) = authorize_role_change(&viewer(Role::Admin), role).unwrap_err();
            assert_eq!(status, StatusCode::FORBIDDEN);
        }
    }

    #[test]
    fn owner_requesting_unassignable_role_gets_unprocessable() {
        for role in ["owner", "guest", "nonsense"] {
            let (status, _) = authorize_role_change(&viewer(Role::Owner), role).unwrap_err();
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn owner_may_assign_user_and_admin() {
        assert_eq!(
            authorize_role_change(&viewer(Role::Owner), "user").unwrap(),
            Role::User
        );
        assert_eq!(
            authorize_role_change(&viewer(Role::Owner), "admin").unwrap(),
            Role::Admin
        );
    }
}

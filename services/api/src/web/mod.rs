pub mod auth;
pub mod comments;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export what the binary needs to build the router.
pub use middleware::{optional_auth, require_auth};
pub use rest::{
    add_favorite_handler, get_book_handler, list_books_handler, list_favorites_handler,
    list_levels_handler, random_book_handler, remove_favorite_handler, set_role_handler,
};

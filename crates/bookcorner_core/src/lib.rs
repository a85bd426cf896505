pub mod catalog;
pub mod compose;
pub mod domain;
pub mod permissions;
pub mod ports;
pub mod workflow;

pub use catalog::{distinct_interest_levels, pick_random, BookFilter, CategoryFilter};
pub use compose::ComposeState;
pub use domain::{
    AccountCredentials, AuthSession, BookRecord, Category, Comment, Role, UserAccount, Viewer,
};
pub use ports::{AccountStore, CatalogSource, CommentStore, PortError, PortResult};

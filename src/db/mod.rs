//! Database module for the board server
//!
//! Domain rows, the storage ports the services depend on, and the
//! Postgres and in-memory backends.

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

pub use memory::MemoryStore;
pub use models::{
    Article, ArticleCursor, ArticleTimestamp, BlacklistEntry, Board, NewArticle, NewUser, User,
};
pub use operations::{DbOperations, DbPoolStatus};
pub use store::{ArticleStore, BlacklistStore, BoardStore, UserStore};

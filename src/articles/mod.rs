//! Board articles: writing, editing and soft-deleting under the author
//! ownership and cooldown rules, plus cursor-paginated listing.

pub mod handlers;
pub mod service;

pub use service::{ArticleService, EditArticleRequest, WriteArticleRequest, PAGE_SIZE};

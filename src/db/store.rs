//! Storage ports. The services only ever talk to these traits; the
//! Postgres and in-memory backends both implement all four.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::db::models::{
    Article, ArticleCursor, ArticleTimestamp, BlacklistEntry, Board, NewArticle, NewUser, User,
};
use crate::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `DatabaseError::Duplicate` when the username is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn list_users(&self) -> Result<Vec<User>>;
    /// Whether a row was removed. The user's articles stay behind.
    async fn delete_user(&self, id: i64) -> Result<bool>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BoardStore: Send + Sync {
    async fn create_board(&self, title: &str, description: Option<String>) -> Result<Board>;
    async fn find_board(&self, id: i64) -> Result<Option<Board>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn insert_article(&self, article: NewArticle) -> Result<Article>;
    async fn find_article(&self, id: i64) -> Result<Option<Article>>;
    /// Persists title, content, `is_deleted` and `updated_at`.
    async fn update_article(&self, article: &Article) -> Result<Article>;
    /// Newest article by `username`'s author row, ordered by `field`.
    /// Rows where `field` is unset are ignored. Soft-deleted rows count.
    async fn latest_by_author(
        &self,
        username: &str,
        field: ArticleTimestamp,
    ) -> Result<Option<Article>>;
    /// Non-deleted articles of a board, newest first.
    async fn list_by_board(
        &self,
        board_id: i64,
        cursor: ArticleCursor,
        limit: i64,
    ) -> Result<Vec<Article>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Appends a revocation row. Repeated calls append repeated rows.
    async fn revoke(
        &self,
        token: &str,
        expiration_time: DateTime<Utc>,
        username: &str,
    ) -> Result<BlacklistEntry>;
    /// The row with the greatest `expiration_time` for `username`.
    async fn latest_for(&self, username: &str) -> Result<Option<BlacklistEntry>>;
}

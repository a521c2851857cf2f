use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Input for `UserStore::create_user`; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Board {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A piece of board content. `author_id` and `board_id` are plain values:
/// the schema carries no foreign keys, so every write path checks that the
/// referenced rows exist.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: i64,
    pub author_id: i64,
    #[serde(skip_serializing)]
    pub board_id: i64,
    pub title: String,
    pub content: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    /// `None` until the first edit.
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub author_id: i64,
    pub board_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Which article timestamp a "latest by author" lookup orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleTimestamp {
    CreatedAt,
    UpdatedAt,
}

impl ArticleTimestamp {
    pub fn column(self) -> &'static str {
        match self {
            ArticleTimestamp::CreatedAt => "created_at",
            ArticleTimestamp::UpdatedAt => "updated_at",
        }
    }

    pub fn of(self, article: &Article) -> Option<DateTime<Utc>> {
        match self {
            ArticleTimestamp::CreatedAt => Some(article.created_at),
            ArticleTimestamp::UpdatedAt => article.updated_at,
        }
    }
}

/// Position for board listings. Pages are always newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleCursor {
    Latest,
    /// Articles with an id strictly below the given one.
    OlderThan(i64),
    /// Articles with an id strictly above the given one.
    NewerThan(i64),
}

/// One logout-all event. Append-only; the row with the greatest
/// `expiration_time` for a username is the authoritative one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlacklistEntry {
    pub id: i64,
    #[serde(skip_serializing)]
    pub token: String,
    pub username: String,
    pub expiration_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

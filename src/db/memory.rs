//! In-process backend for every storage port. Holds its tables behind a
//! single `RwLock`; each call is atomic with respect to the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::clock::Clock;
use crate::db::models::{
    Article, ArticleCursor, ArticleTimestamp, BlacklistEntry, Board, NewArticle, NewUser, User,
};
use crate::db::store::{ArticleStore, BlacklistStore, BoardStore, UserStore};
use crate::error::{AppError, DatabaseError};
use crate::Result;

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    boards: BTreeMap<i64, Board>,
    articles: BTreeMap<i64, Article>,
    blacklist: Vec<BlacklistEntry>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct MemoryStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
        }
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::DatabaseError(DatabaseError::Duplicate));
        }
        let id = tables.next_id();
        let user = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created_at: self.clock.now(),
        };
        tables.users.insert(id, user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().cloned().collect())
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.users.remove(&id).is_some())
    }
}

#[async_trait]
impl BoardStore for MemoryStore {
    async fn create_board(&self, title: &str, description: Option<String>) -> Result<Board> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let board = Board {
            id,
            title: title.to_string(),
            description,
            created_at: self.clock.now(),
        };
        tables.boards.insert(id, board.clone());
        Ok(board)
    }

    async fn find_board(&self, id: i64) -> Result<Option<Board>> {
        let tables = self.tables.read().await;
        Ok(tables.boards.get(&id).cloned())
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let article = Article {
            id,
            author_id: article.author_id,
            board_id: article.board_id,
            title: article.title,
            content: article.content,
            is_deleted: false,
            created_at: article.created_at,
            updated_at: None,
        };
        tables.articles.insert(id, article.clone());
        Ok(article)
    }

    async fn find_article(&self, id: i64) -> Result<Option<Article>> {
        let tables = self.tables.read().await;
        Ok(tables.articles.get(&id).cloned())
    }

    async fn update_article(&self, article: &Article) -> Result<Article> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .articles
            .get_mut(&article.id)
            .ok_or(AppError::DatabaseError(DatabaseError::NotFound))?;
        stored.title = article.title.clone();
        stored.content = article.content.clone();
        stored.is_deleted = article.is_deleted;
        stored.updated_at = article.updated_at;
        Ok(stored.clone())
    }

    async fn latest_by_author(
        &self,
        username: &str,
        field: ArticleTimestamp,
    ) -> Result<Option<Article>> {
        let tables = self.tables.read().await;
        let author_id = match tables.users.values().find(|u| u.username == username) {
            Some(user) => user.id,
            None => return Ok(None),
        };
        Ok(tables
            .articles
            .values()
            .filter(|a| a.author_id == author_id)
            .filter_map(|a| field.of(a).map(|ts| (ts, a)))
            .max_by_key(|(ts, a)| (*ts, a.id))
            .map(|(_, a)| a.clone()))
    }

    async fn list_by_board(
        &self,
        board_id: i64,
        cursor: ArticleCursor,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let tables = self.tables.read().await;
        let in_page = |a: &&Article| match cursor {
            ArticleCursor::Latest => true,
            ArticleCursor::OlderThan(id) => a.id < id,
            ArticleCursor::NewerThan(id) => a.id > id,
        };
        let mut page: Vec<Article> = tables
            .articles
            .values()
            .filter(|a| a.board_id == board_id && !a.is_deleted)
            .filter(in_page)
            .cloned()
            .collect();
        page.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        page.truncate(limit.max(0) as usize);
        Ok(page)
    }
}

#[async_trait]
impl BlacklistStore for MemoryStore {
    async fn revoke(
        &self,
        token: &str,
        expiration_time: DateTime<Utc>,
        username: &str,
    ) -> Result<BlacklistEntry> {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        let entry = BlacklistEntry {
            id,
            token: token.to_string(),
            username: username.to_string(),
            expiration_time,
            created_at: self.clock.now(),
        };
        tables.blacklist.push(entry.clone());
        Ok(entry)
    }

    async fn latest_for(&self, username: &str) -> Result<Option<BlacklistEntry>> {
        let tables = self.tables.read().await;
        Ok(tables
            .blacklist
            .iter()
            .filter(|e| e.username == username)
            .max_by_key(|e| e.expiration_time)
            .cloned())
    }
}

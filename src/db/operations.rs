use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::db::models::{
    Article, ArticleCursor, ArticleTimestamp, BlacklistEntry, Board, NewArticle, NewUser, User,
};
use crate::db::store::{ArticleStore, BlacklistStore, BoardStore, UserStore};
use crate::Result;

const ARTICLE_COLUMNS: &str =
    "a.id, a.author_id, a.board_id, a.title, a.content, a.is_deleted, a.created_at, a.updated_at";

/// Postgres backend. Queries are built at runtime so the crate compiles
/// without a live database.
#[derive(Clone)]
pub struct DbOperations {
    pool: Arc<PgPool>,
    clock: Arc<dyn Clock>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    pub async fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;

        Ok(Self::new(Arc::new(pool), clock))
    }

    /// Timestamp for `created_at` columns.
    fn stamp(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn get_pool_status(&self) -> DbPoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DbPoolStatus {
            total_connections: size,
            active_connections: size.saturating_sub(idle),
            idle_connections: idle,
        }
    }
}

#[async_trait]
impl UserStore for DbOperations {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(self.stamp())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(user)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, created_at FROM users ORDER BY id",
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(users)
    }

    async fn delete_user(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl BoardStore for DbOperations {
    async fn create_board(&self, title: &str, description: Option<String>) -> Result<Board> {
        let board = sqlx::query_as::<_, Board>(
            r#"
            INSERT INTO boards (title, description, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, created_at
            "#,
        )
        .bind(title)
        .bind(description)
        .bind(self.stamp())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(board)
    }

    async fn find_board(&self, id: i64) -> Result<Option<Board>> {
        let board = sqlx::query_as::<_, Board>(
            "SELECT id, title, description, created_at FROM boards WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(board)
    }
}

#[async_trait]
impl ArticleStore for DbOperations {
    async fn insert_article(&self, article: NewArticle) -> Result<Article> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            INSERT INTO articles (author_id, board_id, title, content, is_deleted, created_at)
            VALUES ($1, $2, $3, $4, FALSE, $5)
            RETURNING id, author_id, board_id, title, content, is_deleted, created_at, updated_at
            "#,
        )
        .bind(article.author_id)
        .bind(article.board_id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.created_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(article)
    }

    async fn find_article(&self, id: i64) -> Result<Option<Article>> {
        let article = sqlx::query_as::<_, Article>(&format!(
            "SELECT {} FROM articles a WHERE a.id = $1",
            ARTICLE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(article)
    }

    async fn update_article(&self, article: &Article) -> Result<Article> {
        let article = sqlx::query_as::<_, Article>(
            r#"
            UPDATE articles
            SET title = $2, content = $3, is_deleted = $4, updated_at = $5
            WHERE id = $1
            RETURNING id, author_id, board_id, title, content, is_deleted, created_at, updated_at
            "#,
        )
        .bind(article.id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.is_deleted)
        .bind(article.updated_at)
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(article)
    }

    async fn latest_by_author(
        &self,
        username: &str,
        field: ArticleTimestamp,
    ) -> Result<Option<Article>> {
        let column = field.column();
        let article = sqlx::query_as::<_, Article>(&format!(
            r#"
            SELECT {columns}
            FROM articles a
            JOIN users u ON u.id = a.author_id
            WHERE u.username = $1 AND a.{column} IS NOT NULL
            ORDER BY a.{column} DESC, a.id DESC
            LIMIT 1
            "#,
            columns = ARTICLE_COLUMNS,
            column = column,
        ))
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(article)
    }

    async fn list_by_board(
        &self,
        board_id: i64,
        cursor: ArticleCursor,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let (predicate, anchor) = match cursor {
            ArticleCursor::Latest => ("TRUE", None),
            ArticleCursor::OlderThan(id) => ("a.id < $3", Some(id)),
            ArticleCursor::NewerThan(id) => ("a.id > $3", Some(id)),
        };
        let sql = format!(
            r#"
            SELECT {columns}
            FROM articles a
            WHERE a.board_id = $1 AND a.is_deleted = FALSE AND {predicate}
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT $2
            "#,
            columns = ARTICLE_COLUMNS,
            predicate = predicate,
        );

        let mut query = sqlx::query_as::<_, Article>(&sql).bind(board_id).bind(limit);
        if let Some(anchor) = anchor {
            query = query.bind(anchor);
        }
        let articles = query.fetch_all(self.pool.as_ref()).await?;

        Ok(articles)
    }
}

#[async_trait]
impl BlacklistStore for DbOperations {
    async fn revoke(
        &self,
        token: &str,
        expiration_time: DateTime<Utc>,
        username: &str,
    ) -> Result<BlacklistEntry> {
        let entry = sqlx::query_as::<_, BlacklistEntry>(
            r#"
            INSERT INTO jwt_blacklist (token, username, expiration_time, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, token, username, expiration_time, created_at
            "#,
        )
        .bind(token)
        .bind(username)
        .bind(expiration_time)
        .bind(self.stamp())
        .fetch_one(self.pool.as_ref())
        .await?;

        Ok(entry)
    }

    async fn latest_for(&self, username: &str) -> Result<Option<BlacklistEntry>> {
        let entry = sqlx::query_as::<_, BlacklistEntry>(
            r#"
            SELECT id, token, username, expiration_time, created_at
            FROM jwt_blacklist
            WHERE username = $1
            ORDER BY expiration_time DESC
            LIMIT 1
            "#,
        )
        .bind(username)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(entry)
    }
}

#[derive(Debug, Clone)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}

use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::auth::{MutationKind, Principal, RateLimiter};
use crate::clock::Clock;
use crate::db::{
    Article, ArticleCursor, ArticleStore, Board, BoardStore, NewArticle, User, UserStore,
};
use crate::error::AppError;
use crate::Result;

pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct WriteArticleRequest {
    pub title: String,
    pub content: String,
}

/// Only the provided fields are replaced.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EditArticleRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

pub struct ArticleService {
    users: Arc<dyn UserStore>,
    boards: Arc<dyn BoardStore>,
    articles: Arc<dyn ArticleStore>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::ValidationError(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl ArticleService {
    pub fn new(
        users: Arc<dyn UserStore>,
        boards: Arc<dyn BoardStore>,
        articles: Arc<dyn ArticleStore>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            users,
            boards,
            articles,
            limiter,
            clock,
        }
    }

    async fn author_and_board(&self, principal: &Principal, board_id: i64) -> Result<(User, Board)> {
        let author = self
            .users
            .find_by_username(&principal.username)
            .await?
            .ok_or_else(|| AppError::NotFound("author".into()))?;
        let board = self
            .boards
            .find_board(board_id)
            .await?
            .ok_or_else(|| AppError::NotFound("board".into()))?;
        Ok((author, board))
    }

    /// Steps shared by edit and delete: existence, ownership, then cooldown.
    async fn owned_article(
        &self,
        principal: &Principal,
        board_id: i64,
        article_id: i64,
    ) -> Result<Article> {
        let (author, board) = self.author_and_board(principal, board_id).await?;

        let article = self
            .articles
            .find_article(article_id)
            .await?
            .filter(|a| a.board_id == board.id && !a.is_deleted)
            .ok_or_else(|| AppError::NotFound("article".into()))?;

        if article.author_id != author.id {
            return Err(AppError::Forbidden("article author different".into()));
        }

        self.limiter.check(&principal.username, MutationKind::Edit).await?;
        Ok(article)
    }

    pub async fn write_article(
        &self,
        principal: &Principal,
        board_id: i64,
        request: WriteArticleRequest,
    ) -> Result<Article> {
        require_text("title", &request.title)?;
        require_text("content", &request.content)?;

        let _guard = self.limiter.acquire(&principal.username).await;
        let (author, board) = self.author_and_board(principal, board_id).await?;
        self.limiter.check(&principal.username, MutationKind::Write).await?;

        let article = self
            .articles
            .insert_article(NewArticle {
                author_id: author.id,
                board_id: board.id,
                title: request.title,
                content: request.content,
                created_at: self.clock.now(),
            })
            .await?;
        info!("{} wrote article {} on board {}", principal.username, article.id, board.id);
        Ok(article)
    }

    pub async fn edit_article(
        &self,
        principal: &Principal,
        board_id: i64,
        article_id: i64,
        request: EditArticleRequest,
    ) -> Result<Article> {
        if let Some(title) = &request.title {
            require_text("title", title)?;
        }
        if let Some(content) = &request.content {
            require_text("content", content)?;
        }

        let _guard = self.limiter.acquire(&principal.username).await;
        let mut article = self.owned_article(principal, board_id, article_id).await?;

        if let Some(title) = request.title {
            article.title = title;
        }
        if let Some(content) = request.content {
            article.content = content;
        }
        article.updated_at = Some(self.clock.now());

        let article = self.articles.update_article(&article).await?;
        info!("{} edited article {}", principal.username, article.id);
        Ok(article)
    }

    /// Soft delete: the row stays, flagged.
    pub async fn delete_article(
        &self,
        principal: &Principal,
        board_id: i64,
        article_id: i64,
    ) -> Result<()> {
        let _guard = self.limiter.acquire(&principal.username).await;
        let mut article = self.owned_article(principal, board_id, article_id).await?;

        article.is_deleted = true;
        article.updated_at = Some(self.clock.now());
        self.articles.update_article(&article).await?;
        info!("{} deleted article {}", principal.username, article.id);
        Ok(())
    }

    pub async fn list_articles(&self, board_id: i64, cursor: ArticleCursor) -> Result<Vec<Article>> {
        if self.boards.find_board(board_id).await?.is_none() {
            return Err(AppError::NotFound("board".into()));
        }
        self.articles.list_by_board(board_id, cursor, PAGE_SIZE).await
    }
}

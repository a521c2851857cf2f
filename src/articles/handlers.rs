use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::articles::service::{EditArticleRequest, WriteArticleRequest};
use crate::auth::Principal;
use crate::db::ArticleCursor;
use crate::error::{ApiResponse, AppError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListArticlesQuery {
    #[serde(rename = "lastId")]
    pub last_id: Option<i64>,
    #[serde(rename = "firstId")]
    pub first_id: Option<i64>,
}

impl ListArticlesQuery {
    /// `firstId` wins when both are given.
    fn cursor(&self) -> (ArticleCursor, &'static str) {
        match (self.first_id, self.last_id) {
            (Some(first), _) => (ArticleCursor::NewerThan(first), "Newer articles retrieved successfully"),
            (None, Some(last)) => (ArticleCursor::OlderThan(last), "Older articles retrieved successfully"),
            (None, None) => (ArticleCursor::Latest, "Articles retrieved successfully"),
        }
    }
}

pub async fn write_article(
    principal: Principal,
    path: web::Path<i64>,
    req: web::Json<WriteArticleRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let board_id = path.into_inner();
    let article = state
        .articles
        .write_article(&principal, board_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(article, "Article created successfully")))
}

pub async fn list_articles(
    path: web::Path<i64>,
    query: web::Query<ListArticlesQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let board_id = path.into_inner();
    let (cursor, message) = query.cursor();
    let articles = state.articles.list_articles(board_id, cursor).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(articles, message)))
}

pub async fn edit_article(
    principal: Principal,
    path: web::Path<(i64, i64)>,
    req: web::Json<EditArticleRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (board_id, article_id) = path.into_inner();
    let article = state
        .articles
        .edit_article(&principal, board_id, article_id, req.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(article, "Article edited successfully")))
}

pub async fn delete_article(
    principal: Principal,
    path: web::Path<(i64, i64)>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (board_id, article_id) = path.into_inner();
    state
        .articles
        .delete_article(&principal, board_id, article_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("Article deleted successfully")))
}

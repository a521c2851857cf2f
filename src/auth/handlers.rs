use actix_web::cookie::{time::Duration as CookieDuration, Cookie};
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{info, error};

use crate::auth::gate::{bearer_token, cookie_token, TOKEN_PREFIX};
use crate::error::{ApiResponse, AppError, AuthError};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpRequest {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct LogoutAllQuery {
    #[serde(rename = "requestToken")]
    pub request_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ValidationResponse {
    pub username: String,
}

fn session_cookie<'c>(name: &'c str, token: &'c str, max_age_secs: i64) -> Cookie<'c> {
    Cookie::build(name, token)
        .http_only(true)
        .path("/")
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}

fn clear_cookie(name: &str) -> Cookie<'_> {
    session_cookie(name, "", 0)
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received login request for username: {}", req.username);
    match state.auth_service.login(&req.username, &req.password).await {
        Ok(token) => {
            info!("Login successful for username: {}", req.username);
            let max_age = state.auth_service.codec().lifetime().num_seconds();
            Ok(HttpResponse::Ok()
                .cookie(session_cookie(state.auth_gate.cookie_name(), &token, max_age))
                .json(ApiResponse::new(token.clone(), "Login successful")))
        }
        Err(e) => {
            error!("Login failed for username: {}: {}", req.username, e);
            Err(e)
        }
    }
}

/// Drops the client's cookie only. The token itself stays valid until it
/// expires.
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(clear_cookie(state.auth_gate.cookie_name()))
        .json(ApiResponse::message("Logout successful"))
}

/// Revokes every session of the presenting user. The token is taken from
/// the `requestToken` query parameter, then the cookie, then the
/// Authorization header.
pub async fn logout_all(
    req: HttpRequest,
    query: web::Query<LogoutAllQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let cookie_name = state.auth_gate.cookie_name();
    let token = query
        .into_inner()
        .request_token
        .filter(|t| !t.is_empty())
        .or_else(|| cookie_token(&req, cookie_name))
        .or_else(|| bearer_token(&req))
        .ok_or_else(|| AuthError::AuthenticationFailed("no token presented".into()))?;

    let entry = state.auth_service.logout_all(&token).await?;
    info!("Logout-all completed for {}", entry.username);

    Ok(HttpResponse::Ok()
        .cookie(clear_cookie(cookie_name))
        .json(ApiResponse::message("All sessions revoked")))
}

/// Explicit token health check; unlike the passive gate, defects are errors.
pub async fn validate_token(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let raw = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AuthError::InvalidToken("missing Authorization header".into()))?;
    let token = raw.strip_prefix(TOKEN_PREFIX).unwrap_or(raw).trim();

    let principal = state.auth_gate.validate_explicit(token).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(
        ValidationResponse {
            username: principal.username,
        },
        "Token is valid",
    )))
}

pub async fn sign_up(
    req: web::Json<SignUpRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received sign-up request for username: {}", req.username);
    let user = state
        .auth_service
        .sign_up(&req.username, &req.password, &req.email)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::new(user, "User created successfully")))
}

pub async fn list_users(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let users = state.auth_service.list_users().await?;
    Ok(HttpResponse::Ok().json(ApiResponse::new(users, "Users retrieved successfully")))
}

pub async fn delete_user(
    path: web::Path<i64>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    state.auth_service.delete_user(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::message("User deleted successfully")))
}

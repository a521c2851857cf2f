//! Per-request authentication.
//!
//! Handlers never read identity from ambient state. They take one of the
//! two extractors defined here and pass the resulting [`Principal`] on
//! explicitly:
//!
//! ```rust,ignore
//! // Anonymous requests are fine here.
//! async fn passive(auth: AuthState) -> impl Responder { ... }
//!
//! // Anonymous requests are rejected with 401 before the handler runs.
//! async fn mutating(principal: Principal) -> impl Responder { ... }
//! ```

use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use futures::future::{FutureExt, LocalBoxFuture};
use std::sync::Arc;
use tracing::debug;

use crate::auth::revocation::RevocationGate;
use crate::auth::token::TokenCodec;
use crate::error::{AppError, AuthError};
use crate::{AppState, Result};

pub const TOKEN_PREFIX: &str = "Bearer ";

/// The resolved identity behind an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(Principal),
}

impl AuthState {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthState::Authenticated(principal) => Some(principal),
            AuthState::Anonymous => None,
        }
    }

    /// Turns `Anonymous` into an authentication failure.
    pub fn require(self) -> Result<Principal> {
        match self {
            AuthState::Authenticated(principal) => Ok(principal),
            AuthState::Anonymous => Err(AuthError::AuthenticationFailed(
                "authentication required".into(),
            )
            .into()),
        }
    }
}

/// Token from `Authorization: Bearer <token>`, if that header carries one.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix(TOKEN_PREFIX))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

pub fn cookie_token(req: &HttpRequest, cookie_name: &str) -> Option<String> {
    req.cookie(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

pub struct AuthenticationGate {
    codec: Arc<TokenCodec>,
    revocation: RevocationGate,
    cookie_name: String,
}

impl AuthenticationGate {
    pub fn new(codec: Arc<TokenCodec>, revocation: RevocationGate, cookie_name: String) -> Self {
        Self {
            codec,
            revocation,
            cookie_name,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The Authorization header wins when present; the cookie is only
    /// consulted when there is no Authorization header at all.
    pub fn credential_from(&self, req: &HttpRequest) -> Option<String> {
        if req.headers().contains_key(header::AUTHORIZATION) {
            bearer_token(req)
        } else {
            cookie_token(req, &self.cookie_name)
        }
    }

    /// Passive path: bad, expired or revoked tokens quietly yield
    /// `Anonymous`. Only store failures surface as errors.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<AuthState> {
        let token = match token {
            Some(token) => token,
            None => return Ok(AuthState::Anonymous),
        };

        let claims = match self.codec.validate(token) {
            Ok(claims) => claims,
            Err(AppError::AuthError(e)) => {
                debug!("Ignoring unusable token: {}", e);
                return Ok(AuthState::Anonymous);
            }
            Err(e) => return Err(e),
        };

        if self.revocation.is_revoked(token).await? {
            debug!("Ignoring revoked token for {}", claims.sub);
            return Ok(AuthState::Anonymous);
        }

        Ok(AuthState::Authenticated(Principal {
            username: claims.sub,
        }))
    }

    /// Explicit path: the caller asked about this token's health, so every
    /// defect is reported as `InvalidToken`.
    pub async fn validate_explicit(&self, token: &str) -> Result<Principal> {
        let claims = self.codec.validate(token)?;
        if self.revocation.is_revoked(token).await? {
            return Err(AuthError::InvalidToken("token has been revoked".into()).into());
        }
        Ok(Principal {
            username: claims.sub,
        })
    }
}

fn gate_from(req: &HttpRequest) -> Result<Arc<AuthenticationGate>> {
    req.app_data::<web::Data<AppState>>()
        .map(|state| state.auth_gate.clone())
        .ok_or_else(|| AppError::InternalError("application state not configured".into()))
}

impl FromRequest for AuthState {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let gate = gate_from(req);
        let credential = gate.as_ref().ok().and_then(|g| g.credential_from(req));
        async move { gate?.authenticate(credential.as_deref()).await }.boxed_local()
    }
}

impl FromRequest for Principal {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let state = AuthState::from_request(req, payload);
        state.map(|state| state?.require()).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::db::{BlacklistStore, MemoryStore};
    use actix_web::cookie::Cookie;
    use actix_web::test::TestRequest;
    use chrono::{Duration, TimeZone, Utc};

    fn setup() -> (Arc<ManualClock>, Arc<TokenCodec>, Arc<MemoryStore>, AuthenticationGate) {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
        let codec = Arc::new(TokenCodec::new("test_secret", Duration::hours(1), clock.clone()));
        let store = Arc::new(MemoryStore::new(clock.clone()));
        let revocation = RevocationGate::new(codec.clone(), store.clone());
        let gate = AuthenticationGate::new(codec.clone(), revocation, "hstar_token".into());
        (clock, codec, store, gate)
    }

    #[test]
    fn test_credential_prefers_header() {
        let (_, _, _, gate) = setup();
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer from-header"))
            .cookie(Cookie::new("hstar_token", "from-cookie"))
            .to_http_request();
        assert_eq!(gate.credential_from(&req).as_deref(), Some("from-header"));
    }

    #[test]
    fn test_credential_falls_back_to_cookie() {
        let (_, _, _, gate) = setup();
        let req = TestRequest::default()
            .cookie(Cookie::new("hstar_token", "from-cookie"))
            .to_http_request();
        assert_eq!(gate.credential_from(&req).as_deref(), Some("from-cookie"));

        // Only the canonical cookie name is honored.
        let req = TestRequest::default()
            .cookie(Cookie::new("token", "legacy"))
            .to_http_request();
        assert_eq!(gate.credential_from(&req), None);
    }

    #[test]
    fn test_non_bearer_header_yields_nothing() {
        let (_, _, _, gate) = setup();
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .cookie(Cookie::new("hstar_token", "from-cookie"))
            .to_http_request();
        assert_eq!(gate.credential_from(&req), None);
    }

    #[tokio::test]
    async fn test_passive_states() {
        let (clock, codec, store, gate) = setup();

        assert_eq!(gate.authenticate(None).await.unwrap(), AuthState::Anonymous);
        assert_eq!(gate.authenticate(Some("garbage")).await.unwrap(), AuthState::Anonymous);

        let token = codec.issue("alice").unwrap();
        assert_eq!(
            gate.authenticate(Some(&token)).await.unwrap(),
            AuthState::Authenticated(Principal { username: "alice".into() })
        );

        store
            .revoke(&token, codec.expiry_of(&token).unwrap(), "alice")
            .await
            .unwrap();
        assert_eq!(gate.authenticate(Some(&token)).await.unwrap(), AuthState::Anonymous);

        let expired = {
            clock.advance(Duration::hours(-3));
            let t = codec.issue("frank").unwrap();
            clock.advance(Duration::hours(3));
            t
        };
        assert_eq!(gate.authenticate(Some(&expired)).await.unwrap(), AuthState::Anonymous);
        assert!(clock.now() > codec.expiry_of(&expired).unwrap());
    }

    #[tokio::test]
    async fn test_explicit_validation_reports_invalid_token() {
        let (_, codec, store, gate) = setup();

        assert!(matches!(
            gate.validate_explicit("garbage").await,
            Err(AppError::AuthError(AuthError::InvalidToken(_)))
        ));

        let token = codec.issue("alice").unwrap();
        assert_eq!(gate.validate_explicit(&token).await.unwrap().username, "alice");

        store
            .revoke(&token, codec.expiry_of(&token).unwrap(), "alice")
            .await
            .unwrap();
        assert!(matches!(
            gate.validate_explicit(&token).await,
            Err(AppError::AuthError(AuthError::InvalidToken(_)))
        ));
    }

    #[test]
    fn test_require_principal() {
        assert!(matches!(
            AuthState::Anonymous.require(),
            Err(AppError::AuthError(AuthError::AuthenticationFailed(_)))
        ));
        let principal = Principal { username: "alice".into() };
        assert_eq!(
            AuthState::Authenticated(principal.clone()).require().unwrap(),
            principal
        );
    }
}

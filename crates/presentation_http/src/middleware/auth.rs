//! Bearer token authentication middleware
//!
//! Every request outside the excluded paths must carry
//! `Authorization: Bearer <token>` matching the daemon token. The comparison is
//! constant-time. Without a configured token nothing outside the excluded paths
//! is reachable.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    http::header::AUTHORIZATION,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tower::{Layer, Service};
use tracing::debug;

use crate::error::ApiError;

/// Layer that applies bearer token authentication
#[derive(Clone, Debug)]
pub struct BearerAuthLayer {
    token: Option<Arc<SecretString>>,
    excluded_paths: Arc<Vec<String>>,
}

impl BearerAuthLayer {
    /// Require `token` on every path except `/health`
    pub fn new(token: SecretString) -> Self {
        Self {
            token: Some(Arc::new(token)),
            excluded_paths: Arc::new(vec!["/health".to_string()]),
        }
    }

    /// No token configured: only the excluded paths answer
    pub fn locked() -> Self {
        Self {
            token: None,
            excluded_paths: Arc::new(vec!["/health".to_string()]),
        }
    }

    /// Build from an optional configured token; blank means locked
    pub fn from_token(token: Option<&str>) -> Self {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Self::new(SecretString::from(token.to_string())),
            None => Self::locked(),
        }
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuth<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuth {
            inner,
            token: self.token.clone(),
            excluded_paths: Arc::clone(&self.excluded_paths),
        }
    }
}

/// Middleware service for bearer token authentication
#[derive(Clone, Debug)]
pub struct BearerAuth<S> {
    inner: S,
    token: Option<Arc<SecretString>>,
    excluded_paths: Arc<Vec<String>>,
}

impl<S> Service<Request> for BearerAuth<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let token = self.token.clone();
        let excluded_paths = Arc::clone(&self.excluded_paths);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path();
            if excluded_paths.iter().any(|p| path == p) {
                return inner.call(req).await;
            }

            let Some(token) = token else {
                return Ok(unauthorized_response("Daemon token is not configured"));
            };

            let rejection = match req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
            {
                None => Some("Missing Authorization header"),
                Some(header) => match header.strip_prefix("Bearer ") {
                    Some(candidate) if token_matches(&token, candidate.trim()) => None,
                    Some(_) => {
                        debug!(path = %path, "Rejected request with wrong token");
                        Some("Invalid token")
                    },
                    None => Some("Invalid authorization format, expected Bearer token"),
                },
            };

            match rejection {
                None => inner.call(req).await,
                Some(message) => Ok(unauthorized_response(message)),
            }
        })
    }
}

fn token_matches(expected: &SecretString, candidate: &str) -> bool {
    expected
        .expose_secret()
        .as_bytes()
        .ct_eq(candidate.as_bytes())
        .into()
}

fn unauthorized_response(message: &str) -> Response {
    ApiError::Unauthorized(message.to_string()).into_response()
}

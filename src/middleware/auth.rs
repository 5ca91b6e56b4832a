use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use pin_project::pin_project;
use tower::{Layer, Service};

use crate::{
    Error,
    auth::{AuthManager, Verification},
    db::User,
};

/// Subject claim of the verified bearer token, placed in request extensions.
#[derive(Debug, Clone)]
pub struct Subject(pub String);

#[derive(Clone)]
pub struct AuthLayer {
    auth: Arc<AuthManager>,
}

impl AuthLayer {
    pub fn new(auth: Arc<AuthManager>) -> Self {
        Self { auth }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            auth: self.auth.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    auth: Arc<AuthManager>,
}

/// Token from `Authorization: Bearer <token>`. The scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(char::is_whitespace)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token.trim()).filter(|token| !token.is_empty())
}

impl<S> Service<Request> for AuthMiddleware<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = AuthFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let Some(token) = bearer_token(req.headers()) else {
            debug!("missing or malformed Authorization header");
            return AuthFuture::unauthenticated();
        };
        match self.auth.tokens().verify(token) {
            Verification::Valid { subject } => {
                req.extensions_mut().insert(Subject(subject));
                AuthFuture::authorized(self.inner.call(req))
            }
            Verification::Invalid => AuthFuture::unauthenticated(),
        }
    }
}

#[pin_project(project = AuthFutureProj)]
pub enum AuthFuture<F> {
    Authorized {
        #[pin]
        inner: F,
    },
    Unauthorized(Option<Response>),
}

impl<F> AuthFuture<F> {
    fn unauthenticated() -> Self {
        Self::Unauthorized(Some(Error::Unauthenticated.into_response()))
    }

    fn authorized(inner: F) -> Self {
        Self::Authorized { inner }
    }
}

impl<F, E> Future for AuthFuture<F>
where
    F: Future<Output = Result<Response, E>>,
{
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        match this {
            AuthFutureProj::Authorized { inner } => inner.poll(cx),
            AuthFutureProj::Unauthorized(response) => match response.take() {
                Some(response) => Poll::Ready(Ok(response)),
                None => panic!("AuthFuture polled after completion"),
            },
        }
    }
}

/// The user behind the bearer token, re-read from the store on every request.
pub struct CurrentUser(pub User);

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<AuthManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = Arc::<AuthManager>::from_ref(state);
        if let Some(Subject(subject)) = parts.extensions.get::<Subject>() {
            return auth.resolve(subject).await.map(CurrentUser);
        }
        // Route not behind AuthLayer: verify the header here.
        let Some(token) = bearer_token(&parts.headers) else {
            return Err(Error::Unauthenticated);
        };
        auth.current_user(token).await.map(CurrentUser)
    }
}

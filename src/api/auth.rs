use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{FromRequest, Request, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    AppState, Error,
    auth::{AuthManager, NewUserRequest},
    db::User,
    middleware::CurrentUser,
};

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/token", post(token))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/users/me", get(me))
        .route("/users/me/", get(me))
        .route("/signout", post(signout))
}

#[derive(Deserialize, Validate)]
struct SignupRequest {
    #[validate(length(min = 1, max = 50))]
    username: String,
    #[validate(email, length(max = 100))]
    email: String,
    #[validate(length(min = 1))]
    password: String,
}

#[derive(Serialize)]
struct UserResponse {
    id: i32,
    username: String,
    email: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// OAuth2 password-grant form. Extra fields such as `grant_type` or `scope`
/// are accepted and ignored.
#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    access_token: String,
    token_type: &'static str,
    expires_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

async fn signup(
    State(auth): State<Arc<AuthManager>>,
    request: SignupRequest,
) -> Result<Json<UserResponse>, Error> {
    let user = auth
        .register(NewUserRequest {
            username: request.username,
            email: request.email,
            password: request.password,
        })
        .await?;
    Ok(Json(user.into()))
}

async fn token(
    State(auth): State<Arc<AuthManager>>,
    form: LoginForm,
) -> Result<Json<TokenResponse>, Error> {
    let token = auth.authenticate(&form.username, &form.password).await?;
    Ok(Json(TokenResponse {
        access_token: token.token,
        token_type: "bearer",
        expires_at: token.expires_at,
    }))
}

async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user.into())
}

async fn signout(CurrentUser(user): CurrentUser) -> Json<MessageResponse> {
    debug!(username = %user.username, "signout");
    Json(MessageResponse {
        message: "Session closed. Please discard the token.",
    })
}

impl<S> FromRequest<S> for SignupRequest
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(request) = Json::<SignupRequest>::from_request(req, state)
            .await
            .map_err(|err| Error::rejected(err.status(), err.body_text()))?;
        request
            .validate()
            .map_err(|err| Error::bad_request(err.to_string(), "validation_error"))?;
        Ok(request)
    }
}

impl<S> FromRequest<S> for LoginForm
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Form(form) = Form::<LoginForm>::from_request(req, state)
            .await
            .map_err(|err| Error::rejected(err.status(), err.body_text()))?;
        Ok(form)
    }
}

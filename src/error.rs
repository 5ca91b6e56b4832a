use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE},
    response::{IntoResponse, Response},
};

use deadpool_diesel::{InteractError, PoolError};
use diesel::result::Error as DieselError;
use isahc::Error as IsahcError;
use serde::Serialize;
use tokio::task::JoinError;

use crate::auth::{CredentialError, TokenError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("DeadPoolError: {0}")]
    DeadPool(DeadPoolError),
    #[error("DieselError: {0}")]
    Diesel(#[from] DieselError),
    #[error("{reason}")]
    Custom {
        status: StatusCode,
        reason: String,
        code: Option<&'static str>,
    },
    #[error("Wrong username or password")]
    InvalidCredentials,
    #[error("Could not validate credentials")]
    Unauthenticated,
    #[error("{0}")]
    Credential(#[from] CredentialError),
    #[error("{0}")]
    Token(#[from] TokenError),
    #[error("Isahc Error: {0}")]
    Isahc(#[from] IsahcError),
    #[error("upstream responded with {status}: {body}")]
    Upstream { status: StatusCode, body: String },
    #[error("Tokio JoinError: {0}")]
    Join(#[from] JoinError),
    #[error("{0}")]
    IOError(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorJson {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            debug!("{}", self);
        }

        let challenge = matches!(self, Error::InvalidCredentials | Error::Unauthenticated);
        let code = self.code().map(str::to_owned);
        let error = if status.is_server_error() && !matches!(self, Error::Custom { .. }) {
            String::from("Internal server error")
        } else {
            self.to_string()
        };
        let mut response = (status, Json(ErrorJson { error, code })).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl Error {
    pub fn bad_request(reason: impl Into<String>, code: &'static str) -> Self {
        Self::Custom {
            status: StatusCode::BAD_REQUEST,
            reason: reason.into(),
            code: Some(code),
        }
    }

    /// Malformed request body, wrong content type and similar extractor failures.
    pub fn rejected(status: StatusCode, reason: impl Into<String>) -> Self {
        Self::Custom {
            status,
            reason: reason.into(),
            code: Some("invalid_request"),
        }
    }

    pub fn internal(reason: impl Into<String>, code: &'static str) -> Self {
        Self::Custom {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            reason: reason.into(),
            code: Some(code),
        }
    }

    pub fn upstream(status: StatusCode, body: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            body: body.into(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::Custom { status, .. } => *status,
            Error::InvalidCredentials | Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Token(
                TokenError::EmptySubject | TokenError::NonPositiveTtl | TokenError::TtlOverflow,
            ) => {
                StatusCode::BAD_REQUEST
            }
            Error::Upstream { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> Option<&'static str> {
        match self {
            Error::DeadPool(_) => Some("database_error"),
            Error::Diesel(_) => Some("database_error"),
            Error::Custom { code, .. } => *code,
            Error::InvalidCredentials => Some("invalid_credentials"),
            Error::Unauthenticated => Some("unauthenticated"),
            Error::Credential(_) => Some("credential_error"),
            Error::Token(_) => Some("token_error"),
            Error::Isahc(_) => Some("http_client_error"),
            Error::Upstream { .. } => Some("upstream_error"),
            Error::Join(_) => Some("internal_error"),
            Error::IOError(_) => Some("io_error"),
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DeadPoolError>,
{
    fn from(e: E) -> Self {
        Self::DeadPool(e.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeadPoolError {
    #[error("InteractError: {0}")]
    Interact(#[from] InteractError),
    #[error("PoolError: {0}")]
    Pool(#[from] PoolError),
}

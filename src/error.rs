//! Error types shared across the request pipeline
//!
//! `HttpError` is the set of status conditions answered by the error
//! responder. `AppError` is what a route handler may fail with; `StartupError`
//! covers everything that can stop the process before it starts serving.

use hyper::StatusCode;
use thiserror::Error;

use crate::form::FormError;
use crate::outbound::OutboundError;
use crate::routing::RouteError;

/// Status conditions rendered with a dedicated error page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HttpError {
    #[error("400 Bad Request")]
    BadRequest,
    #[error("401 Unauthorized")]
    Unauthorized,
    #[error("403 Forbidden")]
    Forbidden,
    #[error("404 Not Found")]
    NotFound,
}

impl HttpError {
    pub const fn status(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Template identifier of the error page
    pub const fn template(self) -> &'static str {
        match self {
            Self::BadRequest => "errors/400.html",
            Self::Unauthorized => "errors/401.html",
            Self::Forbidden => "errors/403.html",
            Self::NotFound => "errors/404.html",
        }
    }
}

/// Failure of a single request
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    #[error("outbound call failed: {0}")]
    Outbound(#[from] OutboundError),

    #[error("template rendering failed: {0}")]
    Render(#[from] tera::Error),
}

impl From<FormError> for AppError {
    fn from(err: FormError) -> Self {
        match err {
            FormError::TooLarge { limit } => Self::PayloadTooLarge { limit },
            FormError::Body(_) | FormError::Multipart(_) => Self::Http(HttpError::BadRequest),
        }
    }
}

/// Failure while building the application state
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("security.secret_key must be set to a non-empty value")]
    MissingSecretKey,

    #[error("invalid upstream URL '{url}': {source}")]
    UpstreamUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to load templates: {0}")]
    Templates(#[from] tera::Error),

    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),
}

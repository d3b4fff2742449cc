use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use lambda_http::http::StatusCode;
use thiserror::Error;

/// Failures raised by the record stores.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("DynamoDB error: {0}")]
    Backend(String),

    #[error("Malformed {entity} item: {message}")]
    Malformed {
        entity: &'static str,
        message: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl<E, R> From<SdkError<E, R>> for StoreError
where
    E: std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    fn from(err: SdkError<E, R>) -> Self {
        StoreError::Backend(DisplayErrorContext(&err).to_string())
    }
}

/// Failures raised while pushing a live update.
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced to HTTP callers of the user endpoints.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{entity} not found with {field} : '{value}'")]
    NotFound {
        entity: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Invalid request body: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn not_found(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        ApiError::NotFound {
            entity,
            field,
            value: value.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::BadRequest(_) | ApiError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the caller. Store failures stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::Store(e) => {
                tracing::error!("Store error: {}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

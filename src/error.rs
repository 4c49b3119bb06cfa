use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Why a presented session credential was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// The signature does not verify against the signing key.
    #[error("invalid signature")]
    InvalidSignature,

    /// The credential verified but its `exp` has passed.
    #[error("credential expired")]
    Expired,

    /// The credential could not be decoded.
    #[error("malformed credential")]
    Malformed,

    /// The credential verified but its session row was evicted or revoked.
    #[error("session no longer active")]
    Revoked,
}

/// The application's error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// A database error.
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// A connection pool error.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    /// A connection pool construction error.
    #[error("Pool creation error: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    /// A Redis error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The presented credential is bad, expired or malformed.
    #[error("Credential invalid: {0}")]
    CredentialInvalid(#[from] CredentialError),

    /// Signing a new credential failed.
    #[error("Credential signing failed: {0}")]
    Signing(String),

    /// The count/evict/insert transaction for a login did not commit.
    #[error("Session persistence failed: {0}")]
    SessionPersistenceFailed(String),

    /// A profile store lookup failed on a single-item path.
    #[error("Store lookup failed: {0}")]
    StoreLookupFailed(String),

    /// A document could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An authentication error.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// A resource not found error. Also covers records owned by someone else.
    #[error("Resource not found")]
    NotFound,

    /// A validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A uniqueness conflict.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The request stopped waiting on a fan-out.
    #[error("Request cancelled")]
    Cancelled,

    /// An internal server error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// A `Result` type that uses `AppError` as the error type.
pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Pool(ref e) => {
                tracing::error!("Pool error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::CreatePool(ref e) => {
                tracing::error!("Pool creation error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database error".to_string())
            }

            AppError::Redis(ref e) => {
                tracing::error!("Redis error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::CredentialInvalid(ref e) => {
                tracing::warn!("Credential rejected: {}", e);
                (StatusCode::UNAUTHORIZED, "Re-authentication required".to_string())
            }

            AppError::Signing(ref msg) => {
                tracing::error!("Credential signing failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::SessionPersistenceFailed(ref msg) => {
                tracing::error!("Session persistence failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Login failed".to_string())
            }

            AppError::StoreLookupFailed(ref msg) => {
                tracing::error!("Store lookup failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache error".to_string())
            }

            AppError::Serialization(ref msg) => {
                tracing::error!("Serialization error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }

            AppError::Authentication(ref msg) => {
                tracing::warn!("Authentication failed: {}", msg);
                (StatusCode::UNAUTHORIZED, msg.clone())
            }

            AppError::NotFound => {
                tracing::debug!("Resource not found");
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }

            AppError::Validation(ref msg) => {
                tracing::debug!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, msg.clone())
            }

            AppError::Conflict(ref msg) => {
                tracing::debug!("Conflict: {}", msg);
                (StatusCode::CONFLICT, msg.clone())
            }

            AppError::Cancelled => {
                tracing::warn!("Request cancelled while waiting on profile fan-out");
                (StatusCode::SERVICE_UNAVAILABLE, "Request cancelled".to_string())
            }

            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Internal server error"}"#.to_string());

        (status, [(http::header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

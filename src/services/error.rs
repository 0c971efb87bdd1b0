use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the domain services. The display strings of the
/// 4xx variants are part of the API contract and are returned verbatim
/// as the `reason` field of failure responses.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The payload failed a domain validation rule
    #[error("{0}")]
    Validation(String),

    #[error("Game was not found with id: {0}")]
    GameNotFound(String),

    #[error("Player was not found with id: {0}")]
    PlayerNotFound(String),

    #[error("Clan was not found with id: {0}")]
    ClanNotFound(String),

    #[error("Membership was not found with id: {0}")]
    MembershipNotFound(String),

    /// The actor lacks the authority for the action
    #[error("{0}")]
    Forbidden(String),

    /// Quota exceeded, duplicate membership or cooldown still running
    #[error("{0}")]
    Conflict(String),

    /// Serialization conflicts persisted past the retry budget
    #[error("Temporary database contention, retry the operation")]
    Transient,

    /// Database error occurred
    #[error("Internal server error")]
    Database(#[from] DbErr),

    /// Materializing a hook payload failed
    #[error("Internal server error")]
    HookPayload(#[from] serde_json::Error),

    /// A stored name could not be decrypted
    #[error("Internal server error")]
    Codec(#[from] crate::utils::codec::CodecError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// IntoResponse implementation producing the standard failure envelope
/// with the status mapping of the API contract
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::GameNotFound(_) => StatusCode::NOT_FOUND,
            Self::PlayerNotFound(_)
            | Self::ClanNotFound(_)
            | Self::MembershipNotFound(_)
            | Self::Forbidden(_)
            | Self::Conflict(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Transient | Self::Database(_) | Self::HookPayload(_) | Self::Codec(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (
            status,
            Json(json!({ "success": false, "reason": self.to_string() })),
        )
            .into_response()
    }
}

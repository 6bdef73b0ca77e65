use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Application not installed or settings not found")]
    NotInstalled,

    #[error("Access token not found. Please install the application")]
    MissingToken,

    #[error("Failed to refresh token: {0}")]
    Refresh(String),

    #[error("Bitrix24 API error: {code}: {description}")]
    Provider { code: String, description: String },

    #[error("Request to Bitrix24 timed out")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::Timeout
        } else {
            AppError::Transport(e.to_string())
        }
    }
}

// Bitrix24 placements embed our responses directly, so errors render as plain
// text rather than a JSON envelope. Token and secret values never appear in
// any of the rendered messages.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotInstalled => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::MissingToken => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Timeout => (StatusCode::GATEWAY_TIMEOUT, self.to_string()),
            AppError::Refresh(msg) => {
                tracing::error!("Token refresh failed: {}", msg);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Provider { code, description } => {
                tracing::error!("Bitrix24 API error: {} {}", code, description);
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Transport(msg) => {
                tracing::error!("Transport error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Failed to communicate with Bitrix24".to_string(),
                )
            }
            AppError::Storage(e) => {
                tracing::error!("Storage error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Serde(e) => {
                tracing::error!("Serialization error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
            AppError::Config(msg) => {
                tracing::error!("Configuration error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server configuration error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

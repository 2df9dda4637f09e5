use http::StatusCode;
use std::fmt;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    Validation(String),
    Unauthorized,
    Forbidden,
    NotFound(String),
    Conflict(String),
    Backend { status: u16, message: String },
    Network(String),
    Config(String),
    InternalError(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation(msg) => write!(f, "Validation: {}", msg),
            ApiError::Unauthorized => write!(f, "Unauthorized"),
            ApiError::Forbidden => write!(f, "Forbidden"),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::Backend { status, message } => write!(f, "Backend error {}: {}", status, message),
            ApiError::Network(msg) => write!(f, "Network error: {}", msg),
            ApiError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    /// Map a non-success backend status and its extracted message to an error.
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ApiError::Validation(message),
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::NOT_FOUND | StatusCode::NOT_ACCEPTABLE => ApiError::NotFound(message),
            StatusCode::CONFLICT => ApiError::Conflict(message),
            _ => ApiError::Backend { status: status.as_u16(), message },
        }
    }

    /// Text suitable for a blocking alert in the view layer.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Config(msg) => msg.clone(),
            ApiError::Backend { message, .. } => message.clone(),
            ApiError::Unauthorized => "Invalid login credentials".to_string(),
            ApiError::Forbidden => "You are not allowed to do that".to_string(),
            ApiError::Network(_) => "Network request failed, please try again".to_string(),
            ApiError::InternalError(_) => "Something went wrong".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InternalError(format!("Unexpected response body: {}", err))
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

// Implement conversion from anyhow::Error to ApiError for internal errors
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::InternalError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_to_variants() {
        assert_eq!(ApiError::from_status(StatusCode::UNAUTHORIZED, "x"), ApiError::Unauthorized);
        assert_eq!(
            ApiError::from_status(StatusCode::CONFLICT, "duplicate key"),
            ApiError::Conflict("duplicate key".to_string())
        );
        assert_eq!(
            ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream"),
            ApiError::Backend { status: 502, message: "upstream".to_string() }
        );
    }

    #[test]
    fn network_errors_get_a_generic_user_message() {
        let err = ApiError::Network("connection reset".to_string());
        assert_eq!(err.user_message(), "Network request failed, please try again");
    }
}

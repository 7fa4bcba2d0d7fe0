use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Categorizes errors for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid credentials
    Auth,
    /// Credentials lack permission for the resource
    Permission,
    /// Quota or rate exhausted
    RateLimit,
    /// Client-side malformed request
    InvalidRequest,
    /// Backing model is still initializing
    Warmup,
    /// Transport failed before a response was obtained
    Network,
    /// Unclassified server error or unreadable response
    Server,
    /// Local validation failure, nothing was sent
    Local,
}

/// Server-supplied error details.
///
/// `status` and `request_id` are filled in whenever the error came from an
/// HTTP exchange, so failures can be traced against server-side logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiErrorInfo {
    pub message: String,
    pub status: Option<u16>,
    pub request_id: Option<String>,
    pub code: Option<String>,
    pub r#type: Option<String>,
    pub param: Option<String>,
}

impl ApiErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }
}

impl fmt::Display for ApiErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request_id {
            Some(id) => write!(f, "Request {id}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Errors that can occur when talking to the inference API
#[derive(Debug, Error)]
pub enum RequestError {
    /// HTTP 401, or no API key available locally
    #[error("Authentication error: {0}")]
    Authentication(ApiErrorInfo),

    /// HTTP 403
    #[error("Permission denied: {0}")]
    Permission(ApiErrorInfo),

    /// HTTP 429
    #[error("Rate limit exceeded: {0}")]
    RateLimit(ApiErrorInfo),

    /// HTTP 400, 404, 415 and 422
    #[error("Invalid request error: {0}")]
    InvalidRequest(ApiErrorInfo),

    /// Transport failure before a response was obtained
    #[error("Error communicating with API: {message}")]
    ApiConnection {
        message: String,
        /// Whether the exact same request can safely be sent again
        retryable: bool,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// HTTP 409: the backing model is still warming up
    #[error("Model is not ready yet: {0}")]
    TryAgain(ApiErrorInfo),

    /// Any other non-2xx status, or an error event inside a stream
    #[error("API error: {0}")]
    Api(ApiErrorInfo),

    /// Local validation failure raised before any network call
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A 2xx response whose body could not be decoded
    #[error("Invalid response from API: {0}")]
    InvalidResponse(ApiErrorInfo),

    /// Malformed event in a streaming response
    #[error("Invalid event data: {0}")]
    InvalidEventData(String),

    /// JSON serialization of request parameters failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) => ErrorKind::Auth,
            Self::Permission(_) => ErrorKind::Permission,
            Self::RateLimit(_) => ErrorKind::RateLimit,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::ApiConnection { .. } => ErrorKind::Network,
            Self::TryAgain(_) => ErrorKind::Warmup,
            Self::Api(_) | Self::InvalidResponse(_) | Self::InvalidEventData(_) => {
                ErrorKind::Server
            }
            Self::Configuration(_) | Self::Json(_) => ErrorKind::Local,
        }
    }

    /// True for the warmup condition watched by the retry wrapper
    pub fn is_try_again(&self) -> bool {
        matches!(self, Self::TryAgain(_))
    }

    /// Server-supplied details, when the error came from a response
    pub fn info(&self) -> Option<&ApiErrorInfo> {
        match self {
            Self::Authentication(info)
            | Self::Permission(info)
            | Self::RateLimit(info)
            | Self::InvalidRequest(info)
            | Self::TryAgain(info)
            | Self::Api(info)
            | Self::InvalidResponse(info) => Some(info),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.info().and_then(|info| info.status)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.info().and_then(|info| info.request_id.as_deref())
    }

    pub(crate) fn connection(
        message: impl Into<String>,
        retryable: bool,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ApiConnection {
            message: message.into(),
            retryable,
            source: Some(Box::new(source)),
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_builder() {
            return Self::Configuration(error.to_string());
        }
        // Only a failed connect guarantees the server never saw the request.
        let retryable = error.is_connect();
        Self::connection(error.to_string(), retryable, error)
    }
}

impl From<std::io::Error> for RequestError {
    fn from(error: std::io::Error) -> Self {
        Self::connection(error.to_string(), false, error)
    }
}

/// Error object as sent by the API
#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    param: Option<String>,
    #[serde(default)]
    code: Option<Value>,
}

/// Parse an error response from HTTP status and body
pub fn parse_error_response(
    status: StatusCode,
    request_id: Option<String>,
    body: &[u8],
) -> RequestError {
    match serde_json::from_slice::<Value>(body) {
        Ok(payload) => error_from_payload(status.as_u16(), request_id, &payload),
        Err(_) => RequestError::Api(
            ApiErrorInfo::new(format!(
                "HTTP code {} from API ({})",
                status.as_u16(),
                String::from_utf8_lossy(body)
            ))
            .with_status(status.as_u16())
            .with_request_id(request_id),
        ),
    }
}

/// Classify a decoded error payload of the form `{"error": {...}}`
pub fn error_from_payload(status: u16, request_id: Option<String>, payload: &Value) -> RequestError {
    let detail = payload
        .get("error")
        .and_then(|error| ApiErrorDetail::deserialize(error).ok());

    let Some(detail) = detail else {
        return RequestError::Api(
            ApiErrorInfo::new(format!(
                "Invalid response object from API: {payload} (HTTP response code was {status})"
            ))
            .with_status(status)
            .with_request_id(request_id),
        );
    };

    let info = ApiErrorInfo {
        message: detail.message.unwrap_or_default(),
        status: Some(status),
        request_id,
        code: detail.code.and_then(|code| match code {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }),
        r#type: detail.r#type,
        param: detail.param,
    };

    match status {
        401 => RequestError::Authentication(info),
        403 => RequestError::Permission(info),
        429 => RequestError::RateLimit(info),
        400 | 404 | 415 | 422 => RequestError::InvalidRequest(info),
        409 => RequestError::TryAgain(info),
        _ => RequestError::Api(info),
    }
}

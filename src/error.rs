/// Error Handling Module
///
/// One error type per concern, folded into [`AppError`] at the HTTP edge:
/// 1. Authentication errors returned by the credential and token core
/// 2. Validation, database and configuration errors of the glue layer
/// 3. HTTP response mapping with structured logging

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::error::Error as StdError;
use std::fmt;

/// ============================================================================
/// 1. AUTHENTICATION ERRORS (returned by the auth core, never logged there)
/// ============================================================================

/// Failures of the credential verifier and the token authority
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The hashing algorithm itself failed (entropy or parameter failure)
    HashingFailed,
    /// More input than bcrypt reads (72 bytes)
    PasswordTooLong,
    /// Wrong password or unusable stored hash; the two are not distinguished
    CredentialMismatch,
    /// A token type name that is neither `access_token` nor `refresh_token`
    UnsupportedTokenType(String),
    /// Not a structurally valid compact token
    MalformedToken,
    /// Signature does not verify under the secret of the expected type
    SignatureInvalid,
    /// Signature verified but `exp` is in the past
    Expired,
    /// Signature verified but the embedded `token_type` differs from the expected one
    TokenTypeMismatch,
    /// Signature verified but a registered claim (issuer, required field) is wrong
    InvalidClaims(String),
    /// Encoding or signing a token failed
    SigningFailed,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::HashingFailed => write!(f, "Password hashing failed"),
            AuthError::PasswordTooLong => write!(f, "Password exceeds 72 bytes"),
            AuthError::CredentialMismatch => write!(f, "Credential mismatch"),
            AuthError::UnsupportedTokenType(kind) => {
                write!(f, "Unsupported token type: {}", kind)
            }
            AuthError::MalformedToken => write!(f, "Malformed token"),
            AuthError::SignatureInvalid => write!(f, "Invalid token signature"),
            AuthError::Expired => write!(f, "Token has expired"),
            AuthError::TokenTypeMismatch => write!(f, "Unexpected token type"),
            AuthError::InvalidClaims(msg) => write!(f, "Invalid token claims: {}", msg),
            AuthError::SigningFailed => write!(f, "Token signing failed"),
        }
    }
}

impl StdError for AuthError {}

/// ============================================================================
/// 2. GLUE-LAYER ERRORS
/// ============================================================================

/// Validation errors for request input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField(String),
    TooShort(String, usize),
    TooLong(String, usize),
    TooManyBytes(String, usize),
    InvalidFormat(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField(field) => write!(f, "{} is empty", field),
            ValidationError::TooShort(field, min) => {
                write!(f, "{} is too short (minimum {} characters)", field, min)
            }
            ValidationError::TooLong(field, max) => {
                write!(f, "{} is too long (maximum {} characters)", field, max)
            }
            ValidationError::TooManyBytes(field, max) => {
                write!(f, "{} is too long (maximum {} bytes)", field, max)
            }
            ValidationError::InvalidFormat(field) => write!(f, "{} has invalid format", field),
        }
    }
}

impl StdError for ValidationError {}

/// User store errors
#[derive(Debug)]
pub enum DatabaseError {
    UniqueConstraintViolation(String),
    NotFound(String),
    QueryExecution(String),
    ConnectionPool(String),
}

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseError::UniqueConstraintViolation(msg) => {
                write!(f, "Duplicate entry: {}", msg)
            }
            DatabaseError::NotFound(msg) => write!(f, "Not found: {}", msg),
            DatabaseError::QueryExecution(msg) => write!(f, "Query error: {}", msg),
            DatabaseError::ConnectionPool(msg) => write!(f, "Database connection error: {}", msg),
        }
    }
}

impl StdError for DatabaseError {}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                DatabaseError::UniqueConstraintViolation("Email already registered".to_string())
            }
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseError::ConnectionPool(err.to_string())
            }
            _ => DatabaseError::QueryExecution(err.to_string()),
        }
    }
}

/// Configuration errors; all of them are fatal at startup
#[derive(Debug)]
pub enum ConfigError {
    MissingRequired(String),
    InvalidValue(String),
    ParseError(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingRequired(msg) => write!(f, "Missing required config: {}", msg),
            ConfigError::InvalidValue(msg) => write!(f, "Invalid config value: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Config parse error: {}", msg),
        }
    }
}

impl StdError for ConfigError {}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => ConfigError::MissingRequired(key),
            other => ConfigError::ParseError(other.to_string()),
        }
    }
}

/// ============================================================================
/// 3. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type returned by route handlers
#[derive(Debug)]
pub enum AppError {
    Validation(ValidationError),
    Database(DatabaseError),
    Auth(AuthError),
    /// No bearer credential on a protected route
    MissingCredentials,
    Config(ConfigError),
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Validation(e) => write!(f, "{}", e),
            AppError::Database(e) => write!(f, "{}", e),
            AppError::Auth(e) => write!(f, "{}", e),
            AppError::MissingCredentials => write!(f, "Missing authentication token"),
            AppError::Config(e) => write!(f, "{}", e),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl StdError for AppError {}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation(err)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(err.to_string())
    }
}

// ============================================================================
// 4. HTTP RESPONSE MAPPING
// ============================================================================

/// Error body sent to clients
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for correlating with server logs
    pub error_id: String,
    pub message: String,
    /// Stable code for client-side handling
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Validation(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            AppError::Database(e) => match e {
                DatabaseError::UniqueConstraintViolation(_) => {
                    (StatusCode::CONFLICT, "DUPLICATE_ENTRY", e.to_string())
                }
                DatabaseError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string()),
                DatabaseError::ConnectionPool(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Database service temporarily unavailable".to_string(),
                ),
                DatabaseError::QueryExecution(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error occurred".to_string(),
                ),
            },

            // Unknown email and wrong password must look the same to the client
            AppError::Auth(e) => match e {
                AuthError::CredentialMismatch => (
                    StatusCode::UNAUTHORIZED,
                    "INVALID_CREDENTIALS",
                    "Invalid email or password".to_string(),
                ),
                AuthError::PasswordTooLong => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string())
                }
                AuthError::Expired => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_EXPIRED",
                    "Token has expired".to_string(),
                ),
                AuthError::UnsupportedTokenType(_)
                | AuthError::MalformedToken
                | AuthError::SignatureInvalid
                | AuthError::TokenTypeMismatch
                | AuthError::InvalidClaims(_) => (
                    StatusCode::UNAUTHORIZED,
                    "TOKEN_INVALID",
                    "Invalid token".to_string(),
                ),
                AuthError::HashingFailed | AuthError::SigningFailed => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                ),
            },

            AppError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "MISSING_TOKEN",
                "Missing or invalid authorization header".to_string(),
            ),

            AppError::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                "Server configuration error".to_string(),
            ),

            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl ErrorHandler for AppError {
    fn error_response(&self, request_id: &str) -> (StatusCode, ErrorResponse) {
        let (status, code, message) = self.classify();
        let body = ErrorResponse::new(
            request_id.to_string(),
            message,
            code.to_string(),
            status.as_u16(),
        );
        (status, body)
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %self, "Duplicate entry attempt");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(e @ (AuthError::HashingFailed | AuthError::SigningFailed)) => {
                tracing::error!(request_id = request_id, error = %e, "Credential processing failed");
            }
            AppError::Auth(AuthError::PasswordTooLong) => {
                tracing::warn!(request_id = request_id, error = %self, "Validation error");
            }
            AppError::Auth(AuthError::CredentialMismatch) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Token rejected");
            }
            AppError::MissingCredentials => {
                tracing::warn!(request_id = request_id, "Missing bearer token");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl AppError {
    fn respond(&self, request_id: &str) -> HttpResponse {
        self.log_error(request_id);

        let (status, body) = <Self as ErrorHandler>::error_response(self, request_id);
        HttpResponse::build(status).json(body)
    }
}

/// Errors raised outside a handler (middleware, extractors) get a fresh id
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        self.respond(&uuid::Uuid::new_v4().to_string())
    }

    fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

// ============================================================================
// 5. ERROR CONTEXT
// ============================================================================

/// Per-request context carried into log lines of a route handler
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
        }
    }

    /// Tag an error with this context's request id
    pub fn wrap(&self, error: impl Into<AppError>) -> RequestError {
        RequestError {
            request_id: self.request_id.clone(),
            error: error.into(),
        }
    }
}

/// An [`AppError`] whose `error_id` is the request id its handler logged under
#[derive(Debug)]
pub struct RequestError {
    pub request_id: String,
    pub error: AppError,
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl StdError for RequestError {}

impl ResponseError for RequestError {
    fn error_response(&self) -> HttpResponse {
        self.error.respond(&self.request_id)
    }

    fn status_code(&self) -> StatusCode {
        self.error.classify().0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::TooShort("password".to_string(), 8);
        assert_eq!(err.to_string(), "password is too short (minimum 8 characters)");
    }

    #[test]
    fn test_auth_error_conversion() {
        let app_err: AppError = AuthError::Expired.into();
        assert!(matches!(app_err, AppError::Auth(AuthError::Expired)));
    }

    #[test]
    fn test_credential_mismatch_hides_cause() {
        let err = AppError::Auth(AuthError::CredentialMismatch);
        let (status, body) = ErrorHandler::error_response(&err, "req-1");

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "INVALID_CREDENTIALS");
        assert_eq!(body.message, "Invalid email or password");
    }

    #[test]
    fn test_expired_and_invalid_tokens_use_distinct_codes() {
        let expired = AppError::Auth(AuthError::Expired);
        let invalid = AppError::Auth(AuthError::SignatureInvalid);

        let (_, expired_body) = ErrorHandler::error_response(&expired, "req-1");
        let (_, invalid_body) = ErrorHandler::error_response(&invalid, "req-2");

        assert_eq!(expired_body.code, "TOKEN_EXPIRED");
        assert_eq!(invalid_body.code, "TOKEN_INVALID");
    }

    #[test]
    fn test_signing_failure_is_server_error() {
        let err = AppError::Auth(AuthError::SigningFailed);
        assert_eq!(ResponseError::status_code(&err), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let err = AppError::Database(DatabaseError::UniqueConstraintViolation(
            "Email already registered".to_string(),
        ));
        assert_eq!(ResponseError::status_code(&err), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_wrapped_error_reuses_request_id() {
        let ctx = ErrorContext::new("user_login");
        let err = ctx.wrap(AuthError::CredentialMismatch);

        let response = ResponseError::error_response(&err);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let bytes = actix_web::body::to_bytes(response.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error_id"], ctx.request_id.as_str());
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    #[test]
    fn test_password_too_long_is_bad_request() {
        let err = AppError::Auth(AuthError::PasswordTooLong);
        let (status, body) = ErrorHandler::error_response(&err, "req-1");

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, "VALIDATION_ERROR");
    }

    #[test]
    fn test_error_context_creation() {
        let ctx = ErrorContext::new("user_login");
        assert_eq!(ctx.operation, "user_login");
        assert!(uuid::Uuid::parse_str(&ctx.request_id).is_ok());
    }
}

// Error types for the Snail framework

use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Route not found: {0}")]
    RouteNotFound(String),

    /// Never produced by the router; a method mismatch is reported as `RouteNotFound`.
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Handler not found: {0}")]
    HandlerNotFound(String),

    #[error("Unresolvable dependency '{parameter}' while building '{service}'")]
    UnresolvableDependency { service: String, parameter: String },

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Invalid binding for '{id}': {reason}")]
    InvalidBinding { id: String, reason: String },

    #[error("Circular dependency: {0}")]
    CircularDependency(String),

    #[error("Service '{id}' is not of type {expected}")]
    ServiceTypeMismatch { id: String, expected: &'static str },

    #[error("Middleware '{middleware}' aborted the request: {reason}")]
    MiddlewareAborted { middleware: String, reason: String },

    #[error("Middleware not registered: {0}")]
    MiddlewareNotFound(String),

    #[error("Request deadline exceeded {0}")]
    DeadlineExceeded(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Plugin error: {0}")]
    Plugin(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Error::RouteNotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Error::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Numeric form of [`Error::status`].
    pub fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }

    /// Errors whose response body never varies with debug mode.
    pub fn is_routing_failure(&self) -> bool {
        matches!(
            self,
            Error::RouteNotFound(_) | Error::MethodNotAllowed(_) | Error::HandlerNotFound(_)
        )
    }

    /// Stable machine-readable name used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::RouteNotFound(_) => "RouteNotFound",
            Error::MethodNotAllowed(_) => "MethodNotAllowed",
            Error::HandlerNotFound(_) => "HandlerNotFound",
            Error::UnresolvableDependency { .. } => "UnresolvableDependency",
            Error::ServiceNotFound(_) => "ServiceNotFound",
            Error::InvalidBinding { .. } => "InvalidBinding",
            Error::CircularDependency(_) => "CircularDependency",
            Error::ServiceTypeMismatch { .. } => "ServiceTypeMismatch",
            Error::MiddlewareAborted { .. } => "MiddlewareAborted",
            Error::MiddlewareNotFound(_) => "MiddlewareNotFound",
            Error::DeadlineExceeded(_) => "DeadlineExceeded",
            Error::Config(_) => "Config",
            Error::Plugin(_) => "Plugin",
            Error::BadRequest(_) => "BadRequest",
            Error::PayloadTooLarge(_) => "PayloadTooLarge",
            Error::Serialization(_) => "Serialization",
            Error::Internal(_) => "Internal",
            Error::Io(_) => "Io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

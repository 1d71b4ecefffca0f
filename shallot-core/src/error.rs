// Error types for the Shallot runtime

use http::StatusCode;
use shallot_config::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid handler or route supplied during setup.
    #[error("Registration error: {0}")]
    Registration(String),

    /// A handler parameter could not be resolved from the container chain.
    #[error(
        "Dependency not satisfied: {dependency} (required by {})",
        .handler.unwrap_or("<unknown handler>")
    )]
    DependencyUnsatisfied {
        dependency: &'static str,
        handler: Option<&'static str>,
    },

    /// A handler panicked; the panic was caught by the invoker.
    #[error("Handler panicked: {handler}: {message}")]
    HandlerPanic {
        handler: &'static str,
        message: String,
    },

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),
}

impl Error {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Faults are failures of the runtime or of a handler's wiring, as opposed
    /// to a handler deliberately rejecting the request.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Error::DependencyUnsatisfied { .. } | Error::HandlerPanic { .. }
        )
    }

    pub(crate) fn unsatisfied<T: ?Sized>() -> Self {
        Error::DependencyUnsatisfied {
            dependency: std::any::type_name::<T>(),
            handler: None,
        }
    }

    /// Attribute an unattributed dependency failure to `name`.
    pub(crate) fn attribute(self, name: &'static str) -> Self {
        match self {
            Error::DependencyUnsatisfied {
                dependency,
                handler: None,
            } => Error::DependencyUnsatisfied {
                dependency,
                handler: Some(name),
            },
            other => other,
        }
    }
}

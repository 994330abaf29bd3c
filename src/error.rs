//! Error handling module for envkit
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Each variant maps to one failure class of the install engine, and
//! [`EnvkitError::is_fatal`] tells callers whether the current operation must
//! stop or may degrade and continue.

use thiserror::Error;

/// Main error type for envkit
#[derive(Error, Debug)]
pub enum EnvkitError {
    /// Catalog or settings missing/malformed. Callers degrade and continue.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A referenced set, role, environment or session does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Environment identifier collides with an existing one on disk
    #[error("Environment '{0}' already exists (refusing to reuse or overwrite it)")]
    AlreadyExists(String),

    /// A single package install failed after its attempt budget
    #[error("Install of '{package}' failed: {detail}")]
    TransientInstall { package: String, detail: String },

    /// The runtime creation primitive failed
    #[error("Environment creation failed: {0}")]
    EnvironmentCreation(String),

    /// Manifest or session write failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Validation errors (identifiers, settings values)
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for envkit operations
pub type Result<T> = std::result::Result<T, EnvkitError>;

impl EnvkitError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not-found error for the given kind ("Package set", "Job role", ...)
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create an already-exists error
    pub fn already_exists(name: impl Into<String>) -> Self {
        Self::AlreadyExists(name.into())
    }

    /// Create a transient install error
    pub fn transient_install(package: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::TransientInstall {
            package: package.into(),
            detail: detail.into(),
        }
    }

    /// Create an environment creation error
    pub fn environment_creation(msg: impl Into<String>) -> Self {
        Self::EnvironmentCreation(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Returns true if the error must abort the operation that raised it.
    ///
    /// Configuration, persistence and single-package failures are degradable:
    /// the caller warns and keeps going.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::Config(_) | Self::Persistence(_) | Self::TransientInstall { .. }
        )
    }
}

/// Error types for sqlx-rowmap
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No dialect is registered for the requested driver
    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    /// Named query compilation failed
    #[error("Bind error: {0}")]
    Bind(String),

    /// Placeholder was referenced but no argument was supplied for it
    #[error("Placeholder '{0}' was not bound by any argument")]
    UnboundPlaceholder(String),

    /// Destination shape is not usable for this result
    #[error("Invalid destination: {0}")]
    InvalidDest(String),

    /// A scanned value could not be converted to the requested type
    #[error("Coerce error on column '{column}': {message}")]
    CoerceDest { column: String, message: String },

    /// Single-row query matched zero rows
    #[error("No rows in result set")]
    NoRows,

    /// Error from SQLx database operations
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Error reported by a non-SQLx driver or cursor
    #[error("Driver error: {0}")]
    Driver(String),
}

impl Error {
    /// Create a coercion error for a specific column
    pub fn coerce(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CoerceDest {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create an invalid destination error
    pub fn invalid_dest(message: impl Into<String>) -> Self {
        Self::InvalidDest(message.into())
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Check if this is the "not found" condition of a single-row query
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// Check if the query could not be bound to its arguments
    pub fn is_bind_error(&self) -> bool {
        matches!(self, Self::Bind(_) | Self::UnboundPlaceholder(_))
    }
}

/// Result type alias for sqlx-rowmap operations
pub type Result<T> = std::result::Result<T, Error>;

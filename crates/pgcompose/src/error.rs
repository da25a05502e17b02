//! Error types for pgcompose

use thiserror::Error;

/// Result type alias for pgcompose operations
pub type ComposeResult<T> = Result<T, ComposeError>;

/// Errors produced while composing (and, through [`crate::Execer`], running) statements.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// The statement is malformed, incomplete, or its calls were made in the wrong order
    #[error("Validation error: {0}")]
    Validation(String),

    /// A record or value does not fit the columns it is mapped to
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A nested sub-query failed to build
    #[error("Sub-query '{alias}' failed: {source}")]
    Composition {
        alias: String,
        #[source]
        source: Box<ComposeError>,
    },

    /// Statement execution error
    #[error("Execute error: {0}")]
    Execute(#[from] tokio_postgres::Error),
}

impl ComposeError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch(message.into())
    }

    /// Wrap the error of a nested builder registered under `alias`
    pub fn composition(alias: impl Into<String>, source: ComposeError) -> Self {
        Self::Composition {
            alias: alias.into(),
            source: Box::new(source),
        }
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a schema mismatch error
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch(_))
    }

    /// Follow `Composition` wrappers down to the error that started it.
    pub fn root_cause(&self) -> &ComposeError {
        let mut err = self;
        while let Self::Composition { source, .. } = err {
            err = source;
        }
        err
    }

    /// Copy of an error a builder recorded, so `to_sql(&self)` can return it
    /// on every call.
    pub(crate) fn replay(&self) -> ComposeError {
        match self {
            Self::Validation(m) => Self::Validation(m.clone()),
            Self::SchemaMismatch(m) => Self::SchemaMismatch(m.clone()),
            Self::Composition { alias, source } => Self::Composition {
                alias: alias.clone(),
                source: Box::new(source.replay()),
            },
            // builders never record execution errors
            Self::Execute(e) => Self::Validation(e.to_string()),
        }
    }
}

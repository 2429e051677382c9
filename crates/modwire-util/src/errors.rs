use miette::Diagnostic;
use thiserror::Error;

/// Unified fault type for all modwire operations.
#[derive(Debug, Error, Diagnostic)]
pub enum ModwireError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A catalog fixture could not be read or is malformed.
    #[error("Catalog error: {message}")]
    #[diagnostic(help("Check the catalog file for syntax errors"))]
    Catalog { message: String },

    /// Resolver configuration could not be read or is malformed.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A match expression failed to parse.
    #[error("Invalid filter `{filter}`: {message}")]
    Filter { filter: String, message: String },

    /// A version or version range failed to parse.
    #[error("Invalid version `{input}`: {message}")]
    Version { input: String, message: String },

    /// `resolve` was called before a catalog was bound.
    #[error("No catalog is bound to this resolver")]
    #[diagnostic(help("Call `Resolver::bind` with a catalog before resolving"))]
    NoCatalog,

    /// A second, different catalog was bound to a resolver.
    #[error("Resolver is already bound to a catalog")]
    CatalogAlreadyBound,

    /// A module id was not found in the bound catalog.
    #[error("Unknown module id {id}")]
    UnknownModule { id: u64 },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type ModwireResult<T> = miette::Result<T>;

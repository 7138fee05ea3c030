//! Loader error types.

/// Errors raised while decoding the trailer or a module header.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// The last bytes of the image are not a dogfood trailer.
    #[error("No valid payload end marker found.")]
    MissingTrailer,

    /// The trailer points past the end of the payload.
    #[error("Payload offset {offset:#x} lies beyond the end of the payload ({end:#x}).")]
    PayloadOutOfRange { offset: u64, end: u64 },

    /// No module header (or no readable module name) at this offset.
    #[error("No valid start of module found at offset {offset:#x}.")]
    MissingHeader { offset: u64 },

    /// The header named a module but the rest of it does not match the grammar.
    #[error("Invalid header for module '{module}': {reason}.")]
    MalformedHeader { module: String, reason: &'static str },

    /// The entry module declared a zero-length body.
    #[error("Entry module '{module}' has an empty body.")]
    EmptyEntry { module: String },

    /// A module body runs past the end of the payload.
    #[error("Module '{module}' runs {excess} bytes past the end of the payload.")]
    Overrun { module: String, excess: u64 },
}

/// Errors that can occur while locating, loading, or executing a bundle.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// Trailer or header grammar violation
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The file ended before a module body was complete
    #[error("Cannot read the entire module '{module}' ({read} of {expected} bytes).")]
    ShortRead {
        module: String,
        expected: u64,
        read: u64,
    },

    /// The engine rejected a module
    #[error("Error while loading module '{module}'\n{message}")]
    Compile { module: String, message: String },

    /// The entry module raised an error while running
    #[error("{0}")]
    Runtime(String),
}

/// Errors raised while producing a bundle.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// File I/O error
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The name cannot be written as a module header
    #[error("Invalid module name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// The entry module has no body
    #[error("Entry module '{name}' has an empty body")]
    EmptyEntry { name: String },

    /// A size or offset does not fit in 8 hex digits
    #[error("{what} of {value} bytes does not fit in 8 hex digits")]
    TooLarge { what: &'static str, value: u64 },
}

impl LoadError {
    /// Build a compile error for `module` from an engine diagnostic.
    pub fn compile(module: &str, message: impl Into<String>) -> Self {
        LoadError::Compile {
            module: module.to_string(),
            message: message.into(),
        }
    }

    /// Whether the error was raised by the bundled program rather than the loader.
    pub fn is_runtime(&self) -> bool {
        matches!(self, LoadError::Runtime(_))
    }
}

//! Error types for arprule.

use thiserror::Error;

/// Error type for arprule operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed, missing, duplicate or illegal command-line input
    #[error("{0}")]
    Parameter(String),

    /// Table engine unavailable or extension version mismatch
    #[error("{0}")]
    Version(String),

    /// Extension rejected at registration time
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Table engine failure that aborts the invocation
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Invalid snapshot magic bytes
    #[error("invalid magic bytes: expected ARPRULE header")]
    InvalidMagic,

    /// Unsupported snapshot format version
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u32),

    /// Snapshot checksum mismatch
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Snapshot or record ended early
    #[error("truncated data: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file parsing error
    #[error("config parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build a parameter problem from any message.
    pub fn param(msg: impl Into<String>) -> Self {
        Error::Parameter(msg.into())
    }

    /// Process exit status for this error.
    ///
    /// Parameter problems exit with 2 and version problems with 3, the
    /// same statuses the classic netfilter front-ends use.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Parameter(_) => 2,
            Error::Version(_) | Error::Registration(RegistrationError::VersionMismatch { .. }) => 3,
            _ => 1,
        }
    }

    /// Whether the user should be pointed at `--help`.
    pub fn wants_help_hint(&self) -> bool {
        matches!(self, Error::Parameter(_))
    }
}

/// Result type alias for arprule operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for extension registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Extension was built against another release
    #[error("{kind} `{name}' v{found} (I'm v{expected})")]
    VersionMismatch {
        kind: &'static str,
        name: String,
        found: String,
        expected: String,
    },

    /// Name already taken by another extension of the same kind
    #[error("{kind} `{name}' already registered")]
    Duplicate { kind: &'static str, name: String },

    /// Declared block size is not a multiple of the record alignment
    #[error("{kind} `{name}' has invalid size {size}")]
    InvalidSize {
        kind: &'static str,
        name: String,
        size: usize,
    },

    /// Option code does not fit inside one namespace window
    #[error("{kind} `{name}' option `--{option}' has out-of-window code {code}")]
    InvalidOptionCode {
        kind: &'static str,
        name: String,
        option: String,
        code: u32,
    },
}

/// Error type reported by a table engine.
///
/// The display text doubles as the engine's "last error" description.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Unknown chain, target or match
    #[error("No chain/target/match by that name")]
    NoSuchChain(String),

    /// Chain creation with an existing name
    #[error("Chain already exists")]
    ChainExists(String),

    /// Built-in chains cannot be deleted or renamed
    #[error("Can't delete built-in chain")]
    BuiltinChain(String),

    /// Chain still holds rules
    #[error("Directory not empty")]
    ChainNotEmpty(String),

    /// Chain is still referenced by jumps
    #[error("Too many links")]
    ChainReferenced(String),

    /// No rule matched for a delete by content
    #[error("Bad rule (does a matching rule exist in that chain?)")]
    NoMatchingRule,

    /// Insert position past the end of the chain
    #[error("Index of insertion too big")]
    InsertIndex(u32),

    /// Replace position past the end of the chain
    #[error("Index of replacement too big")]
    ReplaceIndex(u32),

    /// Delete position past the end of the chain
    #[error("Index of deletion too big")]
    DeleteIndex(u32),

    /// Policy requested on a user-defined chain
    #[error("Bad built-in chain name")]
    NotBuiltin(String),

    /// Policy other than ACCEPT or DROP
    #[error("Bad policy name")]
    BadPolicy(String),

    /// Record bytes could not be decoded
    #[error("Invalid rule record: {0}")]
    BadRecord(String),
}

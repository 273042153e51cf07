//! Error types for the block snapshot subsystem.
//!
//! Error codes:
//! - BLOCK_ALREADY_LOADED (ERROR severity)
//! - BLOCK_NOT_LOADED (ERROR severity)
//! - BLOCK_IO (ERROR severity)
//! - BLOCK_CORRUPT (ERROR severity)
//! - BLOCK_INVALID_ARGUMENT (ERROR severity)

use std::fmt;
use std::io;

/// Severity levels for block errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, caller continues.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Block-subsystem error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockErrorCode {
    /// Snapshot load attempted while a live snapshot is already loaded.
    AlreadyLoaded,
    /// Unload or snapshot called before a successful load.
    NotLoaded,
    /// Backing-file read/write/truncate/fsync failure.
    Io,
    /// Cookie decode failure, checksum mismatch, or extent-list read inconsistency.
    Corrupt,
    /// Malformed snapshot list (missing ADD terminal, DELETE with no successor, etc).
    InvalidArgument,
}

impl BlockErrorCode {
    /// Returns the string code.
    pub fn code(&self) -> &'static str {
        match self {
            BlockErrorCode::AlreadyLoaded => "BLOCK_ALREADY_LOADED",
            BlockErrorCode::NotLoaded => "BLOCK_NOT_LOADED",
            BlockErrorCode::Io => "BLOCK_IO",
            BlockErrorCode::Corrupt => "BLOCK_CORRUPT",
            BlockErrorCode::InvalidArgument => "BLOCK_INVALID_ARGUMENT",
        }
    }

    /// Returns the severity level for this error.
    ///
    /// All block errors are ERROR severity: a failed snapshot operation
    /// surfaces to the caller but never requires process termination.
    pub fn severity(&self) -> Severity {
        Severity::Error
    }
}

impl fmt::Display for BlockErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Block-subsystem error with full context.
#[derive(Debug)]
pub struct BlockError {
    code: BlockErrorCode,
    message: String,
    details: Option<String>,
    source: Option<io::Error>,
}

impl BlockError {
    /// Snapshot load attempted while already loaded.
    pub fn already_loaded(message: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::AlreadyLoaded,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Unload/snapshot called before load.
    pub fn not_loaded(message: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::NotLoaded,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// I/O failure with an underlying source error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: BlockErrorCode::Io,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Corruption detected (cookie, checksum, or extent-list inconsistency).
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::Corrupt,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Malformed snapshot list.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            code: BlockErrorCode::InvalidArgument,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Attach additional free-text details.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> BlockErrorCode {
        self.code
    }

    /// Returns the severity level.
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional details, if any.
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Block errors are never fatal; they are ERROR severity only.
    pub fn is_fatal(&self) -> bool {
        false
    }
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for BlockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for block-subsystem operations.
pub type BlockResult<T> = Result<T, BlockError>;

//! Error types for table operations.
//!
//! Only synchronous failures are represented here: a request either fails
//! at submission and never fires a callback, or it is submitted and its
//! outcome arrives through the callback registry. A store that loses a
//! submitted request has no path back to the caller; see
//! [`CallbackRegistry::expire_stale`](crate::callback::CallbackRegistry::expire_stale)
//! for the explicit policy covering that case.

use crate::codec::CodecError;
use core::fmt;

/// The kind of table error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The backing store client rejected a command or subscription
    /// synchronously (for example, no connection).
    Submission,
    /// The requested entry is not known locally.
    NotFound,
    /// The operation is declared but has no defined semantics.
    NotImplemented,
    /// A record could not be encoded for submission.
    Codec,
    /// Object notifications were requested before the notification channel
    /// was subscribed.
    NoSubscription,
    /// The notification channel is already subscribed.
    AlreadySubscribed,
    /// The local client is already connected to the membership table.
    AlreadyConnected,
    /// The local client has not connected to the membership table.
    NotConnected,
    /// The local client has disconnected; its identity cannot be reused.
    Disconnected,
    /// OS entropy was unavailable while minting an identifier.
    Entropy,
    /// The configuration is invalid.
    Config,
}

impl ErrorKind {
    /// Returns a short static description of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Submission => "command submission failed",
            Self::NotFound => "not found",
            Self::NotImplemented => "not implemented",
            Self::Codec => "record encoding failed",
            Self::NoSubscription => "notification channel not subscribed",
            Self::AlreadySubscribed => "notification channel already subscribed",
            Self::AlreadyConnected => "client already connected",
            Self::NotConnected => "client not connected",
            Self::Disconnected => "client disconnected",
            Self::Entropy => "entropy source unavailable",
            Self::Config => "invalid configuration",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a table operation.
///
/// # Example
///
/// ```
/// use gcs_tables::{Error, ErrorKind};
///
/// let err = Error::not_found().with_context("client 00ff");
///
/// assert!(err.is_not_found());
/// assert!(err.to_string().contains("00ff"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    context: Option<String>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Creates a submission failure error.
    #[must_use]
    pub const fn submission() -> Self {
        Self::new(ErrorKind::Submission)
    }

    /// Creates a not-found error.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::new(ErrorKind::NotFound)
    }

    /// Creates a not-implemented error; `operation` names the call and
    /// its arguments.
    #[must_use]
    pub fn not_implemented(operation: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented).with_context(operation)
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config).with_context(reason)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns `true` if the store rejected the request synchronously.
    #[must_use]
    pub const fn is_submission(&self) -> bool {
        matches!(self.kind, ErrorKind::Submission)
    }

    /// Returns `true` if this is a local cache miss.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound)
    }

    /// Returns `true` if the operation has no defined semantics.
    #[must_use]
    pub const fn is_not_implemented(&self) -> bool {
        matches!(self.kind, ErrorKind::NotImplemented)
    }

    /// Adds context to the error.
    #[must_use]
    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context = Some(ctx.into());
        self
    }

    /// Returns the error context, if any.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ctx) = &self.context {
            write!(f, ": {ctx}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Self::new(ErrorKind::Codec).with_context(e.to_string())
    }
}

/// Result type for table operations.
pub type Result<T> = core::result::Result<T, Error>;

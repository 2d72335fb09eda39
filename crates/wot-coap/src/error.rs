use std::borrow::Cow;

use crate::content_format;
use crate::method::ResponseCode;

/// All possible error kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A target URI is malformed or uses an unsupported scheme.
    Uri,
    /// A resolved request method has no implementation.
    UnsupportedMethod,
    /// Pre-shared key security is required but cannot be established.
    Security,
    /// The underlying transport failed.
    Transport,
    /// No response has been received for a request.
    Send,
    /// A device answered with an error response code.
    Response,
    /// A response carries an unexpected content-format.
    ContentFormat,
    /// A `CoRE Link-Format` payload is malformed.
    LinkFormat,
    /// A discovery process failed.
    Discovery,
    /// An exchange has been aborted before completion.
    Aborted,
    /// A configuration is invalid.
    Config,
}

impl ErrorKind {
    pub(crate) const fn description(self) -> &'static str {
        match self {
            Self::Uri => "Uri",
            Self::UnsupportedMethod => "Unsupported Method",
            Self::Security => "Security",
            Self::Transport => "Transport",
            Self::Send => "Send",
            Self::Response => "Response",
            Self::ContentFormat => "Content-Format",
            Self::LinkFormat => "Link-Format",
            Self::Discovery => "Discovery",
            Self::Aborted => "Aborted",
            Self::Config => "Config",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// A binding error.
#[derive(PartialEq)]
pub struct Error {
    kind: ErrorKind,
    info: Cow<'static, str>,
}

impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error())
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.error())
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates an [`Error`] from an [`ErrorKind`] and a description.
    pub fn new(kind: ErrorKind, info: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            info: info.into(),
        }
    }

    /// Returns the [`ErrorKind`].
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error description.
    #[must_use]
    pub fn info(&self) -> &str {
        &self.info
    }

    pub(crate) fn send(uri: &str, cause: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::Send,
            format!("Failed to send request to `{uri}`: {cause}"),
        )
    }

    pub(crate) fn discovery(uri: &str, cause: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::Discovery,
            format!("Discovery on `{uri}` failed: {cause}"),
        )
    }

    pub(crate) fn response(uri: &str, code: ResponseCode) -> Self {
        Self::new(
            ErrorKind::Response,
            format!("`{uri}` answered with the `{code}` error code"),
        )
    }

    pub(crate) fn content_format(uri: &str, expected: u16, actual: Option<u16>) -> Self {
        let actual = actual.map_or_else(|| "none".into(), content_format::describe);
        Self::new(
            ErrorKind::ContentFormat,
            format!(
                "`{uri}` answered with content-format {actual}, expected {}",
                content_format::describe(expected)
            ),
        )
    }

    pub(crate) fn aborted(uri: &str) -> Self {
        Self::new(
            ErrorKind::Aborted,
            format!("The exchange with `{uri}` has been aborted"),
        )
    }

    fn error(&self) -> String {
        format!("{}: {}", self.kind, self.info)
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Self::new(ErrorKind::Uri, e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new(ErrorKind::Config, e.to_string())
    }
}

/// A specialized [`Result`] type for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

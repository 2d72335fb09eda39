use crate::error::{Error, ErrorKind, Result};

/// All [`RequestMethod`]s.
pub const ALL_METHODS: &[RequestMethod] = &[
    RequestMethod::Get,
    RequestMethod::Post,
    RequestMethod::Put,
    RequestMethod::Delete,
    RequestMethod::Fetch,
    RequestMethod::Patch,
    RequestMethod::IPatch,
];

/// A `CoAP` request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestMethod {
    /// `GET` method.
    Get,
    /// `POST` method.
    Post,
    /// `PUT` method.
    Put,
    /// `DELETE` method.
    Delete,
    /// `FETCH` method.
    Fetch,
    /// `PATCH` method.
    Patch,
    /// `iPATCH` method.
    IPatch,
}

impl std::fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl RequestMethod {
    /// Returns the method name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Fetch => "FETCH",
            Self::Patch => "PATCH",
            Self::IPatch => "iPATCH",
        }
    }

    /// Returns the method code, as written in the `CoAP` header detail.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Get => 1,
            Self::Post => 2,
            Self::Put => 3,
            Self::Delete => 4,
            Self::Fetch => 5,
            Self::Patch => 6,
            Self::IPatch => 7,
        }
    }

    /// Returns the [`RequestMethod`] with the given name.
    ///
    /// The return value is [`None`] when the name is unknown.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        ALL_METHODS.iter().find(|m| m.name() == name).copied()
    }

    /// Returns the [`RequestMethod`] with the given code.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        ALL_METHODS.iter().find(|m| m.code() == code).copied()
    }

    /// Whether the binding is able to execute the method.
    ///
    /// `FETCH` and `PATCH` are declared but cannot be executed yet.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(self, Self::Fetch | Self::Patch)
    }

    // Fails before any network activity takes place.
    pub(crate) fn ensure_supported(self, uri: &str) -> Result<Self> {
        if self.is_supported() {
            Ok(self)
        } else {
            Err(Error::new(
                ErrorKind::UnsupportedMethod,
                format!("The `{self}` method requested for `{uri}` is not supported"),
            ))
        }
    }
}

/// The reliability of a `CoAP` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// The message must be acknowledged, so the transport retransmits it
    /// until a response arrives or its attempts are exhausted.
    Confirmable,
    /// The message is sent once, on a best-effort basis.
    NonConfirmable,
}

/// A `CoAP` response code, written as `class.detail`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseCode {
    /// Code class.
    pub class: u8,
    /// Code detail.
    pub detail: u8,
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.class, self.detail)
    }
}

impl ResponseCode {
    /// `2.01 Created`.
    pub const CREATED: Self = Self::new(2, 1);
    /// `2.02 Deleted`.
    pub const DELETED: Self = Self::new(2, 2);
    /// `2.03 Valid`.
    pub const VALID: Self = Self::new(2, 3);
    /// `2.04 Changed`.
    pub const CHANGED: Self = Self::new(2, 4);
    /// `2.05 Content`.
    pub const CONTENT: Self = Self::new(2, 5);
    /// `4.00 Bad Request`.
    pub const BAD_REQUEST: Self = Self::new(4, 0);
    /// `4.04 Not Found`.
    pub const NOT_FOUND: Self = Self::new(4, 4);
    /// `4.05 Method Not Allowed`.
    pub const METHOD_NOT_ALLOWED: Self = Self::new(4, 5);
    /// `5.00 Internal Server Error`.
    pub const INTERNAL_SERVER_ERROR: Self = Self::new(5, 0);

    /// Creates a [`ResponseCode`].
    #[must_use]
    pub const fn new(class: u8, detail: u8) -> Self {
        Self { class, detail }
    }

    /// Creates a [`ResponseCode`] from its raw header byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        Self::new(byte >> 5, byte & 0x1f)
    }

    /// Returns the raw header byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        (self.class << 5) | (self.detail & 0x1f)
    }

    /// Whether the code reports a success.
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.class == 2
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::{ALL_METHODS, RequestMethod, ResponseCode};

    #[test]
    fn method_names_and_codes() {
        for method in ALL_METHODS {
            assert_eq!(RequestMethod::from_name(method.name()), Some(*method));
            assert_eq!(RequestMethod::from_code(method.code()), Some(*method));
        }

        assert_eq!(RequestMethod::from_name("get"), None);
        assert_eq!(RequestMethod::from_name("iPATCH"), Some(RequestMethod::IPatch));
        assert_eq!(RequestMethod::from_code(0), None);
    }

    #[test]
    fn unsupported_methods() {
        let uri = "coap://lamp.local/properties/on";

        assert_eq!(RequestMethod::Get.ensure_supported(uri), Ok(RequestMethod::Get));
        assert_eq!(RequestMethod::IPatch.ensure_supported(uri), Ok(RequestMethod::IPatch));

        for method in [RequestMethod::Fetch, RequestMethod::Patch] {
            let error = method.ensure_supported(uri).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::UnsupportedMethod);
            assert!(error.info().contains(uri));
        }
    }

    #[test]
    fn response_codes() {
        assert_eq!(ResponseCode::CONTENT.to_string(), "2.05");
        assert_eq!(ResponseCode::CONTENT.to_byte(), 69);
        assert_eq!(ResponseCode::from_byte(132), ResponseCode::NOT_FOUND);
        assert!(ResponseCode::CHANGED.is_success());
        assert!(!ResponseCode::NOT_FOUND.is_success());
    }
}

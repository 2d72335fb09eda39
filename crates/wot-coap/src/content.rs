use bytes::Bytes;

use crate::content_format::{self, DEFAULT_MEDIA_TYPE, UNKNOWN_MEDIA_TYPE};
use crate::transport::CoapResponse;

/// A payload exchanged with a thing, labelled with its media type.
///
/// The payload is single-consumer: it is handed over either as a whole or as
/// a byte stream, and the [`Content`] is consumed in both cases.
/// Interpreting the payload according to its media type is left to the
/// caller.
#[derive(Debug, PartialEq, Eq)]
pub struct Content {
    media_type: String,
    body: Bytes,
}

impl Content {
    /// Creates a [`Content`].
    #[must_use]
    pub fn new(media_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            body: body.into(),
        }
    }

    /// Creates a [`Content`] without payload.
    #[must_use]
    pub fn empty(media_type: impl Into<String>) -> Self {
        Self::new(media_type, Bytes::new())
    }

    /// Returns the media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Whether the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// Consumes the [`Content`] and returns its whole payload.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.body
    }

    /// Consumes the [`Content`] and opens a stream over its payload.
    #[cfg(feature = "stream")]
    pub fn open_stream(self) -> impl futures_util::Stream<Item = Bytes> {
        futures_util::stream::iter((!self.body.is_empty()).then_some(self.body))
    }

    // Labels a response payload with the media type of its content-format.
    pub(crate) fn from_response(response: CoapResponse) -> Self {
        let media_type = match response.content_format {
            None => DEFAULT_MEDIA_TYPE,
            Some(code) => content_format::to_media_type(code).unwrap_or(UNKNOWN_MEDIA_TYPE),
        };
        Self::new(media_type, response.payload)
    }
}

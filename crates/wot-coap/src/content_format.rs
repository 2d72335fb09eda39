/// `text/plain; charset=utf-8` content-format.
pub const TEXT_PLAIN: u16 = 0;
/// `application/link-format` content-format.
pub const LINK_FORMAT: u16 = 40;
/// `application/octet-stream` content-format.
pub const OCTET_STREAM: u16 = 42;
/// `application/json` content-format.
pub const JSON: u16 = 50;
/// `application/cbor` content-format.
pub const CBOR: u16 = 60;
/// `application/td+json` content-format.
pub const THING_DESCRIPTION: u16 = 432;

/// Media type of a `CoRE Link-Format` payload.
pub const LINK_FORMAT_MEDIA_TYPE: &str = "application/link-format";
/// Media type of a Thing Description.
pub const THING_DESCRIPTION_MEDIA_TYPE: &str = "application/td+json";
/// Media type assigned to a response which does not declare its
/// content-format.
pub const DEFAULT_MEDIA_TYPE: &str = "application/json";
/// Media type assigned to a response whose content-format is not registered.
pub const UNKNOWN_MEDIA_TYPE: &str = "application/octet-stream";

// Registered `CoAP` content-formats.
//
// The first entry for a code is its canonical media type.
const CONTENT_FORMATS: &[(u16, &str)] = &[
    (TEXT_PLAIN, "text/plain"),
    (TEXT_PLAIN, "text/plain; charset=utf-8"),
    (LINK_FORMAT, LINK_FORMAT_MEDIA_TYPE),
    (41, "application/xml"),
    (OCTET_STREAM, "application/octet-stream"),
    (47, "application/exi"),
    (JSON, "application/json"),
    (51, "application/json-patch+json"),
    (52, "application/merge-patch+json"),
    (CBOR, "application/cbor"),
    (61, "application/cwt"),
    (110, "application/senml+json"),
    (111, "application/sensml+json"),
    (112, "application/senml+cbor"),
    (113, "application/sensml+cbor"),
    (THING_DESCRIPTION, THING_DESCRIPTION_MEDIA_TYPE),
];

/// Returns the content-format registered for a media type.
///
/// When the whole media type is not registered, its parameters are
/// discarded and the lookup is repeated on the bare type.
#[must_use]
pub fn from_media_type(media_type: &str) -> Option<u16> {
    let media_type = media_type.trim();
    lookup(media_type).or_else(|| {
        media_type
            .split_once(';')
            .and_then(|(essence, _)| lookup(essence.trim_end()))
    })
}

/// Returns the canonical media type of a content-format.
#[must_use]
pub fn to_media_type(content_format: u16) -> Option<&'static str> {
    CONTENT_FORMATS
        .iter()
        .find(|(code, _)| *code == content_format)
        .map(|(_, media_type)| *media_type)
}

/// Returns a description of a content-format to be written in messages.
#[must_use]
pub fn describe(content_format: u16) -> String {
    match to_media_type(content_format) {
        Some(media_type) => format!("{content_format} ({media_type})"),
        None => content_format.to_string(),
    }
}

fn lookup(media_type: &str) -> Option<u16> {
    CONTENT_FORMATS
        .iter()
        .find(|(_, registered)| registered.eq_ignore_ascii_case(media_type))
        .map(|(code, _)| *code)
}

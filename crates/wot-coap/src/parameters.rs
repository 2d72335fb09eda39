use serde_json::Value;

use tracing::{debug, warn};

use url::Url;

use wot_form::form::Form;
use wot_form::operation::OperationType;

use crate::content_format::{self, TEXT_PLAIN};
use crate::method::RequestMethod;
use crate::transport::CoapRequest;

/// Form term overriding the request method.
pub const METHOD_TERM: &str = "cov:method";
/// Form term overriding the request content-format.
pub const CONTENT_FORMAT_TERM: &str = "cov:contentFormat";
/// Form term overriding the accepted content-format.
pub const ACCEPT_TERM: &str = "cov:accept";
/// Form term grouping the blockwise size hints.
pub const BLOCKWISE_TERM: &str = "cov:blockwise";
/// Blockwise term hinting the request payload block size.
pub const BLOCK1_SIZE_TERM: &str = "cov:block1Size";
/// Blockwise term hinting the response payload block size.
pub const BLOCK2_SIZE_TERM: &str = "cov:block2Size";
/// Subprotocol name of an observe relation.
pub const OBSERVE_SUBPROTOCOL: &str = "cov:observe";

/// The block sizes a `CoAP` transport negotiates on its own.
pub const CANONICAL_BLOCK_SIZES: &[u16] = &[16, 32, 64, 128, 256, 512, 1024];

/// A subprotocol supported by the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subprotocol {
    /// An observe relation.
    Observe,
}

/// The `CoAP` parameters derived from a form and an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestParameters {
    /// Request method.
    pub method: RequestMethod,
    /// Content-format of the request payload.
    pub content_format: u16,
    /// Content-format accepted for the response.
    pub accept: u16,
    /// Preferred block size for the request payload.
    pub block1: Option<u16>,
    /// Preferred block size for the response payload.
    pub block2: Option<u16>,
    /// Subprotocol.
    pub subprotocol: Option<Subprotocol>,
}

impl RequestParameters {
    /// Resolves the [`RequestParameters`] of a [`Form`].
    ///
    /// Explicit form terms always win, while the [`OperationType`] is the
    /// fallback for the request method and the subprotocol.
    /// Unrecognized terms are ignored.
    #[must_use]
    pub fn resolve(form: &Form, operation: OperationType) -> Self {
        Self {
            method: resolve_method(form, operation),
            content_format: resolve_content_format(form, CONTENT_FORMAT_TERM, form.media_type()),
            accept: resolve_content_format(form, ACCEPT_TERM, form.accept_type()),
            block1: resolve_block_size(form, BLOCK1_SIZE_TERM),
            block2: resolve_block_size(form, BLOCK2_SIZE_TERM),
            subprotocol: resolve_subprotocol(form, operation),
        }
    }

    /// Whether the parameters describe an observe relation.
    #[must_use]
    pub fn is_observe(&self) -> bool {
        self.subprotocol == Some(Subprotocol::Observe)
    }

    pub(crate) fn request(&self, uri: Url) -> CoapRequest {
        let mut request = CoapRequest::new(self.method, uri).accept(self.accept);
        request.content_format = Some(self.content_format);
        request.block1 = self.block1;
        request.block2 = self.block2;
        request.observe = self.is_observe();
        request
    }
}

/// Returns the request method associated with an [`OperationType`].
#[must_use]
pub const fn default_method(operation: OperationType) -> RequestMethod {
    match operation {
        OperationType::ReadProperty
        | OperationType::ReadMultipleProperties
        | OperationType::ReadAllProperties
        | OperationType::ObserveProperty
        | OperationType::UnobserveProperty
        | OperationType::SubscribeEvent
        | OperationType::UnsubscribeEvent => RequestMethod::Get,
        OperationType::WriteProperty | OperationType::WriteMultipleProperties => {
            RequestMethod::Put
        }
        OperationType::InvokeAction => RequestMethod::Post,
    }
}

fn resolve_method(form: &Form, operation: OperationType) -> RequestMethod {
    match form.extension_value(METHOD_TERM) {
        Some(Value::String(name)) => {
            if let Some(method) = RequestMethod::from_name(name) {
                return method;
            }
            warn!("Unknown `{METHOD_TERM}` value `{name}` for `{}`, ignore it", form.href());
        }
        Some(value) => {
            warn!("Invalid `{METHOD_TERM}` value {value} for `{}`, ignore it", form.href());
        }
        None => {}
    }
    default_method(operation)
}

fn resolve_content_format(form: &Form, term: &str, media_type: &str) -> u16 {
    let explicit = match form.extension_value(term) {
        Some(Value::Array(values)) => values.first().and_then(as_u16),
        Some(value) => as_u16(value),
        None => None,
    };

    explicit.unwrap_or_else(|| {
        content_format::from_media_type(media_type).unwrap_or_else(|| {
            debug!("No content-format registered for `{media_type}`, use `text/plain`");
            TEXT_PLAIN
        })
    })
}

// Only a size outside the canonical set is taken as a preference, so the
// transport keeps negotiating its own preferred size otherwise.
// This inverted condition is the documented behavior, it is kept until
// its intent is confirmed.
fn resolve_block_size(form: &Form, term: &str) -> Option<u16> {
    let size = form
        .extension_value(BLOCKWISE_TERM)
        .and_then(|blockwise| blockwise.get(term))
        .and_then(as_u16)?;

    if CANONICAL_BLOCK_SIZES.contains(&size) {
        debug!("Block size {size} for `{term}` is left to the transport negotiation");
        None
    } else {
        Some(size)
    }
}

fn resolve_subprotocol(form: &Form, operation: OperationType) -> Option<Subprotocol> {
    match form.subprotocol_name() {
        Some(OBSERVE_SUBPROTOCOL) => Some(Subprotocol::Observe),
        Some(subprotocol) => {
            warn!(
                "Subprotocol `{subprotocol}` of `{}` is not supported, ignore it",
                form.href()
            );
            None
        }
        None => operation.is_subscription().then_some(Subprotocol::Observe),
    }
}

fn as_u16(value: &Value) -> Option<u16> {
    value.as_u64().and_then(|value| u16::try_from(value).ok())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use wot_form::form::Form;
    use wot_form::operation::{ALL_OPERATIONS, OperationType};

    use crate::content_format::{CBOR, JSON, LINK_FORMAT, TEXT_PLAIN};
    use crate::method::RequestMethod;

    use super::{
        BLOCKWISE_TERM, CANONICAL_BLOCK_SIZES, OBSERVE_SUBPROTOCOL, RequestParameters,
        Subprotocol,
    };

    const HREF: &str = "coap://lamp.local/properties/brightness";

    fn resolve(form: &Form, operation: OperationType) -> RequestParameters {
        RequestParameters::resolve(form, operation)
    }

    #[test]
    fn explicit_method_wins() {
        for name in ["GET", "PUT", "POST", "DELETE"] {
            let form = Form::new(HREF).extension("cov:method", json!(name));
            for operation in ALL_OPERATIONS {
                assert_eq!(
                    resolve(&form, *operation).method,
                    RequestMethod::from_name(name).unwrap()
                );
            }
        }
    }

    #[test]
    fn operation_fallback_method() {
        let form = Form::new(HREF);
        for operation in ALL_OPERATIONS {
            let method = resolve(&form, *operation).method;
            if operation.is_read() || operation.is_subscription() || operation.is_unsubscription()
            {
                assert_eq!(method, RequestMethod::Get, "{operation}");
            } else if operation.is_write() {
                assert_eq!(method, RequestMethod::Put, "{operation}");
            } else {
                assert_eq!(method, RequestMethod::Post, "{operation}");
            }
        }

        // Unknown or malformed overrides fall back to the operation.
        let form = Form::new(HREF).extension("cov:method", json!("BREW"));
        assert_eq!(
            resolve(&form, OperationType::InvokeAction).method,
            RequestMethod::Post
        );
        let form = Form::new(HREF).extension("cov:method", json!(3));
        assert_eq!(
            resolve(&form, OperationType::WriteProperty).method,
            RequestMethod::Put
        );
    }

    #[test]
    fn content_format_resolution() {
        // Derived from the media types.
        let form = Form::new(HREF)
            .content_type("application/cbor")
            .response_content_type("application/link-format");
        let parameters = resolve(&form, OperationType::ReadProperty);
        assert_eq!(parameters.content_format, CBOR);
        assert_eq!(parameters.accept, LINK_FORMAT);

        // Unregistered media types.
        let form = Form::new(HREF).content_type("image/png");
        let parameters = resolve(&form, OperationType::ReadProperty);
        assert_eq!(parameters.content_format, TEXT_PLAIN);
        assert_eq!(parameters.accept, TEXT_PLAIN);

        // Numeric and first-of-list overrides.
        let form = Form::new(HREF)
            .content_type("application/cbor")
            .extension("cov:contentFormat", json!(50))
            .extension("cov:accept", json!([60, 50]));
        let parameters = resolve(&form, OperationType::ReadProperty);
        assert_eq!(parameters.content_format, JSON);
        assert_eq!(parameters.accept, CBOR);

        // Invalid overrides are ignored.
        let form = Form::new(HREF)
            .extension("cov:contentFormat", json!("json"))
            .extension("cov:accept", json!(["cbor", 60]));
        let parameters = resolve(&form, OperationType::ReadProperty);
        assert_eq!(parameters.content_format, JSON);
        assert_eq!(parameters.accept, JSON);
    }

    #[test]
    fn canonical_block_size_is_not_an_override() {
        for size in CANONICAL_BLOCK_SIZES {
            let form = Form::new(HREF).extension(
                BLOCKWISE_TERM,
                json!({ "cov:block1Size": size, "cov:block2Size": size }),
            );
            let parameters = resolve(&form, OperationType::WriteProperty);
            assert_eq!(parameters.block1, None);
            assert_eq!(parameters.block2, None);
        }
    }

    #[test]
    fn non_canonical_block_size_is_an_override() {
        let form = Form::new(HREF).extension(
            BLOCKWISE_TERM,
            json!({ "cov:block1Size": 100, "cov:block2Size": 64 }),
        );
        let parameters = resolve(&form, OperationType::WriteProperty);
        assert_eq!(parameters.block1, Some(100));
        assert_eq!(parameters.block2, None);

        // No hints at all.
        let parameters = resolve(&Form::new(HREF), OperationType::WriteProperty);
        assert_eq!(parameters.block1, None);
        assert_eq!(parameters.block2, None);
    }

    #[test]
    fn subprotocol_resolution() {
        let form = Form::new(HREF);
        assert_eq!(
            resolve(&form, OperationType::ObserveProperty).subprotocol,
            Some(Subprotocol::Observe)
        );
        assert_eq!(
            resolve(&form, OperationType::SubscribeEvent).subprotocol,
            Some(Subprotocol::Observe)
        );
        assert_eq!(resolve(&form, OperationType::ReadProperty).subprotocol, None);
        assert_eq!(resolve(&form, OperationType::UnobserveProperty).subprotocol, None);

        // Explicit annotation wins over the operation.
        let form = Form::new(HREF).subprotocol(OBSERVE_SUBPROTOCOL);
        assert!(resolve(&form, OperationType::ReadProperty).is_observe());

        let form = Form::new(HREF).subprotocol("longpoll");
        assert_eq!(resolve(&form, OperationType::SubscribeEvent).subprotocol, None);
    }

    #[test]
    fn request_from_parameters() {
        let form = Form::new(HREF).extension(BLOCKWISE_TERM, json!({ "cov:block2Size": 100 }));
        let parameters = resolve(&form, OperationType::ObserveProperty);
        let request = parameters.request(HREF.parse().unwrap());

        assert_eq!(request.method, RequestMethod::Get);
        assert_eq!(request.content_format, Some(JSON));
        assert_eq!(request.accept, Some(JSON));
        assert_eq!(request.block2, Some(100));
        assert!(request.observe);
        assert_eq!(request.payload, None);
    }
}

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::DefaultHashBuilder;

use indexmap::IndexMap;

use serde::Serialize;
use serde_json::Value;

use crate::operation::OperationType;

/// The media type assumed when a form does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Protocol-specific terms of a form, in declaration order.
pub type Extensions = IndexMap<String, Value, DefaultHashBuilder>;

fn default_content_type() -> String {
    DEFAULT_CONTENT_TYPE.into()
}

// A term which can be written either as a single value or as an array.
#[cfg(feature = "deserialize")]
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::Deserialize<'de>,
{
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }

    <OneOrMany<T> as serde::Deserialize>::deserialize(deserializer).map(|value| match value {
        OneOrMany::One(value) => alloc::vec![value],
        OneOrMany::Many(values) => values,
    })
}

/// The response a consumer expects when performing the interaction
/// described by a form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct ExpectedResponse {
    /// Media type of the response payload.
    #[serde(rename = "contentType")]
    pub content_type: String,
}

/// A form.
///
/// A form describes how to perform one interaction with a thing over one
/// protocol binding: where to send the request, which media types are
/// exchanged, which operations it serves, and which security definitions
/// protect it.
///
/// Any term not covered by this structure is kept among the form
/// [`Extensions`], so a protocol binding can retrieve its own vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "deserialize", derive(serde::Deserialize))]
pub struct Form {
    href: String,
    #[serde(rename = "contentType", default = "default_content_type")]
    content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    response: Option<ExpectedResponse>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[cfg_attr(feature = "deserialize", serde(deserialize_with = "one_or_many"))]
    op: Vec<OperationType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subprotocol: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[cfg_attr(feature = "deserialize", serde(deserialize_with = "one_or_many"))]
    security: Vec<String>,
    #[serde(flatten)]
    extensions: Extensions,
}

impl Form {
    /// Creates a [`Form`] targeting the given URI.
    ///
    /// The payload media type defaults to [`DEFAULT_CONTENT_TYPE`].
    #[must_use]
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            content_type: default_content_type(),
            response: None,
            op: Vec::new(),
            subprotocol: None,
            security: Vec::new(),
            extensions: Extensions::default(),
        }
    }

    /// Sets the payload media type.
    #[must_use]
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Sets the media type expected for a response.
    #[must_use]
    pub fn response_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.response = Some(ExpectedResponse {
            content_type: content_type.into(),
        });
        self
    }

    /// Adds an [`OperationType`] served by the form.
    #[must_use]
    pub fn op(mut self, operation: OperationType) -> Self {
        if !self.op.contains(&operation) {
            self.op.push(operation);
        }
        self
    }

    /// Sets the subprotocol.
    #[must_use]
    pub fn subprotocol(mut self, subprotocol: impl Into<String>) -> Self {
        self.subprotocol = Some(subprotocol.into());
        self
    }

    /// Adds a reference to a security definition.
    #[must_use]
    pub fn security(mut self, name: impl Into<String>) -> Self {
        self.security.push(name.into());
        self
    }

    /// Adds a protocol-specific term.
    ///
    /// A term with the same name is replaced.
    #[must_use]
    pub fn extension(mut self, name: &str, value: Value) -> Self {
        let _ = self.extensions.insert(name.to_string(), value);
        self
    }

    /// Returns the target URI.
    #[must_use]
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Returns the payload media type.
    #[must_use]
    pub fn media_type(&self) -> &str {
        &self.content_type
    }

    /// Returns the media type accepted for a response.
    ///
    /// When the form does not describe its response, the payload media type
    /// is accepted.
    #[must_use]
    pub fn accept_type(&self) -> &str {
        self.response
            .as_ref()
            .map_or(self.content_type.as_str(), |response| {
                response.content_type.as_str()
            })
    }

    /// Returns all [`OperationType`]s served by the form.
    #[must_use]
    pub fn operations(&self) -> &[OperationType] {
        &self.op
    }

    /// Returns the first served [`OperationType`] which satisfies the given
    /// predicate, or the given fallback.
    #[must_use]
    pub fn operation_or(
        &self,
        predicate: impl Fn(&OperationType) -> bool,
        fallback: OperationType,
    ) -> OperationType {
        self.op
            .iter()
            .copied()
            .find(|operation| predicate(operation))
            .unwrap_or(fallback)
    }

    /// Returns the subprotocol, if any.
    #[must_use]
    pub fn subprotocol_name(&self) -> Option<&str> {
        self.subprotocol.as_deref()
    }

    /// Returns the names of the referenced security definitions.
    #[must_use]
    pub fn security_names(&self) -> &[String] {
        &self.security
    }

    /// Returns the protocol-specific term with the given name.
    #[must_use]
    pub fn extension_value(&self, name: &str) -> Option<&Value> {
        self.extensions.get(name)
    }

    /// Returns all protocol-specific terms.
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }
}

#[cfg(test)]
#[cfg(feature = "deserialize")]
mod tests {
    use serde_json::json;

    use crate::operation::OperationType;
    use crate::{deserialize, serialize};

    use super::{DEFAULT_CONTENT_TYPE, Form};

    #[test]
    fn test_default_form() {
        let form = Form::new("coap://localhost/properties/on");

        assert_eq!(form.href(), "coap://localhost/properties/on");
        assert_eq!(form.media_type(), DEFAULT_CONTENT_TYPE);
        assert_eq!(form.accept_type(), DEFAULT_CONTENT_TYPE);
        assert!(form.operations().is_empty());
        assert_eq!(form.subprotocol_name(), None);

        assert_eq!(
            serialize(&form),
            json!({
                "href": "coap://localhost/properties/on",
                "contentType": "application/json",
            })
        );
    }

    #[test]
    fn test_accept_type() {
        let form = Form::new("coap://localhost/actions/fade")
            .content_type("application/cbor")
            .response_content_type("text/plain");

        assert_eq!(form.media_type(), "application/cbor");
        assert_eq!(form.accept_type(), "text/plain");
    }

    #[test]
    fn test_deserialize_single_and_many() {
        let form = deserialize::<Form>(json!({
            "href": "coap://[ff02::fd]/td",
            "op": "readproperty",
            "security": ["psk_sc", "nosec_sc"],
            "subprotocol": "cov:observe",
            "cov:method": "PUT",
            "cov:blockwise": { "cov:block2Size": 100 },
        }));

        assert_eq!(form.media_type(), DEFAULT_CONTENT_TYPE);
        assert_eq!(form.operations(), &[OperationType::ReadProperty]);
        assert_eq!(form.security_names(), &["psk_sc", "nosec_sc"]);
        assert_eq!(form.subprotocol_name(), Some("cov:observe"));
        assert_eq!(form.extension_value("cov:method"), Some(&json!("PUT")));
        assert_eq!(
            form.extension_value("cov:blockwise"),
            Some(&json!({ "cov:block2Size": 100 }))
        );
        assert_eq!(form.extensions().len(), 2);
    }

    #[test]
    fn test_form_roundtrip() {
        let form = Form::new("coaps://device.local/events/overheated")
            .op(OperationType::SubscribeEvent)
            .op(OperationType::SubscribeEvent)
            .op(OperationType::UnsubscribeEvent)
            .security("psk_sc")
            .extension("cov:accept", json!([60, 50]));

        assert_eq!(form.operations().len(), 2);
        assert_eq!(deserialize::<Form>(serialize(&form)), form);
    }

    #[test]
    fn test_operation_or() {
        let form = Form::new("coap://localhost/properties/temperature")
            .op(OperationType::ObserveProperty)
            .op(OperationType::ReadAllProperties);

        assert_eq!(
            form.operation_or(OperationType::is_read, OperationType::ReadProperty),
            OperationType::ReadAllProperties
        );
        assert_eq!(
            form.operation_or(OperationType::is_write, OperationType::WriteProperty),
            OperationType::WriteProperty
        );
    }
}

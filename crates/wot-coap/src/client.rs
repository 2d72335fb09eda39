use std::net::IpAddr;
use std::sync::Arc;

use bytes::Bytes;

use parking_lot::RwLock;

use tracing::{debug, warn};

use url::{Host, Url};

use wot_form::form::Form;
use wot_form::operation::OperationType;
use wot_form::security::SecurityDefinitions;

use crate::config::ClientConfig;
use crate::content::Content;
use crate::content_format::{LINK_FORMAT, THING_DESCRIPTION};
use crate::discovery::{self, DiscoveryStream};
use crate::error::{Error, ErrorKind, Result};
use crate::exchange::{Exchange, ExchangeKind, PendingExchanges};
use crate::method::{MessageType, RequestMethod};
use crate::parameters::RequestParameters;
use crate::security::{CredentialProvider, SecuritySelector, TransportSecurity};
use crate::subscription::{self, Subscription};
use crate::transport::{CoapRequest, CoapResponse, Transport, TransportFactory};

/// The URI schemes handled by the binding.
pub const SUPPORTED_SCHEMES: &[&str] = &["coap", "coaps"];

// Parses a target URI, rejecting the schemes the binding does not handle.
pub(crate) fn parse_uri(uri: &str) -> Result<Url> {
    let parsed = Url::parse(uri)
        .map_err(|e| Error::new(ErrorKind::Uri, format!("Invalid URI `{uri}`: {e}")))?;

    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(Error::new(
            ErrorKind::Uri,
            format!(
                "The `{}` scheme of `{uri}` is not supported by the CoAP binding",
                parsed.scheme()
            ),
        ));
    }

    if parsed.host().is_none() {
        return Err(Error::new(
            ErrorKind::Uri,
            format!("The URI `{uri}` has no host"),
        ));
    }

    Ok(parsed)
}

// Whether the URI targets a multicast group.
//
// `coap` is not a special scheme, so IPv4 hosts are kept as opaque domains.
pub(crate) fn is_multicast(uri: &Url) -> bool {
    match uri.host() {
        Some(Host::Ipv4(address)) => address.is_multicast(),
        Some(Host::Ipv6(address)) => address.is_multicast(),
        Some(Host::Domain(domain)) => domain
            .parse::<IpAddr>()
            .is_ok_and(|address| address.is_multicast()),
        None => false,
    }
}

// Maps an error response code into an error.
pub(crate) fn check_response(uri: &str, response: CoapResponse) -> Result<CoapResponse> {
    if response.code.is_success() {
        Ok(response)
    } else {
        Err(Error::response(uri, response.code))
    }
}

// Names the target URI in transport failures.
//
// Security and abort failures keep their own kind.
pub(crate) fn send_error(uri: &str, error: Error) -> Error {
    match error.kind() {
        ErrorKind::Security | ErrorKind::Aborted | ErrorKind::Response => error,
        _ => Error::send(uri, error.info()),
    }
}

/// A `CoAP` client binding.
///
/// Every read, write, invoke, subscription and discovery runs as an
/// independent exchange which owns its own transport client, created by the
/// [`TransportFactory`].
/// The client keeps track of every pending exchange, so that
/// [`CoapClient::stop`] is able to abort all of them.
pub struct CoapClient<F: TransportFactory> {
    factory: F,
    config: ClientConfig,
    security: RwLock<SecuritySelector>,
    exchanges: PendingExchanges,
}

impl<F: TransportFactory> CoapClient<F> {
    /// Creates a [`CoapClient`] with the default configuration.
    #[must_use]
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, ClientConfig::new())
    }

    /// Creates a [`CoapClient`] with the given [`ClientConfig`].
    #[must_use]
    pub fn with_config(factory: F, config: ClientConfig) -> Self {
        Self {
            factory,
            security: RwLock::new(SecuritySelector::new(config.dtls_config())),
            config,
            exchanges: PendingExchanges::default(),
        }
    }

    /// Returns the [`ClientConfig`].
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the number of pending exchanges.
    #[must_use]
    pub fn pending_exchanges(&self) -> usize {
        self.exchanges.len()
    }

    /// Sets the security definitions of a thing and the provider of its
    /// pre-shared key credentials.
    ///
    /// Forms referencing a pre-shared key definition are exchanged over
    /// `DTLS`.
    pub fn set_security(
        &self,
        definitions: SecurityDefinitions,
        provider: Option<Arc<dyn CredentialProvider>>,
    ) {
        self.security.write().set(definitions, provider);
    }

    /// Starts the client.
    ///
    /// The client holds no connection, so starting it has no effect.
    pub fn start(&self) {
        debug!("CoAP client started");
    }

    /// Stops the client, aborting every pending exchange.
    ///
    /// Calling this method more than once is harmless.
    pub fn stop(&self) {
        let aborted = self.exchanges.abort_all();
        debug!("CoAP client stopped, {aborted} pending exchanges aborted");
    }

    /// Reads a resource.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be built or sent, and
    /// when the device answers with an error code.
    pub async fn read_resource(&self, form: &Form) -> Result<Content> {
        let operation = form.operation_or(OperationType::is_read, OperationType::ReadProperty);
        self.request(form, operation, None).await
    }

    /// Writes a resource.
    ///
    /// An empty [`Content`] is sent as a zero-length payload.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be built or sent, and
    /// when the device answers with an error code.
    pub async fn write_resource(&self, form: &Form, content: Content) -> Result<()> {
        let operation = form.operation_or(OperationType::is_write, OperationType::WriteProperty);
        let _ = self
            .request(form, operation, Some(content.into_bytes()))
            .await?;
        Ok(())
    }

    /// Invokes an action, with an optional input.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be built or sent, and
    /// when the device answers with an error code.
    pub async fn invoke_resource(&self, form: &Form, content: Option<Content>) -> Result<Content> {
        let operation = form.operation_or(OperationType::is_invoke, OperationType::InvokeAction);
        self.request(form, operation, content.map(Content::into_bytes))
            .await
    }

    /// Subscribes to a resource.
    ///
    /// When the form describes an observe relation, every notification is
    /// passed to `on_next` until the [`Subscription`] is terminated.
    /// Otherwise a single request is sent, its response is passed to
    /// `on_next` and the subscription completes.
    /// Failures of the relation are passed to `on_error`, then the
    /// subscription completes.
    /// `on_complete` is called exactly once, when the subscription
    /// terminates.
    ///
    /// Dropping the [`Subscription`] does not terminate it.
    ///
    /// # Errors
    ///
    /// An error is returned when the subscription cannot be established.
    pub async fn subscribe_resource(
        &self,
        form: &Form,
        on_next: impl FnMut(Content) + Send + 'static,
        on_error: impl FnMut(Error) + Send + 'static,
        on_complete: impl FnOnce() + Send + 'static,
    ) -> Result<Subscription> {
        // A form without subscription operations gets a one-shot
        // subscription.
        let fallback = form
            .operations()
            .first()
            .copied()
            .unwrap_or(OperationType::ObserveProperty);
        let operation = form.operation_or(OperationType::is_subscription, fallback);
        let parameters = RequestParameters::resolve(form, operation);
        let _ = parameters.method.ensure_supported(form.href())?;

        let uri = parse_uri(form.href())?;
        let exchange = self.open(form, &uri, ExchangeKind::Subscription)?;

        subscription::subscribe(
            exchange,
            parameters.request(uri),
            Box::new(on_next),
            Box::new(on_error),
            Box::new(on_complete),
        )
        .await
    }

    /// Terminates every subscription to the target of a form.
    ///
    /// Returns the number of terminated subscriptions.
    pub fn unlink_resource(&self, form: &Form) -> usize {
        let href = form.href();
        let target = Url::parse(href).map_or_else(|_| href.to_owned(), String::from);
        let terminated = self
            .exchanges
            .abort_where(|uri, kind| kind == ExchangeKind::Subscription && uri == target);
        if terminated == 0 {
            warn!("No subscription to `{href}`");
        }
        terminated
    }

    /// Requests the Thing Description exposed by a device.
    ///
    /// # Errors
    ///
    /// An error is returned when the request cannot be sent, and when the
    /// device answers with an error code.
    pub async fn request_thing_description(&self, uri: &str) -> Result<Content> {
        let uri = parse_uri(uri)?;
        let exchange = self.open_discovery(&uri)?;
        let request = CoapRequest::new(RequestMethod::Get, uri).accept(THING_DESCRIPTION);
        discovery::unicast(&exchange, request).await.map(Content::from_response)
    }

    /// Discovers the Thing Descriptions exposed at an address.
    ///
    /// A multicast address is queried with a non-confirmable request, and
    /// every distinct responder produces a result until the multicast window
    /// elapses.
    /// Any other address, or a multicast one when `disable_multicast` is set,
    /// produces exactly one result.
    pub async fn discover_directly(
        &self,
        uri: &str,
        disable_multicast: bool,
    ) -> DiscoveryStream<Content> {
        let (sender, stream) = discovery::channel(self.config.channel_capacity_value());

        let uri = match parse_uri(uri) {
            Ok(uri) => uri,
            Err(e) => return discovery::failed(&sender, stream, e),
        };
        let exchange = match self.open_discovery(&uri) {
            Ok(exchange) => exchange,
            Err(e) => return discovery::failed(&sender, stream, e),
        };

        let request = CoapRequest::new(RequestMethod::Get, uri.clone()).accept(THING_DESCRIPTION);
        if is_multicast(&uri) && !disable_multicast {
            discovery::spawn_multicast(
                exchange,
                request.message_type(MessageType::NonConfirmable),
                self.config.multicast_timeout_value(),
                sender,
                |response| vec![Ok(Content::from_response(response))],
            );
        } else {
            discovery::spawn_unicast(exchange, request, sender, |response| {
                vec![Ok(Content::from_response(response))]
            });
        }

        stream
    }

    /// Discovers the resources of a device, or of every device of a
    /// multicast group, through their `CoRE Link-Format` description.
    ///
    /// Each link is resolved into an absolute URI.
    pub async fn discover_with_core_link_format(&self, uri: &str) -> DiscoveryStream<Url> {
        self.core_link_format(uri, |base, response| {
            discovery::resolve_links(&base, &response.payload)
        })
        .await
    }

    /// Retrieves the `CoRE Link-Format` description of a device, or of every
    /// device of a multicast group.
    ///
    /// Each description is checked to carry the link-format content-format.
    pub async fn core_link_format_contents(&self, uri: &str) -> DiscoveryStream<Content> {
        self.core_link_format(uri, |_, response| {
            vec![Ok(Content::from_response(response))]
        })
        .await
    }

    async fn core_link_format<T, M>(&self, uri: &str, map: M) -> DiscoveryStream<T>
    where
        T: Send + 'static,
        M: Fn(Url, CoapResponse) -> Vec<Result<T>> + Send + 'static,
    {
        let (sender, stream) = discovery::channel(self.config.channel_capacity_value());

        let uri = match parse_uri(uri).and_then(|uri| {
            uri.join(self.config.well_known_core_path())
                .map_err(|e| Error::discovery(uri.as_str(), e))
        }) {
            Ok(uri) => uri,
            Err(e) => return discovery::failed(&sender, stream, e),
        };
        let exchange = match self.open_discovery(&uri) {
            Ok(exchange) => exchange,
            Err(e) => return discovery::failed(&sender, stream, e),
        };

        let request = CoapRequest::new(RequestMethod::Get, uri.clone()).accept(LINK_FORMAT);
        if is_multicast(&uri) {
            discovery::spawn_multicast(
                exchange,
                request.message_type(MessageType::NonConfirmable),
                self.config.multicast_timeout_value(),
                sender,
                move |response| {
                    let base = discovery::responder_base(&uri, &response);
                    match discovery::check_link_format(base.as_str(), response) {
                        Ok(response) => map(base, response),
                        Err(e) => vec![Err(e)],
                    }
                },
            );
        } else {
            let base = uri.clone();
            discovery::spawn_unicast(exchange, request, sender, move |response| {
                match discovery::check_link_format(base.as_str(), response) {
                    Ok(response) => map(base.clone(), response),
                    Err(e) => vec![Err(e)],
                }
            });
        }

        stream
    }

    // Creates a transport client for a form and registers its exchange.
    fn open(&self, form: &Form, uri: &Url, kind: ExchangeKind) -> Result<Exchange<F::Transport>> {
        let security = self.security.read().select(form, uri)?;
        let transport = self.factory.create(uri, security)?;
        Ok(self.exchanges.open(uri.as_str(), kind, transport))
    }

    fn open_discovery(&self, uri: &Url) -> Result<Exchange<F::Transport>> {
        let transport = self.factory.create(uri, TransportSecurity::NoSec)?;
        Ok(self.exchanges.open(uri.as_str(), ExchangeKind::Discovery, transport))
    }

    async fn request(
        &self,
        form: &Form,
        operation: OperationType,
        payload: Option<Bytes>,
    ) -> Result<Content> {
        let parameters = RequestParameters::resolve(form, operation);
        let method = parameters.method.ensure_supported(form.href())?;

        let uri = parse_uri(form.href())?;
        let exchange = self.open(form, &uri, ExchangeKind::Request)?;

        let mut request = parameters.request(uri);
        request.payload = payload;

        debug!("Send {method} request to `{}`", exchange.uri());
        let response = exchange
            .run(exchange.transport().send(request))
            .await
            .map_err(|e| send_error(exchange.uri(), e))?;

        let response = check_response(exchange.uri(), response)?;
        debug!(
            "Received {} response from `{}`",
            response.code,
            exchange.uri()
        );

        Ok(Content::from_response(response))
    }
}

#[cfg(test)]
mod tests {
    use url::Url;

    use crate::error::ErrorKind;
    use crate::method::ResponseCode;
    use crate::transport::CoapResponse;

    use super::{check_response, is_multicast, parse_uri};

    #[test]
    fn uri_schemes() {
        assert!(parse_uri("coap://lamp.local/properties/on").is_ok());
        assert!(parse_uri("coaps://[::1]:5684/properties/on").is_ok());

        for uri in ["http://lamp.local/properties/on", "lamp.local", "coap:on"] {
            let error = parse_uri(uri).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Uri);
            assert!(error.info().contains(uri));
        }
    }

    #[test]
    fn multicast_addresses() {
        for (uri, multicast) in [
            ("coap://224.0.1.187", true),
            ("coaps://239.255.255.250:5684/.well-known/core", true),
            ("coap://[ff02::fd]:5683", true),
            ("coap://192.168.1.10", false),
            ("coap://[::1]", false),
            ("coap://lamp.local", false),
        ] {
            assert_eq!(is_multicast(&Url::parse(uri).unwrap()), multicast, "{uri}");
        }
    }

    #[test]
    fn error_responses() {
        let uri = "coap://lamp.local/properties/on";

        assert!(check_response(uri, CoapResponse::new(ResponseCode::CONTENT)).is_ok());

        let error = check_response(uri, CoapResponse::new(ResponseCode::NOT_FOUND)).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Response);
        assert!(error.info().contains(uri));
        assert!(error.info().contains("4.04"));
    }
}

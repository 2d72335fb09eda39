use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;

use tokio::sync::mpsc;

use url::Url;

use crate::error::Result;
use crate::method::{MessageType, RequestMethod, ResponseCode};
use crate::security::TransportSecurity;

/// A stream of responses produced by a single request.
///
/// An observe relation yields one response per notification, while a
/// multicast request yields one response per responder.
/// The stream ends when the transport drops its sender.
pub type ResponseStream = mpsc::Receiver<Result<CoapResponse>>;

/// A `CoAP` request.
#[derive(Debug, Clone, PartialEq)]
pub struct CoapRequest {
    /// Request method.
    pub method: RequestMethod,
    /// Target URI.
    pub uri: Url,
    /// Message reliability.
    pub message_type: MessageType,
    /// Content-format of the payload.
    pub content_format: Option<u16>,
    /// Content-format accepted for the response.
    pub accept: Option<u16>,
    /// Preferred block size for the request payload.
    pub block1: Option<u16>,
    /// Preferred block size for the response payload.
    pub block2: Option<u16>,
    /// Whether the request registers an observe relation.
    pub observe: bool,
    /// Request payload.
    ///
    /// A present but empty payload is sent as a zero-length body.
    pub payload: Option<Bytes>,
}

impl CoapRequest {
    /// Creates a confirmable [`CoapRequest`] without options and payload.
    #[must_use]
    pub const fn new(method: RequestMethod, uri: Url) -> Self {
        Self {
            method,
            uri,
            message_type: MessageType::Confirmable,
            content_format: None,
            accept: None,
            block1: None,
            block2: None,
            observe: false,
            payload: None,
        }
    }

    /// Sets the message reliability.
    #[must_use]
    pub fn message_type(mut self, message_type: MessageType) -> Self {
        self.message_type = message_type;
        self
    }

    /// Sets the content-format accepted for the response.
    #[must_use]
    pub fn accept(mut self, accept: u16) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Sets the request payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = Some(payload.into());
        self
    }
}

/// A `CoAP` response.
#[derive(Debug, Clone, PartialEq)]
pub struct CoapResponse {
    /// Response code.
    pub code: ResponseCode,
    /// Content-format of the payload.
    pub content_format: Option<u16>,
    /// Response payload, empty when absent.
    pub payload: Bytes,
    /// Address of the responder, when known.
    pub origin: Option<SocketAddr>,
}

impl CoapResponse {
    /// Creates a [`CoapResponse`] without content-format and payload.
    #[must_use]
    pub const fn new(code: ResponseCode) -> Self {
        Self {
            code,
            content_format: None,
            payload: Bytes::new(),
            origin: None,
        }
    }

    /// Sets the content-format.
    #[must_use]
    pub fn content_format(mut self, content_format: u16) -> Self {
        self.content_format = Some(content_format);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Sets the responder address.
    #[must_use]
    pub fn origin(mut self, origin: SocketAddr) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// A client of the underlying `CoAP` engine.
///
/// Message retransmission, deduplication, block re-assembly and the `DTLS`
/// handshake are the engine's concern.
/// The binding creates one client per exchange and closes it exactly once,
/// when the exchange completes or is aborted.
pub trait Transport: Send + Sync + 'static {
    /// Sends a request and waits for its response.
    ///
    /// An error is returned when no response arrives.
    fn send(&self, request: CoapRequest) -> impl Future<Output = Result<CoapResponse>> + Send;

    /// Registers an observe relation and returns its notifications.
    fn observe(
        &self,
        request: CoapRequest,
    ) -> impl Future<Output = Result<ResponseStream>> + Send;

    /// Sends a request to a multicast group and returns the responses of
    /// every responder, as they arrive.
    ///
    /// The stream may stay open indefinitely: the binding bounds it in time.
    fn multicast(
        &self,
        request: CoapRequest,
    ) -> impl Future<Output = Result<ResponseStream>> + Send;

    /// Closes the client, stopping any in-flight request or observe
    /// relation.
    fn close(&self);
}

/// A factory of [`Transport`] clients.
pub trait TransportFactory: Send + Sync + 'static {
    /// The produced client.
    type Transport: Transport;

    /// Creates a client for the given target URI and security parameters.
    ///
    /// # Errors
    ///
    /// An error is returned when the client cannot be created, for example
    /// because the requested `DTLS` backend is not available.
    fn create(&self, uri: &Url, security: TransportSecurity) -> Result<Self::Transport>;
}

use std::time::Duration;

use hashbrown::HashSet;

use tracing::{debug, warn};

use url::Url;

use crate::client::{check_response, send_error};
use crate::content_format::LINK_FORMAT;
use crate::error::{Error, Result};
use crate::exchange::Exchange;
use crate::link_format;
use crate::transport::{CoapRequest, CoapResponse, Transport};

/// An asynchronous sequence of discovery results.
///
/// The sequence ends when every result has been produced: after the single
/// response of a unicast request, or when the window of a multicast request
/// elapses.
/// Dropping the sequence stops the discovery.
#[derive(Debug)]
pub struct DiscoveryStream<T> {
    receiver: flume::Receiver<Result<T>>,
}

impl<T: Send + 'static> DiscoveryStream<T> {
    /// Waits for the next result.
    ///
    /// The return value is [`None`] when the sequence has ended.
    pub async fn next(&self) -> Option<Result<T>> {
        self.receiver.recv_async().await.ok()
    }

    /// Waits for the end of the sequence and returns all of its results.
    pub async fn collect(self) -> Vec<Result<T>> {
        let mut results = Vec::new();
        while let Some(result) = self.next().await {
            results.push(result);
        }
        results
    }

    /// Converts the sequence into a [`futures_util::Stream`].
    #[cfg(feature = "stream")]
    pub fn into_stream(self) -> impl futures_util::Stream<Item = Result<T>> {
        self.receiver.into_stream()
    }
}

pub(crate) fn channel<T>(capacity: usize) -> (flume::Sender<Result<T>>, DiscoveryStream<T>) {
    let (sender, receiver) = flume::bounded(capacity);
    (sender, DiscoveryStream { receiver })
}

// Ends a sequence with a single error.
pub(crate) fn failed<T>(
    sender: &flume::Sender<Result<T>>,
    stream: DiscoveryStream<T>,
    error: Error,
) -> DiscoveryStream<T> {
    warn!("{error}");
    let _ = sender.try_send(Err(error));
    stream
}

// Sends a single confirmable request.
pub(crate) async fn unicast<T: Transport>(
    exchange: &Exchange<T>,
    request: CoapRequest,
) -> Result<CoapResponse> {
    debug!("Send a discovery request to `{}`", exchange.uri());
    let response = exchange
        .run(exchange.transport().send(request))
        .await
        .map_err(|e| send_error(exchange.uri(), e))?;
    check_response(exchange.uri(), response)
}

pub(crate) fn spawn_unicast<T, I, M>(
    exchange: Exchange<T>,
    request: CoapRequest,
    sender: flume::Sender<Result<I>>,
    map: M,
) where
    T: Transport,
    I: Send + 'static,
    M: FnOnce(CoapResponse) -> Vec<Result<I>> + Send + 'static,
{
    let _ = tokio::spawn(async move {
        let results = match unicast(&exchange, request).await {
            Ok(response) => map(response),
            Err(e) => vec![Err(Error::discovery(exchange.uri(), e))],
        };

        for result in results {
            if sender.send_async(result).await.is_err() {
                debug!("Discovery results of `{}` discarded", exchange.uri());
                break;
            }
        }
    });
}

pub(crate) fn spawn_multicast<T, I, M>(
    exchange: Exchange<T>,
    request: CoapRequest,
    window: Duration,
    sender: flume::Sender<Result<I>>,
    map: M,
) where
    T: Transport,
    I: Send + 'static,
    M: Fn(CoapResponse) -> Vec<Result<I>> + Send + 'static,
{
    let _ = tokio::spawn(run_multicast(exchange, request, window, sender, map));
}

// Fans in the responses of a multicast request until the window elapses.
//
// Every send also waits on the deadline, so a consumer which stops reading
// cannot keep the task alive past the window.
async fn run_multicast<T, I, M>(
    exchange: Exchange<T>,
    request: CoapRequest,
    window: Duration,
    sender: flume::Sender<Result<I>>,
    map: M,
) where
    T: Transport,
    M: Fn(CoapResponse) -> Vec<Result<I>>,
{
    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    debug!(
        "Send a multicast discovery request to `{}` for {window:?}",
        exchange.uri()
    );
    let mut responses = tokio::select! {
        biased;
        () = &mut deadline => {
            debug!("Multicast window of `{}` elapsed", exchange.uri());
            return;
        }
        result = exchange.run(exchange.transport().multicast(request)) => match result {
            Ok(responses) => responses,
            Err(e) => {
                let _ = sender.try_send(Err(Error::discovery(exchange.uri(), e)));
                return;
            }
        }
    };

    let mut responders = HashSet::new();
    'responses: loop {
        let response = tokio::select! {
            biased;
            () = &mut deadline => {
                debug!("Multicast window of `{}` elapsed", exchange.uri());
                break;
            }
            () = exchange.token().cancelled() => break,
            response = responses.recv() => response,
        };

        let results = match response {
            Some(Ok(response)) => {
                if let Some(origin) = response.origin {
                    if !responders.insert(origin) {
                        debug!("Discard duplicate response from `{origin}`");
                        continue;
                    }
                }
                match check_response(exchange.uri(), response) {
                    Ok(response) => map(response),
                    Err(e) => vec![Err(e)],
                }
            }
            Some(Err(e)) => vec![Err(Error::discovery(exchange.uri(), e))],
            None => break,
        };

        for result in results {
            tokio::select! {
                biased;
                () = &mut deadline => break 'responses,
                sent = sender.send_async(result) => if sent.is_err() {
                    debug!("Discovery results of `{}` discarded", exchange.uri());
                    break 'responses;
                }
            }
        }
    }
}

// The base URI against which the links of a multicast responder are
// resolved.
pub(crate) fn responder_base(uri: &Url, response: &CoapResponse) -> Url {
    let Some(origin) = response.origin else {
        return uri.clone();
    };
    Url::parse(&format!("{}://{origin}{}", uri.scheme(), uri.path())).unwrap_or_else(|e| {
        warn!("Cannot build the base URI of `{origin}`, use `{uri}`: {e}");
        uri.clone()
    })
}

// Checks the content-format of a link-format response.
pub(crate) fn check_link_format(uri: &str, response: CoapResponse) -> Result<CoapResponse> {
    if response.content_format == Some(LINK_FORMAT) {
        Ok(response)
    } else {
        Err(Error::content_format(
            uri,
            LINK_FORMAT,
            response.content_format,
        ))
    }
}

// Parses a link-format payload into absolute URIs.
pub(crate) fn resolve_links(base: &Url, payload: &[u8]) -> Vec<Result<Url>> {
    match link_format::parse(payload) {
        Ok(links) => links.iter().map(|link| link.resolve(base)).collect(),
        Err(e) => vec![Err(e)],
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use url::Url;

    use crate::content_format::{JSON, LINK_FORMAT};
    use crate::error::ErrorKind;
    use crate::method::ResponseCode;
    use crate::transport::CoapResponse;

    use super::{check_link_format, channel, resolve_links, responder_base};

    #[test]
    fn link_format_content_format() {
        let uri = "coap://lamp.local/.well-known/core";
        let response = CoapResponse::new(ResponseCode::CONTENT).content_format(LINK_FORMAT);
        assert!(check_link_format(uri, response).is_ok());

        for content_format in [Some(JSON), None] {
            let mut response = CoapResponse::new(ResponseCode::CONTENT);
            response.content_format = content_format;
            assert_eq!(
                check_link_format(uri, response).unwrap_err().kind(),
                ErrorKind::ContentFormat
            );
        }
    }

    #[test]
    fn responder_base_uri() {
        let uri = Url::parse("coap://[ff02::fd]/.well-known/core").unwrap();
        let origin: SocketAddr = "[fe80::1]:5683".parse().unwrap();

        let response = CoapResponse::new(ResponseCode::CONTENT).origin(origin);
        assert_eq!(
            responder_base(&uri, &response).as_str(),
            "coap://[fe80::1]:5683/.well-known/core"
        );
        assert_eq!(
            responder_base(&uri, &CoapResponse::new(ResponseCode::CONTENT)),
            uri
        );
    }

    #[test]
    fn links_to_uris() {
        let base = Url::parse("coap://192.168.1.10/.well-known/core").unwrap();

        let uris = resolve_links(&base, b"</td>;rt=\"wot.thing\",</properties/on>");
        assert_eq!(
            uris.into_iter().map(|uri| uri.unwrap().to_string()).collect::<Vec<_>>(),
            ["coap://192.168.1.10/td", "coap://192.168.1.10/properties/on"]
        );

        let uris = resolve_links(&base, b"td");
        assert_eq!(uris.len(), 1);
        assert_eq!(uris[0].as_ref().unwrap_err().kind(), ErrorKind::LinkFormat);
    }

    #[tokio::test]
    async fn stream_ends_with_senders() {
        let (sender, stream) = channel::<u8>(2);
        sender.send_async(Ok(1)).await.unwrap();
        drop(sender);

        assert_eq!(stream.next().await, Some(Ok(1)));
        assert_eq!(stream.next().await, None);
    }
}

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use tokio_util::sync::CancellationToken;

use tracing::debug;

use crate::client::{check_response, send_error};
use crate::content::Content;
use crate::error::{Error, ErrorKind, Result};
use crate::exchange::{Abort, Exchange, PendingExchanges};
use crate::method::MessageType;
use crate::transport::{CoapRequest, ResponseStream, Transport};

pub(crate) type OnNext = Box<dyn FnMut(Content) + Send>;
pub(crate) type OnError = Box<dyn FnMut(Error) + Send>;
pub(crate) type OnComplete = Box<dyn FnOnce() + Send>;

/// The state of a [`Subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// The transport client exists but the relation is not established yet.
    Created,
    /// Notifications are being delivered.
    Active,
    /// The subscription completed or has been aborted.
    ///
    /// No notification is delivered anymore.
    Terminal,
}

struct Shared {
    // Reentrant, so that callbacks are allowed to unsubscribe.
    state: ReentrantMutex<Cell<SubscriptionState>>,
    on_complete: Mutex<Option<OnComplete>>,
    token: CancellationToken,
    exchange: Arc<dyn Abort>,
    exchanges: PendingExchanges,
    id: u64,
    uri: String,
}

impl Shared {
    fn new<T: Transport>(exchange: &Exchange<T>, on_complete: OnComplete) -> Self {
        Self {
            state: ReentrantMutex::new(Cell::new(SubscriptionState::Created)),
            on_complete: Mutex::new(Some(on_complete)),
            token: exchange.token().clone(),
            exchange: exchange.abort_handle(),
            exchanges: exchange.exchanges().clone(),
            id: exchange.id(),
            uri: exchange.uri().into(),
        }
    }

    fn state(&self) -> SubscriptionState {
        self.state.lock().get()
    }

    fn activate(&self) {
        let state = self.state.lock();
        if state.get() == SubscriptionState::Created {
            state.set(SubscriptionState::Active);
            debug!("Subscription to `{}` is active", self.uri);
        }
    }

    // Runs a callback only while the subscription is active.
    //
    // The state lock is held for the whole callback, so a termination waits
    // for an in-flight delivery and no delivery starts afterwards.
    fn deliver(&self, callback: impl FnOnce()) -> bool {
        let state = self.state.lock();
        if state.get() != SubscriptionState::Active {
            return false;
        }
        callback();
        true
    }

    fn terminate(&self) {
        {
            let state = self.state.lock();
            if state.replace(SubscriptionState::Terminal) == SubscriptionState::Terminal {
                return;
            }
        }
        debug!("Subscription to `{}` terminated", self.uri);

        if let Some(on_complete) = self.on_complete.lock().take() {
            on_complete();
        }
        self.exchanges.remove(self.id);
        self.exchange.abort();
    }
}

impl Abort for Shared {
    fn abort(&self) {
        self.terminate();
    }
}

/// A subscription to a resource.
///
/// It delivers notifications until it completes or is aborted through
/// [`Subscription::unsubscribe`].
/// Dropping the handle leaves the subscription running.
pub struct Subscription {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("uri", &self.shared.uri)
            .field("state", &self.shared.state())
            .finish()
    }
}

impl Subscription {
    /// Returns the target URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.shared.uri
    }

    /// Returns the [`SubscriptionState`].
    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        self.shared.state()
    }

    /// Whether notifications are being delivered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    /// Aborts the subscription and closes its transport client.
    ///
    /// Once this method returns, no further notification is delivered, even
    /// one which was already in flight.
    /// Aborting a terminated subscription has no effect.
    pub fn unsubscribe(&self) {
        self.shared.terminate();
    }

    /// Waits until the subscription terminates.
    pub async fn closed(&self) {
        self.shared.token.cancelled().await;
    }
}

// Establishes a subscription on a registered exchange.
pub(crate) async fn subscribe<T: Transport>(
    exchange: Exchange<T>,
    request: CoapRequest,
    on_next: OnNext,
    on_error: OnError,
    on_complete: OnComplete,
) -> Result<Subscription> {
    let shared = Arc::new(Shared::new(&exchange, on_complete));

    if request.observe {
        debug!("Register an observe relation with `{}`", exchange.uri());
        let notifications = exchange
            .run(exchange.transport().observe(request))
            .await
            .map_err(|e| send_error(exchange.uri(), e))?;

        shared.activate();
        exchange.exchanges().replace(exchange.id(), shared.clone());
        let _ = tokio::spawn(run_observe(
            exchange,
            notifications,
            shared.clone(),
            on_next,
            on_error,
        ));
    } else {
        debug!("Send a one-shot subscription request to `{}`", exchange.uri());
        shared.activate();
        exchange.exchanges().replace(exchange.id(), shared.clone());
        let _ = tokio::spawn(run_once(
            exchange,
            request.message_type(MessageType::NonConfirmable),
            shared.clone(),
            on_next,
            on_error,
        ));
    }

    Ok(Subscription { shared })
}

async fn run_observe<T: Transport>(
    exchange: Exchange<T>,
    mut notifications: ResponseStream,
    shared: Arc<Shared>,
    mut on_next: OnNext,
    mut on_error: OnError,
) {
    loop {
        let notification = tokio::select! {
            biased;
            () = exchange.token().cancelled() => break,
            notification = notifications.recv() => notification,
        };

        match notification {
            Some(Ok(response)) if response.code.is_success() => {
                let content = Content::from_response(response);
                if !shared.deliver(|| on_next(content)) {
                    break;
                }
            }
            // An error code ends the relation.
            Some(Ok(response)) => {
                let error = Error::response(exchange.uri(), response.code);
                let _ = shared.deliver(|| on_error(error));
                break;
            }
            Some(Err(e)) => {
                let error = send_error(exchange.uri(), e);
                let _ = shared.deliver(|| on_error(error));
                break;
            }
            None => {
                debug!("Observe relation with `{}` ended", exchange.uri());
                break;
            }
        }
    }

    shared.terminate();
}

async fn run_once<T: Transport>(
    exchange: Exchange<T>,
    request: CoapRequest,
    shared: Arc<Shared>,
    mut on_next: OnNext,
    mut on_error: OnError,
) {
    let result = exchange
        .run(exchange.transport().send(request))
        .await
        .and_then(|response| check_response(exchange.uri(), response));

    match result {
        Ok(response) => {
            let content = Content::from_response(response);
            let _ = shared.deliver(|| on_next(content));
        }
        Err(e) if e.kind() == ErrorKind::Aborted => {}
        Err(e) => {
            let error = send_error(exchange.uri(), e);
            let _ = shared.deliver(|| on_error(error));
        }
    }

    shared.terminate();
}

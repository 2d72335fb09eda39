use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use hashbrown::HashMap;

use parking_lot::Mutex;

use tokio_util::sync::CancellationToken;

use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// The kind of a pending exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    /// A read, write or invoke request.
    Request,
    /// An observe relation or a one-shot subscription.
    Subscription,
    /// A discovery request.
    Discovery,
}

// Stops a pending exchange.
//
// Aborting must be idempotent, since an exchange may complete and be aborted
// concurrently.
pub(crate) trait Abort: Send + Sync {
    fn abort(&self);
}

struct Entry {
    uri: String,
    kind: ExchangeKind,
    abort: Arc<dyn Abort>,
}

#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
}

/// The registry of the exchanges which are still in progress.
#[derive(Clone, Default)]
pub(crate) struct PendingExchanges(Arc<Registry>);

impl PendingExchanges {
    // Registers a new exchange owning the given transport client.
    pub(crate) fn open<T: Transport>(
        &self,
        uri: &str,
        kind: ExchangeKind,
        transport: T,
    ) -> Exchange<T> {
        let id = self.0.next_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::new(ExchangeInner {
            transport,
            token: CancellationToken::new(),
            closed: AtomicBool::new(false),
            uri: uri.into(),
        });

        let _ = self.0.entries.lock().insert(
            id,
            Entry {
                uri: uri.into(),
                kind,
                abort: inner.clone(),
            },
        );
        debug!("Open {kind:?} exchange {id} with `{uri}`");

        Exchange {
            id,
            inner,
            exchanges: self.clone(),
        }
    }

    // Replaces the abort operation of an exchange.
    //
    // When the exchange has already been removed, the new operation is run
    // immediately.
    pub(crate) fn replace(&self, id: u64, abort: Arc<dyn Abort>) {
        let mut entries = self.0.entries.lock();
        if let Some(entry) = entries.get_mut(&id) {
            entry.abort = abort;
        } else {
            drop(entries);
            abort.abort();
        }
    }

    pub(crate) fn remove(&self, id: u64) {
        let _ = self.0.entries.lock().remove(&id);
    }

    pub(crate) fn len(&self) -> usize {
        self.0.entries.lock().len()
    }

    // Aborts every exchange satisfying the predicate and returns how many
    // have been aborted.
    pub(crate) fn abort_where(&self, predicate: impl Fn(&str, ExchangeKind) -> bool) -> usize {
        let aborted: Vec<Entry> = {
            let mut entries = self.0.entries.lock();
            let ids: Vec<u64> = entries
                .iter()
                .filter(|(_, entry)| predicate(&entry.uri, entry.kind))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| entries.remove(id)).collect()
        };

        // Abort outside the lock, since aborting removes entries.
        for entry in &aborted {
            debug!("Abort {:?} exchange with `{}`", entry.kind, entry.uri);
            entry.abort.abort();
        }
        aborted.len()
    }

    pub(crate) fn abort_all(&self) -> usize {
        self.abort_where(|_, _| true)
    }
}

struct ExchangeInner<T: Transport> {
    transport: T,
    token: CancellationToken,
    closed: AtomicBool,
    uri: String,
}

impl<T: Transport> ExchangeInner<T> {
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        self.transport.close();
        debug!("Close the transport client of `{}`", self.uri);
    }
}

impl<T: Transport> Abort for ExchangeInner<T> {
    fn abort(&self) {
        self.close();
    }
}

/// A pending exchange owning its own transport client.
///
/// The exchange leaves the registry and closes its client when dropped.
pub(crate) struct Exchange<T: Transport> {
    id: u64,
    inner: Arc<ExchangeInner<T>>,
    exchanges: PendingExchanges,
}

impl<T: Transport> Drop for Exchange<T> {
    fn drop(&mut self) {
        self.exchanges.remove(self.id);
        self.inner.close();
    }
}

impl<T: Transport> Exchange<T> {
    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn uri(&self) -> &str {
        &self.inner.uri
    }

    pub(crate) fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub(crate) fn exchanges(&self) -> &PendingExchanges {
        &self.exchanges
    }

    // Returns the operation closing the transport client.
    pub(crate) fn abort_handle(&self) -> Arc<dyn Abort> {
        self.inner.clone()
    }

    // Runs a transport operation until it completes or the exchange is
    // aborted.
    pub(crate) async fn run<R>(&self, operation: impl Future<Output = Result<R>>) -> Result<R> {
        tokio::select! {
            biased;
            () = self.inner.token.cancelled() => Err(Error::aborted(&self.inner.uri)),
            result = operation => result,
        }
    }
}

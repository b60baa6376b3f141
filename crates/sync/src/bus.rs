//! The event bus client: one transport subscription, many listeners.
//!
//! [`EventBusClient`] owns the single logical subscription to the job
//! push channel. Consumers register callbacks via
//! [`on_update`](EventBusClient::on_update); the first registration
//! lazily establishes the connection and later ones reuse it. Every
//! decoded [`JobUpdate`] is delivered to every listener in registration
//! order, each inside its own failure boundary.
//!
//! Connection state is bound to transport transitions (never polled) and
//! exposed both as a current-boolean query and as a watch channel for
//! subscribers that want change notifications.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use transmux_core::{decode_job_update, parse_frame, JobUpdate};

use crate::config::SyncConfig;
use crate::reconnect::next_delay;
use crate::transport::{Transport, TransportEvent};

type ListenerFn = Arc<dyn Fn(&JobUpdate) + Send + Sync>;

struct BusInner {
    transport: Arc<dyn Transport>,
    config: SyncConfig,
    /// Registered listeners in registration order.
    listeners: Mutex<Vec<(u64, ListenerFn)>>,
    next_listener_id: AtomicU64,
    /// Cancellation token of the running connection task, if any.
    run_token: Mutex<Option<CancellationToken>>,
    connected_tx: watch::Sender<bool>,
}

impl BusInner {
    fn set_connected(&self, connected: bool) {
        // Only signal actual changes so watchers see state moves, not noise.
        self.connected_tx.send_if_modified(|state| {
            if *state != connected {
                *state = connected;
                true
            } else {
                false
            }
        });
    }

    /// Apply a state flip on behalf of a connection task.
    ///
    /// Serialized with [`EventBusClient::disconnect`] through the
    /// run-token lock and gated on the task's own token, so a cancelled
    /// task can never overwrite the state left by `disconnect` or by a
    /// newer task.
    fn set_connected_for_task(&self, cancel: &CancellationToken, connected: bool) {
        let _run_token = self.run_token.lock();
        if cancel.is_cancelled() {
            return;
        }
        self.set_connected(connected);
    }
}

/// Pub/sub client for the job push channel.
///
/// Explicitly constructed and injected; hold it in the application's
/// composition root and hand references to consumers.
pub struct EventBusClient {
    inner: Arc<BusInner>,
}

impl EventBusClient {
    /// Create a client over the given transport.
    ///
    /// No connection is made until the first listener registers.
    pub fn new(transport: Arc<dyn Transport>, config: SyncConfig) -> Self {
        let (connected_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(BusInner {
                transport,
                config,
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                run_token: Mutex::new(None),
                connected_tx,
            }),
        }
    }

    /// Register a listener for job updates.
    ///
    /// The first registration (and the first after [`disconnect`]) lazily
    /// establishes the transport subscription; subsequent registrations
    /// reuse it. Must be called within a Tokio runtime.
    ///
    /// The returned [`Subscription`] removes only this listener;
    /// [`Subscription::unsubscribe`] is idempotent and safe to call
    /// after a disconnect.
    ///
    /// [`disconnect`]: EventBusClient::disconnect
    pub fn on_update<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&JobUpdate) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, Arc::new(callback)));
        self.ensure_connected();
        Subscription {
            inner: Arc::downgrade(&self.inner),
            id,
            removed: AtomicBool::new(false),
        }
    }

    /// Whether the transport subscription is currently established.
    ///
    /// Reflects the transport's connect/disconnect signals as they are
    /// bound by the connection task.
    pub fn is_connected(&self) -> bool {
        *self.inner.connected_tx.borrow()
    }

    /// Observe connection-state changes directly.
    ///
    /// The latest state and a change notification are always
    /// observable; intermediate flips between two reads coalesce into
    /// the most recent value, per `tokio::sync::watch` semantics.
    pub fn watch_connection(&self) -> watch::Receiver<bool> {
        self.inner.connected_tx.subscribe()
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Tear down the transport subscription.
    ///
    /// Listener registrations are preserved; the next
    /// [`on_update`](EventBusClient::on_update) call re-triggers lazy
    /// connection.
    pub fn disconnect(&self) {
        // Cancel and flip under the run-token lock: a still-running task
        // checks its token under the same lock before touching state, so
        // `false` is final once this returns.
        let mut run_token = self.inner.run_token.lock();
        if let Some(token) = run_token.take() {
            tracing::info!("Disconnecting from push channel");
            token.cancel();
        }
        self.inner.set_connected(false);
    }

    /// Tear down and immediately re-establish the subscription with the
    /// existing listener set.
    pub fn reconnect(&self) {
        self.disconnect();
        self.ensure_connected();
    }

    /// Spawn the connection task if it is not already running.
    fn ensure_connected(&self) {
        let mut run_token = self.inner.run_token.lock();
        if run_token.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *run_token = Some(token.clone());

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            run_connection(inner, token).await;
        });
    }
}

/// Connection task: subscribe, dispatch frames, re-subscribe on loss.
///
/// Exits only when the cancellation token fires. All state flips go
/// through [`BusInner::set_connected_for_task`], so a task that has
/// already been cancelled cannot resurrect a stale `true` after
/// [`EventBusClient::disconnect`] flipped the state to `false`.
async fn run_connection(inner: Arc<BusInner>, cancel: CancellationToken) {
    let mut delay = inner.config.reconnect.initial_delay;

    loop {
        let subscribed = tokio::select! {
            // Cancellation takes priority over a simultaneously-ready
            // subscription.
            biased;
            _ = cancel.cancelled() => return,
            result = inner.transport.subscribe(&inner.config.channel) => result,
        };

        let mut stream = match subscribed {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    channel = %inner.config.channel,
                    "Subscription failed, retrying",
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = next_delay(delay, &inner.config.reconnect);
                continue;
            }
        };

        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                event = stream.next() => event,
            };

            match event {
                Some(TransportEvent::Connected) => {
                    tracing::info!(channel = %inner.config.channel, "Push channel connected");
                    inner.set_connected_for_task(&cancel, true);
                    delay = inner.config.reconnect.initial_delay;
                }
                Some(TransportEvent::Frame(text)) => dispatch_frame(&inner, &text),
                Some(TransportEvent::Disconnected) => {
                    tracing::info!(channel = %inner.config.channel, "Push channel disconnected");
                    break;
                }
                Some(TransportEvent::Error(e)) => {
                    tracing::error!(error = %e, "Transport error on push channel");
                    break;
                }
                None => break,
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        inner.set_connected_for_task(&cancel, false);

        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        delay = next_delay(delay, &inner.config.reconnect);
    }
}

/// Decode one frame and deliver it to every listener.
///
/// Malformed frames and unrelated events are dropped; a panicking
/// listener never prevents delivery to its siblings.
fn dispatch_frame(inner: &BusInner, text: &str) {
    let envelope = match parse_frame(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, raw_frame = %text, "Failed to parse push frame");
            return;
        }
    };

    if envelope.event != inner.config.event {
        tracing::debug!(event = %envelope.event, "Ignoring unrelated event");
        return;
    }

    let update = match decode_job_update(envelope.data) {
        Ok(update) => update,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to decode job update payload");
            return;
        }
    };

    // Snapshot so listener callbacks run without holding the registry lock.
    let listeners: Vec<(u64, ListenerFn)> = inner.listeners.lock().clone();

    for (listener_id, listener) in listeners {
        let delivery = catch_unwind(AssertUnwindSafe(|| listener(&update)));
        if delivery.is_err() {
            tracing::error!(
                listener_id,
                job_id = %update.job_id,
                "Job update listener panicked",
            );
        }
    }
}

/// Handle for removing one registered listener.
///
/// Removal is explicit: dropping the handle leaves the listener
/// registered. Calling [`unsubscribe`](Subscription::unsubscribe) more
/// than once is a no-op.
pub struct Subscription {
    inner: Weak<BusInner>,
    id: u64,
    removed: AtomicBool,
}

impl Subscription {
    /// Remove the listener this handle refers to.
    pub fn unsubscribe(&self) {
        if self.removed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

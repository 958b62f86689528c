//! The tracking client.
//!
//! A [`Tracker`] owns the send queue and the active identity behind a single
//! mutex. Tracking calls encode a request, append it, persist the snapshot and
//! then try to deliver the head of the queue. Delivery runs on the tokio
//! runtime; the caller never waits for the network.
//!
//! # Delivery
//!
//! At most one request is in flight. A completion whose status falls inside
//! [`TrackerConfig::success_statuses`] removes the head and immediately moves
//! on to the next request. Any other status, or a transport error, keeps the
//! head and schedules a retry according to [`TrackerConfig::retry`]; until
//! that timer fires no new attempt is made.
//!
//! # Errors
//!
//! Tracking calls never fail. Invalid arguments, storage failures and delivery
//! failures are logged through `tracing` and otherwise ignored.

use std::fmt;
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::runtime::Handle;

use trk_core::{
    DeviceProfile, EventName, Identity, PendingRequest, PropertyBag, QueryEncoder, Scheme,
};
use trk_store::Storage;

use crate::config::{RetryPolicy, TrackerConfig};
use crate::connectivity::{Connectivity, Online};
use crate::identity::{self, Bootstrap};
use crate::queue::SendQueue;
use crate::transport::{HttpTransport, Transport, TransportError};

/// Interval at which [`Tracker::wait_idle`] checks the queue.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Errors raised while building a [`Tracker`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// No tokio runtime was supplied and none is running.
    #[error("no tokio runtime available; build the tracker inside a runtime or pass a handle")]
    NoRuntime,
    /// No store was supplied.
    #[error("a store is required")]
    MissingStore,
    /// The default HTTP transport could not be built.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Builder for [`Tracker`].
pub struct TrackerBuilder {
    config: TrackerConfig,
    device: Option<DeviceProfile>,
    initial_properties: PropertyBag,
    store: Option<Box<dyn Storage>>,
    transport: Option<Arc<dyn Transport>>,
    connectivity: Arc<dyn Connectivity>,
    runtime: Option<Handle>,
}

impl TrackerBuilder {
    /// Device profile to report. Defaults to [`DeviceProfile::current`].
    #[must_use]
    pub fn device(mut self, device: DeviceProfile) -> Self {
        self.device = Some(device);
        self
    }

    /// Properties sent along with the device profile when it is (re)sent.
    #[must_use]
    pub fn initial_properties(mut self, properties: PropertyBag) -> Self {
        self.initial_properties = properties;
        self
    }

    /// Durable store for the queue and preferences. Required.
    #[must_use]
    pub fn store(mut self, store: impl Storage + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    /// Transport used for delivery. Defaults to [`HttpTransport`].
    #[must_use]
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Connectivity source. Defaults to [`Online`].
    #[must_use]
    pub fn connectivity(mut self, connectivity: impl Connectivity + 'static) -> Self {
        self.connectivity = Arc::new(connectivity);
        self
    }

    /// Runtime that runs deliveries. Defaults to the current runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Restores persisted state and starts delivering anything left over.
    pub fn build(self) -> Result<Tracker, ClientError> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ClientError::NoRuntime)?,
        };
        let mut store = self.store.ok_or(ClientError::MissingStore)?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.request_timeout)?),
        };
        let device = self.device.unwrap_or_else(DeviceProfile::current);

        let Bootstrap {
            identity,
            profile_update,
        } = identity::bootstrap(store.as_mut(), &device, &self.initial_properties);
        let queue = SendQueue::restore(store.as_mut());

        let encoder = QueryEncoder::new(self.config.api_key.clone())
            .with_host(self.config.host.clone())
            .with_scheme(Scheme::from_secure(self.config.secure));

        let inner = Arc::new(Inner {
            state: Mutex::new(State {
                queue,
                identity,
                encoder,
                store,
                delivery: Delivery::default(),
            }),
            transport,
            connectivity: self.connectivity,
            runtime,
            success_statuses: self.config.success_statuses,
            retry: self.config.retry,
        });
        let tracker = Tracker { inner };

        tracker.send();
        if let Some(properties) = profile_update {
            tracker.set_properties(&properties);
        }
        Ok(tracker)
    }
}

/// Handle to a tracking client.
///
/// Clones share the same queue and identity. Create one per process and pass
/// it to the code that records events.
#[derive(Clone)]
pub struct Tracker {
    inner: Arc<Inner>,
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Tracker")
            .field("identity", &state.identity)
            .field("pending", &state.queue.len())
            .field("delivery", &state.delivery)
            .finish_non_exhaustive()
    }
}

impl Tracker {
    /// Starts building a tracker for `config`.
    pub fn builder(config: TrackerConfig) -> TrackerBuilder {
        TrackerBuilder {
            config,
            device: None,
            initial_properties: PropertyBag::new(),
            store: None,
            transport: None,
            connectivity: Arc::new(Online),
            runtime: None,
        }
    }

    /// Records the event `name` with optional properties.
    ///
    /// An empty name is ignored.
    pub fn record_event(&self, name: &str, properties: &PropertyBag) {
        let Ok(name) = EventName::new(name) else {
            tracing::debug!("ignoring event with empty name");
            return;
        };
        let timestamp = Utc::now().timestamp();
        self.enqueue_with(|state| {
            Some(
                state
                    .encoder
                    .event(&state.identity, &name, Some(properties), timestamp),
            )
        });
    }

    /// Sets properties on the current identity.
    ///
    /// Ignored when no entry has both a name and a value.
    pub fn set_properties(&self, properties: &PropertyBag) {
        if properties.is_empty() {
            tracing::debug!("ignoring empty property set");
            return;
        }
        let timestamp = Utc::now().timestamp();
        self.enqueue_with(|state| {
            match state
                .encoder
                .properties(&state.identity, properties, timestamp)
            {
                Ok(request) => Some(request),
                Err(err) => {
                    tracing::debug!(error = %err, "ignoring property set");
                    None
                }
            }
        });
    }

    /// Sets a single property on the current identity.
    ///
    /// An empty name is ignored.
    pub fn set_property(&self, name: &str, value: &str) {
        if name.is_empty() {
            tracing::debug!("ignoring property with empty name");
            return;
        }
        self.set_properties(&PropertyBag::new().with(name, value));
    }

    /// Links the current identity to `identity` and makes it the active one.
    ///
    /// An empty identity is ignored.
    pub fn identify(&self, identity: &str) {
        let Ok(identity) = Identity::new(identity) else {
            tracing::debug!("ignoring empty identity");
            return;
        };
        self.enqueue_with(|state| {
            let request = state.encoder.link(&state.identity, &identity);
            identity::persist_identity(state.store.as_mut(), &identity);
            state.identity = identity;
            Some(request)
        });
    }

    /// Links two identities without changing the active one.
    ///
    /// Ignored unless both identities are non-empty.
    pub fn alias(&self, first: &str, second: &str) {
        let (Ok(first), Ok(second)) = (Identity::new(first), Identity::new(second)) else {
            tracing::debug!(first, second, "ignoring alias with empty identity");
            return;
        };
        self.enqueue_with(|state| Some(state.encoder.link(&first, &second)));
    }

    /// Replaces the active identity with a fresh random one.
    ///
    /// Nothing is sent.
    pub fn clear_identity(&self) {
        let identity = Identity::random();
        let mut state = self.inner.lock();
        identity::persist_identity(state.store.as_mut(), &identity);
        state.identity = identity;
        tracing::debug!("identity cleared");
    }

    /// Tries to deliver the head of the queue.
    ///
    /// Does nothing when the queue is empty, a request is in flight, a retry
    /// is pending, or the network is unavailable.
    pub fn send(&self) {
        let mut state = self.inner.lock();
        self.inner.pump(&mut state);
    }

    /// Switches the scheme used for requests built from now on.
    pub fn set_secure(&self, secure: bool) {
        self.inner
            .lock()
            .encoder
            .set_scheme(Scheme::from_secure(secure));
    }

    /// The active identity.
    pub fn identity(&self) -> Identity {
        self.inner.lock().identity.clone()
    }

    /// Pending requests in delivery order.
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.inner.lock().queue.snapshot()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Waits until the queue is empty. Returns `false` if `timeout` elapses first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.inner.lock().queue.is_empty() {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(IDLE_POLL_INTERVAL).await;
        }
    }

    fn enqueue_with<F>(&self, build: F)
    where
        F: FnOnce(&mut State) -> Option<PendingRequest>,
    {
        let mut guard = self.inner.lock();
        let Some(request) = build(&mut *guard) else {
            return;
        };
        let state = &mut *guard;
        state.queue.push(request, state.store.as_mut());
        self.inner.pump(state);
    }
}

struct Inner {
    state: Mutex<State>,
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn Connectivity>,
    runtime: Handle,
    success_statuses: RangeInclusive<u16>,
    retry: RetryPolicy,
}

struct State {
    queue: SendQueue,
    identity: Identity,
    encoder: QueryEncoder,
    store: Box<dyn Storage>,
    delivery: Delivery,
}

#[derive(Debug, Default)]
struct Delivery {
    in_flight: bool,
    retry_pending: bool,
    failures: u32,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dispatches the head of the queue if nothing blocks it.
    fn pump(self: &Arc<Self>, state: &mut State) {
        if state.delivery.in_flight || state.delivery.retry_pending {
            return;
        }
        let Some(head) = state.queue.head() else {
            return;
        };
        if !self.connectivity.is_available() {
            tracing::debug!(pending = state.queue.len(), "network unavailable; deferring delivery");
            return;
        }

        let request = head.clone();
        state.delivery.in_flight = true;
        let attempt = Attempt {
            inner: Arc::clone(self),
            armed: true,
        };
        self.runtime.spawn(async move {
            let outcome = attempt.inner.transport.send(request.as_str()).await;
            attempt.finish(&request, outcome);
        });
    }

    fn finished(self: &Arc<Self>, request: &PendingRequest, outcome: Result<u16, TransportError>) {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.delivery.in_flight = false;

        match outcome {
            Ok(status) if self.success_statuses.contains(&status) => {
                state.delivery.failures = 0;
                // Runs the store write on this worker while holding the lock.
                // The snapshot is one row per pending request.
                state.queue.complete_head(request, state.store.as_mut());
                self.pump(state);
            }
            Ok(status) => {
                tracing::warn!(status, "tracking request rejected");
                self.schedule_retry(state);
            }
            Err(err) => {
                tracing::warn!(error = %err, "tracking request failed");
                self.schedule_retry(state);
            }
        }
    }

    fn schedule_retry(self: &Arc<Self>, state: &mut State) {
        state.delivery.failures = state.delivery.failures.saturating_add(1);
        state.delivery.retry_pending = true;
        let delay = self.retry.delay_for(state.delivery.failures);
        tracing::debug!(
            failures = state.delivery.failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "retry scheduled"
        );

        let inner = Arc::clone(self);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = inner.lock();
            state.delivery.retry_pending = false;
            inner.pump(&mut state);
        });
    }
}

/// Owns the in-flight slot for one delivery task.
///
/// If the task ends without reporting a result (the transport panicked or the
/// runtime dropped the task) the slot is released and a retry is scheduled.
struct Attempt {
    inner: Arc<Inner>,
    armed: bool,
}

impl Attempt {
    fn finish(mut self, request: &PendingRequest, outcome: Result<u16, TransportError>) {
        self.armed = false;
        self.inner.finished(request, outcome);
    }
}

impl Drop for Attempt {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::warn!("delivery task ended without a result");
        let mut guard = self.inner.lock();
        let state = &mut *guard;
        state.delivery.in_flight = false;
        self.inner.schedule_retry(state);
    }
}

//! Connection lifecycle owner
//!
//! The manager holds the transport behind a single `tokio::sync::Mutex`. Every
//! connect, publish and state change happens while that lock is held, so the
//! reconnection loop and publishers never race on the transport handle. Status
//! reads go through a `watch` channel and never wait on the lock.
//!
//! Disconnect notices from the transport are consumed by a supervisor task and
//! turned into [`ConnectionManager::on_disconnect`] calls. The state guard in
//! `on_disconnect` makes those calls idempotent: only the caller that moves the
//! state into `Reconnecting` runs the retry loop.

use super::metrics::{ConnectionMetrics, MetricsSnapshot};
use super::options::ConnectionOptions;
use super::retry::{ReconnectionDecision, RetryPolicy, RetryState};
use super::state::{log_state_transition, ConnectionEvent, ConnectionState, Transition};
use crate::error::{error_chain, redact_credentials, ConnectionError};
use crate::transport::{DisconnectNotice, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

/// Proof that the transport exclusion lock is held
pub(crate) type TransportGuard<'a, T> = MutexGuard<'a, T>;

/// Owns the transport and drives initial connect and recovery
pub struct ConnectionManager<T>
where
    T: Transport + 'static,
{
    transport: Mutex<T>,
    options: ConnectionOptions,
    policy: RetryPolicy,
    state_tx: watch::Sender<ConnectionState>,
    shutdown_tx: watch::Sender<bool>,
    established: AtomicBool,
    disposed: AtomicBool,
    metrics: Arc<ConnectionMetrics>,
    supervisor: Option<JoinHandle<()>>,
}

impl<T> ConnectionManager<T>
where
    T: Transport + 'static,
{
    /// Wrap a transport and start listening for its disconnect notices
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(mut transport: T, options: ConnectionOptions, policy: RetryPolicy) -> Arc<Self> {
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        transport.on_disconnected(notice_tx);

        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let supervisor = tokio::spawn(Self::supervise(weak.clone(), notice_rx, shutdown_rx));

            Self {
                transport: Mutex::new(transport),
                options,
                policy,
                state_tx,
                shutdown_tx,
                established: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                metrics: Arc::new(ConnectionMetrics::new()),
                supervisor: Some(supervisor),
            }
        })
    }

    /// Current connection state (may be momentarily stale)
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Receiver notified on every state change
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether a session has ever been established
    pub fn is_established(&self) -> bool {
        self.established.load(Ordering::Acquire)
    }

    pub fn is_shut_down(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub(crate) fn metrics_handle(&self) -> &Arc<ConnectionMetrics> {
        &self.metrics
    }

    /// Acquire the transport exclusion lock
    pub(crate) async fn lock(&self) -> TransportGuard<'_, T> {
        self.transport.lock().await
    }

    /// Perform the first connect
    ///
    /// Failures are returned to the caller and are not retried.
    pub async fn initialize(&self) -> Result<(), ConnectionError> {
        if self.is_shut_down() {
            return Err(ConnectionError::ShutDown);
        }

        let mut link = self.lock().await;
        match self.state() {
            ConnectionState::Connected => {
                debug!("Already connected, initialize is a no-op");
                return Ok(());
            }
            ConnectionState::Disconnected => {}
            state => return Err(ConnectionError::InvalidState { state }),
        }

        self.apply(&link, ConnectionEvent::ConnectRequested);
        info!(
            host = %self.options.host(),
            port = self.options.port(),
            client_id = %self.options.client_id(),
            tls = self.options.tls(),
            "Connecting to MQTT broker"
        );

        match self.connect_locked(&mut link).await {
            Ok(()) => {
                self.apply(&link, ConnectionEvent::ConnectSucceeded);
                self.established.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                error!(
                    error = %redact_credentials(&error_chain(&e)),
                    "Initial connection to MQTT broker failed"
                );
                self.apply(&link, ConnectionEvent::ConnectFailed);
                Err(e)
            }
        }
    }

    /// Make a single connect attempt
    ///
    /// On success the state becomes `Connected`; on failure it is unchanged.
    pub async fn connect(&self) -> Result<(), ConnectionError> {
        if self.is_shut_down() {
            return Err(ConnectionError::ShutDown);
        }

        let mut link = self.lock().await;
        self.connect_locked(&mut link).await?;

        if self.state() == ConnectionState::Disconnected {
            self.apply(&link, ConnectionEvent::ConnectRequested);
        }
        self.apply(&link, ConnectionEvent::ConnectSucceeded);
        self.established.store(true, Ordering::Release);
        Ok(())
    }

    /// Handle loss of the session
    ///
    /// Returns immediately when a reconnection episode is already running.
    /// Otherwise moves to `Reconnecting` and runs the retry loop to completion.
    pub async fn on_disconnect(&self) {
        if self.is_shut_down() {
            return;
        }

        {
            let link = self.lock().await;
            if !self.is_established() {
                debug!("Ignoring disconnect before any session was established");
                return;
            }
            if !self.apply(&link, ConnectionEvent::DisconnectDetected).moved() {
                debug!("Reconnection already in progress");
                return;
            }
        }

        self.run_reconnection_loop()
            .instrument(crate::reconnect_span!(client_id = %self.options.client_id()))
            .await;
    }

    /// Start background recovery unless one is running or cannot start
    pub(crate) fn request_recovery(self: &Arc<Self>) {
        if self.is_shut_down() || !self.is_established() {
            return;
        }
        if self.state() == ConnectionState::Reconnecting {
            return;
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.recover_if_down().await;
        });
    }

    /// One synchronous recovery attempt for a caller that already holds the lock
    ///
    /// Only reconnects when the transport reports the session down.
    pub(crate) async fn recover_once(
        &self,
        link: &mut TransportGuard<'_, T>,
    ) -> Result<(), ConnectionError> {
        if link.is_connected() {
            return Ok(());
        }
        info!("Transport session down during publish, attempting immediate reconnect");
        self.connect_locked(link).await
    }

    /// Stop recovery and release the transport
    ///
    /// The transport is disposed exactly once; later calls are no-ops.
    pub async fn shutdown(&self) -> Result<(), ConnectionError> {
        if self.disposed.swap(true, Ordering::AcqRel) {
            debug!("Connection manager already shut down");
            return Ok(());
        }

        self.shutdown_tx.send_replace(true);

        let mut link = self.lock().await;
        self.state_tx.send_replace(ConnectionState::Disconnected);
        link.dispose()
            .await
            .map_err(|e| ConnectionError::DisposeFailed(Box::new(e)))?;

        info!("Connection manager shut down");
        Ok(())
    }

    /// Apply a state event; callers prove they hold the exclusion lock
    pub(crate) fn apply(&self, _link: &TransportGuard<'_, T>, event: ConnectionEvent) -> Transition {
        let mut outcome = Transition::Ignored {
            state: self.state(),
            event,
        };

        self.state_tx
            .send_if_modified(|state| match state.transition(event) {
                Some(next) => {
                    outcome = Transition::Moved {
                        from: *state,
                        to: next,
                    };
                    *state = next;
                    true
                }
                None => {
                    outcome = Transition::Ignored {
                        state: *state,
                        event,
                    };
                    false
                }
            });

        match outcome {
            Transition::Moved { from, to } => log_state_transition(from, to),
            Transition::Ignored { state, event } => {
                debug!(%state, ?event, "Ignoring event with no transition");
            }
        }
        outcome
    }

    async fn connect_locked(&self, link: &mut TransportGuard<'_, T>) -> Result<(), ConnectionError> {
        let timeout = self.options.connect_timeout();
        match tokio::time::timeout(timeout, link.connect(&self.options)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(ConnectionError::Rejected(Box::new(e))),
            Err(_) => Err(ConnectionError::Timeout(timeout)),
        }
    }

    async fn run_reconnection_loop(&self) {
        let _active = self.metrics.enter_reconnection();
        let mut retry = RetryState::new();

        loop {
            match self.policy.decide(retry.attempt()) {
                ReconnectionDecision::Proceed { attempt, delay } => {
                    info!(
                        attempt,
                        max_retries = self.policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Attempting reconnection"
                    );

                    if !Self::interruptible_sleep(self.shutdown_tx.subscribe(), delay).await {
                        return;
                    }

                    let mut link = self.lock().await;
                    if self.is_shut_down() || self.state() != ConnectionState::Reconnecting {
                        debug!(state = %self.state(), "Reconnection episode ended externally");
                        return;
                    }

                    match self.connect_locked(&mut link).await {
                        Ok(()) => {
                            self.apply(&link, ConnectionEvent::ConnectSucceeded);
                            self.metrics.record_recovery();
                            info!(attempt, "Reconnected to MQTT broker");
                            return;
                        }
                        Err(e) => {
                            self.metrics.record_failed_attempt();
                            warn!(
                                attempt,
                                max_retries = self.policy.max_retries,
                                error = %redact_credentials(&error_chain(&e)),
                                "Reconnection attempt failed"
                            );
                            retry.record_failure();
                        }
                    }
                }
                ReconnectionDecision::AbortMaxAttemptsExceeded => {
                    let link = self.lock().await;
                    self.apply(&link, ConnectionEvent::ReconnectExhausted);
                    self.metrics.record_exhausted();
                    error!(
                        max_retries = self.policy.max_retries,
                        "Max reconnection attempts exceeded; recovery restarts on next publish or disconnect notice"
                    );
                    return;
                }
            }
        }
    }

    /// Sleep unless shutdown is signalled first
    /// Returns true if the sleep completed, false if shutdown was requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay: Duration) -> bool {
        if *shutdown_rx.borrow() {
            return false;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(delay) => true,
        }
    }

    /// Forward transport disconnect notices into `on_disconnect`
    async fn supervise(
        manager: Weak<Self>,
        mut notices: mpsc::UnboundedReceiver<DisconnectNotice>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!("Disconnect supervisor stopping");
                        break;
                    }
                }
                notice = notices.recv() => {
                    let Some(notice) = notice else {
                        break;
                    };
                    let Some(manager) = manager.upgrade() else {
                        break;
                    };

                    warn!(
                        reason = %redact_credentials(&notice.reason),
                        "Transport reported disconnect"
                    );
                    tokio::spawn(async move {
                        manager.recover_if_down().await;
                    });
                }
            }
        }
    }

    /// Run `on_disconnect` unless the session has already been restored
    async fn recover_if_down(&self) {
        {
            let link = self.lock().await;
            if self.state() == ConnectionState::Connected && link.is_connected() {
                debug!("Session already restored, ignoring stale recovery trigger");
                return;
            }
        }
        self.on_disconnect().await;
    }
}

impl<T> Drop for ConnectionManager<T>
where
    T: Transport + 'static,
{
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);

        if let Some(handle) = self.supervisor.take() {
            handle.abort();
        }
    }
}

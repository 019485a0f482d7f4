//! Verification-code receiver runtime.
//!
//! One spawned task owns all receiver state. Handle calls, hub notifications,
//! retriever task completions and permission prompt results are posted to
//! its input queue and processed strictly in order.

/// Environment-backed runtime configuration.
pub mod config;

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use webotp_core::{
    BACKEND_AVAILABILITY_BUCKETS, BACKEND_AVAILABILITY_HISTOGRAM, BackendAvailability,
    EventStream, GmsBackend, NotificationEvent, PromptResult, RawNotification, ReceiverChannels,
    ReceiverError, ReceiverEvent, ReceiverLifecycleState, ReceiverStateMachine, Recovery,
    ResolutionHandle, RetrieverFailure, SessionId, classify_failure, parse_notification,
};
use webotp_platform::{
    MetricsSink, NotificationHub, NotificationSink, PromptHost, SmsProvider, SubscriptionId,
};

pub use config::{ConfigError, ReceiverConfig};

/// Collaborators of one receiver.
#[derive(Clone)]
pub struct ReceiverDeps {
    pub provider: Arc<dyn SmsProvider>,
    pub hub: Arc<dyn NotificationHub>,
    pub metrics: Arc<dyn MetricsSink>,
}

/// Point-in-time view of the receiver lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverSnapshot {
    pub state: ReceiverLifecycleState,
    pub destroyed: bool,
    pub current_session: Option<SessionId>,
}

enum ReceiverInput {
    Listen {
        window: Arc<dyn PromptHost>,
        is_local_request: bool,
        reply: oneshot::Sender<Result<SessionId, ReceiverError>>,
    },
    Destroy {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<ReceiverSnapshot>,
    },
    Notification(RawNotification),
    RetrievalSettled {
        session: SessionId,
        window: Arc<dyn PromptHost>,
        is_local_request: bool,
        outcome: Result<(), RetrieverFailure>,
    },
    PermissionDone {
        session: SessionId,
        window: Arc<dyn PromptHost>,
        result: PromptResult,
        is_local_request: bool,
    },
    PermissionDismissed {
        session: SessionId,
    },
    RetrievalAbandoned {
        session: SessionId,
    },
}

impl ReceiverInput {
    fn kind(&self) -> &'static str {
        match self {
            Self::Listen { .. } => "listen",
            Self::Destroy { .. } => "destroy",
            Self::Snapshot { .. } => "snapshot",
            Self::Notification(_) => "notification",
            Self::RetrievalSettled { .. } => "retrieval_settled",
            Self::PermissionDone { .. } => "permission_done",
            Self::PermissionDismissed { .. } => "permission_dismissed",
            Self::RetrievalAbandoned { .. } => "retrieval_abandoned",
        }
    }
}

/// Cloneable handle to a running receiver.
#[derive(Clone, Debug)]
pub struct ReceiverHandle {
    channels: ReceiverChannels<ReceiverInput>,
    shutdown: CancellationToken,
}

impl ReceiverHandle {
    /// Start a retrieval session. Fails once the receiver is destroyed.
    pub async fn listen(
        &self,
        window: Arc<dyn PromptHost>,
        is_local_request: bool,
    ) -> Result<SessionId, ReceiverError> {
        let (reply, rx) = oneshot::channel();
        self.send(
            ReceiverInput::Listen {
                window,
                is_local_request,
                reply,
            },
            "listen",
        )
        .await?;
        rx.await
            .map_err(|_| ReceiverError::runtime_closed("listen"))?
    }

    /// Unregister from the hub and ignore further notifications. Idempotent.
    pub async fn destroy(&self) -> Result<(), ReceiverError> {
        let (reply, rx) = oneshot::channel();
        self.send(ReceiverInput::Destroy { reply }, "destroy").await?;
        rx.await.map_err(|_| ReceiverError::runtime_closed("destroy"))
    }

    /// Current lifecycle view. Also orders after every input queued before it.
    pub async fn snapshot(&self) -> Result<ReceiverSnapshot, ReceiverError> {
        let (reply, rx) = oneshot::channel();
        self.send(ReceiverInput::Snapshot { reply }, "snapshot")
            .await?;
        rx.await.map_err(|_| ReceiverError::runtime_closed("snapshot"))
    }

    /// Subscribe to receiver events.
    pub fn subscribe(&self) -> EventStream {
        self.channels.subscribe()
    }

    /// Stop the runtime task, destroying the receiver if still alive.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    async fn send(&self, input: ReceiverInput, action: &str) -> Result<(), ReceiverError> {
        self.channels
            .send_input(input)
            .await
            .map_err(|_| ReceiverError::runtime_closed(action))
    }
}

/// Register with the hub and spawn the receiver runtime.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_receiver(deps: ReceiverDeps, config: ReceiverConfig) -> ReceiverHandle {
    let (channels, input_rx) = ReceiverChannels::new(config.input_buffer, config.event_buffer);

    let sink = Arc::new(RuntimeNotificationSink {
        channels: channels.clone(),
    });
    let subscription = deps.hub.register(&config.code_retrieved_action, sink);
    debug!(%subscription, action = %config.code_retrieved_action, "registered code-retrieved sink");

    let shutdown = CancellationToken::new();
    let runtime = ReceiverRuntime {
        channels: channels.clone(),
        input_rx,
        state_machine: ReceiverStateMachine::default(),
        deps,
        action: config.code_retrieved_action,
        subscription: Some(subscription),
        shutdown: shutdown.clone(),
    };
    tokio::spawn(async move {
        runtime.run().await;
    });

    ReceiverHandle { channels, shutdown }
}

struct RuntimeNotificationSink {
    channels: ReceiverChannels<ReceiverInput>,
}

impl NotificationSink for RuntimeNotificationSink {
    fn deliver(&self, notification: RawNotification) {
        if let Err(err) = self
            .channels
            .try_send_input(ReceiverInput::Notification(notification))
        {
            warn!(error = %err, "dropping code-retrieved notification");
            self.channels.emit(ReceiverEvent::NotificationDropped {
                reason: err.to_string(),
            });
        }
    }
}

struct ReceiverRuntime {
    channels: ReceiverChannels<ReceiverInput>,
    input_rx: mpsc::Receiver<ReceiverInput>,
    state_machine: ReceiverStateMachine,
    deps: ReceiverDeps,
    action: String,
    subscription: Option<SubscriptionId>,
    shutdown: CancellationToken,
}

impl ReceiverRuntime {
    async fn run(mut self) {
        debug!("receiver runtime started");
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                input = self.input_rx.recv() => {
                    let Some(input) = input else { break };
                    trace!(input = input.kind(), "receiver input");
                    self.handle_input(input);
                }
            }
        }
        self.destroy();
        debug!("receiver runtime exiting");
    }

    fn handle_input(&mut self, input: ReceiverInput) {
        match input {
            ReceiverInput::Listen {
                window,
                is_local_request,
                reply,
            } => {
                let result = self.listen(window, is_local_request);
                let _ = reply.send(result);
            }
            ReceiverInput::Destroy { reply } => {
                self.destroy();
                let _ = reply.send(());
            }
            ReceiverInput::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            ReceiverInput::Notification(notification) => self.on_notification(&notification),
            ReceiverInput::RetrievalSettled {
                session,
                window,
                is_local_request,
                outcome,
            } => self.on_retrieval_settled(session, window, is_local_request, outcome),
            ReceiverInput::PermissionDone {
                session,
                window,
                result,
                is_local_request,
            } => self.on_permission_done(session, window, result, is_local_request),
            ReceiverInput::PermissionDismissed { session } => {
                warn!(%session, "permission prompt closed without a result");
                let events = self.state_machine.resolve_permission();
                self.emit_all(events);
                self.channels.emit(ReceiverEvent::PermissionAbandoned {
                    session,
                    reason: "prompt closed without a result".to_owned(),
                });
            }
            ReceiverInput::RetrievalAbandoned { session } => {
                warn!(%session, "retriever task dropped without completing");
                let events = self.state_machine.settle_session(session);
                self.emit_all(events);
                self.channels
                    .emit(ReceiverEvent::RetrievalAbandoned { session });
            }
        }
    }

    fn snapshot(&self) -> ReceiverSnapshot {
        ReceiverSnapshot {
            state: self.state_machine.state(),
            destroyed: self.state_machine.is_destroyed(),
            current_session: self.state_machine.current_session(),
        }
    }

    fn destroy(&mut self) {
        let events = self.state_machine.destroy();
        if events.is_empty() {
            trace!("receiver already destroyed");
            return;
        }
        if let Some(subscription) = self.subscription.take() {
            self.deps.hub.unregister(subscription);
        }
        info!("verification receiver destroyed");
        self.emit_all(events);
    }

    fn on_notification(&mut self, notification: &RawNotification) {
        if self.state_machine.is_destroyed() {
            trace!(action = %notification.action, "notification after destroy ignored");
            return;
        }

        match parse_notification(&self.action, notification) {
            Ok(NotificationEvent::CodeReceived { code }) => {
                debug!(code_len = code.len(), "code received");
                self.deps
                    .provider
                    .on_receive(&code, GmsBackend::Verification);
                self.channels.emit(ReceiverEvent::CodeDelivered {
                    code,
                    backend: GmsBackend::Verification,
                });
            }
            Ok(NotificationEvent::TimedOut) => {
                debug!("code retrieval timed out");
                self.deps.provider.on_timeout();
                self.channels.emit(ReceiverEvent::TimedOut);
            }
            Err(skip) => debug!(reason = %skip, "notification ignored"),
        }
    }

    fn listen(
        &mut self,
        window: Arc<dyn PromptHost>,
        is_local_request: bool,
    ) -> Result<SessionId, ReceiverError> {
        let (session, events) = self.state_machine.begin_session(is_local_request)?;
        self.emit_all(events);

        let task = self.deps.provider.client().start_browser_code_retriever();
        let input_tx = self.channels.input_sender();
        tokio::spawn(async move {
            let settled = match task.outcome().await {
                Some(outcome) => ReceiverInput::RetrievalSettled {
                    session,
                    window,
                    is_local_request,
                    outcome,
                },
                None => ReceiverInput::RetrievalAbandoned { session },
            };
            if input_tx.send(settled).await.is_err() {
                debug!(%session, "runtime stopped before retriever task settled");
            }
        });

        debug!(%session, is_local_request, "installed retriever task");
        Ok(session)
    }

    // Task completions are not gated on `destroyed`; they report even after destroy.
    fn on_retrieval_settled(
        &mut self,
        session: SessionId,
        window: Arc<dyn PromptHost>,
        is_local_request: bool,
        outcome: Result<(), RetrieverFailure>,
    ) {
        if !self.state_machine.is_current(session) {
            debug!(%session, "retriever task settled for a superseded session");
        }
        let events = self.state_machine.settle_session(session);
        self.emit_all(events);

        match outcome {
            Ok(()) => {
                self.report_backend_availability(BackendAvailability::Available);
                self.deps.provider.discard_user_consent_receiver();
            }
            Err(failure) => {
                self.on_retriever_task_failure(session, window, is_local_request, &failure);
                self.deps.provider.discard_verification_receiver();
            }
        }
    }

    fn on_retriever_task_failure(
        &mut self,
        session: SessionId,
        window: Arc<dyn PromptHost>,
        is_local_request: bool,
        failure: &RetrieverFailure,
    ) {
        debug!(%session, status = %failure.status, "retriever task failed, attempting recovery");
        let classification = classify_failure(failure);

        match classification.recovery {
            Recovery::MethodNotAvailable => {
                info!(
                    status = %failure.status,
                    class = ?classification.class,
                    "retriever method not available"
                );
                self.deps.provider.on_method_not_available(is_local_request);
                self.channels
                    .emit(ReceiverEvent::MethodNotAvailable { is_local_request });
            }
            Recovery::Cancel => {
                info!(status = %failure.status, "user permission is required");
                self.deps.provider.on_cancel();
                self.channels.emit(ReceiverEvent::Cancelled);
            }
            Recovery::RequestPermission(handle) => {
                self.request_permission(session, window, &handle, is_local_request);
            }
            Recovery::Ignore => {
                warn!(
                    status = %failure.status,
                    class = ?classification.class,
                    "unexpected retriever failure"
                );
            }
        }

        if let Some(availability) = classification.availability {
            self.report_backend_availability(availability);
        }
    }

    fn request_permission(
        &mut self,
        session: SessionId,
        window: Arc<dyn PromptHost>,
        handle: &ResolutionHandle,
        is_local_request: bool,
    ) {
        let completion = match window.show_prompt(handle) {
            Ok(completion) => completion,
            Err(err) => {
                error!(%session, error = %err, "cannot launch user permission prompt");
                self.channels.emit(ReceiverEvent::PermissionAbandoned {
                    session,
                    reason: err.to_string(),
                });
                return;
            }
        };

        let events = self.state_machine.await_permission(session);
        self.emit_all(events);
        self.channels
            .emit(ReceiverEvent::PermissionRequested { session });
        debug!(%session, resolution = %handle.id(), "permission prompt shown");

        let input_tx = self.channels.input_sender();
        tokio::spawn(async move {
            let input = match completion.result().await {
                Some(result) => ReceiverInput::PermissionDone {
                    session,
                    window,
                    result,
                    is_local_request,
                },
                None => ReceiverInput::PermissionDismissed { session },
            };
            if input_tx.send(input).await.is_err() {
                debug!(%session, "runtime stopped before permission prompt completed");
            }
        });
    }

    fn on_permission_done(
        &mut self,
        session: SessionId,
        window: Arc<dyn PromptHost>,
        result: PromptResult,
        is_local_request: bool,
    ) {
        let events = self.state_machine.resolve_permission();
        self.emit_all(events);

        if !result.is_ok() {
            debug!(%session, result = result.0, "one-time permission rejected");
            self.deps.provider.on_cancel();
            self.channels.emit(ReceiverEvent::Cancelled);
            return;
        }

        debug!(%session, "one-time permission granted, restarting retrieval");
        if let Err(err) = self.listen(window, is_local_request) {
            warn!(%session, error = %err, "cannot restart retrieval after permission grant");
            self.channels.emit(ReceiverEvent::PermissionAbandoned {
                session,
                reason: err.message,
            });
        }
    }

    fn report_backend_availability(&self, availability: BackendAvailability) {
        debug!(
            ?availability,
            ordinal = availability.ordinal(),
            "backend availability"
        );
        self.deps.metrics.record_enumerated(
            BACKEND_AVAILABILITY_HISTOGRAM,
            availability.ordinal(),
            BACKEND_AVAILABILITY_BUCKETS,
        );
        self.channels
            .emit(ReceiverEvent::AvailabilityReported { availability });
    }

    fn emit_all(&self, events: Vec<ReceiverEvent>) {
        for event in events {
            self.channels.emit(event);
        }
    }
}

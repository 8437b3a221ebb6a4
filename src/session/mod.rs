//! Session controller.
//!
//! Owns the single active transport for the current session, routes its
//! events into the store and stops it once a terminal status is reached.
//!
//! # Lifecycle
//!
//! - `start_research` opens a streaming transport keyed [`SessionKey::Pending`];
//!   its `started` event re-keys the session to the backend plan id
//! - `set_session_key` / `connect` poll the status endpoint for a plan id
//! - every started transport gets a new generation; events from an older
//!   generation, including the `error`/`done` pair a cancelled stream emits,
//!   never reach the store

pub mod latch;
pub mod router;

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::api::types::UserConfirm;
use crate::api::ResearchApi;
use crate::bus::{SubscriberSet, Subscription};
use crate::core::patch::ResearchStatePatch;
use crate::core::snapshot::BackendSnapshot;
use crate::core::state::{Message, ResearchState, ResearchStatus, Role, DEFAULT_LOCALE};
use crate::store::{ResearchAction, ResearchStore};
use crate::stream::events::ResearchEvent;
use crate::transport::{
    EventSink, PollingTransport, ResearchTransport, StreamingTransport, TransportHandle,
};
use crate::ClientError;

use latch::TerminalLatch;
use router::{route_event, ChunkAccumulator};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// Streaming session before the backend assigned a plan id.
    Pending,
    Plan(String),
}

impl SessionKey {
    pub fn plan_id(&self) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::Plan(id) => Some(id),
        }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Plan(id) => f.write_str(id),
        }
    }
}

/// Delivered once per (session, terminal status).
#[derive(Debug, Clone)]
pub struct TerminalNotice {
    pub session: String,
    pub status: ResearchStatus,
    pub state: ResearchState,
}

struct ActiveTransport {
    key: SessionKey,
    generation: u64,
    handle: Arc<TransportHandle>,
}

#[derive(Default)]
struct SessionInner {
    active: Option<ActiveTransport>,
    generation: u64,
    chunks: ChunkAccumulator,
    latch: TerminalLatch,
}

struct Shared {
    store: Arc<ResearchStore>,
    streaming: Arc<dyn ResearchTransport>,
    polling: Arc<dyn ResearchTransport>,
    api: Option<Arc<ResearchApi>>,
    locale: String,
    inner: Mutex<SessionInner>,
    terminal: Arc<SubscriberSet<TerminalNotice>>,
}

#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    /// Controller backed by the HTTP API for both transports and for the
    /// start/confirm operations.
    pub fn new(store: Arc<ResearchStore>, api: Arc<ResearchApi>) -> Self {
        let config = api.config().clone();
        let streaming = Arc::new(StreamingTransport::new(api.clone(), config.locale.clone()));
        let polling = Arc::new(PollingTransport::new(api.clone(), config.poll_interval));
        Self::build(store, streaming, polling, Some(api), config.locale)
    }

    /// Controller over caller-supplied transports. Operations that need the
    /// HTTP API (`start_research_snapshot`, `confirm_plan`) return
    /// [`ClientError::Session`].
    pub fn with_transports(
        store: Arc<ResearchStore>,
        streaming: Arc<dyn ResearchTransport>,
        polling: Arc<dyn ResearchTransport>,
    ) -> Self {
        Self::build(store, streaming, polling, None, DEFAULT_LOCALE.to_string())
    }

    fn build(
        store: Arc<ResearchStore>,
        streaming: Arc<dyn ResearchTransport>,
        polling: Arc<dyn ResearchTransport>,
        api: Option<Arc<ResearchApi>>,
        locale: String,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                streaming,
                polling,
                api,
                locale,
                inner: Mutex::new(SessionInner::default()),
                terminal: SubscriberSet::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<ResearchStore> {
        &self.shared.store
    }

    /// Key of the running transport, if any.
    pub fn session_key(&self) -> Option<SessionKey> {
        self.shared.lock().active.as_ref().map(|a| a.key.clone())
    }

    pub fn active_handle(&self) -> Option<Arc<TransportHandle>> {
        self.shared.lock().active.as_ref().map(|a| a.handle.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .lock()
            .active
            .as_ref()
            .is_some_and(|a| !a.handle.is_cancelled() && !a.handle.is_finished())
    }

    /// Manual override: poll the plan id currently held in state. Returns
    /// `None` when no plan id is known yet.
    pub fn connect(&self) -> Option<Arc<TransportHandle>> {
        match self.shared.store.snapshot().plan_id {
            Some(plan_id) => Some(self.shared.connect_polling(&plan_id)),
            None => {
                tracing::debug!("connect ignored: no plan id yet");
                None
            }
        }
    }

    /// Stop the active transport. Its remaining events are discarded.
    pub fn disconnect(&self) {
        self.shared.disconnect();
    }

    /// Follow the active session key: `None` tears down, a new plan id
    /// replaces the running transport, the current plan id is a no-op.
    pub fn set_session_key(&self, plan_id: Option<&str>) -> Option<Arc<TransportHandle>> {
        match plan_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(plan_id) => Some(self.shared.connect_polling(plan_id)),
            None => {
                self.shared.disconnect();
                None
            }
        }
    }

    /// Start a new streaming session for `topic`, replacing any current one.
    pub fn start_research(&self, topic: &str) -> Result<Arc<TransportHandle>, ClientError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ClientError::Session("research topic cannot be empty".to_string()));
        }
        self.shared.begin_session(topic);

        let mut inner = self.shared.lock();
        let handle = self.shared.start_locked(
            &mut inner,
            SessionKey::Pending,
            self.shared.streaming.clone(),
            topic,
        );
        tracing::info!(topic = %topic, "research stream started");
        Ok(handle)
    }

    /// Non-streaming start: one `start` request, then polling unless the
    /// returned snapshot is already terminal.
    pub async fn start_research_snapshot(&self, topic: &str) -> Result<ResearchState, ClientError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ClientError::Session("research topic cannot be empty".to_string()));
        }
        let api = self.shared.api()?;
        self.shared.begin_session(topic);

        let snapshot = match api.start(topic).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.shared.record_failure(&e.to_string());
                return Err(e.into());
            }
        };
        Ok(self.shared.apply_operation_snapshot(snapshot))
    }

    /// Answer the plan confirmation prompt. Accepted while the plan is
    /// generated or awaiting confirmation.
    pub async fn confirm_plan(
        &self,
        decision: UserConfirm,
        message: Option<String>,
    ) -> Result<ResearchState, ClientError> {
        let api = self.shared.api()?;
        let state = self.shared.store.snapshot();
        let plan_id = state
            .plan_id
            .clone()
            .ok_or_else(|| ClientError::Session("no plan to confirm".to_string()))?;
        if !matches!(
            state.status,
            ResearchStatus::PlanGenerated | ResearchStatus::AwaitingConfirmation
        ) {
            return Err(ClientError::Session(format!(
                "plan cannot be confirmed while {}",
                state.status
            )));
        }

        self.shared.disconnect();
        {
            let mut inner = self.shared.lock();
            inner.latch.reset();
            inner.chunks.reset();
        }
        let message = message.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
        let mut actions = vec![
            ResearchAction::SetLoading(true),
            ResearchAction::UpdateFromBackend(ResearchStatePatch {
                error: Some(None),
                ..Default::default()
            }),
        ];
        if let Some(text) = &message {
            actions.push(ResearchAction::AddMessage(Message::new(
                uuid::Uuid::new_v4().to_string(),
                Role::User,
                text.clone(),
            )));
        }
        self.shared.store.dispatch_all(actions);

        tracing::info!(plan_id = %plan_id, decision = decision.as_str(), "confirming plan");
        let snapshot = match api.confirm_plan(&plan_id, decision, message).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.shared.record_failure(&e.to_string());
                return Err(e.into());
            }
        };
        Ok(self.shared.apply_operation_snapshot(snapshot))
    }

    /// Tear down the transport and return the store to defaults.
    pub fn reset(&self) {
        self.shared.disconnect();
        {
            let mut inner = self.shared.lock();
            inner.chunks.reset();
            inner.latch.reset();
        }
        self.shared.store.dispatch(ResearchAction::ResetResearch);
    }

    /// Called once per (session, terminal status), however many terminal
    /// events arrive.
    pub fn on_terminal<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&TerminalNotice) + Send + Sync + 'static,
    {
        self.shared.terminal.subscribe(Arc::new(callback))
    }
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn api(&self) -> Result<Arc<ResearchApi>, ClientError> {
        self.api
            .clone()
            .ok_or_else(|| ClientError::Session("no research API configured".to_string()))
    }

    fn disconnect(&self) {
        let active = self.lock().active.take();
        if let Some(active) = active {
            tracing::info!(kind = active.handle.kind(), session = %active.key, "transport disconnected");
            active.handle.cancel();
        }
    }

    fn begin_session(&self, topic: &str) {
        self.disconnect();
        {
            let mut inner = self.lock();
            inner.chunks.reset();
            inner.latch.reset();
        }
        self.store.dispatch_all([
            ResearchAction::ResetResearch,
            ResearchAction::SetTopic(topic.to_string()),
            ResearchAction::SetLocale(self.locale.clone()),
            ResearchAction::AddMessage(Message::new(
                uuid::Uuid::new_v4().to_string(),
                Role::User,
                topic,
            )),
            ResearchAction::SetLoading(true),
        ]);
    }

    fn record_failure(&self, error: &str) {
        self.store
            .dispatch(ResearchAction::UpdateFromBackend(ResearchStatePatch {
                error: Some(Some(error.to_string())),
                is_loading: Some(false),
                ..Default::default()
            }));
    }

    fn connect_polling(self: &Arc<Self>, plan_id: &str) -> Arc<TransportHandle> {
        let key = SessionKey::Plan(plan_id.to_string());
        let mut inner = self.lock();
        if let Some(active) = &inner.active {
            if active.key == key && !active.handle.is_cancelled() && !active.handle.is_finished() {
                tracing::debug!(session = %key, "already connected");
                return active.handle.clone();
            }
        }
        self.start_locked(&mut inner, key, self.polling.clone(), plan_id)
    }

    /// Replace the active transport. The caller holds the session lock, so
    /// the new task's first event waits until `active` is updated.
    fn start_locked(
        self: &Arc<Self>,
        inner: &mut SessionInner,
        key: SessionKey,
        transport: Arc<dyn ResearchTransport>,
        transport_key: &str,
    ) -> Arc<TransportHandle> {
        if let Some(previous) = inner.active.take() {
            tracing::info!(session = %previous.key, "replacing active transport");
            previous.handle.cancel();
        }
        inner.generation += 1;
        inner.chunks.reset();
        let generation = inner.generation;

        let weak: Weak<Shared> = Arc::downgrade(self);
        let sink: EventSink = Arc::new(move |event: ResearchEvent| {
            if let Some(shared) = weak.upgrade() {
                shared.handle_event(generation, event);
            }
        });

        let handle = Arc::new(transport.start(transport_key, sink));
        tracing::debug!(kind = transport.kind(), session = %key, generation, "transport started");
        inner.active = Some(ActiveTransport {
            key,
            generation,
            handle: handle.clone(),
        });
        handle
    }

    fn handle_event(&self, generation: u64, event: ResearchEvent) {
        let actions = {
            let mut inner = self.lock();
            let current = inner
                .active
                .as_ref()
                .is_some_and(|a| a.generation == generation && !a.handle.is_cancelled());
            if !current {
                tracing::debug!(event = event.name(), generation, "dropping event from stale transport");
                return;
            }

            match &event {
                ResearchEvent::Started { plan_id } => {
                    tracing::info!(plan_id = %plan_id, "session keyed by plan id");
                    if let Some(active) = inner.active.as_mut() {
                        active.key = SessionKey::Plan(plan_id.clone());
                    }
                }
                ResearchEvent::Done => inner.active = None,
                _ => {}
            }

            let state = self.store.snapshot();
            route_event(event, &mut inner.chunks, &state)
        };

        self.store.dispatch_all(actions);
        self.check_terminal(Some(generation));
    }

    /// Apply a snapshot returned by an explicit operation, then keep
    /// polling if the session is still running.
    fn apply_operation_snapshot(self: &Arc<Self>, snapshot: BackendSnapshot) -> ResearchState {
        let text = snapshot.messages.trim().to_string();
        let actions = {
            let mut inner = self.lock();
            let state = self.store.snapshot();
            route_event(ResearchEvent::Snapshot(snapshot), &mut inner.chunks, &state)
        };
        self.store.dispatch_all(actions);
        if !text.is_empty() {
            self.store.dispatch(ResearchAction::AddMessage(Message::new(
                uuid::Uuid::new_v4().to_string(),
                Role::Assistant,
                text,
            )));
        }

        let state = self.store.snapshot();
        if state.status.is_terminal() {
            self.check_terminal(None);
        } else if let Some(plan_id) = state.plan_id.as_deref() {
            self.connect_polling(plan_id);
        }
        self.store.snapshot()
    }

    /// Stop the transport that delivered a terminal status and fire terminal
    /// callbacks once.
    fn check_terminal(&self, generation: Option<u64>) {
        let state = self.store.snapshot();
        if !state.status.is_terminal() {
            return;
        }

        let (stopped, fire) = {
            let mut inner = self.lock();
            let owns_active = inner
                .active
                .as_ref()
                .is_some_and(|a| generation.map_or(true, |g| a.generation == g));
            let stopped = if owns_active { inner.active.take() } else { None };
            let session = state.plan_id.clone().unwrap_or_default();
            (stopped, inner.latch.observe(&session, state.status))
        };

        if let Some(active) = stopped {
            tracing::info!(
                status = %state.status,
                session = %active.key,
                "terminal status reached, stopping transport"
            );
            active.handle.cancel();
        }
        if state.is_loading {
            self.store.dispatch(ResearchAction::SetLoading(false));
        }
        if fire {
            let notice = TerminalNotice {
                session: state.plan_id.clone().unwrap_or_default(),
                status: state.status,
                state: self.store.snapshot(),
            };
            self.terminal.notify(&notice);
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(active) = inner.active.take() {
            active.handle.cancel();
        }
    }
}

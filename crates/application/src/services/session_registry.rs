//! Session registry - replayable, multi-subscriber event streams
//!
//! Every accepted unit of work owns a session. Events pushed into a session are
//! appended to a bounded replay buffer and forwarded to every attached subscriber in
//! push order. A terminal event closes the session; it then lingers for a grace
//! window so late subscribers can still replay it, and is swept afterwards.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};

use domain::{MetaPayload, SessionId, SseEvent};
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace, warn};

use crate::error::ApplicationError;

/// Limits applied to every session
#[derive(Debug, Clone)]
pub struct SessionRegistryConfig {
    /// Maximum number of buffered events per session
    pub max_buffered_events: usize,
    /// Maximum encoded bytes of buffered events per session
    pub max_buffered_bytes: usize,
    /// How long a finished session stays attachable
    pub grace: Duration,
    /// Age at which a session that never finished is dropped
    pub max_age: Duration,
}

impl Default for SessionRegistryConfig {
    fn default() -> Self {
        Self {
            max_buffered_events: 2_000,
            max_buffered_bytes: 4 * 1024 * 1024,
            grace: Duration::from_secs(30),
            max_age: Duration::from_secs(30 * 60),
        }
    }
}

/// Pushed to subscribers of a session dropped before finishing
pub const STALE_SESSION_MESSAGE: &str = "Session timed out before finishing";

/// Result of pushing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Appended; the value is the number of live subscribers reached
    Delivered(usize),
    /// The session is finished or no longer exists
    Rejected,
}

impl PushOutcome {
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// A subscriber's view of a session: replayed history followed by live events
#[derive(Debug)]
pub struct Subscription {
    pub session_id: SessionId,
    pub subscriber_id: u64,
    /// Number of buffered events delivered ahead of live ones
    pub replayed: usize,
    receiver: mpsc::UnboundedReceiver<SseEvent>,
}

impl Subscription {
    /// Next event; `None` once the session is finished or removed
    pub async fn recv(&mut self) -> Option<SseEvent> {
        self.receiver.recv().await
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<SseEvent>,
}

struct SessionState {
    created_at: Instant,
    buffer: VecDeque<(SseEvent, usize)>,
    buffer_bytes: usize,
    done: bool,
    expires_at: Option<Instant>,
    subscribers: Vec<Subscriber>,
    next_subscriber_id: u64,
    last_meta: Option<MetaPayload>,
}

impl SessionState {
    fn new(created_at: Instant) -> Self {
        Self {
            created_at,
            buffer: VecDeque::new(),
            buffer_bytes: 0,
            done: false,
            expires_at: None,
            subscribers: Vec::new(),
            next_subscriber_id: 0,
            last_meta: None,
        }
    }

    fn is_expired(&self, now: Instant, max_age: Duration) -> bool {
        match self.expires_at {
            Some(at) => at <= now,
            None => now.saturating_duration_since(self.created_at) >= max_age,
        }
    }

    /// Close subscribers; those of an unfinished session are told why first
    fn close(&mut self) {
        if !self.done {
            for sub in &self.subscribers {
                let _ = sub.tx.send(SseEvent::error(STALE_SESSION_MESSAGE));
            }
        }
        self.subscribers.clear();
    }

    /// Drop oldest events until both caps hold; the newest event is always kept
    fn trim(&mut self, config: &SessionRegistryConfig) {
        while self.buffer.len() > 1
            && (self.buffer.len() > config.max_buffered_events
                || self.buffer_bytes > config.max_buffered_bytes)
        {
            if let Some((_, size)) = self.buffer.pop_front() {
                self.buffer_bytes -= size;
            }
        }
    }
}

type SessionHandle = Arc<Mutex<SessionState>>;

/// Snapshot of a session for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub age: Duration,
    pub buffered_events: usize,
    pub buffered_bytes: usize,
    pub subscribers: usize,
    pub done: bool,
}

/// In-memory table of in-flight and recently finished sessions
pub struct SessionRegistry {
    config: SessionRegistryConfig,
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("config", &self.config)
            .field("sessions", &self.sessions.read().len())
            .finish()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionRegistryConfig::default())
    }
}

impl SessionRegistry {
    pub fn new(config: SessionRegistryConfig) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub const fn config(&self) -> &SessionRegistryConfig {
        &self.config
    }

    /// Create an empty, open session
    pub fn create(&self) -> SessionId {
        let id = SessionId::new();
        let state = Arc::new(Mutex::new(SessionState::new(Instant::now())));
        self.sessions.write().insert(id, state);
        debug!(session_id = %id, "Session created");
        id
    }

    /// Look up a live session, expiring it lazily
    fn handle(&self, id: &SessionId) -> Option<SessionHandle> {
        let handle = self.sessions.read().get(id).cloned()?;
        let mut state = handle.lock();
        if state.is_expired(Instant::now(), self.config.max_age) {
            state.close();
            drop(state);
            self.sessions.write().remove(id);
            debug!(session_id = %id, "Session expired on access");
            return None;
        }
        drop(state);
        Some(handle)
    }

    /// Append an event and forward it to every subscriber
    ///
    /// Terminal events finish the session: subscribers receive the event and are then
    /// closed, and the session becomes eligible for sweeping after the grace window.
    pub fn push(&self, id: &SessionId, event: SseEvent) -> PushOutcome {
        let Some(handle) = self.handle(id) else {
            trace!(session_id = %id, event = event.event_name(), "Push to unknown session");
            return PushOutcome::Rejected;
        };
        let mut state = handle.lock();
        if state.done {
            trace!(session_id = %id, event = event.event_name(), "Push after terminal event");
            return PushOutcome::Rejected;
        }

        if let SseEvent::Meta(meta) = &event {
            state.last_meta = Some(meta.clone());
        }

        let size = event.encoded_len();
        state.buffer.push_back((event.clone(), size));
        state.buffer_bytes += size;
        state.trim(&self.config);

        state.subscribers.retain(|sub| sub.tx.send(event.clone()).is_ok());
        let delivered = state.subscribers.len();

        if event.is_terminal() {
            state.done = true;
            state.expires_at = Some(Instant::now() + self.config.grace);
            state.subscribers.clear();
            debug!(session_id = %id, event = event.event_name(), "Session finished");
        }

        PushOutcome::Delivered(delivered)
    }

    /// Subscribe to a session
    ///
    /// The returned subscription first yields the buffered history oldest to newest,
    /// then live events. For a finished session it yields the history and ends.
    #[instrument(skip(self))]
    pub fn attach(&self, id: &SessionId) -> Result<Subscription, ApplicationError> {
        let handle = self
            .handle(id)
            .ok_or_else(|| ApplicationError::NotFound(format!("session {id}")))?;
        let mut state = handle.lock();

        let (tx, receiver) = mpsc::unbounded_channel();
        for (event, _) in &state.buffer {
            // Receiver is alive in this scope
            let _ = tx.send(event.clone());
        }
        let replayed = state.buffer.len();

        let subscriber_id = state.next_subscriber_id;
        state.next_subscriber_id += 1;
        if !state.done {
            state.subscribers.push(Subscriber {
                id: subscriber_id,
                tx,
            });
        }

        debug!(session_id = %id, subscriber_id, replayed, done = state.done, "Subscriber attached");
        Ok(Subscription {
            session_id: *id,
            subscriber_id,
            replayed,
            receiver,
        })
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn detach(&self, id: &SessionId, subscriber_id: u64) {
        if let Some(handle) = self.sessions.read().get(id) {
            handle.lock().subscribers.retain(|sub| sub.id != subscriber_id);
            trace!(session_id = %id, subscriber_id, "Subscriber detached");
        }
    }

    /// Abandon a session; its subscribers are closed and later pushes are rejected
    pub fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().remove(id);
        if let Some(handle) = &removed {
            handle.lock().subscribers.clear();
            debug!(session_id = %id, "Session removed");
        }
        removed.is_some()
    }

    /// Drop finished sessions past their grace window and unfinished ones past
    /// `max_age`
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let max_age = self.config.max_age;
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|id, handle| {
            let mut state = handle.lock();
            if state.is_expired(now, max_age) {
                if !state.done {
                    warn!(session_id = %id, "Dropping session that never finished");
                }
                state.close();
                false
            } else {
                true
            }
        });
        before - sessions.len()
    }

    /// Whether the session exists and has not expired
    pub fn contains(&self, id: &SessionId) -> bool {
        self.handle(id).is_some()
    }

    /// Whether the session has seen its terminal event
    pub fn is_done(&self, id: &SessionId) -> Option<bool> {
        self.handle(id).map(|handle| handle.lock().done)
    }

    /// Latest `meta` payload pushed into the session
    pub fn last_meta(&self, id: &SessionId) -> Option<MetaPayload> {
        self.handle(id)?.lock().last_meta.clone()
    }

    pub fn info(&self, id: &SessionId) -> Option<SessionInfo> {
        let handle = self.handle(id)?;
        let state = handle.lock();
        Some(SessionInfo {
            id: *id,
            age: state.created_at.elapsed(),
            buffered_events: state.buffer.len(),
            buffered_bytes: state.buffer_bytes,
            subscribers: state.subscribers.len(),
            done: state.done,
        })
    }

    /// Number of tracked sessions, including finished ones awaiting sweep
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use domain::DonePayload;

    use super::*;

    fn drain(sub: &mut Subscription) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Ok(event) = sub.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn done() -> SseEvent {
        SseEvent::Done(DonePayload::default())
    }

    #[test]
    fn late_attach_replays_in_order() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        for i in 0..5 {
            registry.push(&id, SseEvent::chunk(format!("c{i}")));
        }

        let mut sub = registry.attach(&id).unwrap();
        assert_eq!(sub.replayed, 5);
        let events = drain(&mut sub);
        let texts: Vec<_> = events
            .iter()
            .map(|e| match e {
                SseEvent::Chunk(c) => c.text.clone(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(texts, vec!["c0", "c1", "c2", "c3", "c4"]);
    }

    #[test]
    fn early_and_late_subscribers_see_same_order() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        let mut early = registry.attach(&id).unwrap();

        registry.push(&id, SseEvent::status("a"));
        registry.push(&id, SseEvent::chunk("b"));
        let mut late = registry.attach(&id).unwrap();
        registry.push(&id, SseEvent::chunk("c"));
        registry.push(&id, done());

        assert_eq!(drain(&mut early), drain(&mut late));
    }

    #[test]
    fn push_after_terminal_is_rejected() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        assert_eq!(registry.push(&id, done()), PushOutcome::Delivered(0));
        assert!(registry.push(&id, SseEvent::chunk("late")).is_rejected());
        assert!(registry.push(&id, SseEvent::error("late")).is_rejected());
        assert_eq!(registry.is_done(&id), Some(true));
    }

    #[test]
    fn terminal_event_closes_live_subscribers() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        let mut sub = registry.attach(&id).unwrap();
        registry.push(&id, SseEvent::chunk("x"));
        registry.push(&id, SseEvent::error("boom"));

        let events = drain(&mut sub);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            sub.receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn attach_after_done_replays_then_closes() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        registry.push(&id, SseEvent::chunk("x"));
        registry.push(&id, done());

        let mut sub = registry.attach(&id).unwrap();
        assert_eq!(drain(&mut sub).len(), 2);
        assert!(matches!(
            sub.receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn trims_oldest_but_keeps_newest() {
        let registry = SessionRegistry::new(SessionRegistryConfig {
            max_buffered_events: 3,
            max_buffered_bytes: usize::MAX,
            ..SessionRegistryConfig::default()
        });
        let id = registry.create();
        for i in 0..6 {
            registry.push(&id, SseEvent::chunk(format!("c{i}")));
        }
        let mut sub = registry.attach(&id).unwrap();
        let events = drain(&mut sub);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], SseEvent::chunk("c3"));
        assert_eq!(events[2], SseEvent::chunk("c5"));
    }

    #[test]
    fn byte_cap_never_drops_newest_event() {
        let registry = SessionRegistry::new(SessionRegistryConfig {
            max_buffered_events: 100,
            max_buffered_bytes: 10,
            ..SessionRegistryConfig::default()
        });
        let id = registry.create();
        registry.push(&id, SseEvent::chunk("first"));
        registry.push(&id, SseEvent::chunk("a chunk far larger than ten bytes"));
        let info = registry.info(&id).unwrap();
        assert_eq!(info.buffered_events, 1);
        let mut sub = registry.attach(&id).unwrap();
        assert_eq!(
            drain(&mut sub),
            vec![SseEvent::chunk("a chunk far larger than ten bytes")]
        );
    }

    #[test]
    fn detach_and_dropped_receivers_are_pruned() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        let a = registry.attach(&id).unwrap();
        let b = registry.attach(&id).unwrap();
        let mut c = registry.attach(&id).unwrap();

        registry.detach(&id, a.subscriber_id);
        drop(b);
        assert_eq!(registry.push(&id, SseEvent::chunk("x")), PushOutcome::Delivered(1));
        assert_eq!(drain(&mut c).len(), 1);
    }

    #[test]
    fn unknown_session_is_not_found_and_rejected() {
        let registry = SessionRegistry::default();
        let id = SessionId::new();
        assert!(matches!(
            registry.attach(&id),
            Err(ApplicationError::NotFound(_))
        ));
        assert!(registry.push(&id, SseEvent::chunk("x")).is_rejected());
    }

    #[test]
    fn remove_closes_subscribers_and_rejects_pushes() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        let mut sub = registry.attach(&id).unwrap();
        assert!(registry.remove(&id));
        assert!(registry.push(&id, SseEvent::chunk("x")).is_rejected());
        assert!(matches!(
            sub.receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn sweep_removes_only_expired_sessions() {
        let registry = SessionRegistry::new(SessionRegistryConfig {
            grace: Duration::from_secs(5),
            ..SessionRegistryConfig::default()
        });
        let open = registry.create();
        let finished = registry.create();
        registry.push(&finished, done());

        assert_eq!(registry.sweep_expired(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(6);
        assert_eq!(registry.sweep_expired(later), 1);
        assert!(registry.contains(&open));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn sweep_drops_sessions_that_never_finish() {
        let registry = SessionRegistry::new(SessionRegistryConfig {
            max_age: Duration::from_secs(60),
            ..SessionRegistryConfig::default()
        });
        let stuck = registry.create();
        let mut sub = registry.attach(&stuck).unwrap();

        assert_eq!(registry.sweep_expired(Instant::now()), 0);
        let later = Instant::now() + Duration::from_secs(61);
        assert_eq!(registry.sweep_expired(later), 1);
        assert!(registry.is_empty());

        assert_eq!(drain(&mut sub), vec![SseEvent::error(STALE_SESSION_MESSAGE)]);
        assert!(matches!(
            sub.receiver.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
    }

    #[test]
    fn zero_grace_expires_lazily_on_access() {
        let registry = SessionRegistry::new(SessionRegistryConfig {
            grace: Duration::ZERO,
            ..SessionRegistryConfig::default()
        });
        let id = registry.create();
        registry.push(&id, done());
        assert!(registry.attach(&id).is_err());
        assert!(registry.is_empty());
    }

    #[test]
    fn tracks_last_meta() {
        let registry = SessionRegistry::default();
        let id = registry.create();
        assert!(registry.last_meta(&id).is_none());
        registry.push(
            &id,
            SseEvent::Meta(MetaPayload {
                model: Some("openai/gpt-5-mini".to_string()),
                ..MetaPayload::default()
            }),
        );
        assert_eq!(
            registry.last_meta(&id).and_then(|m| m.model),
            Some("openai/gpt-5-mini".to_string())
        );
    }

    #[tokio::test]
    async fn concurrent_pushers_and_attachers_keep_order() {
        let registry = Arc::new(SessionRegistry::default());
        let id = registry.create();
        let mut early = registry.attach(&id).unwrap();

        let pusher = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                for i in 0..200 {
                    registry.push(&id, SseEvent::chunk(i.to_string()));
                    tokio::task::yield_now().await;
                }
                registry.push(&id, SseEvent::Done(DonePayload::default()));
            })
        };
        let attacher = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                registry.attach(&id).unwrap()
            })
        };
        pusher.await.unwrap();
        let mut late = attacher.await.unwrap();

        let mut early_events = Vec::new();
        while let Some(event) = early.recv().await {
            early_events.push(event);
        }
        let mut late_events = Vec::new();
        while let Some(event) = late.recv().await {
            late_events.push(event);
        }
        assert_eq!(early_events.len(), 201);
        assert_eq!(early_events, late_events);
    }
}

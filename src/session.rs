//! Component session
//!
//! The [ComponentSession] is what a host drives: it polls the host until the
//! world is ready, builds the [ComponentStore], forwards entity lifecycle
//! callbacks, and runs dispatch once per tick
//!
//! Anything else, from any thread, talks to the session through a
//! [SessionHandle]. Handle calls never touch the store directly, they queue a
//! request which the session applies at the start of its next dispatch tick,
//! in the order the requests were made

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::SessionConfig;
use crate::entity::EntityInfo;
use crate::error::{HandlerResult, StoreError};
use crate::event::EventName;
use crate::id::{EntityId, GroupId, HandlerId, HandlerIds, LibraryId};
use crate::instance::{panic_message, NoticeLevel};
use crate::location::RunLocation;
use crate::profile::{ProfileBlock, Profiler};
use crate::registrar::Registrar;
use crate::store::ComponentStore;

/// The simulation host
pub trait Host {
    /// Returns where this process runs once the world is ready to receive
    /// components, `None` until then
    fn poll_ready(&mut self) -> Option<RunLocation>;

    /// Every entity that already exists when the session initializes
    fn existing_entities(&mut self) -> Vec<EntityInfo>;

    /// Shows a transient message to the user
    fn notify(&mut self, _message: &str, _duration: Duration, _level: NoticeLevel) {}
}

type Callback = Box<dyn FnMut() -> HandlerResult + Send>;

pub(crate) enum Request {
    RegisterGroup {
        library: LibraryId,
        group: GroupId,
    },
    RegisterUpdate {
        frequency: u32,
        id: HandlerId,
        callback: Callback,
        auto_unregister_on: Option<EntityId>,
    },
    UnregisterUpdate {
        frequency: u32,
        id: HandlerId,
    },
    RaiseSessionEvent(EventName),
    RaiseEntityEvent(EventName, EntityId),
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::RegisterGroup { library, group } => write!(f, "RegisterGroup({}, {})", library, group),
            Request::RegisterUpdate { frequency, id, auto_unregister_on, .. } => match auto_unregister_on {
                Some(entity) => write!(f, "RegisterUpdate({}, every {}, until {})", id, frequency, entity),
                None => write!(f, "RegisterUpdate({}, every {})", id, frequency),
            },
            Request::UnregisterUpdate { frequency, id } => write!(f, "UnregisterUpdate({}, every {})", id, frequency),
            Request::RaiseSessionEvent(event) => write!(f, "RaiseSessionEvent({})", event),
            Request::RaiseEntityEvent(event, entity) => write!(f, "RaiseEntityEvent({}, {})", event, entity),
        }
    }
}

/// Thread safe access to a running session. Cloning shares the queue
#[derive(Clone)]
pub struct SessionHandle {
    sender: Sender<Request>,
    ids: HandlerIds,
    profiler: Profiler,
}

/// The receiving end of a [SessionHandle], consumed by
/// [ComponentSession::new]
pub struct RequestQueue {
    receiver: Receiver<Request>,
    loopback: Sender<Request>,
    ids: HandlerIds,
    profiler: Profiler,
}

impl SessionHandle {
    pub fn channel() -> (Self, RequestQueue) {
        let (sender, receiver) = unbounded();
        let ids = HandlerIds::new();
        let profiler = Profiler::new();

        let handle = Self {
            sender: sender.clone(),
            ids: ids.clone(),
            profiler: profiler.clone(),
        };
        let queue = RequestQueue {
            receiver,
            loopback: sender,
            ids,
            profiler,
        };
        (handle, queue)
    }

    fn send(&self, request: Request) {
        if self.sender.send(request).is_err() {
            tracing::warn!("Session is gone, dropping request");
        }
    }

    /// Activates a group of a library on the next tick
    pub fn register_group(&self, library: LibraryId, group: GroupId) {
        self.send(Request::RegisterGroup { library, group });
    }

    /// Registers an update handler running every `frequency` ticks. The id is
    /// valid immediately, so the handler can be unregistered before it was
    /// ever applied
    pub fn register_update_handler<F>(&self, frequency: u32, callback: F, auto_unregister_on: Option<EntityId>) -> HandlerId
    where
        F: FnMut() -> HandlerResult + Send + 'static,
    {
        let id = self.ids.alloc();
        self.send(Request::RegisterUpdate {
            frequency,
            id,
            callback: Box::new(callback),
            auto_unregister_on,
        });
        id
    }

    pub fn unregister_update_handler(&self, frequency: u32, id: HandlerId) {
        self.send(Request::UnregisterUpdate { frequency, id });
    }

    pub fn raise_session_event(&self, event: impl Into<EventName>) {
        self.send(Request::RaiseSessionEvent(event.into()));
    }

    pub fn raise_entity_event(&self, event: impl Into<EventName>, entity: EntityId) {
        self.send(Request::RaiseEntityEvent(event.into(), entity));
    }

    /// Profile stats of every profiled handler, most expensive first
    pub fn profile_snapshot(&self) -> Vec<(String, ProfileBlock)> {
        self.profiler.snapshot()
    }

    /// Number of requests waiting for the next tick
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    NotInitialized,
    Initialized,
    Terminated,
}

/// What a call to [ComponentSession::on_tick] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The host is not ready yet
    NotReady,
    /// The session initialized on this tick, nothing was dispatched
    Initialized,
    /// Requests were applied and updates dispatched for this frame
    Dispatched(u64),
    Terminated,
}

pub struct ComponentSession<H: Host> {
    registrar: Arc<Registrar>,
    host: H,
    queue: RequestQueue,
    config: SessionConfig,
    status: SessionStatus,
    store: Option<ComponentStore>,
    frame: u64,
}

impl<H: Host> ComponentSession<H> {
    pub fn new(registrar: Arc<Registrar>, host: H, queue: RequestQueue, config: SessionConfig) -> Self {
        Self {
            registrar,
            host,
            queue,
            config,
            status: SessionStatus::NotInitialized,
            store: None,
            frame: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The frame the next dispatch tick runs
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn store(&self) -> Option<&ComponentStore> {
        self.store.as_ref()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn on_tick(&mut self) -> TickOutcome {
        match self.status {
            SessionStatus::Terminated => TickOutcome::Terminated,
            SessionStatus::NotInitialized => {
                let result = catch_unwind(AssertUnwindSafe(|| self.try_initialize()));
                match result {
                    Ok(true) => TickOutcome::Initialized,
                    Ok(false) => TickOutcome::NotReady,
                    Err(payload) => {
                        tracing::error!("Session failed to initialize: {}", panic_message(&*payload));
                        self.terminate();
                        TickOutcome::Terminated
                    }
                }
            }
            SessionStatus::Initialized => {
                let frame = self.frame;
                let result = catch_unwind(AssertUnwindSafe(|| self.dispatch(frame)));
                self.forward_notices();
                match result {
                    Ok(()) => {
                        self.frame += 1;
                        TickOutcome::Dispatched(frame)
                    }
                    Err(payload) => {
                        tracing::error!("Session failed on frame {}: {}", frame, panic_message(&*payload));
                        self.terminate();
                        TickOutcome::Terminated
                    }
                }
            }
        }
    }

    fn try_initialize(&mut self) -> bool {
        let Some(running_on) = self.host.poll_ready() else {
            return false;
        };

        tracing::info!("Initializing component session on {}", running_on);
        let mut store = ComponentStore::with_parts(
            running_on,
            self.queue.ids.clone(),
            self.queue.profiler.clone(),
            self.config.notify_duration,
        );

        for entity in self.host.existing_entities() {
            if let Err(err) = store.add_entity(entity) {
                tracing::error!("Skipping existing entity: {}", err);
            }
        }

        for group in self.registrar.auto_load_groups() {
            let result = group
                .map_err(StoreError::from)
                .and_then(|group| store.add_group(&group));
            if let Err(err) = result {
                tracing::error!("Failed to load group: {}", err);
            }
        }

        tracing::debug!(
            "Session initialized with {} entities and {} update handlers",
            store.tracked_entities().len(),
            store.update_handler_count()
        );

        self.store = Some(store);
        self.status = SessionStatus::Initialized;
        self.forward_notices();
        true
    }

    fn dispatch(&mut self, frame: u64) {
        let Some(store) = self.store.as_mut() else {
            return;
        };

        // Requests queued by handlers during this tick wait for the next one
        let queued = self.queue.receiver.len();
        for request in self.queue.receiver.try_iter().take(queued) {
            if self.config.log_requests {
                tracing::trace!("Applying {:?}", request);
            }
            apply(&self.registrar, store, request);
        }

        store.tick(frame);
    }

    pub fn on_entity_added(&mut self, entity: EntityInfo) -> Result<(), StoreError> {
        let Some(store) = self.live_store() else {
            tracing::trace!("Ignoring {} outside of a running session", entity);
            return Ok(());
        };
        let result = store.add_entity(entity);
        self.forward_notices();
        result
    }

    pub fn on_entity_removing(&mut self, entity: EntityId) -> Result<(), StoreError> {
        let Some(store) = self.live_store() else {
            tracing::trace!("Ignoring removal of {} outside of a running session", entity);
            return Ok(());
        };
        let result = store.remove_entity(entity);
        self.forward_notices();
        result
    }

    /// Queues SessionSave for the next tick
    pub fn on_save(&mut self) {
        if self.status != SessionStatus::Initialized {
            return;
        }
        tracing::trace!("Queueing {}", EventName::SESSION_SAVE);
        if self.queue.loopback.send(Request::RaiseSessionEvent(EventName::SESSION_SAVE)).is_err() {
            tracing::warn!("Request queue closed, dropping {}", EventName::SESSION_SAVE);
        }
    }

    /// Raises SessionClose, then discards every component
    pub fn on_close(&mut self) {
        if let Some(store) = self.live_store() {
            let result = catch_unwind(AssertUnwindSafe(|| store.raise_session_event(&EventName::SESSION_CLOSE)));
            if let Err(payload) = result {
                tracing::error!("Session failed while closing: {}", panic_message(&*payload));
            }
            self.forward_notices();
        }

        tracing::info!("Closing component session after {} frames", self.frame);
        self.terminate();
    }

    fn live_store(&mut self) -> Option<&mut ComponentStore> {
        match self.status {
            SessionStatus::Initialized => self.store.as_mut(),
            _ => None,
        }
    }

    fn forward_notices(&mut self) {
        let Some(store) = self.store.as_mut() else {
            return;
        };
        for notice in store.take_notices() {
            self.host.notify(&notice.message, notice.duration, notice.level);
        }
    }

    fn terminate(&mut self) {
        self.store = None;
        self.status = SessionStatus::Terminated;
        let dropped = self.queue.receiver.try_iter().count();
        if dropped > 0 {
            tracing::debug!("Dropped {} requests of a terminated session", dropped);
        }
    }
}

fn apply(registrar: &Registrar, store: &mut ComponentStore, request: Request) {
    let result = match request {
        Request::RegisterGroup { library, group } => registrar
            .select_group(library, group)
            .map_err(StoreError::from)
            .and_then(|group| store.add_group(&group)),
        Request::RegisterUpdate {
            frequency,
            id,
            callback,
            auto_unregister_on,
        } => store.insert_update_handler(id, frequency, callback, auto_unregister_on),
        Request::UnregisterUpdate { frequency, id } => {
            if !store.remove_update_handler(frequency, id) {
                tracing::trace!("Update handler {} was not registered", id);
            }
            Ok(())
        }
        Request::RaiseSessionEvent(event) => {
            store.raise_session_event(&event);
            Ok(())
        }
        Request::RaiseEntityEvent(event, entity) => {
            store.raise_entity_event(&event, entity);
            Ok(())
        }
    };

    if let Err(err) = result {
        tracing::error!("Request failed: {}", err);
    }
}

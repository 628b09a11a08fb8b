//! Component instances and bound handlers
//!
//! A [BoundHandler] is a handler descriptor tied to one live instance. Every
//! invocation goes through [BoundHandler::try_invoke], which is the failure
//! boundary of the framework: errors and panics raised by component code are
//! logged, reported to the host for debug libraries, and turned into a
//! request to evict the handler

use std::any::Any;
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::descriptor::{Action, ComponentDescriptor};
use crate::entity::EntityInfo;
use crate::error::{ComponentError, HandlerResult};
use crate::event::EventName;
use crate::id::{HandlerId, HandlerIds, StableId};
use crate::location::RunLocation;
use crate::profile::Profiler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A message for the host to show, produced when a debug library fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub duration: Duration,
    pub level: NoticeLevel,
}

/// Where dispatch reports to: the profiler and the pending host notices
#[derive(Debug, Clone)]
pub(crate) struct Diagnostics {
    pub(crate) profiler: Profiler,
    pub(crate) notices: Vec<Notice>,
    pub(crate) notify_for: Duration,
}

impl Diagnostics {
    pub(crate) fn new(profiler: Profiler, notify_for: Duration) -> Self {
        Self {
            profiler,
            notices: Vec::new(),
            notify_for,
        }
    }

    pub(crate) fn notify(&mut self, message: String) {
        self.notices.push(Notice {
            message,
            duration: self.notify_for,
            level: NoticeLevel::Error,
        });
    }
}

/// Runs component code, folding a panic into [ComponentError::Panicked]
pub(crate) fn guarded<T>(f: impl FnOnce() -> Result<T, ComponentError>) -> Result<T, ComponentError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| Err(ComponentError::Panicked(panic_message(&*payload))))
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}

pub(crate) struct BoundHandler {
    id: HandlerId,
    label: String,
    profile_key: String,
    event: EventName,
    frequency: u32,
    order: i32,
    runs_on: RunLocation,
    identity: StableId,
    debug: bool,
    profile: bool,
    action: Action,
}

impl BoundHandler {
    /// A handler registered at runtime rather than declared by a component
    pub(crate) fn external(id: HandlerId, frequency: u32, action: Action) -> Self {
        let label = format!("External.{}", id);
        Self {
            id,
            identity: StableId::of(&label),
            profile_key: label.clone(),
            label,
            event: EventName::UPDATE,
            frequency,
            order: 0,
            runs_on: RunLocation::BOTH,
            debug: false,
            profile: false,
            action,
        }
    }

    pub(crate) fn id(&self) -> HandlerId {
        self.id
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn event(&self) -> &EventName {
        &self.event
    }

    pub(crate) fn frequency(&self) -> u32 {
        self.frequency
    }

    pub(crate) fn sort_key(&self) -> (i32, std::cmp::Reverse<RunLocation>, StableId) {
        (self.order, std::cmp::Reverse(self.runs_on), self.identity)
    }

    /// Invokes the handler. Returns false if it failed and must be evicted
    pub(crate) fn try_invoke(&mut self, diag: &mut Diagnostics) -> bool {
        let started = self.profile.then(Instant::now);
        let action = &mut self.action;
        let result: HandlerResult = guarded(|| action());

        if let Some(started) = started {
            diag.profiler.record(&self.profile_key, started.elapsed());
        }

        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("Error invoking {} for {}: {}", self.label, self.event, err);
                if self.debug {
                    diag.notify(format!("Error running {} for {}, handler removed", self.label, self.event));
                }
                false
            }
        }
    }
}

/// A live component: its instance, if any, and the handlers bound to it that
/// it dispatches itself. Update handlers live in the update registry and are
/// only referenced here
pub struct ComponentInstance {
    descriptor: ComponentDescriptor,
    object: Option<Rc<dyn Any>>,
    pub(crate) handlers: Vec<BoundHandler>,
    pub(crate) updates: Vec<(u32, HandlerId)>,
}

impl ComponentInstance {
    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    /// The component object, if it is of type `C`
    pub fn object<C: 'static>(&self) -> Option<Rc<RefCell<C>>> {
        self.object.clone()?.downcast::<RefCell<C>>().ok()
    }

    /// Takes out the bound update handlers so they can be handed to the
    /// update registry, remembering their ids
    pub(crate) fn take_updates(&mut self) -> Vec<BoundHandler> {
        let (updates, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.handlers)
            .into_iter()
            .partition(|handler| handler.event == EventName::UPDATE);
        self.handlers = rest;
        self.updates = updates.iter().map(|h| (h.frequency, h.id)).collect();
        updates
    }

    /// Raises an event on this instance alone, evicting handlers that fail.
    /// Returns the number of handlers invoked
    pub(crate) fn raise(&mut self, event: &EventName, diag: &mut Diagnostics) -> usize {
        let mut invoked = 0;
        self.handlers.retain_mut(|handler| {
            if handler.event != *event {
                return true;
            }
            invoked += 1;
            handler.try_invoke(diag)
        });
        invoked
    }
}

impl ComponentDescriptor {
    /// Evaluates the activation condition for a candidate and, if it holds,
    /// creates the instance and binds every handler allowed to run here.
    /// Failures are isolated to this component
    pub(crate) fn try_create_instance(
        &self,
        running_on: RunLocation,
        candidate: Option<&EntityInfo>,
        ids: &HandlerIds,
        diag: &mut Diagnostics,
    ) -> Option<ComponentInstance> {
        let blueprint = self.blueprint();

        match guarded(|| blueprint.test(candidate)) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(err) => {
                self.report("checking condition", candidate, &err, diag);
                return None;
            }
        }

        let created = match guarded(|| blueprint.create(candidate)) {
            Ok(created) => created,
            Err(err) => {
                self.report("instantiating", candidate, &err, diag);
                return None;
            }
        };

        if self.debug() {
            match candidate {
                Some(entity) => tracing::debug!("Adding component {} to {}", self.name(), entity),
                None => tracing::debug!("Adding component {}", self.name()),
            }
        }

        let handlers = self
            .handlers()
            .iter()
            .filter(|handler| handler.should_run_on(running_on))
            .filter_map(|handler| {
                let action = created.bind(handler.method())?;
                Some(BoundHandler {
                    id: ids.alloc(),
                    label: handler.label().to_owned(),
                    profile_key: handler.qualified_label().to_owned(),
                    event: handler.event().clone(),
                    frequency: handler.frequency(),
                    order: handler.order(),
                    runs_on: handler.runs_on(),
                    identity: handler.identity(),
                    debug: handler.debug(),
                    profile: handler.profile(),
                    action,
                })
            })
            .collect();

        Some(ComponentInstance {
            descriptor: self.clone(),
            object: created.object,
            handlers,
            updates: Vec::new(),
        })
    }

    fn report(&self, stage: &str, candidate: Option<&EntityInfo>, err: &ComponentError, diag: &mut Diagnostics) {
        match candidate {
            Some(entity) => tracing::error!("Error {} {} for {}: {}", stage, self.name(), entity, err),
            None => tracing::error!("Error {} {}: {}", stage, self.name(), err),
        }
        if self.debug() {
            diag.notify(format!("Error {} {}", stage, self.name()));
        }
    }
}

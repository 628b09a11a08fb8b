//! Dispatch registries
//!
//! The [UpdateRegistry] buckets update handlers by their frequency. A bucket
//! with frequency `f` runs on every frame `t` where `t % f == 0`, so frame
//! zero runs every bucket
//!
//! The [SessionEventRegistry] keeps the handlers of every session event in a
//! single globally ordered list, regardless of which component declared them

use std::collections::{BTreeMap, HashMap};

use crate::event::EventName;
use crate::id::HandlerId;
use crate::instance::{BoundHandler, Diagnostics};

#[derive(Default)]
pub(crate) struct UpdateRegistry {
    buckets: BTreeMap<u32, Vec<BoundHandler>>,
}

impl UpdateRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Frequency must be non-zero, checked by the caller
    pub(crate) fn add(&mut self, handler: BoundHandler) {
        debug_assert!(handler.frequency() > 0);
        self.buckets.entry(handler.frequency()).or_default().push(handler);
    }

    pub(crate) fn remove(&mut self, frequency: u32, id: HandlerId) -> bool {
        let Some(bucket) = self.buckets.get_mut(&frequency) else {
            return false;
        };

        let before = bucket.len();
        bucket.retain(|handler| handler.id() != id);
        let removed = bucket.len() != before;

        if bucket.is_empty() {
            self.buckets.remove(&frequency);
        }
        removed
    }

    pub(crate) fn remove_all(&mut self, handlers: &[(u32, HandlerId)]) -> usize {
        handlers
            .iter()
            .filter(|(frequency, id)| self.remove(*frequency, *id))
            .count()
    }

    /// Runs every bucket due on `frame`, lowest frequency first. Failed
    /// handlers are evicted. Returns the number of handlers invoked
    pub(crate) fn tick(&mut self, frame: u64, diag: &mut Diagnostics) -> usize {
        let mut invoked = 0;
        for (frequency, bucket) in self.buckets.iter_mut() {
            if frame % u64::from(*frequency) != 0 {
                continue;
            }
            invoked += bucket.len();
            bucket.retain_mut(|handler| handler.try_invoke(diag));
        }
        self.buckets.retain(|_, bucket| !bucket.is_empty());
        invoked
    }

    pub(crate) fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    pub(crate) fn frequencies(&self) -> impl Iterator<Item = u32> + '_ {
        self.buckets.keys().copied()
    }
}

#[derive(Default)]
pub(crate) struct SessionEventRegistry {
    events: HashMap<EventName, Vec<BoundHandler>>,
}

impl SessionEventRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts in global order, after any handler with an equal key
    pub(crate) fn add(&mut self, handler: BoundHandler) {
        let handlers = self.events.entry(handler.event().clone()).or_default();
        let key = handler.sort_key();
        let at = handlers.partition_point(|existing| existing.sort_key() <= key);
        handlers.insert(at, handler);
    }

    /// Invokes every handler of `event` in order, evicting those that fail.
    /// Returns the number of handlers invoked
    pub(crate) fn raise(&mut self, event: &EventName, diag: &mut Diagnostics) -> usize {
        let Some(handlers) = self.events.get_mut(event) else {
            tracing::trace!("No handlers for session event {}", event);
            return 0;
        };

        let invoked = handlers.len();
        handlers.retain_mut(|handler| handler.try_invoke(diag));
        if handlers.is_empty() {
            self.events.remove(event);
        }
        invoked
    }

    pub(crate) fn labels(&self, event: &EventName) -> Vec<&str> {
        self.events
            .get(event)
            .map(|handlers| handlers.iter().map(BoundHandler::label).collect())
            .unwrap_or_default()
    }

    pub(crate) fn len(&self) -> usize {
        self.events.values().map(Vec::len).sum()
    }
}

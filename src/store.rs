//! Component store
//!
//! The [ComponentStore] owns every live component instance. It tracks
//! entities by id, attaches the active entity components of their kind, keeps
//! session components alive, and owns the registries dispatch runs from
//!
//! The store lives on the tick thread. Instances are `Rc<RefCell<_>>` so it
//! is deliberately neither `Send` nor `Sync`

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;
use std::time::Duration;

use crate::descriptor::{Action, ComponentDescriptor};
use crate::dispatch::{SessionEventRegistry, UpdateRegistry};
use crate::entity::{EntityInfo, EntityKind};
use crate::error::{HandlerResult, StoreError};
use crate::event::EventName;
use crate::id::{EntityId, GroupId, HandlerId, HandlerIds, LibraryId};
use crate::instance::{BoundHandler, ComponentInstance, Diagnostics, Notice};
use crate::location::RunLocation;
use crate::profile::Profiler;
use crate::registrar::ComponentGroup;

/// What installing and attaching needs besides the store itself
struct Context<'a> {
    running_on: RunLocation,
    ids: &'a HandlerIds,
    diag: &'a mut Diagnostics,
    updates: &'a mut UpdateRegistry,
}

struct TrackedEntity {
    info: EntityInfo,
    instances: Vec<ComponentInstance>,
}

/// Active components and tracked entities of one [EntityKind]
struct EntityComponentStore {
    kind: EntityKind,
    components: Vec<ComponentDescriptor>,
    entities: BTreeMap<EntityId, TrackedEntity>,
}

impl EntityComponentStore {
    fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            components: Vec::new(),
            entities: BTreeMap::new(),
        }
    }

    fn attach(descriptor: &ComponentDescriptor, info: &EntityInfo, cx: &mut Context) -> Option<ComponentInstance> {
        if !descriptor.accepts(info) {
            return None;
        }

        let mut instance = descriptor.try_create_instance(cx.running_on, Some(info), cx.ids, cx.diag)?;
        for handler in instance.take_updates() {
            cx.updates.add(handler);
        }
        Some(instance)
    }

    /// Activates a component and attaches it to every entity already tracked
    fn install(&mut self, descriptor: &ComponentDescriptor, cx: &mut Context) {
        if self.components.iter().any(|c| c.identity() == descriptor.identity()) {
            tracing::warn!("{} is already active for {}", descriptor.qualified_name(), self.kind);
            return;
        }

        let key = descriptor.sort_key();
        let at = self.components.partition_point(|c| c.sort_key() <= key);
        self.components.insert(at, descriptor.clone());

        let mut attached = 0;
        for tracked in self.entities.values_mut() {
            if let Some(instance) = Self::attach(descriptor, &tracked.info, cx) {
                let at = tracked
                    .instances
                    .partition_point(|i| i.descriptor().sort_key() <= key);
                tracked.instances.insert(at, instance);
                attached += 1;
            }
        }

        if attached > 0 {
            tracing::debug!("Attached {} to {} existing {} entities", descriptor.name(), attached, self.kind);
        }
    }

    fn add_entity(&mut self, info: EntityInfo, cx: &mut Context) {
        let instances: Vec<ComponentInstance> = self
            .components
            .iter()
            .filter_map(|descriptor| Self::attach(descriptor, &info, cx))
            .collect();

        tracing::trace!("Tracking {} with {} components", info, instances.len());
        self.entities.insert(info.id(), TrackedEntity { info, instances });
    }

    fn remove_entity(&mut self, id: EntityId, cx: &mut Context) -> Option<EntityInfo> {
        let mut tracked = self.entities.remove(&id)?;

        for instance in tracked.instances.iter_mut() {
            instance.raise(&EventName::ENTITY_CLOSE, cx.diag);
            cx.updates.remove_all(&instance.updates);
        }

        tracing::trace!("Stopped tracking {}", tracked.info);
        Some(tracked.info)
    }

    fn raise(&mut self, event: &EventName, id: EntityId, diag: &mut Diagnostics) -> Option<usize> {
        let tracked = self.entities.get_mut(&id)?;
        Some(
            tracked
                .instances
                .iter_mut()
                .map(|instance| instance.raise(event, diag))
                .sum(),
        )
    }
}

/// Session components: installed once, their non update handlers merged into
/// one globally ordered registry
#[derive(Default)]
struct SessionComponentStore {
    components: Vec<ComponentDescriptor>,
    instances: Vec<ComponentInstance>,
    events: SessionEventRegistry,
}

impl SessionComponentStore {
    fn install(&mut self, descriptor: &ComponentDescriptor, cx: &mut Context) {
        if self.components.iter().any(|c| c.identity() == descriptor.identity()) {
            tracing::warn!("Session component {} is already active", descriptor.qualified_name());
            return;
        }
        self.components.push(descriptor.clone());

        let Some(mut instance) = descriptor.try_create_instance(cx.running_on, None, cx.ids, cx.diag) else {
            return;
        };

        if descriptor.is_static() {
            instance.raise(&EventName::STATIC_INIT, cx.diag);
            instance.handlers.retain(|handler| *handler.event() != EventName::STATIC_INIT);
        }

        for handler in instance.take_updates() {
            cx.updates.add(handler);
        }
        for handler in instance.handlers.drain(..) {
            self.events.add(handler);
        }
        self.instances.push(instance);
    }
}

pub struct ComponentStore {
    running_on: RunLocation,
    ids: HandlerIds,
    diag: Diagnostics,
    updates: UpdateRegistry,
    session: SessionComponentStore,
    entities: [EntityComponentStore; 3],
    kinds: HashMap<EntityId, EntityKind>,
    active_groups: BTreeSet<(LibraryId, GroupId)>,
    auto_unregister: HashMap<EntityId, Vec<(u32, HandlerId)>>,
}

impl ComponentStore {
    pub fn new(running_on: RunLocation) -> Self {
        Self::with_parts(running_on, HandlerIds::new(), Profiler::new(), Duration::from_secs(10))
    }

    pub(crate) fn with_parts(running_on: RunLocation, ids: HandlerIds, profiler: Profiler, notify_for: Duration) -> Self {
        Self {
            running_on,
            ids,
            diag: Diagnostics::new(profiler, notify_for),
            updates: UpdateRegistry::new(),
            session: SessionComponentStore::default(),
            entities: EntityKind::ALL.map(EntityComponentStore::new),
            kinds: HashMap::new(),
            active_groups: BTreeSet::new(),
            auto_unregister: HashMap::new(),
        }
    }

    pub fn running_on(&self) -> RunLocation {
        self.running_on
    }

    /// Activates every component of a group. Session components are
    /// installed first, then entity components are attached to every entity
    /// already tracked. A group can only be activated once
    pub fn add_group(&mut self, group: &ComponentGroup) -> Result<(), StoreError> {
        let key = (group.library(), group.group());
        if self.active_groups.contains(&key) {
            tracing::error!("Group {} of {} is already active", group.group(), group.library());
            return Err(StoreError::GroupAlreadyActive(group.library(), group.group()));
        }
        self.active_groups.insert(key);

        let Self {
            running_on,
            ids,
            diag,
            updates,
            session,
            entities,
            ..
        } = self;
        let mut cx = Context {
            running_on: *running_on,
            ids,
            diag,
            updates,
        };

        for descriptor in group.session_components() {
            if descriptor.should_run_on(cx.running_on) {
                session.install(descriptor, &mut cx);
            }
        }

        for kind in EntityKind::ALL {
            let store = &mut entities[kind.index()];
            for descriptor in group.entity_components(kind) {
                if descriptor.should_run_on(cx.running_on) {
                    store.install(descriptor, &mut cx);
                }
            }
        }

        tracing::info!(
            "Activated group {} of {} with {} components",
            group.group(),
            group.library(),
            group.components().len()
        );
        Ok(())
    }

    pub fn add_entity(&mut self, info: EntityInfo) -> Result<(), StoreError> {
        if self.kinds.contains_key(&info.id()) {
            tracing::error!("Already added {}", info);
            return Err(StoreError::EntityAlreadyTracked(info.id()));
        }
        self.kinds.insert(info.id(), info.kind());

        let Self {
            running_on,
            ids,
            diag,
            updates,
            entities,
            ..
        } = self;
        let mut cx = Context {
            running_on: *running_on,
            ids,
            diag,
            updates,
        };
        entities[info.kind().index()].add_entity(info, &mut cx);
        Ok(())
    }

    /// Stops tracking one entity and fires its EntityClose handlers once.
    /// The blocks of a grid are not touched, the host closes them itself
    pub fn remove_entity(&mut self, id: EntityId) -> Result<(), StoreError> {
        let Some(kind) = self.kinds.remove(&id) else {
            tracing::error!("Never received {}", id);
            return Err(StoreError::EntityNotTracked(id));
        };

        let Self {
            running_on,
            ids,
            diag,
            updates,
            entities,
            auto_unregister,
            ..
        } = self;
        let mut cx = Context {
            running_on: *running_on,
            ids,
            diag,
            updates,
        };
        entities[kind.index()].remove_entity(id, &mut cx);

        if let Some(handlers) = auto_unregister.remove(&id) {
            let removed = cx.updates.remove_all(&handlers);
            tracing::trace!("Unregistered {} update handlers tied to {}", removed, id);
        }
        Ok(())
    }

    /// Raises an event on every component of one entity. Returns the number
    /// of handlers invoked
    pub fn raise_entity_event(&mut self, event: &EventName, id: EntityId) -> usize {
        let Some(kind) = self.kinds.get(&id).copied() else {
            tracing::trace!("Ignoring {} for untracked {}", event, id);
            return 0;
        };
        self.entities[kind.index()]
            .raise(event, id, &mut self.diag)
            .unwrap_or_default()
    }

    pub fn raise_session_event(&mut self, event: &EventName) -> usize {
        self.session.events.raise(event, &mut self.diag)
    }

    /// Runs every update bucket due on `frame`
    pub fn tick(&mut self, frame: u64) -> usize {
        self.updates.tick(frame, &mut self.diag)
    }

    /// Registers an update handler outside of any component. With
    /// `auto_unregister_on` the handler is dropped when that entity is removed
    pub fn add_update_handler<F>(
        &mut self,
        frequency: u32,
        callback: F,
        auto_unregister_on: Option<EntityId>,
    ) -> Result<HandlerId, StoreError>
    where
        F: FnMut() -> HandlerResult + 'static,
    {
        let id = self.ids.alloc();
        self.insert_update_handler(id, frequency, Box::new(callback), auto_unregister_on)?;
        Ok(id)
    }

    pub(crate) fn insert_update_handler(
        &mut self,
        id: HandlerId,
        frequency: u32,
        action: Action,
        auto_unregister_on: Option<EntityId>,
    ) -> Result<(), StoreError> {
        if frequency == 0 {
            tracing::error!("Update handler {} registered with a frequency of zero", id);
            return Err(StoreError::ZeroFrequency(id));
        }

        self.updates.add(BoundHandler::external(id, frequency, action));
        if let Some(entity) = auto_unregister_on {
            self.auto_unregister.entry(entity).or_default().push((frequency, id));
        }
        Ok(())
    }

    pub fn remove_update_handler(&mut self, frequency: u32, id: HandlerId) -> bool {
        self.auto_unregister.retain(|_, handlers| {
            handlers.retain(|handler| *handler != (frequency, id));
            !handlers.is_empty()
        });
        self.updates.remove(frequency, id)
    }

    /// Takes the host notifications produced since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.diag.notices)
    }

    pub fn profiler(&self) -> &Profiler {
        &self.diag.profiler
    }

    pub fn is_tracked(&self, id: EntityId) -> bool {
        self.kinds.contains_key(&id)
    }

    pub fn tracked_entities(&self) -> Vec<EntityId> {
        let mut tracked: Vec<EntityId> = self.kinds.keys().copied().collect();
        tracked.sort();
        tracked
    }

    fn tracked(&self, id: EntityId) -> Option<&TrackedEntity> {
        let kind = self.kinds.get(&id)?;
        self.entities[kind.index()].entities.get(&id)
    }

    pub fn instance_count(&self, id: EntityId) -> Option<usize> {
        self.tracked(id).map(|tracked| tracked.instances.len())
    }

    /// Names of the components attached to an entity, in dispatch order
    pub fn component_names(&self, id: EntityId) -> Option<Vec<&str>> {
        self.tracked(id)
            .map(|tracked| tracked.instances.iter().map(|i| i.name()).collect())
    }

    /// An entity's component object, if it has one named `name` of type `C`
    pub fn entity_component<C: 'static>(&self, id: EntityId, name: &str) -> Option<Rc<RefCell<C>>> {
        self.tracked(id)?
            .instances
            .iter()
            .find(|i| i.name() == name)?
            .object::<C>()
    }

    pub fn session_component<C: 'static>(&self, name: &str) -> Option<Rc<RefCell<C>>> {
        self.session
            .instances
            .iter()
            .find(|i| i.name() == name)?
            .object::<C>()
    }

    pub fn session_component_names(&self) -> Vec<&str> {
        self.session.instances.iter().map(|i| i.name()).collect()
    }

    /// Number of update handlers dropped when `entity` is removed
    pub fn tied_handler_count(&self, entity: EntityId) -> usize {
        self.auto_unregister.get(&entity).map_or(0, Vec::len)
    }

    pub fn update_handler_count(&self) -> usize {
        self.updates.len()
    }

    /// Frequencies with at least one update handler, ascending
    pub fn update_frequencies(&self) -> Vec<u32> {
        self.updates.frequencies().collect()
    }

    pub fn session_handler_total(&self) -> usize {
        self.session.events.len()
    }

    pub fn session_handler_count(&self, event: &EventName) -> usize {
        self.session.events.labels(event).len()
    }

    /// Labels of the handlers of a session event, in the order they run
    pub fn session_handler_order(&self, event: &EventName) -> Vec<&str> {
        self.session.events.labels(event)
    }

    pub fn active_groups(&self) -> impl Iterator<Item = (LibraryId, GroupId)> + '_ {
        self.active_groups.iter().copied()
    }

    pub fn active_components(&self, kind: EntityKind) -> &[ComponentDescriptor] {
        &self.entities[kind.index()].components
    }
}

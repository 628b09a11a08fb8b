//! Descriptors
//!
//! A [ComponentDescriptor] is the immutable description of a component: its
//! class level tags, its activation condition, how to construct it, and the
//! ordered list of [EventHandlerDescriptor]'s it exposes
//!
//! Components are declared with one of three typed builders:
//!
//! - [SessionComponent] is instantiated once for the whole session
//! - [StaticComponent] has no instance, its handlers are free functions
//! - [EntityComponent] is instantiated once per matching entity
//!
//! Handler closures are captured when the descriptor is built and bound to a
//! fresh instance every time the component is activated, so handler
//! signatures are checked by the compiler rather than at dispatch time

use std::any::Any;
use std::cell::RefCell;
use std::cmp::Reverse;
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::sync::Arc;

use itertools::Itertools;

use crate::entity::{EntityInfo, EntityKind};
use crate::error::{ComponentError, DiscoveryError, HandlerResult};
use crate::event::EventName;
use crate::id::{GroupId, LibraryId, StableId};
use crate::location::RunLocation;

/// A handler bound to its instance, ready to be invoked on the tick thread
pub(crate) type Action = Box<dyn FnMut() -> HandlerResult>;

type Method<C> = Arc<dyn Fn(&mut C) -> HandlerResult + Send + Sync>;
type StaticMethod = Arc<dyn Fn() -> HandlerResult + Send + Sync>;
type ConditionFn = Arc<dyn Fn(Option<&EntityInfo>) -> Result<bool, ComponentError> + Send + Sync>;
type ConstructorFn<C> = Arc<dyn Fn(Option<&EntityInfo>) -> Result<C, ComponentError> + Send + Sync>;

/// The result of constructing a component. Holds the instance, if any, and
/// binds handler methods to it by index
pub(crate) struct Created {
    pub(crate) object: Option<Rc<dyn Any>>,
    binder: Box<dyn Fn(usize) -> Option<Action>>,
}

impl Created {
    pub(crate) fn bind(&self, method: usize) -> Option<Action> {
        (self.binder)(method)
    }
}

/// Type erased recipe for a component: evaluates its condition and creates
/// bound instances
pub(crate) trait Blueprint: Send + Sync {
    fn test(&self, candidate: Option<&EntityInfo>) -> Result<bool, ComponentError>;
    fn create(&self, candidate: Option<&EntityInfo>) -> Result<Created, ComponentError>;
}

struct InstanceBlueprint<C> {
    condition: ConditionFn,
    construct: ConstructorFn<C>,
    methods: Vec<Method<C>>,
}

impl<C: 'static> Blueprint for InstanceBlueprint<C> {
    fn test(&self, candidate: Option<&EntityInfo>) -> Result<bool, ComponentError> {
        (self.condition)(candidate)
    }

    fn create(&self, candidate: Option<&EntityInfo>) -> Result<Created, ComponentError> {
        let instance = Rc::new(RefCell::new((self.construct)(candidate)?));
        let methods = self.methods.clone();
        let bound = instance.clone();

        Ok(Created {
            object: Some(instance as Rc<dyn Any>),
            binder: Box::new(move |index| {
                let method = methods.get(index)?.clone();
                let instance = bound.clone();
                Some(Box::new(move || method(&mut *instance.borrow_mut())) as Action)
            }),
        })
    }
}

struct StaticBlueprint {
    condition: ConditionFn,
    methods: Vec<StaticMethod>,
}

impl Blueprint for StaticBlueprint {
    fn test(&self, candidate: Option<&EntityInfo>) -> Result<bool, ComponentError> {
        (self.condition)(candidate)
    }

    fn create(&self, _: Option<&EntityInfo>) -> Result<Created, ComponentError> {
        let methods = self.methods.clone();
        Ok(Created {
            object: None,
            binder: Box::new(move |index| {
                let method = methods.get(index)?.clone();
                Some(Box::new(move || method()) as Action)
            }),
        })
    }
}

/// Method level tags: which event a handler responds to and how it is
/// scheduled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerTag {
    event: EventName,
    frequency: u32,
    order: i32,
    runs_on: RunLocation,
    label: Option<String>,
}

impl HandlerTag {
    pub fn event(event: impl Into<EventName>) -> Self {
        Self {
            event: event.into(),
            frequency: 1,
            order: 0,
            runs_on: RunLocation::BOTH,
            label: None,
        }
    }

    /// Runs every `frequency` ticks
    pub fn update(frequency: u32) -> Self {
        Self {
            frequency,
            ..Self::event(EventName::UPDATE)
        }
    }

    pub fn entity_close() -> Self {
        Self::event(EventName::ENTITY_CLOSE)
    }

    pub fn session_close() -> Self {
        Self::event(EventName::SESSION_CLOSE)
    }

    pub fn session_save() -> Self {
        Self::event(EventName::SESSION_SAVE)
    }

    /// Runs once, when a static session component is loaded
    pub fn static_init() -> Self {
        Self::event(EventName::STATIC_INIT)
    }

    /// The global order among all handlers of the same session event
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Further restricts where the handler runs, after the component's own
    /// run location
    pub fn runs_on(mut self, runs_on: RunLocation) -> Self {
        self.runs_on = runs_on;
        self
    }

    /// Names the handler in logs and profiles. Unnamed handlers are named
    /// after their event, so a component handling one event twice has to name
    /// at least one of them
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Holds the details of a single handler of a component
#[derive(Debug, Clone)]
pub struct EventHandlerDescriptor {
    event: EventName,
    frequency: u32,
    order: i32,
    runs_on: RunLocation,
    label: String,
    qualified: String,
    identity: StableId,
    debug: bool,
    profile: bool,
    method: usize,
}

impl EventHandlerDescriptor {
    pub fn event(&self) -> &EventName {
        &self.event
    }

    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn runs_on(&self) -> RunLocation {
        self.runs_on
    }

    /// Label within its library, `Component.handler`
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Unique label across libraries, `Library::Component.handler`. Profiles
    /// are keyed by it
    pub fn qualified_label(&self) -> &str {
        &self.qualified
    }

    pub fn identity(&self) -> StableId {
        self.identity
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn profile(&self) -> bool {
        self.profile
    }

    pub fn should_run_on(&self, location: RunLocation) -> bool {
        self.runs_on.intersects(location)
    }

    pub(crate) fn method(&self) -> usize {
        self.method
    }

    fn sort_key(&self) -> (&EventName, i32, Reverse<RunLocation>, StableId) {
        (&self.event, self.order, Reverse(self.runs_on), self.identity)
    }
}

/// What a component attaches to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentTarget {
    Session,
    Entity {
        kind: EntityKind,
        /// Accepted sub-kinds, empty accepts every sub-kind
        sub_kinds: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ComponentTags {
    pub(crate) group: GroupId,
    pub(crate) order: i32,
    pub(crate) runs_on: RunLocation,
}

struct DescriptorInner {
    name: String,
    library: Option<LibraryId>,
    identity: StableId,
    tags: ComponentTags,
    is_static: bool,
    target: ComponentTarget,
    handlers: Vec<EventHandlerDescriptor>,
    debug: bool,
    profile: bool,
    blueprint: Arc<dyn Blueprint>,
}

/// The immutable description of a component. Cheap to clone
#[derive(Clone)]
pub struct ComponentDescriptor {
    inner: Arc<DescriptorInner>,
}

impl ComponentDescriptor {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The library the component was registered by, `None` until it is
    /// added to a [crate::Registrar]
    pub fn library(&self) -> Option<LibraryId> {
        self.inner.library
    }

    /// `Library::Component` once registered, the bare name before
    pub fn qualified_name(&self) -> String {
        qualify(self.inner.library, &self.inner.name)
    }

    /// Hash of the qualified name, unique across libraries
    pub fn identity(&self) -> StableId {
        self.inner.identity
    }

    pub fn group(&self) -> GroupId {
        self.inner.tags.group
    }

    pub fn order(&self) -> i32 {
        self.inner.tags.order
    }

    pub fn runs_on(&self) -> RunLocation {
        self.inner.tags.runs_on
    }

    pub fn is_static(&self) -> bool {
        self.inner.is_static
    }

    pub fn target(&self) -> &ComponentTarget {
        &self.inner.target
    }

    pub fn entity_kind(&self) -> Option<EntityKind> {
        match &self.inner.target {
            ComponentTarget::Entity { kind, .. } => Some(*kind),
            ComponentTarget::Session => None,
        }
    }

    pub fn handlers(&self) -> &[EventHandlerDescriptor] {
        &self.inner.handlers
    }

    pub fn debug(&self) -> bool {
        self.inner.debug
    }

    pub fn profile(&self) -> bool {
        self.inner.profile
    }

    pub fn should_run_on(&self, location: RunLocation) -> bool {
        self.inner.tags.runs_on.intersects(location)
    }

    /// Fast pre-filter on kind and sub-kind, run before the activation
    /// condition
    pub fn accepts(&self, entity: &EntityInfo) -> bool {
        match &self.inner.target {
            ComponentTarget::Session => false,
            ComponentTarget::Entity { kind, sub_kinds } => {
                *kind == entity.kind()
                    && (sub_kinds.is_empty()
                        || entity
                            .sub_kind()
                            .map_or(false, |sub| sub_kinds.iter().any(|s| s == sub)))
            }
        }
    }

    pub(crate) fn blueprint(&self) -> &dyn Blueprint {
        self.inner.blueprint.as_ref()
    }

    pub(crate) fn sort_key(&self) -> (GroupId, i32, Reverse<RunLocation>, StableId) {
        (
            self.inner.tags.group,
            self.inner.tags.order,
            Reverse(self.inner.tags.runs_on),
            self.inner.identity,
        )
    }

    /// Returns a copy owned by `library` and tagged with its debug and
    /// profile flags
    pub(crate) fn for_library(&self, library: LibraryId, debug: bool, profile: bool) -> Self {
        let inner = &self.inner;
        let handlers = inner
            .handlers
            .iter()
            .cloned()
            .map(|mut handler| {
                handler.qualified = qualify(Some(library), &handler.label);
                handler.identity = StableId::of(&handler.qualified);
                handler.debug = debug;
                handler.profile = profile;
                handler
            })
            .sorted_by(|a, b| a.sort_key().cmp(&b.sort_key()))
            .collect();

        Self {
            inner: Arc::new(DescriptorInner {
                name: inner.name.clone(),
                library: Some(library),
                identity: StableId::of(&qualify(Some(library), &inner.name)),
                tags: inner.tags,
                is_static: inner.is_static,
                target: inner.target.clone(),
                handlers,
                debug,
                profile,
                blueprint: inner.blueprint.clone(),
            }),
        }
    }

    fn assemble(
        name: String,
        tags: ComponentTags,
        is_static: bool,
        target: ComponentTarget,
        handler_tags: Vec<HandlerTag>,
        blueprint: Arc<dyn Blueprint>,
    ) -> Result<Self, DiscoveryError> {
        if name.is_empty() {
            return Err(DiscoveryError::EmptyComponentName);
        }

        let mut handlers: Vec<EventHandlerDescriptor> = Vec::with_capacity(handler_tags.len());
        for (method, tag) in handler_tags.into_iter().enumerate() {
            let short = match tag.label {
                Some(label) if label.is_empty() => {
                    return Err(DiscoveryError::EmptyHandlerLabel { component: name })
                }
                Some(label) => label,
                None => tag.event.to_string(),
            };

            if tag.event == EventName::UPDATE && tag.frequency == 0 {
                return Err(DiscoveryError::ZeroFrequency { component: name, handler: short });
            }

            match &target {
                ComponentTarget::Session => {
                    if tag.event == EventName::STATIC_INIT && !is_static {
                        return Err(DiscoveryError::StaticInitOnInstanceComponent {
                            component: name,
                            handler: short,
                        });
                    }
                    if tag.event.is_entity_only() {
                        return Err(DiscoveryError::EntityEventOnSessionComponent {
                            component: name,
                            event: tag.event.to_string(),
                        });
                    }
                }
                ComponentTarget::Entity { .. } => {
                    if tag.event.is_session_only() {
                        return Err(DiscoveryError::SessionEventOnEntityComponent {
                            component: name,
                            event: tag.event.to_string(),
                        });
                    }
                }
            }

            let label = format!("{}.{}", name, short);
            if handlers.iter().any(|handler| handler.label == label) {
                return Err(DiscoveryError::DuplicateHandlerLabel { component: name, handler: short });
            }

            handlers.push(EventHandlerDescriptor {
                frequency: if tag.event == EventName::UPDATE { tag.frequency } else { 0 },
                event: tag.event,
                order: tag.order,
                runs_on: tag.runs_on,
                identity: StableId::of(&label),
                qualified: label.clone(),
                label,
                debug: false,
                profile: false,
                method,
            });
        }

        let handlers = handlers
            .into_iter()
            .sorted_by(|a, b| a.sort_key().cmp(&b.sort_key()))
            .collect();

        Ok(Self {
            inner: Arc::new(DescriptorInner {
                identity: StableId::of(&name),
                library: None,
                name,
                tags,
                is_static,
                target,
                handlers,
                debug: false,
                profile: false,
                blueprint,
            }),
        })
    }
}

impl Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let target = match &self.inner.target {
            ComponentTarget::Session => String::from("Session"),
            ComponentTarget::Entity { kind, sub_kinds } if sub_kinds.is_empty() => kind.to_string(),
            ComponentTarget::Entity { kind, sub_kinds } => {
                format!("{}[{}]", kind, sub_kinds.iter().join(", "))
            }
        };
        write!(
            f,
            "<ComponentDescriptor {} Target: {}, Group: {}, Order: {}, Static: {}, RunsOn: {}, Handlers: {}>",
            self.inner.name,
            target,
            self.inner.tags.group,
            self.inner.tags.order,
            self.inner.is_static,
            self.inner.tags.runs_on,
            self.inner.handlers.len()
        )
    }
}

/// Converts a component builder into a validated [ComponentDescriptor]
pub trait IntoDescriptor {
    fn into_descriptor(self) -> Result<ComponentDescriptor, DiscoveryError>;
}

impl IntoDescriptor for ComponentDescriptor {
    fn into_descriptor(self) -> Result<ComponentDescriptor, DiscoveryError> {
        Ok(self)
    }
}

impl IntoDescriptor for Result<ComponentDescriptor, DiscoveryError> {
    fn into_descriptor(self) -> Result<ComponentDescriptor, DiscoveryError> {
        self
    }
}

/// Declares a component instantiated once for the session
pub struct SessionComponent<C> {
    name: String,
    tags: ComponentTags,
    condition: Option<ConditionFn>,
    construct: ConstructorFn<C>,
    handlers: Vec<(HandlerTag, Method<C>)>,
}

impl<C: 'static> SessionComponent<C> {
    pub fn new<F>(name: impl Into<String>, construct: F) -> Self
    where
        F: Fn() -> Result<C, ComponentError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tags: ComponentTags::default(),
            condition: None,
            construct: Arc::new(move |_: Option<&EntityInfo>| construct()),
            handlers: Vec::new(),
        }
    }

    component_tag_setters!();

    /// Decides if the component should be created. Evaluated once, when its
    /// group is activated
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn() -> Result<bool, ComponentError> + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(move |_: Option<&EntityInfo>| condition()));
        self
    }

    pub fn handles<F>(mut self, tag: HandlerTag, handler: F) -> Self
    where
        F: Fn(&mut C) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.push((tag, Arc::new(handler)));
        self
    }

    pub fn build(self) -> Result<ComponentDescriptor, DiscoveryError> {
        let (tags, methods): (Vec<_>, Vec<_>) = self.handlers.into_iter().unzip();
        let blueprint = InstanceBlueprint {
            condition: self.condition.unwrap_or_else(always),
            construct: self.construct,
            methods,
        };
        ComponentDescriptor::assemble(
            self.name,
            self.tags,
            false,
            ComponentTarget::Session,
            tags,
            Arc::new(blueprint),
        )
    }
}

impl<C: Default + 'static> SessionComponent<C> {
    pub fn with_default(name: impl Into<String>) -> Self {
        Self::new(name, || Ok(C::default()))
    }
}

impl<C: 'static> IntoDescriptor for SessionComponent<C> {
    fn into_descriptor(self) -> Result<ComponentDescriptor, DiscoveryError> {
        self.build()
    }
}

/// Declares a session component without an instance
pub struct StaticComponent {
    name: String,
    tags: ComponentTags,
    condition: Option<ConditionFn>,
    handlers: Vec<(HandlerTag, StaticMethod)>,
}

impl StaticComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: ComponentTags::default(),
            condition: None,
            handlers: Vec::new(),
        }
    }

    component_tag_setters!();

    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn() -> Result<bool, ComponentError> + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(move |_: Option<&EntityInfo>| condition()));
        self
    }

    pub fn handles<F>(mut self, tag: HandlerTag, handler: F) -> Self
    where
        F: Fn() -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.push((tag, Arc::new(handler)));
        self
    }

    pub fn build(self) -> Result<ComponentDescriptor, DiscoveryError> {
        let (tags, methods): (Vec<_>, Vec<_>) = self.handlers.into_iter().unzip();
        let blueprint = StaticBlueprint {
            condition: self.condition.unwrap_or_else(always),
            methods,
        };
        ComponentDescriptor::assemble(
            self.name,
            self.tags,
            true,
            ComponentTarget::Session,
            tags,
            Arc::new(blueprint),
        )
    }
}

impl IntoDescriptor for StaticComponent {
    fn into_descriptor(self) -> Result<ComponentDescriptor, DiscoveryError> {
        self.build()
    }
}

/// Declares a component instantiated for every matching entity of a kind
pub struct EntityComponent<C> {
    name: String,
    tags: ComponentTags,
    kind: EntityKind,
    sub_kinds: Vec<String>,
    condition: Option<ConditionFn>,
    construct: ConstructorFn<C>,
    handlers: Vec<(HandlerTag, Method<C>)>,
}

impl<C: 'static> EntityComponent<C> {
    pub fn new<F>(name: impl Into<String>, kind: EntityKind, construct: F) -> Self
    where
        F: Fn(&EntityInfo) -> Result<C, ComponentError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            tags: ComponentTags::default(),
            kind,
            sub_kinds: Vec::new(),
            condition: None,
            construct: Arc::new(move |candidate: Option<&EntityInfo>| match candidate {
                Some(entity) => construct(entity),
                None => Err(ComponentError::msg("entity component constructed without an entity")),
            }),
            handlers: Vec::new(),
        }
    }

    component_tag_setters!();

    /// Restricts the component to entities of the given sub-kinds, e.g.
    /// block definition types
    pub fn sub_kinds<I, S>(mut self, sub_kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_kinds = sub_kinds.into_iter().map(Into::into).collect();
        self
    }

    /// Decides if an instance should be created for a candidate entity.
    /// Evaluated once per entity, never again
    pub fn condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&EntityInfo) -> Result<bool, ComponentError> + Send + Sync + 'static,
    {
        self.condition = Some(Arc::new(move |candidate: Option<&EntityInfo>| match candidate {
            Some(entity) => condition(entity),
            None => Ok(false),
        }));
        self
    }

    pub fn handles<F>(mut self, tag: HandlerTag, handler: F) -> Self
    where
        F: Fn(&mut C) -> HandlerResult + Send + Sync + 'static,
    {
        self.handlers.push((tag, Arc::new(handler)));
        self
    }

    pub fn build(self) -> Result<ComponentDescriptor, DiscoveryError> {
        let (tags, methods): (Vec<_>, Vec<_>) = self.handlers.into_iter().unzip();
        let blueprint = InstanceBlueprint {
            condition: self.condition.unwrap_or_else(always),
            construct: self.construct,
            methods,
        };
        let sub_kinds = self.sub_kinds.into_iter().sorted().dedup().collect();
        ComponentDescriptor::assemble(
            self.name,
            self.tags,
            false,
            ComponentTarget::Entity { kind: self.kind, sub_kinds },
            tags,
            Arc::new(blueprint),
        )
    }
}

impl<C: 'static> IntoDescriptor for EntityComponent<C> {
    fn into_descriptor(self) -> Result<ComponentDescriptor, DiscoveryError> {
        self.build()
    }
}

fn qualify(library: Option<LibraryId>, name: &str) -> String {
    match library {
        Some(library) => format!("{}::{}", library, name),
        None => name.to_owned(),
    }
}

fn always() -> ConditionFn {
    Arc::new(|_: Option<&EntityInfo>| Ok(true))
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Counter(u32);

    #[test]
    fn handlers_are_sorted() {
        let descriptor = SessionComponent::<Counter>::with_default("Counter")
            .handles(HandlerTag::event("X").order(2).named("late"), |_| Ok(()))
            .handles(HandlerTag::update(10).named("tick"), |_| Ok(()))
            .handles(
                HandlerTag::event("X").order(1).runs_on(RunLocation::CLIENT).named("client"),
                |_| Ok(()),
            )
            .handles(
                HandlerTag::event("X").order(1).runs_on(RunLocation::SERVER).named("server"),
                |_| Ok(()),
            )
            .build()
            .unwrap();

        let labels: Vec<&str> = descriptor.handlers().iter().map(|h| h.label()).collect();
        assert_eq!(
            labels,
            vec!["Counter.tick", "Counter.server", "Counter.client", "Counter.late"]
        );
    }

    #[test]
    fn unnamed_handlers_get_labels() {
        let descriptor = StaticComponent::new("Loader")
            .handles(HandlerTag::static_init(), || Ok(()))
            .handles(HandlerTag::session_save(), || Ok(()))
            .build()
            .unwrap();

        let labels: Vec<&str> = descriptor.handlers().iter().map(|h| h.label()).collect();
        assert_eq!(labels, vec!["Loader.SessionSave", "Loader.StaticInit"]);

        let twice = StaticComponent::new("Loader")
            .handles(HandlerTag::session_save(), || Ok(()))
            .handles(HandlerTag::session_save().order(1), || Ok(()))
            .build();
        assert_eq!(
            twice.err(),
            Some(DiscoveryError::DuplicateHandlerLabel {
                component: "Loader".into(),
                handler: "SessionSave".into()
            })
        );
    }

    #[test]
    fn declaration_order_does_not_change_identity() {
        let first = StaticComponent::new("Loader")
            .handles(HandlerTag::static_init(), || Ok(()))
            .handles(HandlerTag::event("Ping").named("ping"), || Ok(()))
            .build()
            .unwrap();
        let second = StaticComponent::new("Loader")
            .handles(HandlerTag::event("Ping").named("ping"), || Ok(()))
            .handles(HandlerTag::static_init(), || Ok(()))
            .build()
            .unwrap();

        let identities = |d: &ComponentDescriptor| d.handlers().iter().map(|h| h.identity()).collect::<Vec<_>>();
        assert_eq!(identities(&first), identities(&second));
    }

    #[test]
    fn library_qualifies_identity() {
        let settings = || {
            StaticComponent::new("Settings")
                .handles(HandlerTag::event("Ping").named("ping"), || Ok(()))
                .build()
                .unwrap()
        };
        let nav = settings().for_library(LibraryId("Nav"), false, false);
        let weapons = settings().for_library(LibraryId("Weapons"), false, false);

        assert_eq!(settings().library(), None);
        assert_eq!(nav.library(), Some(LibraryId("Nav")));
        assert_eq!(nav.qualified_name(), "Nav::Settings");
        assert_ne!(nav.identity(), weapons.identity());

        assert_eq!(nav.handlers()[0].label(), weapons.handlers()[0].label());
        assert_eq!(weapons.handlers()[0].qualified_label(), "Weapons::Settings.ping");
        assert_ne!(nav.handlers()[0].identity(), weapons.handlers()[0].identity());
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let result = SessionComponent::<Counter>::with_default("Counter")
            .handles(HandlerTag::update(0).named("never"), |_| Ok(()))
            .build();

        assert_eq!(
            result.err(),
            Some(DiscoveryError::ZeroFrequency {
                component: "Counter".into(),
                handler: "never".into()
            })
        );
    }

    #[test]
    fn misplaced_events_are_rejected() {
        let static_init = SessionComponent::<Counter>::with_default("Counter")
            .handles(HandlerTag::static_init(), |_| Ok(()))
            .build();
        assert!(matches!(
            static_init,
            Err(DiscoveryError::StaticInitOnInstanceComponent { .. })
        ));

        let entity_close = StaticComponent::new("Loader")
            .handles(HandlerTag::entity_close(), || Ok(()))
            .build();
        assert!(matches!(
            entity_close,
            Err(DiscoveryError::EntityEventOnSessionComponent { .. })
        ));

        let session_save = EntityComponent::new("Nav", EntityKind::Block, |_| Ok(Counter(0)))
            .handles(HandlerTag::session_save(), |_| Ok(()))
            .build();
        assert!(matches!(
            session_save,
            Err(DiscoveryError::SessionEventOnEntityComponent { .. })
        ));

        let unnamed = StaticComponent::new("").build();
        assert_eq!(unnamed.err(), Some(DiscoveryError::EmptyComponentName));
    }

    #[test]
    fn sub_kind_prefilter() {
        let descriptor = EntityComponent::new("Nav", EntityKind::Block, |_| Ok(Counter(0)))
            .sub_kinds(["RemoteControl", "Cockpit"])
            .build()
            .unwrap();

        assert!(descriptor.accepts(&EntityInfo::block(1u64, "Cockpit")));
        assert!(!descriptor.accepts(&EntityInfo::block(2u64, "Thruster")));
        assert!(!descriptor.accepts(&EntityInfo::new(3u64, EntityKind::Block)));
        assert!(!descriptor.accepts(&EntityInfo::grid(4u64)));

        let any_block = EntityComponent::new("Any", EntityKind::Block, |_| Ok(Counter(0)))
            .build()
            .unwrap();
        assert!(any_block.accepts(&EntityInfo::new(5u64, EntityKind::Block)));
    }

    #[test]
    fn bound_instances_share_state() {
        let descriptor = EntityComponent::new("Counter", EntityKind::Grid, |_| Ok(Counter(0)))
            .handles(HandlerTag::update(1).named("count"), |c: &mut Counter| {
                c.0 += 1;
                Ok(())
            })
            .build()
            .unwrap();

        let grid = EntityInfo::grid(7u64);
        assert_eq!(descriptor.blueprint().test(Some(&grid)), Ok(true));

        let created = descriptor.blueprint().create(Some(&grid)).unwrap();
        let mut action = created.bind(descriptor.handlers()[0].method()).unwrap();
        action().unwrap();
        action().unwrap();

        assert!(created.bind(42).is_none());

        let object = created.object.unwrap();
        let counter = object.downcast_ref::<RefCell<Counter>>().unwrap();
        assert_eq!(counter.borrow().0, 2);
    }
}

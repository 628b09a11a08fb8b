use std::{error::Error, fmt::Display};

use crate::{EntityId, GroupId, HandlerId, LibraryId};

/// Failure reported by a component's own code: a handler, an activation
/// condition or a constructor. Panics caught at the same boundary are
/// folded into [ComponentError::Panicked]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    Failed(String),
    Panicked(String),
}

impl ComponentError {
    pub fn msg(message: impl Display) -> Self {
        ComponentError::Failed(message.to_string())
    }
}

impl Error for ComponentError {}

impl Display for ComponentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentError::Failed(reason) => write!(f, "{}", reason),
            ComponentError::Panicked(reason) => write!(f, "panicked: {}", reason),
        }
    }
}

impl From<String> for ComponentError {
    fn from(value: String) -> Self {
        ComponentError::Failed(value)
    }
}

impl From<&str> for ComponentError {
    fn from(value: &str) -> Self {
        ComponentError::Failed(value.to_owned())
    }
}

/// Malformed component declarations, detected when a library is handed to
/// the [crate::Registrar]. Fatal for that library's registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    EmptyComponentName,
    EmptyHandlerLabel { component: String },
    DuplicateHandlerLabel { component: String, handler: String },
    ZeroFrequency { component: String, handler: String },
    StaticInitOnInstanceComponent { component: String, handler: String },
    SessionEventOnEntityComponent { component: String, event: String },
    EntityEventOnSessionComponent { component: String, event: String },
    DuplicateComponent { library: LibraryId, component: String },
    DuplicateLibrary(LibraryId),
}

impl Error for DiscoveryError {}

impl Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::EmptyComponentName => {
                write!(f, "component declared without a name")
            }
            DiscoveryError::EmptyHandlerLabel { component } => {
                write!(f, "{} declares a handler without a label", component)
            }
            DiscoveryError::DuplicateHandlerLabel { component, handler } => {
                write!(f, "{} declares more than one handler labelled {}", component, handler)
            }
            DiscoveryError::ZeroFrequency { component, handler } => {
                write!(f, "update handler {}.{} has a frequency of zero", component, handler)
            }
            DiscoveryError::StaticInitOnInstanceComponent { component, handler } => {
                write!(
                    f,
                    "{}.{} handles StaticInit but {} is not a static component",
                    component, handler, component
                )
            }
            DiscoveryError::SessionEventOnEntityComponent { component, event } => {
                write!(f, "entity component {} cannot handle session event {}", component, event)
            }
            DiscoveryError::EntityEventOnSessionComponent { component, event } => {
                write!(f, "session component {} cannot handle entity event {}", component, event)
            }
            DiscoveryError::DuplicateComponent { library, component } => {
                write!(f, "library {} declares {} more than once", library, component)
            }
            DiscoveryError::DuplicateLibrary(library) => {
                write!(f, "library {} was already added", library)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrarError {
    UnknownLibrary(LibraryId),
}

impl Error for RegistrarError {}

impl Display for RegistrarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistrarError::UnknownLibrary(library) => {
                write!(f, "no components registered for {}", library)
            }
        }
    }
}

/// Contract violations against the [crate::ComponentStore]. These are
/// reported to the caller and logged, never fatal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    EntityAlreadyTracked(EntityId),
    EntityNotTracked(EntityId),
    GroupAlreadyActive(LibraryId, GroupId),
    ZeroFrequency(HandlerId),
    Registrar(RegistrarError),
}

impl Error for StoreError {}

impl Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::EntityAlreadyTracked(entity) => {
                write!(f, "already added {}", entity)
            }
            StoreError::EntityNotTracked(entity) => {
                write!(f, "never received {}", entity)
            }
            StoreError::GroupAlreadyActive(library, group) => {
                write!(f, "group {} of {} is already active", group, library)
            }
            StoreError::ZeroFrequency(handler) => {
                write!(f, "update handler {} has a frequency of zero", handler)
            }
            StoreError::Registrar(err) => {
                write!(f, "registrar error: {}", err)
            }
        }
    }
}

impl From<RegistrarError> for StoreError {
    fn from(err: RegistrarError) -> Self {
        StoreError::Registrar(err)
    }
}

pub type HandlerResult = Result<(), ComponentError>;

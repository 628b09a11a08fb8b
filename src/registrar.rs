//! Registrar
//!
//! Libraries hand their component declarations to the [Registrar] once, at
//! startup. Afterwards the registrar is frozen behind an `Arc` and only
//! answers queries: which components make up a group, and which groups load
//! automatically when a session initializes

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::descriptor::{ComponentDescriptor, IntoDescriptor};
use crate::entity::EntityKind;
use crate::error::{DiscoveryError, RegistrarError};
use crate::id::{GroupId, LibraryId};

/// A library's component declarations, collected before they are handed to
/// the [Registrar]
pub struct Library {
    id: LibraryId,
    debug: bool,
    profile: bool,
    components: Vec<Result<ComponentDescriptor, DiscoveryError>>,
}

impl Library {
    pub fn new(id: LibraryId) -> Self {
        Self {
            id,
            debug: false,
            profile: false,
            components: Vec::new(),
        }
    }

    /// Report component failures of this library to the host
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Time every handler call of this library
    pub fn profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn component(mut self, component: impl IntoDescriptor) -> Self {
        self.components.push(component.into_descriptor());
        self
    }

    pub fn id(&self) -> LibraryId {
        self.id
    }
}

/// Every component of one group of one library, in activation order
#[derive(Debug, Clone)]
pub struct ComponentGroup {
    library: LibraryId,
    group: GroupId,
    components: Vec<ComponentDescriptor>,
}

impl ComponentGroup {
    pub fn library(&self) -> LibraryId {
        self.library
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn components(&self) -> &[ComponentDescriptor] {
        &self.components
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn session_components(&self) -> impl Iterator<Item = &ComponentDescriptor> {
        self.components.iter().filter(|c| c.entity_kind().is_none())
    }

    pub fn entity_components(&self, kind: EntityKind) -> impl Iterator<Item = &ComponentDescriptor> {
        self.components.iter().filter(move |c| c.entity_kind() == Some(kind))
    }
}

#[derive(Debug, Default)]
pub struct Registrar {
    libraries: BTreeMap<LibraryId, Vec<ComponentDescriptor>>,
    auto_load: Vec<(LibraryId, GroupId)>,
    debug_all: bool,
    profile_all: bool,
}

impl Registrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags every library added afterwards for debugging
    pub fn set_debug_all(&mut self, debug: bool) {
        self.debug_all = debug;
    }

    /// Flags every library added afterwards for profiling
    pub fn set_profile_all(&mut self, profile: bool) {
        self.profile_all = profile;
    }

    /// Validates and stores a library's components. On error nothing of the
    /// library is kept
    pub fn add_library(&mut self, library: Library) -> Result<(), DiscoveryError> {
        let Library {
            id,
            debug,
            profile,
            components,
        } = library;

        if self.libraries.contains_key(&id) {
            return Err(DiscoveryError::DuplicateLibrary(id));
        }

        let components = components.into_iter().collect::<Result<Vec<_>, _>>()?;
        if let Some(duplicate) = components.iter().map(|c| c.name()).duplicates().next() {
            return Err(DiscoveryError::DuplicateComponent {
                library: id,
                component: duplicate.to_owned(),
            });
        }

        let debug = debug || self.debug_all;
        let profile = profile || self.profile_all;
        let components: Vec<ComponentDescriptor> = components
            .iter()
            .map(|c| c.for_library(id, debug, profile))
            .sorted_by(|a, b| a.sort_key().cmp(&b.sort_key()))
            .collect();

        tracing::info!("Registered {} components from {}", components.len(), id);
        for component in &components {
            tracing::trace!("{:?}", component);
        }

        self.libraries.insert(id, components);
        Ok(())
    }

    /// Returns the components of `library` tagged with `group`, in order. An
    /// empty group is not an error
    pub fn select_group(&self, library: LibraryId, group: GroupId) -> Result<ComponentGroup, RegistrarError> {
        let components = self
            .libraries
            .get(&library)
            .ok_or(RegistrarError::UnknownLibrary(library))?;

        let components: Vec<ComponentDescriptor> = components
            .iter()
            .filter(|c| c.group() == group)
            .cloned()
            .collect();

        if components.is_empty() {
            tracing::warn!("No components found in {} for group {}", library, group);
        }

        Ok(ComponentGroup {
            library,
            group,
            components,
        })
    }

    /// Marks a group to be activated when a session initializes. Groups load
    /// in the order they were marked
    pub fn mark_auto_load(&mut self, library: LibraryId, group: GroupId) {
        if !self.auto_load.contains(&(library, group)) {
            self.auto_load.push((library, group));
        }
    }

    pub fn auto_load(&self) -> &[(LibraryId, GroupId)] {
        &self.auto_load
    }

    pub fn auto_load_groups(&self) -> Vec<Result<ComponentGroup, RegistrarError>> {
        self.auto_load
            .iter()
            .map(|(library, group)| self.select_group(*library, *group))
            .collect()
    }

    pub fn libraries(&self) -> impl Iterator<Item = LibraryId> + '_ {
        self.libraries.keys().copied()
    }

    pub fn components(&self, library: LibraryId) -> &[ComponentDescriptor] {
        self.libraries.get(&library).map(Vec::as_slice).unwrap_or_default()
    }
}

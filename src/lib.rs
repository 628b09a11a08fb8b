//!
//! Sepc discovers the components libraries declare, attaches them to the
//! session and to the entities of a running simulation, and dispatches
//! updates and events to them once per tick
//!

#[macro_use]
pub(crate) mod macros;
pub mod id;
pub mod error;
pub mod location;
pub mod event;
pub mod entity;
pub mod descriptor;
pub mod registrar;
pub mod config;
pub mod profile;
pub mod store;
pub mod session;

pub(crate) mod instance;
pub(crate) mod dispatch;

pub use id::EntityId;
pub use id::GroupId;
pub use id::HandlerId;
pub use id::LibraryId;
pub use location::RunLocation;
pub use event::EventName;
pub use entity::EntityInfo;
pub use entity::EntityKind;
pub use error::ComponentError;
pub use error::DiscoveryError;
pub use error::HandlerResult;
pub use error::RegistrarError;
pub use error::StoreError;
pub use descriptor::ComponentDescriptor;
pub use descriptor::EntityComponent;
pub use descriptor::HandlerTag;
pub use descriptor::SessionComponent;
pub use descriptor::StaticComponent;
pub use registrar::ComponentGroup;
pub use registrar::Library;
pub use registrar::Registrar;
pub use config::SessionConfig;
pub use profile::ProfileBlock;
pub use instance::ComponentInstance;
pub use instance::Notice;
pub use instance::NoticeLevel;
pub use store::ComponentStore;
pub use session::ComponentSession;
pub use session::Host;
pub use session::SessionHandle;
pub use session::SessionStatus;
pub use session::TickOutcome;

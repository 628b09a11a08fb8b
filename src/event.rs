//! Event names
//!
//! Component events are identified by plain strings, so any library can
//! introduce its own events alongside the reserved ones below

use std::borrow::Cow;
use std::fmt::{self, Display};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventName(Cow<'static, str>);

impl EventName {
    pub const UPDATE: EventName = EventName(Cow::Borrowed("Update"));
    pub const ENTITY_CLOSE: EventName = EventName(Cow::Borrowed("EntityClose"));
    pub const SESSION_CLOSE: EventName = EventName(Cow::Borrowed("SessionClose"));
    pub const SESSION_SAVE: EventName = EventName(Cow::Borrowed("SessionSave"));
    pub const STATIC_INIT: EventName = EventName(Cow::Borrowed("StaticInit"));
    pub const BLOCK_GRID_CHANGE: EventName = EventName(Cow::Borrowed("BlockGridChange"));

    pub const fn from_static(name: &'static str) -> Self {
        EventName(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Events that only make sense for session components
    pub fn is_session_only(&self) -> bool {
        *self == Self::SESSION_CLOSE || *self == Self::SESSION_SAVE || *self == Self::STATIC_INIT
    }

    /// Events that only make sense for entity components
    pub fn is_entity_only(&self) -> bool {
        *self == Self::ENTITY_CLOSE
    }
}

impl From<&'static str> for EventName {
    fn from(value: &'static str) -> Self {
        EventName(Cow::Borrowed(value))
    }
}

impl From<String> for EventName {
    fn from(value: String) -> Self {
        EventName(Cow::Owned(value))
    }
}

impl Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[test]
fn test_event_name_equality() {
    assert_eq!(EventName::from("Update"), EventName::UPDATE);
    assert_eq!(EventName::from(String::from("SessionSave")), EventName::SESSION_SAVE);
    assert!(EventName::STATIC_INIT.is_session_only());
    assert!(!EventName::from("Custom").is_session_only());
    assert!(EventName::ENTITY_CLOSE.is_entity_only());
}

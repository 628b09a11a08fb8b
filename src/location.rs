//! Run locations
//!
//! Where a component or handler is allowed to run: on a server, on a client,
//! or both. A single player session runs as both

use std::fmt::{self, Debug, Display};
use std::ops::{BitAnd, BitOr};

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunLocation(u8);

impl RunLocation {
    pub const NONE: RunLocation = RunLocation(0);
    pub const CLIENT: RunLocation = RunLocation(1);
    pub const SERVER: RunLocation = RunLocation(2);
    pub const BOTH: RunLocation = RunLocation(1 | 2);

    /// The location of a running process given its multiplayer role
    pub fn for_role(multiplayer: bool, is_server: bool) -> Self {
        match (multiplayer, is_server) {
            (false, _) => RunLocation::BOTH,
            (true, true) => RunLocation::SERVER,
            (true, false) => RunLocation::CLIENT,
        }
    }

    pub fn intersects(&self, other: RunLocation) -> bool {
        (self.0 & other.0) != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl Default for RunLocation {
    fn default() -> Self {
        RunLocation::BOTH
    }
}

impl BitAnd for RunLocation {
    type Output = RunLocation;

    fn bitand(self, rhs: Self) -> Self::Output {
        RunLocation(self.0 & rhs.0)
    }
}

impl BitOr for RunLocation {
    type Output = RunLocation;

    fn bitor(self, rhs: Self) -> Self::Output {
        RunLocation(self.0 | rhs.0)
    }
}

impl Display for RunLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.0 {
            0 => "None",
            1 => "Client",
            2 => "Server",
            _ => "Both",
        };
        write!(f, "{}", name)
    }
}

impl Debug for RunLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}

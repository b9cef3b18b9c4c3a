//! Role resolution
//!
//! Every (entity, participant) pair runs the same step function in one of
//! three roles. The role is derived once, at activation, from who owns the
//! entity's input and who holds authority over its outcome.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The role a participant plays for one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Owns the canonical outcome of the simulation
    Authority,
    /// Produces input, predicts locally, reconciles against the authority
    Input,
    /// Consumes and interpolates remote state only
    Observer,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Authority => write!(f, "authority"),
            Mode::Input => write!(f, "input"),
            Mode::Observer => write!(f, "observer"),
        }
    }
}

/// Which side of the session a participant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Participant {
    /// Dedicated server
    Server,
    /// Remote client
    Client,
    /// Server and client in one process
    Host,
}

impl Participant {
    /// Whether this participant acts as the session server
    pub fn is_server(&self) -> bool {
        matches!(self, Participant::Server | Participant::Host)
    }
}

/// Outcome of role resolution for one (entity, participant) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// The resolved role
    pub mode: Mode,
    /// Input is produced by this participant rather than received
    pub local_input: bool,
    /// Authority and owner share a process: nothing is transmitted
    pub co_located: bool,
    /// Received snapshots are forwarded to other participants
    pub relays: bool,
}

impl RoleAssignment {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            local_input: false,
            co_located: false,
            relays: false,
        }
    }

    /// Whether captured state or input leaves this participant
    pub fn transmits(&self) -> bool {
        !self.co_located
    }
}

/// Deterministic role table
///
/// | owner | server authority | participant | role                 |
/// |-------|------------------|-------------|----------------------|
/// | any   | yes              | server      | Authority            |
/// | yes   | yes              | client      | Input                |
/// | yes   | no               | client      | Authority            |
/// | any   | no               | server      | Observer (relay)     |
/// | no    | any              | client      | Observer             |
///
/// A host that owns the entity collapses to a co-located `Authority`.
pub struct ModeResolver;

impl ModeResolver {
    /// Resolve the role for one entity on one participant
    pub fn resolve(
        is_owning_producer: bool,
        server_authority: bool,
        participant: Participant,
    ) -> RoleAssignment {
        match participant {
            Participant::Server => {
                if server_authority {
                    RoleAssignment {
                        local_input: is_owning_producer,
                        ..RoleAssignment::new(Mode::Authority)
                    }
                } else {
                    RoleAssignment {
                        relays: true,
                        ..RoleAssignment::new(Mode::Observer)
                    }
                }
            }
            Participant::Client => match (is_owning_producer, server_authority) {
                (true, true) => RoleAssignment {
                    local_input: true,
                    ..RoleAssignment::new(Mode::Input)
                },
                (true, false) => RoleAssignment {
                    local_input: true,
                    ..RoleAssignment::new(Mode::Authority)
                },
                (false, _) => RoleAssignment::new(Mode::Observer),
            },
            Participant::Host => {
                if is_owning_producer {
                    RoleAssignment {
                        local_input: true,
                        co_located: true,
                        ..RoleAssignment::new(Mode::Authority)
                    }
                } else if server_authority {
                    RoleAssignment::new(Mode::Authority)
                } else {
                    RoleAssignment {
                        relays: true,
                        ..RoleAssignment::new(Mode::Observer)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table() {
        let r = ModeResolver::resolve(true, true, Participant::Server);
        assert_eq!(r.mode, Mode::Authority);
        assert!(r.local_input);

        let r = ModeResolver::resolve(true, true, Participant::Client);
        assert_eq!(r.mode, Mode::Input);

        let r = ModeResolver::resolve(true, false, Participant::Client);
        assert_eq!(r.mode, Mode::Authority);
        assert!(r.local_input);
        assert!(r.transmits());

        let r = ModeResolver::resolve(true, false, Participant::Server);
        assert_eq!(r.mode, Mode::Observer);
        assert!(r.relays);

        for server_authority in [true, false] {
            let r = ModeResolver::resolve(false, server_authority, Participant::Client);
            assert_eq!(r.mode, Mode::Observer);
            assert!(!r.relays);
        }
    }

    #[test]
    fn test_server_simulates_remote_owned_entities() {
        let r = ModeResolver::resolve(false, true, Participant::Server);
        assert_eq!(r.mode, Mode::Authority);
        assert!(!r.local_input);
    }

    #[test]
    fn test_host_owner_is_co_located() {
        for server_authority in [true, false] {
            let r = ModeResolver::resolve(true, server_authority, Participant::Host);
            assert_eq!(r.mode, Mode::Authority);
            assert!(r.co_located);
            assert!(!r.transmits());
        }

        let r = ModeResolver::resolve(false, true, Participant::Host);
        assert_eq!(r.mode, Mode::Authority);
        assert!(!r.co_located);
    }
}

//! The slot → registration table.

use padrelay_protocol::{MAX_PLAYERS, PlayerSlot, RegisterRequest, Registration};

/// Result of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The slot was free and now belongs to the caller.
    Accepted {
        slot: PlayerSlot,
        registration: Registration,
    },
    /// The slot already holds the caller's id. Nothing changed.
    AlreadyRegistered,
    /// Slot out of range, or taken by a different id.
    Rejected,
}

impl RegisterOutcome {
    /// What goes into the acknowledgement byte.
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::Rejected)
    }
}

#[derive(Debug, Default)]
pub struct RegistrationTable {
    slots: [Option<Registration>; MAX_PLAYERS],
}

impl RegistrationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// First registration for a slot wins; later ones must repeat its id.
    ///
    /// Plugin restrictions are applied on the way in, so a re-registration
    /// can never change what was stored.
    pub fn register(&mut self, request: &RegisterRequest) -> RegisterOutcome {
        let Some(slot) = PlayerSlot::new(request.player) else {
            return RegisterOutcome::Rejected;
        };
        match &self.slots[slot.index()] {
            Some(existing) if existing.reg_id == request.reg_id => {
                RegisterOutcome::AlreadyRegistered
            }
            Some(_) => RegisterOutcome::Rejected,
            None => {
                let registration = Registration {
                    reg_id: request.reg_id,
                    plugin: request.plugin.restricted_for(slot),
                    raw: request.raw,
                };
                self.slots[slot.index()] = Some(registration);
                RegisterOutcome::Accepted { slot, registration }
            }
        }
    }

    /// Frees `slot` if it is still held by `reg_id`.
    pub fn vacate(&mut self, slot: PlayerSlot, reg_id: u32) -> Option<Registration> {
        let entry = &mut self.slots[slot.index()];
        if entry.is_some_and(|r| r.reg_id == reg_id) {
            entry.take()
        } else {
            None
        }
    }

    pub fn get(&self, slot: PlayerSlot) -> Option<Registration> {
        self.slots[slot.index()]
    }

    pub fn count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// All four slots in order, `None` where vacant.
    pub fn snapshot(&self) -> [Option<Registration>; MAX_PLAYERS] {
        self.slots
    }
}

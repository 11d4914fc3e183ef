//! Change categories surfaced to the owning player's next poll
//!
//! Mutations that touch what a player sees in their status or location
//! panel return a `ChangeSet`. Applying it raises the player's dirty flags;
//! the poller takes them back down once the panel has been sent.

use crate::entity::combatant::Combatant;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ChangeSet {
    /// Health, max health or level changed
    pub status: bool,
    /// Location changed
    pub location: bool,
}

impl ChangeSet {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn status() -> Self {
        Self {
            status: true,
            location: false,
        }
    }

    pub fn location() -> Self {
        Self {
            status: false,
            location: true,
        }
    }

    pub fn union(self, other: ChangeSet) -> Self {
        Self {
            status: self.status || other.status,
            location: self.location || other.location,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.status && !self.location
    }

    /// Raise the matching dirty flags on a player; enemies have none
    pub fn apply(&self, combatant: &mut Combatant) {
        if let Some(p) = combatant.as_player_mut() {
            p.new_status |= self.status;
            p.new_location |= self.location;
        }
    }

    /// Lower and return the dirty flags a poll is about to deliver
    pub fn take(combatant: &mut Combatant) -> ChangeSet {
        match combatant.as_player_mut() {
            Some(p) => {
                let taken = ChangeSet {
                    status: p.new_status,
                    location: p.new_location,
                };
                p.new_status = false;
                p.new_location = false;
                taken
            }
            None => ChangeSet::none(),
        }
    }
}

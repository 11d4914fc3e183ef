//! Accounts and character control
//!
//! An account owns any number of characters and controls at most one of
//! them at a time. Each account carries the watermark of its last poll.

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Result};
use crate::core::types::{AccountId, EntityId, Timestamp};
use crate::engine::changeset::ChangeSet;
use crate::entity::combatant::Combatant;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    /// Time of the last successful poll
    pub last_refresh: Timestamp,
    pub active_character: Option<EntityId>,
    pub created_at: Timestamp,
}

impl Account {
    pub fn new(username: String, now: Timestamp) -> Self {
        Self {
            id: AccountId::new(),
            username,
            last_refresh: 0.0,
            active_character: None,
            created_at: now,
        }
    }
}

/// Register an account; usernames are unique
pub fn create_account(store: &Store, username: &str, now: Timestamp) -> Result<AccountId> {
    store.write(|t| {
        if t.account_by_username(username).is_some() {
            return Err(EngineError::InvalidTransition(format!(
                "username {username} is taken"
            )));
        }
        let account = Account::new(username.to_string(), now);
        let id = account.id;
        t.insert_account(account);
        Ok(id)
    })
}

/// Create a character at full health owned by `account`
pub fn create_character(
    store: &Store,
    account: AccountId,
    name: &str,
    max_health: i32,
    now: Timestamp,
) -> Result<EntityId> {
    store.write(|t| {
        t.account(account)?;
        let character = Combatant::player(name, max_health, account, now);
        let id = character.id;
        t.insert_combatant(character);
        tracing::info!(%account, %id, name, "character created");
        Ok(id)
    })
}

/// Put `character` under the account's control, releasing any previous one
pub fn select_character(store: &Store, account: AccountId, character: EntityId) -> Result<()> {
    store.write(|t| {
        let target = t.combatant(character)?;
        let owned = target.as_player().is_some_and(|p| p.owner == account);
        if !owned {
            return Err(EngineError::InvalidTransition(format!(
                "character {character} is not owned by {account}"
            )));
        }

        let previous = t.account(account)?.active_character;
        if let Some(previous) = previous.filter(|p| *p != character) {
            if let Some(p) = t.combatant_mut(previous)?.as_player_mut() {
                p.active = None;
            }
        }

        let player = t.combatant_mut(character)?;
        if let Some(p) = player.as_player_mut() {
            p.active = Some(account);
        }
        ChangeSet::status().union(ChangeSet::location()).apply(player);

        t.account_mut(account)?.active_character = Some(character);
        Ok(())
    })
}

/// The character an account is currently playing
pub fn active_character(store: &Store, account: AccountId) -> Result<Combatant> {
    store.read(|t| t.active_character(account).cloned())
}

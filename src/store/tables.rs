//! Row storage
//!
//! Plain keyed tables. Callers reach them through `Store::read` and
//! `Store::write`; a write closure checks every row it needs before it
//! mutates anything, so a failed lookup leaves the tables untouched.

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;

use crate::account::Account;
use crate::chat::RegionChatMessage;
use crate::core::error::{EngineError, Resource, Result};
use crate::core::types::{
    AccountId, EntityId, EventId, LocationId, RegionId, RowId, TemplateId, Timestamp, WorldId,
};
use crate::entity::combatant::Combatant;
use crate::entity::placement::assign_layout;
use crate::world::{EnemyTemplate, Event, EventLog, Location, PendingLog, Region, World};

#[derive(Debug, Default)]
pub struct Tables {
    worlds: AHashMap<WorldId, World>,
    world_names: AHashMap<String, WorldId>,
    regions: AHashMap<RegionId, Region>,
    locations: AHashMap<LocationId, Location>,
    templates: AHashMap<TemplateId, EnemyTemplate>,
    events: AHashMap<EventId, Event>,
    combatants: AHashMap<EntityId, Combatant>,
    accounts: AHashMap<AccountId, Account>,
    usernames: AHashMap<String, AccountId>,
    event_log: Vec<EventLog>,
    chat: Vec<RegionChatMessage>,
    next_row: RowId,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_row_id(&mut self) -> RowId {
        self.next_row += 1;
        self.next_row
    }

    // === WORLDS ===

    pub fn world(&self, id: WorldId) -> Result<&World> {
        self.worlds
            .get(&id)
            .ok_or_else(|| EngineError::NotFound(Resource::World(id.to_string())))
    }

    pub fn world_mut(&mut self, id: WorldId) -> Result<&mut World> {
        self.worlds
            .get_mut(&id)
            .ok_or_else(|| EngineError::NotFound(Resource::World(id.to_string())))
    }

    pub fn world_by_name(&self, name: &str) -> Option<&World> {
        self.world_names.get(name).and_then(|id| self.worlds.get(id))
    }

    pub fn insert_world(&mut self, world: World) {
        self.world_names.insert(world.name.clone(), world.id);
        self.worlds.insert(world.id, world);
    }

    // === REGIONS ===

    pub fn region(&self, id: RegionId) -> Result<&Region> {
        self.regions
            .get(&id)
            .ok_or(EngineError::NotFound(Resource::Region(id)))
    }

    pub fn regions_in(&self, world: WorldId) -> Vec<&Region> {
        let mut regions: Vec<&Region> = self.regions.values().filter(|r| r.world == world).collect();
        regions.sort_by_key(|r| (OrderedFloat(r.created_at), r.id));
        regions
    }

    pub fn insert_region(&mut self, region: Region) {
        self.regions.insert(region.id, region);
    }

    // === LOCATIONS ===

    pub fn location(&self, id: LocationId) -> Result<&Location> {
        self.locations
            .get(&id)
            .ok_or(EngineError::NotFound(Resource::Location(id)))
    }

    pub fn location_mut(&mut self, id: LocationId) -> Result<&mut Location> {
        self.locations
            .get_mut(&id)
            .ok_or(EngineError::NotFound(Resource::Location(id)))
    }

    /// Locations of a region, towns first then by name
    pub fn locations_in(&self, region: RegionId) -> Vec<&Location> {
        let mut locations: Vec<&Location> = self
            .locations
            .values()
            .filter(|l| l.region == region)
            .collect();
        locations.sort_by(|a, b| {
            b.is_town()
                .cmp(&a.is_town())
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        locations
    }

    pub fn insert_location(&mut self, location: Location) {
        self.locations.insert(location.id, location);
    }

    // === TEMPLATES ===

    pub fn templates_at(&self, location: LocationId) -> Vec<&EnemyTemplate> {
        let mut templates: Vec<&EnemyTemplate> = self
            .templates
            .values()
            .filter(|t| t.location == location)
            .collect();
        templates.sort_by_key(|t| (OrderedFloat(t.created_at), t.name.clone(), t.id));
        templates
    }

    pub fn insert_template(&mut self, template: EnemyTemplate) {
        self.templates.insert(template.id, template);
    }

    // === EVENTS ===

    pub fn event(&self, id: EventId) -> Result<&Event> {
        self.events
            .get(&id)
            .ok_or(EngineError::NotFound(Resource::Event(id)))
    }

    pub fn event_mut(&mut self, id: EventId) -> Result<&mut Event> {
        self.events
            .get_mut(&id)
            .ok_or(EngineError::NotFound(Resource::Event(id)))
    }

    pub fn insert_event(&mut self, event: Event) {
        self.events.insert(event.id, event);
    }

    /// Non-terminated events at a location in creation order
    pub fn open_events_at(&self, location: LocationId) -> Vec<&Event> {
        let mut events: Vec<&Event> = self
            .events
            .values()
            .filter(|e| e.location == location && !e.is_ended())
            .collect();
        events.sort_by_key(|e| (OrderedFloat(e.created_at), e.id));
        events
    }

    /// Every event ever created at a location, ended or not
    pub fn events_at(&self, location: LocationId) -> Vec<&Event> {
        let mut events: Vec<&Event> = self
            .events
            .values()
            .filter(|e| e.location == location)
            .collect();
        events.sort_by_key(|e| (OrderedFloat(e.created_at), e.id));
        events
    }

    // === COMBATANTS ===

    pub fn combatant(&self, id: EntityId) -> Result<&Combatant> {
        self.combatants
            .get(&id)
            .ok_or(EngineError::NotFound(Resource::Entity(id)))
    }

    pub fn combatant_mut(&mut self, id: EntityId) -> Result<&mut Combatant> {
        self.combatants
            .get_mut(&id)
            .ok_or(EngineError::NotFound(Resource::Entity(id)))
    }

    pub fn insert_combatant(&mut self, combatant: Combatant) {
        self.combatants.insert(combatant.id, combatant);
    }

    /// Replace stored combatants with updated copies (bulk update)
    pub fn update_combatants(&mut self, updated: impl IntoIterator<Item = Combatant>) {
        for combatant in updated {
            self.combatants.insert(combatant.id, combatant);
        }
    }

    /// Write back what combat changes on each row
    ///
    /// Ownership, attachment and dirty flags stay as stored, so edits made
    /// while the copies were out are kept.
    pub fn merge_combat_state(&mut self, played: impl IntoIterator<Item = Combatant>) {
        for combatant in played {
            if let Some(stored) = self.combatants.get_mut(&combatant.id) {
                stored.health = combatant.health;
                stored.dead = combatant.dead;
                stored.target = combatant.target;
                stored.position = combatant.position;
                stored.left = combatant.left;
                stored.top = combatant.top;
            }
        }
    }

    /// Recompute board coordinates for everyone attached to an event
    pub fn relayout(&mut self, event: EventId, size: i32) {
        let mut roster = self.roster(event);
        assign_layout(&mut roster, size);
        for placed in roster {
            if let Some(stored) = self.combatants.get_mut(&placed.id) {
                stored.left = placed.left;
                stored.top = placed.top;
            }
        }
    }

    /// Everyone attached to an event, highest initiative first
    pub fn roster(&self, event: EventId) -> Vec<Combatant> {
        let mut roster: Vec<Combatant> = self
            .combatants
            .values()
            .filter(|c| c.event() == Some(event))
            .cloned()
            .collect();
        roster.sort_by_key(|c| (Reverse(c.stats.initiative), OrderedFloat(c.created_at), c.id));
        roster
    }

    /// Controlled, living players attached to an event
    pub fn live_players(&self, event: EventId) -> usize {
        self.combatants
            .values()
            .filter(|c| {
                c.as_player()
                    .is_some_and(|p| p.event == Some(event) && p.active.is_some())
                    && !c.is_dead()
            })
            .count()
    }

    /// Controlled players standing at a location
    pub fn players_at(&self, location: LocationId) -> Vec<&Combatant> {
        let mut players: Vec<&Combatant> = self
            .combatants
            .values()
            .filter(|c| {
                c.as_player()
                    .is_some_and(|p| p.location == Some(location) && p.active.is_some())
            })
            .collect();
        players.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        players
    }

    // === ACCOUNTS ===

    pub fn account(&self, id: AccountId) -> Result<&Account> {
        self.accounts
            .get(&id)
            .ok_or(EngineError::NotFound(Resource::Account(id)))
    }

    pub fn account_mut(&mut self, id: AccountId) -> Result<&mut Account> {
        self.accounts
            .get_mut(&id)
            .ok_or(EngineError::NotFound(Resource::Account(id)))
    }

    pub fn account_by_username(&self, username: &str) -> Option<&Account> {
        self.usernames.get(username).and_then(|id| self.accounts.get(id))
    }

    pub fn insert_account(&mut self, account: Account) {
        self.usernames.insert(account.username.clone(), account.id);
        self.accounts.insert(account.id, account);
    }

    pub fn active_character(&self, account: AccountId) -> Result<&Combatant> {
        let id = self
            .account(account)?
            .active_character
            .ok_or(EngineError::NotFound(Resource::ActiveCharacter(account)))?;
        self.combatant(id)
    }

    // === LOGS ===

    /// Append log rows for an event, all stamped `now`
    pub fn append_logs(
        &mut self,
        event: EventId,
        pending: impl IntoIterator<Item = PendingLog>,
        now: Timestamp,
    ) -> Vec<EventLog> {
        let mut rows = Vec::new();
        for line in pending {
            let row = EventLog {
                id: self.next_row_id(),
                event,
                created_at: now,
                severity: line.severity,
                text: line.text,
            };
            self.event_log.push(row.clone());
            rows.push(row);
        }
        rows
    }

    /// All log rows of an event, oldest first
    pub fn logs_for(&self, event: EventId) -> Vec<EventLog> {
        self.event_log
            .iter()
            .filter(|row| row.event == event)
            .cloned()
            .collect()
    }

    /// Most recent log rows of an event, newest first
    pub fn recent_logs(&self, event: EventId, limit: usize) -> Vec<EventLog> {
        self.event_log
            .iter()
            .rev()
            .filter(|row| row.event == event)
            .take(limit)
            .cloned()
            .collect()
    }

    // === CHAT ===

    pub fn append_chat(
        &mut self,
        region: RegionId,
        author: AccountId,
        author_name: String,
        message: String,
        now: Timestamp,
    ) -> RegionChatMessage {
        let row = RegionChatMessage {
            id: self.next_row_id(),
            region,
            author,
            author_name,
            message,
            created_at: now,
        };
        self.chat.push(row.clone());
        row
    }

    /// Chat of a region, oldest first
    pub fn chat_in(&self, region: RegionId) -> Vec<RegionChatMessage> {
        self.chat
            .iter()
            .filter(|m| m.region == region)
            .cloned()
            .collect()
    }
}

//! Poll orchestrator
//!
//! `Engine` is the per-request entry point. A poll loads the caller's
//! character, admits it to an encounter if it has none, advances that
//! encounter, and packages whatever is new for this caller:
//!
//! ```text
//! poll -> revive? -> admit? -> advance -> chat/nearby -> panels -> stamp
//! ```
//!
//! Only one lease is held at a time: the location lease during admission,
//! then the event lease during ticking or travel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::account::{self as accounts, Account};
use crate::chat::{self, RegionChatMessage};
use crate::core::clock::Clock;
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Resource, Result};
use crate::core::types::{AccountId, EntityId, EventId, LocationId, Timestamp, WorldId};
use crate::engine::admission::{admit, detach_player};
use crate::engine::changeset::ChangeSet;
use crate::engine::sync::{LogLine, Watermark};
use crate::engine::tick::{advance, derive_seed, AdvanceOptions, EntitySnapshot};
use crate::entity::combatant::Combatant;
use crate::store::Store;
use crate::world::genesis::{self, Genesis};
use crate::world::{ContentGenerator, Location, LocationKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollMode {
    /// Only what changed since the caller's watermark
    #[default]
    Update,
    /// Everything, ignoring the watermark
    Full,
}

/// One client poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollRequest {
    pub mode: PollMode,
    /// Travel to this location before gathering the payload
    pub travel_to: Option<LocationId>,
}

impl PollRequest {
    pub fn update() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            mode: PollMode::Full,
            travel_to: None,
        }
    }

    pub fn travel(to: LocationId) -> Self {
        Self {
            mode: PollMode::Full,
            travel_to: Some(to),
        }
    }
}

/// Status panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerStatus {
    pub public_id: EntityId,
    pub name: String,
    pub level: u32,
    pub health: i32,
    pub max_health: i32,
    pub health_percent: u32,
    pub dead: bool,
}

impl From<&Combatant> for PlayerStatus {
    fn from(c: &Combatant) -> Self {
        Self {
            public_id: c.id,
            name: c.name.clone(),
            level: c.level,
            health: c.health,
            max_health: c.max_health,
            health_percent: c.health_percent(),
            dead: c.is_dead(),
        }
    }
}

/// A place the caller can travel to from here
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TravelOption {
    pub id: LocationId,
    pub name: String,
    pub kind: LocationKind,
    pub level: u32,
}

impl From<&Location> for TravelOption {
    fn from(l: &Location) -> Self {
        Self {
            id: l.id,
            name: l.name.clone(),
            kind: l.kind,
            level: l.level,
        }
    }
}

/// Location panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationPanel {
    pub id: LocationId,
    pub name: String,
    pub kind: LocationKind,
    pub level: u32,
    pub region: String,
    pub travel: Vec<TravelOption>,
}

/// Another player standing at the same location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearbyPlayer {
    pub public_id: EntityId,
    pub name: String,
    pub level: u32,
}

/// Payload of one poll; `None` fields are unchanged since the last poll
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollResponse {
    pub log: Vec<LogLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<EntitySnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_status: Option<PlayerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationPanel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearby_players: Option<Vec<NearbyPlayer>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<Vec<RegionChatMessage>>,
    /// Encounter the caller is in after this poll
    pub event: Option<EventId>,
    /// The caller's encounter ended during this poll
    pub ended: bool,
    /// No encounter could be joined yet (cooldown or capacity)
    pub waiting: bool,
}

/// Shared-world engine handle; cheap to clone across request tasks
#[derive(Clone)]
pub struct Engine {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    generator: Arc<dyn ContentGenerator>,
    seed: u64,
}

impl Engine {
    /// Build an engine, rejecting an inconsistent config up front
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        generator: Arc<dyn ContentGenerator>,
        seed: u64,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            clock,
            config,
            generator,
            seed,
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn get_or_create_world(&self, name: &str) -> Result<Genesis> {
        genesis::get_or_create_world(
            &self.store,
            self.generator.as_ref(),
            &self.config,
            name,
            self.now(),
        )
    }

    pub fn create_account(&self, username: &str) -> Result<AccountId> {
        accounts::create_account(&self.store, username, self.now())
    }

    /// New character at the configured starting health
    pub fn create_character(&self, account: AccountId, name: &str) -> Result<EntityId> {
        accounts::create_character(
            &self.store,
            account,
            name,
            self.config.new_character_health,
            self.now(),
        )
    }

    pub fn select_character(&self, account: AccountId, character: EntityId) -> Result<()> {
        accounts::select_character(&self.store, account, character)
    }

    pub fn post_chat(&self, account: AccountId, message: &str) -> Result<RegionChatMessage> {
        chat::post_chat(&self.store, account, message, self.now())
    }

    /// Place the account's active character at the world's start location
    pub async fn enter_world(&self, account: AccountId, world: WorldId) -> Result<LocationId> {
        let start = self.store.read(|t| {
            let world = t.world(world)?;
            world
                .start_location
                .ok_or_else(|| EngineError::NotFound(Resource::World(world.name.clone())))
        })?;
        let player = self.store.read(|t| Ok(t.active_character(account)?.id))?;
        self.relocate(player, start).await?;
        tracing::info!(%account, %player, location = %start, "entered world");
        Ok(start)
    }

    /// Other locations of the caller's current region
    pub fn travel_options(&self, account: AccountId) -> Result<Vec<TravelOption>> {
        self.store.read(|t| {
            let player = t.active_character(account)?;
            let here = placed_at(player, account)?;
            let region = t.location(here)?.region;
            Ok(t.locations_in(region)
                .into_iter()
                .filter(|l| l.id != here)
                .map(TravelOption::from)
                .collect())
        })
    }

    /// Handle one poll
    ///
    /// Missing rows degrade to an empty payload; the next poll retries.
    pub async fn poll(&self, account: AccountId, request: PollRequest) -> Result<PollResponse> {
        let result = match request.travel_to {
            Some(destination) => self.travel(account, destination).await,
            None => self.refresh(account, request.mode).await,
        };
        match result {
            Err(err) if err.is_recoverable() => {
                tracing::warn!(%account, error = %err, "poll degraded to empty payload");
                Ok(PollResponse::default())
            }
            other => other,
        }
    }

    /// Move to another location of the same region, then poll in full
    pub async fn travel(&self, account: AccountId, destination: LocationId) -> Result<PollResponse> {
        let player = self.store.read(|t| {
            let player = t.active_character(account)?;
            let here = placed_at(player, account)?;
            if here == destination {
                return Err(EngineError::InvalidTransition(format!(
                    "already at {destination}"
                )));
            }
            let from = t.location(here)?;
            let to = t.location(destination)?;
            if from.region != to.region {
                return Err(EngineError::InvalidTransition(format!(
                    "{} is not in the same region as {}",
                    to.name, from.name
                )));
            }
            Ok(player.id)
        })?;

        self.relocate(player, destination).await?;
        tracing::info!(%account, %player, to = %destination, "travelled");
        self.refresh(account, PollMode::Full).await
    }

    /// Detach from the current encounter and set a new location
    async fn relocate(&self, player: EntityId, destination: LocationId) -> Result<()> {
        loop {
            let attached = self.store.read(|t| Ok(t.combatant(player)?.event()))?;
            let _lease = match attached {
                Some(event) => Some(self.store.lock_event(event).await),
                None => None,
            };
            let now = self.clock.now();

            let moved = self.store.write(|t| {
                // Joined another encounter while we waited; lease that one instead
                if t.combatant(player)?.event() != attached {
                    return Ok(false);
                }
                t.location(destination)?;
                detach_player(t, player, now)?;
                let combatant = t.combatant_mut(player)?;
                if let Some(p) = combatant.as_player_mut() {
                    p.location = Some(destination);
                }
                ChangeSet::location().apply(combatant);
                Ok(true)
            })?;
            if moved {
                return Ok(());
            }
        }
    }

    /// Bring a fallen player back at full health in the world's start location
    async fn revive(&self, player: EntityId, account: AccountId) -> Result<LocationId> {
        let start = self.store.read(|t| {
            let here = placed_at(t.combatant(player)?, account)?;
            let region = t.region(t.location(here)?.region)?;
            let world = t.world(region.world)?;
            world
                .start_location
                .ok_or_else(|| EngineError::NotFound(Resource::World(world.name.clone())))
        })?;

        self.relocate(player, start).await?;
        self.store.write(|t| {
            let combatant = t.combatant_mut(player)?;
            combatant.revive();
            ChangeSet::status().apply(combatant);
            Ok(())
        })?;
        tracing::info!(%player, location = %start, "player revived");
        Ok(start)
    }

    async fn refresh(&self, account: AccountId, mode: PollMode) -> Result<PollResponse> {
        let started = self.clock.now();
        let full = mode == PollMode::Full;
        let last_refresh = self.store.read(|t| Ok(t.account(account)?.last_refresh))?;
        let player = self.store.read(|t| t.active_character(account).cloned())?;

        let Some(mut location) = player.as_player().and_then(|p| p.location) else {
            tracing::debug!(%account, "character has not entered a world");
            self.stamp(account, started)?;
            return Ok(PollResponse::default());
        };

        if player.is_dead() {
            location = self.revive(player.id, account).await?;
        }

        let mut response = PollResponse::default();
        let attached = self.store.read(|t| Ok(t.combatant(player.id)?.event()))?;
        let event = match attached {
            Some(event) => Some(event),
            None => {
                admit(&self.store, self.clock.as_ref(), &self.config, player.id, location)
                    .await?
                    .event()
            }
        };

        match event {
            Some(event) => {
                let opts = AdvanceOptions { full, force: false };
                let seed = derive_seed(self.seed, event, started);
                let outcome = advance(
                    &self.store,
                    self.clock.as_ref(),
                    &self.config,
                    seed,
                    player.id,
                    event,
                    opts,
                )
                .await?;
                response.log = outcome.log;
                response.entities = outcome.entities;
                response.ended = outcome.ended;
                // Victory or death may have detached the caller
                response.event = self.store.read(|t| Ok(t.combatant(player.id)?.event()))?;
            }
            None => response.waiting = true,
        }

        let region = self.store.read(|t| Ok(t.location(location)?.region))?;
        let watermark = if full {
            Watermark::Full
        } else {
            Watermark::since(last_refresh)
        };
        response.chat = chat::chat_delta(&self.store, region, watermark)?;
        response.nearby_players = Some(self.nearby(player.id, location, started)?);

        let changes = self
            .store
            .write(|t| Ok(ChangeSet::take(t.combatant_mut(player.id)?)))?;
        if full || changes.status {
            response.player_status = Some(self.store.read(|t| Ok(PlayerStatus::from(t.combatant(player.id)?)))?);
        }
        if full || changes.location {
            response.location = Some(self.location_panel(location)?);
        }

        self.stamp(account, started)?;
        tracing::debug!(
            %account,
            ?mode,
            lines = response.log.len(),
            waiting = response.waiting,
            "poll served"
        );
        Ok(response)
    }

    /// Players at `location` whose accounts polled within the liveness window
    fn nearby(&self, player: EntityId, location: LocationId, now: Timestamp) -> Result<Vec<NearbyPlayer>> {
        let cutoff = now - self.config.liveness_window_secs;
        self.store.read(|t| {
            Ok(t.players_at(location)
                .into_iter()
                .filter(|c| c.id != player)
                .filter(|c| {
                    c.as_player()
                        .and_then(|p| p.active)
                        .and_then(|a| t.account(a).ok())
                        .is_some_and(|a: &Account| a.last_refresh >= cutoff)
                })
                .map(|c| NearbyPlayer {
                    public_id: c.id,
                    name: c.name.clone(),
                    level: c.level,
                })
                .collect())
        })
    }

    fn location_panel(&self, location: LocationId) -> Result<LocationPanel> {
        self.store.read(|t| {
            let here = t.location(location)?;
            let region = t.region(here.region)?;
            let travel = t
                .locations_in(region.id)
                .into_iter()
                .filter(|l| l.id != location)
                .map(TravelOption::from)
                .collect();
            Ok(LocationPanel {
                id: here.id,
                name: here.name.clone(),
                kind: here.kind,
                level: here.level,
                region: region.name.clone(),
                travel,
            })
        })
    }

    fn stamp(&self, account: AccountId, at: Timestamp) -> Result<()> {
        self.store.write(|t| {
            t.account_mut(account)?.last_refresh = at;
            Ok(())
        })
    }
}

fn placed_at(player: &Combatant, account: AccountId) -> Result<LocationId> {
    player
        .as_player()
        .and_then(|p| p.location)
        .ok_or(EngineError::NotFound(Resource::ActiveCharacter(account)))
}

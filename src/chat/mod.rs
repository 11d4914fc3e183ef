//! Region chat
//!
//! Append-only chat lines scoped to a region. Delivery uses the same
//! watermark rule as the encounter log.

use serde::{Deserialize, Serialize};

use crate::core::error::{EngineError, Resource, Result};
use crate::core::types::{AccountId, RegionId, RowId, Timestamp};
use crate::engine::sync::{delta, Watermark};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionChatMessage {
    pub id: RowId,
    pub region: RegionId,
    pub author: AccountId,
    pub author_name: String,
    pub message: String,
    pub created_at: Timestamp,
}

/// Post a line to the region the account's active character stands in
pub fn post_chat(
    store: &Store,
    account: AccountId,
    message: &str,
    now: Timestamp,
) -> Result<RegionChatMessage> {
    let message = message.trim();
    if message.is_empty() {
        return Err(EngineError::InvalidTransition("empty chat message".into()));
    }

    store.write(|t| {
        let player = t.active_character(account)?;
        let location = player
            .as_player()
            .and_then(|p| p.location)
            .ok_or(EngineError::NotFound(Resource::ActiveCharacter(account)))?;
        let region = t.location(location)?.region;
        let author_name = player.name.clone();

        let row = t.append_chat(region, account, author_name, message.to_string(), now);
        tracing::debug!(%region, id = row.id, "chat posted");
        Ok(row)
    })
}

/// Chat lines in `region` that are new for the given watermark
pub fn chat_delta(
    store: &Store,
    region: RegionId,
    watermark: Watermark,
) -> Result<Option<Vec<RegionChatMessage>>> {
    store.read(|t| {
        let rows = t.chat_in(region);
        Ok(delta(rows, watermark, |m| m.created_at))
    })
}

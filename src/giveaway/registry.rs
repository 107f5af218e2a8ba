//! Giveaway registry
//!
//! In-memory authority over live giveaway state. The registry is the only
//! component that reads or writes the giveaway namespace of the durable
//! store; every mutation persists the full namespace before returning.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::Rng;
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::giveaway::{
    EntryResult, Giveaway, GiveawayError, GiveawayId, GiveawayResult,
};
use crate::store::{GuildMap, JsonStore};

/// Store namespace holding active giveaways
pub const GIVEAWAY_NAMESPACE: &str = "giveaways";

/// How long a concluded giveaway stays available for rerolls, matching the
/// backup rotation period.
pub const CONCLUDED_RETENTION_SECS: i64 = 1800;

/// A finalized record held back for rerolls until the retention window ends
struct ConcludedRecord {
    record: Giveaway,
    concluded_at: DateTime<Utc>,
}

/// Registry of giveaways across all guilds
pub struct GiveawayRegistry {
    active: DashMap<GiveawayId, Giveaway>,
    concluded: DashMap<GiveawayId, ConcludedRecord>,
    store: Arc<JsonStore>,
    /// Serializes snapshot-and-save so a later mutation can never be
    /// overwritten by an earlier in-flight write.
    persist_lock: Mutex<()>,
}

impl GiveawayRegistry {
    /// Create an empty registry over the given store.
    pub fn new(store: Arc<JsonStore>) -> Self {
        Self {
            active: DashMap::new(),
            concluded: DashMap::new(),
            store,
            persist_lock: Mutex::new(()),
        }
    }

    /// Rebuild the active set from the persisted namespace.
    pub async fn load(store: Arc<JsonStore>) -> Self {
        let document: GuildMap<Giveaway> = store.load(GIVEAWAY_NAMESPACE).await;
        let registry = Self::new(store);

        for (guild_key, records) in document {
            let Ok(guild_id) = guild_key.parse::<u64>() else {
                warn!(%guild_key, "skipping namespace subtree with non-numeric guild id");
                continue;
            };
            for record in records.into_values() {
                let id = GiveawayId::new(guild_id, record.channel_id, record.message_id);
                registry.active.insert(id, record);
            }
        }

        info!(count = registry.active.len(), "loaded giveaways from store");
        registry
    }

    /// Create a new giveaway with an empty entry list and persist it.
    ///
    /// # Errors
    /// `InvalidWinnerCount` when `winner_count < 1`, `DeadlineInPast` when
    /// the deadline is not in the future, or a store failure.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        guild_id: u64,
        channel_id: u64,
        message_id: u64,
        prize: &str,
        winner_count: u32,
        end_time: DateTime<Utc>,
        host: u64,
        now: DateTime<Utc>,
    ) -> GiveawayResult<Giveaway> {
        if winner_count < 1 {
            return Err(GiveawayError::InvalidWinnerCount(winner_count));
        }
        if end_time <= now {
            return Err(GiveawayError::DeadlineInPast);
        }

        let id = GiveawayId::new(guild_id, channel_id, message_id);
        let record = Giveaway::new(channel_id, message_id, prize, winner_count, end_time, host);
        self.active.insert(id, record.clone());
        self.persist().await?;

        info!(
            giveaway = %id,
            prize = %record.prize,
            winner_count,
            end_time = %end_time,
            "giveaway created"
        );
        Ok(record)
    }

    /// Register an entry for a participant.
    ///
    /// A giveaway whose deadline has already passed no longer accepts
    /// entries and reports `NotFound`, the same as one already swept away.
    ///
    /// # Errors
    /// Propagates store failures; the entry is only reported `Entered` once
    /// the write succeeded.
    pub async fn enter(
        &self,
        guild_id: u64,
        message_id: u64,
        participant: u64,
        now: DateTime<Utc>,
    ) -> GiveawayResult<EntryResult> {
        let Some(id) = self.find(guild_id, message_id) else {
            return Ok(EntryResult::NotFound);
        };

        let outcome = {
            let Some(mut record) = self.active.get_mut(&id) else {
                return Ok(EntryResult::NotFound);
            };
            if record.is_expired(now) {
                return Ok(EntryResult::NotFound);
            }
            if record.register_entry(participant) {
                EntryResult::Entered
            } else {
                EntryResult::AlreadyEntered
            }
        };

        if outcome == EntryResult::Entered {
            self.persist().await?;
        }
        Ok(outcome)
    }

    /// Resolve the full id of an active giveaway from its guild and message.
    pub fn find(&self, guild_id: u64, message_id: u64) -> Option<GiveawayId> {
        self.active
            .iter()
            .map(|entry| *entry.key())
            .find(|id| id.guild_id == guild_id && id.message_id == message_id)
    }

    /// Locate a giveaway by bare message id across all guilds, searching
    /// active records first and then retained concluded ones.
    pub fn find_by_message(&self, message_id: u64) -> Option<GiveawayId> {
        self.active
            .iter()
            .map(|entry| *entry.key())
            .find(|id| id.message_id == message_id)
            .or_else(|| {
                self.concluded
                    .iter()
                    .map(|entry| *entry.key())
                    .find(|id| id.message_id == message_id)
            })
    }

    /// Fetch a record clone from either the active or the concluded set.
    pub fn get(&self, id: &GiveawayId) -> Option<Giveaway> {
        self.active
            .get(id)
            .map(|entry| entry.value().clone())
            .or_else(|| self.concluded.get(id).map(|entry| entry.record.clone()))
    }

    /// Active giveaways whose deadline has elapsed, recomputed per call.
    pub fn list_expired(&self, now: DateTime<Utc>) -> Vec<(GiveawayId, Giveaway)> {
        self.active
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }

    /// Atomically remove a giveaway from the active set.
    ///
    /// The first caller receives the record and with it the right to
    /// announce; every later caller gets `None`. The record stays in the
    /// concluded set for rerolls until the retention window ends.
    ///
    /// # Errors
    /// Propagates store failures; the in-memory removal stands regardless.
    pub async fn conclude(
        &self,
        id: GiveawayId,
        now: DateTime<Utc>,
    ) -> GiveawayResult<Option<Giveaway>> {
        let Some((id, mut record)) = self.active.remove(&id) else {
            return Ok(None);
        };

        record.conclude();
        self.concluded.insert(
            id,
            ConcludedRecord {
                record: record.clone(),
                concluded_at: now,
            },
        );
        self.persist().await?;

        info!(giveaway = %id, prize = %record.prize, "giveaway concluded");
        Ok(Some(record))
    }

    /// Draw one winner uniformly from a giveaway's entries, active or
    /// recently concluded.
    ///
    /// # Errors
    /// `NotFound` when no record survives under the id, `NoEntries` when the
    /// entry list is empty.
    pub fn reroll<R: Rng + ?Sized>(&self, id: GiveawayId, rng: &mut R) -> GiveawayResult<u64> {
        let record = self
            .get(&id)
            .ok_or_else(|| GiveawayError::NotFound(id.to_string()))?;
        record
            .entries
            .choose(rng)
            .copied()
            .ok_or(GiveawayError::NoEntries)
    }

    /// Drop every record belonging to a guild the bot has left.
    ///
    /// # Errors
    /// Propagates store failures from the re-save.
    pub async fn purge_guild(&self, guild_id: u64) -> GiveawayResult<usize> {
        let before = self.active.len();
        self.active.retain(|id, _| id.guild_id != guild_id);
        let removed = before - self.active.len();
        self.concluded.retain(|id, _| id.guild_id != guild_id);

        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Drop concluded records older than the retention window. Returns the
    /// number pruned.
    pub fn prune_concluded(&self, now: DateTime<Utc>) -> usize {
        let retention = Duration::seconds(CONCLUDED_RETENTION_SECS);
        let before = self.concluded.len();
        self.concluded
            .retain(|_, held| now - held.concluded_at < retention);
        before - self.concluded.len()
    }

    /// Number of active giveaways across all guilds.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    async fn persist(&self) -> GiveawayResult<()> {
        let _guard = self.persist_lock.lock().await;

        let mut document: GuildMap<Giveaway> = GuildMap::new();
        for entry in self.active.iter() {
            document
                .entry(entry.key().guild_id.to_string())
                .or_default()
                .insert(entry.key().message_id.to_string(), entry.value().clone());
        }

        self.store.save(GIVEAWAY_NAMESPACE, &document).await?;
        Ok(())
    }
}

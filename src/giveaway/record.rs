//! Giveaway record and lifecycle
//!
//! A giveaway is keyed by the guild, channel, and originating message it was
//! posted under, and moves through exactly two states: Active until its
//! deadline is reconciled, then Concluded.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite identifier of a giveaway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GiveawayId {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

impl GiveawayId {
    #[must_use]
    pub fn new(guild_id: u64, channel_id: u64, message_id: u64) -> Self {
        Self {
            guild_id,
            channel_id,
            message_id,
        }
    }
}

impl fmt::Display for GiveawayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.guild_id, self.channel_id, self.message_id)
    }
}

/// Giveaway lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GiveawayStatus {
    /// Accepting entries until the deadline
    #[default]
    Active,
    /// Finalized; removed from the live registry
    Concluded,
}

/// Outcome of an entry attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryResult {
    /// The participant was added
    Entered,
    /// The participant was already present; nothing changed
    AlreadyEntered,
    /// No active giveaway under that id
    NotFound,
}

/// A time-boxed entry contest with a fixed prize and winner count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Giveaway {
    pub channel_id: u64,
    pub message_id: u64,
    pub prize: String,
    pub winner_count: u32,
    pub end_time: DateTime<Utc>,
    pub entries: Vec<u64>,
    pub host: u64,
    /// Lifecycle state; implied by which registry map holds the record, so
    /// it is never written to disk.
    #[serde(skip)]
    pub status: GiveawayStatus,
}

impl Giveaway {
    pub fn new(
        channel_id: u64,
        message_id: u64,
        prize: impl Into<String>,
        winner_count: u32,
        end_time: DateTime<Utc>,
        host: u64,
    ) -> Self {
        Self {
            channel_id,
            message_id,
            prize: prize.into(),
            winner_count,
            end_time,
            entries: Vec::new(),
            host,
            status: GiveawayStatus::Active,
        }
    }

    /// Check whether the deadline has elapsed
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }

    #[must_use]
    pub fn has_entered(&self, participant: u64) -> bool {
        self.entries.contains(&participant)
    }

    /// Append a participant, preserving insertion order. Returns false when
    /// the participant was already present.
    pub fn register_entry(&mut self, participant: u64) -> bool {
        if self.has_entered(participant) {
            return false;
        }
        self.entries.push(participant);
        true
    }

    /// Transition to Concluded.
    pub fn conclude(&mut self) {
        self.status = GiveawayStatus::Concluded;
    }
}

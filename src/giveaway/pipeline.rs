//! Completion pipeline
//!
//! Transitions an expired giveaway out of the active set, produces the
//! result announcement, and delivers it. Removal comes first: whichever
//! caller wins the atomic conclude gets to announce, and a vanished channel
//! can never leave a record behind to be re-swept forever.

use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{error, warn};

use crate::SWEEP_TARGET;
use crate::gateway::{ChatGateway, GatewayError};
use crate::giveaway::{Giveaway, GiveawayId, GiveawayRegistry, GiveawayResult, selection};

/// Result of a concluded giveaway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// Winners were drawn
    Winners {
        prize: String,
        winners: Vec<u64>,
        host: u64,
    },
    /// The entry window closed without a single entry
    NoEntries { prize: String },
}

impl Announcement {
    fn from_record<R: Rng + ?Sized>(record: &Giveaway, rng: &mut R) -> Self {
        if record.entries.is_empty() {
            return Self::NoEntries {
                prize: record.prize.clone(),
            };
        }
        let winners =
            selection::select_winners(rng, &record.entries, record.winner_count as usize);
        Self::Winners {
            prize: record.prize.clone(),
            winners,
            host: record.host,
        }
    }

    /// Message posted to the giveaway channel.
    #[must_use]
    pub fn content(&self) -> String {
        match self {
            Self::Winners { prize, winners, .. } => {
                let mentions: Vec<String> =
                    winners.iter().map(|id| format!("<@{id}>")).collect();
                format!(
                    "Congratulations to the winners: {}! You have won **{prize}**!",
                    mentions.join(", ")
                )
            }
            Self::NoEntries { prize } => {
                format!("The giveaway for **{prize}** has ended with no entries.")
            }
        }
    }

    /// Replacement text for the original giveaway post.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Winners { prize, .. } => format!("The giveaway for **{prize}** has ended."),
            Self::NoEntries { prize } => {
                format!("The giveaway for **{prize}** has ended with no entries.")
            }
        }
    }

    /// Winner ids carried by the announcement, empty for no-entry endings.
    #[must_use]
    pub fn winners(&self) -> &[u64] {
        match self {
            Self::Winners { winners, .. } => winners,
            Self::NoEntries { .. } => &[],
        }
    }
}

/// Conclude a giveaway and deliver its announcement.
///
/// Returns `Ok(None)` when another path already concluded the id; only the
/// caller that wins the removal announces. Delivery failures against a
/// deleted channel or revoked permission are logged and non-fatal.
///
/// # Errors
/// Propagates persistence failures from the conclude step.
pub async fn complete<R: Rng + ?Sized>(
    gateway: &dyn ChatGateway,
    registry: &GiveawayRegistry,
    rng: &mut R,
    id: GiveawayId,
    now: DateTime<Utc>,
) -> GiveawayResult<Option<Announcement>> {
    let Some(record) = registry.conclude(id, now).await? else {
        return Ok(None);
    };

    let announcement = Announcement::from_record(&record, rng);
    deliver(gateway, &record, &announcement).await;
    Ok(Some(announcement))
}

async fn deliver(gateway: &dyn ChatGateway, record: &Giveaway, announcement: &Announcement) {
    if let Err(err) = gateway
        .edit_message(record.channel_id, record.message_id, &announcement.summary())
        .await
    {
        log_delivery_failure("edit giveaway post", record, &err);
    }

    if let Err(err) = gateway
        .send_message(record.channel_id, &announcement.content())
        .await
    {
        log_delivery_failure("send announcement", record, &err);
    }
}

fn log_delivery_failure(action: &str, record: &Giveaway, err: &GatewayError) {
    match err {
        GatewayError::NotFound | GatewayError::Forbidden => warn!(
            target: SWEEP_TARGET,
            channel_id = record.channel_id,
            message_id = record.message_id,
            error = %err,
            "could not {action}, giveaway concluded anyway"
        ),
        GatewayError::Api(_) => error!(
            target: SWEEP_TARGET,
            channel_id = record.channel_id,
            message_id = record.message_id,
            error = %err,
            "could not {action}"
        ),
    }
}

//! Chat platform gateway
//!
//! The narrow set of platform capabilities the core consumes: announcement
//! delivery, ban enumeration and reversal, and a wall clock. Everything is
//! behind traits so the reconciliation and completion paths can be exercised
//! without a live Discord connection.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::all::{ChannelId, GuildId, MessageId, UserId};
use serenity::builder::EditMessage;
use serenity::http::{Http, HttpError};
use thiserror::Error;

/// Failures surfaced by the platform
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The channel, message, or user no longer exists
    #[error("target not found")]
    NotFound,

    /// The bot lacks permission for the operation
    #[error("missing permissions")]
    Forbidden,

    /// Any other platform failure
    #[error("platform error: {0}")]
    Api(#[source] Box<serenity::Error>),
}

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Abstract chat-platform capabilities consumed by the core
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Deliver a message to a channel.
    async fn send_message(&self, channel_id: u64, content: &str) -> GatewayResult<()>;

    /// Replace the content of an existing message.
    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        content: &str,
    ) -> GatewayResult<()>;

    /// Active bans in a guild as (user id, stored reason) pairs.
    async fn list_bans(&self, guild_id: u64) -> GatewayResult<Vec<(u64, Option<String>)>>;

    /// Reverse a ban.
    async fn unban(&self, guild_id: u64, user_id: u64, reason: &str) -> GatewayResult<()>;

    /// Guilds the bot currently belongs to.
    async fn guild_ids(&self) -> GatewayResult<Vec<u64>>;
}

/// UTC wall-clock source, injectable for testing
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Gateway backed by the serenity HTTP client
pub struct SerenityGateway {
    http: Arc<Http>,
}

impl SerenityGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

fn map_api_error(err: serenity::Error) -> GatewayError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(ref response)) = err {
        match response.status_code.as_u16() {
            404 => return GatewayError::NotFound,
            403 => return GatewayError::Forbidden,
            _ => {}
        }
    }
    GatewayError::Api(Box::new(err))
}

#[async_trait]
impl ChatGateway for SerenityGateway {
    async fn send_message(&self, channel_id: u64, content: &str) -> GatewayResult<()> {
        ChannelId::new(channel_id)
            .say(&self.http, content)
            .await
            .map(drop)
            .map_err(map_api_error)
    }

    async fn edit_message(
        &self,
        channel_id: u64,
        message_id: u64,
        content: &str,
    ) -> GatewayResult<()> {
        ChannelId::new(channel_id)
            .edit_message(
                &self.http,
                MessageId::new(message_id),
                EditMessage::new().content(content),
            )
            .await
            .map(drop)
            .map_err(map_api_error)
    }

    async fn list_bans(&self, guild_id: u64) -> GatewayResult<Vec<(u64, Option<String>)>> {
        let bans = GuildId::new(guild_id)
            .bans(&self.http, None, None)
            .await
            .map_err(map_api_error)?;

        Ok(bans
            .into_iter()
            .map(|ban| (ban.user.id.get(), ban.reason))
            .collect())
    }

    async fn unban(&self, guild_id: u64, user_id: u64, reason: &str) -> GatewayResult<()> {
        self.http
            .remove_ban(GuildId::new(guild_id), UserId::new(user_id), Some(reason))
            .await
            .map_err(map_api_error)
    }

    async fn guild_ids(&self) -> GatewayResult<Vec<u64>> {
        let guilds = self
            .http
            .get_guilds(None, None)
            .await
            .map_err(map_api_error)?;

        Ok(guilds.into_iter().map(|info| info.id.get()).collect())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_reports_preset_instant() {
        use chrono::TimeZone;

        let instant = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let clock = test_support::FixedClock(instant);
        assert_eq!(clock.now(), instant);
        assert_eq!(clock.now(), instant);
    }

    #[test]
    fn stepping_clock_advances_each_read() {
        use chrono::TimeZone;

        let base = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let clock = test_support::SteppingClock::new(base, chrono::Duration::seconds(5));
        assert_eq!(clock.now(), base);
        assert_eq!(clock.now(), base + chrono::Duration::seconds(5));
        assert_eq!(clock.now(), base + chrono::Duration::seconds(10));
    }
}

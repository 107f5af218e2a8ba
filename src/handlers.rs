use poise::serenity_prelude::{
    self as serenity, Context, EventHandler, Guild, GuildId, Ready, UnavailableGuild,
};
use tracing::{error, info, warn};

use crate::{Data, EVENT_TARGET};

pub struct Handler;

#[serenity::async_trait]
impl EventHandler for Handler {
    /// Called when the bot is ready, but the cache may not be fully populated yet.
    async fn ready(&self, ctx: Context, ready: Ready) {
        let user_name = ready.user.name.clone();
        let shard_id = ctx.shard_id;
        info!(target: EVENT_TARGET, "Connected as {user_name}, shard {shard_id}");
    }

    /// Called when the cache is fully populated.
    async fn cache_ready(&self, ctx: Context, guilds: Vec<GuildId>) {
        let guild_count_cache = ctx.cache.guild_count();
        let guild_count = guilds.len();
        if guild_count != guild_count_cache {
            warn!(
                target: EVENT_TARGET,
                "Cache guild count mismatch: {guild_count_cache} (cache) vs {guild_count} (actual)"
            );
        }
        info!(target: EVENT_TARGET, "Cache ready! The bot is in {guild_count} guild(s)");
    }

    /// Called when the bot leaves a guild or the guild is deleted. The
    /// guild's subtree of durable state goes with it.
    async fn guild_delete(&self, ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // An unavailable guild is a platform outage, not a removal.
        if incomplete.unavailable {
            return;
        }

        let data = { ctx.data.read().await.get::<Data>().cloned() };
        let Some(data) = data else {
            warn!(target: EVENT_TARGET, "guild_delete received before bot data was registered");
            return;
        };

        let guild_id = incomplete.id.get();
        match data.registry.purge_guild(guild_id).await {
            Ok(removed) if removed > 0 => {
                info!(
                    target: EVENT_TARGET,
                    guild_id,
                    removed,
                    "left guild, purged its giveaway records"
                );
            }
            Ok(_) => {}
            Err(err) => {
                error!(
                    target: EVENT_TARGET,
                    guild_id,
                    error = %err,
                    "failed to purge records for removed guild"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_implements_event_handler() {
        // This test verifies at compile time that Handler implements EventHandler
        fn assert_impl<T: EventHandler>() {}
        assert_impl::<Handler>();
    }
}

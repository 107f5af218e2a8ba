//! Command layer
//!
//! Thin poise front end over the registry and completion pipeline. Commands
//! validate input, post or look up the platform message involved, and
//! delegate every decision to the core.

use poise::command;
use poise::serenity_prelude as serenity;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::duration::parse_duration;
use crate::gateway::SerenityGateway;
use crate::giveaway::{EntryResult, GiveawayError, pipeline};
use crate::sweeper::tempban;
use crate::{Context, Error};

/// Start a new giveaway in the current channel
#[command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn giveaway(
    ctx: Context<'_>,
    #[description = "Duration (e.g. 1h, 2d, 1d 5h 30m)"] duration: String,
    #[description = "Number of winners"] winner_count: u32,
    #[description = "The prize"] prize: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let Some(window) = parse_duration(&duration) else {
        ctx.say("Invalid duration format. Use `1d 5h 30m`, `2h`, etc.")
            .await?;
        return Ok(());
    };
    if winner_count < 1 {
        ctx.say("Winner count must be at least 1.").await?;
        return Ok(());
    }

    let data = ctx.data();
    let now = data.clock.now();
    let end_time = now + window;

    let post = format!(
        "Giveaway: **{prize}**\nWinners: {winner_count}\nEnds: <t:{}:R>\nHosted by: <@{}>\nEnter with `/giveaway_enter`.",
        end_time.timestamp(),
        ctx.author().id.get()
    );
    let message = ctx.channel_id().say(ctx.http(), post).await?;

    data.registry
        .create(
            guild_id.get(),
            ctx.channel_id().get(),
            message.id.get(),
            &prize,
            winner_count,
            end_time,
            ctx.author().id.get(),
            now,
        )
        .await?;

    ctx.say(format!(
        "Giveaway started for **{prize}** (message id {}).",
        message.id.get()
    ))
    .await?;
    Ok(())
}

/// Enter the giveaway behind a message id
#[command(slash_command, guild_only)]
pub async fn giveaway_enter(
    ctx: Context<'_>,
    #[description = "The giveaway message id"] message_id: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let Ok(message_id) = message_id.parse::<u64>() else {
        ctx.say("That does not look like a message id.").await?;
        return Ok(());
    };

    let data = ctx.data();
    let outcome = data
        .registry
        .enter(
            guild_id.get(),
            message_id,
            ctx.author().id.get(),
            data.clock.now(),
        )
        .await?;

    let reply = match outcome {
        EntryResult::Entered => "You have entered the giveaway.",
        EntryResult::AlreadyEntered => "You have already entered this giveaway.",
        EntryResult::NotFound => "This giveaway is no longer active.",
    };
    ctx.say(reply).await?;
    Ok(())
}

/// End a giveaway early and draw its winners now
#[command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn giveaway_end(
    ctx: Context<'_>,
    #[description = "The giveaway message id"] message_id: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let Ok(message_id) = message_id.parse::<u64>() else {
        ctx.say("That does not look like a message id.").await?;
        return Ok(());
    };

    let data = ctx.data();
    let Some(id) = data.registry.find(guild_id.get(), message_id) else {
        ctx.say("Giveaway not found or has already ended.").await?;
        return Ok(());
    };

    let gateway = SerenityGateway::new(ctx.serenity_context().http.clone());
    let mut rng = StdRng::from_os_rng();
    let outcome = pipeline::complete(&gateway, &data.registry, &mut rng, id, data.clock.now())
        .await?;

    match outcome {
        Some(_) => ctx.say("Giveaway has been ended.").await?,
        None => ctx.say("Giveaway not found or has already ended.").await?,
    };
    Ok(())
}

/// Draw a replacement winner for a past giveaway
#[command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn giveaway_reroll(
    ctx: Context<'_>,
    #[description = "The past giveaway message id"] message_id: String,
) -> Result<(), Error> {
    let Ok(message_id) = message_id.parse::<u64>() else {
        ctx.say("That does not look like a message id.").await?;
        return Ok(());
    };

    let data = ctx.data();
    let Some(id) = data.registry.find_by_message(message_id) else {
        ctx.say("Giveaway not found.").await?;
        return Ok(());
    };

    let mut rng = StdRng::from_os_rng();
    match data.registry.reroll(id, &mut rng) {
        Ok(winner) => {
            let prize = data
                .registry
                .get(&id)
                .map(|record| record.prize)
                .unwrap_or_default();
            ctx.say(format!(
                "A new winner has been selected for **{prize}**: <@{winner}>!"
            ))
            .await?;
        }
        Err(GiveawayError::NoEntries) => {
            ctx.say("No entries found for this giveaway.").await?;
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

/// Temporarily ban a user; the sweep lifts the ban once it expires
#[command(slash_command, guild_only, required_permissions = "BAN_MEMBERS")]
pub async fn tempban(
    ctx: Context<'_>,
    #[description = "The user to ban"] user: serenity::User,
    #[description = "Duration (e.g. 10m, 2h, 7d)"] duration: String,
    #[description = "Reason for the ban"] reason: String,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let Some(window) = parse_duration(&duration) else {
        ctx.say("Invalid duration format. Use `10m`, `2h`, `7d`, etc.")
            .await?;
        return Ok(());
    };

    let data = ctx.data();
    let expires_at = data.clock.now() + window;
    let notice = tempban::format_tempban_notice(expires_at, &reason, &ctx.author().name);

    guild_id
        .ban_with_reason(ctx.http(), user.id, 0, &notice)
        .await?;

    ctx.say(format!(
        "<@{}> has been temporarily banned until <t:{}:F>.",
        user.id.get(),
        expires_at.timestamp()
    ))
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // The command layer carries no logic of its own; these tests pin the
    // definitions the framework registers.
    #[test]
    fn test_command_definitions() {
        let cmd = giveaway();
        assert_eq!(cmd.name, "giveaway");
        assert!(cmd.guild_only);

        let cmd = giveaway_enter();
        assert_eq!(cmd.name, "giveaway_enter");
        assert!(cmd.guild_only);

        let cmd = giveaway_end();
        assert_eq!(cmd.name, "giveaway_end");
        assert!(cmd.guild_only);

        let cmd = giveaway_reroll();
        assert_eq!(cmd.name, "giveaway_reroll");

        let cmd = tempban();
        assert_eq!(cmd.name, "tempban");
        assert!(cmd.guild_only);
    }

    #[test]
    fn test_commands_convert_to_slash_commands() {
        for cmd in [
            giveaway(),
            giveaway_enter(),
            giveaway_end(),
            giveaway_reroll(),
            tempban(),
        ] {
            assert!(cmd.create_as_slash_command().is_some(), "{}", cmd.name);
        }
    }
}

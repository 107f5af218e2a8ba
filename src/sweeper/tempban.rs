//! Tempban reconciliation
//!
//! The platform's ban API has no expiry field, so a temporary ban smuggles
//! its deadline inside the ban reason. The grammar is
//! `Tempban until: <RFC3339> | Reason: <text> | Moderator: <name>`; any
//! reason that does not match is a permanent ban and is left alone.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::SWEEP_TARGET;
use crate::gateway::{ChatGateway, GatewayResult};

const TEMPBAN_PREFIX: &str = "Tempban until: ";
const REASON_SEPARATOR: &str = " | Reason: ";
const MODERATOR_SEPARATOR: &str = " | Moderator: ";

/// Audit-log reason attached to the automatic unban
pub const EXPIRED_UNBAN_REASON: &str = "Tempban expired";

/// Expiry and context recovered from a tempban reason string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempbanNotice {
    pub expires_at: DateTime<Utc>,
    pub reason: String,
    pub moderator: String,
}

impl TempbanNotice {
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Encode a tempban into the reason string stored with the platform ban.
#[must_use]
pub fn format_tempban_notice(
    expires_at: DateTime<Utc>,
    reason: &str,
    moderator: &str,
) -> String {
    format!(
        "{TEMPBAN_PREFIX}{}{REASON_SEPARATOR}{reason}{MODERATOR_SEPARATOR}{moderator}",
        expires_at.to_rfc3339()
    )
}

/// Parse a ban reason back into a tempban notice. Returns `None` for any
/// reason outside the grammar; that ban is simply not temporary.
#[must_use]
pub fn parse_tempban_notice(reason: &str) -> Option<TempbanNotice> {
    let rest = reason.strip_prefix(TEMPBAN_PREFIX)?;
    let (timestamp, rest) = rest.split_once(REASON_SEPARATOR)?;

    let expires_at = DateTime::parse_from_rfc3339(timestamp.trim())
        .ok()?
        .with_timezone(&Utc);

    let (ban_reason, moderator) = match rest.split_once(MODERATOR_SEPARATOR) {
        Some((ban_reason, moderator)) => (ban_reason, moderator),
        None => (rest, ""),
    };

    Some(TempbanNotice {
        expires_at,
        reason: ban_reason.to_string(),
        moderator: moderator.to_string(),
    })
}

/// Sweep one guild's bans, reversing every tempban whose expiry has passed.
///
/// Individual unban failures are logged and do not stop the rest of the
/// guild's bans from being processed.
///
/// # Errors
/// Returns the gateway error when the ban list itself cannot be fetched.
pub async fn sweep_guild(
    gateway: &dyn ChatGateway,
    guild_id: u64,
    now: DateTime<Utc>,
) -> GatewayResult<()> {
    let bans = gateway.list_bans(guild_id).await?;

    for (user_id, reason) in bans {
        let Some(notice) = reason.as_deref().and_then(parse_tempban_notice) else {
            continue;
        };
        if !notice.is_expired(now) {
            continue;
        }

        match gateway.unban(guild_id, user_id, EXPIRED_UNBAN_REASON).await {
            Ok(()) => info!(
                target: SWEEP_TARGET,
                guild_id,
                user_id,
                expired_at = %notice.expires_at,
                "tempban expired, user unbanned"
            ),
            Err(err) => warn!(
                target: SWEEP_TARGET,
                guild_id,
                user_id,
                error = %err,
                "failed to unban expired tempban"
            ),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{GatewayError, MockChatGateway};
    use chrono::TimeZone;
    use mockall::predicate::eq;

    const SAMPLE_REASON: &str =
        "Tempban until: 2099-01-01T00:00:00+00:00 | Reason: spam | Moderator: X";

    #[test]
    fn test_parse_full_notice() {
        let notice = parse_tempban_notice(SAMPLE_REASON).unwrap();

        assert_eq!(
            notice.expires_at,
            Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(notice.reason, "spam");
        assert_eq!(notice.moderator, "X");
    }

    #[test]
    fn test_parse_rejects_foreign_reasons() {
        assert!(parse_tempban_notice("raiding").is_none());
        assert!(parse_tempban_notice("Tempban until: soon | Reason: spam").is_none());
        assert!(parse_tempban_notice("").is_none());
    }

    #[test]
    fn test_parse_tolerates_missing_moderator() {
        let notice =
            parse_tempban_notice("Tempban until: 2099-01-01T00:00:00+00:00 | Reason: spam")
                .unwrap();
        assert_eq!(notice.reason, "spam");
        assert_eq!(notice.moderator, "");
    }

    #[test]
    fn test_format_parse_round_trip() {
        let expires_at = Utc.with_ymd_and_hms(2027, 3, 15, 8, 30, 0).unwrap();
        let encoded = format_tempban_notice(expires_at, "ban evasion", "mod#1234");

        let notice = parse_tempban_notice(&encoded).unwrap();
        assert_eq!(notice.expires_at, expires_at);
        assert_eq!(notice.reason, "ban evasion");
        assert_eq!(notice.moderator, "mod#1234");
    }

    #[tokio::test]
    async fn test_sweep_before_expiry_does_not_unban() {
        let mut gateway = MockChatGateway::new();
        gateway
            .expect_list_bans()
            .with(eq(1u64))
            .returning(|_| Ok(vec![(42, Some(SAMPLE_REASON.to_string()))]));
        gateway.expect_unban().never();

        let before = Utc.with_ymd_and_hms(2098, 12, 31, 23, 59, 59).unwrap();
        sweep_guild(&gateway, 1, before).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_after_expiry_unbans_exactly_once() {
        let mut gateway = MockChatGateway::new();
        gateway
            .expect_list_bans()
            .with(eq(1u64))
            .returning(|_| Ok(vec![(42, Some(SAMPLE_REASON.to_string()))]));
        gateway
            .expect_unban()
            .with(eq(1u64), eq(42u64), eq(EXPIRED_UNBAN_REASON))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let after = Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 1).unwrap();
        sweep_guild(&gateway, 1, after).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_skips_permanent_bans() {
        let mut gateway = MockChatGateway::new();
        gateway.expect_list_bans().returning(|_| {
            Ok(vec![
                (7, Some("raiding".to_string())),
                (8, None),
                (42, Some(SAMPLE_REASON.to_string())),
            ])
        });
        gateway
            .expect_unban()
            .with(eq(1u64), eq(42u64), eq(EXPIRED_UNBAN_REASON))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let after = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap();
        sweep_guild(&gateway, 1, after).await.unwrap();
    }

    #[tokio::test]
    async fn test_unban_failure_does_not_stop_the_guild_sweep() {
        let mut gateway = MockChatGateway::new();
        gateway.expect_list_bans().returning(|_| {
            Ok(vec![
                (42, Some(SAMPLE_REASON.to_string())),
                (
                    43,
                    Some("Tempban until: 2000-01-01T00:00:00+00:00 | Reason: old | Moderator: Y"
                        .to_string()),
                ),
            ])
        });
        gateway
            .expect_unban()
            .with(eq(1u64), eq(42u64), eq(EXPIRED_UNBAN_REASON))
            .times(1)
            .returning(|_, _, _| Err(GatewayError::Forbidden));
        gateway
            .expect_unban()
            .with(eq(1u64), eq(43u64), eq(EXPIRED_UNBAN_REASON))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let after = Utc.with_ymd_and_hms(2100, 1, 1, 0, 0, 0).unwrap();
        sweep_guild(&gateway, 1, after).await.unwrap();
    }
}

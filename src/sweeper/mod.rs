//! Reconciliation sweeper
//!
//! A single background task on a fixed tick that finalizes expired
//! giveaways, reverses expired tempbans, and prunes retained concluded
//! records. Failures are isolated per item: one unreachable giveaway or one
//! permission-denied guild never aborts the rest of a sweep.

pub mod tempban;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

use crate::SWEEP_TARGET;
use crate::gateway::{ChatGateway, Clock};
use crate::giveaway::{GiveawayRegistry, pipeline};

/// Seconds between reconciliation ticks
pub const SWEEP_INTERVAL_SECS: u64 = 60;

/// Request type for the sweep task
#[derive(Debug, Clone)]
pub enum SweepRequest {
    /// Run a full sweep immediately, outside the fixed schedule
    SweepAll,
    /// Shut down the sweep task
    Shutdown,
}

/// Background reconciliation over the giveaway registry and platform bans
#[derive(Clone)]
pub struct Sweeper {
    registry: Arc<GiveawayRegistry>,
    gateway: Arc<dyn ChatGateway>,
    clock: Arc<dyn Clock>,
}

impl Sweeper {
    pub fn new(
        registry: Arc<GiveawayRegistry>,
        gateway: Arc<dyn ChatGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            registry,
            gateway,
            clock,
        }
    }

    /// Create the request channel for the sweep task.
    pub fn channel() -> (Sender<SweepRequest>, Receiver<SweepRequest>) {
        mpsc::channel(16)
    }

    /// Spawn the sweep loop onto the runtime.
    pub fn start(self, rx: Receiver<SweepRequest>, interval_seconds: u64) {
        tokio::spawn(async move {
            self.run(rx, interval_seconds).await;
        });
    }

    async fn run(&self, mut rx: Receiver<SweepRequest>, interval_seconds: u64) {
        info!(
            target: SWEEP_TARGET,
            "starting reconciliation task with {interval_seconds}s interval"
        );

        let mut interval = tokio::time::interval(Duration::from_secs(interval_seconds));

        loop {
            tokio::select! {
                Some(request) = rx.recv() => match request {
                    SweepRequest::SweepAll => {
                        info!(target: SWEEP_TARGET, "received request for an immediate sweep");
                        self.tick().await;
                    }
                    SweepRequest::Shutdown => {
                        info!(target: SWEEP_TARGET, "received shutdown request for sweep task");
                        break;
                    }
                },

                _ = interval.tick() => {
                    debug!(target: SWEEP_TARGET, "performing periodic sweep");
                    self.tick().await;
                }
            }
        }

        info!(target: SWEEP_TARGET, "reconciliation task shut down");
    }

    /// One full reconciliation pass.
    pub async fn tick(&self) {
        let now = self.clock.now();
        self.sweep_giveaways(now).await;
        self.sweep_tempbans(now).await;

        let pruned = self.registry.prune_concluded(now);
        if pruned > 0 {
            debug!(target: SWEEP_TARGET, pruned, "pruned concluded giveaways past retention");
        }
    }

    async fn sweep_giveaways(&self, now: DateTime<Utc>) {
        for (id, _) in self.registry.list_expired(now) {
            let mut rng = StdRng::from_os_rng();
            match pipeline::complete(self.gateway.as_ref(), &self.registry, &mut rng, id, now).await
            {
                Ok(Some(_)) => {
                    info!(target: SWEEP_TARGET, giveaway = %id, "expired giveaway concluded")
                }
                // Concluded elsewhere between the scan and this item.
                Ok(None) => {}
                Err(err) => error!(
                    target: SWEEP_TARGET,
                    giveaway = %id,
                    error = %err,
                    "failed to conclude expired giveaway"
                ),
            }
        }
    }

    async fn sweep_tempbans(&self, now: DateTime<Utc>) {
        let guilds = match self.gateway.guild_ids().await {
            Ok(guilds) => guilds,
            Err(err) => {
                warn!(target: SWEEP_TARGET, error = %err, "could not enumerate guilds for tempban sweep");
                return;
            }
        };

        for guild_id in guilds {
            if let Err(err) = tempban::sweep_guild(self.gateway.as_ref(), guild_id, now).await {
                warn!(
                    target: SWEEP_TARGET,
                    guild_id,
                    error = %err,
                    "tempban sweep failed for guild"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support::FixedClock;
    use crate::gateway::{GatewayError, MockChatGateway};
    use crate::store::JsonStore;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use mockall::predicate::eq;

    fn temp_store() -> Arc<JsonStore> {
        let dir = std::env::temp_dir().join(format!("raffle-sweeper-{}", uuid::Uuid::new_v4()));
        Arc::new(JsonStore::new(dir))
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    async fn registry_with_expired_giveaway() -> Arc<GiveawayRegistry> {
        let now = base_time();
        let registry = GiveawayRegistry::new(temp_store());
        registry
            .create(
                1,
                2,
                3,
                "Steam key",
                1,
                now + ChronoDuration::seconds(30),
                50,
                now,
            )
            .await
            .unwrap();
        registry.enter(1, 3, 77, now).await.unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_tick_concludes_expired_giveaways() {
        let registry = registry_with_expired_giveaway().await;

        let mut gateway = MockChatGateway::new();
        gateway
            .expect_edit_message()
            .times(1)
            .returning(|_, _, _| Ok(()));
        gateway
            .expect_send_message()
            .times(1)
            .returning(|_, _| Ok(()));
        gateway.expect_guild_ids().returning(|| Ok(vec![]));

        let clock = Arc::new(FixedClock(base_time() + ChronoDuration::minutes(5)));
        let sweeper = Sweeper::new(Arc::clone(&registry), Arc::new(gateway), clock);

        sweeper.tick().await;
        assert_eq!(registry.active_len(), 0);
    }

    #[tokio::test]
    async fn test_tick_leaves_future_giveaways_alone() {
        let registry = registry_with_expired_giveaway().await;

        let mut gateway = MockChatGateway::new();
        gateway.expect_edit_message().never();
        gateway.expect_send_message().never();
        gateway.expect_guild_ids().returning(|| Ok(vec![]));

        let clock = Arc::new(FixedClock(base_time()));
        let sweeper = Sweeper::new(Arc::clone(&registry), Arc::new(gateway), clock);

        sweeper.tick().await;
        assert_eq!(registry.active_len(), 1);
    }

    #[tokio::test]
    async fn test_forbidden_guild_does_not_abort_other_guilds() {
        let registry = Arc::new(GiveawayRegistry::new(temp_store()));
        let expired = "Tempban until: 2000-01-01T00:00:00+00:00 | Reason: spam | Moderator: X";

        let mut gateway = MockChatGateway::new();
        gateway.expect_guild_ids().returning(|| Ok(vec![1, 2]));
        gateway
            .expect_list_bans()
            .with(eq(1u64))
            .returning(|_| Err(GatewayError::Forbidden));
        gateway
            .expect_list_bans()
            .with(eq(2u64))
            .returning(move |_| Ok(vec![(42, Some(expired.to_string()))]));
        gateway
            .expect_unban()
            .with(eq(2u64), eq(42u64), eq(tempban::EXPIRED_UNBAN_REASON))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let clock = Arc::new(FixedClock(base_time()));
        let sweeper = Sweeper::new(registry, Arc::new(gateway), clock);

        sweeper.tick().await;
    }

    #[tokio::test]
    async fn test_tick_prunes_concluded_past_retention() {
        let registry = registry_with_expired_giveaway().await;
        let id = registry.find(1, 3).unwrap();
        registry.conclude(id, base_time()).await.unwrap();

        let mut gateway = MockChatGateway::new();
        gateway.expect_guild_ids().returning(|| Ok(vec![]));

        let long_after = base_time()
            + ChronoDuration::seconds(crate::giveaway::CONCLUDED_RETENTION_SECS)
            + ChronoDuration::minutes(1);
        let clock = Arc::new(FixedClock(long_after));
        let sweeper = Sweeper::new(Arc::clone(&registry), Arc::new(gateway), clock);

        sweeper.tick().await;
        assert!(registry.get(&id).is_none());
    }

    #[tokio::test]
    async fn test_shutdown_request_stops_the_loop() {
        let registry = Arc::new(GiveawayRegistry::new(temp_store()));

        let mut gateway = MockChatGateway::new();
        gateway.expect_guild_ids().returning(|| Ok(vec![]));

        let clock = Arc::new(FixedClock(base_time()));
        let sweeper = Sweeper::new(registry, Arc::new(gateway), clock);

        let (tx, rx) = Sweeper::channel();
        let handle = tokio::spawn(async move {
            sweeper.run(rx, 3600).await;
        });

        tx.send(SweepRequest::Shutdown).await.unwrap();
        handle.await.unwrap();
    }
}

//! Shared bot state
//!
//! One `Data` value is constructed at startup and handed to every command
//! invocation and event handler. It owns no business rules itself; all
//! giveaway state flows through the registry it carries, which is the only
//! component allowed to touch the giveaway namespace of the durable store.

use std::ops::Deref;
use std::sync::Arc;

use serenity::prelude::TypeMapKey;
use tokio::sync::mpsc::Sender;

use crate::gateway::Clock;
use crate::giveaway::GiveawayRegistry;
use crate::sweeper::SweepRequest;

/// Centralized data structure for the bot
#[derive(Clone)]
pub struct Data(pub Arc<DataInner>);

// Implement TypeMapKey for Data to allow storing it in Serenity's data map
impl TypeMapKey for Data {
    type Value = Data;
}

impl std::fmt::Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Data").finish_non_exhaustive()
    }
}

impl Deref for Data {
    type Target = DataInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Data {
    #[must_use]
    pub fn new(
        registry: Arc<GiveawayRegistry>,
        clock: Arc<dyn Clock>,
        sweep_tx: Sender<SweepRequest>,
    ) -> Self {
        Self(Arc::new(DataInner {
            registry,
            clock,
            sweep_tx,
        }))
    }
}

/// Inner state shared across clones of `Data`
pub struct DataInner {
    /// Live giveaway state and its invariants
    pub registry: Arc<GiveawayRegistry>,
    /// Wall-clock source
    pub clock: Arc<dyn Clock>,
    /// Channel to the reconciliation sweep task
    pub sweep_tx: Sender<SweepRequest>,
}

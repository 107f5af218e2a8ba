//! Giveaway subsystem
//!
//! Timed entry contests with persistent state: the registry owns live
//! records and their invariants, the selection module draws winners, and the
//! completion pipeline transitions expired giveaways to their announced end.

mod error;
pub mod pipeline;
mod record;
mod registry;
pub mod selection;

pub use error::{GiveawayError, GiveawayResult};
pub use pipeline::Announcement;
pub use record::{EntryResult, Giveaway, GiveawayId, GiveawayStatus};
pub use registry::{CONCLUDED_RETENTION_SECS, GIVEAWAY_NAMESPACE, GiveawayRegistry};

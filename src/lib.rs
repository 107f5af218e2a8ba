pub mod backup;
pub mod commands;
pub mod data;
pub mod duration;
pub mod gateway;
pub mod giveaway;
pub mod handlers;
pub mod logging;
pub mod store;
pub mod sweeper;

// Customize these constants for your bot
pub const BOT_NAME: &str = "raffle_daemon";
pub const COMMAND_TARGET: &str = "raffle_daemon::command";
pub const ERROR_TARGET: &str = "raffle_daemon::error";
pub const EVENT_TARGET: &str = "raffle_daemon::handlers";
pub const SWEEP_TARGET: &str = "raffle_daemon::sweep";
pub const BACKUP_TARGET: &str = "raffle_daemon::backup";
pub const CONSOLE_TARGET: &str = "raffle_daemon";

pub use data::Data;
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

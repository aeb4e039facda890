//! Chat platform boundary.
//!
//! The poll engine only sees the traits in [`traits`]. The Discord REST
//! client and gateway adapter implement them for the running bot.

pub mod gateway;
pub mod rest;
pub mod traits;

pub use gateway::DiscordGateway;
pub use rest::DiscordRest;
pub use traits::{
    DisplayNameResolver, InboundMessage, NotificationSink, PollPoster, VoteTallySource,
};

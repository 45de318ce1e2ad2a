//! rosterwatch - Live game server roster for Discord communities
//!
//! Polls a game server status API and keeps one message per configured
//! community showing the current public servers. Messages are edited in
//! place; one that was deleted behind the bot's back is reposted and the new
//! id stored.
//!
//! # Architecture
//!
//! - **upstream**: Roster fetch from the status API
//! - **roster**: Server records, snapshots and rendering
//! - **target**: Per-community display targets and Discord ids
//! - **store**: Target persistence (SQLite)
//! - **publisher**: Message send/edit/delete (Discord REST)
//! - **engine**: Per-tick reconciliation and operator operations
//! - **controller**: Periodic driver with commands and events
//! - **configurator**: Page flow for configuring a community
//! - **config**: Settings file and environment overrides

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod roster;
pub mod target;

// Components
pub mod configurator;
pub mod controller;
pub mod engine;
pub mod publisher;
pub mod store;
pub mod upstream;

// Re-exports
pub use error::{Result, RosterError};

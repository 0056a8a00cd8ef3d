//! Taxi Relay: forwards taxi requests from public groups to driver groups.

pub mod channels;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod worker;

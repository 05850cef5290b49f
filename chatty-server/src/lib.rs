//! Chatty server library.
//!
//! A TCP chat server speaking a line-based text protocol. Commands are
//! executed against pluggable services; messages sent to a personal chat or
//! group are pushed live to every other connection that has it open.

pub mod config;
pub mod executor;
pub mod notifications;
pub mod routing;
pub mod server;
pub mod service;

//! Shared protocol definitions for the Chatty text wire format.

pub mod chat;
pub mod codec;
pub mod command;
pub mod dto;
pub mod session;

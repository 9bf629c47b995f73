//! Command implementations for the Scanlens CLI.

pub mod analyze;
pub mod chat;
pub mod config;

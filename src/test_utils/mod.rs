//! Scripted readers and assertion macros for tests.

pub mod macros;
mod scripted;

pub use scripted::{ScriptedChain, log_at};

//! launchguard core - platform-independent launch attempt logic
//!
//! This crate provides the data model, the capability traits implemented by
//! the platform crates, the pid discovery loop and the launch attempt that
//! classifies a worker start into success, transient or permanent failure.

mod attempt;
mod child;
mod config;
mod discovery;
mod error;
mod process;

#[cfg(test)]
mod testing;

pub use attempt::*;
pub use child::*;
pub use config::*;
pub use discovery::*;
pub use error::*;
pub use process::*;

//! Herald Engine - orchestration layer
//!
//! Binds a [`CommandRegistry`](herald_core::CommandRegistry) to a storage
//! backend: resolves the invoked command, fetches the user and channel fields
//! its policy needs, dispatches, and persists throttling state afterwards.
//! Runtime settings come from a TOML document (see [`config`]).

pub mod config;
pub mod runtime;

pub use config::{CommandOverride, RuntimeConfig};
pub use runtime::{fetch_user, Invocation, Runtime};

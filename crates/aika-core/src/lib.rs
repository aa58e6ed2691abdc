//! Aika companion core: session lifecycle, world tracking, chat parsing and behavior.
//!
//! Nothing here touches the network directly. Credentials and the protocol transport come
//! in through the traits in [`session`]; `aika-bridge` provides the concrete ones.

pub mod behavior;
pub mod chat;
pub mod companion;
pub mod error;
pub mod lines;
pub mod protocol;
pub mod session;
pub mod world;

#[cfg(test)]
mod testing;

pub use companion::{Companion, CompanionConfig, RunOutcome};
pub use error::{AttemptFailure, AuthError, ConnectionError, ProtocolEventError};

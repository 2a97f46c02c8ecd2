//! Shared types for the dashboard transport workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;

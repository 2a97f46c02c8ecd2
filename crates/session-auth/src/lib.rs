//! Session credentials for the dashboard API
//!
//! Holds the access/refresh token pair and performs the renewal exchange.
//! This crate knows nothing about request pipelines or concurrency; the
//! coordinator in `session-refresh` decides when a renewal happens.
//!
//! Credential flow:
//! 1. Login response parsed with `token::parse_credential_pair()`
//! 2. Pair stored via `credentials::TokenStore::store_pair()`
//! 3. Requests read the access token with `TokenStore::get()`
//! 4. On 401 the coordinator calls `token::refresh_tokens()` once
//! 5. Renewed pair saved via `TokenStore::store_pair()`
//! 6. Logout wipes everything via `TokenStore::clear()` + `set_refresh_token(None)`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod persist;
pub mod token;

pub use constants::*;
pub use credentials::{CredentialPair, TokenStore};
pub use error::{Error, Result};
pub use persist::PersistentStore;
pub use token::{TokenShape, parse_credential_pair, refresh_tokens};

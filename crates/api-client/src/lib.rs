//! Request pipeline for the dashboard API
//!
//! `ApiClient` is the one function pages and stores call. Around every
//! request it:
//!
//! 1. Attaches `Authorization: Bearer <access token>` (except login/renewal)
//! 2. Rewrites body, query and form field names to snake_case
//! 3. Sends through the `Transport`
//! 4. On 401, waits for the shared renewal and replays the request once
//! 5. Rewrites the response (or error) body back to camelCase
//!
//! Callers never see a recoverable 401. They see either the replayed
//! request's outcome or, when the session cannot be renewed, an error after
//! the session has already been terminated.

pub mod cache;
pub mod client;
pub mod error;
pub mod metrics;
pub mod request;

pub use cache::ResponseCache;
pub use client::{ApiClient, ApiClientOptions};
pub use error::{ApiError, ErrorKind, Result};
pub use request::{ApiRequest, ApiResponse, RequestBody, RequestContext};

//! # fingerd
//!
//! `fingerd` answers WebFinger lookups (`/.well-known/webfinger`) from an authoritative
//! `PostgreSQL` store and issues revocable bearer credentials for the authenticated API.
//!
//! ## Credentials and the session ledger
//!
//! Credentials are HS256-signed compact tokens. A valid signature is necessary but not
//! sufficient: every credential has exactly one row in the `sessions` table, keyed by the
//! SHA-256 of the full token, and a credential is live only while that row exists and has
//! not expired. Logout, refresh and "log out everywhere" delete rows; a periodic sweep
//! removes rows that already expired.
//!
//! ## Cache-aside resolution
//!
//! Resource lookups go through [`resolver::ResourceResolver`]: cache first, store on a miss,
//! then populate the cache. Cache failures never fail a lookup, and an authoritative miss is
//! never cached. Search results are cached too, including empty result sets, which are
//! stored as a sentinel with a shorter TTL.
//!
//! ## Request pipeline
//!
//! Every request passes the same ordered stages, composed once in [`api::app`]:
//! rate limit, security headers, CORS, timeout, then the auth gate (the
//! [`api::handlers::auth::Principal`] extractor) in front of protected handlers.

pub mod api;
pub mod cache;
pub mod cli;
pub mod metrics;
pub mod ratelimit;
pub mod resolver;
pub mod resource;
pub mod session;
pub mod token;
pub mod users;

pub use api::{APP_USER_AGENT, GIT_COMMIT_HASH};

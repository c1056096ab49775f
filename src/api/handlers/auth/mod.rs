//! Account and session endpoints, plus the auth gate extractors.

pub mod login;
pub mod logout;
pub mod principal;
pub mod refresh;
pub mod register;
pub mod sessions;
pub mod types;
pub mod utils;

pub use principal::{AdminPrincipal, BearerCredential, Principal};

use crate::session::SessionStoreError;
use thiserror::Error;

use super::jwt;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed credential")]
    Malformed,
    #[error("credential signature is invalid")]
    SignatureInvalid,
    /// Signature is fine but the ledger has no live row: revoked, swept, or never issued.
    #[error("no live session for credential")]
    SessionNotFound,
    #[error("credential has expired")]
    SessionExpired,
    #[error("failed to sign credential")]
    SigningFailure,
    #[error(transparent)]
    Persistence(#[from] SessionStoreError),
    #[error("signing secret must be at least {0} bytes")]
    WeakSecret(usize),
}

impl TokenError {
    /// True for outcomes that mean "the caller is not authenticated" (401), as opposed to
    /// server-side failures.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Malformed | Self::SignatureInvalid | Self::SessionNotFound | Self::SessionExpired
        )
    }
}

impl From<jwt::Error> for TokenError {
    fn from(err: jwt::Error) -> Self {
        match err {
            jwt::Error::InvalidSignature => Self::SignatureInvalid,
            jwt::Error::Key => Self::SigningFailure,
            jwt::Error::TokenFormat
            | jwt::Error::Base64
            | jwt::Error::Json(_)
            | jwt::Error::UnsupportedAlg(_) => Self::Malformed,
        }
    }
}

use std::io;

use crate::{account::CodecError, cert::CertError};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal errors of a renewal run.
///
/// None of these are retried within a run; the next invocation starts over.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("flag --email (-e) is required when no account is stored in {account_key}")]
    MissingEmail { account_key: String },

    #[error("failed to connect to etcd")]
    StoreConnect(#[source] eyre::Report),

    #[error("failed to fetch {key}")]
    StoreRead {
        key: String,
        #[source]
        source: eyre::Report,
    },

    #[error("failed to store {key}")]
    StoreWrite {
        key: String,
        #[source]
        source: eyre::Report,
    },

    #[error("account stored in {key} is corrupt")]
    AccountCorrupt {
        key: String,
        #[source]
        source: CodecError,
    },

    #[error("failed to encode account")]
    AccountEncode(#[source] CodecError),

    #[error("failed to set up HTTP-01 challenge responder on port {port}")]
    ChallengeSetup {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("failed to register ACME account")]
    Registration(#[source] eyre::Report),

    #[error("failed to obtain certificate")]
    Issuance(#[source] eyre::Report),

    #[error("failed to create self-signed certificate")]
    SelfSign(#[from] CertError),

    #[error("failed to write new certificate")]
    Commit(#[source] eyre::Report),
}

impl Error {
    /// Whether the run failed because the stored account could not be decoded.
    pub fn is_malformed_account(&self) -> bool {
        matches!(
            self,
            Error::AccountCorrupt {
                source: CodecError::MalformedAccount(_),
                ..
            }
        )
    }
}

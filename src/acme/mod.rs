//! Interface to the ACME provider and the HTTP-01 challenge responder.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{account::Account, cert::Certificate};

mod http01;
mod instant;

pub use self::{
    http01::{ChallengeTokens, Http01Responder},
    instant::InstantAcmeClient,
};

/// Publishes key authorizations while the ACME provider validates domain control.
pub trait ChallengeResponder: Send + Sync {
    /// Serves `key_authorization` at `/.well-known/acme-challenge/{token}`.
    fn present(&self, token: &str, key_authorization: &str);

    /// Stops serving `token`.
    fn clean_up(&self, token: &str);
}

/// Certificate order for [`AcmeClient::obtain`].
///
/// The issued chain is always bundled: leaf first, followed by intermediates.
#[derive(Debug)]
pub struct ObtainRequest {
    /// Names to certify. The first is the Common Name; all of them are DNS SANs.
    pub domains: Vec<String>,

    /// Private key to certify instead of a fresh one.
    pub reuse_key: Option<rcgen::KeyPair>,
}

/// ACME provider operations used by the renewal run.
#[async_trait]
pub trait AcmeClient: Send + Sync {
    /// Registers `account` with the provider, agreeing to its terms of service.
    ///
    /// Returns the registered account, bound to the key of `account`.
    async fn register(&self, account: &Account) -> eyre::Result<Account>;

    /// Sets the responder that answers HTTP-01 challenges during [`obtain`](Self::obtain).
    fn set_challenge_responder(&mut self, responder: Arc<dyn ChallengeResponder>);

    /// Orders, validates and downloads a certificate for `request.domains`.
    async fn obtain(&self, account: &Account, request: ObtainRequest)
        -> eyre::Result<Certificate>;
}

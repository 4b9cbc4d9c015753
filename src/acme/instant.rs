use std::sync::Arc;

use async_trait::async_trait;
use eyre::{eyre, OptionExt as _, WrapErr as _};
use instant_acme::{
    AuthorizationStatus, ChallengeType, Identifier, Key, NewOrder, OrderStatus, RetryPolicy,
};
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use serde_json::json;
use zeroize::Zeroizing;

use super::{AcmeClient, ChallengeResponder, ObtainRequest};
use crate::{
    account::{Account, Registration},
    cert::{self, Certificate},
    key::AccountKey,
};

/// [`AcmeClient`] speaking to an ACME directory through `instant-acme`.
pub struct InstantAcmeClient {
    directory_url: String,
    responder: Option<Arc<dyn ChallengeResponder>>,
}

impl InstantAcmeClient {
    pub fn new(directory_url: impl Into<String>) -> Self {
        InstantAcmeClient {
            directory_url: directory_url.into(),
            responder: None,
        }
    }

    /// Rebuilds the `instant-acme` account for a registered `account` from its stored key.
    async fn restore(&self, account: &Account) -> eyre::Result<instant_acme::Account> {
        let registration = account
            .registration
            .as_ref()
            .ok_or_eyre("account is not registered")?;
        let key = account.key.as_ref().ok_or_eyre("account has no key")?;
        let der = key.to_pkcs8_der()?;

        instant_acme::Account::builder()?
            .from_parts(
                registration.uri.clone(),
                PrivatePkcs8KeyDer::from(der.as_slice()),
                self.directory_url.clone(),
            )
            .await
            .wrap_err("failed to restore ACME account")
    }

    async fn order(
        &self,
        account: &instant_acme::Account,
        responder: &dyn ChallengeResponder,
        presented: &mut Vec<String>,
        request: ObtainRequest,
    ) -> eyre::Result<Certificate> {
        let identifiers = request
            .domains
            .iter()
            .map(|domain| Identifier::Dns(domain.clone()))
            .collect::<Vec<_>>();

        let mut order = account
            .new_order(&NewOrder::new(&identifiers))
            .await
            .wrap_err("failed to create order")?;

        let mut authorizations = order.authorizations();
        while let Some(authz) = authorizations.next().await {
            let mut authz = authz?;

            if authz.status == AuthorizationStatus::Valid {
                continue;
            }

            let mut challenge = authz
                .challenge(ChallengeType::Http01)
                .ok_or_eyre("provider offered no HTTP-01 challenge")?;

            let token = challenge.token.clone();
            responder.present(&token, challenge.key_authorization().as_str());
            presented.push(token);

            challenge.set_ready().await?;
        }

        let status = order.poll_ready(&RetryPolicy::default()).await?;
        if status != OrderStatus::Ready {
            return Err(eyre!("order is {status:?} instead of ready"));
        }

        let key_pair = match request.reuse_key {
            Some(key_pair) => key_pair,
            None => rcgen::KeyPair::generate()?,
        };

        let csr = cert::certificate_request(&request.domains, &key_pair)?;
        order.finalize_csr(csr.der()).await?;

        let chain = order.poll_certificate(&RetryPolicy::default()).await?;

        Ok(Certificate::new(
            Zeroizing::new(key_pair.serialize_pem()),
            chain,
        ))
    }
}

#[async_trait]
impl AcmeClient for InstantAcmeClient {
    async fn register(&self, account: &Account) -> eyre::Result<Account> {
        let key = account.key.as_ref().ok_or_eyre("account has no key")?;
        let (signing_key, der) = acme_key(key)?;
        let pkcs8 = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der.to_vec()));

        let (acme_account, _) = instant_acme::Account::builder()?
            .create_from_key((signing_key, pkcs8), self.directory_url.clone())
            .await
            .wrap_err("failed to create ACME account")?;

        let contact = account.contact();
        let contact = contact.iter().map(String::as_str).collect::<Vec<_>>();

        if !contact.is_empty() {
            acme_account
                .update_contacts(&contact)
                .await
                .wrap_err("failed to set ACME account contact")?;
        }

        Ok(Account {
            email: account.email.clone(),
            registration: Some(Registration {
                body: json!({
                    "contact": contact,
                    "termsOfServiceAgreed": true,
                }),
                uri: acme_account.id().to_owned(),
            }),
            key: Some(key.clone()),
        })
    }

    fn set_challenge_responder(&mut self, responder: Arc<dyn ChallengeResponder>) {
        self.responder = Some(responder);
    }

    async fn obtain(
        &self,
        account: &Account,
        request: ObtainRequest,
    ) -> eyre::Result<Certificate> {
        let responder = self
            .responder
            .clone()
            .ok_or_eyre("no HTTP-01 challenge responder configured")?;

        let acme_account = self.restore(account).await?;

        let mut presented = Vec::new();
        let res = self
            .order(&acme_account, &*responder, &mut presented, request)
            .await;

        for token in &presented {
            responder.clean_up(token);
        }

        res
    }
}

/// The account key as `instant-acme` signs with it, and its PKCS#8 DER.
fn acme_key(key: &AccountKey) -> eyre::Result<(Key, Zeroizing<Vec<u8>>)> {
    let der = key.to_pkcs8_der()?;
    let acme_key = Key::from_pkcs8_der(PrivatePkcs8KeyDer::from(der.as_slice()))?;
    Ok((acme_key, der))
}

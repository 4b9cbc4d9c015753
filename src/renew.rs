//! One check-and-renew pass.
//!
//! A run reads the stored full chain and asks [`decision::check`] whether it is due. If it is, a
//! replacement is either self-signed locally or obtained from the ACME provider:
//!
//! 1. the account is read from the store, or created (not yet stored) when there is none;
//! 2. an unregistered account is registered and written back on its own;
//! 3. an HTTP-01 responder is started for the duration of the order;
//! 4. the previous private key, if readable, is offered for reuse;
//! 5. the certificate is obtained.
//!
//! Either way the full chain and its private key are then written in a single transaction, so
//! readers never see one without the other.

use std::sync::Arc;

use rcgen::KeyPair;
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::{
    account::{self, Account},
    acme::{AcmeClient, Http01Responder, ObtainRequest},
    cert::{self, Certificate, Validity},
    config::Config,
    decision::{self, Decision},
    error::{Error, Result},
    store::{KvStore, Put},
};

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The stored certificate is not due; nothing was written.
    Valid(Validity),

    /// A certificate was obtained from the ACME provider and stored.
    Renewed,

    /// A self-signed certificate was generated and stored.
    SelfSigned,
}

/// Renews the certificate described by a [`Config`].
pub struct Renewer<S, A> {
    config: Config,
    store: S,
    acme: A,
}

impl<S: KvStore, A: AcmeClient> Renewer<S, A> {
    pub fn new(config: Config, store: S, acme: A) -> Self {
        Renewer {
            config,
            store,
            acme,
        }
    }

    /// Checks and, if due, renews the certificate.
    ///
    /// Must be called from within an Actix runtime; the HTTP-01 responder is spawned on it.
    pub async fn run(&mut self) -> Result<Outcome> {
        self.run_at(OffsetDateTime::now_utc()).await
    }

    /// Same as [`run`](Self::run) with `now` as the current time.
    pub async fn run_at(&mut self, now: OffsetDateTime) -> Result<Outcome> {
        let force = self.config.force_renew();

        let existing = if force {
            None
        } else {
            self.read(&self.config.full_chain_key()).await?
        };

        match decision::check(existing.as_deref(), now, force) {
            Decision::Valid(validity) => {
                log::info!(
                    "Certificate is valid until {}. Not refreshing.",
                    validity.not_after
                );
                return Ok(Outcome::Valid(validity));
            }
            Decision::Due(reason) => log::info!("Renewing certificate: {reason}"),
        }

        if self.config.self_signed() {
            let cert = cert::self_signed(self.config.domains(), now)?;
            self.commit(&cert).await?;

            log::info!("Generated new self signed certificate!");
            return Ok(Outcome::SelfSigned);
        }

        let account = self.load_or_create_account().await?;
        let account = self.register_if_needed(account).await?;

        log::info!("Preparing for challenge...");

        let port = self.config.port();
        let responder = Http01Responder::bind(port)
            .map_err(|source| Error::ChallengeSetup { port, source })?;
        let responder = Arc::new(responder);
        self.acme.set_challenge_responder(responder.clone());

        let reuse_key = self.load_existing_private_key().await?;

        log::info!("Requesting new certificate...");

        let request = ObtainRequest {
            domains: self.config.domains().to_vec(),
            reuse_key,
        };
        let res = self.acme.obtain(&account, request).await;
        responder.stop().await;
        let cert = res.map_err(Error::Issuance)?;

        self.commit(&cert).await?;

        log::info!("Acquired new certificate!");
        Ok(Outcome::Renewed)
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.store
            .get(key)
            .await
            .map_err(|source| Error::StoreRead {
                key: key.to_owned(),
                source,
            })
    }

    async fn load_or_create_account(&self) -> Result<Account> {
        let key = self.config.account_key();

        match self.read(key).await? {
            Some(doc) => {
                let doc = Zeroizing::new(doc);
                account::decode(&doc).map_err(|source| Error::AccountCorrupt {
                    key: key.to_owned(),
                    source,
                })
            }

            None => {
                log::info!("Creating new Let's Encrypt account...");

                let email = self.config.email().ok_or_else(|| Error::MissingEmail {
                    account_key: key.to_owned(),
                })?;

                Ok(Account::create(email))
            }
        }
    }

    async fn register_if_needed(&self, account: Account) -> Result<Account> {
        if account.is_registered() {
            return Ok(account);
        }

        let account = self
            .acme
            .register(&account)
            .await
            .map_err(Error::Registration)?;

        if let Some(registration) = &account.registration {
            log::info!("Registered account {}", registration.uri);
        }

        let key = self.config.account_key();
        let doc = account::encode(&account).map_err(Error::AccountEncode)?;

        self.store
            .put(key, doc.as_bytes())
            .await
            .map_err(|source| Error::StoreWrite {
                key: key.to_owned(),
                source,
            })?;

        Ok(account)
    }

    /// Previous certificate key, if one is stored and readable.
    async fn load_existing_private_key(&self) -> Result<Option<KeyPair>> {
        let key = self.config.private_key_key();

        let Some(pem) = self.read(&key).await? else {
            return Ok(None);
        };
        let pem = Zeroizing::new(pem);

        let key_pair = std::str::from_utf8(&pem)
            .map_err(|err| err.to_string())
            .and_then(|pem| KeyPair::from_pem(pem).map_err(|err| err.to_string()));

        match key_pair {
            Ok(key_pair) => Ok(Some(key_pair)),
            Err(err) => {
                log::warn!("Failed to parse old private key for your certificate: {err}");
                Ok(None)
            }
        }
    }

    async fn commit(&self, cert: &Certificate) -> Result<()> {
        let puts = vec![
            Put::new(self.config.full_chain_key(), cert.certificate()),
            Put::new(self.config.private_key_key(), cert.private_key()),
        ];

        self.store.commit(puts).await.map_err(Error::Commit)
    }
}

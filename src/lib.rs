//! Renews a TLS certificate through ACME and shares it between replicas through etcd.
//!
//! Every replica of a service can read the same certificate chain and private key from etcd, so
//! none of them needs local disk state. This crate runs a single check-and-renew pass: it decides
//! whether the stored certificate is due, obtains a new one from [Let's Encrypt] (or self-signs
//! one) when it is, and writes the chain and key back in one transaction.
//!
//! # Storage Layout
//!
//! | Key                                          | Value                                    |
//! |----------------------------------------------|------------------------------------------|
//! | `/letsencrypt-with-etcd/production-account`  | ACME account, see [`account`]            |
//! | `/letsencrypt-with-etcd/staging-account`     | ACME account for the staging environment |
//! | `<directory><primary domain>-fullchain.pem`  | PEM chain, leaf first                    |
//! | `<directory><primary domain>-key.pem`        | PEM private key of the leaf              |
//!
//! The primary domain is the first configured domain. `<directory>` defaults to
//! [`DEFAULT_DIRECTORY`](config::DEFAULT_DIRECTORY).
//!
//! # Renewal
//!
//! A certificate is renewed once two thirds of its lifetime have passed, see [`decision`]. The
//! HTTP-01 challenge is answered on a temporary server, so the configured port must be reachable
//! as port 80 of every domain while a run is ordering a certificate.
//!
//! ## Use Staging For Development!
//!
//! Let's Encrypt uses [rate limits] to ensure the API is not being abused. Use the staging
//! environment for development where the limits are more relaxed. See
//! [`Environment::Staging`](config::Environment::Staging).
//!
//! [Let's Encrypt]: https://letsencrypt.org/
//! [rate limits]: https://letsencrypt.org/docs/rate-limits

#![deny(rust_2018_idioms, nonstandard_style, future_incompatible)]

pub mod account;
pub mod acme;
pub mod cert;
pub mod config;
pub mod decision;
mod error;
mod key;
pub mod renew;
pub mod store;


pub use crate::{
    account::Account,
    cert::Certificate,
    config::{Config, Environment},
    error::{Error, Result},
    key::{create_p256_key, AccountKey},
    renew::{Outcome, Renewer},
};

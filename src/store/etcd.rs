use std::{env, fs};

use async_trait::async_trait;
use etcd_client::{Certificate, Client, ConnectOptions, Identity, TlsOptions, Txn, TxnOp};
use eyre::{ensure, WrapErr as _};

use super::{KvStore, Put};

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:2379";

/// Connection settings for etcd.
///
/// Read from the environment by [`EtcdOptions::from_env`]:
///
/// - `ETCD_ENDPOINTS`: comma separated endpoint URLs (default `http://127.0.0.1:2379`);
/// - `ETCD_USERNAME` / `ETCD_PASSWORD`: credentials, both or neither;
/// - `ETCD_CA_CERT`: PEM file of the CA to verify the server with;
/// - `ETCD_CLIENT_CERT` / `ETCD_CLIENT_KEY`: PEM files for client certificate authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtcdOptions {
    pub endpoints: Vec<String>,
    pub credentials: Option<(String, String)>,
    pub ca_cert: Option<String>,
    pub client_identity: Option<(String, String)>,
}

impl EtcdOptions {
    pub fn from_env() -> eyre::Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> eyre::Result<Self> {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mut endpoints = lookup("ETCD_ENDPOINTS")
            .map(|endpoints| {
                endpoints
                    .split(',')
                    .map(str::trim)
                    .filter(|endpoint| !endpoint.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if endpoints.is_empty() {
            endpoints.push(DEFAULT_ENDPOINT.to_owned());
        }

        let credentials = match (lookup("ETCD_USERNAME"), lookup("ETCD_PASSWORD")) {
            (Some(user), Some(password)) => Some((user, password)),
            (None, None) => None,
            _ => eyre::bail!("ETCD_USERNAME and ETCD_PASSWORD must be set together"),
        };

        let client_identity = match (lookup("ETCD_CLIENT_CERT"), lookup("ETCD_CLIENT_KEY")) {
            (Some(cert), Some(key)) => Some((cert, key)),
            (None, None) => None,
            _ => eyre::bail!("ETCD_CLIENT_CERT and ETCD_CLIENT_KEY must be set together"),
        };

        Ok(EtcdOptions {
            endpoints,
            credentials,
            ca_cert: lookup("ETCD_CA_CERT"),
            client_identity,
        })
    }

    fn connect_options(&self) -> eyre::Result<Option<ConnectOptions>> {
        if self.credentials.is_none() && self.ca_cert.is_none() && self.client_identity.is_none()
        {
            return Ok(None);
        }

        let mut options = ConnectOptions::new();

        if let Some((user, password)) = &self.credentials {
            options = options.with_user(user.as_str(), password.as_str());
        }

        if self.ca_cert.is_some() || self.client_identity.is_some() {
            let mut tls = TlsOptions::new();

            if let Some(path) = &self.ca_cert {
                let pem = fs::read(path).wrap_err_with(|| format!("read CA cert {path}"))?;
                tls = tls.ca_certificate(Certificate::from_pem(pem));
            }

            if let Some((cert_path, key_path)) = &self.client_identity {
                let cert = fs::read(cert_path)
                    .wrap_err_with(|| format!("read client cert {cert_path}"))?;
                let key =
                    fs::read(key_path).wrap_err_with(|| format!("read client key {key_path}"))?;
                tls = tls.identity(Identity::from_pem(cert, key));
            }

            options = options.with_tls(tls);
        }

        Ok(Some(options))
    }
}

/// [`KvStore`] backed by an etcd v3 cluster.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    pub async fn connect(options: &EtcdOptions) -> eyre::Result<Self> {
        log::debug!("connecting to etcd at {:?}", options.endpoints);

        let client = Client::connect(&options.endpoints, options.connect_options()?)
            .await
            .wrap_err("connect to etcd")?;

        Ok(EtcdStore { client })
    }
}

#[async_trait]
impl KvStore for EtcdStore {
    async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>> {
        let mut client = self.client.clone();
        let res = client.get(key, None).await?;

        Ok(res.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> eyre::Result<()> {
        let mut client = self.client.clone();
        client.put(key, value, None).await?;
        Ok(())
    }

    async fn commit(&self, puts: Vec<Put>) -> eyre::Result<()> {
        let ops = puts
            .into_iter()
            .map(|put| TxnOp::put(put.key, put.value, None))
            .collect::<Vec<_>>();

        let mut client = self.client.clone();
        let res = client.txn(Txn::new().and_then(ops)).await?;

        ensure!(res.succeeded(), "etcd rejected the transaction");
        Ok(())
    }
}

//! Command line entry point: one check-and-renew pass per invocation.

use acme_etcd::{
    acme::InstantAcmeClient,
    config::{DEFAULT_DIRECTORY, DEFAULT_PORT},
    store::{EtcdOptions, EtcdStore},
    Config, Environment, Error, Renewer,
};
use clap::Parser;

/// Renew an ACME certificate and store it in etcd.
///
/// etcd is reached through ETCD_ENDPOINTS (default http://127.0.0.1:2379) with optional
/// ETCD_USERNAME / ETCD_PASSWORD, ETCD_CA_CERT and ETCD_CLIENT_CERT / ETCD_CLIENT_KEY.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Your email address
    #[arg(short = 'e', long = "email")]
    email: Option<String>,

    /// List of domains to request a certificate for
    #[arg(short = 'd', long = "domains", value_delimiter = ',', required = true)]
    domains: Vec<String>,

    /// Port to listen on for HTTP-01 challenges
    #[arg(short = 'p', long = "port", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory to put certificates and private keys in
    #[arg(long = "directory", default_value = DEFAULT_DIRECTORY)]
    directory: String,

    /// Whether to use Let's Encrypt staging
    #[arg(long = "staging")]
    staging: bool,

    /// Force renewal even if the certificate isn't expired
    #[arg(long = "force-renew")]
    force_renew: bool,

    /// Don't contact Let's Encrypt and create a self-signed certificate
    #[arg(long = "self-signed")]
    self_signed: bool,
}

impl Cli {
    fn into_config(self) -> acme_etcd::Result<Config> {
        let environment = if self.staging {
            Environment::Staging
        } else {
            Environment::Production
        };

        Ok(Config::new(self.domains)?
            .with_email(self.email)
            .with_port(self.port)
            .with_directory(&self.directory)
            .with_environment(environment)
            .with_force_renew(self.force_renew)
            .with_self_signed(self.self_signed))
    }
}

#[actix_web::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Cli::parse().into_config()?;

    log::info!("Connecting to etcd...");
    let etcd = EtcdOptions::from_env().map_err(Error::StoreConnect)?;
    let store = EtcdStore::connect(&etcd)
        .await
        .map_err(Error::StoreConnect)?;
    log::info!("Connected.");

    let acme = InstantAcmeClient::new(config.environment().directory_url());

    Renewer::new(config, store, acme).run().await?;

    Ok(())
}

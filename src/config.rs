use crate::error::{Error, Result};

/// Key prefix certificates and private keys are stored under unless configured otherwise.
pub const DEFAULT_DIRECTORY: &str = "/letsencrypt-with-etcd/";

/// Default port for the HTTP-01 challenge responder.
pub const DEFAULT_PORT: u16 = 8080;

const LETSENCRYPT_URL: &str = "https://acme-v02.api.letsencrypt.org/directory";
const LETSENCRYPT_STAGING_URL: &str = "https://acme-staging-v02.api.letsencrypt.org/directory";

/// Let's Encrypt environment to request certificates from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    /// The main Let's Encrypt directory.
    #[default]
    Production,

    /// The staging Let's Encrypt directory.
    ///
    /// Use for testing and development. Doesn't issue "valid" certificates.
    Staging,
}

impl Environment {
    pub fn directory_url(&self) -> &'static str {
        match self {
            Environment::Production => LETSENCRYPT_URL,
            Environment::Staging => LETSENCRYPT_STAGING_URL,
        }
    }

    /// Store key of the account for this environment.
    ///
    /// Accounts are shared by every certificate directory.
    pub fn account_key(&self) -> &'static str {
        match self {
            Environment::Production => "/letsencrypt-with-etcd/production-account",
            Environment::Staging => "/letsencrypt-with-etcd/staging-account",
        }
    }
}

/// Settings for one renewal run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    email: Option<String>,
    domains: Vec<String>,
    port: u16,
    directory: String,
    environment: Environment,
    force_renew: bool,
    self_signed: bool,
}

impl Config {
    /// Validates and normalises settings for `domains` with everything else at its default.
    ///
    /// Blank domains are dropped; at least one must remain. The first one is the primary domain.
    pub fn new(domains: impl IntoIterator<Item = impl Into<String>>) -> Result<Self> {
        let domains = domains
            .into_iter()
            .map(Into::into)
            .map(|domain: String| domain.trim().to_owned())
            .filter(|domain| !domain.is_empty())
            .collect::<Vec<_>>();

        if domains.is_empty() {
            return Err(Error::Config(
                "at least one domain is required (--domains)".to_owned(),
            ));
        }

        Ok(Config {
            email: None,
            domains,
            port: DEFAULT_PORT,
            directory: DEFAULT_DIRECTORY.to_owned(),
            environment: Environment::default(),
            force_renew: false,
            self_signed: false,
        })
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email
            .map(|email| email.trim().to_owned())
            .filter(|email| !email.is_empty());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the key prefix, normalised to end in exactly one `/`.
    pub fn with_directory(mut self, directory: &str) -> Self {
        self.directory = format!("{}/", directory.trim_end_matches('/'));
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_force_renew(mut self, force_renew: bool) -> Self {
        self.force_renew = force_renew;
        self
    }

    pub fn with_self_signed(mut self, self_signed: bool) -> Self {
        self.self_signed = self_signed;
        self
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// The first domain: Common Name of the certificate and namespace of its store keys.
    pub fn primary_domain(&self) -> &str {
        &self.domains[0]
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn force_renew(&self) -> bool {
        self.force_renew
    }

    pub fn self_signed(&self) -> bool {
        self.self_signed
    }

    pub fn account_key(&self) -> &'static str {
        self.environment.account_key()
    }

    pub fn full_chain_key(&self) -> String {
        format!("{}{}-fullchain.pem", self.directory, self.primary_domain())
    }

    pub fn private_key_key(&self) -> String {
        format!("{}{}-key.pem", self.directory, self.primary_domain())
    }
}

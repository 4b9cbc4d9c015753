use std::{collections::HashMap, io, net::SocketAddr};

use actix_web::{dev::ServerHandle, http::header::ContentType, web, App, HttpResponse, HttpServer};
use parking_lot::RwLock;

use super::ChallengeResponder;

/// Key authorizations currently being served, by token.
#[derive(Debug, Default)]
pub struct ChallengeTokens {
    tokens: RwLock<HashMap<String, String>>,
}

impl ChallengeTokens {
    pub fn get(&self, token: &str) -> Option<String> {
        self.tokens.read().get(token).cloned()
    }

    pub fn insert(&self, token: impl Into<String>, key_authorization: impl Into<String>) {
        self.tokens
            .write()
            .insert(token.into(), key_authorization.into());
    }

    pub fn remove(&self, token: &str) {
        self.tokens.write().remove(token);
    }
}

async fn key_authorization(
    tokens: web::Data<ChallengeTokens>,
    token: web::Path<String>,
) -> HttpResponse {
    match tokens.get(&token) {
        Some(key_authorization) => HttpResponse::Ok()
            .content_type(ContentType::plaintext())
            .body(key_authorization),
        None => HttpResponse::NotFound().finish(),
    }
}

/// Temporary HTTP server answering `/.well-known/acme-challenge/{token}`.
///
/// Must be created from within an Actix runtime. The server stops when [`stop`](Self::stop) is
/// awaited or, without waiting, when the responder is dropped.
pub struct Http01Responder {
    tokens: web::Data<ChallengeTokens>,
    addrs: Vec<SocketAddr>,
    handle: ServerHandle,
}

impl Http01Responder {
    /// Starts listening on all interfaces at `port`.
    ///
    /// Binds the IPv6 wildcard address, which also accepts IPv4 connections on dual-stack hosts.
    /// Falls back to IPv4 only when IPv6 is unavailable.
    pub fn bind(port: u16) -> io::Result<Self> {
        let tokens = web::Data::new(ChallengeTokens::default());

        let server = || {
            let tokens = tokens.clone();

            HttpServer::new(move || {
                App::new().app_data(tokens.clone()).route(
                    "/.well-known/acme-challenge/{token}",
                    web::get().to(key_authorization),
                )
            })
            .workers(1)
            .disable_signals()
            .shutdown_timeout(0)
        };

        let srv = match server().bind(("::", port)) {
            Ok(srv) => srv,
            Err(err) if err.kind() != io::ErrorKind::AddrInUse => {
                log::debug!("IPv6 unavailable, listening on IPv4 only: {err}");
                server().bind(("0.0.0.0", port))?
            }
            Err(err) => return Err(err),
        };

        let addrs = srv.addrs();

        let srv = srv.run();
        let handle = srv.handle();
        actix_web::rt::spawn(srv);

        log::debug!("HTTP-01 responder listening on {addrs:?}");

        Ok(Http01Responder {
            tokens,
            addrs,
            handle,
        })
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.addrs
    }

    pub fn tokens(&self) -> &ChallengeTokens {
        &self.tokens
    }

    /// Stops the server and waits until it has shut down.
    pub async fn stop(&self) {
        self.handle.stop(false).await;
    }
}

impl ChallengeResponder for Http01Responder {
    fn present(&self, token: &str, key_authorization: &str) {
        log::debug!("presenting HTTP-01 token {token}");
        self.tokens.insert(token, key_authorization);
    }

    fn clean_up(&self, token: &str) {
        self.tokens.remove(token);
    }
}

impl Drop for Http01Responder {
    fn drop(&mut self) {
        drop(self.handle.stop(false));
    }
}

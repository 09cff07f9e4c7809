//! TLS termination.
//!
//! Loads a PEM certificate chain and private key into a rustls server
//! configuration (TLS 1.3 only) and runs the accept loop that hands each
//! decrypted connection to hyper with the axum router as the service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use axum::Router;
use hyper::body::Incoming;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tower::Service;
use tracing::{debug, info, warn};

/// Build a rustls server configuration from PEM files.
pub fn load_server_config(cert_file: &str, key_file: &str) -> anyhow::Result<Arc<ServerConfig>> {
    let certs = CertificateDer::pem_file_iter(cert_file)
        .map_err(|e| anyhow!("reading certificate file {cert_file}: {e:?}"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| anyhow!("parsing certificate file {cert_file}: {e:?}"))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificates found in {cert_file}"));
    }

    let key = PrivateKeyDer::from_pem_file(key_file)
        .map_err(|e| anyhow!("reading private key file {key_file}: {e:?}"))?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13])
        .context("configuring TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("certificate and private key do not match")?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}

/// Serve `app` over TLS until `shutdown` resolves, then wait up to `grace`
/// for open connections before aborting them.
pub async fn serve_tls(
    listener: TcpListener,
    tls_config: Arc<ServerConfig>,
    app: Router,
    shutdown: impl Future<Output = ()>,
    grace: Duration,
) -> anyhow::Result<()> {
    let acceptor = TlsAcceptor::from(tls_config);
    let mut connections = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = &mut shutdown => break,
        };

        let acceptor = acceptor.clone();
        let router = app.clone();
        connections.spawn(async move {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    debug!("TLS handshake with {} failed: {}", peer, e);
                    return;
                }
            };

            let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                router.clone().call(req)
            });
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection_with_upgrades(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection with {} ended with error: {}", peer, e);
            }
        });

        // Reap finished connections.
        while connections.try_join_next().is_some() {}
    }

    info!("Stopped accepting; draining {} connections", connections.len());
    let drained = tokio::time::timeout(grace, async {
        while connections.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        warn!("Shutdown timeout elapsed, aborting {} connections", connections.len());
        connections.abort_all();
    }

    Ok(())
}

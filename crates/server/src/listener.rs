use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};
use axum::response::Redirect;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tracing::{error, info, warn};

use northwind_core::config::ServerConfig;

async fn resolve(bind_address: &str, port: u16) -> io::Result<SocketAddr> {
    tokio::net::lookup_host((bind_address, port)).await?.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("`{bind_address}:{port}` did not resolve to an address"),
        )
    })
}

/// Serves `app` until Ctrl-C. The app listens on the HTTPS port and the HTTP
/// port only redirects. Bootstrap only lets development run without TLS, in
/// which case the app is served on the HTTP port.
pub async fn serve(app: Router, config: &ServerConfig) -> io::Result<()> {
    let grace = Duration::from_secs(config.graceful_shutdown_secs);
    let http_address = resolve(&config.bind_address, config.http_port).await?;

    let Some(tls) = &config.tls else {
        warn!(
            event_name = "system.server.tls_disabled",
            correlation_id = "bootstrap",
            bind_address = %http_address,
            "development without TLS; serving plain HTTP without redirection"
        );
        let handle = Handle::new();
        tokio::spawn(shutdown_on_ctrl_c(vec![handle.clone()], grace));
        info!(
            event_name = "system.server.listening",
            correlation_id = "bootstrap",
            scheme = "http",
            bind_address = %http_address,
            "listener started"
        );
        return axum_server::bind(http_address).handle(handle).serve(app.into_make_service()).await;
    };

    let https_address = resolve(&config.bind_address, config.https_port).await?;
    let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;

    let https_handle = Handle::new();
    let redirect_handle = Handle::new();
    tokio::spawn(shutdown_on_ctrl_c(vec![https_handle.clone(), redirect_handle.clone()], grace));

    info!(
        event_name = "system.server.listening",
        correlation_id = "bootstrap",
        scheme = "https",
        bind_address = %https_address,
        redirect_from = %http_address,
        "listeners started"
    );

    let https = axum_server::bind_rustls(https_address, rustls)
        .handle(https_handle)
        .serve(app.into_make_service());
    let redirect = axum_server::bind(http_address)
        .handle(redirect_handle)
        .serve(redirect_router(config.https_port).into_make_service());

    tokio::try_join!(https, redirect)?;
    Ok(())
}

async fn shutdown_on_ctrl_c(handles: Vec<Handle>, grace: Duration) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for shutdown signal"
        );
        return;
    }

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "shutdown signal received; draining connections"
    );
    for handle in handles {
        handle.graceful_shutdown(Some(grace));
    }
}

fn redirect_router(https_port: u16) -> Router {
    Router::new().fallback(redirect_to_https).with_state(https_port)
}

async fn redirect_to_https(
    State(https_port): State<u16>,
    headers: HeaderMap,
    uri: Uri,
) -> Redirect {
    let host = headers.get(HOST).and_then(|value| value.to_str().ok()).unwrap_or("localhost");
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Redirect::temporary(&https_location(host, https_port, path))
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return host.find(']').map_or(host, |end| &host[..=end]);
    }
    host.split(':').next().unwrap_or(host)
}

fn https_location(host: &str, https_port: u16, path: &str) -> String {
    let host = strip_port(host);
    if https_port == 443 {
        format!("https://{host}{path}")
    } else {
        format!("https://{host}:{https_port}{path}")
    }
}

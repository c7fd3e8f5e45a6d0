use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{error, info, warn};

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use http::{Method, header::CONTENT_TYPE};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing_subscriber::EnvFilter;

use anyhow::anyhow;

use gemini_live_gateway::{ServerConfig, config::TlsConfig, routes, state::AppState};

/// How long TLS connections get to finish after shutdown begins.
const TLS_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Gemini Live Gateway - screen-sharing relay to Gemini Live
#[derive(Parser, Debug)]
#[command(name = "gemini-live-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Must happen before any TLS connection, upstream included
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!(path = %config_path.display(), "Loading configuration");
        ServerConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ServerConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    if let Err(e) = config.get_api_key() {
        error!("{e}");
        anyhow::bail!(e);
    }

    let address = config.address();
    let tls_config = config.tls.clone();
    let unix_socket_path = config.unix_socket_path.clone();
    let unix_socket_mode = config.unix_socket_mode;
    let cors_layer = build_cors_layer(config.cors_allowed_origins.as_deref());

    if !config.static_dir.join("index.html").is_file() {
        warn!(
            static_dir = %config.static_dir.display(),
            "No index.html in static directory; the web client will not be served"
        );
    }

    let app_state = AppState::new(config).map_err(|e| anyhow!(e))?;
    let shutdown = app_state.shutdown.clone();

    // Security headers
    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_CONTENT_TYPE_OPTIONS,
            http::HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            http::header::X_FRAME_OPTIONS,
            http::HeaderValue::from_static("DENY"),
        ));

    let app = routes::create_router(app_state)
        .layer(cors_layer)
        .layer(security_headers);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    tokio::spawn(cancel_on_ctrl_c(shutdown.clone()));

    let tcp = async {
        let result = serve_tcp(socket_addr, tls_config, app.clone(), shutdown.clone()).await;
        if result.is_err() {
            shutdown.cancel();
        }
        result
    };

    let unix = async {
        let Some(path) = unix_socket_path else {
            return Ok(());
        };
        let result = serve_unix(path, unix_socket_mode, app.clone(), shutdown.clone()).await;
        if result.is_err() {
            shutdown.cancel();
        }
        result
    };

    let (tcp_result, unix_result) = tokio::join!(tcp, unix);
    tcp_result?;
    unix_result?;

    info!("Server stopped");
    Ok(())
}

/// Cancel the root token on Ctrl-C; every session and listener follows it.
async fn cancel_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl-C received, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl-C, shutting down"),
    }
    shutdown.cancel();
}

fn build_cors_layer(origins: Option<&str>) -> CorsLayer {
    match origins {
        Some("*") => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([CONTENT_TYPE])
            .allow_credentials(false),
        Some(origins) => {
            // Parse comma-separated origins
            let origins: Vec<_> = origins
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(true)
        }
        None => {
            info!(
                "CORS not configured, defaulting to same-origin only. \
                 Set CORS_ALLOWED_ORIGINS to enable cross-origin access."
            );
            CorsLayer::new()
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers([CONTENT_TYPE])
                .allow_credentials(false)
        }
    }
}

async fn serve_tcp(
    socket_addr: SocketAddr,
    tls: Option<TlsConfig>,
    app: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    if let Some(tls) = tls {
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown.cancelled().await;
            shutdown_handle.graceful_shutdown(Some(TLS_SHUTDOWN_GRACE));
        });

        info!(address = %socket_addr, "Server listening on https (TLS enabled)");

        axum_server::bind_rustls(socket_addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        let listener = TcpListener::bind(&socket_addr)
            .await
            .map_err(|e| anyhow!("Failed to bind {}: {}", socket_addr, e))?;

        info!(address = %socket_addr, "Server listening on http");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    }

    Ok(())
}

#[cfg(unix)]
async fn serve_unix(
    path: PathBuf,
    mode: u32,
    app: Router,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::net::UnixListener;

    if path.exists() {
        info!(path = %path.display(), "Removing stale Unix socket");
        std::fs::remove_file(&path)
            .map_err(|e| anyhow!("Failed to remove stale socket {}: {}", path.display(), e))?;
    }

    let listener = UnixListener::bind(&path)
        .map_err(|e| anyhow!("Failed to bind Unix socket {}: {}", path.display(), e))?;
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
        .map_err(|e| anyhow!("Failed to set permissions on {}: {}", path.display(), e))?;

    info!(path = %path.display(), mode = %format!("{mode:o}"), "Server listening on Unix socket");

    let served = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await;

    if let Err(e) = std::fs::remove_file(&path) {
        warn!(path = %path.display(), error = %e, "Failed to remove Unix socket");
    }

    served.map_err(Into::into)
}

#[cfg(not(unix))]
async fn serve_unix(
    path: PathBuf,
    _mode: u32,
    _app: Router,
    _shutdown: CancellationToken,
) -> anyhow::Result<()> {
    warn!(path = %path.display(), "Unix sockets are not supported on this platform");
    Ok(())
}

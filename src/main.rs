//! SharePoint Governance - governance backend for Microsoft 365 site collections
//!
//! Serves the site inventory, audit trail, storage analytics and retention
//! exclusion workflows over a JSON API, optionally together with the built
//! dashboard.

use std::env;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

use config::LogFormat;
use sp_governance::{api, config, db, middleware, services::AuthService, AppConfig, AppState};

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_help();
        return Ok(());
    }

    if args.iter().any(|arg| arg == "--version" || arg == "-V") {
        println!("SharePoint Governance {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Some(pos) = args.iter().position(|arg| arg == "--init-config") {
        let path = args
            .get(pos + 1)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config.yaml"));
        AppConfig::create_default_config(&path)
            .with_context(|| format!("Failed to write configuration to {:?}", path))?;
        println!("Wrote default configuration to {:?}", path);
        return Ok(());
    }

    // Load configuration first (before logging, so we know log format)
    let config = AppConfig::load().context("Failed to load configuration")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()
        .context("Failed to build async runtime")?;

    runtime.block_on(run(config))
}

async fn run(config: AppConfig) -> Result<()> {
    // The guard must outlive the server so buffered file output is flushed
    let _log_guard = init_logging(&config);

    info!("SharePoint Governance starting up");
    info!("Configuration loaded successfully");

    ensure_data_directory(&config)?;

    info!("Initializing database connection");
    let db = db::init_pool(&config.database)
        .await
        .context("Failed to initialize database")?;

    if let Some(ref bootstrap) = config.auth.bootstrap_admin {
        AuthService::new(db.clone())
            .ensure_bootstrap_admin(bootstrap)
            .await
            .context("Failed to create bootstrap administrator")?;
    } else if AuthService::new(db.clone()).count_users().await? == 0 {
        warn!("No users exist and no bootstrap administrator is configured");
    }

    let state = AppState {
        config: config.clone(),
        db,
    };

    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address configuration")?;

    if let Some(ref tls_config) = config.server.tls {
        info!("Starting HTTPS server on https://{}", addr);
        info!("TLS certificate: {:?}", tls_config.cert_file);

        let rustls_config = create_rustls_config(tls_config)?;
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("Failed to bind to address")?;

        info!("HTTPS server is ready to accept connections");

        axum_server::from_tcp_rustls(listener.into_std()?, rustls_config)?
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .context("HTTPS server error")?;
    } else {
        info!("Starting HTTP server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("Failed to bind to address")?;

        info!("HTTP server is ready to accept connections");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Build the rustls server configuration from the PEM files
fn create_rustls_config(
    tls_config: &config::TlsConfig,
) -> Result<axum_server::tls_rustls::RustlsConfig> {
    use axum_server::tls_rustls::RustlsConfig;
    use rustls::crypto::aws_lc_rs::default_provider;
    use rustls::ServerConfig;

    let cert_file = std::fs::File::open(&tls_config.cert_file)
        .with_context(|| format!("Failed to open certificate file: {:?}", tls_config.cert_file))?;
    let mut cert_reader = BufReader::new(cert_file);
    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_reader)
        .filter_map(|r| r.ok())
        .collect();

    if certs.is_empty() {
        anyhow::bail!("No certificates found in {:?}", tls_config.cert_file);
    }

    let key_file = std::fs::File::open(&tls_config.key_file)
        .with_context(|| format!("Failed to open key file: {:?}", tls_config.key_file))?;
    let mut key_reader = BufReader::new(key_file);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .with_context(|| format!("Failed to read private key: {:?}", tls_config.key_file))?
        .ok_or_else(|| anyhow::anyhow!("No private key found in {:?}", tls_config.key_file))?;

    let versions: Vec<&'static rustls::SupportedProtocolVersion> =
        match tls_config.min_version.as_str() {
            "1.3" => vec![&rustls::version::TLS13],
            _ => vec![&rustls::version::TLS12, &rustls::version::TLS13],
        };
    info!("TLS minimum version: {}", tls_config.min_version);

    let mut server_config = ServerConfig::builder_with_provider(default_provider().into())
        .with_protocol_versions(&versions)
        .context("Failed to set TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("Failed to build TLS server config")?;

    server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}

/// Initialize the logging/tracing infrastructure
fn init_logging(config: &AppConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use config::LogTarget;
    use tracing_subscriber::{prelude::*, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let log_config = &config.logging;
    let subscriber = tracing_subscriber::registry().with(env_filter);

    match log_config.target {
        LogTarget::Console => {
            init_console_logging(subscriber, &log_config.format);
            None
        }
        LogTarget::File => {
            let (writer, guard) = create_file_writer(log_config);
            init_file_logging(subscriber, &log_config.format, writer);
            Some(guard)
        }
        LogTarget::Both => {
            let (writer, guard) = create_file_writer(log_config);
            init_console_logging_with_file(subscriber, &log_config.format, writer);
            Some(guard)
        }
    }
}

/// Rolling file writer honouring rotation and retention settings
fn create_file_writer(
    log_config: &config::LoggingConfig,
) -> (
    tracing_appender::non_blocking::NonBlocking,
    tracing_appender::non_blocking::WorkerGuard,
) {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};

    if let Err(e) = std::fs::create_dir_all(&log_config.log_dir) {
        eprintln!(
            "Warning: Failed to create log directory {:?}: {}",
            log_config.log_dir, e
        );
    }

    let rotation = if log_config.daily_rotation {
        Rotation::DAILY
    } else {
        Rotation::NEVER
    };
    let mut builder = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&log_config.log_prefix)
        .filename_suffix("log");
    if log_config.max_log_files > 0 {
        builder = builder.max_log_files(log_config.max_log_files);
    }

    let file_appender = match builder.build(&log_config.log_dir) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Warning: Failed to configure log rotation: {}", e);
            tracing_appender::rolling::never(&log_config.log_dir, &log_config.log_prefix)
        }
    };

    tracing_appender::non_blocking(file_appender)
}

fn init_console_logging<S>(subscriber: S, format: &LogFormat)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true))
            .init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false))
            .init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init(),
    }
}

fn init_file_logging<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .init(),
        LogFormat::Compact => subscriber
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
        LogFormat::Pretty => subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
    }
}

fn init_console_logging_with_file<S>(
    subscriber: S,
    format: &LogFormat,
    writer: tracing_appender::non_blocking::NonBlocking,
) where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> + Send + Sync,
{
    use tracing_subscriber::{fmt, prelude::*};

    match format {
        LogFormat::Json => subscriber
            .with(fmt::layer().json().with_target(true))
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .init(),
        LogFormat::Compact => subscriber
            .with(fmt::layer().compact().with_target(false))
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
        LogFormat::Pretty => subscriber
            .with(fmt::layer().with_target(true))
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(false)
                    .with_writer(writer),
            )
            .init(),
    }
}

/// Create the directory holding the SQLite file
fn ensure_data_directory(config: &AppConfig) -> Result<()> {
    if let Some(path) = config.database.url.strip_prefix("sqlite://") {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create data directory")?;
                info!("Created data directory: {:?}", parent);
            }
        }
    }
    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState, config: &AppConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let api_rate_limit = middleware::RateLimitState::new(middleware::api_rate_limit_config());
    let auth_rate_limit = middleware::RateLimitState::new(middleware::auth_rate_limit_config());
    middleware::spawn_rate_limit_cleanup(vec![api_rate_limit.clone(), auth_rate_limit.clone()]);

    // Authentication is applied per router so that login and health stay public
    let protected = |routes: Router<AppState>| {
        routes
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                middleware::auth_middleware,
            ))
            .layer(axum::middleware::from_fn_with_state(
                api_rate_limit.clone(),
                middleware::rate_limit_middleware,
            ))
    };

    let api_router = Router::new()
        .nest(
            "/api/v1",
            api::public_routes().layer(axum::middleware::from_fn_with_state(
                auth_rate_limit,
                middleware::rate_limit_middleware,
            )),
        )
        .nest("/api/v1", protected(api::protected_routes()))
        .nest("/api/v2", protected(api::v2_routes()))
        .layer(axum::middleware::from_fn(
            middleware::api_cache_control_middleware,
        ))
        .with_state(state.clone());

    let router = match (config.server.serve_frontend, &config.server.static_dir) {
        (true, Some(static_dir)) if static_dir.exists() => {
            info!("Serving dashboard from {:?}", static_dir);
            let index_file = static_dir.join("index.html");
            if index_file.exists() {
                api_router.fallback_service(
                    ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file)),
                )
            } else {
                warn!("index.html not found in {:?}, SPA fallback disabled", static_dir);
                api_router.fallback_service(ServeDir::new(static_dir))
            }
        }
        (true, Some(static_dir)) => {
            warn!("Static directory {:?} does not exist, dashboard not served", static_dir);
            api_router
        }
        (true, None) => {
            info!("No static directory configured, dashboard not served");
            api_router
        }
        (false, _) => {
            info!("Dashboard serving disabled by configuration");
            api_router
        }
    };

    let router = match config.server.request_timeout_secs {
        Some(secs) if secs > 0 => router.layer(TimeoutLayer::new(Duration::from_secs(secs))),
        _ => router,
    };

    router
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(CompressionLayer::new())
        .layer(trace_layer)
        .layer(cors)
}

fn print_help() {
    println!(
        r#"SharePoint Governance {}

USAGE:
    sp-governance [OPTIONS]

OPTIONS:
    -h, --help              Print this help message
    -V, --version           Print version information
    --init-config [PATH]    Write a configuration file with default values
                            (default: config.yaml) and exit

ENVIRONMENT:
    SPGOV_CONFIG            Path to configuration file
    DATABASE_URL            SQLite connection URL
    JWT_SECRET              Token signing secret (at least 32 characters)
    SPGOV_ADMIN_PASSWORD    Password of the administrator created on first start
    SPGOV_HOST, SPGOV_PORT  Listen address
    SPGOV_LOG_FORMAT        pretty, compact or json
    SPGOV_LOG_TARGET        console, file or both
    SPGOV_TLS_CERT, SPGOV_TLS_KEY
                            Serve HTTPS with the given PEM files

CONFIGURATION:
    The application looks for configuration files in the following order:
    1. Path specified by SPGOV_CONFIG environment variable
    2. ./config.yaml
    3. ./config/config.yaml
    4. /etc/sp-governance/config.yaml"#,
        env!("CARGO_PKG_VERSION")
    );
}

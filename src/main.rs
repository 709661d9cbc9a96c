//! Brigade GitHub Gateway - main entry point.
//!
//! Runs the HTTP server that accepts GitHub webhooks, schedules builds, and
//! (optionally) reports worker-pod failures back to GitHub.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brigade_gateway::reporter::BuildReporter;
use brigade_gateway::server::{AppState, build_router};
use brigade_gateway::store::{BuildStore, InMemoryBuildStore};
use brigade_gateway::types::AppId;
use brigade_gateway::webhooks::{
    AuthorAllowlist, DEFAULT_ALLOWED_AUTHORS, EmissionFilter, GatewayOptions, HookHandler,
};

/// Gateway configuration, loaded from environment variables.
struct Config {
    /// TCP port the gateway listens on.
    gateway_port: u16,

    /// Path to the App's PEM-encoded RSA private key. Required.
    key_file: PathBuf,

    /// Optional JSON file seeding the in-memory project store.
    projects_file: Option<PathBuf>,

    /// Kubernetes namespace the worker pods run in.
    namespace: String,

    /// Author associations allowed to build from forks.
    allowed_authors: Vec<String>,

    /// Emission patterns for build types.
    emitted_events: Vec<String>,

    /// Number of reporter worker tasks.
    threadiness: usize,

    options: GatewayOptions,
}

impl Config {
    /// Loads configuration from environment variables with defaults.
    fn from_env() -> Self {
        let gateway_port = env_or("BRIGADE_GATEWAY_PORT", 7746);

        let key_file = std::env::var("KEY_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/etc/brigade-gateway/key.pem"));

        let projects_file = std::env::var("PROJECTS_FILE").ok().map(PathBuf::from);

        let namespace =
            std::env::var("BRIGADE_NAMESPACE").unwrap_or_else(|_| "default".to_string());

        let allowed_authors = std::env::var("BRIGADE_AUTHORS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_ascii_uppercase())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| {
                DEFAULT_ALLOWED_AUTHORS
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });

        let emitted_events = std::env::var("BRIGADE_EVENTS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(|_| vec!["*".to_string()]);

        let options = GatewayOptions {
            app_id: AppId(env_or("APP_ID", 0u64)),
            check_suite_on_pr: env_or("CHECK_SUITE_ON_PR", true),
            check_suite_short_circuit: env_or("CHECK_SUITE_SHORT_CIRCUIT", false),
            default_shared_secret: std::env::var("DEFAULT_SHARED_SECRET").unwrap_or_default(),
            report_build_failures: env_or("REPORT_BUILD_FAILURES", false),
        };

        Config {
            gateway_port,
            key_file,
            projects_file,
            namespace,
            allowed_authors,
            emitted_events,
            threadiness: env_or("REPORTER_THREADINESS", 1usize),
            options,
        }
    }
}

/// Reads an environment variable, falling back to a default when unset or
/// unparseable.
fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brigade_gateway=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    let key_pem = match std::fs::read(&config.key_file) {
        Ok(key) => key,
        Err(err) => {
            tracing::error!(
                key_file = %config.key_file.display(),
                error = %err,
                "could not load App private key"
            );
            std::process::exit(1);
        }
    };

    tracing::info!(
        app_id = %config.options.app_id,
        namespace = %config.namespace,
        "Starting brigade gateway"
    );
    tracing::info!(
        roles = %config.allowed_authors.join(" | "),
        "Forked PRs will be built for these roles"
    );

    let store: Arc<InMemoryBuildStore> = match &config.projects_file {
        Some(path) => match InMemoryBuildStore::from_projects_file(path) {
            Ok(store) => Arc::new(store),
            Err(err) => {
                tracing::error!(error = %err, "could not load projects");
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("PROJECTS_FILE not set, starting with no registered projects");
            Arc::new(InMemoryBuildStore::new())
        }
    };
    let store: Arc<dyn BuildStore> = store;

    let shutdown = CancellationToken::new();

    let mut handler = HookHandler::new(Arc::clone(&store), key_pem, config.options.clone())
        .with_allowed_authors(AuthorAllowlist::new(config.allowed_authors.clone()))
        .with_filter(EmissionFilter::new(config.emitted_events.clone()));

    if config.options.report_build_failures {
        let reporter = Arc::new(BuildReporter::new(Arc::clone(&store), &config.namespace));
        handler = handler.with_reporter(Arc::clone(&reporter));
        tokio::spawn(Arc::clone(&reporter).run(config.threadiness, shutdown.clone()));
    }

    let app_state = AppState::new(Arc::new(handler));
    let app = build_router(app_state);

    let listen_addr = SocketAddr::from(([0, 0, 0, 0], config.gateway_port));
    tracing::info!("Listening on {listen_addr}");

    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .expect("Failed to bind to address");

    let serve_shutdown = shutdown.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        serve_shutdown.cancelled().await;
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    server.await.expect("Server failed");
}

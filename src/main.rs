use anyhow::Context;
use clap::Parser;
use squawk::application::{CdrEnricher, CdrProcessor, CleanupWorker};
use squawk::config::Config;
use squawk::domain::cdr::CdrRepository;
use squawk::domain::extension::ExtensionRepository;
use squawk::domain::queue::QueueRepository;
use squawk::infrastructure::cache::CacheManager;
use squawk::infrastructure::persistence::{
    create_pool, run_migrations, PgCdrRepository, PgExtensionRepository, PgQueueRepository,
};
use squawk::interface::api::{build_router, AppState};
use squawk::interface::xmlcurl::{ConfigurationHandler, DialplanHandler, DirectoryHandler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Window for the HTTP server and workers to drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "squawk", about = "FreeSWITCH provisioning and CDR service", version)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    info!("starting squawk, loading configuration from {}", cli.config);

    let config = Config::load(&cli.config).context("load configuration")?;

    // Database
    let pool = create_pool(&config.database)
        .await
        .context("connect to database")?;
    run_migrations(&pool).await.context("run migrations")?;

    // Repositories
    let extensions: Arc<dyn ExtensionRepository> =
        Arc::new(PgExtensionRepository::new(pool.clone()));
    let queues: Arc<dyn QueueRepository> = Arc::new(PgQueueRepository::new(pool.clone()));
    let cdrs: Arc<dyn CdrRepository> = Arc::new(PgCdrRepository::new(pool.clone()));

    // Directory cache + softswitch responders
    let cache = Arc::new(CacheManager::new(&config.cache));
    let directory = Arc::new(DirectoryHandler::new(extensions.clone(), cache.clone()));
    let dialplan = Arc::new(DialplanHandler::new(extensions.clone(), queues.clone()));
    let configuration = Arc::new(ConfigurationHandler::new(queues.clone()));

    // Background workers share one shutdown signal; each finishes its
    // in-flight batch before stopping.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let cache_task = tokio::spawn(cache.clone().run(shutdown_rx.clone()));

    let enricher = CdrEnricher::new(queues.clone(), extensions.clone());
    let processor = CdrProcessor::new(pool.clone(), enricher, &config.cdr);
    let processor_task = tokio::spawn(processor.run(shutdown_rx.clone()));

    let janitor = CleanupWorker::new(cdrs.clone(), &config.cdr);
    let janitor_task = tokio::spawn(janitor.run(shutdown_rx.clone()));

    // HTTP server
    let state = AppState {
        extensions,
        queues,
        cdrs,
        cache,
        directory,
        dialplan,
        configuration,
        auth: Arc::new(config.auth.clone()),
        pool,
    };
    let app = build_router(state, &config.server, &config.cors);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;
    info!("listening on {}", addr);

    let mut server_shutdown = shutdown_rx.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    tokio::signal::ctrl_c().await.context("wait for signal")?;
    info!("shutdown signal received, draining");

    let _ = shutdown_tx.send(true);

    let drain = async {
        let (server, cache, processor, janitor) =
            tokio::join!(server_task, cache_task, processor_task, janitor_task);
        if let Ok(Err(e)) = server {
            warn!("http server exited with error: {}", e);
        }
        let _ = (cache, processor, janitor);
    };

    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!(
            "graceful shutdown exceeded {}s, forcing exit",
            SHUTDOWN_GRACE.as_secs()
        );
    }

    info!("squawk stopped");
    Ok(())
}

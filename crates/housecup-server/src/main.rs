//! House Cup server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `housecup-config.yaml` (or defaults)
//! 2. Initialize structured logging (tracing)
//! 3. Open the ledger store: `PostgreSQL` with migrations when a database
//!    URL is configured, otherwise in-memory
//! 4. Wire the scoreboard, change feed, hub, and generator
//! 5. Start hub fan-out and the retention sweeper
//! 6. Bind the listener, schedule generator autostart, and serve
//! 7. On Ctrl-C or SIGTERM: stop the generator, drain connections, and
//!    close the database pool

use std::path::Path;
use std::sync::Arc;

use housecup_core::config::{LoggingConfig, StorageConfig};
use housecup_core::retention::spawn_retention_sweeper;
use housecup_core::{ConfigError, HouseCupConfig};
use housecup_db::{
    DbError, LedgerBackend, MemoryLedgerStore, PgLedgerStore, PostgresConfig, PostgresPool,
};
use housecup_server::{AppState, ServerError, build_router, cors_layer};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Config file read from the working directory when present.
const CONFIG_PATH: &str = "housecup-config.yaml";

/// Top-level error for the server binary.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The ledger store could not be opened.
    #[error("store error: {source}")]
    Store {
        /// The underlying database error.
        #[from]
        source: DbError,
    },

    /// The HTTP server failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        host = config.http.host,
        port = config.http.port,
        interval_minutes = config.generator.interval_minutes,
        "housecup-server starting"
    );

    // 3. Open the ledger store.
    let (store, pool) = open_store(&config.storage).await?;
    info!(backend = store.kind(), "Ledger store ready");

    // 4. Wire the core components.
    let state = Arc::new(AppState::new(store, &config));

    // 5. Background tasks.
    let fanout = state.start_fanout();
    let sweeper = config.retention.enabled.then(|| {
        spawn_retention_sweeper(
            state.scoreboard.clone(),
            config.retention.max_age(),
            config.retention.sweep_interval(),
        )
    });

    // 6. Serve.
    let listener = housecup_server::bind(&config.http).await?;
    if config.generator.autostart {
        let state = Arc::clone(&state);
        let delay = config.generator.autostart_delay();
        let period = config.generator.interval();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            state.generator.start(period).await;
        });
    }

    let router = build_router(
        Arc::clone(&state),
        cors_layer(config.http.client_url.as_deref()),
    );
    let shutdown_state = Arc::clone(&state);
    housecup_server::serve(listener, router, async move {
        housecup_server::shutdown_signal().await;
        shutdown_state.generator.stop().await;
    })
    .await?;

    // 7. Tear down background tasks.
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    fanout.abort();
    if let Some(pool) = pool {
        pool.close().await;
    }
    info!("housecup-server exited cleanly");
    Ok(())
}

fn load_config() -> Result<HouseCupConfig, ConfigError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        HouseCupConfig::from_file(path)
    } else {
        let mut config = HouseCupConfig::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Open the configured store. The pool is returned so it can be closed on
/// shutdown.
async fn open_store(
    config: &StorageConfig,
) -> Result<(LedgerBackend, Option<PostgresPool>), DbError> {
    let Some(url) = config.database_url.as_deref() else {
        info!("No database URL configured, using in-memory ledger");
        return Ok((LedgerBackend::Memory(MemoryLedgerStore::new()), None));
    };

    let pool = PostgresPool::connect(
        &PostgresConfig::new(url).with_max_connections(config.max_connections),
    )
    .await?;
    pool.run_migrations().await?;
    let store = LedgerBackend::Postgres(PgLedgerStore::new(pool.pool().clone()));
    Ok((store, Some(pool)))
}

//! procsnap-agent entry point: CLI dispatch, logging setup, state wiring,
//! background tasks, and the HTTP server.

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, signal, time::interval};
use tracing::{debug, error, info, Level};

use procsnap_agent::cache::SnapshotCache;
use procsnap_agent::cli::{Args, Commands, LogLevel};
use procsnap_agent::collector::{Collector, CollectorOptions};
use procsnap_agent::commands;
use procsnap_agent::config::{resolve_config, show_config, validate_effective_config, Config};
use procsnap_agent::handlers;
use procsnap_agent::health_stats::HealthStats;
use procsnap_agent::lookup::{NameLookup, NoopLookup, PsLookup};
use procsnap_agent::procfs::ProcReader;
use procsnap_agent::state::{AppState, SharedState};
use procsnap_agent::system::SystemCpuSampler;

/// Initializes the tracing subscriber with the configured log level.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off | LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Build the collector stack from the effective configuration.
fn build_state(config: Config) -> SharedState {
    let lookup: Box<dyn NameLookup> = if config.enable_name_fallback.unwrap_or(true) {
        Box::new(PsLookup)
    } else {
        Box::new(NoopLookup)
    };
    let collector = Collector::new(
        ProcReader::new(config.proc_root()),
        lookup,
        CollectorOptions {
            cpu_refresh: Duration::from_secs(config.cpu_refresh_secs()),
            cpu_cache_max: config.cpu_cache_max(),
            name_cache_max: config.name_cache_max(),
            max_processes: config.max_processes,
        },
    );
    let cache = SnapshotCache::new(Duration::from_millis(config.freshness_ms()));

    Arc::new(AppState {
        cache,
        collector,
        config: Arc::new(config),
        health_stats: Arc::new(HealthStats::new()),
        cpu_sampler: Arc::new(SystemCpuSampler::new()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Early config resolution for show/check modes.
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;
        if args.check_config {
            validate_effective_config(&config).context("configuration invalid")?;
            println!("Configuration is valid");
            return Ok(());
        }
        return show_config(&config, &args.config_format);
    }

    setup_logging(&args);

    let config = resolve_config(&args)?;
    validate_effective_config(&config).context("configuration invalid")?;

    if let Some(command) = &args.command {
        return match command {
            Commands::Check { proc, all } => commands::command_check(*proc, *all, &config),
            Commands::Config {
                output,
                format,
                commented,
            } => commands::command_config(output.clone(), format, *commented),
            Commands::Test {
                iterations,
                verbose,
            } => commands::command_test(*iterations, *verbose, &config),
        };
    }

    info!("Starting procsnap-agent");

    if let Some(threads) = config.parallelism {
        if threads > 0 {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap_or_else(|e| error!("Failed to set rayon thread pool: {}", e));
            debug!("Rayon thread pool configured with {} threads", threads);
        }
    }

    let bind_addr = config.bind_addr().to_string();
    let port = config.port();
    let enable_health = config.enable_health.unwrap_or(true);
    let freshness = Duration::from_millis(config.freshness_ms());
    let sample_interval = Duration::from_secs(config.sample_interval_secs());
    let state = build_state(config);

    // Warm the snapshot before serving so the first consumer never sees an
    // empty table.
    {
        let warm_state = state.clone();
        let warmed = tokio::task::spawn_blocking(move || {
            warm_state.cache.get_process_data(&warm_state.collector)
        })
        .await?;
        match warmed {
            Ok(snapshot) => info!("Initial collection pass: {} processes", snapshot.len()),
            Err(e) => error!("Initial collection pass failed: {}", e),
        }
    }

    // Background refresh keeps the snapshot inside the freshness window so
    // consumer requests almost never pay for a pass themselves.
    let refresh_state = state.clone();
    let refresh_task = tokio::spawn(async move {
        let mut tick = interval(freshness);
        loop {
            tick.tick().await;
            let state = refresh_state.clone();
            let result =
                tokio::task::spawn_blocking(move || state.cache.get_process_data(&state.collector))
                    .await;
            if let Ok(Err(e)) = result {
                error!("Scheduled collection pass failed: {}", e);
            }
        }
    });

    // Independent system CPU sampler with its own cadence.
    let sampler_state = state.clone();
    let sampler_task = tokio::spawn(async move {
        let mut tick = interval(sample_interval);
        loop {
            tick.tick().await;
            let root = sampler_state.config.proc_root();
            if let Err(e) = sampler_state.cpu_sampler.sample(&root) {
                error!("System CPU sample failed: {}", e);
            }
        }
    });

    // Graceful shutdown on SIGINT/SIGTERM.
    let shutdown_signal = async {
        let ctrl_c = async {
            signal::ctrl_c()
                .await
                .expect("Failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT (Ctrl+C), shutting down gracefully..."),
            _ = terminate => info!("Received SIGTERM, shutting down gracefully..."),
        }
    };

    let mut app = Router::new()
        .route("/processes", get(handlers::processes_handler))
        .route("/processes/{pid}", get(handlers::details_handler))
        .route("/processes/{pid}/terminate", post(handlers::terminate_handler))
        .route("/system", get(handlers::system_handler));
    if enable_health {
        app = app.route("/health", get(handlers::health_handler));
    }
    let app = app.with_state(state.clone());

    let addr: SocketAddr = format!("{}:{}", bind_addr, port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("procsnap-agent listening on http://{}:{}", bind_addr, port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("server error")?;

    refresh_task.abort();
    sampler_task.abort();
    let _ = refresh_task.await;
    let _ = sampler_task.await;

    info!("procsnap-agent stopped gracefully");
    Ok(())
}

//! hubworker - reverse-connecting application worker
//!
//! Dials a load-balancing hub and serves the HTTP/1.1 requests it pushes back
//! down the connection, reconnecting forever.
//!
//! ## Usage
//!
//! ```bash
//! # One worker against the default hub (localhost:4040) running demo:hello
//! hubworker
//!
//! # Eight workers, custom hub, echo app
//! hubworker --connect hub.internal:4040 --workers 8 demo:echo
//!
//! # Watch every reconnect attempt
//! hubworker -v
//! ```
//!
//! Exit codes: `0` clean shutdown, `1` startup error, `2` shutdown grace exceeded.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use hubworker::logging::{self, LogConfig, LogFormat};
use hubworker::{
    AppCatalog, AppRef, BackoffPolicy, DEFAULT_APP, DEFAULT_HUB, DEFAULT_MAX_REQUEST_BODY,
    HubAddress, JitterPolicy, KeepaliveConfig, PoolConfig, StartupError, WorkerPool,
};
use tracing::{error, info};

/// Default connect cooldown cap, as a multiple of the first cooldown, when
/// `--backoff-factor` asks for growth without `--max-cooldown-ms`.
const DEFAULT_GROWTH_CAP: u32 = 8;

/// Reverse-connecting application worker.
///
/// Each worker slot connects to the hub, serves HTTP/1.1 requests on that
/// connection with the selected application and reconnects when it drops.
#[derive(Parser, Debug)]
#[command(name = "hubworker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Application reference (MODULE:SYMBOL)
    #[arg(env = "HUBWORKER_APP", default_value = DEFAULT_APP)]
    app: String,

    /// Hub address
    #[arg(long, value_name = "HOST:PORT", env = "HUBWORKER_CONNECT", default_value = DEFAULT_HUB)]
    connect: String,

    /// Number of worker slots
    #[arg(long, env = "HUBWORKER_WORKERS", default_value_t = 1)]
    workers: usize,

    /// Cooldown after a failed connect, in milliseconds
    #[arg(long, default_value_t = 2000)]
    connect_cooldown_ms: u64,

    /// Cap for the connect cooldown [default: --connect-cooldown-ms, or 8x it when --backoff-factor > 1]
    #[arg(long)]
    max_cooldown_ms: Option<u64>,

    /// Growth factor of the connect cooldown per consecutive failure
    #[arg(long, default_value_t = 1.0)]
    backoff_factor: f64,

    /// Randomization of the connect cooldown: none, full, equal, decorrelated
    #[arg(long, default_value = "none")]
    jitter: JitterPolicy,

    /// Cooldown after every session, in milliseconds
    #[arg(long, default_value_t = 1000)]
    serve_cooldown_ms: u64,

    /// Deadline for one connect attempt in milliseconds (0 = none)
    #[arg(long, default_value_t = 10_000)]
    connect_timeout_ms: u64,

    /// Deadline for one session in milliseconds (0 = none)
    #[arg(long, default_value_t = 0)]
    session_timeout_ms: u64,

    /// TCP keepalive idle time before the first probe, in seconds
    #[arg(long, default_value_t = 1)]
    keepalive_idle_secs: u64,

    /// TCP keepalive interval between probes, in seconds
    #[arg(long, default_value_t = 2)]
    keepalive_interval_secs: u64,

    /// TCP keepalive probes before the hub is declared dead
    #[arg(long, default_value_t = 3)]
    keepalive_probes: u32,

    /// Largest request body passed to the app, in bytes; larger ones get 413
    #[arg(long, default_value_t = DEFAULT_MAX_REQUEST_BODY)]
    max_body_bytes: usize,

    /// How long shutdown waits for slots to stop, in milliseconds
    #[arg(long, default_value_t = 5000)]
    grace_ms: u64,

    /// Enable verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Log format: pretty, compact, json [env: HUBWORKER_LOG_FORMAT]
    #[arg(long)]
    log_format: Option<LogFormat>,

    /// Print the built-in application references and exit
    #[arg(long)]
    list_apps: bool,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let catalog = AppCatalog::builtin();
    if cli.list_apps {
        for reference in catalog.references() {
            println!("{reference}");
        }
        return ExitCode::SUCCESS;
    }

    let mut log = LogConfig::from_verbosity(cli.verbose).with_env_overrides();
    if let Some(format) = cli.log_format {
        log = log.with_format(format);
    }
    if let Err(e) = logging::init(&log) {
        eprintln!("hubworker: {e}");
        return ExitCode::from(1);
    }

    let (pool, app) = match prepare(&cli, &catalog) {
        Ok(ready) => ready,
        Err(e) => {
            error!(label = e.as_label(), error = %e, "startup failed");
            eprintln!("hubworker: {e}");
            return ExitCode::from(1);
        }
    };

    let runtime = match build_runtime() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %format!("{e:#}"), "startup failed");
            eprintln!("hubworker: {e:#}");
            return ExitCode::from(1);
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        hub = %pool.config().hub,
        workers = pool.config().workers,
        app = %cli.app,
        "hubworker starting"
    );

    match runtime.block_on(pool.run(app)) {
        Ok(()) => {
            info!("hubworker stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(label = e.as_label(), error = %e, "shutdown incomplete");
            ExitCode::from(2)
        }
    }
}

/// Turns the command line into a validated pool and the application to serve.
fn prepare(cli: &Cli, catalog: &AppCatalog) -> Result<(WorkerPool, AppRef), StartupError> {
    let hub: HubAddress = cli.connect.parse()?;
    let app = catalog.resolve(&cli.app)?;

    let first = Duration::from_millis(cli.connect_cooldown_ms);
    let default_max = if cli.backoff_factor > 1.0 {
        first.saturating_mul(DEFAULT_GROWTH_CAP)
    } else {
        first
    };
    let connect_backoff = BackoffPolicy {
        first,
        max: cli.max_cooldown_ms.map_or(default_max, Duration::from_millis),
        factor: cli.backoff_factor,
        jitter: cli.jitter,
    };

    let cfg = PoolConfig {
        hub,
        workers: cli.workers,
        keepalive: KeepaliveConfig {
            idle: Duration::from_secs(cli.keepalive_idle_secs),
            interval: Duration::from_secs(cli.keepalive_interval_secs),
            probes: cli.keepalive_probes,
        },
        connect_timeout: Duration::from_millis(cli.connect_timeout_ms),
        connect_backoff,
        serve_cooldown: Duration::from_millis(cli.serve_cooldown_ms),
        session_timeout: Duration::from_millis(cli.session_timeout_ms),
        grace: Duration::from_millis(cli.grace_ms),
        max_request_body: cli.max_body_bytes,
        ..PoolConfig::default()
    };

    Ok((WorkerPool::new(cfg)?, app))
}

fn build_runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("hubworker")
        .build()
        .context("failed to start the tokio runtime")
}

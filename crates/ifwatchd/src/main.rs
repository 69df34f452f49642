// # ifwatchd - Interface Watcher Daemon
//
// Thin integration layer around ifwatch-core. All interface-state logic
// lives in the core crate; this binary only wires it up.
//
// The ifwatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Feeding the event loop from a replay source
// 4. Registering one watcher and printing its events as JSON lines
// 5. Shutting down within a bounded time on SIGTERM/SIGINT
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// - `IFWATCH_INPUT`: Notification file (JSON lines); unset or `-` reads stdin
// - `IFWATCH_QUEUE_CAPACITY`: Unconsumed events tolerated per watcher
// - `IFWATCH_ADDRESS_INTEREST`: Comma list of `valid_until`,
//   `preferred_lifetime_info`, `all`, `none`
// - `IFWATCH_INCLUDE_NON_ASSIGNED`: Also report non-assigned addresses
// - `IFWATCH_SHUTDOWN_TIMEOUT_SECS`: Drain timeout on shutdown (1-300)
// - `IFWATCH_LOG_LEVEL`: trace, debug, info, warn, error
//
// Logs go to stderr; stdout carries only events.
//
// ## Example
//
// ```bash
// export IFWATCH_INPUT=/var/lib/ifwatch/recorded.jsonl
// export IFWATCH_ADDRESS_INTEREST=valid_until
// export IFWATCH_INCLUDE_NON_ASSIGNED=true
//
// ifwatchd
// ```

use anyhow::{Context, Result};
use ifwatch_core::{
    AddressPropertiesInterest, ChangeSource, CloseReason, Error, EventLoop, EventLoopConfig,
    WatcherOptions, WatcherProxy,
};
use ifwatch_source_replay::ReplaySource;
use std::env;
use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum IfwatchExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<IfwatchExitCode> for ExitCode {
    fn from(code: IfwatchExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

/// Application configuration
#[derive(Debug)]
struct Config {
    input: Option<PathBuf>,
    queue_capacity: Option<usize>,
    address_interest: AddressPropertiesInterest,
    include_non_assigned: bool,
    shutdown_timeout_secs: u64,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            input: lookup("IFWATCH_INPUT")
                .filter(|s| !s.is_empty() && s != "-")
                .map(PathBuf::from),
            queue_capacity: lookup("IFWATCH_QUEUE_CAPACITY")
                .map(|s| s.parse::<usize>())
                .transpose()
                .context("IFWATCH_QUEUE_CAPACITY must be a positive integer")?,
            address_interest: lookup("IFWATCH_ADDRESS_INTEREST")
                .map(|s| s.parse::<AddressPropertiesInterest>())
                .transpose()
                .context("IFWATCH_ADDRESS_INTEREST is not valid")?
                .unwrap_or_default(),
            include_non_assigned: lookup("IFWATCH_INCLUDE_NON_ASSIGNED")
                .map(|s| parse_bool(&s))
                .transpose()
                .context("IFWATCH_INCLUDE_NON_ASSIGNED is not valid")?
                .unwrap_or(false),
            shutdown_timeout_secs: lookup("IFWATCH_SHUTDOWN_TIMEOUT_SECS")
                .map(|s| s.parse::<u64>())
                .transpose()
                .context("IFWATCH_SHUTDOWN_TIMEOUT_SECS must be an integer")?
                .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            log_level: lookup("IFWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let Some(ref path) = self.input
            && !path.is_file()
        {
            anyhow::bail!(
                "IFWATCH_INPUT does not name a readable file: {}. \
                Unset it or use '-' to read stdin.",
                path.display()
            );
        }

        if self.queue_capacity == Some(0) {
            anyhow::bail!("IFWATCH_QUEUE_CAPACITY must be at least 1");
        }

        if !(1..=300).contains(&self.shutdown_timeout_secs) {
            anyhow::bail!(
                "IFWATCH_SHUTDOWN_TIMEOUT_SECS must be between 1 and 300 seconds. Got: {}",
                self.shutdown_timeout_secs
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "IFWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    fn event_loop_config(&self) -> EventLoopConfig {
        match self.queue_capacity {
            Some(capacity) => EventLoopConfig::new().with_watcher_queue_capacity(capacity),
            None => EventLoopConfig::new(),
        }
    }

    fn watcher_options(&self) -> WatcherOptions {
        WatcherOptions::new()
            .with_interest(self.address_interest)
            .include_non_assigned(self.include_non_assigned)
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return IfwatchExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return IfwatchExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return IfwatchExitCode::ConfigError.into();
    }

    info!("Starting ifwatchd daemon");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return IfwatchExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            IfwatchExitCode::RuntimeError
        } else {
            IfwatchExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let source = match config.input {
        Some(ref path) => ReplaySource::open(path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?,
        None => ReplaySource::stdin(),
    };
    info!(
        source = source.name(),
        origin = source.origin(),
        interest = %config.address_interest,
        include_non_assigned = config.include_non_assigned,
        "Configuration loaded"
    );

    let (event_loop, interface_state) =
        EventLoop::new(Box::new(source), config.event_loop_config())?;
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut loop_handle = tokio::spawn(event_loop.run_with_shutdown(shutdown_rx));

    let proxy = interface_state.get_watcher(config.watcher_options()).await?;
    let mut printer = tokio::spawn(print_events(proxy, tokio::io::stdout()));

    tokio::select! {
        signal = wait_for_shutdown_signal() => {
            let signal = signal?;
            info!("Received shutdown signal: {}", signal);
        }
        joined = &mut loop_handle => {
            // The loop only returns on its own by panicking.
            return finish_loop(joined);
        }
        printed = &mut printer => {
            match printed {
                Ok(Ok(())) => warn!("Event printer stopped"),
                Ok(Err(e)) => error!("Event printer failed: {:#}", e),
                Err(e) => error!("Event printer task failed: {}", e),
            }
        }
    }

    info!("Shutting down daemon");
    let _ = shutdown_tx.send(());

    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    let joined = timeout(drain, loop_handle)
        .await
        .map_err(|_| anyhow::anyhow!("Shutdown timeout after {:?}", drain))?;
    finish_loop(joined)?;

    // The printer's outstanding pull has been answered; let it flush.
    if !printer.is_finished() {
        match timeout(drain, printer).await {
            Ok(Ok(Err(e))) => warn!("Event printer failed during shutdown: {:#}", e),
            Ok(_) => {}
            Err(_) => warn!("Event printer did not stop in time"),
        }
    }

    info!("Daemon stopped");
    Ok(())
}

/// Surface the event loop's outcome, re-raising a panic
fn finish_loop(
    joined: std::result::Result<ifwatch_core::Result<()>, tokio::task::JoinError>,
) -> Result<()> {
    match joined {
        Ok(result) => Ok(result?),
        Err(e) if e.is_panic() => panic::resume_unwind(e.into_panic()),
        Err(e) => Err(anyhow::anyhow!("event loop task failed: {}", e)),
    }
}

/// Print every event as one JSON line on `out`
///
/// Returns `Ok` once the watcher is shut down. Being cut off for falling
/// behind, or losing the serving side, is an error.
async fn print_events<W>(proxy: WatcherProxy, mut out: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let event = match proxy.watch().await {
            Ok(event) => event,
            Err(Error::WatcherClosed(CloseReason::Shutdown)) => return Ok(()),
            Err(e) => return Err(e).context("watcher closed"),
        };
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');
        out.write_all(&line).await?;
        out.flush().await?;
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let signal = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(signal)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

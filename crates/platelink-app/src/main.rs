//! Platelink application binary - composition root.
//!
//! Ties together all Platelink crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Probe the local package registry for the engine service
//! 3. Open an engine session and pump its event channel
//! 4. Run recognition for a fixed duration, logging every plate read
//! 5. Stop recognition and tear the session down
//!
//! The binary runs against the in-process mock engine so the whole
//! lifecycle can be exercised without the real recognition service; the
//! registry probe result is reported up front so a missing installation
//! is still visible.

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use platelink_core::config::PlatelinkConfig;
use platelink_core::error::PlatelinkError;
use platelink_core::params::{DeviceParams, RecognitionParams};
use platelink_core::types::{EngineStatus, ResultBatch};
use platelink_engine::{AvailabilityProbe, FixedProbe, MockEngine, MockEngineConfig, RegistryProbe};
use platelink_session::{EngineSession, ResultSink, SessionListener, SessionState};

use cli::CliArgs;

/// Sink that logs every plate read as it arrives.
struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn on_batch(&self, batch: ResultBatch) {
        for read in &batch.reads {
            tracing::info!(
                plate = %read.plate.0,
                confidence = read.confidence.0,
                x = read.region.x,
                y = read.region.y,
                "Plate read"
            );
        }
    }
}

/// Listener that logs every lifecycle callback.
struct ConsoleListener;

impl SessionListener for ConsoleListener {
    fn on_opened(&self, status: EngineStatus) {
        tracing::info!(code = status.code(), "Engine session opened");
    }

    fn on_setup_complete(&self, status: EngineStatus) {
        tracing::info!(code = status.code(), "Engine setup complete");
    }

    fn on_started(&self, status: EngineStatus) {
        tracing::info!(code = status.code(), "Recognition started");
    }

    fn on_stopped(&self, status: EngineStatus) {
        tracing::info!(code = status.code(), "Recognition stopped");
    }

    fn on_closed(&self, status: EngineStatus) {
        tracing::info!(code = status.code(), "Engine session closed");
    }

    fn on_settings_changed(&self, device: DeviceParams, _recognition: RecognitionParams) {
        tracing::info!(
            width = device.width,
            height = device.height,
            fps = device.fps,
            "Engine settings changed"
        );
    }

    fn on_disconnected(&self) {
        tracing::warn!("Engine disconnected");
    }

    fn on_engine_failure(&self, operation: &'static str, error: PlatelinkError) {
        tracing::error!(operation, error = %error, "Engine failure");
    }
}

/// Expand ~ to home directory in a path string.
fn resolve_registry_dir(registry_dir: &str) -> PathBuf {
    if registry_dir.starts_with("~/") || registry_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&registry_dir[2..])
    } else {
        PathBuf::from(registry_dir)
    }
}

/// Poll until the session reaches `target` or the timeout elapses.
async fn wait_for_state(
    session: &EngineSession,
    target: SessionState,
    timeout: Duration,
) -> Result<(), String> {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if session.state() == target {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Err(format!(
        "session never reached {target}, stuck in {}",
        session.state()
    ))
}

/// Launch the engine's external configuration tool and wait for it to
/// exit. The child is opaque; afterwards the session state is re-queried
/// and the connection re-established if the engine dropped it.
fn run_configurator(command: &[String], session: &EngineSession) {
    let Some((program, args)) = command.split_first() else {
        tracing::warn!("No configure_command set; skipping external configurator");
        return;
    };

    tracing::info!(program = %program, "Launching external configurator");
    match std::process::Command::new(program).args(args).status() {
        Ok(status) => tracing::info!(code = status.code(), "Configurator exited"),
        Err(e) => {
            tracing::warn!(error = %e, "Configurator could not be launched");
            return;
        }
    }

    if session.state() == SessionState::Closed {
        tracing::info!("Session dropped while configuring; reconnecting");
        if let Err(e) = session.reconnect() {
            tracing::error!(error = %e, "Reconnect after configuration failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config = PlatelinkConfig::load_or_default(&config_file);

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Platelink v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Report whether the real engine service is registered locally. The
    // demo session runs against the in-process mock either way.
    let registry_dir = resolve_registry_dir(&config.engine.registry_dir);
    let registry_probe = RegistryProbe::new(registry_dir, config.engine.service_name.clone());
    if registry_probe.is_available() {
        tracing::info!(service = %config.engine.service_name, "Engine service is registered");
    } else {
        tracing::warn!(
            service = %config.engine.service_name,
            install_url = %config.engine.install_url,
            "Engine service not registered; install it from the marketplace link"
        );
    }

    // Engine + session wiring.
    let (engine, events) = MockEngine::new(MockEngineConfig {
        result_interval: Duration::from_millis(500),
        ..MockEngineConfig::default()
    });
    let engine = Arc::new(engine);
    let session = Arc::new(
        EngineSession::new(engine.clone(), Arc::new(FixedProbe(true)))
            .with_auto_setup(config.session.auto_setup),
    );
    let pump = session.spawn_event_pump(events);
    session.register_sink(Arc::new(ConsoleSink));

    // Open and wait for the engine to come up.
    session.open(Arc::new(ConsoleListener))?;
    wait_for_state(&session, SessionState::Ready, Duration::from_secs(5)).await?;

    if args.configure {
        run_configurator(&config.engine.configure_command, &session);
        wait_for_state(&session, SessionState::Ready, Duration::from_secs(5)).await?;
    }

    // Recognize for the requested duration.
    let mut recognition = RecognitionParams::default();
    if let Some(country) = args.country {
        recognition.country = country;
    }
    tracing::info!(
        country = %recognition.country,
        duration_secs = args.duration,
        "Starting recognition"
    );
    session.begin_recognition(recognition)?;
    wait_for_state(&session, SessionState::Recognizing, Duration::from_secs(5)).await?;

    // Halfway through, simulate an out-of-band settings change so the
    // mirror refresh is visible in the log.
    tokio::time::sleep(Duration::from_secs(args.duration / 2)).await;
    engine.change_settings(
        DeviceParams {
            fps: 15.0,
            ..DeviceParams::default()
        },
        RecognitionParams::default(),
    );
    tokio::time::sleep(Duration::from_secs(args.duration - args.duration / 2)).await;

    session.end_recognition()?;
    wait_for_state(&session, SessionState::Ready, Duration::from_secs(5)).await?;

    session.close()?;
    wait_for_state(&session, SessionState::Closed, Duration::from_secs(5)).await?;

    tracing::info!(
        delivered = session.dispatcher().delivered(),
        discarded = session.dispatcher().discarded(),
        "Session finished"
    );

    pump.abort();
    Ok(())
}

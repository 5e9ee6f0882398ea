pub mod channels;    // Subscriber notification channels
pub mod config;      // Configuration management
pub mod coordinator; // Poll scheduling and availability tracking
pub mod error;       // Error taxonomy
pub mod options;     // Command line options parsing
pub mod prelude;     // Common imports and types
pub mod trannergy;   // Trannergy inverter protocol implementation

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::trannergy::client::{Client, PollOutcome};
use std::io::Write;

/// Main application entry point: load config, start one coordinator per
/// enabled inverter, run until the shutdown signal fires.
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
    let options = Options::new();

    let config = Config::new(options.config_file.clone()).unwrap_or_else(|err| {
        eprintln!("Failed to load config {}: {:?}", options.config_file, err);
        std::process::exit(255);
    });

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.loglevel.clone()),
    )
    .format(|buf, record| {
        writeln!(
            buf,
            "[{} {} {}] {}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
            record.level(),
            record.module_path().unwrap_or(""),
            record.args()
        )
    })
    .write_style(env_logger::WriteStyle::Never)
    .init();

    info!(
        "Starting trannergy-bridge {} with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );

    let config = ConfigWrapper::from_config(config);

    if options.once {
        return poll_once(config).await;
    }

    let channels = Channels::new();

    let mut handles = Vec::new();
    let mut coordinators = Vec::new();
    for inverter in config.enabled_inverters() {
        info!(
            "inverter {}: polling {}:{} every {}s",
            inverter.name(),
            inverter.host(),
            inverter.port(),
            inverter.scan_interval()
        );
        let coordinator = Coordinator::new(config.clone(), &inverter, channels.clone());
        let coordinator_clone = coordinator.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = coordinator_clone.start().await {
                error!("Coordinator task failed: {}", e);
            }
        }));
        coordinators.push(coordinator);
    }

    if coordinators.is_empty() {
        bail!("no enabled inverters configured");
    }

    let _ = shutdown_rx.recv().await;

    info!("Shutdown signal received, stopping coordinators...");
    for coordinator in &coordinators {
        coordinator.stop();
    }
    for handle in handles {
        if let Err(e) = handle.await {
            error!("Error waiting for coordinator task: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// One-shot mode: poll every enabled inverter a single time and print the
/// result as JSON. Exits non-zero if any poll did not succeed, so this
/// doubles as a connection test for new configurations.
async fn poll_once(config: ConfigWrapper) -> Result<()> {
    let mut failures = 0;

    for inverter in config.enabled_inverters() {
        let client = Client::new(config.clone(), &inverter);
        match client.poll().await {
            PollOutcome::Success(sample) => {
                let out = serde_json::json!({
                    "inverter": inverter.name(),
                    "sample": sample,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            }
            PollOutcome::DeviceOffline => {
                let out = serde_json::json!({
                    "inverter": inverter.name(),
                    "status": "Offline",
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
                failures += 1;
            }
            PollOutcome::TransientFailure(e) => {
                error!("inverter {}: {}", inverter.name(), e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        bail!("{} inverter(s) did not return a sample", failures);
    }
    Ok(())
}

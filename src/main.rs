use anyhow::Context;
use std::sync::Arc;
use sundial_host::domain::models::SessionState;
use sundial_host::domain::settings::SettingsService;
use sundial_host::infrastructure::bluetooth::{BleTransport, SessionConfig, SundialSession};
use sundial_host::infrastructure::location::WatchLocationFeed;
use sundial_host::infrastructure::logging::init_logger;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    if !settings_service.path().exists() {
        // First run: write the defaults out so they can be edited
        settings_service.save()?;
    }
    let settings = settings_service.get().clone();

    let _log_guard = init_logger(&settings.log_settings)?;
    info!(
        "Starting Sundial Host (settings: {})",
        settings_service.path().display()
    );

    let config = settings.session_config()?;
    if settings.observer_location.is_none() {
        warn!("No observer_location configured; telemetry stays empty until a location is known");
    }
    let location = Arc::new(WatchLocationFeed::new(settings.observer_location));

    run_platform(location, config).await
}

#[cfg(windows)]
async fn run_platform(location: Arc<WatchLocationFeed>, config: SessionConfig) -> anyhow::Result<()> {
    use sundial_host::infrastructure::bluetooth::winrt::WinRtTransport;

    run(Arc::new(WinRtTransport::new()), location, config).await
}

#[cfg(not(windows))]
async fn run_platform(_location: Arc<WatchLocationFeed>, _config: SessionConfig) -> anyhow::Result<()> {
    Err(sundial_host::SundialError::Unsupported(
        "no BLE transport is available on this platform".to_string(),
    )
    .into())
}

#[cfg_attr(not(windows), allow(dead_code))]
async fn run<T: BleTransport>(
    transport: Arc<T>,
    location: Arc<WatchLocationFeed>,
    config: SessionConfig,
) -> anyhow::Result<()> {
    let mut session = SundialSession::new(transport, location, config);
    let mut states = session.watch_state();
    let mut snapshots = session.snapshots();

    session.connect().await.context("connecting to sundial")?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                info!("Session state: {:?}", state);
                if state == SessionState::Disconnected {
                    break;
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if let Some(snapshot) = snapshot {
                    match serde_json::to_string(snapshot.as_ref()) {
                        Ok(json) => info!(target: "telemetry", "{}", json),
                        Err(e) => error!("Failed to serialize snapshot: {}", e),
                    }
                }
            }
        }
    }

    session.disconnect().await;
    info!("Sundial Host stopped");
    Ok(())
}

//! Sundial Session Module
//!
//! Owns the connection lifecycle for one sundial, turns sensor updates into
//! telemetry snapshots and publishes them to any number of observers.
//!
//! Notifications and poll ticks are both delivered as [`ReadTrigger`]s to a
//! single worker task, so characteristic state is never mutated re-entrantly.
//! [`SundialSession::read_cycle`] can also be called directly.

use crate::domain::geomagnetic::decimal_year;
use crate::domain::models::{
    Coordinates, CycleOutcome, ReadTrigger, SensorChannel, SensorReading, SessionState,
    SkipReason,
};
use crate::domain::solar;
use crate::domain::telemetry::TelemetrySnapshot;
use crate::error::{Result, SundialError, TransportError};
use crate::infrastructure::bluetooth::connection::{guarded, BleConnection, GattLink, SensorStreams};
use crate::infrastructure::bluetooth::protocol::{self, DeviceFilter, GattIdentifiers};
use crate::infrastructure::bluetooth::transport::BleTransport;
use crate::infrastructure::clock::{Clock, SystemClock};
use crate::infrastructure::location::LocationFeed;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Default fallback poll interval
pub const POLL_INTERVAL_MS: u64 = 1000;

/// Pending read-cycle triggers; extra triggers are dropped while the worker is busy
pub const TRIGGER_QUEUE_DEPTH: usize = 4;

/// Session behavior
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub identifiers: GattIdentifiers,
    /// Interval of the fallback poll that supplements notifications
    pub poll_interval: Duration,
    /// Applied to every transport call; `None` waits indefinitely
    pub call_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            identifiers: GattIdentifiers::default(),
            poll_interval: Duration::from_millis(POLL_INTERVAL_MS),
            call_timeout: None,
        }
    }
}

/// Latest decoded sensor values, one slot per channel
#[derive(Debug, Default)]
struct LatestReadings {
    azimuth: Option<f64>,
    altitude: Option<f64>,
}

impl LatestReadings {
    fn set(&mut self, channel: SensorChannel, value: Option<f64>) {
        match channel {
            SensorChannel::Azimuth => self.azimuth = value,
            SensorChannel::Altitude => self.altitude = value,
        }
    }

    fn reading(&self) -> Option<SensorReading> {
        Some(SensorReading {
            azimuth: self.azimuth?,
            altitude: self.altitude?,
        })
    }
}

/// State shared between the session handle and its background tasks
struct SessionShared<T: BleTransport> {
    transport: Arc<T>,
    location: Arc<dyn LocationFeed>,
    clock: Arc<dyn Clock>,
    call_timeout: Option<Duration>,
    link: RwLock<Option<Arc<GattLink<T>>>>,
    readings: Mutex<LatestReadings>,
    recovering: AtomicBool,
    state: watch::Sender<SessionState>,
    snapshot: watch::Sender<Option<Arc<TelemetrySnapshot>>>,
}

impl<T: BleTransport> SessionShared<T> {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: SessionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!("Session state: {:?} -> {:?}", previous, next);
        }
    }

    fn link(&self) -> Option<Arc<GattLink<T>>> {
        self.link
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_value(&self, channel: SensorChannel, bytes: &[u8]) {
        let value = protocol::decode_degrees(bytes);
        if value.is_none() && !bytes.is_empty() {
            debug!("Ignoring {}-byte {:?} payload", bytes.len(), channel);
        }
        trace!("{:?} = {:?}", channel, value);
        self.readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(channel, value);
    }

    fn latest_reading(&self) -> Option<SensorReading> {
        self.readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .reading()
    }

    async fn refresh_readings(&self, link: &GattLink<T>) {
        let channels = [
            (SensorChannel::Azimuth, &link.azimuth),
            (SensorChannel::Altitude, &link.altitude),
        ];
        for (channel, characteristic) in channels {
            match guarded(self.call_timeout, self.transport.read(characteristic)).await {
                Ok(bytes) => self.store_value(channel, &bytes),
                Err(e) => debug!("Read of {:?} failed, keeping cached value: {}", channel, e),
            }
        }
    }

    async fn read_cycle(&self, trigger: ReadTrigger) -> Result<CycleOutcome> {
        if self.state() != SessionState::Ready {
            return Ok(CycleOutcome::Idle);
        }
        let Some(link) = self.link() else {
            return Ok(CycleOutcome::Idle);
        };

        if !self.transport.is_link_up(&link.server) {
            self.recovering.store(true, Ordering::SeqCst);
            warn!("Link down, attempting in-place reconnect");
            match guarded(self.call_timeout, self.transport.reconnect(&link.server)).await {
                Ok(()) => info!("Link restored"),
                Err(e) => warn!("Reconnect failed, will retry next cycle: {}", e),
            }
            return Ok(CycleOutcome::LinkDown);
        }
        if self.recovering.swap(false, Ordering::SeqCst) {
            info!("Link recovered, resuming snapshots");
        }

        if trigger.refreshes_values() {
            self.refresh_readings(&link).await;
        }

        let Some(reading) = self.latest_reading() else {
            trace!("Incomplete sensor data, skipping cycle");
            return Ok(CycleOutcome::Skipped(SkipReason::MissingReading));
        };
        let Some(coordinates) = self.location.latest() else {
            trace!("No location yet, skipping cycle");
            return Ok(CycleOutcome::Skipped(SkipReason::MissingLocation));
        };

        let snapshot = TelemetrySnapshot::compute(reading, coordinates, self.clock.now())?;

        if self.state() != SessionState::Ready {
            debug!("Session left Ready mid-cycle, dropping snapshot");
            return Ok(CycleOutcome::Aborted);
        }
        self.snapshot.send_replace(Some(Arc::new(snapshot)));
        Ok(CycleOutcome::Published)
    }

    /// Send the magnetic declination hint; failures are ignored.
    async fn write_magnetic_north(&self, link: &GattLink<T>, coordinates: Coordinates) {
        let Some(north) = &link.magnetic_north else {
            return;
        };
        let epoch = decimal_year(&self.clock.now());
        let declination = solar::magnetic_declination(&coordinates, epoch);
        let value = protocol::encode_degrees(declination);

        match guarded(self.call_timeout, self.transport.write(north, &value)).await {
            Ok(()) => debug!("Magnetic declination {:.2} sent to device", declination),
            Err(e) => debug!("Magnetic declination write ignored: {}", e),
        }
    }
}

/// One sundial connection and its published outputs
pub struct SundialSession<T: BleTransport> {
    shared: Arc<SessionShared<T>>,
    identifiers: GattIdentifiers,
    poll_interval: Duration,
    server: Option<T::Server>,
    trigger: Option<mpsc::Sender<ReadTrigger>>,
    tasks: Vec<JoinHandle<()>>,
}

impl<T: BleTransport> SundialSession<T> {
    pub fn new(transport: Arc<T>, location: Arc<dyn LocationFeed>, config: SessionConfig) -> Self {
        Self::with_clock(transport, location, config, Arc::new(SystemClock))
    }

    /// Same as [`SundialSession::new`] with an explicit wall clock
    pub fn with_clock(
        transport: Arc<T>,
        location: Arc<dyn LocationFeed>,
        config: SessionConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (snapshot, _) = watch::channel(None);

        Self {
            shared: Arc::new(SessionShared {
                transport,
                location,
                clock,
                call_timeout: config.call_timeout,
                link: RwLock::new(None),
                readings: Mutex::new(LatestReadings::default()),
                recovering: AtomicBool::new(false),
                state,
                snapshot,
            }),
            identifiers: config.identifiers,
            poll_interval: config.poll_interval,
            server: None,
            trigger: None,
            tasks: Vec::new(),
        }
    }

    /// Discover a sundial and connect to it
    pub async fn connect(&mut self) -> Result<()> {
        self.begin_connect()?;

        let filter = DeviceFilter::sundial(&self.identifiers);
        info!("Requesting sundial device...");
        let discovered =
            guarded(self.shared.call_timeout, self.shared.transport.discover_device(&filter)).await;
        let device = match discovered {
            Ok(device) => device,
            Err(SundialError::Transport(TransportError::NoDevice)) => {
                return self.abort_connect(SundialError::NoDeviceSelected).await;
            }
            Err(e) => return self.abort_connect(e).await,
        };

        self.open(device).await
    }

    /// Connect to an already discovered device
    pub async fn connect_device(&mut self, device: T::Device) -> Result<()> {
        self.begin_connect()?;
        self.open(device).await
    }

    fn begin_connect(&mut self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Disconnected {
            return Err(SundialError::InvalidState(state));
        }
        if !self.shared.transport.is_available() {
            error!("Bluetooth is not available on this host");
            return Err(SundialError::Unsupported(
                "BLE capability missing or not authorized".to_string(),
            ));
        }
        self.shared.set_state(SessionState::Connecting);
        Ok(())
    }

    async fn open(&mut self, device: T::Device) -> Result<()> {
        let connected = guarded(
            self.shared.call_timeout,
            self.shared.transport.connect_gatt(&device),
        )
        .await;
        let server = match connected {
            Ok(server) => server,
            Err(e) => return self.abort_connect(e).await,
        };
        self.server = Some(server.clone());
        self.shared.set_state(SessionState::Connected);

        let established = {
            let connection = BleConnection::new(
                self.shared.transport.as_ref(),
                self.identifiers,
                self.shared.call_timeout,
            );
            connection.establish(&server).await
        };
        let (link, streams) = match established {
            Ok(established) => established,
            Err(e) => return self.abort_connect(e).await,
        };

        self.start(Arc::new(link), streams);
        self.shared.set_state(SessionState::Ready);
        self.spawn_poll_loop();
        info!("Sundial session ready");
        Ok(())
    }

    async fn abort_connect(&mut self, e: SundialError) -> Result<()> {
        error!("Connection failed: {}", e);
        self.disconnect().await;
        Err(e)
    }

    /// Cache the link and start the worker, notification and location tasks
    fn start(&mut self, link: Arc<GattLink<T>>, streams: SensorStreams) {
        *self
            .shared
            .link
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(link.clone());
        *self
            .shared
            .readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = LatestReadings::default();

        let (trigger_tx, mut trigger_rx) = mpsc::channel::<ReadTrigger>(TRIGGER_QUEUE_DEPTH);

        let shared = self.shared.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(trigger) = trigger_rx.recv().await {
                match shared.read_cycle(trigger).await {
                    Ok(outcome) => trace!("Read cycle ({:?}): {:?}", trigger, outcome),
                    Err(e) if e.is_recoverable() => warn!("Read cycle skipped: {}", e),
                    Err(e) => error!("Read cycle failed: {}", e),
                }
            }
        }));

        let SensorStreams { azimuth, altitude } = streams;
        for (channel, mut stream) in [
            (SensorChannel::Azimuth, azimuth),
            (SensorChannel::Altitude, altitude),
        ] {
            let shared = self.shared.clone();
            let trigger_tx = trigger_tx.clone();
            self.tasks.push(tokio::spawn(async move {
                while let Some(bytes) = stream.recv().await {
                    shared.store_value(channel, &bytes);
                    match trigger_tx.try_send(ReadTrigger::Notification(channel)) {
                        Ok(()) => {}
                        // The cached value is picked up by the queued cycle
                        Err(TrySendError::Full(_)) => trace!("Read queue full, coalescing {:?}", channel),
                        Err(TrySendError::Closed(_)) => break,
                    }
                }
                debug!("{:?} notification stream closed", channel);
            }));
        }

        if link.magnetic_north.is_some() {
            let shared = self.shared.clone();
            let mut updates = shared.location.subscribe();
            // Send the hint for the position already known
            updates.mark_changed();
            self.tasks.push(tokio::spawn(async move {
                while updates.changed().await.is_ok() {
                    let latest = *updates.borrow_and_update();
                    if let Some(coordinates) = latest {
                        shared.write_magnetic_north(&link, coordinates).await;
                    }
                }
            }));
        }

        self.trigger = Some(trigger_tx);
    }

    fn spawn_poll_loop(&mut self) {
        let Some(trigger_tx) = self.trigger.clone() else {
            return;
        };
        let shared = self.shared.clone();
        let period = self.poll_interval;
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                if shared.state() != SessionState::Ready {
                    break;
                }
                match trigger_tx.try_send(ReadTrigger::Poll) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => trace!("Read queue full, skipping poll tick"),
                    Err(TrySendError::Closed(_)) => break,
                }
            }
            debug!("Poll loop stopped");
        }));
    }

    /// Run one read cycle immediately
    pub async fn read_cycle(&self, trigger: ReadTrigger) -> Result<CycleOutcome> {
        self.shared.read_cycle(trigger).await
    }

    /// Queue a refreshing read cycle on the worker without waiting for it.
    ///
    /// Returns false when the session has no worker or its queue is full.
    pub fn request_read(&self) -> bool {
        self.trigger
            .as_ref()
            .is_some_and(|tx| tx.try_send(ReadTrigger::Manual).is_ok())
    }

    /// Drop the link and return to `Disconnected`; safe from any state
    pub async fn disconnect(&mut self) {
        // Leave Ready first so a cycle still in flight drops its snapshot
        self.shared.set_state(SessionState::Disconnected);

        self.trigger = None;
        let tasks: Vec<_> = self.tasks.drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        for task in tasks {
            let _ = task.await;
        }

        self.shared
            .link
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // Release the handle even when the link already dropped
        if let Some(server) = self.server.take() {
            self.shared.transport.disconnect(&server).await;
            info!("Disconnected from device");
        }

        *self
            .shared
            .readings
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = LatestReadings::default();
        self.shared.recovering.store(false, Ordering::SeqCst);
        self.shared.snapshot.send_replace(None);
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    /// Observable session state
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    /// Observable latest snapshot; `None` until the first publish and after disconnect
    pub fn snapshots(&self) -> watch::Receiver<Option<Arc<TelemetrySnapshot>>> {
        self.shared.snapshot.subscribe()
    }

    pub fn latest_snapshot(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.shared.snapshot.borrow().clone()
    }

    /// Whether the last read cycle found the link down
    pub fn is_recovering(&self) -> bool {
        self.shared.recovering.load(Ordering::SeqCst)
    }

    /// Whether characteristic handles are currently cached
    pub fn has_link(&self) -> bool {
        self.shared.link().is_some()
    }

    #[cfg(test)]
    fn queued_triggers(&self) -> usize {
        self.trigger
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }
}

impl<T: BleTransport> Drop for SundialSession<T> {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

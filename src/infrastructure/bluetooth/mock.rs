//! In-memory transport used by the session tests.

use crate::error::TransportError;
use crate::infrastructure::bluetooth::protocol::{DeviceFilter, GattIdentifiers};
use crate::infrastructure::bluetooth::transport::{BleTransport, TransportResult};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

#[derive(Default)]
struct MockState {
    device_present: bool,
    services: HashSet<Uuid>,
    /// characteristic -> owning service
    characteristics: HashMap<Uuid, Uuid>,
    values: HashMap<Uuid, Vec<u8>>,
    writes: Vec<(Uuid, Vec<u8>)>,
    notifiers: HashMap<Uuid, mpsc::UnboundedSender<Vec<u8>>>,
    fail_writes: bool,
    reconnect_succeeds: bool,
    reconnect_attempts: u32,
    reads: u32,
    gatt_connects: u32,
    disconnects: u32,
    hang_on_connect: bool,
}

pub struct MockTransport {
    available: AtomicBool,
    link_up: AtomicBool,
    /// While true, reads park after being counted
    read_gate: watch::Sender<bool>,
    state: Mutex<MockState>,
}

impl MockTransport {
    /// A sundial exposing every service and characteristic
    pub fn sundial() -> Self {
        let ids = GattIdentifiers::default();
        let mut state = MockState {
            device_present: true,
            reconnect_succeeds: true,
            ..Default::default()
        };
        state.services.insert(ids.sundial_service);
        state.services.insert(ids.location_service);
        state.characteristics.insert(ids.azimuth, ids.sundial_service);
        state.characteristics.insert(ids.altitude, ids.sundial_service);
        state
            .characteristics
            .insert(ids.magnetic_north, ids.location_service);

        Self {
            available: AtomicBool::new(true),
            link_up: AtomicBool::new(false),
            read_gate: watch::channel(false).0,
            state: Mutex::new(state),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_link_up(&self, up: bool) {
        self.link_up.store(up, Ordering::SeqCst);
    }

    pub fn set_device_present(&self, present: bool) {
        self.state.lock().unwrap().device_present = present;
    }

    pub fn remove_service(&self, service: Uuid) {
        self.state.lock().unwrap().services.remove(&service);
    }

    pub fn remove_characteristic(&self, characteristic: Uuid) {
        self.state
            .lock()
            .unwrap()
            .characteristics
            .remove(&characteristic);
    }

    pub fn set_value(&self, characteristic: Uuid, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .values
            .insert(characteristic, bytes.to_vec());
    }

    /// Push a notification; false when nobody is subscribed
    pub fn notify(&self, characteristic: Uuid, bytes: &[u8]) -> bool {
        let state = self.state.lock().unwrap();
        match state.notifiers.get(&characteristic) {
            Some(sender) => sender.send(bytes.to_vec()).is_ok(),
            None => false,
        }
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn set_reconnect_succeeds(&self, succeeds: bool) {
        self.state.lock().unwrap().reconnect_succeeds = succeeds;
    }

    pub fn set_hang_on_connect(&self, hang: bool) {
        self.state.lock().unwrap().hang_on_connect = hang;
    }

    pub fn hold_reads(&self, hold: bool) {
        self.read_gate.send_replace(hold);
    }

    /// Reads started so far, including parked ones
    pub fn reads(&self) -> u32 {
        self.state.lock().unwrap().reads
    }

    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.state.lock().unwrap().reconnect_attempts
    }

    pub fn gatt_connects(&self) -> u32 {
        self.state.lock().unwrap().gatt_connects
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().unwrap().disconnects
    }
}

#[async_trait]
impl BleTransport for MockTransport {
    type Device = u32;
    type Server = u32;
    type Service = Uuid;
    type Characteristic = Uuid;

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn discover_device(&self, _filter: &DeviceFilter) -> TransportResult<u32> {
        if self.state.lock().unwrap().device_present {
            Ok(1)
        } else {
            Err(TransportError::NoDevice)
        }
    }

    async fn connect_gatt(&self, device: &u32) -> TransportResult<u32> {
        let hang = self.state.lock().unwrap().hang_on_connect;
        if hang {
            std::future::pending::<()>().await;
        }
        let mut state = self.state.lock().unwrap();
        state.gatt_connects += 1;
        self.link_up.store(true, Ordering::SeqCst);
        Ok(*device * 100 + state.gatt_connects)
    }

    async fn get_service(&self, _server: &u32, service: Uuid) -> TransportResult<Option<Uuid>> {
        let state = self.state.lock().unwrap();
        Ok(state.services.contains(&service).then_some(service))
    }

    async fn get_characteristic(
        &self,
        service: &Uuid,
        characteristic: Uuid,
    ) -> TransportResult<Option<Uuid>> {
        let state = self.state.lock().unwrap();
        let owned = state.characteristics.get(&characteristic) == Some(service);
        Ok(owned.then_some(characteristic))
    }

    async fn read(&self, characteristic: &Uuid) -> TransportResult<Vec<u8>> {
        self.state.lock().unwrap().reads += 1;
        let mut gate = self.read_gate.subscribe();
        gate.wait_for(|held| !*held).await.map(|_| ()).ok();

        let state = self.state.lock().unwrap();
        Ok(state.values.get(characteristic).cloned().unwrap_or_default())
    }

    async fn write(&self, characteristic: &Uuid, value: &[u8]) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(TransportError::Gatt("write rejected".to_string()));
        }
        state.writes.push((*characteristic, value.to_vec()));
        Ok(())
    }

    async fn subscribe_notify(
        &self,
        characteristic: &Uuid,
    ) -> TransportResult<mpsc::UnboundedReceiver<Vec<u8>>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .unwrap()
            .notifiers
            .insert(*characteristic, tx);
        Ok(rx)
    }

    fn is_link_up(&self, _server: &u32) -> bool {
        self.link_up.load(Ordering::SeqCst)
    }

    async fn reconnect(&self, _server: &u32) -> TransportResult<()> {
        let mut state = self.state.lock().unwrap();
        state.reconnect_attempts += 1;
        if state.reconnect_succeeds {
            self.link_up.store(true, Ordering::SeqCst);
            Ok(())
        } else {
            Err(TransportError::LinkDown)
        }
    }

    async fn disconnect(&self, _server: &u32) {
        self.state.lock().unwrap().disconnects += 1;
        self.link_up.store(false, Ordering::SeqCst);
    }
}

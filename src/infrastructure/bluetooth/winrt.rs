//! WinRT Transport
//!
//! [`BleTransport`] over `Windows.Devices.Bluetooth`.

use crate::error::TransportError;
use crate::infrastructure::bluetooth::protocol::DeviceFilter;
use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::transport::{BleTransport, TransportResult};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::Advertisement::BluetoothLEAdvertisementWatcher;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattDeviceService, GattSession, GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::{DataReader, DataWriter, IBuffer};

impl From<windows::core::Error> for TransportError {
    fn from(e: windows::core::Error) -> Self {
        TransportError::Gatt(e.message().to_string())
    }
}

fn guid(uuid: Uuid) -> GUID {
    GUID::from_u128(uuid.as_u128())
}

fn check(status: GattCommunicationStatus, what: &str) -> TransportResult<()> {
    if status == GattCommunicationStatus::Success {
        Ok(())
    } else {
        Err(TransportError::Gatt(format!("{} returned {:?}", what, status)))
    }
}

fn buffer_to_bytes(buffer: &IBuffer) -> windows::core::Result<Vec<u8>> {
    let reader = DataReader::FromBuffer(buffer)?;
    let mut bytes = vec![0u8; reader.UnconsumedBufferLength()? as usize];
    reader.ReadBytes(&mut bytes)?;
    Ok(bytes)
}

/// BLE transport backed by the Windows Bluetooth stack
#[derive(Default)]
pub struct WinRtTransport {
    // Sessions with MaintainConnection set; dropping them releases the link
    sessions: Mutex<Vec<GattSession>>,
}

impl WinRtTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a GattSession that keeps the BLE connection alive
    async fn maintain_connection(&self, device: &BluetoothLEDevice) -> TransportResult<()> {
        let device_id = device.BluetoothDeviceId()?;
        let session = GattSession::FromDeviceIdAsync(&device_id)?.await?;
        session.SetMaintainConnection(true)?;
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(session);
        Ok(())
    }
}

#[async_trait]
impl BleTransport for WinRtTransport {
    type Device = u64;
    type Server = BluetoothLEDevice;
    type Service = GattDeviceService;
    type Characteristic = GattCharacteristic;

    fn is_available(&self) -> bool {
        BluetoothLEAdvertisementWatcher::new().is_ok()
    }

    async fn discover_device(&self, filter: &DeviceFilter) -> TransportResult<u64> {
        let service = *filter.services.first().ok_or(TransportError::NoDevice)?;

        let mut scanner = BleScanner::new();
        let mut found = scanner.start(service)?;
        let device = found.recv().await.ok_or(TransportError::NoDevice)?;
        scanner.stop()?;

        info!(
            "Found sundial '{}' at {:#X} ({} dBm)",
            device.name, device.address, device.signal_strength
        );
        Ok(device.address)
    }

    async fn connect_gatt(&self, address: &u64) -> TransportResult<BluetoothLEDevice> {
        info!("Connecting to Bluetooth device: {:#X}", address);
        let device = BluetoothLEDevice::FromBluetoothAddressAsync(*address)?.await?;

        if let Err(e) = self.maintain_connection(&device).await {
            warn!("Failed to create GattSession, continuing anyway: {}", e);
        }
        Ok(device)
    }

    async fn get_service(
        &self,
        device: &BluetoothLEDevice,
        service: Uuid,
    ) -> TransportResult<Option<GattDeviceService>> {
        let result = device.GetGattServicesForUuidAsync(guid(service))?.await?;
        check(result.Status()?, "GetGattServicesForUuidAsync")?;

        let services = result.Services()?;
        if services.Size()? == 0 {
            return Ok(None);
        }
        Ok(Some(services.GetAt(0)?))
    }

    async fn get_characteristic(
        &self,
        service: &GattDeviceService,
        characteristic: Uuid,
    ) -> TransportResult<Option<GattCharacteristic>> {
        let result = service
            .GetCharacteristicsForUuidAsync(guid(characteristic))?
            .await?;
        check(result.Status()?, "GetCharacteristicsForUuidAsync")?;

        let characteristics = result.Characteristics()?;
        if characteristics.Size()? == 0 {
            return Ok(None);
        }
        Ok(Some(characteristics.GetAt(0)?))
    }

    async fn read(&self, characteristic: &GattCharacteristic) -> TransportResult<Vec<u8>> {
        let result = characteristic.ReadValueAsync()?.await?;
        check(result.Status()?, "ReadValueAsync")?;
        Ok(buffer_to_bytes(&result.Value()?)?)
    }

    async fn write(&self, characteristic: &GattCharacteristic, value: &[u8]) -> TransportResult<()> {
        let writer = DataWriter::new()?;
        writer.WriteBytes(value)?;
        let buffer = writer.DetachBuffer()?;

        let status = characteristic.WriteValueAsync(&buffer)?.await?;
        check(status, "WriteValueAsync")
    }

    async fn subscribe_notify(
        &self,
        characteristic: &GattCharacteristic,
    ) -> TransportResult<mpsc::UnboundedReceiver<Vec<u8>>> {
        let status = characteristic
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            )?
            .await?;
        check(status, "WriteClientCharacteristicConfigurationDescriptorAsync")?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let bytes = buffer_to_bytes(&args.CharacteristicValue()?)?;
                    let _ = sender.send(bytes);
                }
                Ok(())
            },
        );
        characteristic.ValueChanged(&handler)?;

        Ok(receiver)
    }

    fn is_link_up(&self, device: &BluetoothLEDevice) -> bool {
        device
            .ConnectionStatus()
            .map(|s| s == BluetoothConnectionStatus::Connected)
            .unwrap_or(false)
    }

    async fn reconnect(&self, device: &BluetoothLEDevice) -> TransportResult<()> {
        // Windows re-establishes maintained sessions on its own; refresh ours
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.maintain_connection(device).await?;

        if self.is_link_up(device) {
            Ok(())
        } else {
            Err(TransportError::LinkDown)
        }
    }

    async fn disconnect(&self, device: &BluetoothLEDevice) {
        for session in self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            let _ = session.Close();
        }
        let _ = device.Close();
    }
}

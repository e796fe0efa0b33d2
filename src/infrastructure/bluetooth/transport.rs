//! BLE Transport Capability
//!
//! The platform primitives the session is built on. Handles are opaque to the
//! session; implementations decide what a device, server, service or
//! characteristic handle is.

use crate::error::TransportError;
use crate::infrastructure::bluetooth::protocol::DeviceFilter;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type TransportResult<T> = Result<T, TransportError>;

#[async_trait]
pub trait BleTransport: Send + Sync + 'static {
    type Device: Clone + Send + Sync + 'static;
    type Server: Clone + Send + Sync + 'static;
    type Service: Clone + Send + Sync + 'static;
    type Characteristic: Clone + Send + Sync + 'static;

    /// Whether BLE is supported and authorized on this host.
    fn is_available(&self) -> bool;

    /// Resolve a peripheral matching the filter.
    async fn discover_device(&self, filter: &DeviceFilter) -> TransportResult<Self::Device>;

    /// Establish the GATT link.
    async fn connect_gatt(&self, device: &Self::Device) -> TransportResult<Self::Server>;

    async fn get_service(
        &self,
        server: &Self::Server,
        service: Uuid,
    ) -> TransportResult<Option<Self::Service>>;

    async fn get_characteristic(
        &self,
        service: &Self::Service,
        characteristic: Uuid,
    ) -> TransportResult<Option<Self::Characteristic>>;

    async fn read(&self, characteristic: &Self::Characteristic) -> TransportResult<Vec<u8>>;

    async fn write(&self, characteristic: &Self::Characteristic, value: &[u8])
        -> TransportResult<()>;

    /// Enable notifications; every value change is delivered on the returned channel.
    async fn subscribe_notify(
        &self,
        characteristic: &Self::Characteristic,
    ) -> TransportResult<mpsc::UnboundedReceiver<Vec<u8>>>;

    fn is_link_up(&self, server: &Self::Server) -> bool;

    /// Re-establish a dropped link without invalidating existing handles.
    async fn reconnect(&self, server: &Self::Server) -> TransportResult<()>;

    async fn disconnect(&self, server: &Self::Server);
}

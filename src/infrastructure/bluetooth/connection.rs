//! GATT Setup Module
//!
//! Resolves the sundial services and characteristics on a freshly connected
//! GATT server and subscribes to sensor notifications.

use crate::error::{Result, SundialError};
use crate::infrastructure::bluetooth::protocol::GattIdentifiers;
use crate::infrastructure::bluetooth::transport::{BleTransport, TransportResult};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Run a transport call under the optional timeout policy.
pub(crate) async fn guarded<F, R>(call_timeout: Option<Duration>, call: F) -> Result<R>
where
    F: Future<Output = TransportResult<R>>,
{
    match call_timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(SundialError::Timeout(limit)),
        },
        None => Ok(call.await?),
    }
}

/// Characteristic handles cached for the lifetime of one connection
pub struct GattLink<T: BleTransport> {
    pub server: T::Server,
    pub azimuth: T::Characteristic,
    pub altitude: T::Characteristic,
    /// Absent when the peripheral has no location service
    pub magnetic_north: Option<T::Characteristic>,
}

/// Notification streams for the two sensor characteristics
pub struct SensorStreams {
    pub azimuth: mpsc::UnboundedReceiver<Vec<u8>>,
    pub altitude: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// GATT setup handler
pub struct BleConnection<'a, T: BleTransport> {
    transport: &'a T,
    identifiers: GattIdentifiers,
    call_timeout: Option<Duration>,
}

impl<'a, T: BleTransport> BleConnection<'a, T> {
    pub fn new(
        transport: &'a T,
        identifiers: GattIdentifiers,
        call_timeout: Option<Duration>,
    ) -> Self {
        Self {
            transport,
            identifiers,
            call_timeout,
        }
    }

    /// Resolve handles and enable notifications on a connected server
    pub async fn establish(&self, server: &T::Server) -> Result<(GattLink<T>, SensorStreams)> {
        // Step 1: Primary sundial service (required)
        let sundial = self
            .call(self.transport.get_service(server, self.identifiers.sundial_service))
            .await?
            .ok_or(SundialError::ServiceNotFound(self.identifiers.sundial_service))?;
        info!("Found sundial service");

        // Step 2: Location service (optional)
        let location = match self
            .call(self.transport.get_service(server, self.identifiers.location_service))
            .await
        {
            Ok(Some(service)) => {
                info!("Found location service");
                Some(service)
            }
            Ok(None) => {
                warn!("Location service not present; magnetic north hint disabled");
                None
            }
            Err(e) => {
                warn!("Location service lookup failed: {}; continuing without it", e);
                None
            }
        };

        // Step 3: Sensor characteristics
        let azimuth = self.required_characteristic(&sundial, self.identifiers.azimuth).await?;
        let altitude = self.required_characteristic(&sundial, self.identifiers.altitude).await?;

        let magnetic_north = match &location {
            Some(service) => match self
                .call(
                    self.transport
                        .get_characteristic(service, self.identifiers.magnetic_north),
                )
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    warn!("Magnetic north characteristic lookup failed: {}", e);
                    None
                }
            },
            None => None,
        };
        if magnetic_north.is_some() {
            info!("Found magnetic north characteristic");
        }

        // Step 4: Notifications
        let streams = SensorStreams {
            azimuth: self.call(self.transport.subscribe_notify(&azimuth)).await?,
            altitude: self.call(self.transport.subscribe_notify(&altitude)).await?,
        };
        info!("Notifications enabled on azimuth and altitude");

        Ok((
            GattLink {
                server: server.clone(),
                azimuth,
                altitude,
                magnetic_north,
            },
            streams,
        ))
    }

    async fn required_characteristic(
        &self,
        service: &T::Service,
        id: uuid::Uuid,
    ) -> Result<T::Characteristic> {
        self.call(self.transport.get_characteristic(service, id))
            .await?
            .ok_or(SundialError::CharacteristicNotFound(id))
    }

    async fn call<F, R>(&self, call: F) -> Result<R>
    where
        F: Future<Output = TransportResult<R>>,
    {
        guarded(self.call_timeout, call).await
    }
}

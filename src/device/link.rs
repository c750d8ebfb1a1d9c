use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use log::{info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::DeviceError;

/// Raw values notified by the step characteristic.
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattTarget {
    pub service: Uuid,
    pub characteristic: Uuid,
}

/// The calls the connection session makes into the BLE library.
pub trait StepLink: Send + Sync {
    type Device: Clone + Send + Sync + 'static;

    /// Starts scanning on the first call, then looks for a peripheral advertising `name`.
    fn find_device<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<Self::Device>, DeviceError>>;

    fn stop_scan(&self) -> BoxFuture<'_, ()>;

    fn device_id(&self, device: &Self::Device) -> String;

    /// Connects, discovers services and subscribes to `target`.
    fn connect<'a>(&'a self, device: &'a Self::Device, target: &'a GattTarget) -> BoxFuture<'a, Result<NotificationStream, DeviceError>>;

    fn is_connected<'a>(&'a self, device: &'a Self::Device) -> BoxFuture<'a, Result<bool, DeviceError>>;

    /// Closes the connection if one is open. Failures are only logged.
    fn disconnect<'a>(&'a self, device: &'a Self::Device) -> BoxFuture<'a, ()>;
}

pub struct BtleLink {
    manager: Manager,
    adapters: Mutex<Option<Vec<Adapter>>>,
}

impl BtleLink {
    pub async fn new() -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;
        Ok(BtleLink { manager, adapters: Mutex::new(None) })
    }
}

async fn start_scanning(manager: &Manager) -> Result<Vec<Adapter>, DeviceError> {
    let adapters = manager.adapters().await?;

    for adapter in &adapters {
        info!("Scanning using adapter {}...", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        adapter.start_scan(ScanFilter::default()).await?;
    }

    Ok(adapters)
}

async fn find_peripheral(adapters: &[Adapter], name: &str) -> Option<Peripheral> {
    for adapter in adapters {
        let peripherals = match adapter.peripherals().await {
            Ok(v) => v,
            Err(err) => {
                warn!("Failed to query BLE adapter for peripherals: {}", err);
                continue;
            },
        };

        for peripheral in peripherals {
            match peripheral.properties().await {
                Err(err) => {
                    warn!("Could not query peripheral for properties: {:?}", err);
                },
                Ok(None) => {},
                Ok(Some(properties)) => {
                    if properties.local_name.as_deref() == Some(name) {
                        info!(
                            "Using peripheral {} {:?} {}",
                            properties.address,
                            properties.address_type,
                            name,
                        );
                        return Some(peripheral);
                    }
                }
            }
        }
    }

    None
}

async fn connect_peripheral(peripheral: &Peripheral, target: &GattTarget) -> Result<NotificationStream, DeviceError> {
    info!("Connecting to peripheral...");
    peripheral.connect().await?;

    info!("Connected; Discovering services...");
    peripheral.discover_services().await?;

    let service = peripheral.services()
        .into_iter()
        .find(|service| service.uuid == target.service)
        .ok_or(DeviceError::MissingService)?;

    let characteristic = service.characteristics
        .into_iter()
        .find(|characteristic| characteristic.uuid == target.characteristic)
        .ok_or(DeviceError::MissingCharacteristic)?;

    info!("Subscribing to characteristic {:?} {:?}", service.uuid, characteristic.uuid);
    peripheral.subscribe(&characteristic).await?;

    let uuid = characteristic.uuid;
    let notifications = peripheral.notifications().await?
        .filter_map(move |notification| future::ready(
            (notification.uuid == uuid).then_some(notification.value)
        ))
        .boxed();

    Ok(notifications)
}

impl StepLink for BtleLink {
    type Device = Peripheral;

    fn find_device<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<Option<Peripheral>, DeviceError>> {
        async move {
            let mut adapters = self.adapters.lock().await;

            if adapters.is_none() {
                *adapters = Some(start_scanning(&self.manager).await?);
            }

            match adapters.as_deref() {
                Some(adapters) => Ok(find_peripheral(adapters, name).await),
                None => Ok(None),
            }
        }.boxed()
    }

    fn stop_scan(&self) -> BoxFuture<'_, ()> {
        async move {
            let adapters = self.adapters.lock().await;

            for adapter in adapters.iter().flatten() {
                if let Err(err) = adapter.stop_scan().await {
                    warn!("Failed to stop scanning: {}", err);
                }
            }
        }.boxed()
    }

    fn device_id(&self, device: &Peripheral) -> String {
        device.address().to_string()
    }

    fn connect<'a>(&'a self, device: &'a Peripheral, target: &'a GattTarget) -> BoxFuture<'a, Result<NotificationStream, DeviceError>> {
        connect_peripheral(device, target).boxed()
    }

    fn is_connected<'a>(&'a self, device: &'a Peripheral) -> BoxFuture<'a, Result<bool, DeviceError>> {
        async move {
            Ok(device.is_connected().await?)
        }.boxed()
    }

    fn disconnect<'a>(&'a self, device: &'a Peripheral) -> BoxFuture<'a, ()> {
        async move {
            if let Ok(false) = device.is_connected().await {
                return;
            }

            info!("Disconnecting from peripheral...");
            if let Err(err) = device.disconnect().await {
                warn!("Failed to disconnect from peripheral: {}", err);
            }
        }.boxed()
    }
}

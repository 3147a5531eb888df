//! Shared test utilities

use std::net::Ipv4Addr;
use std::sync::Arc;

use axum::Router;
use fakeroku::api::{self, EcpState};
use fakeroku::registry::DeviceRegistry;
use fakeroku::{Device, Dispatcher, MemoryStore};

/// Build a loopback device with a predictable UUID
#[must_use]
pub fn test_device(name: &str, port: u16) -> Device {
    let uuid = format!("uuid-{}", name.to_lowercase().replace(' ', "-"));
    Device::new(name, uuid, port, Ipv4Addr::LOCALHOST)
}

/// Registry of loopback devices
#[must_use]
pub fn test_registry(names: &[&str]) -> DeviceRegistry {
    DeviceRegistry::from_devices(
        names
            .iter()
            .zip(9093..)
            .map(|(name, port)| test_device(name, port))
            .collect(),
    )
}

/// Build an ECP router for `device` backed by `dispatcher`
#[must_use]
pub fn test_router(device: Device, dispatcher: Arc<Dispatcher>) -> Router {
    api::router(Arc::new(EcpState {
        device: Arc::new(device),
        dispatcher,
    }))
}

/// Dispatcher over a fresh in-memory store
#[must_use]
pub fn memory_dispatcher() -> (Arc<MemoryStore>, Arc<Dispatcher>) {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(Dispatcher::new(store.clone()));
    (store, dispatcher)
}

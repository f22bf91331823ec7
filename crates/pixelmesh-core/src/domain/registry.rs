//! Device registry: the table of every node discovered on the mesh.
//!
//! Nodes announce themselves with a Beacon carrying their MAC.  The registry
//! hands each new MAC the next free index, starting at 0.  Indices are what
//! the color frame is laid out by (node `k` reads triplet `k`), so they must
//! stay dense and never be reused or renumbered for the life of the registry.
//!
//! ```text
//! register(AA..) ──► 0
//! register(BB..) ──► 1
//! register(AA..) ──► 0   (already known, nothing changes)
//! ```
//!
//! During calibration each device additionally learns the grid cell it lights
//! up, which is how the color frame knows which pixel to send it.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::domain::grid::GridPosition;
use crate::protocol::frames::MAX_DEVICES;

/// Errors raised by [`DeviceRegistry`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A position was assigned to an index that was never registered.
    #[error("no device registered at index {0}")]
    UnknownDevice(u8),

    /// A lookup targeted an index that was never registered.
    #[error("device {0} not found")]
    NotFound(u8),

    /// Every one-byte index is already taken.
    #[error("registry is full (256 devices)")]
    Full,
}

/// A 6-byte node hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// One registered node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Dense, 0-based, assignment-order index.  Never changes once set.
    pub index: u8,
    pub mac: MacAddress,
    /// Grid cell learned during calibration, if any.
    pub position: Option<GridPosition>,
}

/// Outcome of [`DeviceRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// The MAC was new and received this index.
    New(u8),
    /// The MAC was already registered under this index; nothing changed.
    Existing(u8),
}

impl Registration {
    pub fn index(self) -> u8 {
        match self {
            Registration::New(i) | Registration::Existing(i) => i,
        }
    }

    pub fn is_new(self) -> bool {
        matches!(self, Registration::New(_))
    }
}

/// In-memory table of every discovered node.
///
/// Devices are stored in a `Vec` so the vector position *is* the index;
/// the `HashMap` gives O(1) duplicate detection by MAC.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    by_mac: HashMap<MacAddress, u8>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `mac`, returning its index.
    ///
    /// Re-registering a known MAC is idempotent and returns
    /// [`Registration::Existing`] with the original index.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Full`] when all 256 indices are taken.
    pub fn register(&mut self, mac: MacAddress) -> Result<Registration, RegistryError> {
        if let Some(&index) = self.by_mac.get(&mac) {
            debug!("device {mac} already registered as {index}");
            return Ok(Registration::Existing(index));
        }
        if self.devices.len() >= MAX_DEVICES {
            return Err(RegistryError::Full);
        }

        let index = self.devices.len() as u8;
        self.devices.push(Device {
            index,
            mac,
            position: None,
        });
        self.by_mac.insert(mac, index);
        Ok(Registration::New(index))
    }

    /// Records the grid cell of the device at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownDevice`] if `index` is not registered.
    pub fn set_position(&mut self, index: u8, position: GridPosition) -> Result<(), RegistryError> {
        let device = self
            .devices
            .get_mut(index as usize)
            .ok_or(RegistryError::UnknownDevice(index))?;
        device.position = Some(position);
        Ok(())
    }

    /// Returns the device at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if `index` is not registered.
    pub fn get(&self, index: u8) -> Result<&Device, RegistryError> {
        self.devices
            .get(index as usize)
            .ok_or(RegistryError::NotFound(index))
    }

    /// Returns the index registered for `mac`, if any.
    pub fn index_of(&self, mac: &MacAddress) -> Option<u8> {
        self.by_mac.get(mac).copied()
    }

    /// Number of registered devices.
    pub fn size(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Iterates devices in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }
}

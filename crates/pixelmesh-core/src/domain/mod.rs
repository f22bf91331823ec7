//! Domain types with no I/O: the device registry and the pixel grid.
//!
//! - **`registry`** – Maps node MAC addresses to dense indices and records the
//!   grid cell each node was calibrated to.
//! - **`grid`** – The rows × cols RGB picture projected onto the nodes.

pub mod grid;
pub mod registry;

pub use grid::{GridError, GridPosition, PixelGrid, Rgb};
pub use registry::{Device, DeviceRegistry, MacAddress, Registration, RegistryError};

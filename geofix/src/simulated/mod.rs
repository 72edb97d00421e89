//! In-process simulation of the native location layer.
//!
//! Used by the test suite and the `geofix` command line. The device plays
//! both native models; the permission doubles count their calls so tests
//! can assert what the gate did.

mod device;
mod permission;

pub use device::SimulatedDevice;
pub use permission::{SimulatedAuthorization, SimulatedSettings};

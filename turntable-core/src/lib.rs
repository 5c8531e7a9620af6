#![no_std]

// Control core for the turntable-to-HID adapter.
//
// Everything here is clock-driven and polled: callers pass the current
// millisecond timestamp into each operation and supply pins, the controller
// link, the HID transport and the persistent store through the traits below.
// No allocation, no std, so the same code runs in firmware and on the host.

#[macro_use]
mod log;

pub mod adapter;
pub mod bindings;
pub mod effect;
pub mod hid;
pub mod io;
pub mod led;
pub mod link;
pub mod profile;
pub mod side_select;
pub mod storage;
pub mod timing;

pub use adapter::{Adapter, TickReport};
pub use timing::{Clock, Millis};

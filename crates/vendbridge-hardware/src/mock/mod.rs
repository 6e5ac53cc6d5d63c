//! Mock device implementations for testing and development.
//!
//! This module provides a simulated serial link that can be controlled
//! programmatically without requiring physical hardware.

pub mod serial;

pub use serial::{MockSerial, MockSerialHandle};

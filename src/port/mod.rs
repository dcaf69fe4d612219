//! Port abstraction layer for serial communication.
//!
//! Provides the channel binding traits, the `serialport`-backed implementation
//! and a scriptable mock, so the session can be driven without hardware.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::{MockBinding, MockChannel, MockEvent};
pub use sync_port::{SerialportBinding, SyncSerialPort};
pub use traits::*;

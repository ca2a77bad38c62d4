//! Driver for WS281x addressable LED strips.
//!
//! Pixels are encoded into a pulse stream ([`ws2812::encoder`]) and handed to
//! a [`Transport`] that clocks it out of a GPIO pin. [`DriverHandle`] owns the
//! lifecycle and the process-wide hardware claim; [`LedStrip`] adds a
//! pixel-level API on top.

pub mod config;
pub mod driver;
mod error;
pub mod registry;
pub mod rgb;
pub mod strip;
pub mod transport;
pub mod ws2812;

pub use config::{ChannelConfig, InitOptions, StripConfig, StripType};
pub use driver::{DriverHandle, DriverState};
pub use error::{Error, ErrorKind, Result};
pub use rgb::Rgb;
pub use strip::LedStrip;
pub use transport::{LoopbackTransport, Transport, TransportError};

/// Version and build stamp, logged when a driver comes up
pub const BUILD_INFO: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_HASH"),
    " ",
    env!("BUILD_PROFILE"),
    " ",
    env!("BUILD_TS"),
    ")"
);

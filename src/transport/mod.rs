//! Hardware transport seam.
//!
//! A [`Transport`] owns the peripheral that clocks encoded symbols onto the
//! output pins. Implementations:
//! - [`LoopbackTransport`]: software model of the Raspberry Pi PWM/DMA engine
//! - `RmtTransport` (feature `esp-idf`): ESP32 RMT peripheral

use std::time::Duration;

use crate::config::StripConfig;
use crate::ws2812::PulseStream;

pub mod loopback;
#[cfg(feature = "esp-idf")]
pub mod rmt;

pub use loopback::LoopbackTransport;
#[cfg(feature = "esp-idf")]
pub use rmt::RmtTransport;

#[derive(Clone, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum TransportError {
    #[display("peripheral already in use (dma {dma_channel})")]
    InUse { dma_channel: u8 },
    #[display("dma channel {dma_channel} not available")]
    InvalidDma { dma_channel: u8 },
    #[display("gpio {pin} cannot be driven by this transport")]
    InvalidPin { pin: u8 },
    #[display("gpio {first} and gpio {second} share a PWM channel")]
    PinConflict { first: u8, second: u8 },
    #[display("unsupported: {reason}")]
    Unsupported {
        #[error(not(source))]
        reason: String,
    },
    #[display("transport not open")]
    NotOpen,
    #[display("transfer still in flight")]
    Busy,
    #[display("transfer did not complete within {after:?}")]
    Timeout { after: Duration },
    #[display("hardware error: {message}")]
    Hardware {
        #[error(not(source))]
        message: String,
    },
}

/// One active output as the transport sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Output {
    pub channel: usize,
    pub gpio_pin: u8,
    /// Encoded stream length in 32-bit words
    pub words: usize,
}

/// Peripheral that streams encoded pulses to GPIO.
///
/// The driver calls `open` once, then `transmit` + `wait` per frame, then
/// `close`. A transport must not start a transfer while one is in flight.
pub trait Transport {
    /// Acquire the DMA buffer and program the clock for `strip.frequency`.
    /// On error nothing may remain held.
    fn open(&mut self, strip: &StripConfig, outputs: &[Output]) -> Result<(), TransportError>;

    /// Start sending one frame. `streams` is indexed like the `outputs`
    /// given to `open`.
    fn transmit(&mut self, streams: &[&PulseStream]) -> Result<(), TransportError>;

    /// Block until the current transfer completes, or fail once `timeout`
    /// has elapsed.
    fn wait(&mut self, timeout: Duration) -> Result<(), TransportError>;

    /// Release every acquired resource. Harmless when already closed.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn open(&mut self, strip: &StripConfig, outputs: &[Output]) -> Result<(), TransportError> {
        (**self).open(strip, outputs)
    }

    fn transmit(&mut self, streams: &[&PulseStream]) -> Result<(), TransportError> {
        (**self).transmit(streams)
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), TransportError> {
        (**self).wait(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self, strip: &StripConfig, outputs: &[Output]) -> Result<(), TransportError> {
        (**self).open(strip, outputs)
    }

    fn transmit(&mut self, streams: &[&PulseStream]) -> Result<(), TransportError> {
        (**self).transmit(streams)
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), TransportError> {
        (**self).wait(timeout)
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Which peripheral can drive a pin on the BCM283x family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PinFunction {
    Pwm(u8),
    Pcm,
    Spi,
}

impl PinFunction {
    pub fn for_gpio(pin: u8) -> Option<Self> {
        match pin {
            12 | 18 | 40 | 52 => Some(PinFunction::Pwm(0)),
            13 | 19 | 41 | 45 | 53 => Some(PinFunction::Pwm(1)),
            21 | 31 => Some(PinFunction::Pcm),
            10 | 38 => Some(PinFunction::Spi),
            _ => None,
        }
    }
}

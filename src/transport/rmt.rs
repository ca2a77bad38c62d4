use esp_idf_hal::rmt::{
    config::TransmitConfig, PinState, Pulse, TxRmtDriver, VariableLengthSignal,
};
use esp_idf_hal::sys::EspError;
use std::time::{Duration, Instant};

use super::{Output, Transport, TransportError};
use crate::config::StripConfig;
use crate::ws2812::encoder::symbol_rate;
use crate::ws2812::PulseStream;

pub type RmtTransportChannel = esp_idf_hal::rmt::CHANNEL0;

fn hardware(e: EspError) -> TransportError {
    TransportError::Hardware {
        message: e.to_string(),
    }
}

// RMT driver for a single output. The pin is fixed when the driver is
// created, so `gpio_pin` in the strip config is informational here.
//
// `transmit` blocks in `start_blocking` until the RMT reports done, and that
// wait has no bound. `wait` can only report a transfer that ran past its
// timeout after the fact; it never cuts one short.
//
// let led = peripherals.pins.gpio10.downgrade_output();
// let channel = peripherals.rmt.channel0;
// let transport = RmtTransport::new(led, channel)?;
//
pub struct RmtTransport<'a> {
    tx: TxRmtDriver<'a>,
    signal: Option<VariableLengthSignal>,
    rate: u64,
    last: Option<Duration>,
}

impl<'a> RmtTransport<'a> {
    pub fn new(
        led: esp_idf_hal::gpio::AnyOutputPin,
        channel: RmtTransportChannel,
    ) -> Result<Self, TransportError> {
        let config = TransmitConfig::new().clock_divider(1);
        let tx = TxRmtDriver::new(channel, led, &config).map_err(hardware)?;
        Ok(Self {
            tx,
            signal: None,
            rate: 0,
            last: None,
        })
    }

    fn pulse(
        &self,
        ticks_hz: esp_idf_hal::units::Hertz,
        high: bool,
        symbols: u64,
    ) -> Result<Pulse, TransportError> {
        let state = if high { PinState::High } else { PinState::Low };
        let duration = Duration::from_nanos(symbols * 1_000_000_000 / self.rate);
        Pulse::new_with_duration(ticks_hz, state, &duration).map_err(hardware)
    }
}

impl Transport for RmtTransport<'_> {
    fn open(&mut self, strip: &StripConfig, outputs: &[Output]) -> Result<(), TransportError> {
        if self.signal.is_some() {
            return Err(TransportError::InUse {
                dma_channel: strip.dma_channel,
            });
        }
        let [output] = outputs else {
            return Err(TransportError::Unsupported {
                reason: format!("RMT drives one output, {} requested", outputs.len()),
            });
        };
        self.rate = symbol_rate(strip.frequency);
        // Worst case one pulse per symbol
        self.signal = Some(VariableLengthSignal::with_capacity(output.words * 32));
        self.last = None;
        Ok(())
    }

    fn transmit(&mut self, streams: &[&PulseStream]) -> Result<(), TransportError> {
        if self.signal.is_none() {
            return Err(TransportError::NotOpen);
        }
        let [stream] = streams else {
            return Err(TransportError::Hardware {
                message: format!("{} streams for one output", streams.len()),
            });
        };
        let ticks_hz = self.tx.counter_clock().map_err(hardware)?;

        // Run-length encode the symbol levels into RMT pulses
        let total = stream.layout().total_bits();
        let mut pulses = Vec::new();
        let mut level = stream.level(0);
        let mut run = 0_u64;
        for i in 0..total {
            if stream.level(i) == level {
                run += 1;
            } else {
                pulses.push(self.pulse(ticks_hz, level, run)?);
                level = !level;
                run = 1;
            }
        }
        pulses.push(self.pulse(ticks_hz, level, run)?);

        let signal = self.signal.as_mut().ok_or(TransportError::NotOpen)?;
        signal.clear();
        for pulse in &pulses {
            signal.push([pulse]).map_err(hardware)?;
        }
        let start = Instant::now();
        self.tx.start_blocking(&*signal).map_err(hardware)?;
        self.last = Some(start.elapsed());
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), TransportError> {
        if self.signal.is_none() {
            return Err(TransportError::NotOpen);
        }
        // start_blocking has already waited, unbounded; report an overlong transfer
        match self.last.take() {
            Some(elapsed) if elapsed > timeout => Err(TransportError::Timeout { after: timeout }),
            _ => Ok(()),
        }
    }

    fn close(&mut self) {
        self.signal = None;
        self.last = None;
    }

    fn is_open(&self) -> bool {
        self.signal.is_some()
    }
}

//! Driver lifecycle.
//!
//! `initialize` claims the peripheral and opens the transport, `render`
//! copies a host buffer into channel 0 and sends every channel, `reset` blanks
//! the strip and gives the hardware back:
//!
//! ```text
//! Uninitialized --initialize--> Ready --render--> Ready --reset--> Uninitialized
//! ```

use std::time::Duration;

use crate::config::{ChannelConfig, StripConfig};
use crate::registry::Claim;
use crate::transport::{Output, Transport};
use crate::ws2812::{encode, Channel, PulseStream, StreamLayout, MAX_FRAME_WORDS};
use crate::{Error, Result};

/// Slack on top of the wire time before a transfer counts as failed
pub const TRANSMIT_TIMEOUT_MARGIN: Duration = Duration::from_millis(100);

const TYPICAL_FREQUENCY: std::ops::RangeInclusive<u32> = 400_000..=800_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Ready,
}

/// Live binding to the LED hardware.
///
/// Holds the process-wide peripheral claim while Ready. Dropping a Ready
/// handle resets it.
pub struct DriverHandle<T: Transport> {
    strip: StripConfig,
    channels: [Channel; 2],
    outputs: Vec<Output>,
    streams: Vec<PulseStream>,
    timeout: Duration,
    transport: T,
    claim: Option<Claim>,
}

fn validate(strip: &StripConfig, channel0: &ChannelConfig, channel1: &ChannelConfig) -> Result<()> {
    if !channel0.is_used() {
        return Err(Error::config("channel 0 needs a pixel count > 0"));
    }
    if strip.frequency == 0 {
        return Err(Error::config("frequency must be > 0"));
    }
    for (index, channel) in [channel0, channel1].into_iter().enumerate() {
        if StreamLayout::checked(channel, strip.frequency).is_none() {
            return Err(Error::config(format!(
                "channel {index}: {} pixels do not fit in a {MAX_FRAME_WORDS} word DMA frame",
                channel.pixel_count
            )));
        }
    }
    if channel1.is_used() && strip.secondary_gpio_pin == strip.gpio_pin {
        return Err(Error::config(format!(
            "both channels on gpio {}",
            strip.gpio_pin
        )));
    }
    if !TYPICAL_FREQUENCY.contains(&strip.frequency) {
        log::warn!(
            "frequency {} Hz is outside the usual WS281x range",
            strip.frequency
        );
    }
    Ok(())
}

impl<T: Transport> DriverHandle<T> {
    /// Claim the peripheral and open `transport` for the given channels.
    ///
    /// Channel 1 is unused when `None` or when its pixel count is 0. On any
    /// error nothing stays acquired and the caller may retry.
    pub fn initialize(
        mut transport: T,
        strip: StripConfig,
        channel0: ChannelConfig,
        channel1: Option<ChannelConfig>,
    ) -> Result<Self> {
        let channel1 = channel1.unwrap_or(ChannelConfig {
            pixel_count: 0,
            ..Default::default()
        });
        validate(&strip, &channel0, &channel1)?;

        let claim = Claim::acquire(&strip).map_err(Error::HardwareAcquisition)?;

        let channels = [Channel::new(channel0), Channel::new(channel1)];
        let mut outputs = Vec::with_capacity(2);
        let mut streams = Vec::with_capacity(2);
        for (index, channel) in channels.iter().enumerate() {
            if !channel.config().is_used() {
                continue;
            }
            let layout = StreamLayout::new(channel.config(), strip.frequency);
            outputs.push(Output {
                channel: index,
                gpio_pin: if index == 0 {
                    strip.gpio_pin
                } else {
                    strip.secondary_gpio_pin
                },
                words: layout.words,
            });
            streams.push(PulseStream::new(layout));
        }

        if let Err(e) = transport.open(&strip, &outputs) {
            transport.close();
            return Err(Error::HardwareAcquisition(e));
        }

        let frame_time = streams
            .iter()
            .map(|s| s.layout().frame_duration())
            .max()
            .unwrap_or_default();
        log::info!(
            "ws281x {}: ready dma={} freq={} outputs={:?}",
            crate::BUILD_INFO,
            strip.dma_channel,
            strip.frequency,
            outputs
        );
        Ok(Self {
            strip,
            channels,
            outputs,
            streams,
            timeout: frame_time + TRANSMIT_TIMEOUT_MARGIN,
            transport,
            claim: Some(claim),
        })
    }

    pub fn state(&self) -> DriverState {
        match self.claim {
            Some(_) => DriverState::Ready,
            None => DriverState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == DriverState::Ready
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.state() {
            DriverState::Ready => Ok(()),
            DriverState::Uninitialized => Err(Error::NotInitialized),
        }
    }

    pub fn strip_config(&self) -> &StripConfig {
        &self.strip
    }

    pub fn channel(&self, index: usize) -> Option<&Channel> {
        self.channels.get(index)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Wait bound for one frame.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Copy `buffer` into channel 0 and send all channels.
    ///
    /// At most `pixel_count * 4` bytes are copied, the rest is ignored; a
    /// shorter buffer leaves the remaining pixels as they were (see
    /// [`Channel::write`]). Blocks until the frame is out.
    pub fn render(&mut self, buffer: &[u8]) -> Result<()> {
        self.write_channel(0, buffer)?;
        self.show()
    }

    /// Copy `buffer` into channel `index` without sending it.
    pub fn write_channel(&mut self, index: usize, buffer: &[u8]) -> Result<usize> {
        self.ensure_ready()?;
        let channel = self
            .channels
            .get_mut(index)
            .filter(|c| c.config().is_used())
            .ok_or_else(|| Error::argument(format!("channel {index} is not in use")))?;
        let copied = channel.write(buffer);
        if copied < buffer.len() {
            log::debug!(
                "channel {index}: {} bytes truncated to {copied}",
                buffer.len()
            );
        }
        Ok(copied)
    }

    /// Send the current frame buffers of every channel and wait for the
    /// transfer to finish.
    pub fn show(&mut self) -> Result<()> {
        self.ensure_ready()?;
        for (stream, output) in self.streams.iter_mut().zip(&self.outputs) {
            let channel = &self.channels[output.channel];
            encode(channel.config(), channel.leds(), stream);
        }
        let streams: Vec<&PulseStream> = self.streams.iter().collect();
        self.transport
            .transmit(&streams)
            .and_then(|()| self.transport.wait(self.timeout))
            .map_err(|e| {
                log::warn!("ws281x: transmit failed: {e}");
                Error::Transmit(e)
            })
    }

    /// Set channel 0's brightness byte; it applies from the next render.
    pub fn set_brightness(&mut self, level: i32) -> Result<()> {
        self.ensure_ready()?;
        let brightness = u8::try_from(level)
            .map_err(|_| Error::argument(format!("brightness {level} outside 0-255")))?;
        let channel = &mut self.channels[0];
        channel.set_config(ChannelConfig {
            brightness,
            ..*channel.config()
        });
        Ok(())
    }

    /// Blank channel 0, release the hardware and become Uninitialized.
    ///
    /// The transport and claim are released even if the blanking frame fails,
    /// in which case that error is returned. Resetting an Uninitialized handle
    /// does nothing.
    pub fn reset(&mut self) -> Result<()> {
        if !self.is_ready() {
            log::debug!("ws281x: reset on uninitialized driver ignored");
            return Ok(());
        }
        self.channels[0].clear();
        let blank = self.show();
        self.transport.close();
        self.claim = None;
        log::info!("ws281x: reset, peripheral released");
        blank
    }
}

impl<T: Transport> Drop for DriverHandle<T> {
    fn drop(&mut self) {
        if let Err(e) = self.reset() {
            log::error!("ws281x: reset on drop failed: {e}");
        }
    }
}

use std::thread;
use std::time::{Duration, Instant};

use super::{Output, PinFunction, Transport, TransportError};
use crate::config::StripConfig;
use crate::ws2812::{decode, DecodeError, PulseStream};

/// Highest DMA channel the BCM283x exposes for this use
pub const MAX_DMA_CHANNEL: u8 = 14;
// DMA channels the firmware commonly claims
const RESERVED_DMA: [u8; 7] = [0, 1, 2, 3, 5, 6, 7];

const PWM_CHANNELS: usize = 2;

struct Transfer {
    started: Instant,
    duration: Duration,
}

struct Session {
    outputs: Vec<Output>,
    // Interleaved PWM FIFO image, one word per PWM channel in turn
    dma: Vec<u32>,
    in_flight: Option<Transfer>,
}

/// In-memory model of the PWM/DMA engine.
///
/// Enforces the same pin and DMA constraints as the real peripheral, lays
/// frames out the way the PWM FIFO consumes them, and records every frame
/// it is asked to send. Faults can be queued to exercise the error paths.
/// With [`realtime`](Self::realtime) set, transfers take their wire time.
#[derive(Default)]
pub struct LoopbackTransport {
    session: Option<Session>,
    frames: Vec<Vec<PulseStream>>,
    realtime: bool,
    open_count: usize,
    fail_open: Option<TransportError>,
    fail_transmit: Option<TransportError>,
    fail_wait: Option<TransportError>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn fail_next_open(&mut self, err: TransportError) {
        self.fail_open = Some(err);
    }

    pub fn fail_next_transmit(&mut self, err: TransportError) {
        self.fail_transmit = Some(err);
    }

    pub fn fail_next_wait(&mut self, err: TransportError) {
        self.fail_wait = Some(err);
    }

    /// Every frame sent so far, one stream per output.
    pub fn frames(&self) -> &[Vec<PulseStream>] {
        &self.frames
    }

    pub fn last_frame(&self) -> Option<&[PulseStream]> {
        self.frames.last().map(Vec::as_slice)
    }

    /// Wire bytes of `output` in the last frame.
    pub fn last_wire_bytes(&self, output: usize) -> Option<Result<Vec<u8>, DecodeError>> {
        self.last_frame()
            .and_then(|frame| frame.get(output))
            .map(decode)
    }

    pub fn clear_frames(&mut self) {
        self.frames.clear();
    }

    /// The DMA image of the last frame, while open.
    pub fn dma_image(&self) -> Option<&[u32]> {
        self.session.as_ref().map(|s| s.dma.as_slice())
    }

    /// How many times the peripheral has been opened.
    pub fn open_count(&self) -> usize {
        self.open_count
    }

    fn check_outputs(strip: &StripConfig, outputs: &[Output]) -> Result<(), TransportError> {
        if strip.dma_channel > MAX_DMA_CHANNEL {
            return Err(TransportError::InvalidDma {
                dma_channel: strip.dma_channel,
            });
        }
        if RESERVED_DMA.contains(&strip.dma_channel) {
            log::warn!(
                "DMA channel {} is usually reserved by the firmware",
                strip.dma_channel
            );
        }
        let mut functions = Vec::with_capacity(outputs.len());
        for output in outputs {
            let function = PinFunction::for_gpio(output.gpio_pin).ok_or(
                TransportError::InvalidPin {
                    pin: output.gpio_pin,
                },
            )?;
            functions.push(function);
        }
        match (outputs, functions.as_slice()) {
            ([], _) => Err(TransportError::Unsupported {
                reason: "no active outputs".to_string(),
            }),
            ([_], _) => Ok(()),
            ([a, b], [PinFunction::Pwm(x), PinFunction::Pwm(y)]) => {
                if x == y {
                    Err(TransportError::PinConflict {
                        first: a.gpio_pin,
                        second: b.gpio_pin,
                    })
                } else {
                    Ok(())
                }
            }
            ([_, _], _) => Err(TransportError::Unsupported {
                reason: "two outputs need two PWM pins".to_string(),
            }),
            _ => Err(TransportError::Unsupported {
                reason: format!("{} outputs", outputs.len()),
            }),
        }
    }
}

impl Transport for LoopbackTransport {
    fn open(&mut self, strip: &StripConfig, outputs: &[Output]) -> Result<(), TransportError> {
        if self.session.is_some() {
            return Err(TransportError::InUse {
                dma_channel: strip.dma_channel,
            });
        }
        if let Some(err) = self.fail_open.take() {
            return Err(err);
        }
        Self::check_outputs(strip, outputs)?;

        let words = outputs.iter().map(|o| o.words).max().unwrap_or(0);
        self.session = Some(Session {
            outputs: outputs.to_vec(),
            dma: vec![0; words * PWM_CHANNELS],
            in_flight: None,
        });
        self.open_count += 1;
        log::debug!(
            "loopback: open dma={} freq={} outputs={:?}",
            strip.dma_channel,
            strip.frequency,
            outputs
        );
        Ok(())
    }

    fn transmit(&mut self, streams: &[&PulseStream]) -> Result<(), TransportError> {
        let realtime = self.realtime;
        let session = self.session.as_mut().ok_or(TransportError::NotOpen)?;
        if let Some(transfer) = &session.in_flight {
            if realtime && transfer.started.elapsed() < transfer.duration {
                return Err(TransportError::Busy);
            }
        }
        if let Some(err) = self.fail_transmit.take() {
            return Err(err);
        }
        if streams.len() != session.outputs.len() {
            return Err(TransportError::Hardware {
                message: format!(
                    "{} streams for {} outputs",
                    streams.len(),
                    session.outputs.len()
                ),
            });
        }

        let slots = session.dma.len() / PWM_CHANNELS;
        let mut duration = Duration::ZERO;
        for (slot, stream) in streams.iter().enumerate() {
            let words = stream.words();
            if words.len() > slots {
                return Err(TransportError::Hardware {
                    message: format!("stream of {} words exceeds DMA buffer", words.len()),
                });
            }
            // Idle level past the end of a shorter stream
            let idle = if stream.is_inverted() { !0 } else { 0 };
            for (i, dst) in session
                .dma
                .iter_mut()
                .skip(slot)
                .step_by(PWM_CHANNELS)
                .enumerate()
            {
                *dst = words.get(i).copied().unwrap_or(idle);
            }
            duration = duration.max(stream.layout().frame_duration());
        }

        self.frames
            .push(streams.iter().map(|s| (*s).clone()).collect());
        session.in_flight = Some(Transfer {
            started: Instant::now(),
            duration,
        });
        Ok(())
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), TransportError> {
        let realtime = self.realtime;
        let session = self.session.as_mut().ok_or(TransportError::NotOpen)?;
        if let Some(err) = self.fail_wait.take() {
            return Err(err);
        }
        let Some(transfer) = &session.in_flight else {
            return Ok(());
        };
        if realtime {
            let remaining = transfer.duration.saturating_sub(transfer.started.elapsed());
            if remaining > timeout {
                thread::sleep(timeout);
                return Err(TransportError::Timeout { after: timeout });
            }
            thread::sleep(remaining);
        }
        session.in_flight = None;
        Ok(())
    }

    fn close(&mut self) {
        if self.session.take().is_some() {
            log::debug!("loopback: closed");
        }
    }

    fn is_open(&self) -> bool {
        self.session.is_some()
    }
}

//! WS281x pulse encoding.
//!
//! The output is a stream of PWM symbols clocked at three times the carrier
//! frequency. Every data bit becomes three symbols: `110` for a one and `100`
//! for a zero, so the high time alone tells the LED which bit it got. Bytes go
//! out MSB first, one wire slot per byte, and each frame is followed by a low
//! reset gap of at least [`RESET_US`].
//!
//! Symbols are packed MSB first into 32-bit words, the unit the DMA engine
//! feeds to the PWM FIFO.

use std::time::Duration;

use crate::config::ChannelConfig;

pub const SYMBOLS_PER_BIT: usize = 3;
/// Minimum low time between frames, in microseconds
pub const RESET_US: u64 = 55;
/// Largest frame one DMA transfer carries, in 32-bit words (4 MiB)
pub const MAX_FRAME_WORDS: usize = 1 << 20;

const SYMBOL_ONE: u32 = 0b110;
const SYMBOL_ZERO: u32 = 0b100;
const SYMBOLS_PER_BYTE: u32 = 8 * SYMBOLS_PER_BIT as u32;

const fn byte_symbols(byte: u8) -> u32 {
    let mut out = 0_u32;
    let mut i = 8;
    while i > 0 {
        i -= 1;
        let symbol = if (byte >> i) & 1 == 1 {
            SYMBOL_ONE
        } else {
            SYMBOL_ZERO
        };
        out = (out << SYMBOLS_PER_BIT) | symbol;
    }
    out
}

const fn symbol_table() -> [u32; 256] {
    let mut table = [0_u32; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = byte_symbols(i as u8);
        i += 1;
    }
    table
}

// 24 symbols per byte, low 24 bits used
static SYMBOL_TABLE: [u32; 256] = symbol_table();

pub fn symbol_rate(frequency: u32) -> u64 {
    u64::from(frequency) * SYMBOLS_PER_BIT as u64
}

/// Number of low symbols needed to cover the reset gap.
pub fn reset_symbols(frequency: u32) -> usize {
    (RESET_US * symbol_rate(frequency)).div_ceil(1_000_000) as usize
}

/// Size of one channel's encoded frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamLayout {
    pub pixel_count: usize,
    pub colours: usize,
    pub frequency: u32,
    /// Symbols carrying pixel data
    pub data_bits: usize,
    /// Reset gap symbols, before padding to a whole word
    pub reset_bits: usize,
    pub words: usize,
}

impl StreamLayout {
    pub fn new(config: &ChannelConfig, frequency: u32) -> Self {
        let colours = config.strip_type.colours();
        let data_bits = config.pixel_count * colours * 8 * SYMBOLS_PER_BIT;
        let reset_bits = reset_symbols(frequency);
        Self {
            pixel_count: config.pixel_count,
            colours,
            frequency,
            data_bits,
            reset_bits,
            words: (data_bits + reset_bits).div_ceil(32),
        }
    }

    /// Like [`new`](Self::new), but `None` when the frame would overflow or
    /// not fit in [`MAX_FRAME_WORDS`].
    pub fn checked(config: &ChannelConfig, frequency: u32) -> Option<Self> {
        let per_pixel = config.strip_type.colours() * 8 * SYMBOLS_PER_BIT;
        let words = config
            .pixel_count
            .checked_mul(per_pixel)?
            .checked_add(reset_symbols(frequency))?
            .div_ceil(32);
        (words <= MAX_FRAME_WORDS).then(|| Self::new(config, frequency))
    }

    pub fn total_bits(&self) -> usize {
        self.words * 32
    }

    /// Time the frame occupies on the wire, reset gap included.
    pub fn frame_duration(&self) -> Duration {
        let rate = symbol_rate(self.frequency).max(1);
        Duration::from_nanos((self.total_bits() as u64 * 1_000_000_000).div_ceil(rate))
    }
}

/// One channel's encoded symbols, sized by its [`StreamLayout`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PulseStream {
    layout: StreamLayout,
    invert: bool,
    words: Vec<u32>,
}

impl PulseStream {
    pub fn new(layout: StreamLayout) -> Self {
        Self {
            layout,
            invert: false,
            words: vec![0; layout.words],
        }
    }

    pub fn layout(&self) -> &StreamLayout {
        &self.layout
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Logical symbol at `index`, with output inversion undone.
    pub fn symbol(&self, index: usize) -> bool {
        let word = self.words[index / 32];
        let bit = (word >> (31 - index % 32)) & 1 == 1;
        bit != self.invert
    }

    /// Raw output level at `index` as it appears on the pin.
    pub fn level(&self, index: usize) -> bool {
        (self.words[index / 32] >> (31 - index % 32)) & 1 == 1
    }
}

/// Encode `leds` into `stream`, scaling every byte by the channel brightness.
///
/// `stream` must have been built from the same channel config; its buffer is
/// reused so a render does not allocate.
pub fn encode(config: &ChannelConfig, leds: &[u32], stream: &mut PulseStream) {
    debug_assert_eq!(stream.layout.pixel_count, leds.len());

    let shifts = config.strip_type.shifts();
    let colours = config.strip_type.colours();
    let scale = u32::from(config.brightness) + 1;

    let mut acc = 0_u64;
    let mut pending = 0_u32;
    let mut index = 0;
    for led in leds.iter().take(stream.layout.pixel_count) {
        for shift in &shifts[..colours] {
            let byte = (((led >> shift) & 0xff) * scale) >> 8;
            acc = (acc << SYMBOLS_PER_BYTE) | u64::from(SYMBOL_TABLE[byte as usize]);
            pending += SYMBOLS_PER_BYTE;
            while pending >= 32 {
                pending -= 32;
                stream.words[index] = (acc >> pending) as u32;
                acc &= (1_u64 << pending) - 1;
                index += 1;
            }
        }
    }
    if pending > 0 {
        stream.words[index] = (acc << (32 - pending)) as u32;
        index += 1;
    }
    // Reset gap and padding
    stream.words[index..].fill(0);

    stream.invert = config.invert;
    if config.invert {
        for word in stream.words.iter_mut() {
            *word = !*word;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum DecodeError {
    #[display("malformed symbol group at bit {offset}")]
    Symbol { offset: usize },
    #[display("reset gap not low at bit {offset}")]
    Gap { offset: usize },
}

/// Recover the wire bytes (brightness already applied) from a stream.
pub fn decode(stream: &PulseStream) -> Result<Vec<u8>, DecodeError> {
    let layout = stream.layout;
    let mut bytes = Vec::with_capacity(layout.pixel_count * layout.colours);
    let mut offset = 0;
    for _ in 0..layout.pixel_count * layout.colours {
        let mut byte = 0_u8;
        for _ in 0..8 {
            let group = (
                stream.symbol(offset),
                stream.symbol(offset + 1),
                stream.symbol(offset + 2),
            );
            let bit = match group {
                (true, true, false) => 1,
                (true, false, false) => 0,
                _ => return Err(DecodeError::Symbol { offset }),
            };
            byte = (byte << 1) | bit;
            offset += SYMBOLS_PER_BIT;
        }
        bytes.push(byte);
    }
    if let Some(offset) = (offset..layout.total_bits()).find(|i| stream.symbol(*i)) {
        return Err(DecodeError::Gap { offset });
    }
    Ok(bytes)
}

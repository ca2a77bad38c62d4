//! Driver configuration.
//!
//! [`StripConfig`] and [`ChannelConfig`] are the typed settings the driver is
//! initialized with. [`InitOptions`] is the loosely-typed object a host passes
//! in (every key optional, camelCase), resolved once into the typed configs.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

pub const DEFAULT_FREQUENCY: u32 = 800_000;
pub const DEFAULT_DMA_CHANNEL: u8 = 10;
pub const DEFAULT_GPIO_PIN: u8 = 18;
pub const DEFAULT_SECONDARY_GPIO_PIN: u8 = 13;
pub const DEFAULT_PIXEL_COUNT: usize = 10;
pub const DEFAULT_BRIGHTNESS: u8 = 255;

const SHIFT_WMASK: u32 = 0xf000_0000;

/// Wire byte order of a strip.
///
/// The discriminant is the code exported by the host library: bytes 2, 1, 0
/// and 3 hold the bit shift of the pixel byte sent in wire slots 0 to 3.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "StripTypeRepr")]
#[repr(u32)]
pub enum StripType {
    #[default]
    Rgb = 0x0010_0800,
    Rbg = 0x0010_0008,
    Grb = 0x0008_1000,
    Gbr = 0x0008_0010,
    Brg = 0x0000_1008,
    Bgr = 0x0000_0810,
    Rgbw = 0x1810_0800,
    Rbgw = 0x1810_0008,
    Grbw = 0x1808_1000,
    Gbrw = 0x1808_0010,
    Brgw = 0x1800_1008,
    Bgrw = 0x1800_0810,
}

const ALL_STRIP_TYPES: [(StripType, &str); 12] = [
    (StripType::Rgb, "RGB"),
    (StripType::Rbg, "RBG"),
    (StripType::Grb, "GRB"),
    (StripType::Gbr, "GBR"),
    (StripType::Brg, "BRG"),
    (StripType::Bgr, "BGR"),
    (StripType::Rgbw, "RGBW"),
    (StripType::Rbgw, "RBGW"),
    (StripType::Grbw, "GRBW"),
    (StripType::Gbrw, "GBRW"),
    (StripType::Brgw, "BRGW"),
    (StripType::Bgrw, "BGRW"),
];

impl StripType {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        ALL_STRIP_TYPES
            .iter()
            .find(|(t, _)| *t == self)
            .map(|(_, n)| *n)
            .unwrap_or("RGB")
    }

    /// Number of bytes sent per pixel (3 or 4).
    pub fn colours(self) -> usize {
        if self.code() & SHIFT_WMASK != 0 {
            4
        } else {
            3
        }
    }

    /// Bit shift into the packed pixel for each wire slot, in send order.
    pub fn shifts(self) -> [u32; 4] {
        let code = self.code();
        [
            (code >> 16) & 0xff,
            (code >> 8) & 0xff,
            code & 0xff,
            (code >> 24) & 0xff,
        ]
    }
}

impl TryFrom<u32> for StripType {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self> {
        ALL_STRIP_TYPES
            .iter()
            .map(|(t, _)| *t)
            .find(|t| t.code() == code)
            .ok_or_else(|| Error::config(format!("unknown strip type code {code:#010x}")))
    }
}

impl FromStr for StripType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        // Accept the host constant names as well (WS2811_STRIP_GRB, SK6812_STRIP_RGBW)
        let name = upper
            .strip_prefix("WS2811_STRIP_")
            .or_else(|| upper.strip_prefix("SK6812_STRIP_"))
            .unwrap_or(&upper);
        ALL_STRIP_TYPES
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(t, _)| *t)
            .ok_or_else(|| Error::config(format!("unknown strip type {s:?}")))
    }
}

impl fmt::Display for StripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StripTypeRepr {
    Code(u32),
    Name(String),
}

impl TryFrom<StripTypeRepr> for StripType {
    type Error = String;

    fn try_from(repr: StripTypeRepr) -> core::result::Result<Self, String> {
        match repr {
            StripTypeRepr::Code(code) => StripType::try_from(code),
            StripTypeRepr::Name(name) => name.parse(),
        }
        .map_err(|e| e.to_string())
    }
}

/// Settings shared by both channels. Fixed for the lifetime of a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StripConfig {
    /// Target carrier frequency in Hz (typically 800 kHz, 400 kHz for older strips)
    pub frequency: u32,
    pub dma_channel: u8,
    /// Output pin for channel 0
    pub gpio_pin: u8,
    /// Output pin for channel 1, ignored while channel 1 is unused
    pub secondary_gpio_pin: u8,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            frequency: DEFAULT_FREQUENCY,
            dma_channel: DEFAULT_DMA_CHANNEL,
            gpio_pin: DEFAULT_GPIO_PIN,
            secondary_gpio_pin: DEFAULT_SECONDARY_GPIO_PIN,
        }
    }
}

/// Per-channel settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    pub pixel_count: usize,
    /// Hardware brightness byte, applied at encode time as `c * (b + 1) >> 8`
    pub brightness: u8,
    pub strip_type: StripType,
    /// Invert output polarity (for inverting level shifters)
    pub invert: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            pixel_count: DEFAULT_PIXEL_COUNT,
            brightness: DEFAULT_BRIGHTNESS,
            strip_type: StripType::default(),
            invert: false,
        }
    }
}

impl ChannelConfig {
    pub fn is_used(&self) -> bool {
        self.pixel_count > 0
    }
}

/// Scale a host-side brightness (nominally 0-100) into the hardware byte.
///
/// The factor is 2.55 and the result truncates, so 100 maps to 254 and 50 to
/// 127. Values outside 0-100 are not rejected: they saturate at 0 and 255.
pub fn scale_brightness(percent: i32) -> u8 {
    (f64::from(percent) * 2.55) as u8
}

/// Per-channel keys of the host options object.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOptions {
    pub count: Option<usize>,
    pub gpio_pin: Option<u8>,
    pub strip_type: Option<StripType>,
    pub invert: Option<bool>,
    /// Host-side brightness, see [`scale_brightness`]
    pub brightness: Option<i32>,
}

impl ChannelOptions {
    fn resolve(&self, default_count: usize) -> ChannelConfig {
        let defaults = ChannelConfig::default();
        ChannelConfig {
            pixel_count: self.count.unwrap_or(default_count),
            brightness: self
                .brightness
                .map(scale_brightness)
                .unwrap_or(defaults.brightness),
            strip_type: self.strip_type.unwrap_or(defaults.strip_type),
            invert: self.invert.unwrap_or(defaults.invert),
        }
    }
}

/// The host's initialize argument.
///
/// ```json
/// { "count": 16, "stripType": "GRB", "brightness": 20,
///   "channel1": { "count": 8, "gpioPin": 13 } }
/// ```
///
/// Channel 0 keys sit at the top level; `channel1` is optional and unused
/// unless it has a non-zero `count`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOptions {
    pub frequency: Option<u32>,
    pub dma_num: Option<u8>,
    #[serde(flatten)]
    pub channel: ChannelOptions,
    pub channel1: Option<ChannelOptions>,
}

impl InitOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Apply defaults to every missing key.
    pub fn resolve(&self) -> (StripConfig, ChannelConfig, Option<ChannelConfig>) {
        let defaults = StripConfig::default();
        let strip = StripConfig {
            frequency: self.frequency.unwrap_or(defaults.frequency),
            dma_channel: self.dma_num.unwrap_or(defaults.dma_channel),
            gpio_pin: self.channel.gpio_pin.unwrap_or(defaults.gpio_pin),
            secondary_gpio_pin: self
                .channel1
                .as_ref()
                .and_then(|c| c.gpio_pin)
                .unwrap_or(defaults.secondary_gpio_pin),
        };
        let channel0 = self.channel.resolve(DEFAULT_PIXEL_COUNT);
        let channel1 = self
            .channel1
            .as_ref()
            .map(|c| c.resolve(0))
            .filter(ChannelConfig::is_used);
        (strip, channel0, channel1)
    }
}

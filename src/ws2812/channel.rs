use crate::config::ChannelConfig;

/// One output channel: its configuration and frame buffer.
///
/// Pixels are packed `0xWWRRGGBB`. Brightness lives in the config and is only
/// applied by the encoder, never stored into the pixel data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Channel {
    config: ChannelConfig,
    leds: Vec<u32>,
}

impl Channel {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            leds: vec![0; config.pixel_count],
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Replace the configuration. A different pixel count reallocates a
    /// zero-filled frame buffer; otherwise the pixels are kept.
    pub fn set_config(&mut self, config: ChannelConfig) {
        if config.pixel_count != self.config.pixel_count {
            self.leds = vec![0; config.pixel_count];
        }
        self.config = config;
    }

    pub fn pixel_count(&self) -> usize {
        self.leds.len()
    }

    /// Frame buffer size in bytes.
    pub fn capacity(&self) -> usize {
        self.leds.len() * 4
    }

    /// Copy host bytes over the start of the frame buffer.
    ///
    /// At most [`capacity`](Self::capacity) bytes are taken; anything longer
    /// is dropped. A shorter buffer only overwrites its own length and the
    /// rest of the frame keeps the previous contents, down to the byte within
    /// a partly covered pixel. Pixels are read little-endian. Returns the
    /// number of bytes copied.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.capacity());
        for (led, chunk) in self.leds.iter_mut().zip(bytes[..n].chunks(4)) {
            let mut word = led.to_le_bytes();
            word[..chunk.len()].copy_from_slice(chunk);
            *led = u32::from_le_bytes(word);
        }
        n
    }

    pub fn clear(&mut self) {
        self.leds.fill(0);
    }

    pub fn leds(&self) -> &[u32] {
        &self.leds
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.leds.iter().copied()
    }
}

#![allow(dead_code)]

use std::sync::{Mutex, MutexGuard, PoisonError};

use ws281x_driver::ChannelConfig;

/// Tests in one binary share the process-wide peripheral.
pub fn serial() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn channel(pixel_count: usize) -> ChannelConfig {
    ChannelConfig {
        pixel_count,
        ..Default::default()
    }
}

/// `n` pixels of `0x00RRGGBB` as little-endian host bytes.
pub fn pixel_bytes(pixels: &[u32]) -> Vec<u8> {
    pixels.iter().flat_map(|p| p.to_le_bytes()).collect()
}

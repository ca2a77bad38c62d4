//! Process-wide ownership of the LED peripheral.
//!
//! There is one DMA/PWM engine per process, so at most one [`Claim`] can be
//! live at a time. The claim is released when it is dropped.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::StripConfig;
use crate::transport::TransportError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner {
    pub dma_channel: u8,
    pub gpio_pin: u8,
}

static PERIPHERAL: Mutex<Option<Owner>> = Mutex::new(None);

fn peripheral() -> MutexGuard<'static, Option<Owner>> {
    // The guarded value is plain data, a panic elsewhere cannot corrupt it
    PERIPHERAL.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive hold on the peripheral.
#[derive(Debug)]
pub struct Claim {
    owner: Owner,
}

impl Claim {
    pub fn acquire(strip: &StripConfig) -> Result<Self, TransportError> {
        let mut current = peripheral();
        if let Some(owner) = *current {
            return Err(TransportError::InUse {
                dma_channel: owner.dma_channel,
            });
        }
        let owner = Owner {
            dma_channel: strip.dma_channel,
            gpio_pin: strip.gpio_pin,
        };
        *current = Some(owner);
        Ok(Self { owner })
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        *peripheral() = None;
    }
}

/// Current holder of the peripheral, if any.
pub fn owner() -> Option<Owner> {
    *peripheral()
}

pub fn is_claimed() -> bool {
    owner().is_some()
}

#[cfg(test)]
pub(crate) fn test_lock() -> MutexGuard<'static, ()> {
    // Unit tests share one process and therefore one peripheral
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

use crate::config::{scale_brightness, InitOptions};
use crate::driver::DriverHandle;
use crate::rgb::Rgb;
use crate::transport::Transport;
use crate::{Error, Result};

/// Pixel-level API over a [`DriverHandle`].
///
/// Keeps its own pixel array for channel 0; [`show`](Self::show) pushes it
/// to the strip. Everything except `init` and `reset` fails with
/// [`Error::NotInitialized`] until the strip is initialized.
pub struct LedStrip<T: Transport> {
    driver: Option<DriverHandle<T>>,
    pixels: Vec<u32>,
}

impl<T: Transport> Default for LedStrip<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> LedStrip<T> {
    pub fn new() -> Self {
        Self {
            driver: None,
            pixels: Vec::new(),
        }
    }

    pub fn init(&mut self, transport: T, options: &InitOptions) -> Result<()> {
        let (strip, channel0, channel1) = options.resolve();
        let driver = DriverHandle::initialize(transport, strip, channel0, channel1)?;
        self.pixels = vec![0; channel0.pixel_count];
        self.driver = Some(driver);
        Ok(())
    }

    pub fn init_json(&mut self, transport: T, options: &str) -> Result<()> {
        self.init(transport, &InitOptions::from_json(options)?)
    }

    pub fn is_initialized(&self) -> bool {
        self.driver.is_some()
    }

    pub fn driver(&self) -> Option<&DriverHandle<T>> {
        self.driver.as_ref()
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    fn ensure_initialized(&self) -> Result<()> {
        match self.driver {
            Some(_) => Ok(()),
            None => Err(Error::NotInitialized),
        }
    }

    pub fn set_pixel(&mut self, position: usize, colour: Rgb) -> Result<()> {
        self.ensure_initialized()?;
        let len = self.pixels.len();
        let pixel = self
            .pixels
            .get_mut(position)
            .ok_or_else(|| Error::argument(format!("pixel {position} outside 0..{len}")))?;
        *pixel = colour.to_u32();
        Ok(())
    }

    pub fn fill(&mut self, colour: Rgb) -> Result<()> {
        self.ensure_initialized()?;
        self.pixels.fill(colour.to_u32());
        Ok(())
    }

    pub fn pixel(&self, position: usize) -> Result<Rgb> {
        self.ensure_initialized()?;
        self.pixels
            .get(position)
            .map(|p| Rgb::from(*p))
            .ok_or_else(|| {
                Error::argument(format!("pixel {position} outside 0..{}", self.pixels.len()))
            })
    }

    /// Send the pixel array to the strip.
    pub fn show(&mut self) -> Result<()> {
        let driver = self.driver.as_mut().ok_or(Error::NotInitialized)?;
        let bytes: Vec<u8> = self.pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        driver.render(&bytes)
    }

    /// Render a raw host buffer, bypassing the pixel array.
    pub fn render(&mut self, buffer: &[u8]) -> Result<()> {
        self.driver
            .as_mut()
            .ok_or(Error::NotInitialized)?
            .render(buffer)
    }

    /// Overall brightness as a percentage (0-100), applied from the next frame.
    pub fn set_brightness(&mut self, percent: i32) -> Result<()> {
        let driver = self.driver.as_mut().ok_or(Error::NotInitialized)?;
        if !(0..=100).contains(&percent) {
            return Err(Error::argument(format!(
                "brightness {percent} outside 0-100"
            )));
        }
        driver.set_brightness(i32::from(scale_brightness(percent)))
    }

    /// Blank the strip and release the hardware. Does nothing when not
    /// initialized.
    pub fn reset(&mut self) -> Result<()> {
        match self.driver.take() {
            Some(mut driver) => driver.reset(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::test_lock;
    use crate::rgb;
    use crate::transport::LoopbackTransport;
    use crate::ErrorKind;

    #[test]
    fn uninitialized_calls_fail() {
        let mut strip: LedStrip<LoopbackTransport> = LedStrip::new();
        assert!(matches!(
            strip.set_pixel(0, rgb::RED),
            Err(Error::NotInitialized)
        ));
        assert!(matches!(strip.fill(rgb::RED), Err(Error::NotInitialized)));
        assert!(matches!(strip.pixel(0), Err(Error::NotInitialized)));
        assert!(matches!(strip.show(), Err(Error::NotInitialized)));
        assert!(matches!(strip.render(&[]), Err(Error::NotInitialized)));
        assert!(matches!(
            strip.set_brightness(10),
            Err(Error::NotInitialized)
        ));
        strip.reset().unwrap();
    }

    #[test]
    fn pixels_round_trip_through_wire() {
        let _serial = test_lock();
        let mut strip = LedStrip::new();
        strip
            .init_json(LoopbackTransport::new(), r#"{"count": 3, "stripType": "GRB"}"#)
            .unwrap();
        assert_eq!(strip.len(), 3);
        strip.fill(rgb::BLUE).unwrap();
        strip.set_pixel(1, rgb::Rgb::new(1, 2, 3)).unwrap();
        assert_eq!(strip.pixel(1).unwrap(), rgb::Rgb::new(1, 2, 3));
        assert_eq!(
            strip.set_pixel(3, rgb::RED).unwrap_err().kind(),
            ErrorKind::Argument
        );
        assert_eq!(strip.pixel(7).unwrap_err().kind(), ErrorKind::Argument);
        strip.show().unwrap();

        let transport = strip.driver().unwrap().transport();
        assert_eq!(
            transport.last_wire_bytes(0).unwrap().unwrap(),
            vec![0, 0, 255, 2, 1, 3, 0, 0, 255]
        );
        strip.reset().unwrap();
        assert!(!strip.is_initialized());
    }

    #[test]
    fn brightness_percent() {
        let _serial = test_lock();
        let mut strip = LedStrip::new();
        strip
            .init(
                LoopbackTransport::new(),
                &InitOptions::from_json(r#"{"count": 1}"#).unwrap(),
            )
            .unwrap();
        for percent in [-1, 101] {
            assert_eq!(
                strip.set_brightness(percent).unwrap_err().kind(),
                ErrorKind::Argument
            );
        }
        strip.set_brightness(50).unwrap();
        let driver = strip.driver().unwrap();
        assert_eq!(driver.channel(0).unwrap().config().brightness, 127);
    }
}

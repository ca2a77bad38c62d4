#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

pub const OFF: Rgb = Rgb { r: 0, g: 0, b: 0 };
pub const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };
pub const GREEN: Rgb = Rgb { r: 0, g: 255, b: 0 };
pub const BLUE: Rgb = Rgb { r: 0, g: 0, b: 255 };
pub const WHITE: Rgb = Rgb {
    r: 255,
    g: 255,
    b: 255,
};

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
    /// Packs as `0x00RRGGBB`, the layout the frame buffer expects.
    #[inline]
    pub fn to_u32(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

impl From<u32> for Rgb {
    fn from(packed: u32) -> Self {
        Self {
            r: (packed >> 16) as u8,
            g: (packed >> 8) as u8,
            b: packed as u8,
        }
    }
}

impl From<Rgb> for u32 {
    fn from(rgb: Rgb) -> Self {
        rgb.to_u32()
    }
}

impl Default for Rgb {
    fn default() -> Self {
        OFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packing() {
        assert_eq!(RED.to_u32(), 0x00ff_0000);
        assert_eq!(Rgb::new(1, 2, 3).to_u32(), 0x0001_0203);
        assert_eq!(Rgb::from(0xaa11_2233), Rgb::new(0x11, 0x22, 0x33));
        assert_eq!(u32::from(WHITE), 0x00ff_ffff);
        assert_eq!(Rgb::default(), OFF);
    }
}

//! Pixel values and HSV conversion.

use crate::Error;

/// An RGB pixel with 8 bits per channel.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Pixel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Pixel {
    pub const BLACK: Pixel = Pixel::rgb(0, 0, 0);
    pub const WHITE: Pixel = Pixel::rgb(255, 255, 255);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Pixel { red, green, blue }
    }

    /// Converts hue, saturation, and value (each in [0, 1]) to RGB.
    ///
    /// A hue of 1.0 is the same color as a hue of 0.0.
    /// Components outside [0, 1] (including NaN) are an error.
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Result<Self, Error> {
        for (name, v) in [("hue", hue), ("saturation", saturation), ("value", value)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::InvalidColor(format!("hsv {} {} out of bounds", name, v)));
            }
        }

        // https://www.rapidtables.com/convert/color/hsv-to-rgb.html
        let sector = hue * 6.0;
        let c = value * saturation;
        let x = c * (1.0 - ((sector % 2.0) - 1.0).abs());
        let m = value - c;

        let (r, g, b) = match sector.floor() as u32 {
            0 | 6 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            5 => (c, 0.0, x),
            s => {
                return Err(Error::Internal(format!(
                    "hue sector {} out of range for hue {}",
                    s, hue
                )))
            }
        };
        let channel = |v: f64| ((v + m) * 255.0) as u8;
        Ok(Pixel::rgb(channel(r), channel(g), channel(b)))
    }

    /// Packs the pixel as 0x00RRGGBB.
    pub fn to_u32(self) -> u32 {
        (self.blue as u32) | (self.green as u32) << 8 | (self.red as u32) << 16
    }
}

impl std::fmt::Display for Pixel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{})", self.red, self.green, self.blue)
    }
}

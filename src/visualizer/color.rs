// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use crate::raster::ChannelOrder;

/// RGB color used by the overlay renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Red color.
    pub const RED: Color = Color(255, 0, 0);
    /// Green color.
    pub const GREEN: Color = Color(0, 255, 0);
    /// Blue color.
    pub const BLUE: Color = Color(0, 0, 255);
    /// White color.
    pub const WHITE: Color = Color(255, 255, 255);
    /// Black color.
    pub const BLACK: Color = Color(0, 0, 0);

    /// Create a new color from RGB values.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self(r, g, b)
    }

    /// Pixel bytes for this color in a buffer with the given channel order.
    #[must_use]
    pub const fn to_pixel(self, order: ChannelOrder) -> [u8; 3] {
        order.arrange([self.0, self.1, self.2])
    }
}

impl std::str::FromStr for Color {
    type Err = String;

    /// Parse `#rrggbb` or `rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').unwrap_or(s);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected #rrggbb, got '{s}'"));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("invalid color '{s}': {e}"))
        };
        Ok(Self(channel(0)?, channel(2)?, channel(4)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_pixel() {
        assert_eq!(Color::RED.to_pixel(ChannelOrder::Rgb), [255, 0, 0]);
        assert_eq!(Color::RED.to_pixel(ChannelOrder::Bgr), [0, 0, 255]);
        assert_eq!(Color::GREEN.to_pixel(ChannelOrder::Bgr), [0, 255, 0]);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!("#ff8000".parse::<Color>(), Ok(Color(255, 128, 0)));
        assert_eq!("00ff00".parse::<Color>(), Ok(Color::GREEN));
        assert!("#ff80".parse::<Color>().is_err());
        assert!("#gg0000".parse::<Color>().is_err());
    }
}

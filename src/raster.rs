// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoded raster images with an explicit channel order.
//!
//! Decoders, models and renderers disagree about whether the first byte of
//! a pixel is red or blue. [`ImageBuffer`] carries its [`ChannelOrder`] so
//! every stage can ask for the order it needs instead of assuming one.

use image::{DynamicImage, RgbImage};

use crate::error::{AnnotateError, Result};

/// Order of the three color channels within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelOrder {
    /// Red, green, blue.
    Rgb,
    /// Blue, green, red.
    Bgr,
}

impl ChannelOrder {
    /// Number of bytes per pixel for both orders.
    pub const CHANNELS: usize = 3;

    /// Arrange an RGB triple in this order.
    #[must_use]
    pub const fn arrange(self, rgb: [u8; 3]) -> [u8; 3] {
        match self {
            Self::Rgb => rgb,
            Self::Bgr => [rgb[2], rgb[1], rgb[0]],
        }
    }
}

/// A decoded 8-bit, 3-channel raster image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
}

impl ImageBuffer {
    /// Wrap raw interleaved pixel bytes.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if `data` is not exactly `width * height * 3`
    /// bytes or if either dimension is zero.
    pub fn from_raw(width: u32, height: u32, order: ChannelOrder, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AnnotateError::DecodeError(format!(
                "image has zero extent ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * ChannelOrder::CHANNELS;
        if data.len() != expected {
            return Err(AnnotateError::DecodeError(format!(
                "buffer holds {} bytes, expected {expected} for {width}x{height}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            order,
            data,
        })
    }

    /// Build a buffer from a decoded image, dropping alpha and expanding
    /// grayscale to three channels.
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` for zero-sized images.
    pub fn from_dynamic(image: &DynamicImage) -> Result<Self> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        Self::from_raw(width, height, ChannelOrder::Rgb, rgb.into_raw())
    }

    /// Image width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Dimensions as `(width, height)`.
    #[must_use]
    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Channel order of the pixel bytes.
    #[must_use]
    pub const fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Raw interleaved pixel bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at `(x, y)` in the buffer's own order.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * ChannelOrder::CHANNELS;
        Some([self.data[i], self.data[i + 1], self.data[i + 2]])
    }

    /// Return a copy of this buffer in `order`.
    ///
    /// Swapping is exact: each pixel's first and third bytes trade places.
    /// When the order already matches the bytes are cloned unchanged.
    #[must_use]
    pub fn to_order(&self, order: ChannelOrder) -> Self {
        let mut data = self.data.clone();
        if order != self.order {
            for px in data.chunks_exact_mut(ChannelOrder::CHANNELS) {
                px.swap(0, 2);
            }
        }
        Self {
            width: self.width,
            height: self.height,
            order,
            data,
        }
    }

    /// Convert into an `image` crate buffer whose pixel bytes are RGB.
    #[must_use]
    pub fn into_rgb_image(self) -> RgbImage {
        let rgb = if self.order == ChannelOrder::Rgb {
            self
        } else {
            self.to_order(ChannelOrder::Rgb)
        };
        // Length was validated on construction.
        RgbImage::from_raw(rgb.width, rgb.height, rgb.data)
            .unwrap_or_else(|| RgbImage::new(rgb.width, rgb.height))
    }

    /// Consume the buffer, returning its dimensions, order and bytes.
    #[must_use]
    pub fn into_parts(self) -> (u32, u32, ChannelOrder, Vec<u8>) {
        (self.width, self.height, self.order, self.data)
    }
}

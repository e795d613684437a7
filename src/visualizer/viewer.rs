// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image viewer for displaying annotated results.

use minifb::{Key, Window, WindowOptions};

use crate::error::{AnnotateError, Result};
use crate::raster::ImageBuffer;

/// A simple image viewer using minifb.
pub struct Viewer {
    window: Window,
    width: usize,
    height: usize,
    buffer: Vec<u32>,
}

impl Viewer {
    /// Create a new viewer window.
    ///
    /// # Errors
    ///
    /// Returns `VisualizerError` if the window cannot be created.
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let mut window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| AnnotateError::VisualizerError(format!("Failed to create window: {e}")))?;

        window.set_target_fps(60);

        Ok(Self {
            window,
            width,
            height,
            buffer: Vec::new(),
        })
    }

    /// Show an image and block until the window is closed or Escape/Q is
    /// pressed.
    ///
    /// # Errors
    ///
    /// Returns `VisualizerError` if the window cannot be updated.
    pub fn show(&mut self, image: &ImageBuffer) -> Result<()> {
        self.load(image);
        while self.window.is_open()
            && !self.window.is_key_down(Key::Escape)
            && !self.window.is_key_down(Key::Q)
        {
            self.window
                .update_with_buffer(&self.buffer, self.width, self.height)
                .map_err(|e| {
                    AnnotateError::VisualizerError(format!("Failed to update window: {e}"))
                })?;
        }
        Ok(())
    }

    /// Pack an image into the 0x00RRGGBB layout minifb expects.
    fn load(&mut self, image: &ImageBuffer) {
        let rgb = image.to_order(crate::raster::ChannelOrder::Rgb);
        self.width = rgb.width() as usize;
        self.height = rgb.height() as usize;
        self.buffer = rgb
            .as_bytes()
            .chunks_exact(3)
            .map(|px| (u32::from(px[0]) << 16) | (u32::from(px[1]) << 8) | u32::from(px[2]))
            .collect();
    }
}

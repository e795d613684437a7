// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Overlay rendering of pose landmarks.
//!
//! Bones are drawn as thick line segments first, then every landmark gets a
//! filled marker on top. Colors are given in RGB and written in the target
//! buffer's own channel order, so a BGR buffer gets BGR bytes.

use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};

use crate::raster::ImageBuffer;
use crate::results::{Landmark, LandmarkSet};
use crate::visualizer::Color;

type Canvas = image::ImageBuffer<Rgb<u8>, Vec<u8>>;

/// Color and size of one kind of overlay primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawingSpec {
    /// Fill / stroke color.
    pub color: Color,
    /// Line thickness in pixels.
    pub thickness: u32,
    /// Marker radius in pixels.
    pub circle_radius: u32,
}

impl DrawingSpec {
    /// Create a drawing spec.
    #[must_use]
    pub const fn new(color: Color, thickness: u32, circle_radius: u32) -> Self {
        Self {
            color,
            thickness,
            circle_radius,
        }
    }
}

/// Style policy for the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    /// Joint markers. Green, radius 2 by default.
    pub landmark: DrawingSpec,
    /// Bone segments. Red, thickness 2 by default.
    pub connection: DrawingSpec,
    /// When set, landmarks whose visibility (or presence, if reported) is
    /// below this value are not drawn, nor are bones touching them.
    /// `None` draws everything.
    pub visibility_threshold: Option<f32>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            landmark: DrawingSpec::new(Color::GREEN, 2, 2),
            connection: DrawingSpec::new(Color::RED, 2, 2),
            visibility_threshold: None,
        }
    }
}

impl RenderConfig {
    /// Create a configuration with the default style.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the landmark marker style.
    #[must_use]
    pub const fn with_landmark_spec(mut self, spec: DrawingSpec) -> Self {
        self.landmark = spec;
        self
    }

    /// Set the bone style.
    #[must_use]
    pub const fn with_connection_spec(mut self, spec: DrawingSpec) -> Self {
        self.connection = spec;
        self
    }

    /// Only draw landmarks at or above `threshold` confidence.
    #[must_use]
    pub const fn with_visibility_threshold(mut self, threshold: f32) -> Self {
        self.visibility_threshold = Some(threshold);
        self
    }

    fn is_drawn(&self, landmark: &Landmark) -> bool {
        self.visibility_threshold.is_none_or(|t| {
            landmark.visibility >= t && landmark.presence.is_none_or(|p| p >= t)
        })
    }
}

/// Draw a pose onto an image.
///
/// With `None` the image is returned untouched. Otherwise every bone of the
/// landmark set's topology and every landmark is drawn, at
/// `round(x * width), round(y * height)`. Primitives falling partly or wholly
/// outside the frame are clipped. The result has the input's dimensions and
/// channel order.
#[must_use]
pub fn render(image: ImageBuffer, landmarks: Option<&LandmarkSet>, config: &RenderConfig) -> ImageBuffer {
    let Some(landmarks) = landmarks else {
        return image;
    };

    let (width, height, order, data) = image.into_parts();
    let Some(mut canvas) = Canvas::from_raw(width, height, data) else {
        unreachable!("ImageBuffer guarantees width * height * 3 bytes");
    };

    let points: Vec<Option<(i32, i32)>> = landmarks
        .iter()
        .map(|lm| config.is_drawn(lm).then(|| lm.to_pixel(width, height)))
        .collect();

    let line_color = Rgb(config.connection.color.to_pixel(order));
    for [a, b] in landmarks.topology().connections {
        if let (Some(Some(p0)), Some(Some(p1))) = (points.get(*a), points.get(*b)) {
            draw_thick_line(&mut canvas, *p0, *p1, config.connection.thickness, line_color);
        }
    }

    let marker_color = Rgb(config.landmark.color.to_pixel(order));
    #[allow(clippy::cast_possible_wrap)]
    let radius = config.landmark.circle_radius as i32;
    for point in points.iter().flatten() {
        draw_filled_circle_mut(&mut canvas, *point, radius, marker_color);
    }

    ImageBuffer::from_raw(width, height, order, canvas.into_raw())
        .unwrap_or_else(|_| unreachable!("canvas keeps its dimensions"))
}

/// Draw a segment `thickness` pixels wide by stacking one-pixel lines offset
/// across the segment's minor axis.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
fn draw_thick_line(canvas: &mut Canvas, p0: (i32, i32), p1: (i32, i32), thickness: u32, color: Rgb<u8>) {
    let thickness = thickness.max(1) as i32;
    let mostly_horizontal = (p1.0 - p0.0).abs() >= (p1.1 - p0.1).abs();

    for t in 0..thickness {
        let offset = t - (thickness - 1) / 2;
        let (dx, dy) = if mostly_horizontal { (0, offset) } else { (offset, 0) };
        draw_line_segment_mut(
            canvas,
            ((p0.0 + dx) as f32, (p0.1 + dy) as f32),
            ((p1.0 + dx) as f32, (p1.1 + dy) as f32),
            color,
        );
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for pose inference.
//!
//! Images are letterboxed (aspect-preserving resize plus centered gray
//! padding) into the model's input size and normalized to `[0, 1]` floats.
//! [`PreprocessResult`] keeps the transform so model-space coordinates can be
//! mapped back onto the original image.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use fast_image_resize::images::Image;
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use ndarray::Array4;

use crate::error::{AnnotateError, Result};
use crate::raster::{ChannelOrder, ImageBuffer};

/// Default letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Tensor memory layout expected by a model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// `(1, 3, H, W)`.
    Nchw,
    /// `(1, H, W, 3)`.
    Nhwc,
}

/// Result of preprocessing an image.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Normalized input tensor.
    pub tensor: Array4<f32>,
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
}

impl PreprocessResult {
    /// Map a point from model input space to normalized original-image
    /// coordinates.
    ///
    /// Points in the padding map outside `[0, 1]`; they are not clamped.
    #[must_use]
    pub fn to_normalized(&self, x: f32, y: f32) -> (f32, f32) {
        let [ox, oy, _, _] = scale_coords(&[x, y, x, y], self.scale, self.padding);
        let (h, w) = (self.orig_shape.0 as f32, self.orig_shape.1 as f32);
        (ox / w, oy / h)
    }

    /// Original image width in pixels expressed as a model-space length,
    /// used to bring relative depth onto the same scale as `x`.
    #[must_use]
    pub fn scaled_width(&self) -> f32 {
        self.orig_shape.1 as f32 * self.scale.1
    }
}

/// Letterbox an image into `target_size` (height, width) and build the
/// input tensor.
///
/// The image must already be in the channel order the model consumes;
/// preprocessing never reorders channels.
///
/// # Errors
///
/// Returns `InferenceError` if the resize fails.
pub fn preprocess_image(
    image: &ImageBuffer,
    target_size: (usize, usize),
    layout: TensorLayout,
) -> Result<PreprocessResult> {
    let (orig_w, orig_h) = image.dimensions();
    let (new_w, new_h, pad_left, pad_top, scale) =
        calculate_letterbox_params(orig_w, orig_h, target_size);

    let resized = resize(image, new_w, new_h)?;

    let (target_h, target_w) = target_size;
    let mut canvas = vec![0u8; target_h * target_w * 3];
    for px in canvas.chunks_exact_mut(3) {
        px.copy_from_slice(&LETTERBOX_COLOR);
    }
    let row_bytes = new_w as usize * 3;
    for row in 0..new_h as usize {
        let dst_start = ((row + pad_top as usize) * target_w + pad_left as usize) * 3;
        let src_start = row * row_bytes;
        canvas[dst_start..dst_start + row_bytes]
            .copy_from_slice(&resized[src_start..src_start + row_bytes]);
    }

    let tensor = match layout {
        TensorLayout::Nchw => Array4::from_shape_fn((1, 3, target_h, target_w), |(_, c, y, x)| {
            f32::from(canvas[(y * target_w + x) * 3 + c]) * INV_255
        }),
        TensorLayout::Nhwc => Array4::from_shape_fn((1, target_h, target_w, 3), |(_, y, x, c)| {
            f32::from(canvas[(y * target_w + x) * 3 + c]) * INV_255
        }),
    };

    Ok(PreprocessResult {
        tensor,
        scale,
        padding: (pad_top as f32, pad_left as f32),
        orig_shape: (orig_h, orig_w),
    })
}

/// Bilinear resize of the raw pixel bytes.
fn resize(image: &ImageBuffer, new_w: u32, new_h: u32) -> Result<Vec<u8>> {
    let (src_w, src_h) = image.dimensions();
    if (src_w, src_h) == (new_w, new_h) {
        return Ok(image.as_bytes().to_vec());
    }

    let src = Image::from_vec_u8(src_w, src_h, image.as_bytes().to_vec(), PixelType::U8x3)
        .map_err(|e| AnnotateError::InferenceError(format!("Failed to wrap source image: {e}")))?;
    let mut dst = Image::new(new_w, new_h, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| AnnotateError::InferenceError(format!("Failed to resize image: {e}")))?;

    Ok(dst.into_vec())
}

/// Calculate letterbox parameters.
///
/// # Returns
///
/// 1. `new_width`: Scaled width.
/// 2. `new_height`: Scaled height.
/// 3. `pad_left`: Left padding.
/// 4. `pad_top`: Top padding.
/// 5. `(scale_y, scale_x)`: Scale factors.
fn calculate_letterbox_params(
    orig_width: u32,
    orig_height: u32,
    target_size: (usize, usize),
) -> (u32, u32, u32, u32, (f32, f32)) {
    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    let (orig_h, orig_w) = (orig_height as f32, orig_width as f32);

    // Fit within target while maintaining aspect ratio
    let scale = (target_h / orig_h).min(target_w / orig_w);

    let new_w = ((orig_w * scale).round() as u32).clamp(1, target_size.1 as u32);
    let new_h = ((orig_h * scale).round() as u32).clamp(1, target_size.0 as u32);

    let pad_left = (target_size.1 as u32).saturating_sub(new_w) / 2;
    let pad_top = (target_size.0 as u32).saturating_sub(new_h) / 2;

    // Per-axis factors so rounding of the scaled size is undone exactly
    let scale_x = new_w as f32 / orig_w;
    let scale_y = new_h as f32 / orig_h;

    (new_w, new_h, pad_left, pad_top, (scale_y, scale_x))
}

/// Scale coordinates from model output space back to original image space.
///
/// # Arguments
///
/// * `coords` - Coordinates in model space (after letterbox).
/// * `scale` - Scale factors (`scale_y`, `scale_x`) from preprocessing.
/// * `padding` - Padding (`pad_top`, `pad_left`) from preprocessing.
#[must_use]
pub fn scale_coords(coords: &[f32; 4], scale: (f32, f32), padding: (f32, f32)) -> [f32; 4] {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;

    [
        (coords[0] - pad_left) / scale_x,
        (coords[1] - pad_top) / scale_y,
        (coords[2] - pad_left) / scale_x,
        (coords[3] - pad_top) / scale_y,
    ]
}

/// Ensure a buffer is in `order`, cloning only when a swap is needed.
#[must_use]
pub fn ensure_order(image: &ImageBuffer, order: ChannelOrder) -> std::borrow::Cow<'_, ImageBuffer> {
    if image.order() == order {
        std::borrow::Cow::Borrowed(image)
    } else {
        std::borrow::Cow::Owned(image.to_order(order))
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose detection output types.

use ndarray::Array2;

use crate::error::{AnnotateError, Result};
use crate::visualizer::Topology;

/// A single detected keypoint in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    /// Horizontal position, 0.0 at the left edge and 1.0 at the right.
    pub x: f32,
    /// Vertical position, 0.0 at the top edge and 1.0 at the bottom.
    pub y: f32,
    /// Relative depth in the same scale as `x`; smaller is closer.
    pub z: f32,
    /// Likelihood that the landmark is visible (not occluded), 0.0 to 1.0.
    pub visibility: f32,
    /// Likelihood that the landmark lies inside the frame, when reported.
    pub presence: Option<f32>,
}

impl Landmark {
    /// Create a landmark without depth or presence information.
    #[must_use]
    pub const fn new(x: f32, y: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility,
            presence: None,
        }
    }

    /// Set the relative depth.
    #[must_use]
    pub const fn with_z(mut self, z: f32) -> Self {
        self.z = z;
        self
    }

    /// Set the in-frame presence likelihood.
    #[must_use]
    pub const fn with_presence(mut self, presence: f32) -> Self {
        self.presence = Some(presence);
        self
    }

    /// Pixel position in an image of the given size.
    ///
    /// Uses nearest-integer rounding with halves rounded away from zero, so
    /// `x = 0.5` on a 3 pixel wide image maps to column 2.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn to_pixel(&self, width: u32, height: u32) -> (i32, i32) {
        (
            (self.x * width as f32).round() as i32,
            (self.y * height as f32).round() as i32,
        )
    }
}

/// The landmarks of one detected pose, ordered by a fixed [`Topology`].
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    landmarks: Vec<Landmark>,
    topology: &'static Topology,
}

impl LandmarkSet {
    /// Create a landmark set.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` if the number of landmarks does not match
    /// the topology.
    pub fn new(landmarks: Vec<Landmark>, topology: &'static Topology) -> Result<Self> {
        if landmarks.len() != topology.num_landmarks {
            return Err(AnnotateError::InferenceError(format!(
                "{} topology expects {} landmarks, model produced {}",
                topology.name,
                topology.num_landmarks,
                landmarks.len()
            )));
        }
        Ok(Self {
            landmarks,
            topology,
        })
    }

    /// Number of landmarks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Landmark at an anatomical index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Landmark> {
        self.landmarks.get(index)
    }

    /// Iterate over landmarks in topology order.
    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }

    /// Bone topology the landmarks are indexed by.
    #[must_use]
    pub const fn topology(&self) -> &'static Topology {
        self.topology
    }

    /// Normalized coordinates as an `(N, 2)` array.
    #[must_use]
    pub fn xyn(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.landmarks.len(), 2), |(i, j)| {
            let lm = &self.landmarks[i];
            if j == 0 { lm.x } else { lm.y }
        })
    }

    /// Visibility confidences, one per landmark.
    #[must_use]
    pub fn conf(&self) -> Vec<f32> {
        self.landmarks.iter().map(|lm| lm.visibility).collect()
    }
}

impl<'a> IntoIterator for &'a LandmarkSet {
    type Item = &'a Landmark;
    type IntoIter = std::slice::Iter<'a, Landmark>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visualizer::{BLAZEPOSE, COCO};

    #[test]
    fn test_to_pixel_rounds_to_nearest() {
        let lm = Landmark::new(0.5, 0.25, 1.0);
        assert_eq!(lm.to_pixel(3, 10), (2, 3));
        assert_eq!(Landmark::new(0.0, 1.0, 1.0).to_pixel(640, 480), (0, 480));
        assert_eq!(Landmark::new(0.1234, 0.5001, 1.0).to_pixel(100, 100), (12, 50));
    }

    #[test]
    fn test_to_pixel_off_frame() {
        let lm = Landmark::new(-0.1, 1.2, 0.1);
        assert_eq!(lm.to_pixel(100, 100), (-10, 120));
    }

    #[test]
    fn test_landmark_set_checks_cardinality() {
        let err = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 1.0); 17], &BLAZEPOSE).unwrap_err();
        assert!(matches!(err, AnnotateError::InferenceError(_)));

        let set = LandmarkSet::new(vec![Landmark::new(0.5, 0.5, 1.0); 17], &COCO).unwrap();
        assert_eq!(set.len(), 17);
        assert_eq!(set.topology().name, "coco");
    }

    #[test]
    fn test_xyn_and_conf() {
        let mut landmarks = vec![Landmark::new(0.0, 0.0, 0.0); 17];
        landmarks[3] = Landmark::new(0.3, 0.7, 0.9);
        let set = LandmarkSet::new(landmarks, &COCO).unwrap();

        let xyn = set.xyn();
        assert_eq!(xyn.shape(), &[17, 2]);
        assert!((xyn[[3, 0]] - 0.3).abs() < f32::EPSILON);
        assert!((xyn[[3, 1]] - 0.7).abs() < f32::EPSILON);
        assert!((set.conf()[3] - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn test_builders() {
        let lm = Landmark::new(0.1, 0.2, 0.3).with_z(-0.4).with_presence(0.8);
        assert!((lm.z + 0.4).abs() < f32::EPSILON);
        assert_eq!(lm.presence, Some(0.8));
    }
}

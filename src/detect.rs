// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose inference adapter: one image in, at most one landmark set out.

use crate::error::Result;
use crate::model::{PoseContext, PoseRuntime};
use crate::preprocessing::ensure_order;
use crate::raster::ImageBuffer;
use crate::results::LandmarkSet;

/// Runs a [`PoseRuntime`] over single images.
#[derive(Debug, Clone)]
pub struct PoseDetector<R> {
    runtime: R,
}

impl<R: PoseRuntime> PoseDetector<R> {
    /// Wrap a runtime.
    pub const fn new(runtime: R) -> Self {
        Self { runtime }
    }

    /// Borrow the underlying runtime.
    pub const fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Detect a single pose.
    ///
    /// The image is converted to the runtime's channel order first. A model
    /// context is opened for this call alone and dropped before returning,
    /// whether inference succeeds or fails. Finding no pose is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `InferenceError` if the context cannot be opened, the model
    /// fails, or it returns a landmark count that does not fit its topology.
    pub fn detect(&self, image: &ImageBuffer) -> Result<Option<LandmarkSet>> {
        let input = ensure_order(image, self.runtime.input_order());

        let landmarks = {
            let mut context = self.runtime.open()?;
            context.infer(input.as_bytes(), input.width(), input.height())?
        };

        landmarks
            .map(|landmarks| LandmarkSet::new(landmarks, self.runtime.topology()))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotateError;
    use crate::raster::ChannelOrder;
    use crate::results::Landmark;
    use crate::visualizer::{COCO, Topology};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Probe {
        opened: AtomicUsize,
        released: AtomicUsize,
        seen: Mutex<Vec<u8>>,
    }

    #[derive(Clone, Copy)]
    enum Behavior {
        Found,
        Missing,
        Fail,
        WrongCount,
    }

    struct FakeRuntime {
        probe: Arc<Probe>,
        behavior: Behavior,
    }

    struct FakeContext {
        probe: Arc<Probe>,
        behavior: Behavior,
    }

    impl PoseRuntime for FakeRuntime {
        type Context = FakeContext;

        fn open(&self) -> Result<FakeContext> {
            self.probe.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeContext {
                probe: Arc::clone(&self.probe),
                behavior: self.behavior,
            })
        }

        fn topology(&self) -> &'static Topology {
            &COCO
        }
    }

    impl PoseContext for FakeContext {
        fn infer(&mut self, pixels: &[u8], _w: u32, _h: u32) -> Result<Option<Vec<Landmark>>> {
            self.probe.seen.lock().unwrap().extend_from_slice(pixels);
            match self.behavior {
                Behavior::Found => Ok(Some(vec![Landmark::new(0.5, 0.5, 0.9); 17])),
                Behavior::Missing => Ok(None),
                Behavior::Fail => Err(AnnotateError::InferenceError("boom".to_string())),
                Behavior::WrongCount => Ok(Some(vec![Landmark::new(0.5, 0.5, 0.9); 3])),
            }
        }
    }

    impl Drop for FakeContext {
        fn drop(&mut self) {
            self.probe.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn detector(behavior: Behavior) -> (PoseDetector<FakeRuntime>, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let runtime = FakeRuntime {
            probe: Arc::clone(&probe),
            behavior,
        };
        (PoseDetector::new(runtime), probe)
    }

    fn bgr_pixel() -> ImageBuffer {
        ImageBuffer::from_raw(1, 1, ChannelOrder::Bgr, vec![255, 10, 0]).unwrap()
    }

    #[test]
    fn test_model_receives_rgb() {
        let (detector, probe) = detector(Behavior::Found);
        detector.detect(&bgr_pixel()).unwrap();
        // Blue-first input reaches the model with the 255 moved to channel 2.
        assert_eq!(*probe.seen.lock().unwrap(), vec![0, 10, 255]);
    }

    #[test]
    fn test_found_pose() {
        let (detector, probe) = detector(Behavior::Found);
        let set = detector.detect(&bgr_pixel()).unwrap().unwrap();
        assert_eq!(set.len(), 17);
        assert_eq!(probe.opened.load(Ordering::SeqCst), 1);
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_pose_is_not_an_error() {
        let (detector, probe) = detector(Behavior::Missing);
        assert!(detector.detect(&bgr_pixel()).unwrap().is_none());
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_context_released_on_failure() {
        let (detector, probe) = detector(Behavior::Fail);
        let err = detector.detect(&bgr_pixel()).unwrap_err();
        assert!(matches!(err, AnnotateError::InferenceError(_)));
        assert_eq!(probe.opened.load(Ordering::SeqCst), 1);
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wrong_landmark_count_is_inference_error() {
        let (detector, probe) = detector(Behavior::WrongCount);
        let err = detector.detect(&bgr_pixel()).unwrap_err();
        assert!(matches!(err, AnnotateError::InferenceError(_)));
        assert_eq!(probe.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_one_context_per_call() {
        let (detector, probe) = detector(Behavior::Missing);
        for _ in 0..3 {
            detector.detect(&bgr_pixel()).unwrap();
        }
        assert_eq!(probe.opened.load(Ordering::SeqCst), 3);
        assert_eq!(probe.released.load(Ordering::SeqCst), 3);
    }
}

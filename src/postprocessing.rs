// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Decoding of raw pose-model outputs into normalized landmarks.
//!
//! Each decoder returns `Ok(None)` when the model ran fine but found no pose
//! above the configured confidence, and `Err(InferenceError)` when the output
//! tensors are not shaped or valued the way the model kind promises.

#![allow(clippy::cast_precision_loss)]

use ndarray::{Array2, s};

use crate::error::{AnnotateError, Result};
use crate::inference::{InferenceConfig, ModelKind};
use crate::preprocessing::PreprocessResult;
use crate::results::Landmark;

/// A raw output tensor: flat data plus its shape.
pub type RawOutput = (Vec<f32>, Vec<usize>);

/// Values per BlazePose landmark: x, y, z, visibility logit, presence logit.
const BLAZEPOSE_LANDMARK_DIM: usize = 5;

/// Values per COCO keypoint: x, y, confidence.
const KPT_DIM: usize = 3;

/// Decode model outputs according to the configured model kind.
///
/// # Errors
///
/// Returns `InferenceError` for missing, malformed or non-finite outputs.
pub fn postprocess(
    outputs: &[RawOutput],
    preprocess: &PreprocessResult,
    config: &InferenceConfig,
) -> Result<Option<Vec<Landmark>>> {
    match config.model_kind {
        ModelKind::BlazePose => postprocess_blazepose(outputs, preprocess, config),
        ModelKind::YoloPose => {
            let (data, shape) = outputs.first().ok_or_else(|| {
                AnnotateError::InferenceError("YOLO pose model produced no outputs".to_string())
            })?;
            postprocess_yolo_pose(data, shape, preprocess, config)
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn check_finite(values: &[f32], what: &str) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(AnnotateError::InferenceError(format!(
            "{what} contains non-finite values"
        )))
    }
}

/// Decode a BlazePose landmark model.
///
/// The landmark tensor is located by size (a multiple of five holding at least
/// 33 landmarks; the full model emits 39, the last six being auxiliary ROI
/// points which are dropped) and the pose score is the single-element output.
fn postprocess_blazepose(
    outputs: &[RawOutput],
    preprocess: &PreprocessResult,
    config: &InferenceConfig,
) -> Result<Option<Vec<Landmark>>> {
    let topology = ModelKind::BlazePose.topology();
    let min_len = topology.num_landmarks * BLAZEPOSE_LANDMARK_DIM;

    let landmarks = outputs
        .iter()
        .map(|(data, _)| data)
        .find(|data| data.len() >= min_len && data.len() % BLAZEPOSE_LANDMARK_DIM == 0)
        .ok_or_else(|| {
            AnnotateError::InferenceError(format!(
                "no landmark output with at least {min_len} values among {} outputs",
                outputs.len()
            ))
        })?;

    let score = outputs
        .iter()
        .find(|(data, _)| data.len() == 1)
        .map(|(data, _)| data[0])
        .ok_or_else(|| {
            AnnotateError::InferenceError("no pose score output found".to_string())
        })?;

    if !score.is_finite() {
        return Err(AnnotateError::InferenceError(format!(
            "pose score is not finite ({score})"
        )));
    }
    if score < config.min_detection_confidence {
        tracing::debug!(score, "pose score below threshold");
        return Ok(None);
    }

    let used = &landmarks[..min_len];
    check_finite(used, "landmark tensor")?;

    let depth_scale = preprocess.scaled_width();
    let decoded = used
        .chunks_exact(BLAZEPOSE_LANDMARK_DIM)
        .map(|v| {
            let (x, y) = preprocess.to_normalized(v[0], v[1]);
            Landmark::new(x, y, sigmoid(v[3]))
                .with_z(v[2] / depth_scale)
                .with_presence(sigmoid(v[4]))
        })
        .collect();

    Ok(Some(decoded))
}

/// Decode a YOLO pose model, keeping only the highest-scoring person.
///
/// Accepts `(1, features, anchors)` and `(1, anchors, features)` layouts
/// where `features = 4 + classes + 17 * 3`.
fn postprocess_yolo_pose(
    output: &[f32],
    output_shape: &[usize],
    preprocess: &PreprocessResult,
    config: &InferenceConfig,
) -> Result<Option<Vec<Landmark>>> {
    let num_keypoints = ModelKind::YoloPose.topology().num_landmarks;
    let kpt_features = num_keypoints * KPT_DIM;
    let min_features = 4 + 1 + kpt_features;

    let dims: Vec<usize> = output_shape.iter().copied().filter(|&d| d != 1).collect();
    let (a, b) = match dims.as_slice() {
        [a, b] => (*a, *b),
        _ => {
            return Err(AnnotateError::InferenceError(format!(
                "unexpected YOLO pose output shape {output_shape:?}"
            )));
        }
    };

    // Features normally sit on the smaller axis (56 vs thousands of anchors)
    let (num_features, num_preds, is_transposed) = match (a >= min_features, b >= min_features) {
        (true, true) if a <= b => (a, b, false),
        (true, true) | (false, true) => (b, a, true),
        (true, false) => (a, b, false),
        (false, false) => {
            return Err(AnnotateError::InferenceError(format!(
                "YOLO pose output shape {output_shape:?} has fewer than {min_features} features"
            )));
        }
    };
    if output.len() != num_features * num_preds {
        return Err(AnnotateError::InferenceError(format!(
            "YOLO pose output holds {} values, shape {output_shape:?} implies {}",
            output.len(),
            num_features * num_preds
        )));
    }

    // Convert to 2D [preds, features]
    let output_2d = if is_transposed {
        Array2::from_shape_vec((num_preds, num_features), output.to_vec())
    } else {
        Array2::from_shape_vec((num_features, num_preds), output.to_vec()).map(|arr| arr.t().to_owned())
    }
    .map_err(|e| AnnotateError::InferenceError(format!("Failed to reshape output: {e}")))?;

    let num_classes = num_features - 4 - kpt_features;

    // Single person: the best anchor wins, no NMS needed
    let best = (0..num_preds)
        .map(|i| {
            let score = output_2d
                .slice(s![i, 4..4 + num_classes])
                .iter()
                .copied()
                .filter(|v| v.is_finite())
                .fold(0.0f32, f32::max);
            (i, score)
        })
        .max_by(|(_, a), (_, b)| a.total_cmp(b));

    let Some((best_idx, best_score)) = best else {
        return Ok(None);
    };
    if best_score < config.min_detection_confidence {
        tracing::debug!(score = best_score, "no person above threshold");
        return Ok(None);
    }

    let kpt_start = 4 + num_classes;
    let row = output_2d.slice(s![best_idx, kpt_start..kpt_start + kpt_features]);
    let row = row.to_vec();
    check_finite(&row, "keypoint row")?;

    let landmarks = row
        .chunks_exact(KPT_DIM)
        .map(|k| {
            let (x, y) = preprocess.to_normalized(k[0], k[1]);
            Landmark::new(x, y, k[2])
        })
        .collect();

    Ok(Some(landmarks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn identity_preprocess(size: usize) -> PreprocessResult {
        PreprocessResult {
            tensor: Array4::zeros((1, 3, size, size)),
            scale: (1.0, 1.0),
            padding: (0.0, 0.0),
            orig_shape: (size as u32, size as u32),
        }
    }

    fn blazepose_landmarks(num: usize) -> Vec<f32> {
        let mut data = Vec::with_capacity(num * 5);
        for i in 0..num {
            data.extend_from_slice(&[i as f32, 128.0, 25.6, 10.0, -10.0]);
        }
        data
    }

    #[test]
    fn test_blazepose_decode() {
        let outputs = vec![
            (blazepose_landmarks(39), vec![1, 195]),
            (vec![0.97], vec![1, 1]),
        ];
        let preprocess = identity_preprocess(256);
        let landmarks = postprocess(&outputs, &preprocess, &InferenceConfig::default())
            .unwrap()
            .unwrap();

        assert_eq!(landmarks.len(), 33);
        assert!((landmarks[0].x - 0.0).abs() < 1e-6);
        assert!((landmarks[10].x - 10.0 / 256.0).abs() < 1e-6);
        assert!((landmarks[10].y - 0.5).abs() < 1e-6);
        assert!((landmarks[10].z - 0.1).abs() < 1e-6);
        assert!(landmarks[10].visibility > 0.99);
        assert!(landmarks[10].presence.unwrap() < 0.01);
    }

    #[test]
    fn test_blazepose_outputs_in_any_order() {
        let outputs = vec![
            (vec![0.9], vec![1, 1]),
            (blazepose_landmarks(33), vec![1, 165]),
        ];
        let result = postprocess(&outputs, &identity_preprocess(256), &InferenceConfig::default());
        assert_eq!(result.unwrap().map(|l| l.len()), Some(33));
    }

    #[test]
    fn test_blazepose_low_score_is_no_pose() {
        let outputs = vec![
            (blazepose_landmarks(39), vec![1, 195]),
            (vec![0.1], vec![1, 1]),
        ];
        let result = postprocess(&outputs, &identity_preprocess(256), &InferenceConfig::default());
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_blazepose_missing_outputs() {
        let outputs = vec![(vec![0.9], vec![1, 1])];
        let err = postprocess(&outputs, &identity_preprocess(256), &InferenceConfig::default());
        assert!(matches!(err, Err(AnnotateError::InferenceError(_))));
    }

    #[test]
    fn test_blazepose_nan_is_error() {
        let mut landmarks = blazepose_landmarks(39);
        landmarks[7] = f32::NAN;
        let outputs = vec![(landmarks, vec![1, 195]), (vec![0.9], vec![1, 1])];
        let err = postprocess(&outputs, &identity_preprocess(256), &InferenceConfig::default());
        assert!(matches!(err, Err(AnnotateError::InferenceError(_))));
    }

    #[test]
    fn test_postprocess_pose_logic() {
        // Mock output for pose: [1, 56, 100]
        let num_preds = 100;
        let num_features = 56;
        let mut output = vec![0.0; num_preds * num_features];

        // Weak candidate at anchor 0, strong one at anchor 7
        output[num_preds * 4] = 0.6;
        let idx = 7;
        output[idx + num_preds * 4] = 0.9;
        for k in 0..17 {
            let offset = 5 + k * 3;
            output[idx + num_preds * offset] = 320.0;
            output[idx + num_preds * (offset + 1)] = 160.0;
            output[idx + num_preds * (offset + 2)] = 0.8;
        }

        let config = InferenceConfig::default().with_model_kind(ModelKind::YoloPose);
        let landmarks = postprocess(
            &[(output, vec![1, num_features, num_preds])],
            &identity_preprocess(640),
            &config,
        )
        .unwrap()
        .unwrap();

        assert_eq!(landmarks.len(), 17);
        assert!((landmarks[0].x - 0.5).abs() < 1e-6);
        assert!((landmarks[0].y - 0.25).abs() < 1e-6);
        assert!((landmarks[0].visibility - 0.8).abs() < 1e-6);
        assert!(landmarks[0].presence.is_none());
    }

    #[test]
    fn test_yolo_pose_transposed_layout() {
        let num_preds = 3;
        let num_features = 56;
        let mut output = vec![0.0; num_preds * num_features];
        let row = 2 * num_features;
        output[row + 4] = 0.75;
        output[row + 5] = 64.0;
        output[row + 6] = 32.0;
        output[row + 7] = 0.5;

        let config = InferenceConfig::default().with_model_kind(ModelKind::YoloPose);
        let landmarks = postprocess(
            &[(output, vec![1, num_preds, num_features])],
            &identity_preprocess(128),
            &config,
        )
        .unwrap()
        .unwrap();
        assert!((landmarks[0].x - 0.5).abs() < 1e-6);
        assert!((landmarks[0].y - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_yolo_pose_no_person() {
        let output = vec![0.0; 56 * 10];
        let config = InferenceConfig::default().with_model_kind(ModelKind::YoloPose);
        let result = postprocess(&[(output, vec![1, 56, 10])], &identity_preprocess(640), &config);
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_yolo_pose_bad_shape() {
        let config = InferenceConfig::default().with_model_kind(ModelKind::YoloPose);
        let result = postprocess(&[(vec![0.0; 40], vec![1, 4, 10])], &identity_preprocess(640), &config);
        assert!(matches!(result, Err(AnnotateError::InferenceError(_))));

        let result = postprocess(&[(vec![0.0; 8], vec![2, 2, 2])], &identity_preprocess(640), &config);
        assert!(matches!(result, Err(AnnotateError::InferenceError(_))));
    }
}

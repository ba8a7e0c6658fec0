//! SCRFD face screen via ONNX Runtime.
//!
//! Uploads are screened, not recognized: the daemon only needs to know
//! whether a photo plausibly contains a face. This runs SCRFD anchor-free
//! detection over a letterboxed RGB input and returns scored boxes; the
//! landmark outputs of the model are ignored entirely.

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const SCREEN_INPUT_SIZE: u32 = 640;
const SCREEN_MEAN: f32 = 127.5;
const SCREEN_STD: f32 = 128.0;
const SCREEN_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SCREEN_NMS_THRESHOLD: f32 = 0.4;
const SCREEN_STRIDES: [usize; 3] = [8, 16, 32];
const SCREEN_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum ScreenError {
    #[error("model file not found: {0} — download an SCRFD export (e.g. det_10g.onnx) and point DERMA_SCREEN_MODEL at it")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

// ort's session-builder methods return `ort::Error<SessionBuilder>` (the error
// carries a recovery payload). Forward it into the generic `ort::Error` variant.
impl From<ort::Error<ort::session::builder::SessionBuilder>> for ScreenError {
    fn from(err: ort::Error<ort::session::builder::SessionBuilder>) -> Self {
        ScreenError::Ort(err.into())
    }
}

/// A detected face box in original-image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Metadata for mapping letterboxed coordinates back to the upload.
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// SCRFD-based face screen.
pub struct FaceScreen {
    session: Session,
    input_size: u32,
    /// Per-stride (score, bbox) output indices for strides [8, 16, 32].
    /// Discovered by name at load time; falls back to positional ordering.
    stride_indices: [(usize, usize); 3],
}

impl FaceScreen {
    /// Load an SCRFD ONNX export from the given path.
    pub fn load(model_path: &str) -> Result<Self, ScreenError> {
        if !Path::new(model_path).exists() {
            return Err(ScreenError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            "loaded SCRFD face screen"
        );

        // Detection-only exports carry 6 outputs (score/bbox per stride);
        // full exports carry 9 (plus landmarks, which we never read).
        if output_names.len() < 6 {
            return Err(ScreenError::InferenceFailed(format!(
                "SCRFD export needs at least 6 outputs (3 strides x score/bbox), got {}",
                output_names.len()
            )));
        }

        let stride_indices = discover_output_indices(&output_names);
        tracing::debug!(?stride_indices, "SCRFD output tensor mapping");

        Ok(Self {
            session,
            input_size: SCREEN_INPUT_SIZE,
            stride_indices,
        })
    }

    /// Detect faces in an uploaded RGB image, best-scored first.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<FaceBox>, ScreenError> {
        let (input, letterbox) = self.preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut detections = Vec::new();
        for (stride_pos, &stride) in SCREEN_STRIDES.iter().enumerate() {
            let (score_idx, bbox_idx) = self.stride_indices[stride_pos];

            let (_, scores) = outputs[score_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| ScreenError::InferenceFailed(format!("scores stride {stride}: {e}")))?;
            let (_, deltas) = outputs[bbox_idx]
                .try_extract_tensor::<f32>()
                .map_err(|e| ScreenError::InferenceFailed(format!("bboxes stride {stride}: {e}")))?;

            detections.extend(decode_stride(
                scores,
                deltas,
                stride,
                self.input_size as usize,
                &letterbox,
                SCREEN_CONFIDENCE_THRESHOLD,
            ));
        }

        let mut faces = suppress_overlaps(detections, SCREEN_NMS_THRESHOLD);
        faces.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(faces)
    }

    /// Letterbox the upload into the square model input and normalize.
    ///
    /// Padding stays at the tensor's zero fill, which is exactly what a
    /// pixel equal to the mean normalizes to.
    fn preprocess(&self, image: &RgbImage) -> (Array4<f32>, Letterbox) {
        let (width, height) = image.dimensions();
        let size = self.input_size;

        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_w = ((width as f32 * scale).round() as u32).max(1);
        let new_h = ((height as f32 * scale).round() as u32).max(1);
        let pad_x = (size - new_w) / 2;
        let pad_y = (size - new_h) / 2;

        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

        let mut tensor =
            Array4::<f32>::zeros((1, 3, size as usize, size as usize));
        for (x, y, pixel) in resized.enumerate_pixels() {
            let ty = (y + pad_y) as usize;
            let tx = (x + pad_x) as usize;
            for channel in 0..3 {
                tensor[[0, channel, ty, tx]] =
                    (pixel.0[channel] as f32 - SCREEN_MEAN) / SCREEN_STD;
            }
        }

        (
            tensor,
            Letterbox {
                scale,
                pad_x: pad_x as f32,
                pad_y: pad_y as f32,
            },
        )
    }
}

/// Discover (score, bbox) output indices per stride by name.
///
/// SCRFD exports name tensors "score_8"/"bbox_8" etc., or use generic
/// numeric names. Named mapping is preferred; otherwise the standard
/// positional layout applies: [0-2] = scores, [3-5] = bboxes.
fn discover_output_indices(names: &[String]) -> [(usize, usize); 3] {
    let find = |prefix: &str, stride: usize| -> Option<usize> {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| n == &target)
    };

    let named = SCREEN_STRIDES
        .iter()
        .all(|&stride| find("score", stride).is_some() && find("bbox", stride).is_some());

    if named {
        tracing::info!("SCRFD: using name-based output tensor mapping");
        std::array::from_fn(|i| {
            let stride = SCREEN_STRIDES[i];
            (
                find("score", stride).unwrap(),
                find("bbox", stride).unwrap(),
            )
        })
    } else {
        tracing::info!(
            ?names,
            "SCRFD: output names not recognized, using positional mapping [0-2]=scores, [3-5]=bboxes"
        );
        [(0, 3), (1, 4), (2, 5)]
    }
}

/// Decode detections for one stride level back into upload coordinates.
fn decode_stride(
    scores: &[f32],
    deltas: &[f32],
    stride: usize,
    input_size: usize,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<FaceBox> {
    let grid = input_size / stride;
    let num_anchors = grid * grid * SCREEN_ANCHORS_PER_CELL;

    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let score = scores.get(idx).copied().unwrap_or(0.0);
        if score <= threshold {
            continue;
        }

        let anchor_idx = idx / SCREEN_ANCHORS_PER_CELL;
        let anchor_cx = (anchor_idx % grid) as f32 * stride as f32;
        let anchor_cy = (anchor_idx / grid) as f32 * stride as f32;

        // Deltas are [left, top, right, bottom] distances in stride units.
        let delta_off = idx * 4;
        if delta_off + 3 >= deltas.len() {
            continue;
        }
        let x1 = anchor_cx - deltas[delta_off] * stride as f32;
        let y1 = anchor_cy - deltas[delta_off + 1] * stride as f32;
        let x2 = anchor_cx + deltas[delta_off + 2] * stride as f32;
        let y2 = anchor_cy + deltas[delta_off + 3] * stride as f32;

        // Letterboxed space back to the original upload.
        let orig_x1 = (x1 - letterbox.pad_x) / letterbox.scale;
        let orig_y1 = (y1 - letterbox.pad_y) / letterbox.scale;
        let orig_x2 = (x2 - letterbox.pad_x) / letterbox.scale;
        let orig_y2 = (y2 - letterbox.pad_y) / letterbox.scale;

        detections.push(FaceBox {
            x: orig_x1,
            y: orig_y1,
            width: orig_x2 - orig_x1,
            height: orig_y2 - orig_y1,
            confidence: score,
        });
    }

    detections
}

/// Non-maximum suppression: drop boxes overlapping a better-scored one.
fn suppress_overlaps(mut detections: Vec<FaceBox>, iou_threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if !suppressed[j] && iou(&detections[i], &detections[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Intersection-over-union of two face boxes.
fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.area() + b.area() - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(x: f32, y: f32, w: f32, h: f32, conf: f32) -> FaceBox {
        FaceBox {
            x,
            y,
            width: w,
            height: h,
            confidence: conf,
        }
    }

    #[test]
    fn test_iou_identical() {
        let a = face(0.0, 0.0, 100.0, 100.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = face(20.0, 20.0, 10.0, 10.0, 1.0);
        assert!(iou(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_iou_half_overlap() {
        let a = face(0.0, 0.0, 10.0, 10.0, 1.0);
        let b = face(5.0, 0.0, 10.0, 10.0, 1.0);
        // Overlap 50, union 150
        assert!((iou(&a, &b) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_suppression_keeps_best_of_overlapping_pair() {
        let detections = vec![
            face(0.0, 0.0, 100.0, 100.0, 0.9),
            face(5.0, 5.0, 100.0, 100.0, 0.8),
            face(300.0, 300.0, 50.0, 50.0, 0.7),
        ];
        let kept = suppress_overlaps(detections, 0.4);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_suppression_empty() {
        assert!(suppress_overlaps(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_coordinate_roundtrip() {
        let width = 320.0f32;
        let height = 240.0f32;
        let size = SCREEN_INPUT_SIZE as f32;
        let scale = (size / width).min(size / height);
        let new_w = (width * scale).round();
        let new_h = (height * scale).round();
        let letterbox = Letterbox {
            scale,
            pad_x: ((size - new_w) / 2.0).floor(),
            pad_y: ((size - new_h) / 2.0).floor(),
        };

        let orig_x = 100.0f32;
        let orig_y = 50.0f32;
        let boxed_x = orig_x * scale + letterbox.pad_x;
        let boxed_y = orig_y * scale + letterbox.pad_y;

        let recovered_x = (boxed_x - letterbox.pad_x) / letterbox.scale;
        let recovered_y = (boxed_y - letterbox.pad_y) / letterbox.scale;
        assert!((recovered_x - orig_x).abs() < 0.1);
        assert!((recovered_y - orig_y).abs() < 0.1);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names: Vec<String> = [
            "score_8", "score_16", "score_32", "bbox_8", "bbox_16", "bbox_32", "kps_8",
            "kps_16", "kps_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_discover_output_indices_shuffled_named() {
        let names: Vec<String> = [
            "bbox_8", "score_8", "bbox_16", "score_16", "bbox_32", "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        assert_eq!(discover_output_indices(&names), [(1, 0), (3, 2), (5, 4)]);
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| i.to_string()).collect();
        assert_eq!(discover_output_indices(&names), [(0, 3), (1, 4), (2, 5)]);
    }

    #[test]
    fn test_decode_stride_maps_back_to_upload_space() {
        // One confident anchor at grid cell (1, 1) of stride 32, square
        // letterbox (no padding, scale 1): box should land near the anchor.
        let grid = SCREEN_INPUT_SIZE as usize / 32;
        let anchors = grid * grid * SCREEN_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let mut deltas = vec![0.0f32; anchors * 4];

        let cell = grid + 1; // row 1, col 1
        let idx = cell * SCREEN_ANCHORS_PER_CELL;
        scores[idx] = 0.9;
        deltas[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
        };
        let boxes = decode_stride(
            &scores,
            &deltas,
            32,
            SCREEN_INPUT_SIZE as usize,
            &letterbox,
            0.5,
        );
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        // Anchor center (32, 32), one stride in each direction.
        assert!((b.x - 0.0).abs() < 1e-4);
        assert!((b.y - 0.0).abs() < 1e-4);
        assert!((b.width - 64.0).abs() < 1e-4);
        assert!((b.height - 64.0).abs() < 1e-4);
        assert!((b.confidence - 0.9).abs() < 1e-6);
    }
}

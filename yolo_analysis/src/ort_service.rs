use crate::{
    detection::{InferenceParams, RawDetection},
    labels::LabelTable,
    model_service::{ModelError, ModelService},
};
use image::{imageops::FilterType, RgbImage};
use ndarray::{Array, ArrayD, ArrayViewD, Axis, Ix3, Ix4};
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::{DynValue, TensorRef},
};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

const PAD_VALUE: f32 = 114. / 255.;
const MAX_DETECTIONS: usize = 300;

/// Model-space box (letterboxed input pixels) before rescaling.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_id: usize,
    confidence: f32,
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

fn intersection(box1: &Candidate, box2: &Candidate) -> f32 {
    let w = (box1.x2.min(box2.x2) - box1.x1.max(box2.x1)).max(0.);
    let h = (box1.y2.min(box2.y2) - box1.y1.max(box2.y1)).max(0.);
    w * h
}

fn union(box1: &Candidate, box2: &Candidate) -> f32 {
    ((box1.x2 - box1.x1) * (box1.y2 - box1.y1)) + ((box2.x2 - box2.x1) * (box2.y2 - box2.y1))
        - intersection(box1, box2)
}

fn iou(box1: &Candidate, box2: &Candidate) -> f32 {
    let union = union(box1, box2);
    if union <= 0. {
        return 0.;
    }
    intersection(box1, box2) / union
}

/// Class-aware suppression. Output is ordered by descending confidence.
fn non_max_suppression(mut boxes: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    boxes.sort_by(|box1, box2| box2.confidence.total_cmp(&box1.confidence));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in boxes {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
            if kept.len() == MAX_DETECTIONS {
                break;
            }
        }
    }
    kept
}

/// Input tensor plus the geometry needed to map boxes back onto the
/// decoded image.
pub struct Letterbox {
    pub input: Array<f32, Ix4>,
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub width: u32,
    pub height: u32,
}

impl Letterbox {
    fn to_image(&self, candidate: &Candidate) -> RawDetection {
        let max_x = self.width as f32;
        let max_y = self.height as f32;
        let x1 = ((candidate.x1 - self.pad_x) / self.scale).clamp(0., max_x);
        let y1 = ((candidate.y1 - self.pad_y) / self.scale).clamp(0., max_y);
        let x2 = ((candidate.x2 - self.pad_x) / self.scale).clamp(0., max_x);
        let y2 = ((candidate.y2 - self.pad_y) / self.scale).clamp(0., max_y);

        RawDetection {
            class_id: candidate.class_id,
            confidence: candidate.confidence,
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }
}

/// Resizes the long edge to `size`, keeps the aspect ratio and pads the
/// short edge symmetrically with gray, producing a 1x3xSxS tensor in [0, 1].
pub fn letterbox(image: &RgbImage, size: u32) -> Letterbox {
    let (width, height) = image.dimensions();
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_width = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_height = ((height as f32 * scale).round() as u32).clamp(1, size);

    let resized = image::imageops::resize(image, new_width, new_height, FilterType::Triangle);

    let left = ((size - new_width) as f32 / 2. - 0.1).round().max(0.) as u32;
    let top = ((size - new_height) as f32 / 2. - 0.1).round().max(0.) as u32;

    let side = size as usize;
    let mut input = Array::from_elem((1, 3, side, side), PAD_VALUE);
    for (x, y, pixel) in resized.enumerate_pixels() {
        let x = (x + left) as usize;
        let y = (y + top) as usize;
        let [r, g, b] = pixel.0;
        input[[0, 0, y, x]] = (r as f32) / 255.;
        input[[0, 1, y, x]] = (g as f32) / 255.;
        input[[0, 2, y, x]] = (b as f32) / 255.;
    }

    Letterbox {
        input,
        scale,
        pad_x: left as f32,
        pad_y: top as f32,
        width,
        height,
    }
}

/// Decodes a YOLOv8 head of shape `[1, 4 + classes, anchors]` where each
/// anchor is `(cx, cy, w, h, class scores...)`.
pub fn decode_output(
    output: ArrayViewD<f32>,
    params: &InferenceParams,
    geometry: &Letterbox,
) -> Result<Vec<RawDetection>, ModelError> {
    let output = output
        .into_dimensionality::<Ix3>()
        .map_err(|e| ModelError::Output(format!("expected a 3D tensor: {}", e)))?;
    let (batch, channels, _) = output.dim();
    if batch == 0 || channels <= 4 {
        return Err(ModelError::Output(format!(
            "invalid output shape {:?}",
            output.shape()
        )));
    }

    let predictions = output.index_axis(Axis(0), 0);
    let mut candidates = Vec::new();

    for anchor in predictions.axis_iter(Axis(1)) {
        let (class_id, confidence) = anchor
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .fold((0, f32::MIN), |best, score| {
                if score.1 > best.1 {
                    score
                } else {
                    best
                }
            });

        if confidence < params.confidence {
            continue;
        }

        let (xc, yc, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
        candidates.push(Candidate {
            class_id,
            confidence,
            x1: xc - w / 2.,
            y1: yc - h / 2.,
            x2: xc + w / 2.,
            y2: yc + h / 2.,
        });
    }

    Ok(non_max_suppression(candidates, params.iou)
        .iter()
        .map(|candidate| geometry.to_image(candidate))
        .collect())
}

const OUTPUT_NAME: &str = "output0";

fn extract_output(output: Option<&DynValue>) -> Result<ArrayD<f32>, ModelError> {
    let output = output.ok_or_else(|| {
        ModelError::Output(format!("model has no output named {}", OUTPUT_NAME))
    })?;
    let (shape, data) = output.try_extract_tensor::<f32>()?;
    ArrayD::from_shape_vec(shape.to_ixdyn(), data.to_vec())
        .map_err(|e| ModelError::Output(format!("invalid tensor shape: {}", e)))
}

#[derive(Debug)]
pub struct OrtModelService {
    sessions: Vec<Mutex<Session>>,
    counter: AtomicUsize,
    labels: LabelTable,
}

#[cfg(feature = "tensorrt")]
fn register_execution_providers() {
    use ort::execution_providers::TensorRTExecutionProvider;

    let committed = ort::init()
        .with_execution_providers([TensorRTExecutionProvider::default()
            .with_engine_cache(true)
            .build()])
        .commit();
    tracing::info!("TensorRT execution provider registration: {:?}", committed);
}

fn build_session(model_path: &Path) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model_path)?;
    Ok(session)
}

impl OrtModelService {
    pub fn new(
        model_path: &Path,
        num_instances: usize,
        labels: LabelTable,
    ) -> Result<Self, ort::Error> {
        #[cfg(feature = "tensorrt")]
        register_execution_providers();

        let sessions = (0..num_instances.max(1))
            .map(|_| build_session(model_path).map(Mutex::new))
            .collect::<Result<Vec<_>, ort::Error>>()?;

        tracing::info!(
            "Created {} ONNX sessions for {} classes",
            sessions.len(),
            labels.len()
        );

        Ok(Self {
            sessions,
            counter: AtomicUsize::new(0),
            labels,
        })
    }

    fn run_inference(&self, input: &Array<f32, Ix4>) -> Result<ArrayD<f32>, ModelError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[index]
            .lock()
            .map_err(|e| ModelError::Poisoned(e.to_string()))?;

        tracing::debug!("Handling request with session {}", index);
        let tensor_ref = TensorRef::from_array_view(input.view())?;
        let outputs = session.run(ort::inputs![tensor_ref])?;

        let array = extract_output(outputs.get(OUTPUT_NAME))?;
        Ok(array)
    }
}

impl ModelService for OrtModelService {
    fn infer(
        &self,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>, ModelError> {
        let geometry = letterbox(image, params.input_size);
        let output = self.run_inference(&geometry.input)?;
        decode_output(output.view(), params, &geometry)
    }

    fn labels(&self) -> &LabelTable {
        &self.labels
    }
}

use serde::Serialize;

pub const SUCCESS_MESSAGE: &str = "Image analyzed successfully (YOLOv8 Object Detection)!";

/// Thresholds and geometry handed to the model for one inference call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    pub confidence: f32,
    pub iou: f32,
    pub input_size: u32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            iou: 0.7,
            input_size: 640,
        }
    }
}

/// A detection as produced by the model, in pixel coordinates of the
/// decoded image (min-x, min-y, max-x, max-y).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub class_name: String,
    pub probability: f32,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    pub message: String,
    pub detections: Vec<Detection>,
    pub file_name: String,
}

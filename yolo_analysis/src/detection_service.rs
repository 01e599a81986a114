use crate::{
    detection::{
        AnalysisResponse, BoundingBox, Detection, InferenceParams, RawDetection, SUCCESS_MESSAGE,
    },
    error::ServiceError,
    image_decoder::decode_image,
    labels::LabelTable,
    model_service::ModelService,
    state::{ModelHandle, Readiness},
};
use axum::body::Bytes;
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::instrument;

/// Reported detections must score strictly above this, on top of the
/// threshold already applied at inference time.
pub const MIN_REPORTED_PROBABILITY: f32 = 0.5;

pub struct DetectionService<M: ModelService> {
    model: Arc<ModelHandle<M>>,
    params: InferenceParams,
    inference_timeout: Duration,
}

impl<M: ModelService> DetectionService<M> {
    pub fn new(model: Arc<ModelHandle<M>>, inference_timeout: Duration) -> Self {
        Self {
            model,
            params: InferenceParams::default(),
            inference_timeout,
        }
    }

    pub fn readiness(&self) -> Readiness {
        self.model.readiness()
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    #[instrument(skip(self, image_data), fields(bytes = image_data.len()))]
    pub async fn analyze(
        &self,
        image_data: Bytes,
        file_name: Option<String>,
    ) -> Result<AnalysisResponse, ServiceError> {
        let model = self.model.get().ok_or(ServiceError::ModelNotReady)?;

        let file_name = match file_name {
            Some(name) if !name.is_empty() => name,
            _ => {
                return Err(ServiceError::InvalidInput(
                    "No image file provided.".to_string(),
                ))
            }
        };
        if image_data.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Uploaded image is empty.".to_string(),
            ));
        }

        let params = self.params;
        let task = tokio::task::spawn_blocking(move || -> Result<Vec<Detection>, ServiceError> {
            let image =
                decode_image(&image_data).map_err(|e| ServiceError::InternalError(e.to_string()))?;
            tracing::debug!("Decoded {}x{} image", image.width(), image.height());

            let raw_detections = model
                .infer(&image, &params)
                .map_err(|e| ServiceError::InternalError(e.to_string()))?;

            Ok(to_detections(raw_detections, model.labels()))
        });

        let result = match timeout(self.inference_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(ServiceError::InternalError(format!(
                "analysis task failed: {}",
                join_error
            ))),
            Err(_) => Err(ServiceError::InternalError(format!(
                "inference timed out after {} ms",
                self.inference_timeout.as_millis()
            ))),
        };

        let detections = result.map_err(|e| {
            tracing::error!("Error processing image {}: {}", file_name, e);
            e
        })?;

        tracing::info!("Image analyzed. Detections: {}", detections.len());

        Ok(AnalysisResponse {
            message: SUCCESS_MESSAGE.to_string(),
            detections,
            file_name,
        })
    }
}

fn to_detections(raw_detections: Vec<RawDetection>, labels: &LabelTable) -> Vec<Detection> {
    raw_detections
        .into_iter()
        .filter(|detection| detection.confidence > MIN_REPORTED_PROBABILITY)
        .map(|detection| Detection {
            class_name: labels.name(detection.class_id),
            probability: detection.confidence,
            bbox: BoundingBox {
                left: detection.x1,
                top: detection.y1,
                right: detection.x2,
                bottom: detection.y2,
            },
        })
        .collect()
}

use crate::{
    detection::{InferenceParams, RawDetection},
    labels::LabelTable,
};
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("session mutex poisoned: {0}")]
    Poisoned(String),
    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("unexpected model output: {0}")]
    Output(String),
}

/// A loaded detection model. Implementations must be callable from several
/// blocking threads at once.
pub trait ModelService: Send + Sync + 'static {
    fn infer(
        &self,
        image: &RgbImage,
        params: &InferenceParams,
    ) -> Result<Vec<RawDetection>, ModelError>;

    fn labels(&self) -> &LabelTable;
}

use crate::{
    config::{LabelsConfig, ModelConfig, Validatable},
    labels::{LabelTable, LabelsError},
    ort_service::OrtModelService,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Invalid model configuration: {0}")]
    Config(String),
    #[error("Failed to download model weights: {0}")]
    Download(#[from] reqwest::Error),
    #[error("Failed to write model weights: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Labels(#[from] LabelsError),
    #[error("Failed to create ONNX session: {0}")]
    Session(#[from] ort::Error),
    #[error("Model loading task failed: {0}")]
    Task(String),
}

/// Validation and label parsing touch the filesystem, so they run on the
/// blocking pool next to session creation.
pub async fn load_model(
    model_config: &ModelConfig,
    labels_config: &LabelsConfig,
) -> Result<OrtModelService, LoadError> {
    let (model, labels) = (model_config.clone(), labels_config.clone());
    tokio::task::spawn_blocking(move || -> Result<(), LoadError> {
        model.validate().map_err(LoadError::Config)?;
        labels.validate().map_err(LoadError::Config)
    })
    .await
    .map_err(|e| LoadError::Task(e.to_string()))??;

    let model_path = ensure_weights(model_config).await?;

    let labels_path = labels_config.get_path();
    let num_instances = model_config.num_instances;
    let service = tokio::task::spawn_blocking(move || -> Result<OrtModelService, LoadError> {
        let labels = LabelTable::from_file(&labels_path)?;
        tracing::info!(
            "Loaded {} class labels from {:?}",
            labels.len(),
            labels_path
        );
        Ok(OrtModelService::new(&model_path, num_instances, labels)?)
    })
    .await
    .map_err(|e| LoadError::Task(e.to_string()))??;

    Ok(service)
}

/// Returns the weights path, downloading the file first if it is missing
/// and a download URL is configured.
pub async fn ensure_weights(model_config: &ModelConfig) -> Result<PathBuf, LoadError> {
    let model_path = model_config.get_path();
    if tokio::fs::try_exists(&model_path).await? {
        return Ok(model_path);
    }

    match model_config.download_url.as_deref() {
        Some(url) => {
            download_weights(url, &model_path).await?;
            Ok(model_path)
        }
        None => Err(LoadError::Config(format!(
            "Model file not found: {:?}",
            model_path
        ))),
    }
}

pub async fn download_weights(url: &str, destination: &Path) -> Result<(), LoadError> {
    tracing::info!("Downloading model weights from {} to {:?}", url, destination);

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = reqwest::get(url)
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let partial = destination.with_extension("part");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, destination).await?;

    tracing::info!("Downloaded {} bytes of model weights", bytes.len());
    Ok(())
}

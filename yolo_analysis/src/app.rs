use crate::{
    config::{Config, LabelsConfig, ModelConfig},
    detection_service::DetectionService,
    loader::load_model,
    ort_service::OrtModelService,
    server::{build_router, HttpServer},
    state::ModelHandle,
};
use std::{sync::Arc, time::Duration};
use tokio::{signal, task::JoinHandle};

/// Binds the listener first so requests get a 503 while the model loads,
/// then loads the model in the background.
pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let model_handle = Arc::new(ModelHandle::<OrtModelService>::new());
    let detection_service = Arc::new(DetectionService::new(
        model_handle.clone(),
        Duration::from_millis(config.model.inference_timeout_ms),
    ));

    let router = build_router(detection_service, config.server.max_upload_bytes);
    let server = HttpServer::new(router, &config.server).await?;

    spawn_model_loader(model_handle, config.model, config.labels);

    server.run(shutdown_signal()).await?;

    Ok(())
}

pub fn spawn_model_loader(
    model_handle: Arc<ModelHandle<OrtModelService>>,
    model_config: ModelConfig,
    labels_config: LabelsConfig,
) -> JoinHandle<()> {
    model_handle.begin_loading();
    tracing::info!("Loading model {:?}", model_config.onnx_file);

    tokio::spawn(async move {
        let outcome = match load_model(&model_config, &labels_config).await {
            Ok(service) => {
                tracing::info!("YOLOv8 model loaded successfully");
                Ok(service)
            }
            Err(e) => {
                tracing::error!("Failed to load YOLOv8 model: {}", e);
                Err(e.to_string())
            }
        };
        model_handle.publish(outcome);
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

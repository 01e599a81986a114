use crate::{
    config::ServerConfig, detection_service::DetectionService, model_service::ModelService,
    routes::api_routes,
};
use axum::{extract::DefaultBodyLimit, Router};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

pub struct SharedState<M: ModelService> {
    pub detection_service: Arc<DetectionService<M>>,
}

impl<M: ModelService> Clone for SharedState<M> {
    fn clone(&self) -> Self {
        Self {
            detection_service: self.detection_service.clone(),
        }
    }
}

pub fn build_router<M: ModelService>(
    detection_service: Arc<DetectionService<M>>,
    max_upload_bytes: usize,
) -> Router {
    let app_state = SharedState { detection_service };

    api_routes()
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(router: Router, config: &ServerConfig) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.get_address()).await?;
        Ok(Self { router, listener })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        tracing::info!("Starting app on {}", self.local_addr()?);

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

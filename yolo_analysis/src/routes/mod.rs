mod analyze_image;

use crate::{model_service::ModelService, server::SharedState};
use axum::{routing::post, Router};

pub use analyze_image::analyze_image;

pub fn api_routes<M: ModelService>() -> Router<SharedState<M>> {
    Router::new().route("/analyze-image", post(analyze_image::<M>))
}

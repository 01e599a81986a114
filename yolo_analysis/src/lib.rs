mod routes;

pub mod app;
pub mod config;
pub mod detection;
pub mod detection_service;
pub mod error;
pub mod image_decoder;
pub mod labels;
pub mod loader;
pub mod model_service;
pub mod ort_service;
pub mod server;
pub mod state;

pub use app::start_app;
